// Query pipeline
// question -> landmark -> coordinates -> ward -> grounded answer, one state at a time


pub mod composer;
pub mod extractor;

pub use composer::AnswerComposer;
pub use extractor::EntityExtractor;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::boundaries::{Ward, WardSet};
use crate::config::Config;
use crate::database::lancedb::VectorStore;
use crate::description::describe_ward;
use crate::geocoder::{Geocoder, Landmark};
use crate::llm::ChatClient;
use crate::spatial::{Coordinates, SpatialLocator};
use crate::{Result, WardError};

/// Why a query ended without a generated answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    ExtractionFailed,
    NotFound,
    AmbiguousMatch,
    NoContainingWard,
    AmbiguousContainment,
    GenerationFailed,
}

impl FailureKind {
    /// The message shown to the user in place of an answer
    #[inline]
    pub fn fallback_message(self) -> &'static str {
        match self {
            Self::ExtractionFailed => {
                "I couldn't identify a landmark in your question. Try naming a specific place, \
                 for example \"Which ward is India Gate in?\""
            }
            Self::NotFound => {
                "I couldn't find that landmark on the map. Check the spelling or try a better-known name."
            }
            Self::AmbiguousMatch => {
                "That name matches several different places. Add a locality or a nearby landmark \
                 so I can tell which one you mean."
            }
            Self::NoContainingWard => {
                "I found the landmark, but it lies outside the wards this service covers."
            }
            Self::AmbiguousContainment => {
                "The landmark sits where more than one ward's boundary overlaps, so I can't name a \
                 single ward for it."
            }
            Self::GenerationFailed => {
                "Sorry, I couldn't generate an answer right now. Please try again later."
            }
        }
    }
}

impl fmt::Display for FailureKind {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match *self {
            Self::ExtractionFailed => "extraction_failed",
            Self::NotFound => "not_found",
            Self::AmbiguousMatch => "ambiguous_match",
            Self::NoContainingWard => "no_containing_ward",
            Self::AmbiguousContainment => "ambiguous_containment",
            Self::GenerationFailed => "generation_failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryFailure {
    pub kind: FailureKind,
    pub detail: String,
}

impl QueryFailure {
    /// Classify an error raised while in a given step
    ///
    /// Errors outside the query taxonomy are attributed to the step's own kind.
    #[inline]
    pub fn from_error(error: &WardError, step_kind: FailureKind) -> Self {
        Self {
            kind: error.failure_kind().unwrap_or(step_kind),
            detail: error.to_string(),
        }
    }
}

/// One query's progress
#[derive(Debug, Clone, PartialEq)]
pub enum QueryState {
    Received {
        question: String,
    },
    EntityExtracted {
        question: String,
        landmark: String,
    },
    Geocoded {
        question: String,
        landmark: Landmark,
    },
    WardResolved {
        question: String,
        landmark: Landmark,
        ward: Ward,
    },
    AnswerGenerated {
        question: String,
        landmark: Landmark,
        ward: Ward,
        answer: String,
    },
    Failed {
        question: String,
        landmark: Option<String>,
        coordinates: Option<Coordinates>,
        ward: Option<Ward>,
        failure: QueryFailure,
    },
}

impl QueryState {
    #[inline]
    pub fn new(question: &str) -> Self {
        Self::Received {
            question: question.to_string(),
        }
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Received { .. } => "received",
            Self::EntityExtracted { .. } => "entity_extracted",
            Self::Geocoded { .. } => "geocoded",
            Self::WardResolved { .. } => "ward_resolved",
            Self::AnswerGenerated { .. } => "answer_generated",
            Self::Failed { .. } => "failed",
        }
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::AnswerGenerated { .. } | Self::Failed { .. })
    }

    #[inline]
    pub fn question(&self) -> &str {
        match self {
            Self::Received { question }
            | Self::EntityExtracted { question, .. }
            | Self::Geocoded { question, .. }
            | Self::WardResolved { question, .. }
            | Self::AnswerGenerated { question, .. }
            | Self::Failed { question, .. } => question,
        }
    }
}

/// The resolved ward in a result, with its boundary as GeoJSON
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WardSummary {
    pub id: String,
    pub name: Option<String>,
    pub geometry: serde_json::Value,
}

impl From<&Ward> for WardSummary {
    #[inline]
    fn from(ward: &Ward) -> Self {
        Self {
            id: ward.id.clone(),
            name: ward.name.clone(),
            geometry: ward.geometry_geojson(),
        }
    }
}

/// What a caller gets back for one question
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub question: String,
    pub landmark: Option<String>,
    pub coordinates: Option<Coordinates>,
    pub ward: Option<WardSummary>,
    pub answer: String,
    pub failure: Option<QueryFailure>,
}

impl QueryResult {
    /// Build the result from a terminal state
    ///
    /// Non-terminal states have no answer yet and yield a generation failure.
    #[inline]
    pub fn from_state(state: QueryState) -> Self {
        match state {
            QueryState::AnswerGenerated {
                question,
                landmark,
                ward,
                answer,
            } => Self {
                question,
                landmark: Some(landmark.name),
                coordinates: Some(landmark.coordinates),
                ward: Some(WardSummary::from(&ward)),
                answer,
                failure: None,
            },
            QueryState::Failed {
                question,
                landmark,
                coordinates,
                ward,
                failure,
            } => {
                let answer = match (&ward, &landmark) {
                    (Some(ward), Some(name)) if failure.kind == FailureKind::GenerationFailed => {
                        composer::resolved_ward_fallback(name, ward)
                    }
                    _ => failure.kind.fallback_message().to_string(),
                };

                Self {
                    question,
                    landmark,
                    coordinates,
                    ward: ward.as_ref().map(WardSummary::from),
                    answer,
                    failure: Some(failure),
                }
            }
            other => Self {
                question: other.question().to_string(),
                landmark: None,
                coordinates: None,
                ward: None,
                answer: FailureKind::GenerationFailed.fallback_message().to_string(),
                failure: Some(QueryFailure {
                    kind: FailureKind::GenerationFailed,
                    detail: format!("query stopped in state {}", other.name()),
                }),
            },
        }
    }

    #[inline]
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

/// Steps a question through extraction, geocoding, containment and generation
pub struct QueryPipeline {
    extractor: EntityExtractor,
    geocoder: Geocoder,
    locator: SpatialLocator,
    composer: AnswerComposer,
    store: Option<Arc<VectorStore>>,
    city: String,
}

impl QueryPipeline {
    #[inline]
    pub fn new(
        config: &Config,
        wards: Arc<WardSet>,
        store: Option<Arc<VectorStore>>,
    ) -> Result<Self> {
        let chat = ChatClient::new(config)?;

        Ok(Self::from_parts(
            EntityExtractor::new(chat.clone(), config),
            Geocoder::new(config)?,
            SpatialLocator::new(wards),
            AnswerComposer::new(chat, config),
            store,
            &config.boundaries.city,
        ))
    }

    #[inline]
    pub fn from_parts(
        extractor: EntityExtractor,
        geocoder: Geocoder,
        locator: SpatialLocator,
        composer: AnswerComposer,
        store: Option<Arc<VectorStore>>,
        city: &str,
    ) -> Self {
        Self {
            extractor,
            geocoder,
            locator,
            composer,
            store,
            city: city.to_string(),
        }
    }

    /// Answer one question; failures become fallback answers, never errors
    #[inline]
    pub async fn answer(&self, question: &str) -> QueryResult {
        let mut state = QueryState::new(question);

        while !state.is_terminal() {
            let from = state.name();
            state = self.step(state).await;
            debug!("Query state {} -> {}", from, state.name());
        }

        if let QueryState::Failed { failure, .. } = &state {
            info!("Query failed ({}): {}", failure.kind, failure.detail);
        }

        QueryResult::from_state(state)
    }

    /// Advance by exactly one state; terminal states are returned unchanged
    #[inline]
    pub async fn step(&self, state: QueryState) -> QueryState {
        match state {
            QueryState::Received { question } => match self.extractor.extract(&question) {
                Ok(landmark) => QueryState::EntityExtracted { question, landmark },
                Err(e) => failed(question, None, None, None, &e, FailureKind::ExtractionFailed),
            },
            QueryState::EntityExtracted { question, landmark } => {
                match self.geocoder.geocode(&landmark) {
                    Ok(located) => QueryState::Geocoded {
                        question,
                        landmark: located,
                    },
                    Err(e) => failed(question, Some(landmark), None, None, &e, FailureKind::NotFound),
                }
            }
            QueryState::Geocoded { question, landmark } => {
                match self.locator.locate(landmark.coordinates) {
                    Ok(ward) => QueryState::WardResolved {
                        question,
                        ward: ward.clone(),
                        landmark,
                    },
                    Err(e) => failed(
                        question,
                        Some(landmark.name),
                        Some(landmark.coordinates),
                        None,
                        &e,
                        FailureKind::NoContainingWard,
                    ),
                }
            }
            QueryState::WardResolved {
                question,
                landmark,
                ward,
            } => {
                let description = self.description_for(&ward).await;
                match self
                    .composer
                    .compose(&question, &landmark, &ward, &description)
                {
                    Ok(answer) => QueryState::AnswerGenerated {
                        question,
                        landmark,
                        ward,
                        answer,
                    },
                    Err(e) => failed(
                        question,
                        Some(landmark.name),
                        Some(landmark.coordinates),
                        Some(ward),
                        &e,
                        FailureKind::GenerationFailed,
                    ),
                }
            }
            terminal @ (QueryState::AnswerGenerated { .. } | QueryState::Failed { .. }) => terminal,
        }
    }

    /// Stored description for the ward, rebuilt when the store has none
    async fn description_for(&self, ward: &Ward) -> String {
        if let Some(store) = &self.store {
            match store.get(&ward.id).await {
                Ok(Some(record)) => return record.text,
                Ok(None) => debug!("No stored description for ward {}", ward.id),
                Err(e) => warn!("Could not read description for ward {}: {}", ward.id, e),
            }
        }

        describe_ward(ward, &self.city).unwrap_or_else(|_| {
            format!(
                "This is municipal ward number {}, in {}.",
                ward.id, self.city
            )
        })
    }
}

fn failed(
    question: String,
    landmark: Option<String>,
    coordinates: Option<Coordinates>,
    ward: Option<Ward>,
    error: &WardError,
    step_kind: FailureKind,
) -> QueryState {
    QueryState::Failed {
        question,
        landmark,
        coordinates,
        ward,
        failure: QueryFailure::from_error(error, step_kind),
    }
}
