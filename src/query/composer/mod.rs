
use tracing::debug;

use crate::boundaries::Ward;
use crate::config::Config;
use crate::geocoder::Landmark;
use crate::llm::{ChatClient, ChatOptions};
use crate::{Result, WardError};

/// Builds the grounded prompt and asks the chat model for the final answer
#[derive(Debug, Clone)]
pub struct AnswerComposer {
    chat: ChatClient,
    options: ChatOptions,
    city: String,
}

impl AnswerComposer {
    #[inline]
    pub fn new(chat: ChatClient, config: &Config) -> Self {
        Self {
            chat,
            options: ChatOptions {
                temperature: config.llm.answer_temperature,
                max_tokens: config.llm.answer_max_tokens,
            },
            city: config.boundaries.city.clone(),
        }
    }

    /// The facts the answer must be grounded in
    #[inline]
    pub fn context(landmark: &Landmark, ward: &Ward, description: &str) -> String {
        let mut lines = vec![format!(
            "- The landmark '{}' is located in ward number {}, named {}.",
            landmark.name,
            ward.id,
            ward.display_name()
        )];
        if let Some(place) = &landmark.display_name {
            lines.push(format!("- The geocoder describes the landmark as: {}.", place));
        }
        lines.push(format!("- Ward record: {}", description));
        lines.join("\n")
    }

    #[inline]
    pub fn prompt(&self, question: &str, context: &str) -> String {
        format!(
            "You are an expert on the municipal wards of {city}. Answer the user's question using \
             ONLY the context below. The context is accurate. State the ward clearly and concisely.\n\
             \n\
             CONTEXT:\n\
             ---\n\
             {context}\n\
             ---\n\
             \n\
             USER QUESTION: {question}\n\
             \n\
             ANSWER:",
            city = self.city,
            context = context,
            question = question.trim(),
        )
    }

    #[inline]
    pub fn compose(
        &self,
        question: &str,
        landmark: &Landmark,
        ward: &Ward,
        description: &str,
    ) -> Result<String> {
        let prompt = self.prompt(question, &Self::context(landmark, ward, description));
        debug!("Composing answer for ward {}", ward.id);

        self.chat
            .complete(&prompt, self.options)
            .map_err(|e| WardError::GenerationFailed(e.to_string()))
    }
}

/// What to tell the user when generation fails after the ward is known
#[inline]
pub fn resolved_ward_fallback(landmark: &str, ward: &Ward) -> String {
    match &ward.name {
        Some(name) => format!(
            "{} is in ward number {}, {}. (A fuller answer could not be generated.)",
            landmark, ward.id, name
        ),
        None => format!(
            "{} is in ward number {}. (A fuller answer could not be generated.)",
            landmark, ward.id
        ),
    }
}
