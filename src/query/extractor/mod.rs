#[cfg(test)]
mod tests;

use tracing::debug;

use crate::config::Config;
use crate::llm::{ChatClient, ChatOptions};
use crate::{Result, WardError};

const NO_LANDMARK: &str = "NONE";

/// Pulls the single landmark name out of a question with the chat model
#[derive(Debug, Clone)]
pub struct EntityExtractor {
    chat: ChatClient,
    options: ChatOptions,
}

impl EntityExtractor {
    #[inline]
    pub fn new(chat: ChatClient, config: &Config) -> Self {
        Self {
            chat,
            options: ChatOptions {
                temperature: 0.0,
                max_tokens: config.llm.extraction_max_tokens,
            },
        }
    }

    #[inline]
    pub fn prompt(question: &str) -> String {
        format!(
            "Identify the geographical landmark in the question below.\n\
             Reply with only the landmark's full name: no explanation, no quotes, no extra words.\n\
             If the question names no landmark, reply with {}.\n\
             \n\
             Question: \"{}\"\n\
             \n\
             Landmark name:",
            NO_LANDMARK, question
        )
    }

    #[inline]
    pub fn extract(&self, question: &str) -> Result<String> {
        let question = question.trim();
        if question.is_empty() {
            return Err(WardError::ExtractionFailed("the question is empty".to_string()));
        }

        let reply = self
            .chat
            .complete(&Self::prompt(question), self.options)
            .map_err(|e| WardError::ExtractionFailed(format!("model call failed: {}", e)))?;

        let landmark = clean_reply(&reply);
        debug!("Extracted landmark '{}' from reply '{}'", landmark, reply);

        if landmark.is_empty() {
            return Err(WardError::ExtractionFailed(
                "the model returned no landmark".to_string(),
            ));
        }
        if landmark.eq_ignore_ascii_case(NO_LANDMARK) {
            return Err(WardError::ExtractionFailed(
                "the question does not name a landmark".to_string(),
            ));
        }
        if normalise(&landmark) == normalise(question) {
            return Err(WardError::ExtractionFailed(
                "the model echoed the question instead of naming a landmark".to_string(),
            ));
        }

        Ok(landmark)
    }
}

/// First non-empty line, without a label, quotes or trailing punctuation
fn clean_reply(reply: &str) -> String {
    let line = reply
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default();

    let line = strip_label(line);

    line.trim_matches(|c: char| matches!(c, '"' | '\'' | '`' | '“' | '”' | '‘' | '’' | '*'))
        .trim_end_matches(|c: char| matches!(c, '.' | ',' | ';' | ':' | '!' | '?'))
        .trim_matches(|c: char| matches!(c, '"' | '\'' | '`' | '“' | '”' | '‘' | '’' | '*'))
        .trim()
        .to_string()
}

fn strip_label(line: &str) -> &str {
    for label in ["landmark name:", "landmark:"] {
        if line.len() >= label.len()
            && line.is_char_boundary(label.len())
            && line[..label.len()].eq_ignore_ascii_case(label)
        {
            return line[label.len()..].trim();
        }
    }
    line
}

fn normalise(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}
