//! Grounded answer synthesis.
//!
//! Renders the prompt and always calls the generator, even with an empty
//! retrieval, so the "no answer" case is produced by the model following
//! the grounding instruction and comes back in one consistent format.
//! When the generation opens with the not-found message, the answer text
//! is normalised to exactly that message. A real answer that merely quotes
//! the message later on is kept as is.

use crate::error::{Error, Result};
use crate::generate::Generator;
use crate::models::{Answer, RetrievalResult};
use crate::prompt::render_prompt;

pub struct Synthesizer<'a> {
    generator: &'a dyn Generator,
    not_found_message: &'a str,
}

impl<'a> Synthesizer<'a> {
    pub fn new(generator: &'a dyn Generator, not_found_message: &'a str) -> Self {
        Self {
            generator,
            not_found_message,
        }
    }

    /// Produce an [`Answer`] for `question` grounded on `retrieval`.
    ///
    /// # Errors
    ///
    /// - [`Error::EmptyInput`] if `question` is blank.
    /// - [`Error::Provider`] if generation fails or returns no text.
    pub async fn synthesize(&self, question: &str, retrieval: RetrievalResult) -> Result<Answer> {
        if question.trim().is_empty() {
            return Err(Error::empty_input("question is empty"));
        }

        let prompt = render_prompt(question, &retrieval, self.not_found_message);
        let generated = self.generator.generate(&prompt).await?;
        let generated = generated.trim();
        if generated.is_empty() {
            return Err(Error::provider(format!(
                "generator '{}' returned an empty response",
                self.generator.model_name()
            )));
        }

        if is_not_found(generated, self.not_found_message) {
            return Ok(Answer {
                text: self.not_found_message.to_string(),
                found: false,
                retrieval,
            });
        }

        Ok(Answer {
            text: generated.to_string(),
            found: true,
            retrieval,
        })
    }
}

/// Whether `generated` is (or starts with) the not-found message, ignoring
/// case and whitespace differences.
pub fn is_not_found(generated: &str, not_found_message: &str) -> bool {
    let needle = normalize(not_found_message);
    !needle.is_empty() && normalize(generated).starts_with(&needle)
}

fn normalize(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
