//! Versioned grounded-answer prompt template.
//!
//! [`render_prompt`] is a pure function of the question, the ranked
//! passages and the not-found message, so the exact text sent to the
//! generator can be tested without a model.
//!
//! Layout (version [`PROMPT_VERSION`]):
//!
//! ```text
//! <instruction preamble, naming the not-found message>
//!
//! Context:
//! [1] <passage 1, verbatim>
//!
//! [2] <passage 2, verbatim>
//!
//! Question: <question, verbatim>
//! Answer:
//! ```

use crate::models::RetrievalResult;

/// Bump whenever the rendered text changes.
pub const PROMPT_VERSION: &str = "grounded-qa/v1";

/// Default grounded-refusal message.
pub const DEFAULT_NOT_FOUND_MESSAGE: &str =
    "I could not find the answer in the provided documents.";

/// Rendered in place of passages when retrieval returned nothing.
pub const EMPTY_CONTEXT: &str = "(no context)";

/// Render the prompt for `question` grounded on `retrieval`.
///
/// Passages appear in ranking order, verbatim, numbered from 1.
///
/// ```rust
/// use ragline_core::models::{Passage, RetrievalResult};
/// use ragline_core::prompt::render_prompt;
///
/// let retrieval = RetrievalResult::new(vec![Passage::new("Fees are $100.", 0.9)]);
/// let prompt = render_prompt("What is the fee?", &retrieval, "Not found.");
/// assert!(prompt.contains("[1] Fees are $100."));
/// assert!(prompt.contains("Question: What is the fee?"));
/// ```
pub fn render_prompt(question: &str, retrieval: &RetrievalResult, not_found_message: &str) -> String {
    let mut out = String::new();

    out.push_str("You are a helpful assistant answering questions about the user's documents.\n");
    out.push_str("Use ONLY the context below to answer. Do not use outside knowledge.\n");
    out.push_str(&format!(
        "If the context does not contain the answer, reply with exactly: {}\n",
        not_found_message
    ));
    out.push_str(
        "Answer concisely in plain text. Do not use Markdown, bold text or other special formatting.\n",
    );

    out.push_str("\nContext:\n");
    if retrieval.is_empty() {
        out.push_str(EMPTY_CONTEXT);
        out.push('\n');
    } else {
        let blocks: Vec<String> = retrieval
            .iter()
            .enumerate()
            .map(|(i, p)| format!("[{}] {}", i + 1, p.text))
            .collect();
        out.push_str(&blocks.join("\n\n"));
        out.push('\n');
    }

    out.push_str(&format!("\nQuestion: {}\nAnswer:", question));
    out
}
