//! Error taxonomy shared by every pipeline component.
//!
//! | Variant | Meaning | Retried? |
//! |---------|---------|----------|
//! | [`Error::Configuration`] | Invalid chunk/overlap/k values, dimension mismatch | never (caller bug) |
//! | [`Error::Provider`] | Embedder, index or generator failure, including timeouts | by the caller, whole request |
//! | [`Error::EmptyInput`] | Empty question or empty document | never |

/// A failure raised by a pipeline component or one of its collaborators.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("empty input: {0}")]
    EmptyInput(String),
}

impl Error {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }

    pub fn provider(msg: impl Into<String>) -> Self {
        Error::Provider(msg.into())
    }

    pub fn empty_input(msg: impl Into<String>) -> Self {
        Error::EmptyInput(msg.into())
    }

    /// Taxonomy name, stable for structured error output.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Configuration(_) => "ConfigurationError",
            Error::Provider(_) => "ProviderError",
            Error::EmptyInput(_) => "EmptyInputError",
        }
    }

    /// The human-readable message without the taxonomy prefix.
    pub fn message(&self) -> &str {
        match self {
            Error::Configuration(m) | Error::Provider(m) | Error::EmptyInput(m) => m,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
