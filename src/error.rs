use thiserror::Error;

use crate::scene::SceneError;

/// Errors that abort an import.
#[derive(Error, Debug)]
pub enum ImportError {
    /// Reading the source failed. When it happens at open time no scene mutation has occurred yet.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The text isn't a well-formed `.bvh` file.
    #[error("Format error at line {line}: {message}")]
    Format { line: usize, message: String },

    /// A frame handed over without its source line has the wrong number of values.
    #[error("Format error: frame has {found} values for {expected} channels")]
    FrameLength { expected: usize, found: usize },

    /// The host refused to create or mutate a node. Never retried.
    #[error("Scene binding error: {0}")]
    SceneBinding(#[from] SceneError),

    #[error("Invalid import configuration: {0}")]
    Config(String),
}

impl ImportError {
    pub(crate) fn format(line: usize, message: impl Into<String>) -> Self {
        ImportError::Format {
            line,
            message: message.into(),
        }
    }

    pub fn is_format(&self) -> bool {
        matches!(
            self,
            ImportError::Format { .. } | ImportError::FrameLength { .. }
        )
    }
}

/// Result type for import operations.
pub type ImportResult<T> = Result<T, ImportError>;
