use thiserror::Error;

#[derive(Error, Debug)]
pub enum WordsError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Corrupt project data: {0}")]
    Corrupt(String),

    #[error("Invalid move: {0}")]
    InvalidMove(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("removed {removed} node(s) but {failed} could not be removed ({first_failure})")]
    PartialDelete {
        removed: usize,
        failed: usize,
        first_failure: String,
    },
}

/// The four failure classes callers react to, plus rejected input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Corrupt,
    InvalidMove,
    Storage,
    InvalidInput,
}

impl WordsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WordsError::NotFound(_) => ErrorKind::NotFound,
            WordsError::Corrupt(_) => ErrorKind::Corrupt,
            WordsError::InvalidMove(_) => ErrorKind::InvalidMove,
            WordsError::Storage(_)
            | WordsError::Io(_)
            | WordsError::Serialization(_)
            | WordsError::PartialDelete { .. } => ErrorKind::Storage,
            WordsError::InvalidInput(_) => ErrorKind::InvalidInput,
        }
    }
}

/// Formats a failure the way it is shown to the user: the action being
/// attempted followed by the cause, e.g. `Error deleting a file/folder: ...`.
pub fn describe_failure(action: &str, err: &WordsError) -> String {
    format!("Error {}: {}", action, err)
}

pub type Result<T> = std::result::Result<T, WordsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_and_partial_delete_are_storage_failures() {
        let io = WordsError::Io(std::io::Error::other("disk full"));
        assert_eq!(io.kind(), ErrorKind::Storage);

        let partial = WordsError::PartialDelete {
            removed: 2,
            failed: 1,
            first_failure: "nope".into(),
        };
        assert_eq!(partial.kind(), ErrorKind::Storage);
    }

    #[test]
    fn describe_failure_names_the_action() {
        let err = WordsError::NotFound("node 7".into());
        assert_eq!(
            describe_failure("deleting a file/folder", &err),
            "Error deleting a file/folder: Not found: node 7"
        );
    }
}
