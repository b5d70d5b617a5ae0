pub type StorageResult<T> = Result<T, StorageError>;

/// Coarse classification used at the API boundary to pick a stable
/// status/code/message triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    ConstraintViolation,
    PrereqStateViolation,
    StoreFault,
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Item not found: {0}")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Object not in prerequisite state: {0}")]
    PrereqStateViolation(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::NotFound(_) => ErrorKind::NotFound,
            StorageError::ConstraintViolation(_) => {
                ErrorKind::ConstraintViolation
            }
            StorageError::PrereqStateViolation(_) => {
                ErrorKind::PrereqStateViolation
            }
            StorageError::Serialization(_)
            | StorageError::Transaction(_)
            | StorageError::Backend(_) => ErrorKind::StoreFault,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    pub(crate) fn not_found(entity: &str, id: impl std::fmt::Display) -> Self {
        StorageError::NotFound(format!("{entity} {id}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn faults_share_one_kind() {
        let decode = serde_json::from_str::<u32>("nope").unwrap_err();
        assert_eq!(
            StorageError::Serialization(decode).kind(),
            ErrorKind::StoreFault
        );
        assert_eq!(
            StorageError::Backend("io".into()).kind(),
            ErrorKind::StoreFault
        );
        assert!(StorageError::not_found("user", 3).is_not_found());
        assert_eq!(
            StorageError::not_found("user", 3).to_string(),
            "Item not found: user 3"
        );
    }
}
