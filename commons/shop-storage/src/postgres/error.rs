use crate::error::StorageError;

// SQLSTATE classes, see the Postgres "Error Codes" appendix.
const CASE_NOT_FOUND_CLASS: &str = "20";
const INTEGRITY_CONSTRAINT_CLASS: &str = "23";
const PREREQUISITE_STATE_CLASS: &str = "55";

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => StorageError::NotFound("no matching row".into()),
            sqlx::Error::Database(db) => {
                let code = db.code().map(|c| c.into_owned()).unwrap_or_default();
                if code.starts_with(CASE_NOT_FOUND_CLASS) {
                    StorageError::NotFound(db.message().to_string())
                } else if code.starts_with(INTEGRITY_CONSTRAINT_CLASS) {
                    StorageError::ConstraintViolation(db.message().to_string())
                } else if code.starts_with(PREREQUISITE_STATE_CLASS) {
                    StorageError::PrereqStateViolation(db.message().to_string())
                } else {
                    StorageError::Backend(err.to_string())
                }
            }
            _ => StorageError::Backend(err.to_string()),
        }
    }
}

impl From<shop_models::ParseEnumError> for StorageError {
    fn from(err: shop_models::ParseEnumError) -> Self {
        StorageError::Backend(format!("corrupt row: {err}"))
    }
}
