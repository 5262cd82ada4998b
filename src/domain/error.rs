use thiserror::Error;

/// Failure taxonomy shared by the tabular model and both orchestrators.
///
/// Lower layers (the document store, config loading) keep their own contexts
/// and are converted into this one with `change_context`, so the original
/// cause stays visible further down the report.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SheetMergerError {
    #[error("validation failed: {details}")]
    Validation { details: String },
    #[error("conflict detected: {details}")]
    Conflict { details: String },
    #[error("remote operation failed: {operation}")]
    RemoteOperation { operation: &'static str },
}

impl SheetMergerError {
    pub fn validation<S: Into<String>>(details: S) -> Self {
        SheetMergerError::Validation {
            details: details.into(),
        }
    }

    pub fn conflict<S: Into<String>>(details: S) -> Self {
        SheetMergerError::Conflict {
            details: details.into(),
        }
    }

    pub fn remote(operation: &'static str) -> Self {
        SheetMergerError::RemoteOperation { operation }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, SheetMergerError::Validation { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, SheetMergerError::Conflict { .. })
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, SheetMergerError::RemoteOperation { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_details() {
        let error = SheetMergerError::conflict("users : id duplication [2]");
        assert_eq!(
            error.to_string(),
            "conflict detected: users : id duplication [2]"
        );
    }

    #[test]
    fn test_kind_predicates() {
        assert!(SheetMergerError::validation("x").is_validation());
        assert!(SheetMergerError::conflict("x").is_conflict());
        assert!(SheetMergerError::remote("copy_document").is_remote());
        assert!(!SheetMergerError::remote("copy_document").is_validation());
    }
}
