//! Error types for the patient-records core
//!
//! All errors use thiserror for structured error handling.
//! These errors can be serialized across the command boundary.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Patient with ID {0} not found")]
    PatientNotFound(i64),

    #[error("Doctor with ID {0} not found")]
    DoctorNotFound(i64),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid image data: {0}")]
    InvalidImageData(String),

    #[error("Failed to save image: {0}")]
    ImageWriteFailed(String),

    #[error("Sync error: {0}")]
    Sync(String),

    #[error("{0}")]
    Generic(String),
}

impl AppError {
    /// True for the not-found variants of either record kind.
    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::PatientNotFound(_) | AppError::DoctorNotFound(_))
    }
}

impl serde::Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_as_display_string() {
        let err = AppError::PatientNotFound(42);
        let json = serde_json::to_string(&err).unwrap();
        assert_eq!(json, "\"Patient with ID 42 not found\"");
    }

    #[test]
    fn test_is_not_found() {
        assert!(AppError::PatientNotFound(1).is_not_found());
        assert!(AppError::DoctorNotFound(1).is_not_found());
        assert!(!AppError::Validation("name".into()).is_not_found());
    }
}
