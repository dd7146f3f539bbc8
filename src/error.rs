use thiserror::Error;

pub type Result<T> = std::result::Result<T, RegistryError>;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Email already registered: {0}")]
    DuplicateEmail(String),
    #[error("Student not found: {0}")]
    StudentNotFound(String),
    #[error("Course not found: {0}")]
    CourseNotFound(i64),
    #[error("Student {student} is already enrolled in course {course}")]
    AlreadyEnrolled { student: i64, course: i64 },
    #[error("Student {student} is not enrolled in course {course}")]
    NotEnrolled { student: i64, course: i64 },
    #[error("Payment failed: {0}")]
    PaymentFailed(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Internal error: {0}")]
    InternalError(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl RegistryError {
    /// Wraps any storage or serialization failure.
    pub fn internal<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::InternalError(err.into())
    }
}

impl From<csv::Error> for RegistryError {
    fn from(err: csv::Error) -> Self {
        Self::ValidationError(format!("CSV error: {}", err))
    }
}

impl From<std::io::Error> for RegistryError {
    fn from(err: std::io::Error) -> Self {
        Self::InternalError(Box::new(err))
    }
}

#[cfg(feature = "storage-sqlite")]
impl From<sqlx::Error> for RegistryError {
    fn from(err: sqlx::Error) -> Self {
        Self::InternalError(Box::new(err))
    }
}
