/// Errors produced by the services.
///
/// Each variant maps onto one HTTP status in `http_server::error`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0:#}")]
    Internal(color_eyre::Report),
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }
}

impl From<color_eyre::Report> for AppError {
    fn from(err: color_eyre::Report) -> Self {
        Self::Internal(err)
    }
}

impl From<sea_orm::DbErr> for AppError {
    fn from(err: sea_orm::DbErr) -> Self {
        match err.sql_err() {
            // Lost a race against a concurrent write of the same unique key.
            Some(sea_orm::SqlErr::UniqueConstraintViolation(detail)) => {
                tracing::debug!("Unique constraint violation: {detail}");
                Self::Conflict("A record with the same unique value already exists".to_string())
            }
            _ => Self::Internal(color_eyre::Report::new(err)),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(color_eyre::Report::new(err))
    }
}

pub type AppResult<T> = Result<T, AppError>;
