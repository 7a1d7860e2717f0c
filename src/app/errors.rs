use crate::links::PersistenceError;

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("link not found")]
    NotFound,

    #[error("link belongs to another user")]
    Forbidden,

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("persistence error: {0}")]
    Persistence(PersistenceError),

    #[error("unexpected error: {0:?}")]
    Other(#[from] anyhow::Error),
}

impl From<PersistenceError> for AppError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::NotFound(_) => AppError::NotFound,
            err => AppError::Persistence(err),
        }
    }
}
