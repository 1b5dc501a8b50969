use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<StoreError> for podium_core::PodiumError {
    fn from(e: StoreError) -> Self {
        podium_core::PodiumError::Unavailable(e.to_string())
    }
}
