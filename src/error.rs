use thiserror::Error;

#[derive(Error, Debug)]
pub enum MapError {
    #[error("an equal live key is already mapped")]
    DuplicateKey,

    #[error("key not found")]
    KeyNotFound,

    #[error("reaper thread error: {0}")]
    Reaper(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, MapError>;
