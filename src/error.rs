use thiserror::Error;

#[derive(Error, Debug)]
pub enum FixerError {
    #[error("configuration error: {0}")]
    Config(#[from] anyhow::Error),

    #[error("association override layer is already enabled in this process")]
    AlreadyEnabled,
}

pub type Result<T> = std::result::Result<T, FixerError>;
