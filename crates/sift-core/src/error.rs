use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Mapping unavailable: {0}")]
    Mapping(String),
}

pub type Result<T> = std::result::Result<T, Error>;
