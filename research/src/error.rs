use crate::output::ParseError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Provider error: {0}")]
    Provider(#[from] agent::Error),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Pdf error: {0}")]
    Pdf(String),
}

pub type Result<T> = std::result::Result<T, Error>;
