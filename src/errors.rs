use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("An error occurred deserializing rule definitions: {0}.")]
    Deserializing(#[source] serde_json::Error),

    #[error("Invalid condition: {0}.")]
    InvalidCondition(String),

    #[error("Invalid rule: {0}.")]
    InvalidRule(String),

    #[error("Unknown model name {0}.")]
    UnknownModel(String),

    #[error("Not authorized to {action} {target}.")]
    Unauthorized {
        performer: String,
        action: String,
        target: String,
    },
}

impl Error {
    /// HTTP-style status code for the error, if it maps to one.
    ///
    /// Only authorization denials carry a status (`401`).
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Unauthorized { .. } => Some(401),
            _ => None,
        }
    }
}
