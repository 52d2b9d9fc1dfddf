use std::io;

/// Why an uploaded session could not be turned into a [`crate::SessionRecord`].
#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    #[error("session data is empty")]
    Empty,

    #[error("unrecognized session format")]
    UnknownFormat,

    #[error("invalid session database: {0}")]
    Database(String),

    #[error("session database has no sessions table")]
    MissingTable,

    #[error("session database contains no sessions")]
    NoRows,

    #[error("required field {0} is missing")]
    MissingField(&'static str),

    #[error("invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl DecodeError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        DecodeError::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}

impl From<rusqlite::Error> for DecodeError {
    fn from(err: rusqlite::Error) -> Self {
        DecodeError::Database(err.to_string())
    }
}
