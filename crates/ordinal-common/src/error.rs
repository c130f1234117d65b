use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("ledger error: {0}")]
    Ledger(String),

    #[error("migration {id} failed: {message}")]
    Execution { id: u64, message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn execution(id: u64, message: impl Into<String>) -> Self {
        Self::Execution {
            id,
            message: message.into(),
        }
    }

    /// Whether the failure came from bad configuration rather than the database.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}
