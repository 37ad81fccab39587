/// Core error type for the bot.
///
/// Adapter crates should map their specific errors into this type so the core
/// can handle failures consistently. Repository and lookup failures have their
/// own types (`RepoError`, `LookupError`) because they are values shown to the
/// user, not faults.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;
