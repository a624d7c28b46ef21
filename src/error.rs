use std::io;


/// Faults surfaced through an execution handle or by the setup helpers.
///
/// An HTTP status >= 400 is not an error here: it resolves the handle with a
/// normal `Response` carrying that status.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The request could not be submitted (empty or malformed URL, bad verb or header).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Connect, TLS, DNS or timeout failure reported by the HTTP client.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// IO failure while writing the request body or reading the response.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// The caller cancelled the handle before it was resolved.
    #[error("request was cancelled")]
    Cancelled,

    /// The worker went away without resolving the handle.
    #[error("worker dropped the request without resolving it")]
    WorkerLost,

    /// The outcome was already taken from this handle.
    #[error("result was already taken from this handle")]
    ResultTaken,

    #[error("config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("logger error: {0}")]
    Logger(#[from] log::SetLoggerError),
}

pub type Result<T> = std::result::Result<T, Error>;
