/// Core error type for the bot.
///
/// Client operations never return this: they fold every failure into an
/// [`ApiResult`](crate::api::ApiResult) envelope. It covers construction and
/// process setup only.
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
