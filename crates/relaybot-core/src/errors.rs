/// Core error type.
///
/// Adapter crates map their specific errors into this type so the command
/// layer can answer users consistently. Business-rule rejections of a
/// redemption are not errors; see [`crate::redeem::RedeemOutcome`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;
