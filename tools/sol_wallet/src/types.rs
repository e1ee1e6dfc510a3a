use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("invalid base58 character: {0:?}")]
    InvalidBase58Character(char),
    #[error("decoded address must be 32 bytes, got {0}")]
    InvalidAddressLength(usize),
    #[error("secret key must be 64 bytes, got {0}")]
    InvalidSecretKeyLength(usize),
    #[error("transfer amount must be greater than zero")]
    InvalidTransferAmount,
}

#[derive(Debug, Error)]
pub enum SolWalletError {
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("rpc {method} failed on {endpoint}: {details}")]
    Rpc {
        endpoint: String,
        method: &'static str,
        details: String,
    },
    #[error("no rpc endpoint answered the liveness probe ({tried} tried)")]
    NoLiveEndpoint { tried: usize },
}

pub type Result<T> = std::result::Result<T, SolWalletError>;
