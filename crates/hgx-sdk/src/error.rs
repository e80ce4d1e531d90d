use thiserror::Error;

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("gao error: {0}")]
    Gao(#[from] hgx_gao::GaoError),

    #[error("persistence error: {0}")]
    Persistence(#[from] hgx_persistence::PersistenceError),

    #[error("golix error: {0}")]
    Golix(#[from] hgx_golix::GolixError),

    #[error("store error: {0}")]
    Store(#[from] hgx_store::StoreError),

    #[error("secret error: {0}")]
    Privateer(#[from] hgx_privateer::PrivateerError),
}

pub type SdkResult<T> = Result<T, SdkError>;
