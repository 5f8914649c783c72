use crate::{config, database, web};

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("web error: {0}")]
    Web(#[from] web::Error),
    #[error("store error: {0}")]
    Store(#[from] database::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
