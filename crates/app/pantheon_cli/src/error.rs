use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO::{:?}: {}", .0, .0)]
    Io(#[from] std::io::Error),

    #[error("Json: {}", .0)]
    Json(#[from] serde_json::Error),

    #[error("Logging: {}", .0)]
    Logging(String),

    #[error("Catalog: {}", .0)]
    Registry(#[from] pantheon_mcp::RegistryError),

    #[error(transparent)]
    Server(#[from] pantheon_mcp::ServerError),
}
