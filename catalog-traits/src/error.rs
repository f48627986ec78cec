use thiserror::Error;

/// Errors produced by catalog collaborators.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// The transport below the catalog client failed.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The remote library rejected the request.
    #[error("Request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The requested key does not resolve to a streamable resource.
    #[error("Not streamable: {0}")]
    NotStreamable(String),
}

pub type Result<T> = std::result::Result<T, CatalogError>;
