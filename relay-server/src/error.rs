//! Session-level errors: everything the dispatcher can reject a verb for
//! that isn't a catalog/generator problem (those live in
//! [`bingo_core::CoreError`]). The dispatcher maps each variant onto a wire
//! response verb rather than ever tearing down the connection.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("malformed request: {0}")]
    Malformed(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("not authenticated")]
    NoAuth,

    #[error("user has no team")]
    NoTeam,

    #[error("mark rejected by board rules")]
    NoMark,

    #[error(transparent)]
    Core(#[from] bingo_core::CoreError),
}
