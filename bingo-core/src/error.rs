//! Typed error taxonomy for the catalog/generator/board layer.
//!
//! Session-level errors (unknown room, unauthenticated socket, …) live in
//! `relay-server` as `DispatchError`; this module only covers the errors that
//! can arise while parsing a catalog or sampling a generator.

use thiserror::Error;

/// Errors arising from catalog parsing or goal sampling.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A catalog referenced an id (usually in `exclusions`) that does not
    /// resolve within the same catalog.
    #[error("catalog {game:?} is invalid: {reason}")]
    InvalidCatalog { game: String, reason: String },

    /// A generator was asked for more goals than its variant could produce
    /// without reusing or violating an exclusion.
    #[error("generator {generator:?} exhausted its pool after {drawn} of {requested} goals")]
    Exhausted {
        generator: String,
        drawn: usize,
        requested: usize,
    },

    /// A referenced game or generator name is absent from the loaded catalogs.
    #[error("unknown game or generator: {0}")]
    UnknownGeneratorOrGame(String),

    /// A referenced board variant name is absent from the board registry.
    #[error("unknown board variant: {0}")]
    UnknownBoard(String),
}
