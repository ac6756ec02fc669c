//! Core domain logic: goal catalogs, generators, board variants, and rooms.
//!
//! This crate is transport-agnostic — it knows nothing about WebSockets or
//! axum. `relay-server` drives it: loading catalogs into [`generator`]s,
//! handing board creation off to [`board::create_board`], and wrapping the
//! result in a [`room::Room`] that it registers in its own connection
//! registry.

pub mod board;
pub mod catalog;
pub mod error;
pub mod generator;
pub mod rng;
pub mod room;

pub use catalog::{Catalog, Goal};
pub use error::CoreError;
pub use generator::{FixedGenerator, Generator, GeneratorKind};
pub use room::Room;
