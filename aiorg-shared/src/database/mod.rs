//! Domain entities and the embedded migration set.

pub mod migrator;
pub mod models;

pub use models::*;
