// Library exports for chirp-core
// The chirp binary drives these modules; tests use them directly

pub mod collect;
pub mod config;
pub mod db;
pub mod error;
pub mod flatten;
pub mod loader;
pub mod normalize;
pub mod pipeline;
pub mod query;

pub use error::{EtlError, EtlResult};
