//! Configuration for the baking pipeline: schema types and `resbake.toml`
//! loading.

pub mod loader;
pub mod schema;

pub use loader::*;
pub use schema::*;
