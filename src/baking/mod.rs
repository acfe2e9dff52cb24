//! Resource baking pipeline.
//!
//! Transforms raw game assets into the artifact set the engine loads at
//! runtime. The pipeline is incremental and deterministic: re-running
//! over unchanged inputs produces byte-identical artifacts and bakes
//! nothing.
//!
//! # Overview
//!
//! - [`MasterBaker`](master::MasterBaker) runs the full offline pass:
//!   pack discovery, per-order scheduling, orphan collection, completion
//!   marker.
//! - [`BakerDataSource`](data_source::BakerDataSource) bakes single files
//!   on demand for iterative-editing flows.
//! - [`Baker`](baker::Baker) is the contract each artifact family
//!   implements; [`BakingContext`](context::BakingContext) is what binds
//!   a baker to one pack's staleness checker and write sink.

pub mod baker;
pub mod bakers;
pub mod context;
pub mod data_source;
pub mod master;
pub mod validation;

pub use baker::{setup_bakers, BakeError, Baker};
pub use context::BakingContext;
pub use data_source::BakerDataSource;
pub use master::MasterBaker;
