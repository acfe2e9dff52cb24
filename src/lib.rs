//! Resbake - incremental resource baking pipeline for game assets
//!
//! This library provides functionality to:
//! - Discover resource packs from `resbake.toml` configuration
//! - Bake heterogeneous game sources (scripts, effects, images, models,
//!   maps, localized text, entity prototypes) into deterministic binary
//!   artifacts
//! - Re-run incrementally: unchanged inputs are skipped, orphaned
//!   outputs are swept, and a completed run is marked with a build hash
//! - Bake single files on demand through a `DataSource` facade

pub mod baking;
pub mod cli;
pub mod config;
pub mod vfs;
