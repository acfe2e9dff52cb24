//! Shared per-pack baking context.
//!
//! One [`BakingContext`] is allocated per resource pack per baking run and
//! handed to every baker of that pack behind an `Arc`. It carries the two
//! closures that connect a baker to the orchestrator - the staleness
//! checker and the write sink - plus the read-only view of already-baked
//! lower-order artifacts.

use std::io;
use std::sync::{Arc, RwLock};

use crate::config::BakeSettings;
use crate::vfs::{FileCollection, FileSystem};

/// Staleness predicate: "is this candidate output stale or missing".
///
/// Must be consulted for every potential output of every candidate input,
/// unconditionally, before a baker decides to skip - the closure records
/// each asked-about path, and orphan deletion depends on the record being
/// complete.
pub type BakeChecker = dyn Fn(&str, u64) -> bool + Send + Sync;

/// Write sink: persists one output blob under the pack's output root.
pub type WriteData = dyn Fn(&str, &[u8]) -> io::Result<()> + Send + Sync;

/// Immutable shared configuration for one pack's bakers.
pub struct BakingContext {
    /// Frozen process-wide settings
    pub settings: Arc<BakeSettings>,
    /// Name of the pack being baked
    pub pack_name: String,
    /// View of all packs' lower-order outputs; `None` when the baker set
    /// has no cross-pack dependency need
    pub baked_files: Option<Arc<RwLock<FileSystem>>>,
    /// Force sequential per-file baking
    pub force_sync: bool,
    bake_checker: Box<BakeChecker>,
    write_data: Box<WriteData>,
}

impl BakingContext {
    /// Build a context. The checker and writer are bound to one pack's
    /// output directory by the orchestrator.
    pub fn new(
        settings: Arc<BakeSettings>,
        pack_name: impl Into<String>,
        bake_checker: Box<BakeChecker>,
        write_data: Box<WriteData>,
        baked_files: Option<Arc<RwLock<FileSystem>>>,
        force_sync: bool,
    ) -> Arc<Self> {
        Arc::new(Self {
            settings,
            pack_name: pack_name.into(),
            baked_files,
            force_sync,
            bake_checker,
            write_data,
        })
    }

    /// Ask whether the candidate output at `path` derived from an input
    /// with the given write time needs (re)baking.
    pub fn check(&self, path: &str, write_time: u64) -> bool {
        (self.bake_checker)(path, write_time)
    }

    /// Persist one output blob.
    pub fn write_data(&self, path: &str, bytes: &[u8]) -> io::Result<()> {
        (self.write_data)(path, bytes)
    }

    /// Snapshot of the baked-files view, when one is attached.
    pub fn baked_snapshot(&self) -> io::Result<Option<FileCollection>> {
        match &self.baked_files {
            Some(fs) => {
                let guard = fs.read().map_err(|_| {
                    io::Error::other("baked files lock poisoned")
                })?;
                Ok(Some(guard.get_files()?))
            }
            None => Ok(None),
        }
    }
}
