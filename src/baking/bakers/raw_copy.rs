//! Raw copy baker: stores inputs unchanged under their own names.

use std::sync::Arc;

use crate::baking::baker::{bake_units, BakeError, Baker};
use crate::baking::context::BakingContext;
use crate::vfs::{FileCollection, FileHeader};

/// Copies every input file into the pack output verbatim. Used for packs
/// whose files the engine consumes as-is (fonts, sounds, raw data).
pub struct RawCopyBaker {
    ctx: Arc<BakingContext>,
}

impl RawCopyBaker {
    /// Baker name as referenced from pack configuration.
    pub const NAME: &'static str = "RawCopy";

    pub fn new(ctx: Arc<BakingContext>) -> Self {
        Self { ctx }
    }
}

impl Baker for RawCopyBaker {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn order(&self) -> i32 {
        0
    }

    fn bake_files(&self, files: &FileCollection, target: Option<&str>) -> Result<(), BakeError> {
        // Output path equals input path, so target resolution is a plain lookup.
        let candidates: Vec<&FileHeader> = match target {
            Some(path) => files.find(path).into_iter().collect(),
            None => files.files().iter().collect(),
        };

        let stale: Vec<&FileHeader> = candidates
            .into_iter()
            .filter(|f| self.ctx.check(&f.path, f.write_time))
            .collect();

        bake_units(&self.ctx, Self::NAME, &stale, |file| {
            let bytes = file.read().map_err(|e| format!("{}: {}", file.path, e))?;
            self.ctx
                .write_data(&file.path, &bytes)
                .map_err(|e| format!("{}: {}", file.path, e))
        })
    }
}
