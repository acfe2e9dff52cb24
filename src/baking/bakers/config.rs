//! Engine config baker: normalizes `.cfg` files.
//!
//! Config sources are TOML; baking re-serializes them through the parser
//! so the runtime never sees comments, odd whitespace or duplicate-free
//! variations of the same document.

use std::sync::Arc;

use crate::baking::baker::{bake_units, BakeError, Baker};
use crate::baking::context::BakingContext;
use crate::vfs::{FileCollection, FileHeader};

/// Normalizes engine configuration files.
pub struct ConfigBaker {
    ctx: Arc<BakingContext>,
}

impl ConfigBaker {
    /// Baker name as referenced from pack configuration.
    pub const NAME: &'static str = "Config";

    pub fn new(ctx: Arc<BakingContext>) -> Self {
        Self { ctx }
    }

    fn bake_one(&self, file: &FileHeader) -> Result<(), String> {
        let text = std::fs::read_to_string(&file.full_path)
            .map_err(|e| format!("{}: {}", file.path, e))?;

        let value: toml::Value =
            toml::from_str(&text).map_err(|e| format!("{}: {}", file.path, e))?;
        let normalized =
            toml::to_string(&value).map_err(|e| format!("{}: {}", file.path, e))?;

        self.ctx
            .write_data(&file.path, normalized.as_bytes())
            .map_err(|e| format!("{}: {}", file.path, e))
    }
}

impl Baker for ConfigBaker {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn order(&self) -> i32 {
        0
    }

    fn bake_files(&self, files: &FileCollection, target: Option<&str>) -> Result<(), BakeError> {
        let candidates: Vec<&FileHeader> = match target {
            Some(path) => files
                .find(path)
                .filter(|f| f.extension() == "cfg")
                .into_iter()
                .collect(),
            None => files.with_extensions(&["cfg"]).collect(),
        };

        let stale: Vec<&FileHeader> = candidates
            .into_iter()
            .filter(|f| self.ctx.check(&f.path, f.write_time))
            .collect();

        bake_units(&self.ctx, Self::NAME, &stale, |file| self.bake_one(file))
    }
}
