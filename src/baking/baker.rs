//! The baker contract and the factory that instantiates bakers by name.
//!
//! A baker encapsulates one artifact family's transformation from a
//! read-only file collection to zero or more named output blobs. Bakers
//! are created fresh per pack per run and scheduled by their integer
//! order: the orchestrator iterates increasing order values and runs
//! whichever bakers match, so a baker that reads another baker's output
//! must declare a strictly higher order.

use std::io;
use std::path::Path;
use std::sync::Arc;

use log::{error, warn};
use rayon::prelude::*;
use thiserror::Error;

use crate::baking::bakers::{
    ConfigBaker, EffectBaker, ImageBaker, MapBaker, MetadataBaker, ModelBaker, ProtoBaker,
    ProtoTextBaker, RawCopyBaker, ScriptBaker, TextBaker,
};
use crate::baking::context::BakingContext;
use crate::vfs::FileCollection;

/// Error from a baking operation.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BakeError {
    /// One or more files in a batch failed; siblings were still processed
    #[error("{failed} of {total} files failed in {baker} baker")]
    Aggregate {
        /// Baker that produced the failures
        baker: &'static str,
        /// Number of failed units
        failed: usize,
        /// Number of attempted units
        total: usize,
    },
    /// Pack preparation failed before any baking started
    #[error("Pack preparation failed:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    Prepare(Vec<String>),
    /// Baking failed across one or more packs
    #[error("Baking failed:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    Packs(Vec<String>),
    /// IO error outside any single file's bake
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// A unit of transformation from raw source assets to one artifact family.
pub trait Baker: Send + Sync {
    /// Stable identifier matched against `ResourcePackInfo::bakers`.
    fn name(&self) -> &'static str;

    /// Scheduling priority; lower runs first. Values need not be
    /// contiguous.
    fn order(&self) -> i32;

    /// Bake relevant files from the collection.
    ///
    /// With `target == None`, every relevant input is considered and
    /// stale ones are baked in parallel. With `target == Some(path)`,
    /// only the source that would produce that one output path is baked;
    /// no matching input is a no-op.
    fn bake_files(&self, files: &FileCollection, target: Option<&str>) -> Result<(), BakeError>;
}

/// Instantiate the bakers a pack asked for, bound to its context.
///
/// Unknown names are logged and skipped; config validation rejects them
/// up front, so hitting one here means the settings were built by hand.
pub fn setup_bakers(names: &[String], ctx: &Arc<BakingContext>) -> Vec<Box<dyn Baker>> {
    let mut bakers: Vec<Box<dyn Baker>> = Vec::with_capacity(names.len());

    for name in names {
        match name.as_str() {
            "RawCopy" => bakers.push(Box::new(RawCopyBaker::new(Arc::clone(ctx)))),
            "Config" => bakers.push(Box::new(ConfigBaker::new(Arc::clone(ctx)))),
            "Image" => bakers.push(Box::new(ImageBaker::new(Arc::clone(ctx)))),
            "Effect" => bakers.push(Box::new(EffectBaker::new(Arc::clone(ctx)))),
            "Model" => bakers.push(Box::new(ModelBaker::new(Arc::clone(ctx)))),
            "Metadata" => bakers.push(Box::new(MetadataBaker::new(Arc::clone(ctx)))),
            "Proto" => bakers.push(Box::new(ProtoBaker::new(Arc::clone(ctx)))),
            "Text" => bakers.push(Box::new(TextBaker::new(Arc::clone(ctx)))),
            "ProtoText" => bakers.push(Box::new(ProtoTextBaker::new(Arc::clone(ctx)))),
            "Map" => bakers.push(Box::new(MapBaker::new(Arc::clone(ctx)))),
            "Script" => bakers.push(Box::new(ScriptBaker::new(Arc::clone(ctx)))),
            other => warn!("Unknown baker '{}' requested, skipping", other),
        }
    }

    bakers
}

/// Drive a batch of independent bake units, in parallel unless the
/// context forces sequential execution.
///
/// A failing unit never aborts its siblings: every failure is logged
/// with its own context and the call returns one aggregate error after
/// all units have finished.
pub fn bake_units<T, F>(
    ctx: &BakingContext,
    baker: &'static str,
    units: &[T],
    bake_one: F,
) -> Result<(), BakeError>
where
    T: Sync,
    F: Fn(&T) -> Result<(), String> + Send + Sync,
{
    if units.is_empty() {
        return Ok(());
    }

    let failures: Vec<String> = if ctx.force_sync || ctx.settings.single_thread {
        units.iter().filter_map(|unit| bake_one(unit).err()).collect()
    } else {
        units.par_iter().filter_map(|unit| bake_one(unit).err()).collect()
    };

    if failures.is_empty() {
        return Ok(());
    }

    for failure in &failures {
        error!("[{}] {}: {}", ctx.pack_name, baker, failure);
    }

    Err(BakeError::Aggregate { baker, failed: failures.len(), total: units.len() })
}

/// Strip the extension from a relative path, keeping directories.
pub fn strip_extension(path: &str) -> String {
    let p = Path::new(path);
    match p.extension() {
        Some(_) => p.with_extension("").to_string_lossy().replace('\\', "/"),
        None => path.to_string(),
    }
}

/// Replace (or add) the extension of a relative path.
pub fn replace_extension(path: &str, ext: &str) -> String {
    Path::new(path).with_extension(ext).to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BakeSettings;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn test_context() -> Arc<BakingContext> {
        BakingContext::new(
            Arc::new(BakeSettings::default()),
            "Test",
            Box::new(|_, _| true),
            Box::new(|_, _| Ok(())),
            None,
            false,
        )
    }

    #[test]
    fn test_strip_extension() {
        assert_eq!(strip_extension("a/b/c.png"), "a/b/c");
        assert_eq!(strip_extension("noext"), "noext");
        assert_eq!(strip_extension("pack.meta-server"), "pack");
    }

    #[test]
    fn test_replace_extension() {
        assert_eq!(replace_extension("art/tile.tga", "png"), "art/tile.png");
        assert_eq!(replace_extension("model.obj", "mdlb"), "model.mdlb");
    }

    #[test]
    fn test_setup_bakers_known_names() {
        let ctx = test_context();
        let bakers = setup_bakers(
            &["RawCopy".to_string(), "Metadata".to_string(), "Script".to_string()],
            &ctx,
        );

        assert_eq!(bakers.len(), 3);
        assert_eq!(bakers[0].name(), "RawCopy");
        assert_eq!(bakers[1].name(), "Metadata");
        assert_eq!(bakers[2].name(), "Script");
        // Script depends on Metadata output, so it must be strictly later
        assert!(bakers[2].order() > bakers[1].order());
    }

    #[test]
    fn test_setup_bakers_unknown_skipped() {
        let ctx = test_context();
        let bakers = setup_bakers(&["Bogus".to_string(), "RawCopy".to_string()], &ctx);
        assert_eq!(bakers.len(), 1);
    }

    #[test]
    fn test_bake_units_all_succeed() {
        let ctx = test_context();
        let counter = AtomicUsize::new(0);

        let units = vec![1, 2, 3];
        bake_units(&ctx, "Test", &units, |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_bake_units_failures_do_not_abort_siblings() {
        let ctx = test_context();
        let processed = AtomicUsize::new(0);

        let units = vec![1, 2, 3, 4];
        let err = bake_units(&ctx, "Test", &units, |unit| {
            processed.fetch_add(1, Ordering::SeqCst);
            if *unit % 2 == 0 {
                Err(format!("unit {} broke", unit))
            } else {
                Ok(())
            }
        })
        .unwrap_err();

        assert_eq!(processed.load(Ordering::SeqCst), 4);
        match err {
            BakeError::Aggregate { failed, total, .. } => {
                assert_eq!(failed, 2);
                assert_eq!(total, 4);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_bake_units_empty_is_ok() {
        let ctx = test_context();
        let units: Vec<u32> = vec![];
        assert!(bake_units(&ctx, "Test", &units, |_| Ok(())).is_ok());
    }
}
