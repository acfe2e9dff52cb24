//! Top-level baking orchestrator.
//!
//! [`MasterBaker`] drives one full offline pass: it prepares every
//! configured resource pack in parallel, then walks the global bake
//! order, running each pack's matching bakers as one task per pack per
//! order value. All bakers at order N - across every pack - complete
//! before any baker at order N+1 starts, which is what lets a
//! higher-order baker read a lower-order baker's freshly written output
//! through the shared `baking_output` view. The pass finishes with an
//! orphan sweep of the output tree and the build-hash marker.
//!
//! # How It Works
//!
//! 1. Drop the stale marker; on force, drop the whole output tree
//! 2. Prepare packs concurrently (mount inputs, snapshot, build bakers)
//! 3. Iterate orders from the sentinel upward, one task per live pack
//! 4. Mount newly baked pack outputs for later orders; propagate the
//!    force flag forward when anything baked
//! 5. Delete output files no checker call accounted for
//! 6. Write the build-hash marker

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant, SystemTime};

use log::{debug, error, info};

use crate::baking::baker::{setup_bakers, strip_extension, BakeError, Baker};
use crate::baking::context::BakingContext;
use crate::config::{BakeSettings, ResourcePackInfo};
use crate::vfs::{normalize_path, write_time_of, FileCollection, FileSystem};

/// Marker file signaling a fully completed bake run.
pub const BUILD_HASH_MARKER: &str = "Resources.build-hash";

/// First order value the bake loop visits. Negative so bakers that must
/// precede the default order 0 have room.
const ORDER_SENTINEL: i32 = -10;

/// Per-pack outcome of a completed run.
#[derive(Debug, Clone)]
pub struct PackStats {
    /// Pack name
    pub name: String,
    /// Files written (or refreshed) this run
    pub baked_files: usize,
    /// Wall time from prepare to completion
    pub duration: Duration,
}

/// Outcome of a completed [`MasterBaker::run`].
#[derive(Debug, Clone, Default)]
pub struct BakeStats {
    /// Per-pack outcomes, in completion order
    pub packs: Vec<PackStats>,
    /// Orphaned output files deleted by the final sweep
    pub orphans_removed: usize,
    /// Total wall time
    pub total_duration: Duration,
}

impl BakeStats {
    /// Total files baked across all packs.
    pub fn total_baked(&self) -> usize {
        self.packs.iter().map(|p| p.baked_files).sum()
    }
}

/// Run-scoped state of one resource pack.
struct PackBakeContext {
    info: ResourcePackInfo,
    output_dir: PathBuf,
    input_files: FileCollection,
    bakers: Vec<Box<dyn Baker>>,
    /// Highest order among this pack's bakers; `None` for an empty set
    max_order: Option<i32>,
    baked_count: Arc<AtomicUsize>,
    /// Every output path the checker was asked about, rewritten or not
    baked_paths: Arc<Mutex<HashSet<String>>>,
    first_bake: bool,
    output_mounted: bool,
    started: Instant,
    done: bool,
}

/// Top-level orchestrator over all configured resource packs.
pub struct MasterBaker {
    settings: Arc<BakeSettings>,
}

impl MasterBaker {
    pub fn new(settings: Arc<BakeSettings>) -> Self {
        Self { settings }
    }

    /// Run a full bake, reporting the outcome as a boolean.
    ///
    /// This is the outermost tool-invocation boundary: every error is
    /// logged here and converted to `false`, never propagated.
    pub fn bake_all(&self) -> bool {
        match self.run() {
            Ok(stats) => {
                info!(
                    "Baking finished: {} files across {} packs in {:.2?}",
                    stats.total_baked(),
                    stats.packs.len(),
                    stats.total_duration
                );
                true
            }
            Err(e) => {
                error!("Baking failed: {}", e);
                false
            }
        }
    }

    /// Run a full bake, propagating errors. [`bake_all`](Self::bake_all)
    /// is this plus the report-don't-propagate policy.
    pub fn run(&self) -> Result<BakeStats, BakeError> {
        let started = Instant::now();
        let output_root = self.settings.output.clone();

        // A present marker means "last bake completed"; it must vanish
        // first so an aborted run is distinguishable.
        let marker = output_root.join(BUILD_HASH_MARKER);
        if marker.exists() {
            fs::remove_file(&marker)?;
        }

        let force = Arc::new(AtomicBool::new(false));
        if self.settings.force_baking {
            if output_root.exists() {
                fs::remove_dir_all(&output_root)?;
            }
            force.store(true, Ordering::SeqCst);
        }
        fs::create_dir_all(&output_root)?;

        let baking_output = Arc::new(RwLock::new(FileSystem::new()));
        let mut packs = self.prepare_packs(&output_root, &baking_output, &force)?;

        let mut stats = BakeStats::default();
        self.bake_loop(&mut packs, &baking_output, &force, &mut stats)?;

        stats.orphans_removed = self.remove_orphans(&output_root, &packs)?;

        fs::write(&marker, self.settings.build_hash.as_bytes())?;

        stats.total_duration = started.elapsed();
        Ok(stats)
    }

    /// Mount inputs and instantiate bakers for every selected pack, one
    /// task per pack. All failures are aggregated before any baking
    /// starts.
    fn prepare_packs(
        &self,
        output_root: &Path,
        baking_output: &Arc<RwLock<FileSystem>>,
        force: &Arc<AtomicBool>,
    ) -> Result<Vec<PackBakeContext>, BakeError> {
        let selected: Vec<&ResourcePackInfo> = self
            .settings
            .packs
            .iter()
            .filter(|pack| {
                let included = self.settings.target.includes(pack.side());
                if !included {
                    debug!("Pack '{}' skipped for target {:?}", pack.name, self.settings.target);
                }
                included
            })
            .collect();

        let prepare = |info: &ResourcePackInfo| {
            prepare_pack(&self.settings, info, output_root, baking_output, force)
        };
        let prepare = &prepare;

        let results: Vec<Result<PackBakeContext, String>> = if self.settings.single_thread {
            selected.iter().map(|info| prepare(info)).collect()
        } else {
            std::thread::scope(|scope| {
                let handles: Vec<_> =
                    selected.iter().map(|info| scope.spawn(move || prepare(info))).collect();
                handles
                    .into_iter()
                    .map(|handle| {
                        handle
                            .join()
                            .unwrap_or_else(|_| Err("pack preparation task panicked".to_string()))
                    })
                    .collect()
            })
        };

        let mut packs = Vec::with_capacity(results.len());
        let mut failures = Vec::new();
        for result in results {
            match result {
                Ok(pack) => packs.push(pack),
                Err(message) => failures.push(message),
            }
        }

        if failures.is_empty() {
            Ok(packs)
        } else {
            Err(BakeError::Prepare(failures))
        }
    }

    /// The global bake-order loop.
    fn bake_loop(
        &self,
        packs: &mut [PackBakeContext],
        baking_output: &Arc<RwLock<FileSystem>>,
        force: &Arc<AtomicBool>,
        stats: &mut BakeStats,
    ) -> Result<(), BakeError> {
        let mut order = ORDER_SENTINEL;

        while packs.iter().any(|pack| !pack.done) {
            let baked_before: usize =
                packs.iter().map(|pack| pack.baked_count.load(Ordering::SeqCst)).sum();

            let batch: Vec<(usize, Result<bool, String>)> = if self.settings.single_thread {
                packs
                    .iter()
                    .enumerate()
                    .filter(|(_, pack)| !pack.done)
                    .map(|(idx, pack)| (idx, run_order(pack, order)))
                    .collect()
            } else {
                std::thread::scope(|scope| {
                    let handles: Vec<_> = packs
                        .iter()
                        .enumerate()
                        .filter(|(_, pack)| !pack.done)
                        .map(|(idx, pack)| (idx, scope.spawn(move || run_order(pack, order))))
                        .collect();
                    handles
                        .into_iter()
                        .map(|(idx, handle)| {
                            let result = handle
                                .join()
                                .unwrap_or_else(|_| Err("baking task panicked".to_string()));
                            (idx, result)
                        })
                        .collect()
                })
            };

            let mut errors = Vec::new();
            for (idx, result) in batch {
                match result {
                    Ok(ran) => {
                        if ran {
                            packs[idx].first_bake = true;
                        }
                    }
                    Err(message) => errors.push(message),
                }
            }

            // Expose freshly created pack outputs to later orders, once
            // per pack.
            for pack in packs.iter_mut() {
                if pack.first_bake && !pack.output_mounted {
                    baking_output
                        .write()
                        .map_err(|_| {
                            BakeError::Io(std::io::Error::other("baking output lock poisoned"))
                        })?
                        .mount_dir(&pack.output_dir, true);
                    pack.output_mounted = true;
                }
            }

            for pack in packs.iter_mut() {
                if pack.done {
                    continue;
                }
                if pack.max_order.is_none() || pack.max_order == Some(order) {
                    pack.done = true;
                    let baked = pack.baked_count.load(Ordering::SeqCst);
                    info!(
                        "Pack '{}' done in {:.2?}, {} files baked",
                        pack.info.name,
                        pack.started.elapsed(),
                        baked
                    );
                    stats.packs.push(PackStats {
                        name: pack.info.name.clone(),
                        baked_files: baked,
                        duration: pack.started.elapsed(),
                    });
                }
            }

            // Anything baked this iteration forces the orders after it:
            // a downstream consumer cannot rely on write-time deltas when
            // timestamps tie within filesystem resolution.
            let baked_after: usize =
                packs.iter().map(|pack| pack.baked_count.load(Ordering::SeqCst)).sum();
            if baked_after > baked_before {
                force.store(true, Ordering::SeqCst);
            }

            // Errors only surface after the whole batch has joined.
            if !errors.is_empty() {
                return Err(BakeError::Packs(errors));
            }

            order += 1;
        }

        Ok(())
    }

    /// Delete output files no checker call accounted for: leftovers of
    /// renamed or removed sources.
    fn remove_orphans(
        &self,
        output_root: &Path,
        packs: &[PackBakeContext],
    ) -> Result<usize, BakeError> {
        let mut actual: HashSet<String> = HashSet::new();
        for pack in packs {
            let paths = pack
                .baked_paths
                .lock()
                .map_err(|_| BakeError::Io(std::io::Error::other("baked paths lock poisoned")))?;
            for path in paths.iter() {
                actual.insert(format!("{}/{}", pack.info.name, strip_extension(path)));
            }
        }

        let mut removed = 0;
        for entry in walkdir::WalkDir::new(output_root)
            .into_iter()
            .filter_map(|entry| entry.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = entry
                .path()
                .strip_prefix(output_root)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .to_string();
            let rel = normalize_path(&rel);
            if rel == BUILD_HASH_MARKER {
                continue;
            }
            if !actual.contains(&strip_extension(&rel)) {
                info!("Removing stale output '{}'", rel);
                fs::remove_file(entry.path())?;
                removed += 1;
            }
        }

        Ok(removed)
    }
}

/// Mount a pack's input dirs and files and snapshot them. Shared with
/// the on-demand data source.
pub(crate) fn mount_pack_inputs(info: &ResourcePackInfo) -> Result<FileCollection, String> {
    let mut inputs = FileSystem::new();

    for dir in &info.input_dirs {
        if !dir.is_dir() {
            return Err(format!(
                "pack '{}': input dir '{}' does not exist",
                info.name,
                dir.display()
            ));
        }
        inputs.mount_dir(dir, info.recursive_input);
    }
    for file in &info.input_files {
        inputs
            .mount_file(file)
            .map_err(|e| format!("pack '{}': bad input pattern '{}': {}", info.name, file.display(), e))?;
    }

    inputs
        .get_files()
        .map_err(|e| format!("pack '{}': input enumeration failed: {}", info.name, e))
}

/// Mount one pack's inputs, snapshot them, and build its bakers with
/// checker/write closures scoped to the pack output directory.
fn prepare_pack(
    settings: &Arc<BakeSettings>,
    info: &ResourcePackInfo,
    output_root: &Path,
    baking_output: &Arc<RwLock<FileSystem>>,
    force: &Arc<AtomicBool>,
) -> Result<PackBakeContext, String> {
    let started = Instant::now();
    let input_files = mount_pack_inputs(info)?;

    let output_dir = output_root.join(&info.name);
    let baked_count = Arc::new(AtomicUsize::new(0));
    let baked_paths = Arc::new(Mutex::new(HashSet::new()));

    let checker = {
        let output_dir = output_dir.clone();
        let baked_paths = Arc::clone(&baked_paths);
        let force = Arc::clone(force);
        Box::new(move |path: &str, write_time: u64| {
            if let Ok(mut paths) = baked_paths.lock() {
                paths.insert(path.to_string());
            }
            if force.load(Ordering::SeqCst) {
                return true;
            }
            match fs::metadata(output_dir.join(path)) {
                Ok(meta) => write_time_of(&meta) < write_time,
                Err(_) => true,
            }
        })
    };

    let writer = {
        let output_dir = output_dir.clone();
        let baked_count = Arc::clone(&baked_count);
        Box::new(move |path: &str, bytes: &[u8]| -> std::io::Result<()> {
            let full = output_dir.join(path);
            if let Some(parent) = full.parent() {
                fs::create_dir_all(parent)?;
            }
            match fs::read(&full) {
                Ok(existing) if existing == bytes => {
                    // Identical content: refresh the write time only, so
                    // the artifact stays byte-stable but reads as fresh
                    // on the next run.
                    let file = fs::OpenOptions::new().write(true).open(&full)?;
                    file.set_modified(SystemTime::now())?;
                }
                _ => {
                    fs::write(&full, bytes)?;
                }
            }
            baked_count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    };

    let ctx = BakingContext::new(
        Arc::clone(settings),
        info.name.clone(),
        checker,
        writer,
        Some(Arc::clone(baking_output)),
        settings.single_thread,
    );
    let bakers = setup_bakers(&info.bakers, &ctx);
    let max_order = bakers.iter().map(|baker| baker.order()).max();

    Ok(PackBakeContext {
        info: info.clone(),
        output_dir,
        input_files,
        bakers,
        max_order,
        baked_count,
        baked_paths,
        first_bake: false,
        output_mounted: false,
        started,
        done: false,
    })
}

/// Run all of a pack's bakers whose order matches. Returns whether any
/// baker executed (used to create and mount the output dir on first
/// bake).
fn run_order(pack: &PackBakeContext, order: i32) -> Result<bool, String> {
    let matching: Vec<&dyn Baker> = pack
        .bakers
        .iter()
        .filter(|baker| baker.order() == order)
        .map(|baker| baker.as_ref())
        .collect();
    if matching.is_empty() {
        return Ok(false);
    }

    fs::create_dir_all(&pack.output_dir)
        .map_err(|e| format!("pack '{}': {}", pack.info.name, e))?;

    for baker in matching {
        debug!("Pack '{}': running {} baker at order {}", pack.info.name, baker.name(), order);
        baker
            .bake_files(&pack.input_files, None)
            .map_err(|e| format!("pack '{}': {}", pack.info.name, e))?;
    }

    Ok(true)
}
