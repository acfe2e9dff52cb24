//! On-demand baking facade.
//!
//! [`BakerDataSource`] implements [`DataSource`] so a consumer can ask
//! for a single resource by path and have exactly that one file baked in
//! response, with results cached on disk as if pre-baked. It reuses the
//! same baker contract as the offline pass but drives the single-target
//! form of `bake_files`, which makes it the right backend for
//! iterative-editing tooling where a full offline pass per change is too
//! slow.
//!
//! # How It Works
//!
//! Construction instantiates every pack's bakers, then runs one
//! synchronous index-only pass whose checker always answers "fresh":
//! bakers bake nothing but report every output path they could produce,
//! populating the path-to-input-write-time map that `find_file` consults.
//! A later `find_file` serves a fresh on-disk output directly, deletes a
//! stale one, and runtime-bakes when nothing usable is on disk.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use log::{debug, info};

use crate::baking::baker::{setup_bakers, BakeError, Baker};
use crate::baking::context::BakingContext;
use crate::baking::master::mount_pack_inputs;
use crate::config::BakeSettings;
use crate::vfs::{normalize_path, write_time_of, DataSource, DataSourceError, FileCollection, FileHeader};

struct DataSourcePack {
    name: String,
    output_dir: PathBuf,
    input_files: FileCollection,
    bakers: Vec<Box<dyn Baker>>,
}

/// Lazily bakes resources as they are first asked for.
pub struct BakerDataSource {
    /// Packs in configuration order; lookups walk them in reverse so the
    /// highest-priority pack wins.
    packs: Vec<DataSourcePack>,
    /// Every output path any checker was ever asked about, mapped to the
    /// write time of the input that would produce it. Shared with the
    /// checker closures and mutated under this lock from arbitrary
    /// threads.
    output_files: Arc<Mutex<HashMap<String, u64>>>,
}

impl BakerDataSource {
    /// Instantiate bakers for every configured pack and run the
    /// index-only pass.
    pub fn new(settings: Arc<BakeSettings>) -> Result<Self, BakeError> {
        let output_files: Arc<Mutex<HashMap<String, u64>>> =
            Arc::new(Mutex::new(HashMap::new()));
        let index_only = Arc::new(AtomicBool::new(true));

        let mut packs = Vec::with_capacity(settings.packs.len());
        for info in &settings.packs {
            if !settings.target.includes(info.side()) {
                continue;
            }

            let input_files = mount_pack_inputs(info)
                .map_err(|message| BakeError::Prepare(vec![message]))?;
            let output_dir = settings.output.join(&info.name);

            let checker = {
                let output_files = Arc::clone(&output_files);
                let output_dir = output_dir.clone();
                let index_only = Arc::clone(&index_only);
                Box::new(move |path: &str, write_time: u64| {
                    // Recorded unconditionally: the index pass exists only
                    // for this side effect.
                    if let Ok(mut map) = output_files.lock() {
                        map.insert(path.to_string(), write_time);
                    }
                    if index_only.load(Ordering::SeqCst) {
                        return false;
                    }
                    match fs::metadata(output_dir.join(path)) {
                        Ok(meta) => write_time_of(&meta) < write_time,
                        Err(_) => true,
                    }
                })
            };

            let writer = {
                let output_dir = output_dir.clone();
                let index_only = Arc::clone(&index_only);
                Box::new(move |path: &str, bytes: &[u8]| -> std::io::Result<()> {
                    // Bakers only write through checker-gated paths; a
                    // write during the index pass means a baker broke
                    // that contract.
                    assert!(
                        !index_only.load(Ordering::SeqCst),
                        "baker wrote '{}' during the index-only pass",
                        path
                    );
                    let full = output_dir.join(path);
                    if let Some(parent) = full.parent() {
                        fs::create_dir_all(parent)?;
                    }
                    fs::write(&full, bytes)
                })
            };

            let ctx = BakingContext::new(
                Arc::clone(&settings),
                info.name.clone(),
                checker,
                writer,
                None,
                true,
            );
            let bakers = setup_bakers(&info.bakers, &ctx);

            packs.push(DataSourcePack {
                name: info.name.clone(),
                output_dir,
                input_files,
                bakers,
            });
        }

        let source = Self { packs, output_files };
        source.index_pass()?;
        index_only.store(false, Ordering::SeqCst);

        Ok(source)
    }

    /// One synchronous pass over every pack, purely to populate the
    /// output-files map through checker callbacks.
    fn index_pass(&self) -> Result<(), BakeError> {
        for pack in self.packs.iter().rev() {
            for baker in &pack.bakers {
                baker.bake_files(&pack.input_files, None)?;
            }
        }
        info!(
            "Indexed {} bakeable outputs across {} packs",
            self.output_files.lock().map(|m| m.len()).unwrap_or(0),
            self.packs.len()
        );
        Ok(())
    }

    fn recorded_time(&self, path: &str) -> Option<u64> {
        self.output_files.lock().ok().and_then(|map| map.get(path).copied())
    }

    /// Number of outputs the index pass discovered.
    pub fn indexed_count(&self) -> usize {
        self.output_files.lock().map(|map| map.len()).unwrap_or(0)
    }
}

impl DataSource for BakerDataSource {
    fn find_file(&self, path: &str) -> Result<Option<FileHeader>, DataSourceError> {
        let path = normalize_path(path);

        let Some(input_time) = self.recorded_time(&path) else {
            return Ok(None);
        };

        // Serve a fresh on-disk output; drop stale ones as we go.
        for pack in self.packs.iter().rev() {
            let full = pack.output_dir.join(&path);
            let Ok(meta) = fs::metadata(&full) else {
                continue;
            };
            if write_time_of(&meta) < input_time {
                debug!("Dropping stale on-demand output '{}' in pack '{}'", path, pack.name);
                fs::remove_file(&full)?;
                continue;
            }
            return Ok(Some(FileHeader::from_path(&path, &full)?));
        }

        // Nothing usable on disk: bake exactly this path.
        for pack in self.packs.iter().rev() {
            for baker in &pack.bakers {
                baker
                    .bake_files(&pack.input_files, Some(&path))
                    .map_err(|e| DataSourceError::Bake(e.to_string()))?;
            }

            let full = pack.output_dir.join(&path);
            if let Ok(meta) = fs::metadata(&full) {
                // The checker refreshed the record during the bake; the
                // output must now be at least as new as the input.
                let current = self.recorded_time(&path).unwrap_or(input_time);
                if write_time_of(&meta) >= current {
                    debug!("Runtime-baked '{}' in pack '{}'", path, pack.name);
                    return Ok(Some(FileHeader::from_path(&path, &full)?));
                }
            }
        }

        Err(DataSourceError::NotBaked(path))
    }
}
