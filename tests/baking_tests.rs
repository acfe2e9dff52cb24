//! Baking pipeline integration tests.
//!
//! End-to-end coverage of the orchestrator's observable guarantees:
//!
//! - Idempotence (re-running bakes nothing and changes no bytes)
//! - Orphan deletion scoped to the owning pack
//! - Force rebuild
//! - Cross-pack order dependencies (Script over Metadata)
//! - Partial failure isolation
//! - On-demand baking equivalence with the offline pass

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tempfile::TempDir;

use resbake::baking::baker::BakeError;
use resbake::baking::master::BUILD_HASH_MARKER;
use resbake::baking::{BakerDataSource, MasterBaker};
use resbake::config::{BakeSettings, BakeTarget, ResourcePackInfo};
use resbake::vfs::DataSource;

// ============================================================================
// Test Utilities
// ============================================================================

fn pack(name: &str, input: &Path, bakers: &[&str]) -> ResourcePackInfo {
    ResourcePackInfo {
        name: name.to_string(),
        input_dirs: vec![input.to_path_buf()],
        input_files: vec![],
        recursive_input: true,
        server_only: false,
        client_only: false,
        mapper_only: false,
        bakers: bakers.iter().map(|b| b.to_string()).collect(),
    }
}

fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

/// Sha256 of every file under a directory, keyed by relative path.
fn tree_digest(root: &Path) -> BTreeMap<String, Vec<u8>> {
    let mut digests = BTreeMap::new();
    for entry in walkdir(root) {
        let rel = entry.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/");
        let mut hasher = Sha256::new();
        hasher.update(fs::read(&entry).unwrap());
        digests.insert(rel, hasher.finalize().to_vec());
    }
    digests
}

fn walkdir(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let Ok(entries) = fs::read_dir(&dir) else { continue };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else {
                files.push(path);
            }
        }
    }
    files.sort();
    files
}

// ============================================================================
// Idempotence
// ============================================================================

#[test]
fn test_second_run_is_byte_identical_and_bakes_nothing() {
    let temp = TempDir::new().unwrap();
    let core_in = temp.path().join("core");
    let conf_in = temp.path().join("conf");
    let scripts_in = temp.path().join("scripts");
    write_file(&core_in, "readme.dat", "raw data");
    write_file(&conf_in, "engine.cfg", "speed = 3\n");
    write_file(&scripts_in, "game.scr", "tag Difficulty int\nfn main(ctx) {}\n");

    let settings = Arc::new(BakeSettings {
        output: temp.path().join("out"),
        packs: vec![
            pack("Core", &core_in, &["RawCopy"]),
            pack("Conf", &conf_in, &["Config"]),
            pack("Scripts", &scripts_in, &["Metadata", "Script"]),
        ],
        ..Default::default()
    });

    let first = MasterBaker::new(Arc::clone(&settings)).run().unwrap();
    assert!(first.total_baked() > 0);
    let first_digest = tree_digest(&settings.output);

    let second = MasterBaker::new(Arc::clone(&settings)).run().unwrap();
    assert_eq!(second.total_baked(), 0, "nothing may rebake on unchanged inputs");

    let second_digest = tree_digest(&settings.output);
    assert_eq!(first_digest, second_digest, "outputs must be byte-identical");
    assert!(first_digest.contains_key(BUILD_HASH_MARKER));
}

#[test]
fn test_changed_input_rebakes_and_cascades() {
    let temp = TempDir::new().unwrap();
    let scripts_in = temp.path().join("scripts");
    write_file(&scripts_in, "game.scr", "tag Difficulty int\nfn main(ctx) {}\n");

    let settings = Arc::new(BakeSettings {
        output: temp.path().join("out"),
        packs: vec![pack("Scripts", &scripts_in, &["Metadata", "Script"])],
        ..Default::default()
    });

    MasterBaker::new(Arc::clone(&settings)).run().unwrap();

    // Touch the source with new content; both the metadata tables and
    // the dependent script binary must rebake. The write time is pushed
    // past filesystem timestamp resolution so the change is visible.
    let changed =
        write_file(&scripts_in, "game.scr", "tag Difficulty int\ntag Speed int\nfn main(ctx) {}\n");
    fs::OpenOptions::new()
        .write(true)
        .open(&changed)
        .unwrap()
        .set_modified(std::time::SystemTime::now() + std::time::Duration::from_secs(2))
        .unwrap();
    let stats = MasterBaker::new(Arc::clone(&settings)).run().unwrap();

    assert!(stats.total_baked() >= 4, "meta tables + script, got {}", stats.total_baked());
    let meta = fs::read_to_string(settings.output.join("Scripts/Scripts.meta-server")).unwrap();
    assert!(meta.contains("Speed int"));
}

// ============================================================================
// Orphan deletion
// ============================================================================

#[test]
fn test_orphan_deletion_is_scoped_to_the_owning_pack() {
    let temp = TempDir::new().unwrap();
    let a_in = temp.path().join("a");
    let b_in = temp.path().join("b");
    write_file(&a_in, "keep.dat", "keep");
    write_file(&a_in, "drop.dat", "drop");
    write_file(&b_in, "other.dat", "other");

    let settings = Arc::new(BakeSettings {
        output: temp.path().join("out"),
        packs: vec![pack("A", &a_in, &["RawCopy"]), pack("B", &b_in, &["RawCopy"])],
        ..Default::default()
    });

    MasterBaker::new(Arc::clone(&settings)).run().unwrap();
    fs::remove_file(a_in.join("drop.dat")).unwrap();

    let stats = MasterBaker::new(Arc::clone(&settings)).run().unwrap();

    assert_eq!(stats.orphans_removed, 1);
    assert!(!settings.output.join("A/drop.dat").exists());
    assert!(settings.output.join("A/keep.dat").exists());
    assert!(settings.output.join("B/other.dat").exists());
}

// ============================================================================
// Force rebuild
// ============================================================================

#[test]
fn test_force_baking_rewrites_every_pack() {
    let temp = TempDir::new().unwrap();
    let a_in = temp.path().join("a");
    let b_in = temp.path().join("b");
    write_file(&a_in, "one.dat", "1");
    write_file(&b_in, "two.dat", "2");

    let settings = BakeSettings {
        output: temp.path().join("out"),
        packs: vec![pack("A", &a_in, &["RawCopy"]), pack("B", &b_in, &["RawCopy"])],
        ..Default::default()
    };

    MasterBaker::new(Arc::new(settings.clone())).run().unwrap();

    let mut forced = settings;
    forced.force_baking = true;
    let stats = MasterBaker::new(Arc::new(forced)).run().unwrap();

    for pack_stats in &stats.packs {
        assert!(
            pack_stats.baked_files > 0,
            "pack '{}' must rebake under force",
            pack_stats.name
        );
    }
}

// ============================================================================
// Partial failure isolation
// ============================================================================

#[test]
fn test_one_bad_file_does_not_stop_its_siblings() {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("cfg");
    for idx in 0..9 {
        write_file(&input, &format!("ok-{}.cfg", idx), &format!("value = {}\n", idx));
    }
    write_file(&input, "broken.cfg", "this is not [ valid toml");

    let settings = Arc::new(BakeSettings {
        output: temp.path().join("out"),
        packs: vec![pack("Conf", &input, &["Config"])],
        ..Default::default()
    });

    let err = MasterBaker::new(Arc::clone(&settings)).run().unwrap_err();

    match err {
        BakeError::Packs(messages) => {
            assert_eq!(messages.len(), 1);
            assert!(messages[0].contains("1 of 10"), "got: {}", messages[0]);
        }
        other => panic!("unexpected error: {}", other),
    }

    // The nine good outputs are on disk even though the run failed.
    for idx in 0..9 {
        assert!(settings.output.join(format!("Conf/ok-{}.cfg", idx)).exists());
    }
    assert!(!settings.output.join("Conf/broken.cfg").exists());
    // No completion marker after a failed run.
    assert!(!settings.output.join(BUILD_HASH_MARKER).exists());
}

// ============================================================================
// Target sides
// ============================================================================

#[test]
fn test_side_restricted_pack_is_skipped_for_other_targets() {
    let temp = TempDir::new().unwrap();
    let shared_in = temp.path().join("shared");
    let server_in = temp.path().join("server");
    write_file(&shared_in, "both.dat", "both");
    write_file(&server_in, "secret.dat", "server only");

    let mut server_pack = pack("ServerData", &server_in, &["RawCopy"]);
    server_pack.server_only = true;

    let settings = Arc::new(BakeSettings {
        output: temp.path().join("out"),
        target: BakeTarget::Client,
        packs: vec![pack("Shared", &shared_in, &["RawCopy"]), server_pack],
        ..Default::default()
    });

    MasterBaker::new(Arc::clone(&settings)).run().unwrap();

    assert!(settings.output.join("Shared/both.dat").exists());
    assert!(!settings.output.join("ServerData").exists());
}

// ============================================================================
// Concrete two-pack scenario
// ============================================================================

const GAME_SCR: &str = "\
tag Difficulty int

fn main(ctx) {
    let level = @meta(Difficulty);
}
";

#[test]
fn test_core_and_scripts_scenario() {
    let temp = TempDir::new().unwrap();
    let core_in = temp.path().join("core");
    let scripts_in = temp.path().join("scripts");
    write_file(&core_in, "foo.scr", GAME_SCR);
    write_file(&scripts_in, "game.scr", GAME_SCR);

    let settings = Arc::new(BakeSettings {
        output: temp.path().join("out"),
        packs: vec![
            pack("Core", &core_in, &["RawCopy"]),
            pack("Scripts", &scripts_in, &["Metadata", "Script"]),
        ],
        ..Default::default()
    });

    assert!(MasterBaker::new(Arc::clone(&settings)).bake_all());

    // Core's raw copy is untouched source bytes.
    assert_eq!(
        fs::read_to_string(settings.output.join("Core/foo.scr")).unwrap(),
        GAME_SCR
    );

    // Order 1 produced the per-side metadata tables.
    for side in ["server", "client", "mapper"] {
        let table = fs::read_to_string(
            settings.output.join(format!("Scripts/Scripts.meta-{}", side)),
        )
        .unwrap();
        assert_eq!(table, "Difficulty int\n");
    }

    // Order 2 compiled the script against the just-baked metadata.
    let compiled = fs::read(settings.output.join("Scripts/game.scrb")).unwrap();
    assert_eq!(&compiled[0..4], b"SCRB");

    // Completion marker carries the configured build hash.
    let marker = fs::read_to_string(settings.output.join(BUILD_HASH_MARKER)).unwrap();
    assert_eq!(marker, settings.build_hash);
}

#[test]
fn test_script_with_dangling_meta_reference_fails() {
    let temp = TempDir::new().unwrap();
    let scripts_in = temp.path().join("scripts");
    write_file(
        &scripts_in,
        "game.scr",
        "fn main(ctx) {\n    let x = @meta(NotDeclared);\n}\n",
    );

    let settings = Arc::new(BakeSettings {
        output: temp.path().join("out"),
        packs: vec![pack("Scripts", &scripts_in, &["Metadata", "Script"])],
        ..Default::default()
    });

    let err = MasterBaker::new(settings).run().unwrap_err();
    assert!(err.to_string().contains("Script"), "got: {}", err);
}

// ============================================================================
// Order dependency across repeated runs
// ============================================================================

#[test]
fn test_script_only_ever_sees_lower_order_output() {
    // The Script baker refuses unknown tags; if it ever ran before the
    // Metadata baker's output was mounted, this scenario would fail.
    // Repeat from a clean slate a few times to shake scheduling.
    for _ in 0..4 {
        let temp = TempDir::new().unwrap();
        let scripts_in = temp.path().join("scripts");
        write_file(&scripts_in, "game.scr", GAME_SCR);

        let settings = Arc::new(BakeSettings {
            output: temp.path().join("out"),
            packs: vec![pack("Scripts", &scripts_in, &["Metadata", "Script"])],
            ..Default::default()
        });

        let stats = MasterBaker::new(settings).run().unwrap();
        assert!(stats.total_baked() >= 4);
    }
}

// ============================================================================
// On-demand baking equivalence
// ============================================================================

#[test]
fn test_on_demand_bytes_match_offline_bytes() {
    let temp = TempDir::new().unwrap();
    let conf_in = temp.path().join("conf");
    let raw_in = temp.path().join("raw");
    write_file(&conf_in, "engine.cfg", "# comment\nspeed = 10\n");
    write_file(&raw_in, "notes.dat", "raw notes");

    let make_packs =
        || vec![pack("Conf", &conf_in, &["Config"]), pack("Raw", &raw_in, &["RawCopy"])];

    let offline_settings = Arc::new(BakeSettings {
        output: temp.path().join("out-offline"),
        packs: make_packs(),
        ..Default::default()
    });
    MasterBaker::new(Arc::clone(&offline_settings)).run().unwrap();

    let demand_settings = Arc::new(BakeSettings {
        output: temp.path().join("out-demand"),
        packs: make_packs(),
        ..Default::default()
    });
    let source = BakerDataSource::new(demand_settings).unwrap();

    for (pack_name, path) in [("Conf", "engine.cfg"), ("Raw", "notes.dat")] {
        let offline = fs::read(offline_settings.output.join(pack_name).join(path)).unwrap();
        let on_demand = source.read_file(path).unwrap();
        assert_eq!(offline, on_demand, "bytes for '{}' must match", path);
    }
}

#[test]
fn test_on_demand_aggregate_output() {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("scripts");
    write_file(&input, "game.scr", "tag Difficulty int\nfn main(ctx) {}\n");

    let settings = Arc::new(BakeSettings {
        output: temp.path().join("out"),
        packs: vec![pack("Scripts", &input, &["Metadata"])],
        ..Default::default()
    });

    let source = BakerDataSource::new(settings).unwrap();
    let table = source.read_file("Scripts.meta-client").unwrap();
    assert_eq!(table, b"Difficulty int\n");
}
