//! Configuration schema types for `resbake.toml`
//!
//! Defines the structure and validation rules for a baking project:
//! the output root, global baking switches, and the list of resource
//! packs with their input locations and baker assignments.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Build identifier stamped into the `Resources.build-hash` marker.
pub const BUILD_HASH: &str = concat!("resbake-", env!("CARGO_PKG_VERSION"));

/// Baker names accepted in `ResourcePackInfo::bakers`.
pub const KNOWN_BAKERS: &[&str] = &[
    "RawCopy", "Config", "Image", "Effect", "Model", "Metadata", "Proto", "Text", "ProtoText",
    "Map", "Script",
];

/// Which engine side a pack belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PackSide {
    /// Baked for every side
    #[default]
    All,
    /// Server-only resources
    Server,
    /// Client-only resources
    Client,
    /// Mapper-only resources
    Mapper,
}

/// Which engine side this run bakes for. Packs whose side is neither
/// `All` nor the target are skipped at prepare time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BakeTarget {
    /// Bake everything
    #[default]
    All,
    /// Bake server-side packs only
    Server,
    /// Bake client-side packs only
    Client,
    /// Bake mapper-side packs only
    Mapper,
}

impl BakeTarget {
    /// Whether a pack with the given side participates in this run.
    pub fn includes(&self, side: PackSide) -> bool {
        match (self, side) {
            (BakeTarget::All, _) | (_, PackSide::All) => true,
            (BakeTarget::Server, PackSide::Server) => true,
            (BakeTarget::Client, PackSide::Client) => true,
            (BakeTarget::Mapper, PackSide::Mapper) => true,
            _ => false,
        }
    }
}

/// One named group of input locations sharing a baker set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourcePackInfo {
    /// Unique pack name; also the output subdirectory
    pub name: String,
    /// Input directories, resolved relative to the project root
    #[serde(default)]
    pub input_dirs: Vec<PathBuf>,
    /// Explicit input files or glob patterns
    #[serde(default)]
    pub input_files: Vec<PathBuf>,
    /// Whether input directories are scanned recursively
    #[serde(default = "default_true")]
    pub recursive_input: bool,
    /// Restrict the pack to the server side
    #[serde(default)]
    pub server_only: bool,
    /// Restrict the pack to the client side
    #[serde(default)]
    pub client_only: bool,
    /// Restrict the pack to the mapper side
    #[serde(default)]
    pub mapper_only: bool,
    /// Baker names applied to this pack, matched against [`KNOWN_BAKERS`]
    pub bakers: Vec<String>,
}

fn default_true() -> bool {
    true
}

impl ResourcePackInfo {
    /// The pack's side, derived from the exclusive `*_only` flags.
    pub fn side(&self) -> PackSide {
        if self.server_only {
            PackSide::Server
        } else if self.client_only {
            PackSide::Client
        } else if self.mapper_only {
            PackSide::Mapper
        } else {
            PackSide::All
        }
    }

    /// Validate this pack, appending human-readable problems.
    pub fn validate(&self, problems: &mut Vec<String>) {
        if self.name.is_empty() {
            problems.push("pack with empty name".to_string());
        }
        if self.input_dirs.is_empty() && self.input_files.is_empty() {
            problems.push(format!("pack '{}' has no input dirs or files", self.name));
        }
        let only_flags =
            [self.server_only, self.client_only, self.mapper_only].iter().filter(|f| **f).count();
        if only_flags > 1 {
            problems.push(format!(
                "pack '{}' sets more than one of server_only/client_only/mapper_only",
                self.name
            ));
        }
        if self.bakers.is_empty() {
            problems.push(format!("pack '{}' assigns no bakers", self.name));
        }
        for baker in &self.bakers {
            if !KNOWN_BAKERS.contains(&baker.as_str()) {
                problems.push(format!("pack '{}' names unknown baker '{}'", self.name, baker));
            }
        }
    }
}

/// Process-wide baking settings, loaded once before any baking begins
/// and immutable for the duration of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BakeSettings {
    /// Output root directory for baked artifacts
    pub output: PathBuf,
    /// Delete the whole output tree and rebake everything
    #[serde(default)]
    pub force_baking: bool,
    /// Run every batch and per-file bake sequentially (deterministic debugging)
    #[serde(default)]
    pub single_thread: bool,
    /// Engine side this run bakes for
    #[serde(default)]
    pub target: BakeTarget,
    /// Build identifier written to the completion marker
    #[serde(default = "default_build_hash")]
    pub build_hash: String,
    /// Resource packs, in priority order (later packs win on collisions)
    #[serde(default, rename = "pack")]
    pub packs: Vec<ResourcePackInfo>,
}

fn default_build_hash() -> String {
    BUILD_HASH.to_string()
}

impl Default for BakeSettings {
    fn default() -> Self {
        Self {
            output: PathBuf::from("baked"),
            force_baking: false,
            single_thread: false,
            target: BakeTarget::All,
            build_hash: default_build_hash(),
            packs: vec![],
        }
    }
}

impl BakeSettings {
    /// Validate the whole settings tree.
    ///
    /// Collects every problem instead of stopping at the first so a broken
    /// config surfaces in one report.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.output.as_os_str().is_empty() {
            problems.push("output directory is empty".to_string());
        }

        let mut seen = std::collections::HashSet::new();
        for pack in &self.packs {
            if !seen.insert(pack.name.clone()) {
                problems.push(format!("duplicate pack name '{}'", pack.name));
            }
            pack.validate(&mut problems);
        }

        problems
    }
}
