//! Script baker: compiles `.scr` sources into the engine's script
//! binary, validating metadata tag references on the way.
//!
//! Runs after the Metadata baker so `@meta(Tag)` references can be
//! checked against the freshly baked `.meta-*` tables read through the
//! baked-files view.

use std::collections::HashSet;
use std::sync::Arc;

use regex::Regex;

use crate::baking::baker::{bake_units, replace_extension, BakeError, Baker};
use crate::baking::context::BakingContext;
use crate::vfs::{FileCollection, FileHeader};

const SCRIPT_MAGIC: &[u8; 4] = b"SCRB";
const SCRIPT_VERSION: u32 = 1;

/// Compiles script sources into `.scrb` binaries.
pub struct ScriptBaker {
    ctx: Arc<BakingContext>,
}

impl ScriptBaker {
    /// Baker name as referenced from pack configuration.
    pub const NAME: &'static str = "Script";

    pub fn new(ctx: Arc<BakingContext>) -> Self {
        Self { ctx }
    }

    fn output_path(file: &FileHeader) -> String {
        replace_extension(&file.path, "scrb")
    }

    /// Tag names from every `.meta-*` table in the baked-files view, or
    /// `None` when no view is attached (reference checks are skipped).
    fn known_tags(&self) -> Result<Option<HashSet<String>>, BakeError> {
        let Some(baked) = self.ctx.baked_snapshot()? else {
            return Ok(None);
        };

        let mut tags = HashSet::new();
        for file in baked.files() {
            if !file.extension().starts_with("meta-") {
                continue;
            }
            let content = file.read()?;
            for line in String::from_utf8_lossy(&content).lines() {
                if let Some((name, _)) = line.split_once(' ') {
                    tags.insert(name.to_string());
                }
            }
        }
        Ok(Some(tags))
    }

    fn encode(functions: &[(String, u32)], source: &str) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(SCRIPT_MAGIC);
        out.extend_from_slice(&SCRIPT_VERSION.to_le_bytes());
        out.extend_from_slice(&(functions.len() as u32).to_le_bytes());
        for (name, arity) in functions {
            out.extend_from_slice(&(name.len() as u32).to_le_bytes());
            out.extend_from_slice(name.as_bytes());
            out.extend_from_slice(&arity.to_le_bytes());
        }
        out.extend_from_slice(&(source.len() as u32).to_le_bytes());
        out.extend_from_slice(source.as_bytes());
        out
    }

    fn bake_one(
        &self,
        file: &FileHeader,
        decl: &Regex,
        meta_ref: &Regex,
        known_tags: Option<&HashSet<String>>,
    ) -> Result<(), String> {
        let source = std::fs::read_to_string(&file.full_path)
            .map_err(|e| format!("{}: {}", file.path, e))?;

        // Function table, sorted for a stable binary.
        let mut functions: Vec<(String, u32)> = decl
            .captures_iter(&source)
            .map(|capture| {
                let args = capture[2].trim();
                let arity = if args.is_empty() { 0 } else { args.split(',').count() as u32 };
                (capture[1].to_string(), arity)
            })
            .collect();
        functions.sort();
        functions.dedup();

        if let Some(tags) = known_tags {
            let mut missing = Vec::new();
            for capture in meta_ref.captures_iter(&source) {
                let tag = &capture[1];
                if !tags.contains(tag) {
                    missing.push(tag.to_string());
                }
            }
            if !missing.is_empty() {
                return Err(format!(
                    "{}: unknown metadata tags: {}",
                    file.path,
                    missing.join(", ")
                ));
            }
        }

        self.ctx
            .write_data(&Self::output_path(file), &Self::encode(&functions, &source))
            .map_err(|e| format!("{}: {}", file.path, e))
    }
}

impl Baker for ScriptBaker {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn order(&self) -> i32 {
        2
    }

    fn bake_files(&self, files: &FileCollection, target: Option<&str>) -> Result<(), BakeError> {
        let candidates: Vec<&FileHeader> = match target {
            Some(path) => files
                .with_extensions(&["scr"])
                .filter(|f| Self::output_path(f) == path)
                .collect(),
            None => files.with_extensions(&["scr"]).collect(),
        };

        let stale: Vec<&FileHeader> = candidates
            .into_iter()
            .filter(|f| self.ctx.check(&Self::output_path(f), f.write_time))
            .collect();

        if stale.is_empty() {
            return Ok(());
        }

        let known_tags = self.known_tags()?;
        let decl = Regex::new(r"(?m)^\s*fn\s+([A-Za-z_]\w*)\s*\(([^)]*)\)")
            .expect("function declaration pattern is valid");
        let meta_ref = Regex::new(r"@meta\(([A-Za-z_]\w*)\)")
            .expect("metadata reference pattern is valid");

        bake_units(&self.ctx, Self::NAME, &stale, |file| {
            self.bake_one(file, &decl, &meta_ref, known_tags.as_ref())
        })
    }
}
