//! Metadata baker: aggregates engine tag declarations out of script
//! sources into per-side metadata tables.
//!
//! Scripts declare tags the engine and other bakers look up by name:
//!
//! ```text
//! tag Difficulty int
//! tag[client] HudColor string
//! ```
//!
//! The whole collection bakes into one table per engine side,
//! `<Pack>.meta-server` / `.meta-client` / `.meta-mapper`, each a sorted
//! `name type` line list. This is a per-collection baker: one logical
//! unit covers every script source at once.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::error;

use crate::baking::baker::{BakeError, Baker};
use crate::baking::context::BakingContext;
use crate::vfs::{FileCollection, FileHeader};

const SIDES: &[&str] = &["server", "client", "mapper"];

#[derive(Debug, Clone, PartialEq, Eq)]
struct TagDecl {
    name: String,
    type_name: String,
    /// `None` means the tag applies to every side.
    side: Option<String>,
}

/// Aggregates tag declarations into per-side metadata tables.
pub struct MetadataBaker {
    ctx: Arc<BakingContext>,
}

impl MetadataBaker {
    /// Baker name as referenced from pack configuration.
    pub const NAME: &'static str = "Metadata";

    pub fn new(ctx: Arc<BakingContext>) -> Self {
        Self { ctx }
    }

    fn output_name(pack: &str, side: &str) -> String {
        format!("{}.meta-{}", pack, side)
    }

    fn parse_tags(source: &str, path: &str, errors: &mut Vec<String>) -> Vec<TagDecl> {
        let mut tags = Vec::new();

        for (idx, raw) in source.lines().enumerate() {
            let line = raw.trim();
            if !line.starts_with("tag") {
                continue;
            }

            let mut tokens = line.split_whitespace();
            let keyword = tokens.next().unwrap_or_default();

            let side = if keyword == "tag" {
                None
            } else if let Some(side) =
                keyword.strip_prefix("tag[").and_then(|s| s.strip_suffix(']'))
            {
                if !SIDES.contains(&side) {
                    errors.push(format!("{}:{}: unknown tag side '{}'", path, idx + 1, side));
                    continue;
                }
                Some(side.to_string())
            } else {
                continue;
            };

            match (tokens.next(), tokens.next(), tokens.next()) {
                (Some(name), Some(type_name), None) => tags.push(TagDecl {
                    name: name.to_string(),
                    type_name: type_name.to_string(),
                    side,
                }),
                _ => errors.push(format!(
                    "{}:{}: malformed tag declaration '{}'",
                    path,
                    idx + 1,
                    line
                )),
            }
        }

        tags
    }

    fn render_side(tags: &BTreeMap<String, TagDecl>, side: &str) -> Vec<u8> {
        let mut out = String::new();
        for tag in tags.values() {
            let applies = match &tag.side {
                None => true,
                Some(tag_side) => tag_side == side,
            };
            if applies {
                out.push_str(&format!("{} {}\n", tag.name, tag.type_name));
            }
        }
        out.into_bytes()
    }
}

impl Baker for MetadataBaker {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn order(&self) -> i32 {
        1
    }

    fn bake_files(&self, files: &FileCollection, target: Option<&str>) -> Result<(), BakeError> {
        let scripts: Vec<&FileHeader> = files.with_extensions(&["scr"]).collect();
        if scripts.is_empty() {
            return Ok(());
        }

        let pack = self.ctx.pack_name.clone();
        let outputs: Vec<(String, String)> = SIDES
            .iter()
            .map(|side| (side.to_string(), Self::output_name(&pack, side)))
            .collect();

        if let Some(path) = target {
            if !outputs.iter().any(|(_, output)| output == path) {
                return Ok(());
            }
        }

        // The table is stale whenever any contributing script is newer.
        let newest = scripts.iter().map(|f| f.write_time).max().unwrap_or(0);

        let mut stale_sides: Vec<(String, String)> = Vec::new();
        for (side, output) in &outputs {
            if let Some(path) = target {
                if output != path {
                    continue;
                }
            }
            if self.ctx.check(output, newest) {
                stale_sides.push((side.clone(), output.clone()));
            }
        }

        if stale_sides.is_empty() {
            return Ok(());
        }

        let mut errors = Vec::new();
        let mut tags: BTreeMap<String, TagDecl> = BTreeMap::new();

        for file in &scripts {
            let source = match std::fs::read_to_string(&file.full_path) {
                Ok(source) => source,
                Err(e) => {
                    errors.push(format!("{}: {}", file.path, e));
                    continue;
                }
            };
            for tag in Self::parse_tags(&source, &file.path, &mut errors) {
                match tags.get(&tag.name) {
                    Some(existing) if *existing != tag => errors.push(format!(
                        "{}: tag '{}' redeclared with a different type or side",
                        file.path, tag.name
                    )),
                    _ => {
                        tags.insert(tag.name.clone(), tag);
                    }
                }
            }
        }

        for (side, output) in &stale_sides {
            self.ctx.write_data(output, &Self::render_side(&tags, side))?;
        }

        if errors.is_empty() {
            Ok(())
        } else {
            for message in &errors {
                error!("[{}] {}: {}", pack, Self::NAME, message);
            }
            Err(BakeError::Aggregate {
                baker: Self::NAME,
                failed: errors.len(),
                total: scripts.len(),
            })
        }
    }
}
