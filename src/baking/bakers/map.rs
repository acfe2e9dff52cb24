//! Map baker: validates map sources against baked prototypes and bakes
//! them into canonical JSON.
//!
//! A `.map` source is TOML with a `[header]` table and an `[[entity]]`
//! array. Every placed entity names the prototype artifact it
//! instantiates (extension-stripped path into the baked-files view) and
//! may override properties, which are validated like prototype
//! properties.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use log::error;

use crate::baking::baker::{bake_units, replace_extension, BakeError, Baker};
use crate::baking::context::BakingContext;
use crate::baking::validation::{resource_names, validate_properties, ScriptIndex};
use crate::vfs::{FileCollection, FileHeader};

/// Bakes map sources.
pub struct MapBaker {
    ctx: Arc<BakingContext>,
}

#[derive(Debug, serde::Serialize)]
struct BakedMap {
    header: BTreeMap<String, serde_json::Value>,
    entities: Vec<BTreeMap<String, serde_json::Value>>,
}

impl MapBaker {
    /// Baker name as referenced from pack configuration.
    pub const NAME: &'static str = "Map";

    pub fn new(ctx: Arc<BakingContext>) -> Self {
        Self { ctx }
    }

    fn output_path(file: &FileHeader) -> String {
        replace_extension(&file.path, "mapb")
    }

    fn to_json_table(table: &toml::value::Table) -> BTreeMap<String, serde_json::Value> {
        table
            .iter()
            .map(|(k, v)| {
                (k.clone(), serde_json::to_value(v).unwrap_or(serde_json::Value::Null))
            })
            .collect()
    }

    fn bake_one(
        &self,
        file: &FileHeader,
        baked_names: Option<&HashSet<String>>,
        scripts: &ScriptIndex,
    ) -> Result<(), String> {
        let source = std::fs::read_to_string(&file.full_path)
            .map_err(|e| format!("{}: {}", file.path, e))?;
        let value: toml::Value =
            toml::from_str(&source).map_err(|e| format!("{}: {}", file.path, e))?;

        let header = value
            .get("header")
            .and_then(|h| h.as_table())
            .ok_or_else(|| format!("{}: missing [header] table", file.path))?;
        if !header.contains_key("name") {
            return Err(format!("{}: header is missing 'name'", file.path));
        }

        let entities = match value.get("entity") {
            Some(toml::Value::Array(entities)) => entities.as_slice(),
            Some(_) => return Err(format!("{}: 'entity' must be an array of tables", file.path)),
            None => &[],
        };

        let mut violations = 0;
        let mut baked_entities = Vec::with_capacity(entities.len());

        for (idx, entity) in entities.iter().enumerate() {
            let Some(table) = entity.as_table() else {
                error!("{}: entity #{} is not a table", file.path, idx);
                violations += 1;
                continue;
            };
            let owner = format!("{}:entity#{}", file.path, idx);

            match table.get("proto").and_then(|p| p.as_str()) {
                Some(proto) => {
                    if let Some(names) = baked_names {
                        if !names.contains(proto) {
                            error!("{}: unknown prototype '{}'", owner, proto);
                            violations += 1;
                        }
                    }
                }
                None => {
                    error!("{}: entity has no 'proto' reference", owner);
                    violations += 1;
                }
            }

            let string_props: BTreeMap<String, String> = table
                .iter()
                .filter(|(k, _)| *k != "proto")
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect();
            violations += validate_properties(&owner, &string_props, baked_names, scripts);

            baked_entities.push(Self::to_json_table(table));
        }

        if violations > 0 {
            return Err(format!("{}: validation failed with {} errors", file.path, violations));
        }

        let baked = BakedMap { header: Self::to_json_table(header), entities: baked_entities };
        let encoded =
            serde_json::to_vec(&baked).map_err(|e| format!("{}: {}", file.path, e))?;

        self.ctx
            .write_data(&Self::output_path(file), &encoded)
            .map_err(|e| format!("{}: {}", file.path, e))
    }
}

impl Baker for MapBaker {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn order(&self) -> i32 {
        2
    }

    fn bake_files(&self, files: &FileCollection, target: Option<&str>) -> Result<(), BakeError> {
        let candidates: Vec<&FileHeader> = match target {
            Some(path) => files
                .with_extensions(&["map"])
                .filter(|f| Self::output_path(f) == path)
                .collect(),
            None => files.with_extensions(&["map"]).collect(),
        };

        let stale: Vec<&FileHeader> = candidates
            .into_iter()
            .filter(|f| self.ctx.check(&Self::output_path(f), f.write_time))
            .collect();

        if stale.is_empty() {
            return Ok(());
        }

        let baked = self.ctx.baked_snapshot()?;
        let baked_names = baked.as_ref().map(resource_names);
        let scripts = ScriptIndex::build(files);

        bake_units(&self.ctx, Self::NAME, &stale, |file| {
            self.bake_one(file, baked_names.as_ref(), &scripts)
        })
    }
}
