//! Proto baker: validates entity prototype sources and bakes them into
//! canonical JSON.
//!
//! A `.ent` source is TOML where every top-level table defines one
//! prototype. Property blocks are validated against the baked-files view
//! (resource references) and the pack's script sources (function
//! signatures) before anything is written.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use crate::baking::baker::{bake_units, replace_extension, BakeError, Baker};
use crate::baking::context::BakingContext;
use crate::baking::validation::{resource_names, validate_properties, ScriptIndex};
use crate::vfs::{FileCollection, FileHeader};

/// Bakes entity prototypes.
pub struct ProtoBaker {
    ctx: Arc<BakingContext>,
}

/// Parsed prototypes of one source: entity name to property block.
type ProtoSet = BTreeMap<String, BTreeMap<String, toml::Value>>;

impl ProtoBaker {
    /// Baker name as referenced from pack configuration.
    pub const NAME: &'static str = "Proto";

    pub fn new(ctx: Arc<BakingContext>) -> Self {
        Self { ctx }
    }

    fn output_path(file: &FileHeader) -> String {
        replace_extension(&file.path, "entb")
    }

    pub(crate) fn parse_protos(source: &str, path: &str) -> Result<ProtoSet, String> {
        let value: toml::Value =
            toml::from_str(source).map_err(|e| format!("{}: {}", path, e))?;
        let Some(table) = value.as_table() else {
            return Err(format!("{}: expected a table of prototypes", path));
        };

        let mut protos = ProtoSet::new();
        for (name, body) in table {
            let Some(props) = body.as_table() else {
                return Err(format!("{}: prototype '{}' is not a table", path, name));
            };
            protos.insert(
                name.clone(),
                props.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            );
        }
        Ok(protos)
    }

    /// String-valued properties, the only kind validation looks at.
    pub(crate) fn string_props(props: &BTreeMap<String, toml::Value>) -> BTreeMap<String, String> {
        props
            .iter()
            .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
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
        let protos = Self::parse_protos(&source, &file.path)?;

        let mut violations = 0;
        for (name, props) in &protos {
            let owner = format!("{}:{}", file.path, name);
            violations +=
                validate_properties(&owner, &Self::string_props(props), baked_names, scripts);
        }
        if violations > 0 {
            return Err(format!("{}: validation failed with {} errors", file.path, violations));
        }

        let canonical: BTreeMap<&String, BTreeMap<&String, serde_json::Value>> = protos
            .iter()
            .map(|(name, props)| {
                let json_props = props
                    .iter()
                    .map(|(k, v)| {
                        let json = serde_json::to_value(v).unwrap_or(serde_json::Value::Null);
                        (k, json)
                    })
                    .collect();
                (name, json_props)
            })
            .collect();
        let encoded = serde_json::to_vec(&canonical)
            .map_err(|e| format!("{}: {}", file.path, e))?;

        self.ctx
            .write_data(&Self::output_path(file), &encoded)
            .map_err(|e| format!("{}: {}", file.path, e))
    }
}

impl Baker for ProtoBaker {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn order(&self) -> i32 {
        1
    }

    fn bake_files(&self, files: &FileCollection, target: Option<&str>) -> Result<(), BakeError> {
        let candidates: Vec<&FileHeader> = match target {
            Some(path) => files
                .with_extensions(&["ent"])
                .filter(|f| Self::output_path(f) == path)
                .collect(),
            None => files.with_extensions(&["ent"]).collect(),
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
