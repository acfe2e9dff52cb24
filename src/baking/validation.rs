//! Cross-cutting property validation used by the Proto and Map bakers.
//!
//! After an entity's property block is produced, every resource-typed
//! property must name an artifact that exists in the upstream baked-files
//! view, and every script-function property must resolve to a function
//! with the exact expected signature. Violations are logged one by one
//! and counted; the calling baker decides whether a non-zero count is
//! fatal. Nothing here aborts early - a broken prototype surfaces all of
//! its problems in one report.

use std::collections::{BTreeMap, HashMap, HashSet};

use log::error;
use regex::Regex;

use crate::baking::baker::strip_extension;
use crate::vfs::FileCollection;

/// Property-name suffixes that mark a value as a resource reference.
pub const RESOURCE_PROP_SUFFIXES: &[&str] = &["Pic", "Sound", "Model", "Effect"];

/// Expected argument count per script-function property. A script-typed
/// property outside this table is itself a validation error.
const SCRIPT_SIGNATURES: &[(&str, usize)] = &[
    ("ScriptInit", 1),     // (entity)
    ("ScriptThink", 2),    // (entity, tick)
    ("ScriptTrigger", 2),  // (entity, other)
    ("ScriptDamage", 3),   // (entity, other, amount)
];

/// Expected arity for a script-function property, if it is a known one.
pub fn script_signature_arity(prop: &str) -> Option<usize> {
    SCRIPT_SIGNATURES.iter().find(|(name, _)| *name == prop).map(|(_, arity)| *arity)
}

/// Whether a property name marks its value as a resource reference.
pub fn is_resource_prop(prop: &str) -> bool {
    RESOURCE_PROP_SUFFIXES.iter().any(|suffix| prop.ends_with(suffix))
}

/// Function names and arities declared across a pack's script sources.
#[derive(Debug, Default)]
pub struct ScriptIndex {
    functions: HashMap<String, usize>,
}

impl ScriptIndex {
    /// Scan every `.scr` source in the collection for `fn name(args)`
    /// declarations.
    pub fn build(files: &FileCollection) -> Self {
        let decl = Regex::new(r"(?m)^\s*fn\s+([A-Za-z_]\w*)\s*\(([^)]*)\)")
            .expect("function declaration pattern is valid");

        let mut functions = HashMap::new();
        for file in files.with_extensions(&["scr"]) {
            let Ok(source) = std::fs::read_to_string(&file.full_path) else {
                continue;
            };
            for capture in decl.captures_iter(&source) {
                let name = capture[1].to_string();
                let args = capture[2].trim();
                let arity =
                    if args.is_empty() { 0 } else { args.split(',').count() };
                functions.insert(name, arity);
            }
        }

        Self { functions }
    }

    /// Arity of a declared function, if present.
    pub fn arity_of(&self, name: &str) -> Option<usize> {
        self.functions.get(name).copied()
    }

    /// Number of indexed functions.
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Check if no functions were found.
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

/// Extension-stripped names of every artifact in a baked-files view.
pub fn resource_names(baked: &FileCollection) -> HashSet<String> {
    baked.files().iter().map(|f| strip_extension(&f.path)).collect()
}

/// Validate one entity's property block.
///
/// `owner` identifies the entity for log lines (source file plus entity
/// name). Returns the number of violations; every violation has already
/// been logged when this returns.
pub fn validate_properties(
    owner: &str,
    props: &BTreeMap<String, String>,
    baked_names: Option<&HashSet<String>>,
    scripts: &ScriptIndex,
) -> usize {
    let mut errors = 0;

    for (prop, value) in props {
        if is_resource_prop(prop) {
            let Some(names) = baked_names else {
                // No baked-files view attached; resource existence cannot
                // be decided here.
                continue;
            };
            if !names.contains(&strip_extension(value)) {
                error!("{}: property '{}' references missing resource '{}'", owner, prop, value);
                errors += 1;
            }
        } else if prop.starts_with("Script") {
            match script_signature_arity(prop) {
                Some(expected) => match scripts.arity_of(value) {
                    Some(actual) if actual == expected => {}
                    Some(actual) => {
                        error!(
                            "{}: property '{}' expects function '{}' with {} args, found {}",
                            owner, prop, value, expected, actual
                        );
                        errors += 1;
                    }
                    None => {
                        error!(
                            "{}: property '{}' references unknown function '{}'",
                            owner, prop, value
                        );
                        errors += 1;
                    }
                },
                None => {
                    error!("{}: unknown script property '{}'", owner, prop);
                    errors += 1;
                }
            }
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::baking::test_support::collection_from;

    fn props(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_is_resource_prop() {
        assert!(is_resource_prop("IdlePic"));
        assert!(is_resource_prop("AmbientSound"));
        assert!(!is_resource_prop("Name"));
    }

    #[test]
    fn test_script_index_build() {
        let files = collection_from(&[(
            "logic.scr",
            "fn on_init(entity) {\n}\n\nfn on_think(entity, tick) {\n}\n",
        )]);

        let index = ScriptIndex::build(&files);
        assert_eq!(index.len(), 2);
        assert_eq!(index.arity_of("on_init"), Some(1));
        assert_eq!(index.arity_of("on_think"), Some(2));
        assert_eq!(index.arity_of("missing"), None);
    }

    #[test]
    fn test_validate_missing_resource() {
        let baked = collection_from(&[("art/chair.png", "png")]);
        let names = resource_names(&baked);

        let count = validate_properties(
            "props.ent:Chair",
            &props(&[("IdlePic", "art/chair.png"), ("BrokenPic", "art/missing.png")]),
            Some(&names),
            &ScriptIndex::default(),
        );

        assert_eq!(count, 1);
    }

    #[test]
    fn test_validate_resource_extension_stripped() {
        // A source names the pre-bake extension while the artifact carries
        // the baked one; the stripped names still line up.
        let baked = collection_from(&[("art/chair.png", "png")]);
        let names = resource_names(&baked);

        let count = validate_properties(
            "props.ent:Chair",
            &props(&[("IdlePic", "art/chair.tga")]),
            Some(&names),
            &ScriptIndex::default(),
        );

        assert_eq!(count, 0);
    }

    #[test]
    fn test_validate_script_signature() {
        let files = collection_from(&[("logic.scr", "fn boot(entity) {}\nfn tick(e, t) {}\n")]);
        let index = ScriptIndex::build(&files);

        let good = validate_properties(
            "m.map:Door",
            &props(&[("ScriptInit", "boot"), ("ScriptThink", "tick")]),
            None,
            &index,
        );
        assert_eq!(good, 0);

        let wrong_arity =
            validate_properties("m.map:Door", &props(&[("ScriptInit", "tick")]), None, &index);
        assert_eq!(wrong_arity, 1);

        let unknown_fn =
            validate_properties("m.map:Door", &props(&[("ScriptInit", "nope")]), None, &index);
        assert_eq!(unknown_fn, 1);
    }

    #[test]
    fn test_validate_unknown_script_property() {
        let count = validate_properties(
            "m.map:Door",
            &props(&[("ScriptExplode", "boom")]),
            None,
            &ScriptIndex::default(),
        );
        assert_eq!(count, 1);
    }

    #[test]
    fn test_validate_collects_all_errors() {
        let count = validate_properties(
            "m.map:Door",
            &props(&[("ScriptExplode", "boom"), ("ScriptInit", "nope")]),
            None,
            &ScriptIndex::default(),
        );
        assert_eq!(count, 2);
    }

    #[test]
    fn test_validate_skips_resources_without_baked_view() {
        let count = validate_properties(
            "props.ent:Chair",
            &props(&[("IdlePic", "art/anything.png")]),
            None,
            &ScriptIndex::default(),
        );
        assert_eq!(count, 0);
    }
}
