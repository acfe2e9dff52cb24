//! ProtoText baker: extracts localized text embedded in entity
//! prototypes into per-language tables.
//!
//! Prototype properties named `Text_<lang>_<key>` are display strings.
//! They bake into `<Pack>.entmsg-<lang>` as sorted `Entity.key = value`
//! lines so the runtime can load prototype text through the same message
//! machinery as the Text baker's output.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::error;

use crate::baking::baker::{BakeError, Baker};
use crate::baking::bakers::proto::ProtoBaker;
use crate::baking::context::BakingContext;
use crate::vfs::{FileCollection, FileHeader};

/// Extracts prototype-embedded text into per-language tables.
pub struct ProtoTextBaker {
    ctx: Arc<BakingContext>,
}

impl ProtoTextBaker {
    /// Baker name as referenced from pack configuration.
    pub const NAME: &'static str = "ProtoText";

    pub fn new(ctx: Arc<BakingContext>) -> Self {
        Self { ctx }
    }

    fn output_name(pack: &str, lang: &str) -> String {
        format!("{}.entmsg-{}", pack, lang)
    }

    /// Split `Text_<lang>_<key>` into its language and key parts.
    fn split_text_prop(prop: &str) -> Option<(&str, &str)> {
        let rest = prop.strip_prefix("Text_")?;
        let (lang, key) = rest.split_once('_')?;
        if lang.is_empty() || key.is_empty() {
            return None;
        }
        Some((lang, key))
    }
}

impl Baker for ProtoTextBaker {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn order(&self) -> i32 {
        2
    }

    fn bake_files(&self, files: &FileCollection, target: Option<&str>) -> Result<(), BakeError> {
        let sources: Vec<&FileHeader> = files.with_extensions(&["ent"]).collect();
        if sources.is_empty() {
            return Ok(());
        }

        let pack = self.ctx.pack_name.clone();
        let newest = sources.iter().map(|f| f.write_time).max().unwrap_or(0);
        let mut errors = Vec::new();

        // lang -> sorted "Entity.key" -> value
        let mut by_lang: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();

        for file in &sources {
            let source = match std::fs::read_to_string(&file.full_path) {
                Ok(source) => source,
                Err(e) => {
                    errors.push(format!("{}: {}", file.path, e));
                    continue;
                }
            };
            let protos = match ProtoBaker::parse_protos(&source, &file.path) {
                Ok(protos) => protos,
                Err(message) => {
                    errors.push(message);
                    continue;
                }
            };

            for (entity, props) in &protos {
                for (prop, value) in ProtoBaker::string_props(props) {
                    if let Some((lang, key)) = Self::split_text_prop(&prop) {
                        by_lang
                            .entry(lang.to_string())
                            .or_default()
                            .insert(format!("{}.{}", entity, key), value);
                    }
                }
            }
        }

        for (lang, entries) in &by_lang {
            let output = Self::output_name(&pack, lang);
            if let Some(path) = target {
                if output != path {
                    continue;
                }
            }
            if !self.ctx.check(&output, newest) {
                continue;
            }

            let mut text = String::new();
            for (key, value) in entries {
                text.push_str(&format!("{} = {}\n", key, value));
            }
            self.ctx.write_data(&output, text.as_bytes())?;
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
                total: sources.len(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::baking::test_support::{collect_writes, collection_from, recording_context};

    const SIGN_ENT: &str = r#"
[Sign]
Text_en_Label = "Welcome"
Text_de_Label = "Willkommen"
Strength = 3

[Gate]
Text_en_Label = "Keep out"
"#;

    #[test]
    fn test_extracts_text_per_language() {
        let recording = recording_context(true);
        let files = collection_from(&[("props.ent", SIGN_ENT)]);

        ProtoTextBaker::new(recording.ctx).bake_files(&files, None).unwrap();

        let written = collect_writes(&recording.writes);
        assert_eq!(written.len(), 2);
        assert_eq!(
            written["Test.entmsg-en"],
            b"Gate.Label = Keep out\nSign.Label = Welcome\n"
        );
        assert_eq!(written["Test.entmsg-de"], b"Sign.Label = Willkommen\n");
    }

    #[test]
    fn test_split_text_prop() {
        assert_eq!(ProtoTextBaker::split_text_prop("Text_en_Label"), Some(("en", "Label")));
        assert_eq!(ProtoTextBaker::split_text_prop("Text_en_"), None);
        assert_eq!(ProtoTextBaker::split_text_prop("IdlePic"), None);
    }

    #[test]
    fn test_no_text_props_writes_nothing() {
        let recording = recording_context(true);
        let files = collection_from(&[("plain.ent", "[Rock]\nStrength = 1\n")]);

        ProtoTextBaker::new(recording.ctx).bake_files(&files, None).unwrap();
        assert!(collect_writes(&recording.writes).is_empty());
    }

    #[test]
    fn test_parse_error_is_counted() {
        let recording = recording_context(true);
        let files = collection_from(&[("broken.ent", "not [ toml")]);

        let err = ProtoTextBaker::new(recording.ctx).bake_files(&files, None).unwrap_err();
        assert!(matches!(err, BakeError::Aggregate { failed: 1, .. }));
    }

    #[test]
    fn test_single_target_language() {
        let recording = recording_context(true);
        let files = collection_from(&[("props.ent", SIGN_ENT)]);

        ProtoTextBaker::new(recording.ctx)
            .bake_files(&files, Some("Test.entmsg-de"))
            .unwrap();

        let written = collect_writes(&recording.writes);
        assert_eq!(written.len(), 1);
        assert!(written.contains_key("Test.entmsg-de"));
    }
}
