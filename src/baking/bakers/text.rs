//! Text baker: merges localized `key = value` message files into one
//! table per language.
//!
//! Sources are named `<base>.<lang>.msg`. Every file of a language merges
//! into `<Pack>.msgb-<lang>`, sorted by key; later files (collection
//! order) override earlier ones on key collisions.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::error;

use crate::baking::baker::{BakeError, Baker};
use crate::baking::context::BakingContext;
use crate::vfs::{FileCollection, FileHeader};

/// Merges localized message files per language.
pub struct TextBaker {
    ctx: Arc<BakingContext>,
}

impl TextBaker {
    /// Baker name as referenced from pack configuration.
    pub const NAME: &'static str = "Text";

    pub fn new(ctx: Arc<BakingContext>) -> Self {
        Self { ctx }
    }

    fn output_name(pack: &str, lang: &str) -> String {
        format!("{}.msgb-{}", pack, lang)
    }

    /// Language code from `<base>.<lang>.msg`, or an error for files that
    /// do not follow the naming scheme.
    fn lang_of(file: &FileHeader) -> Result<String, String> {
        let stem = file.path.trim_end_matches(".msg");
        match stem.rsplit_once('.') {
            Some((_, lang)) if !lang.is_empty() => Ok(lang.to_string()),
            _ => Err(format!("{}: message file is missing a language code", file.path)),
        }
    }

    fn parse_messages(
        source: &str,
        path: &str,
        into: &mut BTreeMap<String, String>,
        errors: &mut Vec<String>,
    ) {
        for (idx, raw) in source.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match line.split_once('=') {
                Some((key, value)) if !key.trim().is_empty() => {
                    into.insert(key.trim().to_string(), value.trim().to_string());
                }
                _ => errors.push(format!("{}:{}: malformed message line '{}'", path, idx + 1, line)),
            }
        }
    }

    fn render(messages: &BTreeMap<String, String>) -> Vec<u8> {
        let mut out = String::new();
        for (key, value) in messages {
            out.push_str(&format!("{} = {}\n", key, value));
        }
        out.into_bytes()
    }
}

impl Baker for TextBaker {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn order(&self) -> i32 {
        1
    }

    fn bake_files(&self, files: &FileCollection, target: Option<&str>) -> Result<(), BakeError> {
        let sources: Vec<&FileHeader> = files.with_extensions(&["msg"]).collect();
        if sources.is_empty() {
            return Ok(());
        }

        let pack = self.ctx.pack_name.clone();
        let mut errors = Vec::new();

        // Group per language, tracking each language's newest input.
        let mut by_lang: BTreeMap<String, (Vec<&FileHeader>, u64)> = BTreeMap::new();
        for file in &sources {
            match Self::lang_of(file) {
                Ok(lang) => {
                    let entry = by_lang.entry(lang).or_insert_with(|| (Vec::new(), 0));
                    entry.0.push(file);
                    entry.1 = entry.1.max(file.write_time);
                }
                Err(message) => errors.push(message),
            }
        }

        for (lang, (lang_files, newest)) in &by_lang {
            let output = Self::output_name(&pack, lang);
            if let Some(path) = target {
                if output != path {
                    continue;
                }
            }
            if !self.ctx.check(&output, *newest) {
                continue;
            }

            let mut messages = BTreeMap::new();
            for file in lang_files {
                match std::fs::read_to_string(&file.full_path) {
                    Ok(source) => {
                        Self::parse_messages(&source, &file.path, &mut messages, &mut errors)
                    }
                    Err(e) => errors.push(format!("{}: {}", file.path, e)),
                }
            }

            self.ctx.write_data(&output, &Self::render(&messages))?;
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
