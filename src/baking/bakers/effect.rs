//! Effect baker: splits `.fx` shader effect sources into per-pass
//! vertex/fragment blobs.
//!
//! An effect source groups one or more `pass` blocks, each carrying a
//! `vert { .. }` and a `frag { .. }` section. Baking emits the original
//! source unchanged (the mapper tooling re-parses it) plus one compiled
//! blob per stage per pass.

use std::sync::Arc;

use crate::baking::baker::{bake_units, BakeError, Baker};
use crate::baking::context::BakingContext;
use crate::vfs::{FileCollection, FileHeader};

/// Upper bound on passes per effect. The checker is consulted for every
/// stage variant up to this bound regardless of the actual pass count:
/// an effect whose pass count shrinks between runs must still get its
/// now-orphaned variants recorded so the output sweep can delete them.
pub const MAX_EFFECT_PASSES: usize = 6;

/// One parsed pass of an effect source.
#[derive(Debug, PartialEq, Eq)]
struct EffectPass {
    vert: String,
    frag: String,
}

/// Compiles shader effect sources.
pub struct EffectBaker {
    ctx: Arc<BakingContext>,
}

impl EffectBaker {
    /// Baker name as referenced from pack configuration.
    pub const NAME: &'static str = "Effect";

    pub fn new(ctx: Arc<BakingContext>) -> Self {
        Self { ctx }
    }

    /// Every output name this source could plausibly produce.
    fn candidate_outputs(path: &str) -> Vec<String> {
        let mut outputs = Vec::with_capacity(1 + MAX_EFFECT_PASSES * 2);
        outputs.push(path.to_string());
        for pass in 0..MAX_EFFECT_PASSES {
            outputs.push(format!("{}-v{}", path, pass));
            outputs.push(format!("{}-f{}", path, pass));
        }
        outputs
    }

    fn parse_passes(source: &str, path: &str) -> Result<Vec<EffectPass>, String> {
        let mut passes = Vec::new();
        let mut current: Option<(Option<String>, Option<String>)> = None;
        let mut lines = source.lines().enumerate();

        while let Some((idx, raw)) = lines.next() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with("//") {
                continue;
            }

            if line == "pass" {
                if let Some(pass) = current.take() {
                    passes.push(Self::finish_pass(pass, path)?);
                }
                current = Some((None, None));
            } else if line == "vert {" || line == "frag {" {
                let Some(pass) = current.as_mut() else {
                    return Err(format!("{}:{}: stage outside of a pass", path, idx + 1));
                };
                let mut body = Vec::new();
                loop {
                    let Some((_, body_raw)) = lines.next() else {
                        return Err(format!("{}:{}: unterminated stage block", path, idx + 1));
                    };
                    let body_line = body_raw.trim();
                    if body_line == "}" {
                        break;
                    }
                    if body_line.starts_with("//") {
                        continue;
                    }
                    body.push(body_line.to_string());
                }
                let compiled = body.join("\n");
                if line.starts_with("vert") {
                    pass.0 = Some(compiled);
                } else {
                    pass.1 = Some(compiled);
                }
            } else {
                return Err(format!("{}:{}: unexpected token '{}'", path, idx + 1, line));
            }
        }

        if let Some(pass) = current.take() {
            passes.push(Self::finish_pass(pass, path)?);
        }

        if passes.is_empty() {
            return Err(format!("{}: no passes defined", path));
        }
        if passes.len() > MAX_EFFECT_PASSES {
            return Err(format!(
                "{}: {} passes exceed the supported maximum of {}",
                path,
                passes.len(),
                MAX_EFFECT_PASSES
            ));
        }

        Ok(passes)
    }

    fn finish_pass(
        pass: (Option<String>, Option<String>),
        path: &str,
    ) -> Result<EffectPass, String> {
        match pass {
            (Some(vert), Some(frag)) => Ok(EffectPass { vert, frag }),
            (None, _) => Err(format!("{}: pass is missing a vert stage", path)),
            (_, None) => Err(format!("{}: pass is missing a frag stage", path)),
        }
    }

    fn bake_one(&self, file: &FileHeader) -> Result<(), String> {
        let source = std::fs::read_to_string(&file.full_path)
            .map_err(|e| format!("{}: {}", file.path, e))?;
        let passes = Self::parse_passes(&source, &file.path)?;

        // Original text is stored as-is alongside the compiled stages.
        self.ctx
            .write_data(&file.path, source.as_bytes())
            .map_err(|e| format!("{}: {}", file.path, e))?;

        for (idx, pass) in passes.iter().enumerate() {
            self.ctx
                .write_data(&format!("{}-v{}", file.path, idx), pass.vert.as_bytes())
                .map_err(|e| format!("{}: {}", file.path, e))?;
            self.ctx
                .write_data(&format!("{}-f{}", file.path, idx), pass.frag.as_bytes())
                .map_err(|e| format!("{}: {}", file.path, e))?;
        }

        Ok(())
    }
}

impl Baker for EffectBaker {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn order(&self) -> i32 {
        0
    }

    fn bake_files(&self, files: &FileCollection, target: Option<&str>) -> Result<(), BakeError> {
        let candidates: Vec<&FileHeader> = match target {
            Some(path) => files
                .with_extensions(&["fx"])
                .filter(|f| Self::candidate_outputs(&f.path).iter().any(|o| o == path))
                .collect(),
            None => files.with_extensions(&["fx"]).collect(),
        };

        // Ask about every variant before deciding anything; `any` must not
        // short-circuit past unchecked candidates.
        let stale: Vec<&FileHeader> = candidates
            .into_iter()
            .filter(|f| {
                let checks: Vec<bool> = Self::candidate_outputs(&f.path)
                    .iter()
                    .map(|output| self.ctx.check(output, f.write_time))
                    .collect();
                checks.into_iter().any(|stale| stale)
            })
            .collect();

        bake_units(&self.ctx, Self::NAME, &stale, |file| self.bake_one(file))
    }
}
