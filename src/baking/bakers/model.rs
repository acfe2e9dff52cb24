//! Model baker: converts `.obj` geometry into the engine's binary layout.

use std::sync::Arc;

use crate::baking::baker::{bake_units, replace_extension, BakeError, Baker};
use crate::baking::context::BakingContext;
use crate::vfs::{FileCollection, FileHeader};

const MODEL_MAGIC: &[u8; 4] = b"MDLB";
const MODEL_VERSION: u32 = 1;

/// Converts 3D geometry sources into `.mdlb` binaries: a fixed header
/// followed by little-endian vertex positions and triangle indices.
pub struct ModelBaker {
    ctx: Arc<BakingContext>,
}

impl ModelBaker {
    /// Baker name as referenced from pack configuration.
    pub const NAME: &'static str = "Model";

    pub fn new(ctx: Arc<BakingContext>) -> Self {
        Self { ctx }
    }

    fn output_path(file: &FileHeader) -> String {
        replace_extension(&file.path, "mdlb")
    }

    fn parse_obj(source: &str, path: &str) -> Result<(Vec<f32>, Vec<u32>), String> {
        let mut vertices = Vec::new();
        let mut indices = Vec::new();

        for (idx, raw) in source.lines().enumerate() {
            let line = raw.trim();
            let mut tokens = line.split_whitespace();
            match tokens.next() {
                Some("v") => {
                    for _ in 0..3 {
                        let token = tokens.next().ok_or_else(|| {
                            format!("{}:{}: vertex needs three components", path, idx + 1)
                        })?;
                        let component: f32 = token.parse().map_err(|_| {
                            format!("{}:{}: bad vertex component '{}'", path, idx + 1, token)
                        })?;
                        vertices.push(component);
                    }
                }
                Some("f") => {
                    for token in tokens {
                        // "f 1/2/3 ..." - only the position index matters here.
                        let position = token.split('/').next().unwrap_or(token);
                        let one_based: u32 = position.parse().map_err(|_| {
                            format!("{}:{}: bad face index '{}'", path, idx + 1, token)
                        })?;
                        if one_based == 0 || one_based as usize > vertices.len() / 3 {
                            return Err(format!(
                                "{}:{}: face index {} out of range",
                                path,
                                idx + 1,
                                one_based
                            ));
                        }
                        indices.push(one_based - 1);
                    }
                }
                _ => {}
            }
        }

        if vertices.is_empty() {
            return Err(format!("{}: no geometry found", path));
        }

        Ok((vertices, indices))
    }

    fn encode(vertices: &[f32], indices: &[u32]) -> Vec<u8> {
        let mut out = Vec::with_capacity(16 + vertices.len() * 4 + indices.len() * 4);
        out.extend_from_slice(MODEL_MAGIC);
        out.extend_from_slice(&MODEL_VERSION.to_le_bytes());
        out.extend_from_slice(&((vertices.len() / 3) as u32).to_le_bytes());
        out.extend_from_slice(&(indices.len() as u32).to_le_bytes());
        for component in vertices {
            out.extend_from_slice(&component.to_le_bytes());
        }
        for index in indices {
            out.extend_from_slice(&index.to_le_bytes());
        }
        out
    }

    fn bake_one(&self, file: &FileHeader) -> Result<(), String> {
        let source = std::fs::read_to_string(&file.full_path)
            .map_err(|e| format!("{}: {}", file.path, e))?;
        let (vertices, indices) = Self::parse_obj(&source, &file.path)?;
        let encoded = Self::encode(&vertices, &indices);

        self.ctx
            .write_data(&Self::output_path(file), &encoded)
            .map_err(|e| format!("{}: {}", file.path, e))
    }
}

impl Baker for ModelBaker {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn order(&self) -> i32 {
        0
    }

    fn bake_files(&self, files: &FileCollection, target: Option<&str>) -> Result<(), BakeError> {
        let candidates: Vec<&FileHeader> = match target {
            Some(path) => files
                .with_extensions(&["obj"])
                .filter(|f| Self::output_path(f) == path)
                .collect(),
            None => files.with_extensions(&["obj"]).collect(),
        };

        let stale: Vec<&FileHeader> = candidates
            .into_iter()
            .filter(|f| self.ctx.check(&Self::output_path(f), f.write_time))
            .collect();

        bake_units(&self.ctx, Self::NAME, &stale, |file| self.bake_one(file))
    }
}
