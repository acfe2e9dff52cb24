//! Image baker: decodes source textures and re-encodes them as PNG.

use std::io::Cursor;
use std::sync::Arc;

use crate::baking::baker::{bake_units, replace_extension, BakeError, Baker};
use crate::baking::context::BakingContext;
use crate::vfs::{FileCollection, FileHeader};

const IMAGE_EXTENSIONS: &[&str] = &["png", "tga", "bmp", "jpg", "jpeg"];

/// Converts source textures into the engine's runtime format (PNG).
pub struct ImageBaker {
    ctx: Arc<BakingContext>,
}

impl ImageBaker {
    /// Baker name as referenced from pack configuration.
    pub const NAME: &'static str = "Image";

    pub fn new(ctx: Arc<BakingContext>) -> Self {
        Self { ctx }
    }

    fn output_path(file: &FileHeader) -> String {
        replace_extension(&file.path, "png")
    }

    fn bake_one(&self, file: &FileHeader) -> Result<(), String> {
        let bytes = file.read().map_err(|e| format!("{}: {}", file.path, e))?;
        let img = image::load_from_memory(&bytes)
            .map_err(|e| format!("{}: {}", file.path, e))?;

        let mut encoded = Vec::new();
        img.write_to(&mut Cursor::new(&mut encoded), image::ImageOutputFormat::Png)
            .map_err(|e| format!("{}: {}", file.path, e))?;

        self.ctx
            .write_data(&Self::output_path(file), &encoded)
            .map_err(|e| format!("{}: {}", file.path, e))
    }
}

impl Baker for ImageBaker {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn order(&self) -> i32 {
        0
    }

    fn bake_files(&self, files: &FileCollection, target: Option<&str>) -> Result<(), BakeError> {
        let candidates: Vec<&FileHeader> = match target {
            Some(path) => files
                .with_extensions(IMAGE_EXTENSIONS)
                .filter(|f| Self::output_path(f) == path)
                .collect(),
            None => files.with_extensions(IMAGE_EXTENSIONS).collect(),
        };

        let stale: Vec<&FileHeader> = candidates
            .into_iter()
            .filter(|f| self.ctx.check(&Self::output_path(f), f.write_time))
            .collect();

        bake_units(&self.ctx, Self::NAME, &stale, |file| self.bake_one(file))
    }
}
