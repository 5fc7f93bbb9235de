// ============================================================
// Layer 4 — Source Images
// ============================================================
// img-mode helpers: locating the image a source line names,
// and the concrete `ImageLoader` built on the `image` crate.
//
// A source line names an image relative to the image
// directory. If that file does not exist the line itself is
// tried as a path. Neither existing is fatal.
//
// Decoded pixels are converted from the crate's interleaved
// HWC layout to channel-major CHW with values in [0, 1].

use std::path::{Path, PathBuf};

use crate::domain::error::{PreprocessError, Result};
use crate::domain::example::ImageTensor;
use crate::domain::traits::ImageLoader;

/// Fail unless `src_dir` is an existing directory.
pub fn check_image_dir(src_dir: &Path) -> Result<()> {
    if src_dir.is_dir() {
        Ok(())
    } else {
        Err(PreprocessError::MissingResource {
            what: "source image directory",
            path: src_dir.to_path_buf(),
        })
    }
}

/// `src_dir/name` if it exists, else `name` itself if it exists.
pub fn resolve_image_path(src_dir: &Path, name: &str) -> Result<PathBuf> {
    let joined = src_dir.join(name);
    if joined.exists() {
        return Ok(joined);
    }
    let raw = PathBuf::from(name);
    if raw.exists() {
        return Ok(raw);
    }
    Err(PreprocessError::MissingResource { what: "image", path: joined })
}

/// Decodes image files with the `image` crate.
/// Gray (and gray+alpha) images give 1 channel, everything else 3.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageCrateLoader;

impl ImageLoader for ImageCrateLoader {
    fn load(&self, path: &Path) -> Result<ImageTensor> {
        let img = image::open(path).map_err(|e| PreprocessError::Image {
            path:    path.to_path_buf(),
            message: e.to_string(),
        })?;

        let width  = img.width() as usize;
        let height = img.height() as usize;

        let (channels, interleaved) = match img.color().channel_count() {
            1 | 2 => (1, img.to_luma32f().into_raw()),
            _     => (3, img.to_rgb32f().into_raw()),
        };

        // HWC → CHW
        let mut data = vec![0.0f32; interleaved.len()];
        for y in 0..height {
            for x in 0..width {
                for c in 0..channels {
                    data[(c * height + y) * width + x] = interleaved[(y * width + x) * channels + c];
                }
            }
        }

        tracing::debug!("Decoded {} ({}x{}x{})", path.display(), channels, height, width);
        Ok(ImageTensor::new(channels, height, width, data))
    }
}
