// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The pipeline never names a concrete image library. In img
// mode the application injects an `ImageLoader`; in text mode
// none is constructed at all.
//
// Implementations:
//   - ImageCrateLoader → decodes PNG/JPEG/... with the `image` crate
//   - test fakes       → synthesise tensors without touching disk

use std::path::Path;

use crate::domain::error::Result;
use crate::domain::example::ImageTensor;

// ─── ImageLoader ──────────────────────────────────────────────────────────────
/// Any component that can turn an image file into a pixel tensor.
pub trait ImageLoader {
    /// Decode the image stored at `path`.
    /// The caller has already checked that `path` exists.
    fn load(&self, path: &Path) -> Result<ImageTensor>;
}
