// ============================================================
// Layer 4 — NMT Batcher
// ============================================================
// Implements Burn's Batcher trait: stacks a Vec<NmtExample>
// into padded tensors.
//
//   text source:  [batch, max_src_len]   Int,  PAD-filled
//   img source:   [batch, C, H_max, W_max] Float, zero-filled
//   target:       [batch, max_tgt_len]   Int,  PAD-filled
//
// Every Int sequence comes with a Bool mask that is true at
// padding positions; `ml::attention::key_padding_mask` turns
// it into an attention mask.
//
// Reference: Burn Book §4 (Batcher)

use burn::{data::dataloader::batcher::Batcher, prelude::*};

use crate::data::dataset::NmtExample;
use crate::domain::constants::PAD;
use crate::domain::example::ImageTensor;

// ─── NmtBatch ─────────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub enum BatchSource<B: Backend> {
    Text {
        /// [batch, src_len]
        tokens:       Tensor<B, 2, Int>,
        /// [batch, src_len], true = PAD
        padding_mask: Tensor<B, 2, Bool>,
    },
    /// [batch, channels, height, width]
    Image(Tensor<B, 4>),
}

/// One padded batch. All tensors have batch size as their first dimension.
#[derive(Debug, Clone)]
pub struct NmtBatch<B: Backend> {
    pub src:              BatchSource<B>,
    /// One [batch, src_len] tensor per source feature column
    pub src_features:     Vec<Tensor<B, 2, Int>>,
    /// [batch, tgt_len], `None` in inference mode
    pub tgt:              Option<Tensor<B, 2, Int>>,
    pub tgt_padding_mask: Option<Tensor<B, 2, Bool>>,
    pub tgt_features:     Vec<Tensor<B, 2, Int>>,
    /// Unpadded source lengths
    pub src_lengths:      Vec<usize>,
    /// Dataset `indices` of each row
    pub indices:          Vec<usize>,
}

// ─── NmtBatcher ───────────────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct NmtBatcher {
    pad: u32,
}

impl NmtBatcher {
    pub fn new() -> Self {
        Self { pad: PAD }
    }

    /// Pad with a different index than the reserved PAD symbol
    pub fn with_pad(pad: u32) -> Self {
        Self { pad }
    }
}

impl Default for NmtBatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Stack sequences into [batch, max_len], filling with `pad`.
/// Returns the ids and a mask that is true at padded positions.
pub fn pad_sequences<B: Backend>(
    seqs:   &[&[u32]],
    pad:    u32,
    device: &B::Device,
) -> (Tensor<B, 2, Int>, Tensor<B, 2, Bool>) {
    let batch   = seqs.len();
    let max_len = seqs.iter().map(|s| s.len()).max().unwrap_or(0).max(1);

    let mut flat = vec![pad as i32; batch * max_len];
    let mut mask = vec![true; batch * max_len];
    for (row, seq) in seqs.iter().enumerate() {
        for (col, &id) in seq.iter().enumerate() {
            flat[row * max_len + col] = id as i32;
            mask[row * max_len + col] = false;
        }
    }

    let ids = Tensor::<B, 1, Int>::from_ints(flat.as_slice(), device).reshape([batch, max_len]);
    let mask = Tensor::<B, 1, Bool>::from_data(TensorData::new(mask, [batch * max_len]), device)
        .reshape([batch, max_len]);
    (ids, mask)
}

/// Stack images into [batch, C, H_max, W_max], zero-padding bottom/right.
pub fn pad_images<B: Backend>(images: &[&ImageTensor], device: &B::Device) -> Tensor<B, 4> {
    let batch    = images.len();
    let channels = images.iter().map(|i| i.channels).max().unwrap_or(1);
    let height   = images.iter().map(|i| i.height).max().unwrap_or(1);
    let width    = images.iter().map(|i| i.width).max().unwrap_or(1);

    let mut flat = vec![0.0f32; batch * channels * height * width];
    for (b, img) in images.iter().enumerate() {
        for c in 0..img.channels {
            for y in 0..img.height {
                let dst = ((b * channels + c) * height + y) * width;
                flat[dst..dst + img.width].copy_from_slice(
                    &img.data[(c * img.height + y) * img.width..][..img.width],
                );
            }
        }
    }

    Tensor::<B, 1>::from_floats(flat.as_slice(), device).reshape([batch, channels, height, width])
}

fn feature_columns<B: Backend>(
    items:  &[NmtExample],
    column: impl Fn(&NmtExample) -> &Vec<Vec<u32>>,
    pad:    u32,
    device: &B::Device,
) -> Vec<Tensor<B, 2, Int>> {
    let n_cols = column(&items[0]).len();
    (0..n_cols)
        .map(|j| {
            let seqs: Vec<&[u32]> = items.iter().map(|ex| column(ex)[j].as_slice()).collect();
            pad_sequences::<B>(&seqs, pad, device).0
        })
        .collect()
}

impl<B: Backend> Batcher<B, NmtExample, NmtBatch<B>> for NmtBatcher {
    /// # Panics
    /// Panics on an empty batch or a batch mixing text and image sources.
    fn batch(&self, items: Vec<NmtExample>, device: &B::Device) -> NmtBatch<B> {
        assert!(!items.is_empty(), "cannot batch zero examples");

        let src = match items[0].src.as_text() {
            Some(_) => {
                let seqs: Vec<&[u32]> = items
                    .iter()
                    .map(|ex| ex.src.as_text().expect("batch mixes text and image sources"))
                    .collect();
                let (tokens, padding_mask) = pad_sequences::<B>(&seqs, self.pad, device);
                BatchSource::Text { tokens, padding_mask }
            }
            None => {
                let images: Vec<&ImageTensor> = items
                    .iter()
                    .map(|ex| ex.src.as_image().expect("batch mixes text and image sources"))
                    .collect();
                BatchSource::Image(pad_images::<B>(&images, device))
            }
        };

        let (tgt, tgt_padding_mask) = if items.iter().all(|ex| ex.tgt.is_some()) {
            let seqs: Vec<&[u32]> = items
                .iter()
                .filter_map(|ex| ex.tgt.as_deref())
                .collect();
            let (ids, mask) = pad_sequences::<B>(&seqs, self.pad, device);
            (Some(ids), Some(mask))
        } else {
            (None, None)
        };

        NmtBatch {
            src,
            src_features:     feature_columns::<B>(&items, |ex| &ex.src_features, self.pad, device),
            tgt,
            tgt_padding_mask,
            tgt_features:     feature_columns::<B>(&items, |ex| &ex.tgt_features, self.pad, device),
            src_lengths:      items.iter().map(|ex| ex.src.len()).collect(),
            indices:          items.iter().map(|ex| ex.indices).collect(),
        }
    }
}
