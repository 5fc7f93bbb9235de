// ============================================================
// Layer 4 — Dataset Assembly
// ============================================================
// Joins a source record stream with an (optional) target
// record stream into `NmtExample`s, binds their fields to a
// schema, filters them, and exposes them through Burn's
// Dataset trait.
//
//   SourceRecord ─┐
//                 ├─► NmtExample ─► peek first ─► bind fields ─► filter
//   TargetRecord ─┘   (joined)       (schema)      (validate)
//
// Field names carried by an example:
//   src, src_feat_{j}..., src_path (img), tgt, tgt_feat_{j}..., indices
//
// A name registered in the `FieldRegistry` is bound to its
// registered kind; anything else is bound as a raw field.
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

use std::collections::BTreeMap;

use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};

use crate::data::vocab::Vocabulary;
use crate::data::vocab_builder::SideVocabs;
use crate::domain::constants::{BOS, EOS, PAD};
use crate::domain::error::{PreprocessError, Result};
use crate::domain::example::{DataType, SourceData};

// ─── Records ──────────────────────────────────────────────────────────────────
/// Source side of one indexed example.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRecord {
    pub index:    usize,
    pub src:      SourceData,
    pub src_path: Option<String>,
    pub features: Vec<Vec<u32>>,
}

/// Target side of one indexed example. `tgt` is wrapped in BOS/EOS.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetRecord {
    pub index:    usize,
    pub tgt:      Vec<u32>,
    pub features: Vec<Vec<u32>>,
}

/// One assembled example: a source record joined with its target record
/// (absent in inference mode).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NmtExample {
    pub indices:      usize,
    pub src:          SourceData,
    pub src_path:     Option<String>,
    pub src_features: Vec<Vec<u32>>,
    pub tgt:          Option<Vec<u32>>,
    pub tgt_features: Vec<Vec<u32>>,
}

impl NmtExample {
    fn join(src: SourceRecord, tgt: Option<TargetRecord>) -> Self {
        let (tgt, tgt_features) = match tgt {
            Some(t) => (Some(t.tgt), t.features),
            None    => (None, Vec::new()),
        };
        Self {
            indices:      src.index,
            src:          src.src,
            src_path:     src.src_path,
            src_features: src.features,
            tgt,
            tgt_features,
        }
    }

    /// Names of the fields this example carries, in schema order
    pub fn field_names(&self) -> Vec<String> {
        let mut names = vec!["src".to_string()];
        names.extend((0..self.src_features.len()).map(|j| format!("src_feat_{j}")));
        if self.src_path.is_some() {
            names.push("src_path".to_string());
        }
        if self.tgt.is_some() {
            names.push("tgt".to_string());
            names.extend((0..self.tgt_features.len()).map(|j| format!("tgt_feat_{j}")));
        }
        names.push("indices".to_string());
        names
    }

    /// Target word count, not counting the BOS/EOS wrapper
    pub fn tgt_len(&self) -> Option<usize> {
        self.tgt.as_ref().map(|t| t.len().saturating_sub(2))
    }

    /// Batching order key.
    ///
    /// - img:  `(-width, -height)` → largest images first
    /// - text: `(src_len, tgt_len)` ascending
    pub fn sort_key(&self) -> (i64, i64) {
        match &self.src {
            SourceData::Image(img) => (-(img.width as i64), -(img.height as i64)),
            SourceData::Text(ids)  => (ids.len() as i64, self.tgt_len().unwrap_or(0) as i64),
        }
    }
}

// ─── Field schema ─────────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    /// Index sequence over a vocabulary
    Tokens {
        vocab_size: usize,
        pad:        u32,
        bos:        Option<u32>,
        eos:        Option<u32>,
    },
    /// Decoded source image
    Image,
    /// Example position
    Index,
    /// Carried along without interpretation
    Raw,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub kind: FieldKind,
}

/// Known fields, by name.
#[derive(Debug, Clone, Default)]
pub struct FieldRegistry {
    fields: BTreeMap<String, FieldKind>,
}

impl FieldRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, kind: FieldKind) -> &mut Self {
        self.fields.insert(name.into(), kind);
        self
    }

    /// Fields of a corpus indexed with these vocabularies.
    pub fn for_vocabs(data_type: DataType, src: &SideVocabs, tgt: &SideVocabs) -> Self {
        let plain = |v: &Vocabulary| FieldKind::Tokens {
            vocab_size: v.len(),
            pad:        PAD,
            bos:        None,
            eos:        None,
        };

        let mut registry = Self::new();
        match data_type {
            DataType::Text => {
                registry.register("src", plain(&src.words));
                for (j, v) in src.features.iter().enumerate() {
                    registry.register(format!("src_feat_{j}"), plain(v));
                }
            }
            DataType::Img => {
                registry.register("src", FieldKind::Image);
            }
        }
        registry.register(
            "tgt",
            FieldKind::Tokens {
                vocab_size: tgt.words.len(),
                pad:        PAD,
                bos:        Some(BOS),
                eos:        Some(EOS),
            },
        );
        for (j, v) in tgt.features.iter().enumerate() {
            registry.register(format!("tgt_feat_{j}"), plain(v));
        }
        registry.register("indices", FieldKind::Index);
        registry
    }

    /// The registered field for `name`, or a raw one
    pub fn bind(&self, name: &str) -> Field {
        Field {
            name: name.to_string(),
            kind: self.fields.get(name).cloned().unwrap_or(FieldKind::Raw),
        }
    }
}

// ─── NmtDataset ───────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct NmtDataset {
    data_type:  DataType,
    fields:     Vec<Field>,
    examples:   Vec<NmtExample>,
    has_target: bool,
}

impl NmtDataset {
    /// Join, bind and filter.
    ///
    /// With a target stream (training) an example is kept only if its
    /// target has `1..=tgt_seq_length` words. Without one (inference)
    /// or with `use_filter_pred == false`, every example is kept.
    pub fn assemble<S, T>(
        registry:        &FieldRegistry,
        src_records:     S,
        tgt_records:     Option<T>,
        tgt_seq_length:  usize,
        use_filter_pred: bool,
    ) -> Result<Self>
    where
        S: IntoIterator<Item = SourceRecord>,
        T: IntoIterator<Item = TargetRecord>,
    {
        let has_target = tgt_records.is_some();
        let joined: Vec<NmtExample> = match tgt_records {
            Some(tgt) => src_records
                .into_iter()
                .zip(tgt)
                .map(|(s, t)| NmtExample::join(s, Some(t)))
                .collect(),
            None => src_records
                .into_iter()
                .map(|s| NmtExample::join(s, None))
                .collect(),
        };

        let mut stream = joined.into_iter().peekable();

        // Peek at the first example to see which fields are used
        let Some(first) = stream.peek() else {
            return Ok(Self {
                data_type: DataType::Text,
                fields: Vec::new(),
                examples: Vec::new(),
                has_target,
            });
        };
        let data_type = first.src.data_type();
        let names     = first.field_names();
        let fields: Vec<Field> = names.iter().map(|n| registry.bind(n)).collect();

        let keep = |ex: &NmtExample| -> bool {
            if !(use_filter_pred && has_target) {
                return true;
            }
            matches!(ex.tgt_len(), Some(n) if n > 0 && n <= tgt_seq_length)
        };

        let mut examples = Vec::new();
        for (i, ex) in stream.enumerate() {
            let found = ex.field_names();
            if found != names {
                return Err(PreprocessError::SchemaMismatch {
                    index:    i,
                    expected: names,
                    found,
                });
            }
            if keep(&ex) {
                examples.push(ex);
            }
        }

        tracing::debug!(
            "Assembled {} {} examples with fields {:?}",
            examples.len(),
            data_type,
            names
        );
        Ok(Self { data_type, fields, examples, has_target })
    }

    /// Wrap examples that were already assembled, e.g. a saved split.
    pub fn from_examples(
        data_type:  DataType,
        fields:     Vec<Field>,
        examples:   Vec<NmtExample>,
        has_target: bool,
    ) -> Self {
        Self { data_type, fields, examples, has_target }
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn examples(&self) -> &[NmtExample] {
        &self.examples
    }

    pub fn has_target(&self) -> bool {
        self.has_target
    }

    /// Example indices ordered by `sort_key` (stable), chunked into
    /// batches of at most `batch_size`.
    pub fn batch_order(&self, batch_size: usize) -> Vec<Vec<usize>> {
        let mut order: Vec<usize> = (0..self.examples.len()).collect();
        order.sort_by_key(|&i| self.examples[i].sort_key());
        order
            .chunks(batch_size.max(1))
            .map(<[usize]>::to_vec)
            .collect()
    }
}

/// Burn's Dataset trait so the dataset plugs into a DataLoader
impl Dataset<NmtExample> for NmtDataset {
    fn get(&self, index: usize) -> Option<NmtExample> {
        self.examples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.examples.len()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::example::ImageTensor;

    fn text_src(index: usize, len: usize, feats: usize) -> SourceRecord {
        SourceRecord {
            index,
            src:      SourceData::Text(vec![5; len]),
            src_path: None,
            features: vec![vec![5; len]; feats],
        }
    }

    fn tgt(index: usize, words: usize) -> TargetRecord {
        let mut ids = vec![BOS];
        ids.extend(std::iter::repeat(7).take(words));
        ids.push(EOS);
        TargetRecord { index, tgt: ids, features: Vec::new() }
    }

    fn img_src(index: usize, h: usize, w: usize) -> SourceRecord {
        SourceRecord {
            index,
            src:      SourceData::Image(ImageTensor::new(1, h, w, vec![0.0; h * w])),
            src_path: Some(format!("{index}.png")),
            features: Vec::new(),
        }
    }

    #[test]
    fn test_filter_drops_empty_and_long_targets() {
        let src = vec![text_src(0, 2, 0), text_src(1, 2, 0), text_src(2, 2, 0)];
        let tgt = vec![tgt(0, 0), tgt(1, 3), tgt(2, 9)];

        let ds = NmtDataset::assemble(&FieldRegistry::new(), src, Some(tgt), 5, true).unwrap();
        assert_eq!(ds.len(), 1);
        assert_eq!(ds.get(0).unwrap().indices, 1);
    }

    #[test]
    fn test_filter_can_be_disabled() {
        let src = vec![text_src(0, 2, 0)];
        let tgt = vec![tgt(0, 0)];
        let ds = NmtDataset::assemble(&FieldRegistry::new(), src, Some(tgt), 5, false).unwrap();
        assert_eq!(ds.len(), 1);
    }

    #[test]
    fn test_inference_mode_keeps_everything() {
        let src = vec![text_src(0, 1, 0), text_src(1, 80, 0)];
        let ds = NmtDataset::assemble(&FieldRegistry::new(), src, None::<Vec<TargetRecord>>, 5, true)
            .unwrap();
        assert_eq!(ds.len(), 2);
        assert!(!ds.has_target());
        assert!(ds.get(0).unwrap().tgt.is_none());
    }

    #[test]
    fn test_fields_bind_to_registry_or_raw() {
        let src_v = SideVocabs::empty();
        let tgt_v = SideVocabs::empty();
        let registry = FieldRegistry::for_vocabs(DataType::Img, &src_v, &tgt_v);

        let ds = NmtDataset::assemble(&registry, vec![img_src(0, 2, 2)], Some(vec![tgt(0, 1)]), 5, true)
            .unwrap();
        let kinds: Vec<(&str, &FieldKind)> =
            ds.fields().iter().map(|f| (f.name.as_str(), &f.kind)).collect();

        assert_eq!(kinds[0], ("src", &FieldKind::Image));
        assert_eq!(kinds[1], ("src_path", &FieldKind::Raw));
        assert_eq!(kinds[2].0, "tgt");
        assert!(matches!(kinds[2].1, FieldKind::Tokens { bos: Some(_), .. }));
        assert_eq!(kinds[3], ("indices", &FieldKind::Index));
        assert_eq!(ds.data_type(), DataType::Img);
    }

    #[test]
    fn test_schema_mismatch_is_rejected() {
        let src = vec![text_src(0, 2, 1), text_src(1, 2, 0)];
        let tgt = vec![tgt(0, 1), tgt(1, 1)];
        let err = NmtDataset::assemble(&FieldRegistry::new(), src, Some(tgt), 5, true).unwrap_err();
        assert!(matches!(err, PreprocessError::SchemaMismatch { index: 1, .. }));
    }

    #[test]
    fn test_image_sort_key_puts_largest_first() {
        let src = vec![img_src(0, 2, 2), img_src(1, 8, 4), img_src(2, 3, 4)];
        let tgts = vec![tgt(0, 1), tgt(1, 1), tgt(2, 1)];
        let ds = NmtDataset::assemble(&FieldRegistry::new(), src, Some(tgts), 5, true).unwrap();

        let order = ds.batch_order(10);
        // width 4 before width 2; among width 4, taller first
        assert_eq!(order, vec![vec![1, 2, 0]]);
    }

    #[test]
    fn test_text_batch_order_groups_by_length() {
        let src = vec![text_src(0, 5, 0), text_src(1, 1, 0), text_src(2, 3, 0)];
        let tgts = vec![tgt(0, 1), tgt(1, 1), tgt(2, 1)];
        let ds = NmtDataset::assemble(&FieldRegistry::new(), src, Some(tgts), 5, true).unwrap();

        assert_eq!(ds.batch_order(2), vec![vec![1, 2], vec![0]]);
    }

    #[test]
    fn test_empty_stream() {
        let ds = NmtDataset::assemble(
            &FieldRegistry::new(),
            Vec::<SourceRecord>::new(),
            Some(Vec::<TargetRecord>::new()),
            5,
            true,
        )
        .unwrap();
        assert!(ds.is_empty());
        assert!(ds.fields().is_empty());
    }
}
