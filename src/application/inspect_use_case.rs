// ============================================================
// Layer 2 — Inspect Use Case
// ============================================================
// Reads a saved dataset back and summarises it:
//   1. Vocabulary sizes per side and feature column
//   2. Per split: example count, fields, mean lengths
//   3. Shape of the first batch the NmtBatcher would produce
//   4. The first few examples decoded back to words

use anyhow::Result;
use burn::{backend::NdArray, data::dataloader::batcher::Batcher};
use std::fmt;

use crate::data::batcher::{BatchSource, NmtBatch, NmtBatcher};
use crate::data::dataset::{NmtDataset, NmtExample};
use crate::domain::example::{DataType, SourceData};
use crate::infra::store::{DatasetStore, SavedDicts, SplitData};

type InspectBackend = NdArray;

/// Tensor dimensions of one batch
#[derive(Debug, Clone, PartialEq)]
pub struct BatchShape {
    pub src: Vec<usize>,
    pub tgt: Option<Vec<usize>>,
}

#[derive(Debug, Clone)]
pub struct SplitSummary {
    pub name:         String,
    pub examples:     usize,
    pub fields:       Vec<String>,
    pub mean_src_len: f64,
    /// Without BOS/EOS
    pub mean_tgt_len: Option<f64>,
    pub batches:      usize,
    pub first_batch:  Option<BatchShape>,
    /// (source, target) decoded back to words
    pub samples:      Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct DatasetSummary {
    pub data_type:    DataType,
    pub src_vocab:    usize,
    pub tgt_vocab:    usize,
    pub src_features: Vec<usize>,
    pub tgt_features: Vec<usize>,
    pub splits:       Vec<SplitSummary>,
}

pub struct InspectUseCase {
    store:      DatasetStore,
    show:       usize,
    batch_size: usize,
}

impl InspectUseCase {
    pub fn new(save_data: String, show: usize, batch_size: usize) -> Self {
        Self {
            store: DatasetStore::open(save_data),
            show,
            batch_size: batch_size.max(1),
        }
    }

    pub fn summarise(&self) -> Result<DatasetSummary> {
        let data = self.store.load_data()?;
        tracing::info!("Loaded dataset '{}'", self.store.prefix());

        let splits = [("train", &data.train), ("valid", &data.valid)]
            .into_iter()
            .map(|(name, split)| self.summarise_split(name, split, data.data_type, &data.dicts))
            .collect();

        Ok(DatasetSummary {
            data_type:    data.data_type,
            src_vocab:    data.dicts.src.len(),
            tgt_vocab:    data.dicts.tgt.len(),
            src_features: data.dicts.src_features.iter().map(|v| v.len()).collect(),
            tgt_features: data.dicts.tgt_features.iter().map(|v| v.len()).collect(),
            splits,
        })
    }

    fn summarise_split(
        &self,
        name:      &str,
        split:     &SplitData,
        data_type: DataType,
        dicts:     &SavedDicts,
    ) -> SplitSummary {
        let examples = split.examples();
        let n = examples.len().max(1) as f64;

        let mean_src_len = examples.iter().map(|ex| ex.src.len()).sum::<usize>() as f64 / n;
        let mean_tgt_len = split.tgt.as_ref().map(|_| {
            examples.iter().filter_map(NmtExample::tgt_len).sum::<usize>() as f64 / n
        });

        let samples = examples
            .iter()
            .take(self.show)
            .map(|ex| decode(ex, dicts))
            .collect();

        let dataset = NmtDataset::from_examples(
            data_type,
            split.fields.clone(),
            examples,
            split.tgt.is_some(),
        );
        let order = dataset.batch_order(self.batch_size);
        let first_batch = order.first().map(|rows| {
            let items = rows.iter().map(|&i| dataset.examples()[i].clone()).collect();
            let batch: NmtBatch<InspectBackend> =
                NmtBatcher::new().batch(items, &Default::default());
            shape_of(&batch)
        });

        SplitSummary {
            name: name.to_string(),
            examples: dataset.examples().len(),
            fields: split.fields.iter().map(|f| f.name.clone()).collect(),
            mean_src_len,
            mean_tgt_len,
            batches: order.len(),
            first_batch,
            samples,
        }
    }
}

fn shape_of(batch: &NmtBatch<InspectBackend>) -> BatchShape {
    let src = match &batch.src {
        BatchSource::Text { tokens, .. } => tokens.dims().to_vec(),
        BatchSource::Image(images)       => images.dims().to_vec(),
    };
    BatchShape { src, tgt: batch.tgt.as_ref().map(|t| t.dims().to_vec()) }
}

fn decode(ex: &NmtExample, dicts: &SavedDicts) -> (String, String) {
    let src = match &ex.src {
        SourceData::Text(ids) => dicts.src.convert_to_labels(ids, None).join(" "),
        SourceData::Image(img) => format!(
            "{} [{}x{}x{}]",
            ex.src_path.as_deref().unwrap_or("<image>"),
            img.channels,
            img.height,
            img.width
        ),
    };
    // Drop BOS/EOS
    let tgt = match ex.tgt.as_deref() {
        Some([_, inner @ .., _]) => dicts.tgt.convert_to_labels(inner, None).join(" "),
        _ => String::new(),
    };
    (src, tgt)
}

impl fmt::Display for DatasetSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "type:       {}", self.data_type)?;
        writeln!(f, "src vocab:  {} (features {:?})", self.src_vocab, self.src_features)?;
        writeln!(f, "tgt vocab:  {} (features {:?})", self.tgt_vocab, self.tgt_features)?;
        for s in &self.splits {
            writeln!(f)?;
            writeln!(f, "[{}] {} examples, {} batches", s.name, s.examples, s.batches)?;
            writeln!(f, "  fields:       {}", s.fields.join(", "))?;
            writeln!(f, "  mean src len: {:.2}", s.mean_src_len)?;
            if let Some(len) = s.mean_tgt_len {
                writeln!(f, "  mean tgt len: {len:.2}")?;
            }
            if let Some(shape) = &s.first_batch {
                writeln!(f, "  first batch:  src {:?}, tgt {:?}", shape.src, shape.tgt)?;
            }
            for (src, tgt) in &s.samples {
                writeln!(f, "  > {src}")?;
                writeln!(f, "  < {tgt}")?;
            }
        }
        Ok(())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::preprocess_use_case::{PreprocessConfig, PreprocessUseCase};
    use std::fs;

    #[test]
    fn test_summary_of_preprocessed_corpus() {
        let dir = tempfile::tempdir().unwrap();
        let write = |name: &str, body: &str| {
            let path = dir.path().join(name);
            fs::write(&path, body).unwrap();
            path
        };
        let cfg = PreprocessConfig {
            train_src: write("train.src", "a b c\na b\nc\n"),
            train_tgt: write("train.tgt", "x y\nx\ny z w\n"),
            valid_src: write("valid.src", "a\n"),
            valid_tgt: write("valid.tgt", "x\n"),
            save_data: dir.path().join("demo").display().to_string(),
            ..Default::default()
        };
        PreprocessUseCase::new(cfg.clone()).execute().unwrap();

        let summary = InspectUseCase::new(cfg.save_data, 1, 2).summarise().unwrap();

        assert_eq!(summary.data_type, DataType::Text);
        assert_eq!(summary.src_vocab, 5 + 3);
        assert_eq!(summary.tgt_vocab, 5 + 4);

        let train = &summary.splits[0];
        assert_eq!(train.examples, 3);
        assert_eq!(train.batches, 2);
        assert_eq!(train.fields, vec!["src", "tgt", "indices"]);
        assert!((train.mean_src_len - 2.0).abs() < 1e-9);
        assert_eq!(train.mean_tgt_len, Some(2.0));
        // Shortest two sources first: "c" (tgt 3 words) and "a b" (tgt 1 word)
        assert_eq!(train.first_batch.as_ref().unwrap().src, vec![2, 2]);
        assert_eq!(train.first_batch.as_ref().unwrap().tgt, Some(vec![2, 5]));
        assert_eq!(train.samples.len(), 1);

        let valid = &summary.splits[1];
        assert_eq!(valid.samples, vec![("a".to_string(), "x".to_string())]);
        assert!(summary.to_string().contains("[valid] 1 examples, 1 batches"));
    }

    #[test]
    fn test_wrong_prefix_fails_without_creating_directories() {
        let dir    = tempfile::tempdir().unwrap();
        let parent = dir.path().join("no_such_run");
        let prefix = parent.join("demo").display().to_string();

        let err = InspectUseCase::new(prefix, 3, 64).summarise().unwrap_err();
        assert!(err.to_string().contains("preprocess"));
        assert!(!parent.exists());
    }
}
