// ============================================================
// Layer 6 — Dataset Store
// ============================================================
// Persists the output of a preprocessing run under one
// `--save-data` prefix:
//
//   {prefix}.train.json            ← SavedData: dicts + train + valid
//   {prefix}.src.dict              ← source words (unless loaded)
//   {prefix}.tgt.dict              ← target words (unless loaded)
//   {prefix}.src_feature_{j}.dict  ← feature vocabularies (optional)
//   {prefix}.tgt_feature_{j}.dict
//   {prefix}.config.json           ← the PreprocessConfig used
//
// The dataset file is JSON (serde_json), so it can be read
// back by `inspect` or by a training program without this crate.
//
// Reference: Rust Book §9 (Error Handling)
//            serde_json documentation

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::data::dataset::{Field, NmtDataset, NmtExample};
use crate::data::vocab::Vocabulary;
use crate::data::vocab_builder::{feature_vocab_path, SideVocabs};
use crate::domain::example::{DataType, SourceData};

/// Every vocabulary a dataset was indexed with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedDicts {
    pub src:          Vocabulary,
    pub tgt:          Vocabulary,
    pub src_features: Vec<Vocabulary>,
    pub tgt_features: Vec<Vocabulary>,
}

impl SavedDicts {
    pub fn new(src: &SideVocabs, tgt: &SideVocabs) -> Self {
        Self {
            src:          src.words.clone(),
            tgt:          tgt.words.clone(),
            src_features: src.features.clone(),
            tgt_features: tgt.features.clone(),
        }
    }
}

/// One split as parallel arrays; position `i` of every array
/// belongs to the same example.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SplitData {
    pub fields:       Vec<Field>,
    pub src:          Vec<SourceData>,
    /// img mode only
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub src_path:     Vec<String>,
    /// `None` for an inference split
    pub tgt:          Option<Vec<Vec<u32>>>,
    pub src_features: Vec<Vec<Vec<u32>>>,
    pub tgt_features: Vec<Vec<Vec<u32>>>,
    pub indices:      Vec<usize>,
}

impl SplitData {
    pub fn from_dataset(dataset: &NmtDataset) -> Self {
        let examples = dataset.examples();
        Self {
            fields:       dataset.fields().to_vec(),
            src:          examples.iter().map(|ex| ex.src.clone()).collect(),
            src_path:     examples.iter().filter_map(|ex| ex.src_path.clone()).collect(),
            tgt:          dataset
                .has_target()
                .then(|| examples.iter().map(|ex| ex.tgt.clone().unwrap_or_default()).collect()),
            src_features: examples.iter().map(|ex| ex.src_features.clone()).collect(),
            tgt_features: examples.iter().map(|ex| ex.tgt_features.clone()).collect(),
            indices:      examples.iter().map(|ex| ex.indices).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.src.len()
    }

    pub fn is_empty(&self) -> bool {
        self.src.is_empty()
    }

    /// Rebuild the examples, e.g. to feed `NmtBatcher`.
    pub fn examples(&self) -> Vec<NmtExample> {
        (0..self.len())
            .map(|i| NmtExample {
                indices:      self.indices[i],
                src:          self.src[i].clone(),
                src_path:     self.src_path.get(i).cloned(),
                src_features: self.src_features[i].clone(),
                tgt:          self.tgt.as_ref().map(|t| t[i].clone()),
                tgt_features: self.tgt_features[i].clone(),
            })
            .collect()
    }
}

/// Everything a training program needs from one preprocessing run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedData {
    pub dicts:     SavedDicts,
    #[serde(rename = "type")]
    pub data_type: DataType,
    pub train:     SplitData,
    pub valid:     SplitData,
}

/// Reads and writes the files of one `--save-data` prefix.
pub struct DatasetStore {
    prefix: String,
}

impl DatasetStore {
    /// Creates the prefix's parent directory if it doesn't already exist.
    pub fn new(prefix: impl Into<String>) -> Result<Self> {
        let prefix = prefix.into();
        if let Some(parent) = Path::new(&prefix).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Cannot create output directory '{}'", parent.display())
                })?;
            }
        }
        Ok(Self { prefix })
    }

    /// Open an existing prefix for reading. Touches nothing on disk.
    pub fn open(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// `{prefix}.{suffix}`
    pub fn path(&self, suffix: &str) -> PathBuf {
        PathBuf::from(format!("{}.{suffix}", self.prefix))
    }

    pub fn save_data(&self, data: &SavedData) -> Result<PathBuf> {
        let path = self.path("train.json");
        tracing::info!("Saving data to '{}'...", path.display());
        let json = serde_json::to_string(data)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write dataset to '{}'", path.display()))?;
        Ok(path)
    }

    pub fn load_data(&self) -> Result<SavedData> {
        let path = self.path("train.json");
        let json = fs::read_to_string(&path).with_context(|| {
            format!(
                "Cannot read dataset from '{}'. Have you run 'preprocess' first?",
                path.display()
            )
        })?;
        serde_json::from_str(&json)
            .with_context(|| format!("'{}' is not a saved dataset", path.display()))
    }

    /// Write `{prefix}.{side}.dict`.
    pub fn save_vocabulary(&self, name: &str, side: &str, vocab: &Vocabulary) -> Result<PathBuf> {
        let path = self.path(&format!("{side}.dict"));
        tracing::info!("Saving {} vocabulary to '{}'...", name, path.display());
        vocab
            .write_file(&path)
            .with_context(|| format!("Cannot write vocabulary '{}'", path.display()))?;
        Ok(path)
    }

    /// Write `{prefix}.{side}_feature_{j}.dict` for every column.
    pub fn save_feature_vocabularies(
        &self,
        name:   &str,
        side:   &str,
        vocabs: &[Vocabulary],
    ) -> Result<Vec<PathBuf>> {
        vocabs
            .iter()
            .enumerate()
            .map(|(j, vocab)| {
                let path = feature_vocab_path(&self.prefix, side, j);
                tracing::info!(
                    "Saving {} feature {} vocabulary to '{}'...",
                    name,
                    j + 1,
                    path.display()
                );
                vocab
                    .write_file(&path)
                    .with_context(|| format!("Cannot write vocabulary '{}'", path.display()))?;
                Ok(path)
            })
            .collect()
    }

    pub fn save_config<C: Serialize>(&self, cfg: &C) -> Result<()> {
        let path = self.path("config.json");
        let json = serde_json::to_string_pretty(cfg)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;
        tracing::debug!("Saved preprocessing config to '{}'", path.display());
        Ok(())
    }

    pub fn load_config<C: DeserializeOwned>(&self) -> Result<C> {
        let path = self.path("config.json");
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read config from '{}'", path.display()))?;
        Ok(serde_json::from_str(&json)?)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::{FieldRegistry, SourceRecord, TargetRecord};
    use crate::domain::constants::{BOS, EOS};

    fn dataset() -> NmtDataset {
        let vocabs = SideVocabs::empty();
        let registry = FieldRegistry::for_vocabs(DataType::Text, &vocabs, &vocabs);
        let src = vec![
            SourceRecord { index: 0, src: SourceData::Text(vec![5, 6]), src_path: None, features: vec![] },
            SourceRecord { index: 1, src: SourceData::Text(vec![7]), src_path: None, features: vec![] },
        ];
        let tgt = vec![
            TargetRecord { index: 0, tgt: vec![BOS, 8, EOS], features: vec![] },
            TargetRecord { index: 1, tgt: vec![BOS, 9, 10, EOS], features: vec![] },
        ];
        NmtDataset::assemble(&registry, src, Some(tgt), 50, true).unwrap()
    }

    #[test]
    fn test_split_flattens_into_parallel_arrays() {
        let split = SplitData::from_dataset(&dataset());
        assert_eq!(split.len(), 2);
        assert_eq!(split.indices, vec![0, 1]);
        assert_eq!(split.tgt.as_ref().unwrap()[1], vec![BOS, 9, 10, EOS]);
        assert!(split.src_path.is_empty());
        assert_eq!(split.examples(), dataset().examples().to_vec());
    }

    #[test]
    fn test_saved_data_round_trip() {
        let dir   = tempfile::tempdir().unwrap();
        let store = DatasetStore::new(dir.path().join("out/demo").display().to_string()).unwrap();
        let vocabs = SideVocabs::empty();
        let data = SavedData {
            dicts:     SavedDicts::new(&vocabs, &vocabs),
            data_type: DataType::Text,
            train:     SplitData::from_dataset(&dataset()),
            valid:     SplitData::default(),
        };

        let path = store.save_data(&data).unwrap();
        assert!(path.ends_with("demo.train.json"));
        assert_eq!(store.load_data().unwrap(), data);
    }

    #[test]
    fn test_vocabulary_files_use_prefix() {
        let dir    = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("demo").display().to_string();
        let store  = DatasetStore::new(prefix.clone()).unwrap();
        let vocab  = Vocabulary::reserved_only();

        let words = store.save_vocabulary("source", "src", &vocab).unwrap();
        assert_eq!(words, PathBuf::from(format!("{prefix}.src.dict")));
        assert_eq!(Vocabulary::load_file(&words, false).unwrap(), vocab);

        let feats = store
            .save_feature_vocabularies("target", "tgt", &[vocab.clone(), vocab])
            .unwrap();
        assert_eq!(feats.len(), 2);
        assert!(feats[1].display().to_string().ends_with("demo.tgt_feature_1.dict"));
    }

    #[test]
    fn test_missing_dataset_is_reported() {
        let dir   = tempfile::tempdir().unwrap();
        let store = DatasetStore::new(dir.path().join("none").display().to_string()).unwrap();
        let err   = store.load_data().unwrap_err();
        assert!(err.to_string().contains("preprocess"));
    }

    #[test]
    fn test_open_does_not_create_directories() {
        let dir    = tempfile::tempdir().unwrap();
        let parent = dir.path().join("missing");
        let store  = DatasetStore::open(parent.join("demo").display().to_string());

        assert!(store.load_data().is_err());
        assert!(!parent.exists());
    }
}
