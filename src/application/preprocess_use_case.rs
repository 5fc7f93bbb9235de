// ============================================================
// Layer 2 — PreprocessUseCase
// ============================================================
// Orchestrates a full preprocessing run in order:
//
//   Step 1: Check the image directory     (img mode only)
//   Step 2: Source/target vocabularies    (Layer 4 - data)
//   Step 3: Index train and valid corpora (Layer 4 - data)
//   Step 4: Assemble datasets             (Layer 4 - data)
//   Step 5: Save dicts, data and config   (Layer 6 - infra)
//   Step 6: Write the run report          (Layer 6 - infra)
//   Step 7: Export tokenizers (optional)  (Layer 6 - infra)
//
// Reference: Rust Book §13 (Iterators and Closures)

use anyhow::{Context, Result};
use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::data::{
    corpus::{make_data, CorpusOptions, SourceSide},
    dataset::{FieldRegistry, NmtDataset},
    image::{check_image_dir, ImageCrateLoader},
    vocab_builder::{init_vocabulary, SideVocabs, VocabSource},
};
use crate::domain::example::DataType;
use crate::infra::{
    report::{RunReport, SplitReport},
    store::{DatasetStore, SavedData, SavedDicts, SplitData},
    tokenizer_export::TokenizerExporter,
};

// ─── Preprocessing Configuration ─────────────────────────────────────────────
// Every option of a run. Saved next to the output as
// {prefix}.config.json and accepted back through `--config`;
// missing keys take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    pub src_type:               DataType,
    /// Directory the img-mode source lines are relative to
    pub src_img_dir:            PathBuf,
    /// Skip images taller or wider than (height, width)
    pub src_img_max:            Option<(usize, usize)>,

    pub train_src:              PathBuf,
    pub train_tgt:              PathBuf,
    pub valid_src:              PathBuf,
    pub valid_tgt:              PathBuf,
    pub save_data:              String,

    pub src_vocab_size:         usize,
    pub tgt_vocab_size:         usize,
    pub src_vocab:              Option<PathBuf>,
    pub tgt_vocab:              Option<PathBuf>,
    pub features_vocabs_prefix: Option<String>,

    pub src_seq_length:         usize,
    /// 0 disables truncation
    pub src_seq_length_trunc:   usize,
    pub tgt_seq_length:         usize,
    pub tgt_seq_length_trunc:   usize,

    pub shuffle:                bool,
    pub seed:                   u64,
    pub lower:                  bool,
    pub report_every:           usize,
    pub export_tokenizers:      bool,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        let corpus = CorpusOptions::default();
        Self {
            src_type:               DataType::Text,
            src_img_dir:            PathBuf::from("."),
            src_img_max:            None,
            train_src:              PathBuf::new(),
            train_tgt:              PathBuf::new(),
            valid_src:              PathBuf::new(),
            valid_tgt:              PathBuf::new(),
            save_data:              String::new(),
            src_vocab_size:         50_000,
            tgt_vocab_size:         50_000,
            src_vocab:              None,
            tgt_vocab:              None,
            features_vocabs_prefix: None,
            src_seq_length:         corpus.src_seq_length,
            src_seq_length_trunc:   corpus.src_seq_length_trunc,
            tgt_seq_length:         corpus.tgt_seq_length,
            tgt_seq_length_trunc:   corpus.tgt_seq_length_trunc,
            shuffle:                corpus.shuffle,
            seed:                   corpus.seed,
            lower:                  false,
            report_every:           corpus.report_every,
            export_tokenizers:      false,
        }
    }
}

impl PreprocessConfig {
    /// Read a config written by a previous run (or by hand).
    pub fn from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read config '{}'", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Invalid config '{}'", path.display()))
    }

    pub fn corpus_options(&self) -> CorpusOptions {
        CorpusOptions {
            src_seq_length:       self.src_seq_length,
            src_seq_length_trunc: self.src_seq_length_trunc,
            tgt_seq_length:       self.tgt_seq_length,
            tgt_seq_length_trunc: self.tgt_seq_length_trunc,
            shuffle:              self.shuffle,
            seed:                 self.seed,
            report_every:         self.report_every,
        }
    }

    /// Fail early on a config that cannot produce a dataset.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("train_src", self.train_src.as_os_str().is_empty()),
            ("train_tgt", self.train_tgt.as_os_str().is_empty()),
            ("valid_src", self.valid_src.as_os_str().is_empty()),
            ("valid_tgt", self.valid_tgt.as_os_str().is_empty()),
            ("save_data", self.save_data.is_empty()),
        ];
        if let Some((name, _)) = required.iter().find(|(_, missing)| *missing) {
            anyhow::bail!("'{name}' is required");
        }
        if self.report_every == 0 {
            anyhow::bail!("'report_every' must be at least 1");
        }
        Ok(())
    }

    fn features_prefix(&self) -> Option<&str> {
        self.features_vocabs_prefix.as_deref().filter(|p| !p.is_empty())
    }
}

// ─── Outcome ──────────────────────────────────────────────────────────────────
/// What a run produced
#[derive(Debug)]
pub struct PreprocessOutcome {
    pub data_path: PathBuf,
    pub report:    RunReport,
}

// ─── PreprocessUseCase ────────────────────────────────────────────────────────
pub struct PreprocessUseCase {
    config: PreprocessConfig,
}

impl PreprocessUseCase {
    pub fn new(config: PreprocessConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PreprocessConfig {
        &self.config
    }

    /// Execute the full preprocessing pipeline end to end
    pub fn execute(&self) -> Result<PreprocessOutcome> {
        let cfg = &self.config;
        cfg.validate()?;

        // ── Step 1: img mode needs its image directory ───────────────────────
        if cfg.src_type == DataType::Img {
            check_image_dir(&cfg.src_img_dir)?;
        }

        // ── Step 2: Vocabularies ─────────────────────────────────────────────
        let src_vocabs = match cfg.src_type {
            DataType::Text => init_vocabulary(VocabSource {
                name:            "source",
                side:            "src",
                data_file:       &cfg.train_src,
                vocab_file:      cfg.src_vocab.as_deref(),
                vocab_size:      cfg.src_vocab_size,
                lower:           cfg.lower,
                features_prefix: cfg.features_prefix(),
            })?,
            DataType::Img => SideVocabs::empty(),
        };
        let tgt_vocabs = init_vocabulary(VocabSource {
            name:            "target",
            side:            "tgt",
            data_file:       &cfg.train_tgt,
            vocab_file:      cfg.tgt_vocab.as_deref(),
            vocab_size:      cfg.tgt_vocab_size,
            lower:           cfg.lower,
            features_prefix: cfg.features_prefix(),
        })?;

        // ── Step 3 + 4: Index and assemble both splits ───────────────────────
        let loader   = ImageCrateLoader;
        let source   = match cfg.src_type {
            DataType::Text => SourceSide::Text(&src_vocabs),
            DataType::Img  => SourceSide::Image {
                loader:   &loader,
                dir:      &cfg.src_img_dir,
                max_size: cfg.src_img_max,
            },
        };
        let registry = FieldRegistry::for_vocabs(cfg.src_type, &src_vocabs, &tgt_vocabs);
        let mut report = RunReport::new();

        tracing::info!("Preparing training ...");
        let train = self.prepare_split(
            "train",
            &cfg.train_src,
            &cfg.train_tgt,
            &source,
            &tgt_vocabs,
            &registry,
            &mut report,
        )?;
        tracing::info!("Preparing validation ...");
        let valid = self.prepare_split(
            "valid",
            &cfg.valid_src,
            &cfg.valid_tgt,
            &source,
            &tgt_vocabs,
            &registry,
            &mut report,
        )?;

        // ── Step 5: Persist ──────────────────────────────────────────────────
        let store = DatasetStore::new(cfg.save_data.clone())?;
        if cfg.src_vocab.is_none() {
            store.save_vocabulary("source", "src", &src_vocabs.words)?;
        }
        if cfg.tgt_vocab.is_none() {
            store.save_vocabulary("target", "tgt", &tgt_vocabs.words)?;
        }
        if cfg.features_prefix().is_some() {
            store.save_feature_vocabularies("source", "src", &src_vocabs.features)?;
            store.save_feature_vocabularies("target", "tgt", &tgt_vocabs.features)?;
        }

        let data = SavedData {
            dicts:     SavedDicts::new(&src_vocabs, &tgt_vocabs),
            data_type: cfg.src_type,
            train:     SplitData::from_dataset(&train),
            valid:     SplitData::from_dataset(&valid),
        };
        let data_path = store.save_data(&data)?;
        store.save_config(cfg)?;

        // ── Step 6: Report ───────────────────────────────────────────────────
        report.write_csv(store.path("report.csv"))?;

        // ── Step 7: Tokenizers ───────────────────────────────────────────────
        if cfg.export_tokenizers {
            let exporter = TokenizerExporter::new(cfg.save_data.clone());
            if cfg.src_type == DataType::Text {
                exporter.export("src", &src_vocabs.words)?;
            }
            exporter.export("tgt", &tgt_vocabs.words)?;
        }

        Ok(PreprocessOutcome { data_path, report })
    }

    #[allow(clippy::too_many_arguments)]
    fn prepare_split(
        &self,
        split:    &str,
        src_file: &Path,
        tgt_file: &Path,
        source:   &SourceSide<'_>,
        tgt:      &SideVocabs,
        registry: &FieldRegistry,
        report:   &mut RunReport,
    ) -> Result<NmtDataset> {
        let corpus = make_data(src_file, tgt_file, source, tgt, &self.config.corpus_options())
            .with_context(|| format!("Failed to index the {split} corpus"))?;
        let stats = corpus.stats.clone();

        let (src_records, tgt_records) = corpus.into_records();
        let dataset = NmtDataset::assemble(
            registry,
            src_records,
            Some(tgt_records),
            self.config.tgt_seq_length,
            true,
        )?;

        report.push(SplitReport::new(split, stats, dataset.len()));
        Ok(dataset)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::vocab::Vocabulary;
    use std::fs;

    fn corpus(dir: &Path) -> PreprocessConfig {
        let write = |name: &str, body: &str| {
            let path = dir.join(name);
            fs::write(&path, body).unwrap();
            path
        };
        PreprocessConfig {
            train_src: write("train.src", "the cat sat\na dog\n\nthe end\n"),
            train_tgt: write("train.tgt", "le chat\nun chien\n\nla fin\n"),
            valid_src: write("valid.src", "the dog\n"),
            valid_tgt: write("valid.tgt", "le chien\n"),
            save_data: dir.join("out/demo").display().to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_end_to_end_text_run() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = corpus(dir.path());
        let store = DatasetStore::new(cfg.save_data.clone()).unwrap();

        let outcome = PreprocessUseCase::new(cfg.clone()).execute().unwrap();

        assert_eq!(outcome.data_path, store.path("train.json"));
        let rows = outcome.report.rows();
        assert_eq!(rows[0].stats.accepted, 3);
        assert_eq!(rows[0].stats.empty_lines, 1);
        assert_eq!(rows[1].examples, 1);

        let data = store.load_data().unwrap();
        assert_eq!(data.data_type, DataType::Text);
        assert_eq!(data.train.len(), 3);
        assert_eq!(data.valid.len(), 1);

        // Written dicts match the saved ones
        let src = Vocabulary::load_file(store.path("src.dict"), false).unwrap();
        assert_eq!(src, data.dicts.src);
        assert!(store.path("tgt.dict").exists());
        assert!(store.path("report.csv").exists());
        assert_eq!(store.load_config::<PreprocessConfig>().unwrap(), cfg);
    }

    #[test]
    fn test_loaded_vocabulary_is_not_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = corpus(dir.path());
        let dict = dir.path().join("given.dict");
        Vocabulary::reserved_only().write_file(&dict).unwrap();
        cfg.src_vocab = Some(dict);
        cfg.export_tokenizers = true;

        PreprocessUseCase::new(cfg.clone()).execute().unwrap();

        let store = DatasetStore::new(cfg.save_data.clone()).unwrap();
        assert!(!store.path("src.dict").exists());
        assert!(store.path("tgt.dict").exists());
        assert!(store.path("src.tokenizer.json").exists());
        assert!(store.path("tgt.tokenizer.json").exists());
    }

    #[test]
    fn test_missing_image_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = corpus(dir.path());
        cfg.src_type = DataType::Img;
        cfg.src_img_dir = dir.path().join("no-such-dir");

        let err = PreprocessUseCase::new(cfg).execute().unwrap_err();
        assert!(err.to_string().contains("no-such-dir"));
    }

    #[test]
    fn test_required_paths_are_checked() {
        let err = PreprocessConfig::default().validate().unwrap_err();
        assert!(err.to_string().contains("train_src"));
    }

    #[test]
    fn test_partial_config_file_takes_defaults() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.json");
        fs::write(&path, r#"{ "save_data": "x", "seed": 7, "src_type": "img" }"#).unwrap();

        let cfg = PreprocessConfig::from_file(&path).unwrap();
        assert_eq!(cfg.seed, 7);
        assert_eq!(cfg.src_type, DataType::Img);
        assert_eq!(cfg.src_seq_length, 50);
        assert!(cfg.shuffle);
    }
}
