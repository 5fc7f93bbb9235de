// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands: `preprocess` and `inspect`
// and all their configurable flags.
//
// clap's derive macros automatically generate:
//   - help text (--help)
//   - error messages for missing args
//   - type conversion (string → usize, DataType, etc.)
//
// Reference: Rust Book §12 (Building a CLI Program)

use anyhow::Result;
use clap::{ArgAction, Args, Subcommand};
use std::path::PathBuf;

use crate::application::preprocess_use_case::PreprocessConfig;
use crate::domain::example::DataType;

/// The two top-level subcommands available to the user
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build vocabularies and index a parallel corpus into a dataset
    Preprocess(PreprocessArgs),

    /// Summarise a dataset written by `preprocess`
    Inspect(InspectArgs),
}

/// All arguments for the `preprocess` command.
/// The corpus paths and --save-data are required unless --config is given.
#[derive(Args, Debug)]
pub struct PreprocessArgs {
    /// Read every option from this JSON file instead of the flags below
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Type of the source input: text or img
    #[arg(long, default_value = "text")]
    pub src_type: DataType,

    /// Directory the image names in the source files are relative to
    #[arg(long, default_value = ".")]
    pub src_img_dir: PathBuf,

    /// Skip source images larger than HEIGHTxWIDTH
    #[arg(long, value_parser = parse_img_size)]
    pub src_img_max: Option<(usize, usize)>,

    /// Path to the training source data
    #[arg(long, required_unless_present = "config")]
    pub train_src: Option<PathBuf>,

    /// Path to the training target data
    #[arg(long, required_unless_present = "config")]
    pub train_tgt: Option<PathBuf>,

    /// Path to the validation source data
    #[arg(long, required_unless_present = "config")]
    pub valid_src: Option<PathBuf>,

    /// Path to the validation target data
    #[arg(long, required_unless_present = "config")]
    pub valid_tgt: Option<PathBuf>,

    /// Output file prefix for the prepared data
    #[arg(long, required_unless_present = "config")]
    pub save_data: Option<String>,

    /// Size of the source vocabulary
    #[arg(long, default_value_t = 50_000)]
    pub src_vocab_size: usize,

    /// Size of the target vocabulary
    #[arg(long, default_value_t = 50_000)]
    pub tgt_vocab_size: usize,

    /// Existing source vocabulary file, used verbatim
    #[arg(long)]
    pub src_vocab: Option<PathBuf>,

    /// Existing target vocabulary file, used verbatim
    #[arg(long)]
    pub tgt_vocab: Option<PathBuf>,

    /// Prefix of the feature vocabulary files to load, and switch to
    /// save the feature vocabularies of this run
    #[arg(long)]
    pub features_vocabs_prefix: Option<String>,

    /// Maximum source sequence length
    #[arg(long, default_value_t = 50)]
    pub src_seq_length: usize,

    /// Truncate source sequences to this length (0 = no truncation)
    #[arg(long, default_value_t = 0)]
    pub src_seq_length_trunc: usize,

    /// Maximum target sequence length
    #[arg(long, default_value_t = 50)]
    pub tgt_seq_length: usize,

    /// Truncate target sequences to this length (0 = no truncation)
    #[arg(long, default_value_t = 0)]
    pub tgt_seq_length_trunc: usize,

    /// Shuffle the data before sorting by length
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub shuffle: bool,

    /// Random seed for the shuffle
    #[arg(long, default_value_t = 3435)]
    pub seed: u64,

    /// Lowercase the data
    #[arg(long)]
    pub lower: bool,

    /// Log progress every this many sentences
    #[arg(long, default_value_t = 100_000)]
    pub report_every: usize,

    /// Also write {save_data}.{src,tgt}.tokenizer.json
    #[arg(long)]
    pub export_tokenizers: bool,
}

/// "32x128" → (32, 128)
fn parse_img_size(s: &str) -> std::result::Result<(usize, usize), String> {
    let (h, w) = s
        .split_once('x')
        .ok_or_else(|| format!("expected HEIGHTxWIDTH, got '{s}'"))?;
    let parse = |v: &str| v.trim().parse::<usize>().map_err(|e| format!("'{v}': {e}"));
    Ok((parse(h)?, parse(w)?))
}

/// Convert CLI PreprocessArgs into the application-layer PreprocessConfig.
/// This is the boundary between Layer 1 and Layer 2 —
/// the application layer never sees clap types.
impl TryFrom<PreprocessArgs> for PreprocessConfig {
    type Error = anyhow::Error;

    fn try_from(a: PreprocessArgs) -> Result<Self> {
        if let Some(path) = &a.config {
            tracing::info!("Reading options from '{}'", path.display());
            return PreprocessConfig::from_file(path);
        }

        Ok(PreprocessConfig {
            src_type:               a.src_type,
            src_img_dir:            a.src_img_dir,
            src_img_max:            a.src_img_max,
            train_src:              a.train_src.unwrap_or_default(),
            train_tgt:              a.train_tgt.unwrap_or_default(),
            valid_src:              a.valid_src.unwrap_or_default(),
            valid_tgt:              a.valid_tgt.unwrap_or_default(),
            save_data:              a.save_data.unwrap_or_default(),
            src_vocab_size:         a.src_vocab_size,
            tgt_vocab_size:         a.tgt_vocab_size,
            src_vocab:              a.src_vocab,
            tgt_vocab:              a.tgt_vocab,
            features_vocabs_prefix: a.features_vocabs_prefix,
            src_seq_length:         a.src_seq_length,
            src_seq_length_trunc:   a.src_seq_length_trunc,
            tgt_seq_length:         a.tgt_seq_length,
            tgt_seq_length_trunc:   a.tgt_seq_length_trunc,
            shuffle:                a.shuffle,
            seed:                   a.seed,
            lower:                  a.lower,
            report_every:           a.report_every,
            export_tokenizers:      a.export_tokenizers,
        })
    }
}

/// All arguments for the `inspect` command
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Prefix the dataset was saved under (the --save-data of `preprocess`)
    #[arg(long)]
    pub save_data: String,

    /// Number of examples per split to print decoded
    #[arg(long, default_value_t = 3)]
    pub show: usize,

    /// Batch size used to preview batch shapes
    #[arg(long, default_value_t = 64)]
    pub batch_size: usize,
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    fn preprocess(args: &[&str]) -> PreprocessArgs {
        let mut argv = vec!["nmt-prep", "preprocess"];
        argv.extend_from_slice(args);
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Preprocess(a) => a,
            other => panic!("unexpected command {other:?}"),
        }
    }

    const CORPUS: [&str; 10] = [
        "--train-src", "t.src", "--train-tgt", "t.tgt",
        "--valid-src", "v.src", "--valid-tgt", "v.tgt",
        "--save-data", "out/demo",
    ];

    #[test]
    fn test_defaults_match_config_defaults() {
        let cfg = PreprocessConfig::try_from(preprocess(&CORPUS)).unwrap();
        let expected = PreprocessConfig {
            train_src: "t.src".into(),
            train_tgt: "t.tgt".into(),
            valid_src: "v.src".into(),
            valid_tgt: "v.tgt".into(),
            save_data: "out/demo".into(),
            ..Default::default()
        };
        assert_eq!(cfg, expected);
    }

    #[test]
    fn test_flags_are_carried_over() {
        let mut args = CORPUS.to_vec();
        args.extend([
            "--src-type", "img", "--src-img-max", "32x128",
            "--shuffle", "false", "--lower", "--src-seq-length-trunc", "10",
        ]);
        let cfg = PreprocessConfig::try_from(preprocess(&args)).unwrap();
        assert_eq!(cfg.src_type, DataType::Img);
        assert_eq!(cfg.src_img_max, Some((32, 128)));
        assert!(!cfg.shuffle);
        assert!(cfg.lower);
        assert_eq!(cfg.src_seq_length_trunc, 10);
    }

    #[test]
    fn test_corpus_paths_required_without_config() {
        assert!(Cli::try_parse_from(["nmt-prep", "preprocess"]).is_err());
        assert!(Cli::try_parse_from(["nmt-prep", "preprocess", "--config", "c.json"]).is_ok());
    }

    #[test]
    fn test_bad_image_size() {
        assert!(parse_img_size("32").is_err());
        assert!(parse_img_size("ax3").is_err());
        assert_eq!(parse_img_size("4x5"), Ok((4, 5)));
    }
}
