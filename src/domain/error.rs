// ============================================================
// Layer 3 — Errors
// ============================================================
// Fatal conditions that stop a preprocessing run, and the
// configuration/shape errors of the attention module.
//
// Recoverable conditions (misaligned corpus, empty lines,
// over-long sentences) are NOT errors: the pipeline counts
// them in `CorpusStats` and keeps going.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PreprocessError>;

#[derive(Debug, Error)]
pub enum PreprocessError {
    /// Tokens of one sentence disagree on how many features they carry
    #[error("token '{token}' has {found} features, expected {expected}: all words must have the same number of features")]
    MalformedFeatureCount {
        token:    String,
        expected: usize,
        found:    usize,
    },

    /// A sentence carries a different number of feature columns than the corpus
    #[error("line {line}: sentence has {found} feature columns, corpus has {expected}")]
    InconsistentFeatureColumns {
        line:     usize,
        expected: usize,
        found:    usize,
    },

    /// A referenced image file or source directory does not exist
    #[error("{what} not found: '{}'", path.display())]
    MissingResource {
        what: &'static str,
        path: PathBuf,
    },

    /// A vocabulary file could not be parsed
    #[error("malformed vocabulary '{}' (line {line}): {reason}", path.display())]
    MalformedVocabulary {
        path:   PathBuf,
        line:   usize,
        reason: String,
    },

    /// An assembled example does not carry the fields the dataset declares
    #[error("example {index} has fields {found:?}, dataset schema is {expected:?}")]
    SchemaMismatch {
        index:    usize,
        expected: Vec<String>,
        found:    Vec<String>,
    },

    #[error("image decode error for '{}': {message}", path.display())]
    Image {
        path:    PathBuf,
        message: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Invalid attention configuration or mismatched input tensors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AttentionError {
    #[error("d_model {d_model} is not divisible into {heads} heads")]
    InvalidHeadCount {
        d_model: usize,
        heads:   usize,
    },

    #[error("{what}: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        what:     &'static str,
        expected: Vec<usize>,
        found:    Vec<usize>,
    },
}
