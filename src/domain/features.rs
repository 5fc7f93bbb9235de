// ============================================================
// Layer 3 — Feature-Token Extractor
// ============================================================
// Splits every raw token of a sentence into a word and its
// side features:
//
//   "houses￨NNS￨B-NP"  →  word "houses", features ["NNS", "B-NP"]
//
// Features are returned column-major: `features[j][i]` is the
// j-th feature of the i-th kept word.

use crate::domain::constants::FEATURE_DELIMITER;
use crate::domain::error::{PreprocessError, Result};

/// Words and feature columns extracted from one sentence.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExtractedSentence {
    pub words:        Vec<String>,
    pub features:     Vec<Vec<String>>,
    pub num_features: usize,
}

impl ExtractedSentence {
    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Keep only the first `n` words and the first `n` values of
    /// every feature column.
    pub fn truncate(&mut self, n: usize) {
        self.words.truncate(n);
        for column in &mut self.features {
            column.truncate(n);
        }
    }
}

/// Separate words from features for one whitespace-tokenised sentence.
///
/// Tokens with an empty word part (e.g. a bare `￨NN`) are dropped from
/// every output. All kept tokens must carry the same number of features
/// as the first kept token.
pub fn extract_features<S: AsRef<str>>(tokens: &[S]) -> Result<ExtractedSentence> {
    let mut words: Vec<String>         = Vec::with_capacity(tokens.len());
    let mut features: Vec<Vec<String>> = Vec::new();
    let mut num_features: Option<usize> = None;

    for token in tokens {
        let token = token.as_ref();
        let mut fields = token.split(FEATURE_DELIMITER);
        let word = fields.next().unwrap_or_default();
        if word.is_empty() {
            continue;
        }
        let values: Vec<&str> = fields.collect();

        match num_features {
            None => {
                num_features = Some(values.len());
                features = vec![Vec::new(); values.len()];
            }
            Some(expected) if expected != values.len() => {
                return Err(PreprocessError::MalformedFeatureCount {
                    token: token.to_string(),
                    expected,
                    found: values.len(),
                });
            }
            Some(_) => {}
        }

        words.push(word.to_string());
        for (column, value) in features.iter_mut().zip(values) {
            column.push(value.to_string());
        }
    }

    Ok(ExtractedSentence {
        words,
        features,
        num_features: num_features.unwrap_or(0),
    })
}

/// Convenience wrapper: split `line` on whitespace, then extract.
pub fn extract_line(line: &str) -> Result<ExtractedSentence> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    extract_features(&tokens)
}
