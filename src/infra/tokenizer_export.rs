// ============================================================
// Layer 6 — Tokenizer Export
// ============================================================
// Writes a word vocabulary as a HuggingFace `tokenizer.json`
// so downstream tools can index raw text exactly the way the
// preprocessing run did.
//
// The tokenizer JSON is built by hand and loaded back with
// Tokenizer::from_file; in tokenizers 0.15 that avoids the
// trainer/ModelWrapper type mismatch.
//
//   normalizer:    Lowercase (only for a lowercased vocabulary)
//   pre_tokenizer: WhitespaceSplit
//   model:         WordLevel, unk_token = "<unk>"
//   added_tokens:  the reserved symbols, marked special
//
// Feature vocabularies are not exported: features are split
// off tokens before lookup, which a tokenizer cannot express.

use anyhow::{Context, Result};
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use tokenizers::Tokenizer;

use crate::data::vocab::Vocabulary;
use crate::domain::constants::{is_reserved, UNK_WORD};

pub struct TokenizerExporter {
    prefix: String,
}

impl TokenizerExporter {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    /// `{prefix}.{side}.tokenizer.json`
    pub fn path(&self, side: &str) -> PathBuf {
        PathBuf::from(format!("{}.{side}.tokenizer.json", self.prefix))
    }

    /// Write the tokenizer for `vocab` and load it back.
    pub fn export(&self, side: &str, vocab: &Vocabulary) -> Result<Tokenizer> {
        let path = self.path(side);
        std::fs::write(&path, serde_json::to_string_pretty(&tokenizer_json(vocab))?)
            .with_context(|| format!("Cannot write tokenizer '{}'", path.display()))?;

        tracing::info!(
            "Exported {} tokenizer with {} words to '{}'",
            side,
            vocab.len(),
            path.display()
        );
        load(&path)
    }
}

/// Load an exported tokenizer.
pub fn load(path: &Path) -> Result<Tokenizer> {
    Tokenizer::from_file(path)
        .map_err(|e| anyhow::anyhow!("Cannot load tokenizer from '{}': {}", path.display(), e))
}

fn tokenizer_json(vocab: &Vocabulary) -> Value {
    let mut words = Map::new();
    for (idx, label) in vocab.labels().iter().enumerate() {
        words.insert(label.clone(), json!(idx));
    }

    let added_tokens: Vec<Value> = vocab
        .labels()
        .iter()
        .enumerate()
        .filter(|(_, label)| is_reserved(label))
        .map(|(idx, label)| {
            json!({
                "id": idx,
                "content": label,
                "single_word": false,
                "lstrip": false,
                "rstrip": false,
                "normalized": false,
                "special": true
            })
        })
        .collect();

    let normalizer = if vocab.is_lowercased() {
        json!({ "type": "Lowercase" })
    } else {
        Value::Null
    };

    json!({
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": added_tokens,
        "normalizer": normalizer,
        "pre_tokenizer": { "type": "WhitespaceSplit" },
        "post_processor": null,
        "decoder": null,
        "model": {
            "type": "WordLevel",
            "vocab": words,
            "unk_token": UNK_WORD
        }
    })
}
