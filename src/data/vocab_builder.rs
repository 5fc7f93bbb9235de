// ============================================================
// Layer 4 — Vocabulary Builder
// ============================================================
// Builds (or loads) the word vocabulary and the per-column
// feature vocabularies for one side of the corpus.
//
//   corpus file ──► extract_features ──► VocabBuilder::add ──► prune
//                                   └──► feature builders  ──► freeze
//
// Feature vocabularies are created lazily on the first
// sentence that carries features. From then on every
// sentence must carry the same number of columns.
//
// Feature vocabulary files are named
//   {prefix}.{side}_feature_{j}.dict

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::data::vocab::{VocabBuilder, Vocabulary};
use crate::domain::error::{PreprocessError, Result};
use crate::domain::features::extract_line;

/// Word vocabulary plus one vocabulary per feature column.
#[derive(Debug, Clone)]
pub struct SideVocabs {
    pub words:    Vocabulary,
    pub features: Vec<Vocabulary>,
}

impl SideVocabs {
    /// Reserved symbols only, no feature columns (img-mode source side)
    pub fn empty() -> Self {
        Self { words: Vocabulary::reserved_only(), features: Vec::new() }
    }
}

/// Path of the `j`-th feature vocabulary for `side` ("src" / "tgt")
pub fn feature_vocab_path(prefix: &str, side: &str, j: usize) -> PathBuf {
    PathBuf::from(format!("{prefix}.{side}_feature_{j}.dict"))
}

/// Count every word and feature value of a corpus file.
fn count_corpus(path: &Path, lower: bool) -> Result<(VocabBuilder, Vec<VocabBuilder>)> {
    let file = fs::File::open(path).map_err(|_| PreprocessError::MissingResource {
        what: "corpus file",
        path: path.to_path_buf(),
    })?;

    let mut words    = VocabBuilder::new(lower);
    let mut features: Vec<VocabBuilder> = Vec::new();

    for (n, line) in BufReader::new(file).lines().enumerate() {
        let sentence = extract_line(&line?)?;
        if sentence.is_empty() {
            continue;
        }

        if features.is_empty() && sentence.num_features > 0 {
            features = (0..sentence.num_features)
                .map(|_| VocabBuilder::new(false))
                .collect();
        } else if features.len() != sentence.num_features {
            return Err(PreprocessError::InconsistentFeatureColumns {
                line:     n + 1,
                expected: features.len(),
                found:    sentence.num_features,
            });
        }

        for word in &sentence.words {
            words.add(word);
        }
        for (builder, column) in features.iter_mut().zip(&sentence.features) {
            for value in column {
                builder.add(value);
            }
        }
    }

    Ok((words, features))
}

/// Build the word vocabulary (pruned to `size`) and the feature
/// vocabularies (unpruned) of a corpus file.
pub fn make_vocabulary(path: &Path, size: usize, lower: bool) -> Result<SideVocabs> {
    let (words, features) = count_corpus(path, lower)?;

    let pruned = words.prune(size);
    tracing::info!(
        "Created dictionary of size {} (pruned from {})",
        pruned.size_after,
        pruned.size_before
    );

    Ok(SideVocabs {
        words:    pruned.vocab,
        features: features.iter().map(VocabBuilder::freeze).collect(),
    })
}

/// Load every `{prefix}.{side}_feature_{j}.dict` that exists, in order.
pub fn load_feature_vocabularies(prefix: &str, side: &str) -> Result<Vec<Vocabulary>> {
    let mut vocabs = Vec::new();
    loop {
        let path = feature_vocab_path(prefix, side, vocabs.len());
        if !path.exists() {
            break;
        }
        vocabs.push(Vocabulary::load_file(&path, false)?);
    }
    Ok(vocabs)
}

/// Where the vocabularies of one side come from.
#[derive(Debug, Clone, Copy)]
pub struct VocabSource<'a> {
    /// "source" / "target", for log messages
    pub name:            &'a str,
    /// "src" / "tgt", for feature vocabulary file names
    pub side:            &'a str,
    pub data_file:       &'a Path,
    pub vocab_file:      Option<&'a Path>,
    pub vocab_size:      usize,
    pub lower:           bool,
    pub features_prefix: Option<&'a str>,
}

/// Load the word vocabulary from `vocab_file` if given, else build it
/// from `data_file`. Feature vocabularies are loaded from
/// `features_prefix` when those files exist, else built from the corpus.
pub fn init_vocabulary(source: VocabSource<'_>) -> Result<SideVocabs> {
    let Some(vocab_file) = source.vocab_file else {
        tracing::info!("Building {} vocabulary...", source.name);
        return make_vocabulary(source.data_file, source.vocab_size, source.lower);
    };

    tracing::info!(
        "Reading {} vocabulary from '{}'...",
        source.name,
        vocab_file.display()
    );
    let words = Vocabulary::load_file(vocab_file, source.lower)?;
    tracing::info!("Loaded {} {} words", words.len(), source.name);

    let loaded = match source.features_prefix {
        Some(prefix) if !prefix.is_empty() => load_feature_vocabularies(prefix, source.side)?,
        _ => Vec::new(),
    };

    let features = if loaded.is_empty() {
        let (_, builders) = count_corpus(source.data_file, source.lower)?;
        builders.iter().map(VocabBuilder::freeze).collect()
    } else {
        tracing::info!("Loaded {} {} feature vocabularies", loaded.len(), source.name);
        loaded
    };

    Ok(SideVocabs { words, features })
}
