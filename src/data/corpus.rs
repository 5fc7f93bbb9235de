// ============================================================
// Layer 4 — Corpus-to-Index Pipeline
// ============================================================
// Reads an aligned source/target file pair line by line and
// turns every accepted pair into vocabulary indices.
//
//   src line ─┐
//             ├─► trim ─► extract features ─► length filter
//   tgt line ─┘                                   │
//                                                 ▼
//                        truncate ─► convert_to_idx / load image
//                                                 │
//                                                 ▼
//                         shuffle (seeded) ─► stable sort by length
//
// Per-line outcomes:
//   both files at EOF       → stop
//   one file at EOF         → warn, stop, keep what we have
//   either line empty       → warn, count, skip
//   too long                → count as ignored, skip
//   feature count mismatch  → error, stop
//   missing image           → error, stop
//
// The whole corpus is held in memory for the post-pass.

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::data::dataset::{SourceRecord, TargetRecord};
use crate::data::image::resolve_image_path;
use crate::data::permutation::{apply_permutation, seeded_permutation, stable_sort_order};
use crate::data::vocab::Vocabulary;
use crate::data::vocab_builder::SideVocabs;
use crate::domain::constants::{BOS_WORD, EOS_WORD, UNK_WORD};
use crate::domain::error::{PreprocessError, Result};
use crate::domain::example::SourceData;
use crate::domain::features::{extract_line, ExtractedSentence};
use crate::domain::traits::ImageLoader;

// ─── Options ──────────────────────────────────────────────────────────────────
/// Filtering, truncation and ordering settings for one `make_data` run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusOptions {
    /// Pairs whose source has more words are ignored
    pub src_seq_length:       usize,
    /// Keep only this many source words (0 = no truncation)
    pub src_seq_length_trunc: usize,
    /// Pairs whose target has more words are ignored
    pub tgt_seq_length:       usize,
    /// Keep only this many target words (0 = no truncation)
    pub tgt_seq_length_trunc: usize,
    pub shuffle:              bool,
    pub seed:                 u64,
    /// Log progress every this many pairs (0 = never)
    pub report_every:         usize,
}

impl Default for CorpusOptions {
    fn default() -> Self {
        Self {
            src_seq_length:       50,
            src_seq_length_trunc: 0,
            tgt_seq_length:       50,
            tgt_seq_length_trunc: 0,
            shuffle:              true,
            seed:                 3435,
            report_every:         100_000,
        }
    }
}

/// How source lines become source data.
pub enum SourceSide<'a> {
    /// Index words with the source vocabularies
    Text(&'a SideVocabs),
    /// Each line names an image under `dir`
    Image {
        loader:   &'a dyn ImageLoader,
        dir:      &'a Path,
        /// Skip images taller or wider than `(height, width)`
        max_size: Option<(usize, usize)>,
    },
}

// ─── Output ───────────────────────────────────────────────────────────────────
/// Counters reported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusStats {
    /// Non-empty pairs examined
    pub processed:   usize,
    pub accepted:    usize,
    /// Rejected by the length filter (or image size limit)
    pub ignored:     usize,
    pub empty_lines: usize,
    /// Source and target ran out at different lines
    pub misaligned:  bool,
}

/// One accepted, indexed pair.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedExample {
    /// Position among accepted pairs, in file order
    pub index:        usize,
    pub src:          SourceData,
    /// Image file name as written in the source line (img mode)
    pub src_path:     Option<String>,
    /// Target indices, wrapped in BOS/EOS
    pub tgt:          Vec<u32>,
    pub src_features: Vec<Vec<u32>>,
    pub tgt_features: Vec<Vec<u32>>,
    /// Source word count before truncation
    pub size:         usize,
}

#[derive(Debug, Clone)]
pub struct IndexedCorpus {
    pub examples: Vec<IndexedExample>,
    pub stats:    CorpusStats,
}

impl IndexedCorpus {
    /// Split into the source and target record streams used by dataset assembly.
    pub fn into_records(self) -> (Vec<SourceRecord>, Vec<TargetRecord>) {
        self.examples
            .into_iter()
            .map(|ex| {
                (
                    SourceRecord {
                        index:    ex.index,
                        src:      ex.src,
                        src_path: ex.src_path,
                        features: ex.src_features,
                    },
                    TargetRecord {
                        index:    ex.index,
                        tgt:      ex.tgt,
                        features: ex.tgt_features,
                    },
                )
            })
            .unzip()
    }
}

// ─── Pipeline ─────────────────────────────────────────────────────────────────
fn open(path: &Path) -> Result<BufReader<fs::File>> {
    fs::File::open(path)
        .map(BufReader::new)
        .map_err(|_| PreprocessError::MissingResource {
            what: "corpus file",
            path: path.to_path_buf(),
        })
}

fn check_columns(sentence: &ExtractedSentence, dicts: &[Vocabulary], line: usize) -> Result<()> {
    // sentences without words carry no columns at all
    if sentence.is_empty() || sentence.num_features == dicts.len() {
        Ok(())
    } else {
        Err(PreprocessError::InconsistentFeatureColumns {
            line,
            expected: dicts.len(),
            found:    sentence.num_features,
        })
    }
}

fn index_features(sentence: &ExtractedSentence, dicts: &[Vocabulary]) -> Vec<Vec<u32>> {
    dicts
        .iter()
        .enumerate()
        .map(|(j, dict)| match sentence.features.get(j) {
            Some(column) => dict.convert_to_idx(column, UNK_WORD, None, None),
            None         => Vec::new(),
        })
        .collect()
}

/// Index one aligned corpus.
///
/// Returns the accepted examples, shuffled (if enabled) and then stably
/// sorted by source length, along with the run counters.
pub fn make_data(
    src_file: &Path,
    tgt_file: &Path,
    source:   &SourceSide<'_>,
    tgt:      &SideVocabs,
    opts:     &CorpusOptions,
) -> Result<IndexedCorpus> {
    tracing::info!("Processing {} & {} ...", src_file.display(), tgt_file.display());

    let mut src_reader = open(src_file)?;
    let mut tgt_reader = open(tgt_file)?;

    let mut examples: Vec<IndexedExample> = Vec::new();
    let mut stats    = CorpusStats::default();
    let mut sline    = String::new();
    let mut tline    = String::new();
    let mut line_no  = 0usize;

    loop {
        sline.clear();
        tline.clear();
        let s_read = src_reader.read_line(&mut sline)?;
        let t_read = tgt_reader.read_line(&mut tline)?;
        line_no += 1;

        // normal end of file
        if s_read == 0 && t_read == 0 {
            break;
        }

        if s_read == 0 || t_read == 0 {
            tracing::warn!(
                "source and target do not have the same number of sentences (stopped at line {})",
                line_no
            );
            stats.misaligned = true;
            break;
        }

        let (s, t) = (sline.trim(), tline.trim());
        if s.is_empty() || t.is_empty() {
            tracing::warn!("ignoring an empty line ({})", line_no);
            stats.empty_lines += 1;
            continue;
        }

        let src_sentence = extract_line(s)?;
        let tgt_sentence = extract_line(t)?;
        if let SourceSide::Text(dicts) = source {
            check_columns(&src_sentence, &dicts.features, line_no)?;
        }
        check_columns(&tgt_sentence, &tgt.features, line_no)?;

        if src_sentence.len() <= opts.src_seq_length && tgt_sentence.len() <= opts.tgt_seq_length {
            let index = examples.len();
            match index_pair(index, src_sentence, tgt_sentence, source, tgt, opts)? {
                Some(example) => examples.push(example),
                None          => stats.ignored += 1,
            }
        } else {
            stats.ignored += 1;
        }

        stats.processed += 1;
        if opts.report_every > 0 && stats.processed % opts.report_every == 0 {
            tracing::info!("... {} sentences prepared", stats.processed);
        }
    }

    if opts.shuffle {
        tracing::info!("... shuffling sentences");
        let perm = seeded_permutation(examples.len(), opts.seed);
        examples = apply_permutation(examples, &perm);
    }

    tracing::info!("... sorting sentences by size");
    let sizes: Vec<usize> = examples.iter().map(|ex| ex.size).collect();
    examples = apply_permutation(examples, &stable_sort_order(&sizes));

    stats.accepted = examples.len();
    tracing::info!(
        "Prepared {} sentences ({} ignored due to length == 0 or src len > {} or tgt len > {})",
        stats.accepted,
        stats.ignored,
        opts.src_seq_length,
        opts.tgt_seq_length
    );

    Ok(IndexedCorpus { examples, stats })
}

/// Truncate and index one pair that passed the length filter.
/// `None` means the pair was rejected after all (oversized image).
fn index_pair(
    index:            usize,
    mut src_sentence: ExtractedSentence,
    mut tgt_sentence: ExtractedSentence,
    source:           &SourceSide<'_>,
    tgt:              &SideVocabs,
    opts:             &CorpusOptions,
) -> Result<Option<IndexedExample>> {
    let size = src_sentence.len();

    if opts.src_seq_length_trunc != 0 {
        src_sentence.truncate(opts.src_seq_length_trunc);
    }
    if opts.tgt_seq_length_trunc != 0 {
        tgt_sentence.truncate(opts.tgt_seq_length_trunc);
    }

    let (src, src_path, src_features) = match source {
        SourceSide::Text(dicts) => (
            SourceData::Text(dicts.words.convert_to_idx(&src_sentence.words, UNK_WORD, None, None)),
            None,
            index_features(&src_sentence, &dicts.features),
        ),
        SourceSide::Image { loader, dir, max_size } => {
            let Some(name) = src_sentence.words.first() else {
                return Ok(None);
            };
            let path  = resolve_image_path(dir, name)?;
            let image = loader.load(&path)?;
            if let Some((max_h, max_w)) = max_size {
                if image.height > *max_h || image.width > *max_w {
                    tracing::debug!("skipping {}: larger than {}x{}", name, max_h, max_w);
                    return Ok(None);
                }
            }
            (SourceData::Image(image), Some(name.clone()), Vec::new())
        }
    };

    Ok(Some(IndexedExample {
        index,
        src,
        src_path,
        tgt: tgt
            .words
            .convert_to_idx(&tgt_sentence.words, UNK_WORD, Some(BOS_WORD), Some(EOS_WORD)),
        src_features,
        tgt_features: index_features(&tgt_sentence, &tgt.features),
        size,
    }))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::vocab_builder::make_vocabulary;
    use crate::domain::constants::{BOS, EOS, UNK};
    use crate::domain::example::ImageTensor;
    use std::path::PathBuf;

    struct Fixture {
        _dir: tempfile::TempDir,
        src:  PathBuf,
        tgt:  PathBuf,
    }

    fn corpus(src: &str, tgt: &str) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let s = dir.path().join("src.txt");
        let t = dir.path().join("tgt.txt");
        fs::write(&s, src).unwrap();
        fs::write(&t, tgt).unwrap();
        Fixture { _dir: dir, src: s, tgt: t }
    }

    fn vocabs(f: &Fixture) -> (SideVocabs, SideVocabs) {
        (
            make_vocabulary(&f.src, 100, false).unwrap(),
            make_vocabulary(&f.tgt, 100, false).unwrap(),
        )
    }

    fn no_shuffle() -> CorpusOptions {
        CorpusOptions { shuffle: false, ..CorpusOptions::default() }
    }

    #[test]
    fn test_long_target_line_is_ignored() {
        let f = corpus("a b\nc d\ne f\n", "x\ny y y y\nz\n");
        let (sv, tv) = vocabs(&f);
        let opts = CorpusOptions { tgt_seq_length: 3, ..no_shuffle() };

        let out = make_data(&f.src, &f.tgt, &SourceSide::Text(&sv), &tv, &opts).unwrap();
        assert_eq!(out.examples.len(), 2);
        assert_eq!(out.stats.accepted, 2);
        assert_eq!(out.stats.ignored, 1);
        assert!(!out.stats.misaligned);
    }

    #[test]
    fn test_long_source_line_is_ignored() {
        let f = corpus("a\nb b b b\nc c\n", "x\ny\nz\n");
        let (sv, tv) = vocabs(&f);
        let opts = CorpusOptions { src_seq_length: 3, ..no_shuffle() };

        let out = make_data(&f.src, &f.tgt, &SourceSide::Text(&sv), &tv, &opts).unwrap();
        assert_eq!(out.stats.processed, 3);
        assert_eq!(out.stats.accepted, 2);
        assert_eq!(out.stats.ignored, 1);
        let indices: Vec<usize> = out.examples.iter().map(|e| e.index).collect();
        assert_eq!(indices, vec![0, 1]);
        assert!(out.examples.iter().all(|e| e.size <= 3));
    }

    #[test]
    fn test_lowercased_vocabularies_index_mixed_case_without_unk() {
        let f = corpus("The Cat\nthe CAT sat\n", "Le Chat\nLE chat\n");
        let sv = make_vocabulary(&f.src, 100, true).unwrap();
        let tv = make_vocabulary(&f.tgt, 100, true).unwrap();

        let out = make_data(&f.src, &f.tgt, &SourceSide::Text(&sv), &tv, &no_shuffle()).unwrap();
        assert_eq!(out.examples.len(), 2);
        for ex in &out.examples {
            assert!(!ex.src.as_text().unwrap().contains(&UNK));
            assert!(!ex.tgt.contains(&UNK));
        }
        let first = out.examples.iter().find(|e| e.index == 0).unwrap();
        assert_eq!(
            sv.words.convert_to_labels(first.src.as_text().unwrap(), None),
            vec!["the", "cat"]
        );
    }

    #[test]
    fn test_target_is_wrapped_and_unknowns_map_to_unk() {
        let f = corpus("a\n", "x\n");
        let (sv, _) = vocabs(&f);
        let tv = SideVocabs::empty();

        let out = make_data(&f.src, &f.tgt, &SourceSide::Text(&sv), &tv, &no_shuffle()).unwrap();
        assert_eq!(out.examples[0].tgt, vec![BOS, UNK, EOS]);
        assert_eq!(out.examples[0].src, SourceData::Text(vec![sv.words.lookup("a").unwrap()]));
    }

    #[test]
    fn test_unshuffled_output_is_stably_sorted_by_length() {
        let f = corpus("a a a\nb\nc c\nd\n", "1\n2\n3\n4\n");
        let (sv, tv) = vocabs(&f);

        let out = make_data(&f.src, &f.tgt, &SourceSide::Text(&sv), &tv, &no_shuffle()).unwrap();
        let sizes: Vec<usize>   = out.examples.iter().map(|e| e.size).collect();
        let indices: Vec<usize> = out.examples.iter().map(|e| e.index).collect();
        assert_eq!(sizes, vec![1, 1, 2, 3]);
        // "b" (index 1) stays ahead of "d" (index 3)
        assert_eq!(indices, vec![1, 3, 2, 0]);
    }

    #[test]
    fn test_shuffled_output_is_still_sorted_and_complete() {
        let f = corpus("a a\nb\nc c c\nd\ne e\n", "1\n2\n3\n4\n5\n");
        let (sv, tv) = vocabs(&f);

        let out = make_data(&f.src, &f.tgt, &SourceSide::Text(&sv), &tv, &CorpusOptions::default())
            .unwrap();
        let sizes: Vec<usize> = out.examples.iter().map(|e| e.size).collect();
        assert!(sizes.windows(2).all(|w| w[0] <= w[1]));
        let mut indices: Vec<usize> = out.examples.iter().map(|e| e.index).collect();
        indices.sort_unstable();
        assert_eq!(indices, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_shuffle_keeps_source_and_target_aligned() {
        let f = corpus("a\nb b\nc\nd\n", "A\nB\nC\nD\n");
        let (sv, tv) = vocabs(&f);

        let out = make_data(&f.src, &f.tgt, &SourceSide::Text(&sv), &tv, &CorpusOptions::default())
            .unwrap();
        for ex in &out.examples {
            let src = sv.words.convert_to_labels(ex.src.as_text().unwrap(), None);
            let tgt = tv.words.convert_to_labels(&ex.tgt[1..2], None);
            assert_eq!(src[0].to_uppercase(), tgt[0]);
        }
    }

    #[test]
    fn test_empty_lines_are_skipped_and_counted() {
        let f = corpus("a\n\nb\n", "x\ny\n  \n");
        let (sv, tv) = vocabs(&f);

        let out = make_data(&f.src, &f.tgt, &SourceSide::Text(&sv), &tv, &no_shuffle()).unwrap();
        assert_eq!(out.examples.len(), 1);
        assert_eq!(out.stats.empty_lines, 2);
        assert_eq!(out.stats.ignored, 0);
    }

    #[test]
    fn test_misaligned_corpus_keeps_partial_results() {
        let f = corpus("a\nb\nc\n", "x\ny\n");
        let (sv, tv) = vocabs(&f);

        let out = make_data(&f.src, &f.tgt, &SourceSide::Text(&sv), &tv, &no_shuffle()).unwrap();
        assert!(out.stats.misaligned);
        assert_eq!(out.examples.len(), 2);
    }

    #[test]
    fn test_truncation_keeps_prefix_but_records_full_length() {
        let f = corpus("a b c d\n", "w x y z\n");
        let (sv, tv) = vocabs(&f);
        let opts = CorpusOptions { src_seq_length_trunc: 2, tgt_seq_length_trunc: 1, ..no_shuffle() };

        let out = make_data(&f.src, &f.tgt, &SourceSide::Text(&sv), &tv, &opts).unwrap();
        let ex = &out.examples[0];
        assert_eq!(ex.src.len(), 2);
        assert_eq!(ex.tgt.len(), 3);
        assert_eq!(ex.size, 4);
    }

    #[test]
    fn test_feature_columns_are_indexed_and_truncated() {
        let f = corpus("a￨N b￨V c￨N\n", "x￨1\n");
        let (sv, tv) = vocabs(&f);
        let opts = CorpusOptions { src_seq_length_trunc: 2, ..no_shuffle() };

        let out = make_data(&f.src, &f.tgt, &SourceSide::Text(&sv), &tv, &opts).unwrap();
        let ex = &out.examples[0];
        assert_eq!(ex.src_features.len(), 1);
        assert_eq!(
            ex.src_features[0],
            vec![sv.features[0].lookup("N").unwrap(), sv.features[0].lookup("V").unwrap()]
        );
        assert_eq!(ex.tgt_features[0], vec![tv.features[0].lookup("1").unwrap()]);
    }

    #[test]
    fn test_malformed_feature_count_is_fatal() {
        let f = corpus("a￨N b\n", "x\n");
        let sv = SideVocabs::empty();
        let tv = SideVocabs::empty();

        let err = make_data(&f.src, &f.tgt, &SourceSide::Text(&sv), &tv, &no_shuffle()).unwrap_err();
        assert!(matches!(err, PreprocessError::MalformedFeatureCount { .. }));
    }

    struct FakeLoader;

    impl ImageLoader for FakeLoader {
        fn load(&self, path: &Path) -> Result<ImageTensor> {
            // "<h>x<w>.png" → blank image of that size
            let stem = path.file_stem().unwrap().to_str().unwrap();
            let (h, w) = stem.split_once('x').unwrap();
            let (h, w): (usize, usize) = (h.parse().unwrap(), w.parse().unwrap());
            Ok(ImageTensor::new(1, h, w, vec![0.0; h * w]))
        }
    }

    #[test]
    fn test_image_mode_loads_named_images() {
        let f = corpus("2x3.png\n9x9.png\n", "x\ny\n");
        let img_dir = f.src.parent().unwrap().to_path_buf();
        fs::write(img_dir.join("2x3.png"), b"").unwrap();
        fs::write(img_dir.join("9x9.png"), b"").unwrap();
        let tv = make_vocabulary(&f.tgt, 100, false).unwrap();
        let source = SourceSide::Image { loader: &FakeLoader, dir: &img_dir, max_size: Some((5, 5)) };

        let out = make_data(&f.src, &f.tgt, &source, &tv, &no_shuffle()).unwrap();
        assert_eq!(out.examples.len(), 1);
        assert_eq!(out.stats.ignored, 1);
        let img = out.examples[0].src.as_image().unwrap();
        assert_eq!((img.height, img.width), (2, 3));
        assert_eq!(out.examples[0].src_path.as_deref(), Some("2x3.png"));
    }

    #[test]
    fn test_image_mode_missing_file_is_fatal() {
        let f = corpus("1x1.png\n", "x\n");
        let img_dir = f.src.parent().unwrap().to_path_buf();
        let tv = SideVocabs::empty();
        let source = SourceSide::Image { loader: &FakeLoader, dir: &img_dir, max_size: None };

        let err = make_data(&f.src, &f.tgt, &source, &tv, &no_shuffle()).unwrap_err();
        assert!(matches!(err, PreprocessError::MissingResource { what: "image", .. }));
    }

    #[test]
    fn test_into_records_preserves_pairing() {
        let f = corpus("a\nb b\n", "x\ny\n");
        let (sv, tv) = vocabs(&f);
        let out = make_data(&f.src, &f.tgt, &SourceSide::Text(&sv), &tv, &no_shuffle()).unwrap();

        let (src, tgt) = out.into_records();
        assert_eq!(src.len(), 2);
        for (s, t) in src.iter().zip(&tgt) {
            assert_eq!(s.index, t.index);
        }
    }
}
