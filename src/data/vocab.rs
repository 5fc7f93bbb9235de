// ============================================================
// Layer 4 — Vocabulary
// ============================================================
// Two types with one lifecycle:
//
//   VocabBuilder  (mutable)  add() counts symbol frequencies
//        │
//        ▼ prune(max_size)
//   Vocabulary    (frozen)   symbol ↔ index lookups, persisted
//
// Both always hold the reserved symbols at indices 0..5:
//   <blank>=0  <unk>=1  <s>=2  </s>=3  <copy>=4
//
// On disk a vocabulary is one `symbol index` pair per line.
// Loading a file skips frequency counting entirely.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::constants::{is_reserved, RESERVED, UNK};
use crate::domain::error::{PreprocessError, Result};

fn normalise(symbol: &str, lower: bool) -> String {
    if lower {
        symbol.to_lowercase()
    } else {
        symbol.to_string()
    }
}

// ─── VocabBuilder ─────────────────────────────────────────────────────────────
/// Frequency-counting vocabulary under construction. Single writer.
#[derive(Debug, Clone)]
pub struct VocabBuilder {
    labels:      Vec<String>,
    index:       HashMap<String, usize>,
    frequencies: Vec<u64>,
    lower:       bool,
}

/// Result of pruning a builder into a frozen vocabulary.
#[derive(Debug, Clone)]
pub struct PruneOutcome {
    pub vocab:       Vocabulary,
    /// Symbols held before pruning, reserved symbols included
    pub size_before: usize,
    /// Symbols kept after pruning, reserved symbols included
    pub size_after:  usize,
}

impl VocabBuilder {
    /// Create a builder seeded with the reserved symbols.
    /// With `lower` set every added symbol is lowercased first.
    pub fn new(lower: bool) -> Self {
        let mut builder = Self {
            labels:      Vec::new(),
            index:       HashMap::new(),
            frequencies: Vec::new(),
            lower,
        };
        for symbol in RESERVED {
            builder.insert(symbol.to_string());
        }
        builder
    }

    fn insert(&mut self, label: String) -> usize {
        let idx = self.labels.len();
        self.index.insert(label.clone(), idx);
        self.labels.push(label);
        self.frequencies.push(0);
        idx
    }

    /// Count one occurrence of `symbol`, inserting it if new.
    /// Returns the symbol's index inside the builder.
    pub fn add(&mut self, symbol: &str) -> u32 {
        let label = normalise(symbol, self.lower);
        let idx = match self.index.get(&label) {
            Some(&idx) => idx,
            None       => self.insert(label),
        };
        self.frequencies[idx] += 1;
        idx as u32
    }

    /// Number of distinct symbols, reserved ones included
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn frequency(&self, symbol: &str) -> u64 {
        self.index
            .get(&normalise(symbol, self.lower))
            .map(|&idx| self.frequencies[idx])
            .unwrap_or(0)
    }

    /// Keep the `max_size` most frequent non-reserved symbols plus every
    /// reserved symbol. Ties keep insertion order. Asking for more than
    /// was observed keeps everything.
    pub fn prune(&self, max_size: usize) -> PruneOutcome {
        let mut candidates: Vec<usize> = (0..self.labels.len())
            .filter(|&idx| !is_reserved(&self.labels[idx]))
            .collect();

        // sort_by is stable → equal frequencies keep insertion order
        candidates.sort_by(|&a, &b| self.frequencies[b].cmp(&self.frequencies[a]));
        candidates.truncate(max_size);

        let labels: Vec<String> = RESERVED
            .iter()
            .map(|s| s.to_string())
            .chain(candidates.into_iter().map(|idx| self.labels[idx].clone()))
            .collect();

        let vocab = Vocabulary::from_labels(labels, self.lower);
        PruneOutcome {
            size_before: self.len(),
            size_after:  vocab.len(),
            vocab,
        }
    }

    /// Freeze every observed symbol, ordered by frequency
    pub fn freeze(&self) -> Vocabulary {
        self.prune(usize::MAX).vocab
    }
}

// ─── Vocabulary ───────────────────────────────────────────────────────────────
/// Frozen symbol table. Index `i` maps to `labels[i]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "VocabTable", into = "VocabTable")]
pub struct Vocabulary {
    labels: Vec<String>,
    index:  HashMap<String, u32>,
    lower:  bool,
}

/// Serialised form: the label list is enough to rebuild the index.
#[derive(Serialize, Deserialize)]
struct VocabTable {
    labels: Vec<String>,
    lower:  bool,
}

impl From<VocabTable> for Vocabulary {
    fn from(t: VocabTable) -> Self {
        Vocabulary::from_labels(t.labels, t.lower)
    }
}

impl From<Vocabulary> for VocabTable {
    fn from(v: Vocabulary) -> Self {
        VocabTable { labels: v.labels, lower: v.lower }
    }
}

impl Vocabulary {
    fn from_labels(labels: Vec<String>, lower: bool) -> Self {
        let index = labels
            .iter()
            .enumerate()
            .map(|(i, label)| (label.clone(), i as u32))
            .collect();
        Self { labels, index, lower }
    }

    /// A vocabulary holding only the reserved symbols
    pub fn reserved_only() -> Self {
        VocabBuilder::new(false).freeze()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn is_lowercased(&self) -> bool {
        self.lower
    }

    /// Index of `symbol`, if known
    pub fn lookup(&self, symbol: &str) -> Option<u32> {
        if self.lower {
            self.index.get(&symbol.to_lowercase()).copied()
        } else {
            self.index.get(symbol).copied()
        }
    }

    /// Symbol stored at `idx`, if in range
    pub fn symbol(&self, idx: u32) -> Option<&str> {
        self.labels.get(idx as usize).map(String::as_str)
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Map words to indices. Unknown words take `unk`'s index; `bos`/`eos`
    /// are prepended/appended when supplied.
    pub fn convert_to_idx<S: AsRef<str>>(
        &self,
        words: &[S],
        unk:   &str,
        bos:   Option<&str>,
        eos:   Option<&str>,
    ) -> Vec<u32> {
        let unk_idx = self.lookup(unk).unwrap_or(UNK);
        let boundary = |s: &str| self.lookup(s).unwrap_or(unk_idx);

        let mut ids = Vec::with_capacity(words.len() + 2);
        if let Some(bos) = bos {
            ids.push(boundary(bos));
        }
        ids.extend(
            words
                .iter()
                .map(|w| self.lookup(w.as_ref()).unwrap_or(unk_idx)),
        );
        if let Some(eos) = eos {
            ids.push(boundary(eos));
        }
        ids
    }

    /// Inverse of `convert_to_idx`. Stops after `stop` when it is seen.
    pub fn convert_to_labels(&self, ids: &[u32], stop: Option<u32>) -> Vec<String> {
        let mut labels = Vec::with_capacity(ids.len());
        for &id in ids {
            labels.push(self.symbol(id).unwrap_or(RESERVED[UNK as usize]).to_string());
            if Some(id) == stop {
                break;
            }
        }
        labels
    }

    /// Write one `symbol index` pair per line, in index order
    pub fn write_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut out = BufWriter::new(fs::File::create(path.as_ref())?);
        for (idx, label) in self.labels.iter().enumerate() {
            writeln!(out, "{label} {idx}")?;
        }
        out.flush()?;
        Ok(())
    }

    /// Read a vocabulary written by `write_file` and use it verbatim.
    ///
    /// Indices must be dense (`0..n`, any line order), every symbol must
    /// appear once and the reserved symbols must sit at their fixed
    /// indices. With `lower` set the symbols are lowercased on load.
    pub fn load_file(path: impl AsRef<Path>, lower: bool) -> Result<Self> {
        let path = path.as_ref();
        let malformed = |line: usize, reason: String| PreprocessError::MalformedVocabulary {
            path: path.to_path_buf(),
            line,
            reason,
        };

        let reader = BufReader::new(fs::File::open(path)?);
        let mut entries: Vec<(usize, usize, String)> = Vec::new();

        for (n, line) in reader.lines().enumerate() {
            let line = line?;
            let line_no = n + 1;
            if line.trim().is_empty() {
                continue;
            }

            let (label, idx) = line
                .trim_end()
                .rsplit_once(' ')
                .ok_or_else(|| malformed(line_no, "expected '<symbol> <index>'".into()))?;
            let idx: usize = idx
                .parse()
                .map_err(|e| malformed(line_no, format!("bad index '{idx}': {e}")))?;
            entries.push((line_no, idx, normalise(label, lower)));
        }

        // Dense indices are bounded by the entry count
        let mut slots: Vec<Option<String>> = vec![None; entries.len()];
        let count = slots.len();
        let mut seen = HashSet::with_capacity(count);
        for (line_no, idx, label) in entries {
            let slot = slots.get_mut(idx).ok_or_else(|| {
                malformed(line_no, format!("index {idx} out of range for {count} symbols"))
            })?;
            if slot.is_some() {
                return Err(malformed(line_no, format!("index {idx} assigned twice")));
            }
            if !seen.insert(label.clone()) {
                return Err(malformed(line_no, format!("symbol '{label}' assigned twice")));
            }
            *slot = Some(label);
        }

        let labels = slots
            .into_iter()
            .enumerate()
            .map(|(idx, s)| s.ok_or_else(|| malformed(0, format!("index {idx} is missing"))))
            .collect::<Result<Vec<_>>>()?;

        for (idx, reserved) in RESERVED.iter().enumerate() {
            if labels.get(idx).map(String::as_str) != Some(*reserved) {
                return Err(malformed(
                    0,
                    format!("reserved symbol '{reserved}' must be at index {idx}"),
                ));
            }
        }

        Ok(Self::from_labels(labels, lower))
    }
}
