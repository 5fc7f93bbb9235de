// ============================================================
// Layer 6 — Run Report
// ============================================================
// Records per-split corpus statistics to a CSV file after a
// preprocessing run.
//
// Columns:
//   - split:       train / valid
//   - processed:   non-empty line pairs examined
//   - accepted:    pairs indexed
//   - ignored:     pairs over the length limit (or image size)
//   - empty_lines: pairs with an empty source or target line
//   - misaligned:  1 if the two files had different line counts
//   - examples:    examples left after dataset assembly
//
// Output file: {prefix}.report.csv
//
// Example CSV output:
//   split,processed,accepted,ignored,empty_lines,misaligned,examples
//   train,10000,9412,560,28,0,9398
//   valid,3000,2841,151,8,0,2839
//
// Reference: Rust Book §12 (I/O and File Handling)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use crate::data::corpus::CorpusStats;

pub const HEADER: &str = "split,processed,accepted,ignored,empty_lines,misaligned,examples";

/// Statistics of one split
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitReport {
    pub split:    String,
    pub stats:    CorpusStats,
    /// Examples kept by dataset assembly
    pub examples: usize,
}

impl SplitReport {
    pub fn new(split: impl Into<String>, stats: CorpusStats, examples: usize) -> Self {
        Self { split: split.into(), stats, examples }
    }

    /// Share of processed pairs that were indexed, in [0, 1]
    pub fn acceptance_rate(&self) -> f64 {
        if self.stats.processed == 0 {
            0.0
        } else {
            self.stats.accepted as f64 / self.stats.processed as f64
        }
    }

    fn csv_row(&self) -> String {
        format!(
            "{},{},{},{},{},{},{}",
            self.split,
            self.stats.processed,
            self.stats.accepted,
            self.stats.ignored,
            self.stats.empty_lines,
            u8::from(self.stats.misaligned),
            self.examples,
        )
    }
}

/// All splits of one run.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    rows: Vec<SplitReport>,
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, row: SplitReport) {
        tracing::info!(
            "{}: {} pairs examined, {} indexed ({:.1}%), {} kept, {} ignored, {} empty",
            row.split,
            row.stats.processed,
            row.stats.accepted,
            row.acceptance_rate() * 100.0,
            row.examples,
            row.stats.ignored,
            row.stats.empty_lines,
        );
        self.rows.push(row);
    }

    pub fn rows(&self) -> &[SplitReport] {
        &self.rows
    }

    /// Overwrite `path` with the header and one row per split.
    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let path = path.as_ref();
        let file = fs::File::create(path)
            .with_context(|| format!("Cannot create report '{}'", path.display()))?;
        let mut out = BufWriter::new(file);

        writeln!(out, "{HEADER}")?;
        for row in &self.rows {
            writeln!(out, "{}", row.csv_row())?;
        }
        out.flush()?;

        tracing::debug!("Wrote run report: '{}'", path.display());
        Ok(path.to_path_buf())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn stats(processed: usize, accepted: usize) -> CorpusStats {
        CorpusStats {
            processed,
            accepted,
            ignored: processed - accepted,
            ..Default::default()
        }
    }

    #[test]
    fn test_acceptance_rate() {
        assert_eq!(SplitReport::new("train", stats(4, 3), 3).acceptance_rate(), 0.75);
        assert_eq!(SplitReport::new("valid", stats(0, 0), 0).acceptance_rate(), 0.0);
    }

    #[test]
    fn test_csv_has_header_and_one_row_per_split() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("demo.report.csv");

        let mut report = RunReport::new();
        report.push(SplitReport::new("train", stats(10, 8), 7));
        let mut valid = stats(5, 5);
        valid.misaligned = true;
        report.push(SplitReport::new("valid", valid, 5));
        report.write_csv(&path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec![HEADER, "train,10,8,2,0,0,7", "valid,5,5,0,0,1,5"]);
    }
}
