// ============================================================
// Layer 3 — Reserved Symbols
// ============================================================
// Control symbols that every vocabulary carries at fixed,
// deterministic indices. Word indices start right after them.

/// Padding symbol — fills short sequences up to the batch length
pub const PAD_WORD: &str = "<blank>";
/// Substituted for every word missing from a vocabulary
pub const UNK_WORD: &str = "<unk>";
/// Sequence start marker (target side only)
pub const BOS_WORD: &str = "<s>";
/// Sequence end marker (target side only)
pub const EOS_WORD: &str = "</s>";
/// Copy-mechanism marker
pub const COPY_WORD: &str = "<copy>";

pub const PAD: u32  = 0;
pub const UNK: u32  = 1;
pub const BOS: u32  = 2;
pub const EOS: u32  = 3;
pub const COPY: u32 = 4;

/// Reserved symbols in index order: `RESERVED[i]` lives at index `i`.
pub const RESERVED: [&str; 5] = [PAD_WORD, UNK_WORD, BOS_WORD, EOS_WORD, COPY_WORD];

/// Separates a word from its side features inside one token,
/// e.g. `house￨NN￨B-NP`.
pub const FEATURE_DELIMITER: char = '\u{FFE8}';

/// Returns true if `symbol` is one of the reserved control symbols
pub fn is_reserved(symbol: &str) -> bool {
    RESERVED.contains(&symbol)
}
