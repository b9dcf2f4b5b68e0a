use lazy_static::lazy_static;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref TERM: Regex = Regex::new(r"(?u)\p{L}[\p{L}\p{N}_']*").expect("valid regex");
}

/// Tokenize text into normalized terms using NFKC normalization, lowercasing,
/// and letter-led term extraction.
///
/// The same function is used for indexing and for queries. Scripts without
/// word boundaries (CJK and friends) come out of the pattern as whole letter
/// runs, kept as single tokens. Empty input yields an empty vec.
pub fn tokenize(text: &str) -> Vec<String> {
    let normalized = text.nfkc().collect::<String>().to_lowercase();
    TERM.find_iter(&normalized)
        .map(|mat| mat.as_str().to_string())
        .collect()
}
