//! Mixed Latin/CJK tokenizer.
//!
//! Latin-script (and any other alphanumeric) runs are split on
//! non-alphanumeric boundaries and lowercased.  CJK ideographs carry no
//! whitespace between words, so each one becomes a token of its own.

/// Returns `true` for CJK ideographs (unified, extension A, compatibility).
pub fn is_cjk(c: char) -> bool {
    matches!(c,
        '\u{4E00}'..='\u{9FFF}'
        | '\u{3400}'..='\u{4DBF}'
        | '\u{F900}'..='\u{FAFF}'
        | '\u{20000}'..='\u{2A6DF}')
}

/// Split `text` into lowercase tokens.
///
/// ```
/// use mnemos_index::tokenize;
///
/// assert_eq!(tokenize("The cat, sat!"), vec!["the", "cat", "sat"]);
/// assert_eq!(tokenize("我爱Rust"), vec!["我", "爱", "rust"]);
/// ```
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();

    for c in text.chars() {
        if is_cjk(c) {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            tokens.push(c.to_string());
        } else if c.is_alphanumeric() {
            current.extend(c.to_lowercase());
        } else if !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}
