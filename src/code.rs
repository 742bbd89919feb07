//! Canonical forms of clinical code strings
//!
//! Codes from different sources are written inconsistently (`J45.0`, `j450`,
//! `A00-A09`, `H33..`). All joins between phenotype code lists, code maps and
//! ontology nodes are performed on the normalised forms defined here.

use serde::{Deserialize, Serialize};

/// The three normal forms of a clinical code
///
/// - `dot_code`: the lowercased code
/// - `alt_code`: the lowercased code with everything except `[a-z0-9-]` removed
/// - `min_code`: the lowercased code with the suffix starting at the last `-` removed
///
/// # Examples
///
/// ```
/// use phenotag::normalise;
///
/// let code = normalise("J45.0");
/// assert_eq!(code.dot_code(), "j45.0");
/// assert_eq!(code.alt_code(), "j450");
/// assert_eq!(code.min_code(), "j45.0");
///
/// let range = normalise("A00-A09");
/// assert_eq!(range.alt_code(), "a00-a09");
/// assert_eq!(range.min_code(), "a00");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NormalisedCode {
    dot_code: String,
    alt_code: String,
    min_code: String,
}

impl NormalisedCode {
    /// The lowercased code
    pub fn dot_code(&self) -> &str {
        &self.dot_code
    }

    /// The lowercased code without punctuation (except `-`)
    pub fn alt_code(&self) -> &str {
        &self.alt_code
    }

    /// The lowercased code without a trailing range suffix
    pub fn min_code(&self) -> &str {
        &self.min_code
    }

    /// Returns `true` if the code was empty or contained only punctuation
    /// and whitespace
    ///
    /// Such codes never take part in any join
    pub fn is_empty(&self) -> bool {
        self.alt_code.is_empty()
    }

    /// Returns `true` if either `dot_code` or `alt_code` of `self` is
    /// identical to one of the two forms of `other`
    pub fn matches(&self, other: &NormalisedCode) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        self.dot_code == other.dot_code
            || self.dot_code == other.alt_code
            || self.alt_code == other.dot_code
            || self.alt_code == other.alt_code
    }
}

/// Normalises a clinical code into its [`NormalisedCode`] forms
///
/// The function is total: an empty string maps to three empty strings.
pub fn normalise(code: &str) -> NormalisedCode {
    let dot_code = code.to_lowercase();
    let alt_code = dot_code
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-')
        .collect();
    let min_code = match dot_code.rfind('-') {
        Some(idx) => dot_code[..idx].to_string(),
        None => dot_code.clone(),
    };
    NormalisedCode {
        dot_code,
        alt_code,
        min_code,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn lowercase_and_strip() {
        let code = normalise("H33..");
        assert_eq!(code.dot_code(), "h33..");
        assert_eq!(code.alt_code(), "h33");
        assert_eq!(code.min_code(), "h33..");
    }

    #[test]
    fn empty_code() {
        let code = normalise("");
        assert_eq!(code, NormalisedCode::default());
        assert!(code.is_empty());
        assert!(normalise(" .. ").is_empty());
    }

    #[test]
    fn range_suffix() {
        assert_eq!(normalise("A00-A09").min_code(), "a00");
        assert_eq!(normalise("A00-A09-X").min_code(), "a00-a09");
        assert_eq!(normalise("-").min_code(), "");
    }

    #[test]
    fn normalisation_is_stable() {
        for raw in ["J45.0", "A00-A09", "H33..", "", "  Xa1Fz ", "É12", "c10-"] {
            let once = normalise(raw);
            assert_eq!(normalise(once.dot_code()), once, "{raw}");

            let alt = normalise(once.alt_code());
            assert_eq!(normalise(alt.alt_code()), alt, "{raw}");
        }
    }

    #[test]
    fn matching_forms() {
        assert!(normalise("J45").matches(&normalise("j45")));
        assert!(normalise("J45.0").matches(&normalise("J450")));
        assert!(!normalise("J45.0").matches(&normalise("J45")));
        assert!(!normalise("").matches(&normalise("")));
    }
}
