use std::collections::BTreeSet;

/// The set of trigrams of a text
///
/// Every word is lowercased and padded with two blanks in front and one
/// blank at the end before it is split into three-character shingles, so
/// `"cat"` yields `"  c"`, `" ca"`, `"cat"` and `"at "`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Trigrams {
    inner: BTreeSet<[char; 3]>,
}

impl Trigrams {
    /// Extracts the trigrams of `text`
    pub fn new(text: &str) -> Self {
        let mut inner = BTreeSet::new();
        for word in text.split(|c: char| !c.is_alphanumeric()) {
            if word.is_empty() {
                continue;
            }
            let padded: Vec<char> = "  "
                .chars()
                .chain(word.chars().flat_map(char::to_lowercase))
                .chain(std::iter::once(' '))
                .collect();
            for window in padded.windows(3) {
                inner.insert([window[0], window[1], window[2]]);
            }
        }
        Self { inner }
    }

    /// Returns the number of distinct trigrams
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns `true` if the text contained no words
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Jaccard similarity of the two trigram sets, between `0.0` and `1.0`
    pub fn similarity(&self, other: &Trigrams) -> f32 {
        let shared = self.inner.intersection(&other.inner).count();
        let total = self.len() + other.len() - shared;
        if total == 0 {
            return 0.0;
        }
        shared as f32 / total as f32
    }
}

/// Trigram similarity of two texts
///
/// # Examples
///
/// ```
/// use phenotag::search::similarity;
///
/// assert_eq!(similarity("asthma", "asth"), 0.5);
/// assert!(similarity("asthma", "asth") > similarity("asthmatic bronchitis", "asth"));
/// ```
pub fn similarity(a: &str, b: &str) -> f32 {
    Trigrams::new(a).similarity(&Trigrams::new(b))
}
