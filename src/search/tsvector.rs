use std::collections::BTreeMap;
use std::fmt::Display;
use std::ops::BitOr;

use serde::{Deserialize, Serialize};

/// Highest position that can be stored in a [`TsVector`]
pub const MAX_POSITION: u16 = 16_383;

/// Maximum number of positions recorded per lexeme
pub const MAX_POSITIONS_PER_LEXEME: usize = 256;

/// English stop words, they are never indexed but still occupy a position
const STOP_WORDS: [&str; 127] = [
    "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any", "are",
    "as", "at", "be", "because", "been", "before", "being", "below", "between", "both", "but",
    "by", "can", "did", "do", "does", "doing", "don", "down", "during", "each", "few", "for",
    "from", "further", "had", "has", "have", "having", "he", "her", "here", "hers", "herself",
    "him", "himself", "his", "how", "i", "if", "in", "into", "is", "it", "its", "itself", "just",
    "me", "more", "most", "my", "myself", "no", "nor", "not", "now", "of", "off", "on", "once",
    "only", "or", "other", "our", "ours", "ourselves", "out", "over", "own", "s", "same", "she",
    "should", "so", "some", "such", "t", "than", "that", "the", "their", "theirs", "them",
    "themselves", "then", "there", "these", "they", "this", "those", "through", "to", "too",
    "under", "until", "up", "very", "was", "we", "were", "what", "when", "where", "which",
    "while", "who", "whom", "why", "will", "with", "you", "your", "yours", "yourself",
    "yourselves",
];

/// Weight class of a lexeme position
///
/// Ranking prefers `A` over `B` over `C` over `D`. Unweighted text is `D`.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Weight {
    /// Lowest weight, the default
    #[default]
    D,
    /// Low weight
    C,
    /// High weight
    B,
    /// Highest weight
    A,
}

impl Weight {
    /// Returns the numeric weight used for ranking
    pub fn value(&self) -> f32 {
        match self {
            Weight::D => 0.1,
            Weight::C => 0.2,
            Weight::B => 0.4,
            Weight::A => 1.0,
        }
    }
}

impl Display for Weight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let c = match self {
            Weight::D => "",
            Weight::C => "C",
            Weight::B => "B",
            Weight::A => "A",
        };
        write!(f, "{c}")
    }
}

/// A single occurrence of a lexeme
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// 1-based word position inside the source text
    pub pos: u16,
    /// Weight class of the occurrence
    pub weight: Weight,
}

/// Splits text into lowercase words
///
/// Words are maximal runs of alphanumeric characters. Stop words are
/// returned as `None` so that callers can keep counting positions.
pub(crate) fn words(text: &str) -> impl Iterator<Item = Option<String>> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(|word| {
            let word = word.to_lowercase();
            if STOP_WORDS.binary_search(&word.as_str()).is_ok() {
                None
            } else {
                Some(word)
            }
        })
}

/// A tokenised, weighted representation of text
///
/// Every lexeme records the positions it occurred at, together with a
/// [`Weight`] class. Vectors can be re-weighted ([`TsVector::with_weight`])
/// and concatenated (`&a | &b`), where the positions of the right operand
/// are shifted behind the last position of the left operand.
///
/// # Examples
///
/// ```
/// use phenotag::search::{TsVector, Weight};
///
/// let name = TsVector::from_text("Asthma of the lung").with_weight(Weight::A);
/// let code = TsVector::from_text("J45");
///
/// let vector = &name | &code;
/// assert_eq!(vector.to_string(), "'asthma':1A 'j45':5 'lung':4A");
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TsVector {
    lexemes: BTreeMap<String, Vec<Position>>,
}

impl TsVector {
    /// Constructs an empty [`TsVector`]
    pub fn new() -> Self {
        Self::default()
    }

    /// Tokenises `text` into a vector with weight `D`
    pub fn from_text(text: &str) -> Self {
        let mut vector = TsVector::new();
        for (idx, word) in words(text).enumerate() {
            let Some(word) = word else { continue };
            let pos = u16::try_from(idx + 1).unwrap_or(MAX_POSITION).min(MAX_POSITION);
            let position = Position {
                pos,
                weight: Weight::D,
            };
            vector.push(word, position);
        }
        vector
    }

    fn push(&mut self, lexeme: String, position: Position) {
        let positions = self.lexemes.entry(lexeme).or_default();
        if positions.len() < MAX_POSITIONS_PER_LEXEME && !positions.contains(&position) {
            positions.push(position);
        }
    }

    /// Sets the weight of every position to `weight`
    #[must_use]
    pub fn with_weight(mut self, weight: Weight) -> Self {
        for positions in self.lexemes.values_mut() {
            for position in positions {
                position.weight = weight;
            }
        }
        self
    }

    /// Returns `true` if the vector has no lexemes
    pub fn is_empty(&self) -> bool {
        self.lexemes.is_empty()
    }

    /// Returns the number of distinct lexemes
    pub fn len(&self) -> usize {
        self.lexemes.len()
    }

    /// Returns `true` if the exact lexeme is part of the vector
    pub fn contains(&self, lexeme: &str) -> bool {
        self.lexemes.contains_key(lexeme)
    }

    /// Returns the positions of a lexeme
    pub fn positions(&self, lexeme: &str) -> &[Position] {
        self.lexemes.get(lexeme).map(Vec::as_slice).unwrap_or_default()
    }

    /// Iterates all lexemes and their positions, ordered by lexeme
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Position])> {
        self.lexemes
            .iter()
            .map(|(lexeme, positions)| (lexeme.as_str(), positions.as_slice()))
    }

    /// Iterates all lexemes starting with `prefix`
    pub fn prefixed<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a [Position])> + 'a {
        self.lexemes
            .range::<str, _>((std::ops::Bound::Included(prefix), std::ops::Bound::Unbounded))
            .take_while(move |(lexeme, _)| lexeme.starts_with(prefix))
            .map(|(lexeme, positions)| (lexeme.as_str(), positions.as_slice()))
    }

    /// Returns the highest position of the vector
    pub fn max_position(&self) -> u16 {
        self.lexemes
            .values()
            .flat_map(|positions| positions.iter().map(|p| p.pos))
            .max()
            .unwrap_or(0)
    }

    /// Appends `other` to `self`
    ///
    /// Positions of `other` are shifted by the highest position of `self`
    pub fn extend(&mut self, other: &TsVector) {
        let offset = self.max_position();
        for (lexeme, positions) in &other.lexemes {
            for position in positions {
                let pos = position.pos.saturating_add(offset).min(MAX_POSITION);
                let position = Position {
                    pos,
                    weight: position.weight,
                };
                self.push(lexeme.clone(), position);
            }
        }
    }
}

impl BitOr for &TsVector {
    type Output = TsVector;

    fn bitor(self, rhs: &TsVector) -> TsVector {
        let mut res = self.clone();
        res.extend(rhs);
        res
    }
}

/// Concatenates all vectors, the empty vector is the identity
impl FromIterator<TsVector> for TsVector {
    fn from_iter<T: IntoIterator<Item = TsVector>>(iter: T) -> Self {
        let mut res = TsVector::new();
        for vector in iter {
            res.extend(&vector);
        }
        res
    }
}

impl<'a> FromIterator<&'a TsVector> for TsVector {
    fn from_iter<T: IntoIterator<Item = &'a TsVector>>(iter: T) -> Self {
        let mut res = TsVector::new();
        for vector in iter {
            res.extend(vector);
        }
        res
    }
}

impl Display for TsVector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for (lexeme, positions) in &self.lexemes {
            if !first {
                write!(f, " ")?;
            }
            first = false;
            write!(f, "'{lexeme}'")?;
            for (idx, position) in positions.iter().enumerate() {
                let sep = if idx == 0 { ':' } else { ',' };
                write!(f, "{sep}{}{}", position.pos, position.weight)?;
            }
        }
        Ok(())
    }
}
