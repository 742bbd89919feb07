use std::fmt::Display;

use crate::search::tsvector::{words, Position, TsVector};

/// A single lexeme of a [`TsQuery`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryTerm {
    lexeme: String,
    prefix: bool,
    negated: bool,
}

impl QueryTerm {
    /// The normalised lexeme
    pub fn lexeme(&self) -> &str {
        &self.lexeme
    }

    /// `true` if the term matches every lexeme starting with it
    pub fn is_prefix(&self) -> bool {
        self.prefix
    }

    /// `true` if documents containing the term are excluded
    pub fn is_negated(&self) -> bool {
        self.negated
    }

    fn positions<'a>(
        &'a self,
        vector: &'a TsVector,
    ) -> Box<dyn Iterator<Item = &'a Position> + 'a> {
        if self.prefix {
            Box::new(
                vector
                    .prefixed(&self.lexeme)
                    .flat_map(|(_, positions)| positions.iter()),
            )
        } else {
            Box::new(vector.positions(&self.lexeme).iter())
        }
    }

    fn matches(&self, vector: &TsVector) -> bool {
        if self.prefix {
            vector.prefixed(&self.lexeme).next().is_some()
        } else {
            vector.contains(&self.lexeme)
        }
    }
}

/// A parsed full-text query
///
/// Queries are parsed from web-search syntax: unquoted words, `"quoted
/// phrases"`, `-excluded` words and the `or` keyword. The parsed query
/// requires every word; [`TsQuery::expand_prefix`] turns it into the
/// typeahead form where every word is an optional prefix.
///
/// # Examples
///
/// ```
/// use phenotag::search::{TsQuery, TsVector};
///
/// let vector = TsVector::from_text("Asthmatic bronchitis");
///
/// let query = TsQuery::websearch("asth bronchitis");
/// assert!(!query.matches(&vector));
///
/// let query = query.expand_prefix();
/// assert_eq!(query.to_string(), "'asth':* | 'bronchitis':*");
/// assert!(query.matches(&vector));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TsQuery {
    terms: Vec<QueryTerm>,
    any: bool,
}

impl TsQuery {
    /// Parses web-search syntax into a query that requires all words
    pub fn websearch(text: &str) -> Self {
        let mut terms = Vec::new();
        for (chunk, quoted) in chunks(text) {
            if !quoted && chunk.eq_ignore_ascii_case("or") {
                continue;
            }
            let (chunk, negated) = match chunk.strip_prefix('-') {
                Some(rest) if !quoted => (rest, true),
                _ => (chunk, false),
            };
            for lexeme in words(chunk).flatten() {
                let term = QueryTerm {
                    lexeme,
                    prefix: false,
                    negated,
                };
                if !terms.contains(&term) {
                    terms.push(term);
                }
            }
        }
        Self { terms, any: false }
    }

    /// Turns every word into an optional prefix match
    ///
    /// Excluded words stay excluded, but are matched as prefixes as well.
    #[must_use]
    pub fn expand_prefix(mut self) -> Self {
        for term in &mut self.terms {
            term.prefix = true;
        }
        self.any = true;
        self
    }

    /// Returns `true` if the query has no terms
    ///
    /// Empty queries, e.g. consisting only of stop words, match nothing.
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Returns the terms of the query
    pub fn terms(&self) -> &[QueryTerm] {
        &self.terms
    }

    /// Returns `true` if the vector satisfies the query
    pub fn matches(&self, vector: &TsVector) -> bool {
        if self.is_empty() {
            return false;
        }
        if self
            .terms
            .iter()
            .any(|term| term.negated && term.matches(vector))
        {
            return false;
        }
        let mut positives = self.terms.iter().filter(|term| !term.negated).peekable();
        if positives.peek().is_none() {
            return true;
        }
        if self.any {
            positives.any(|term| term.matches(vector))
        } else {
            positives.all(|term| term.matches(vector))
        }
    }

    /// Weighted frequency rank of the vector for this query
    ///
    /// Every occurrence of a matching lexeme contributes the value of its
    /// weight class, so a term found in an `A`-weighted field ranks higher
    /// than the same term in a `D`-weighted one. Term proximity is not
    /// taken into account. Returns `0.0` if the vector does not match.
    pub fn rank(&self, vector: &TsVector) -> f32 {
        if !self.matches(vector) {
            return 0.0;
        }
        self.terms
            .iter()
            .filter(|term| !term.negated)
            .flat_map(|term| term.positions(vector))
            .map(|position| position.weight.value())
            .sum()
    }
}

impl Display for TsQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sep = if self.any { " | " } else { " & " };
        for (idx, term) in self.terms.iter().enumerate() {
            if idx > 0 {
                write!(f, "{sep}")?;
            }
            if term.negated {
                write!(f, "!")?;
            }
            write!(f, "'{}'", term.lexeme)?;
            if term.prefix {
                write!(f, ":*")?;
            }
        }
        Ok(())
    }
}

/// Splits web-search input into whitespace separated chunks and quoted phrases
///
/// An unterminated quote extends to the end of the input.
fn chunks(text: &str) -> Vec<(&str, bool)> {
    let mut res = Vec::new();
    let mut rest = text;
    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            break;
        }
        if let Some(quoted) = rest.strip_prefix('"') {
            match quoted.find('"') {
                Some(end) => {
                    res.push((&quoted[..end], true));
                    rest = &quoted[end + 1..];
                }
                None => {
                    res.push((quoted, true));
                    break;
                }
            }
        } else {
            let end = rest
                .find(|c: char| c.is_whitespace() || c == '"')
                .unwrap_or(rest.len());
            res.push((&rest[..end], false));
            rest = &rest[end..];
        }
    }
    res
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::search::Weight;

    #[test]
    fn parse_websearch() {
        let query = TsQuery::websearch("Heart or \"kidney failure\" -acute the");
        assert_eq!(query.to_string(), "'heart' & 'kidney' & 'failure' & !'acute'");
        assert_eq!(
            query.expand_prefix().to_string(),
            "'heart':* | 'kidney':* | 'failure':* | !'acute':*"
        );
    }

    #[test]
    fn stop_words_only() {
        let query = TsQuery::websearch("the of and").expand_prefix();
        assert!(query.is_empty());
        assert!(!query.matches(&TsVector::from_text("the of and")));
    }

    #[test]
    fn unterminated_quote() {
        let query = TsQuery::websearch("\"lung -cancer");
        assert_eq!(query.to_string(), "'lung' & 'cancer'");
    }

    #[test]
    fn negated_terms_exclude() {
        let vector = TsVector::from_text("acute heart failure");
        let query = TsQuery::websearch("heart -acu").expand_prefix();
        assert!(!query.matches(&vector));
        let query = TsQuery::websearch("heart -chronic").expand_prefix();
        assert!(query.matches(&vector));
        let query = TsQuery::websearch("-chronic");
        assert!(query.matches(&vector));
    }

    #[test]
    fn rank_prefers_heavy_weights() {
        let query = TsQuery::websearch("asth").expand_prefix();
        let heavy = TsVector::from_text("asthma").with_weight(Weight::A);
        let light = TsVector::from_text("asthma").with_weight(Weight::D);
        assert!(query.rank(&heavy) > query.rank(&light));
        assert_eq!(query.rank(&TsVector::from_text("eczema")), 0.0);
        assert!((query.rank(&heavy) - 1.0).abs() < f32::EPSILON);
    }
}
