//! Weighted full-text search over ontology nodes and phenotypes
//!
//! Text is tokenised into a [`TsVector`], where every lexeme carries its
//! positions and a [`Weight`] class. Queries are parsed from web-search
//! syntax into a [`TsQuery`] and ranked by weighted term frequency. [`Trigrams`]
//! provide the substring similarity used to order equally ranked results.

mod query;
mod trigram;
mod tsvector;
mod typeahead;

pub(crate) mod index;

pub use index::phenotype_search_vector;
pub use query::{QueryTerm, TsQuery};
pub use trigram::{similarity, Trigrams};
pub use tsvector::{Position, TsVector, Weight, MAX_POSITION, MAX_POSITIONS_PER_LEXEME};
pub use typeahead::{typeahead, TypeaheadResult};
