#![doc = include_str!("../README.md")]
#![warn(rust_2018_idioms)]

use core::fmt::Debug;
use std::num::ParseIntError;
use thiserror::Error;

pub mod code;
pub mod coding;
pub mod config;
pub mod doi;
pub mod import;
pub mod labeller;
pub mod node;
mod ontology;
pub mod phenotype;
pub mod search;
mod store;

pub use code::{normalise, NormalisedCode};
pub use coding::{CodeMap, CodingSystemId, CodingTables};
pub use labeller::{LabelReport, LabelSource, Labeller};
pub use node::{NodeGroup, NodeId, OntologyNode, OntologyType, Properties};
pub use ontology::tree::{CreationData, GroupModel, OntologyGroup};
pub use ontology::{
    Edge, EdgeId, NodeDetail, NodeUpdate, Ontology, PathNode, RelatedNode, RootNode, RootPath,
    SelectionBranch,
};
pub use store::{Database, Tables};

const DEFAULT_NUM_PARENTS: usize = 4;
const DEFAULT_NUM_CHILDREN: usize = 8;

/// Maximum number of characters of an ontology node name
pub const MAX_NAME_LENGTH: usize = 256;

/// Search terms shorter than this never produce typeahead results
pub const MIN_SEARCH_TERM_LENGTH: usize = 3;

/// Number of typeahead results returned if the caller does not specify a limit
pub const DEFAULT_RESULT_LIMIT: usize = 20;

/// Main Error type for this crate
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum PhenotagError {
    /// Input to a store, mapper or query operation was rejected
    #[error("invalid value for `{field}`: {reason}")]
    Validation {
        /// Name of the offending field
        field: &'static str,
        /// Human readable explanation
        reason: String,
    },
    /// Stored data has an unexpected shape
    #[error("data integrity violation in {entity}: {shape}")]
    DataIntegrity {
        /// The entity that contains the unexpected data, e.g. `phenotype PH12/4`
        entity: String,
        /// Description of the offending shape
        shape: String,
    },
    /// The edge already exists
    #[error("edge {parent} -> {child} already exists")]
    Duplicate {
        /// Parent node of the rejected edge
        parent: NodeId,
        /// Child node of the rejected edge
        child: NodeId,
    },
    /// Inserting the edge would create a cycle
    #[error("edge {parent} -> {child} would create a cycle")]
    CycleCreated {
        /// Parent node of the rejected edge
        parent: NodeId,
        /// Child node of the rejected edge
        child: NodeId,
    },
    /// The ontology node does not exist
    #[error("ontology node {0} does not exist")]
    NodeNotFound(NodeId),
    /// The phenotype (version) does not exist
    #[error("phenotype {0} does not exist")]
    PhenotypeNotFound(String),
    /// A transient failure of an upstream collaborator
    #[error("upstream request failed: {0}")]
    Upstream(String),
    /// Failed to open a file
    #[error("unable to open file {0}")]
    CannotOpenFile(String),
    /// Failed to parse an input file
    #[error("invalid input data: {0}")]
    InvalidInput(String),
    /// Failed to parse an integer
    #[error("unable to parse Integer")]
    ParseIntError,
    /// Failed to (de)serialize JSON data
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    /// Failed to read or write the filesystem
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// Another thread panicked while holding the database lock
    #[error("database lock poisoned")]
    LockPoisoned,
}

impl From<ParseIntError> for PhenotagError {
    fn from(_: ParseIntError) -> Self {
        PhenotagError::ParseIntError
    }
}

/// Shortcut for `Result<T, PhenotagError>`
pub type PhenotagResult<T> = Result<T, PhenotagError>;
