use core::fmt::Debug;
use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::{PhenotagError, PhenotagResult};

/// The numeric identifier of an ontology node
#[derive(Copy, Clone, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId {
    inner: u32,
}

impl NodeId {
    /// Returns the id as `u32`
    pub fn as_u32(&self) -> u32 {
        self.inner
    }

    /// Returns the id as `usize`
    pub fn to_usize(&self) -> usize {
        self.inner as usize
    }

    /// Returns the id following `self`
    pub(crate) fn next(&self) -> NodeId {
        NodeId {
            inner: self.inner + 1,
        }
    }
}

impl TryFrom<&str> for NodeId {
    type Error = PhenotagError;
    fn try_from(s: &str) -> PhenotagResult<Self> {
        Ok(NodeId {
            inner: s.trim().parse::<u32>()?,
        })
    }
}

impl From<u32> for NodeId {
    fn from(inner: u32) -> Self {
        Self { inner }
    }
}

impl From<u16> for NodeId {
    fn from(n: u16) -> Self {
        Self { inner: n.into() }
    }
}

impl From<NodeId> for u32 {
    fn from(id: NodeId) -> Self {
        id.inner
    }
}

impl Debug for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NodeId({})", self.inner)
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl PartialEq<u32> for NodeId {
    fn eq(&self, other: &u32) -> bool {
        self.inner == *other
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_and_display() {
        let id = NodeId::try_from(" 42").unwrap();
        assert_eq!(id, 42u32);
        assert_eq!(id.to_string(), "42");
        assert_eq!(format!("{id:?}"), "NodeId(42)");
        assert!(NodeId::try_from("N42").is_err());
        assert_eq!(id.next(), 43u32);
    }
}
