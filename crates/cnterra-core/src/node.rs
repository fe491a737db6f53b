//! Node identity and the routing key derived from it.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Identifier of the node whose outbound data this relay forwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    /// Routing key the node publishes its outbound data under.
    pub fn routing_key(self) -> RoutingKey {
        RoutingKey(format!("node.{}.data.out", self.0))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NodeId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        s.parse::<u64>()
            .map(Self)
            .map_err(|e| Error::Config(format!("invalid 'NODE_ID' {s:?}: {e}")))
    }
}

/// Binding key for the per-connection queue, e.g. `node.7.data.out`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoutingKey(String);

impl RoutingKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoutingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
