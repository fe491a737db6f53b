//! Configuration resolution for the relay.
//!
//! Every setting has a built-in default except the node identifier, which
//! must come from the environment. Resolution order:
//! 1. Built-in defaults
//! 2. Environment variables

use std::fmt;

use crate::error::{Error, Result};
use crate::node::{NodeId, RoutingKey};

/// Required: identifier of the node this relay serves.
pub const ENV_NODE_ID: &str = "NODE_ID";
pub const ENV_RELAY_ADDRESS: &str = "RELAY_ADDRESS";
pub const ENV_RELAY_PORT: &str = "RELAY_PORT";
pub const ENV_BUS_ADDRESS: &str = "RABBITMQ_ADDRESS";
pub const ENV_BUS_PORT: &str = "RABBITMQ_PORT";
pub const ENV_BUS_USER: &str = "RABBITMQ_USER";
/// Deployed name of the password override. Kept as-is; existing deployments
/// set this exact variable.
pub const ENV_BUS_PASSWORD: &str = "RABBITMQ_PASSORD";

/// Topic exchange the node data is published on.
pub const NODE_DATA_EXCHANGE: &str = "cnterra-node-data";

/// Complete relay configuration, built once at startup.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub node_id: NodeId,
    pub listen: ListenConfig,
    pub bus: BusConfig,
}

/// TCP listener configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenConfig {
    pub address: String,
    pub port: u16,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0".to_string(),
            port: 9000,
        }
    }
}

impl fmt::Display for ListenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

/// Message bus (AMQP broker) configuration.
#[derive(Clone, PartialEq, Eq)]
pub struct BusConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub vhost: String,
    pub exchange: String,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5672,
            username: "guest".to_string(),
            password: "guest".to_string(),
            vhost: "/".to_string(),
            exchange: NODE_DATA_EXCHANGE.to_string(),
        }
    }
}

// Password is never rendered.
impl fmt::Debug for BusConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BusConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("vhost", &self.vhost)
            .field("exchange", &self.exchange)
            .finish()
    }
}

impl fmt::Display for BusConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "amqp://{}@{}:{}", self.username, self.host, self.port)
    }
}

impl RelayConfig {
    /// Configuration with defaults for everything but the node identifier.
    pub fn new(node_id: NodeId) -> Self {
        Self {
            node_id,
            listen: ListenConfig::default(),
            bus: BusConfig::default(),
        }
    }

    /// Resolve configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let node_id = lookup(ENV_NODE_ID)
            .ok_or_else(|| Error::Config(format!("variable '{ENV_NODE_ID}' not set")))?
            .parse::<NodeId>()?;

        let mut config = Self::new(node_id);
        apply_overrides(&mut config, &lookup)?;
        Ok(config)
    }

    /// Binding key for this node's per-connection queues.
    pub fn routing_key(&self) -> RoutingKey {
        self.node_id.routing_key()
    }
}

fn apply_overrides<F>(config: &mut RelayConfig, lookup: &F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(val) = lookup(ENV_RELAY_ADDRESS) {
        config.listen.address = val;
    }
    if let Some(val) = lookup(ENV_RELAY_PORT) {
        config.listen.port = parse_port(ENV_RELAY_PORT, &val)?;
    }
    if let Some(val) = lookup(ENV_BUS_ADDRESS) {
        config.bus.host = val;
    }
    if let Some(val) = lookup(ENV_BUS_PORT) {
        config.bus.port = parse_port(ENV_BUS_PORT, &val)?;
    }
    if let Some(val) = lookup(ENV_BUS_USER) {
        config.bus.username = val;
    }
    if let Some(val) = lookup(ENV_BUS_PASSWORD) {
        config.bus.password = val;
    }
    Ok(())
}

fn parse_port(name: &str, value: &str) -> Result<u16> {
    value
        .parse()
        .map_err(|e| Error::Config(format!("invalid '{name}' {value:?}: {e}")))
}
