//! Proxy protocol commands.
//!
//! These are the *intent* of a protocol request. Encoding them on the wire is
//! the local handler's job.

use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};

/// Per-proxy outcome of a command: proxy address → response body.
pub type ProxyResponses = BTreeMap<String, String>;

/// Per-proxy outcome of a command batch: proxy address → one response per command.
pub type ProxyBatchResponses = BTreeMap<String, Vec<String>>;

/// Kind of proxy command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandType {
    Config,
    EnableApp,
    DisableApp,
    StopApp,
    RemoveApp,
    Status,
    Ping,
}

impl CommandType {
    /// Protocol command name.
    pub fn wire_name(&self) -> &'static str {
        match self {
            CommandType::Config => "CONFIG",
            CommandType::EnableApp => "ENABLE-APP",
            CommandType::DisableApp => "DISABLE-APP",
            CommandType::StopApp => "STOP-APP",
            CommandType::RemoveApp => "REMOVE-APP",
            CommandType::Status => "STATUS",
            CommandType::Ping => "PING",
        }
    }
}

impl std::fmt::Display for CommandType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// A single proxy protocol command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyCommand {
    pub command_type: CommandType,
    /// Route (engine identifier) the command applies to, if any.
    pub route: Option<String>,
    /// Applies to every context of the route.
    #[serde(default)]
    pub wildcard: bool,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

impl ProxyCommand {
    pub fn new(command_type: CommandType) -> Self {
        Self {
            command_type,
            route: None,
            wildcard: false,
            parameters: BTreeMap::new(),
        }
    }

    pub fn with_route(mut self, route: impl Into<String>) -> Self {
        self.route = Some(route.into());
        self
    }

    pub fn wildcard(mut self) -> Self {
        self.wildcard = true;
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).map(String::as_str)
    }
}

impl std::fmt::Display for ProxyCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.command_type)?;
        if let Some(route) = &self.route {
            write!(f, " route={}", route)?;
        }
        if self.wildcard {
            f.write_str(" *")?;
        }
        for (k, v) in &self.parameters {
            write!(f, " {}={}", k, v)?;
        }
        Ok(())
    }
}
