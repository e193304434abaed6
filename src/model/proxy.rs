//! Proxy endpoints and their tracked health.

use serde::{Deserialize, Serialize};

/// Health of a proxy as tracked by the local handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProxyStatus {
    Ok,
    Error,
    Down,
}

impl std::fmt::Display for ProxyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProxyStatus::Ok => "OK",
            ProxyStatus::Error => "ERROR",
            ProxyStatus::Down => "DOWN",
        };
        f.write_str(s)
    }
}

/// A proxy that is known but not yet confirmed operational.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProxyEndpoint {
    /// Proxy address (`host:port`).
    pub address: String,
    /// Whether a connection to the proxy has already been established.
    #[serde(default)]
    pub established: bool,
}

impl ProxyEndpoint {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            established: false,
        }
    }

    pub fn established(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            established: true,
        }
    }
}

/// Confirmed health of a proxy.
///
/// The set of these, as reported by the master's handler, is the
/// authoritative cluster-wide view of proxy health.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProxyState {
    pub address: String,
    pub status: ProxyStatus,
    #[serde(default)]
    pub established: bool,
}

impl ProxyState {
    pub fn new(address: impl Into<String>, status: ProxyStatus, established: bool) -> Self {
        Self {
            address: address.into(),
            status,
            established,
        }
    }

    /// The endpoint this state was tracked for.
    pub fn endpoint(&self) -> ProxyEndpoint {
        ProxyEndpoint {
            address: self.address.clone(),
            established: self.established,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ProxyStatus::Ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_names() {
        let json = serde_json::to_string(&ProxyStatus::Error).unwrap();
        assert_eq!(json, "\"ERROR\"");
        assert_eq!(ProxyStatus::Down.to_string(), "DOWN");
    }

    #[test]
    fn test_endpoint_defaults_to_not_established() {
        let endpoint: ProxyEndpoint = serde_json::from_str(r#"{"address":"10.0.0.1:6666"}"#).unwrap();
        assert!(!endpoint.established);

        let state = ProxyState::new("10.0.0.1:6666", ProxyStatus::Ok, true);
        assert_eq!(state.endpoint(), ProxyEndpoint::established("10.0.0.1:6666"));
    }
}
