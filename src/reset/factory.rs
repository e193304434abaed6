//! Proxy command construction from container objects and static configuration.

use std::collections::BTreeSet;

use crate::config::{BalancerConfig, NodeConfig};
use crate::container::Engine;
use crate::model::{CommandType, ProxyCommand};

/// Turns container objects into proxy commands.
pub trait RequestFactory: Send + Sync {
    /// Full node and balancer configuration for one engine.
    fn config_request(&self, engine: &Engine, node: &NodeConfig, balancer: &BalancerConfig) -> ProxyCommand;

    fn context_request(
        &self,
        command_type: CommandType,
        route: &str,
        path: &str,
        aliases: &BTreeSet<String>,
    ) -> ProxyCommand;

    /// Remove every context of the engine.
    fn remove_engine_request(&self, engine: &Engine) -> ProxyCommand;

    fn status_request(&self, engine: &Engine, load: u8) -> ProxyCommand;

    /// Ping the proxy itself, or one route through it.
    fn ping_request(&self, route: Option<&str>) -> ProxyCommand;
}

/// Parameter names as proxies expect them.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultRequestFactory;

fn flag(value: bool) -> &'static str {
    if value {
        "Yes"
    } else {
        "No"
    }
}

impl RequestFactory for DefaultRequestFactory {
    fn config_request(&self, engine: &Engine, node: &NodeConfig, balancer: &BalancerConfig) -> ProxyCommand {
        let (host, port) = engine
            .connector_address
            .rsplit_once(':')
            .unwrap_or((engine.connector_address.as_str(), ""));

        let mut command = ProxyCommand::new(CommandType::Config)
            .with_route(&engine.route)
            .with_parameter("JVMRoute", &engine.route)
            .with_parameter("Host", host)
            .with_parameter("Port", port)
            .with_parameter("Type", &node.connector_type)
            .with_parameter("flushpackets", if node.flush_packets { "On" } else { "Off" })
            .with_parameter("ping", node.ping_secs.to_string())
            .with_parameter("ttl", node.ttl_secs.to_string())
            .with_parameter("Balancer", &balancer.name)
            .with_parameter("StickySession", flag(balancer.sticky_session))
            .with_parameter("StickySessionCookie", &balancer.sticky_session_cookie)
            .with_parameter("StickySessionPath", &balancer.sticky_session_path)
            .with_parameter("StickySessionRemove", flag(balancer.sticky_session_remove))
            .with_parameter("StickySessionForce", flag(balancer.sticky_session_force))
            .with_parameter("WaitWorker", balancer.worker_timeout_secs.to_string())
            .with_parameter("Maxattempts", balancer.max_attempts.to_string());

        if let Some(domain) = &node.domain {
            command = command.with_parameter("Domain", domain);
        }
        if let Some(wait) = node.flush_wait_ms {
            command = command.with_parameter("flushwait", wait.to_string());
        }
        if let Some(smax) = node.smax {
            command = command.with_parameter("smax", smax.to_string());
        }
        if let Some(timeout) = node.node_timeout_secs {
            command = command.with_parameter("Timeout", timeout.to_string());
        }
        command
    }

    fn context_request(
        &self,
        command_type: CommandType,
        route: &str,
        path: &str,
        aliases: &BTreeSet<String>,
    ) -> ProxyCommand {
        ProxyCommand::new(command_type)
            .with_route(route)
            .with_parameter("Context", path)
            .with_parameter("Alias", aliases.iter().cloned().collect::<Vec<_>>().join(","))
    }

    fn remove_engine_request(&self, engine: &Engine) -> ProxyCommand {
        ProxyCommand::new(CommandType::RemoveApp)
            .with_route(&engine.route)
            .wildcard()
    }

    fn status_request(&self, engine: &Engine, load: u8) -> ProxyCommand {
        ProxyCommand::new(CommandType::Status)
            .with_route(&engine.route)
            .with_parameter("Load", load.to_string())
    }

    fn ping_request(&self, route: Option<&str>) -> ProxyCommand {
        let command = ProxyCommand::new(CommandType::Ping);
        match route {
            Some(route) => command.with_route(route),
            None => command,
        }
    }
}
