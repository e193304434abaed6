//! Coordinator routing: local on the master, broadcast everywhere else.

mod common;

use std::collections::BTreeSet;
use std::sync::Arc;

use common::{HandlerCall, RecordingHandler, ScriptedRpc};
use proxy_coordinator::cluster::{ClusterRequest, ClusterResponse};
use proxy_coordinator::election::SwitchableElection;
use proxy_coordinator::handler::{EstablishedFlag, HandlerError};
use proxy_coordinator::model::{
    CommandType, NodeId, ProxyCommand, ProxyEndpoint, ProxyResponses, ProxyState, ProxyStatus,
};
use proxy_coordinator::ClusteredProxyCoordinator;

fn coordinator(
    master: bool,
    handler: Arc<RecordingHandler>,
    rpc: Arc<ScriptedRpc>,
) -> ClusteredProxyCoordinator {
    ClusteredProxyCoordinator::new(
        NodeId::new("node-a"),
        handler,
        Arc::new(SwitchableElection::new(master)),
        rpc,
        16,
    )
}

fn status_command() -> ProxyCommand {
    ProxyCommand::new(CommandType::Status)
        .with_route("node1")
        .with_parameter("Load", "50")
}

#[tokio::test]
async fn test_master_init_uses_handler_only() {
    let handler = RecordingHandler::new();
    let rpc = ScriptedRpc::new();
    let coordinator = coordinator(true, handler.clone(), rpc.clone());

    let endpoints = vec![ProxyEndpoint::new("p1:6666"), ProxyEndpoint::new("p2:6666")];
    coordinator.init(endpoints.clone(), EstablishedFlag::new()).await.unwrap();

    assert_eq!(handler.calls(), vec![HandlerCall::Init(endpoints)]);
    assert!(rpc.calls().is_empty());
    assert!(coordinator.get_pending_discovery_events().is_empty());
}

#[tokio::test]
async fn test_non_master_init_journals_and_broadcasts() {
    let handler = RecordingHandler::new();
    let rpc = ScriptedRpc::new();
    let coordinator = coordinator(false, handler.clone(), rpc.clone());

    let endpoints = vec![ProxyEndpoint::new("p1:6666"), ProxyEndpoint::new("p2:6666")];
    coordinator.init(endpoints, EstablishedFlag::new()).await.unwrap();

    assert_eq!(handler.calls(), vec![HandlerCall::Init(Vec::new())]);

    let pending = coordinator.get_pending_discovery_events();
    assert_eq!(pending.len(), 2);
    assert_eq!(pending[0].event_index, 1);
    assert_eq!(pending[1].event_index, 2);
    assert!(pending.iter().all(|e| e.addition && e.sender == NodeId::new("node-a")));

    match rpc.calls().as_slice() {
        [ClusterRequest::DiscoveryEvents(events)] => assert_eq!(events, &pending),
        other => panic!("unexpected calls: {other:?}"),
    }
}

#[tokio::test]
async fn test_non_master_init_without_endpoints_sends_nothing() {
    let rpc = ScriptedRpc::new();
    let coordinator = coordinator(false, RecordingHandler::new(), rpc.clone());

    coordinator.init(Vec::new(), EstablishedFlag::new()).await.unwrap();

    assert!(rpc.calls().is_empty());
    assert!(coordinator.get_pending_discovery_events().is_empty());
}

#[tokio::test]
async fn test_add_and_remove_on_master() {
    let handler = RecordingHandler::new();
    let rpc = ScriptedRpc::new();
    let coordinator = coordinator(true, handler.clone(), rpc.clone());

    coordinator.add_proxy(ProxyEndpoint::new("p1:6666")).await.unwrap();
    coordinator.remove_proxy(ProxyEndpoint::new("p1:6666")).await.unwrap();

    assert_eq!(
        handler.calls(),
        vec![
            HandlerCall::Add(ProxyEndpoint::new("p1:6666")),
            HandlerCall::Remove(ProxyEndpoint::new("p1:6666")),
        ]
    );
    assert!(rpc.calls().is_empty());
}

#[tokio::test]
async fn test_add_and_remove_on_non_master() {
    let handler = RecordingHandler::new();
    let rpc = ScriptedRpc::new();
    let coordinator = coordinator(false, handler.clone(), rpc.clone());

    coordinator.add_proxy(ProxyEndpoint::new("p1:6666")).await.unwrap();
    coordinator.remove_proxy(ProxyEndpoint::new("p1:6666")).await.unwrap();

    assert!(handler.calls().is_empty());

    // The removal replaces the pending addition for the same proxy.
    let pending = coordinator.get_pending_discovery_events();
    assert_eq!(pending.len(), 1);
    assert!(!pending[0].addition);
    assert_eq!(pending[0].event_index, 2);

    let calls = rpc.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls.iter().all(|c| matches!(c, ClusterRequest::DiscoveryEvents(e) if e.len() == 1)));
}

#[tokio::test]
async fn test_acknowledge_drops_applied_events() {
    let coordinator = coordinator(false, RecordingHandler::new(), ScriptedRpc::new());

    for address in ["p1:6666", "p2:6666", "p3:6666"] {
        coordinator.add_proxy(ProxyEndpoint::new(address)).await.unwrap();
    }

    assert_eq!(coordinator.acknowledge_discovery_events(2), 2);
    let pending = coordinator.get_pending_discovery_events();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].endpoint.address, "p3:6666");

    // A fresh event never reuses an acknowledged index.
    coordinator.add_proxy(ProxyEndpoint::new("p4:6666")).await.unwrap();
    assert_eq!(coordinator.get_pending_discovery_events()[1].event_index, 4);
}

#[tokio::test]
async fn test_concurrent_additions_get_unique_indices() {
    let coordinator = Arc::new(coordinator(false, RecordingHandler::new(), ScriptedRpc::new()));

    let tasks: Vec<_> = (0..16)
        .map(|i| {
            let coordinator = coordinator.clone();
            tokio::spawn(async move {
                coordinator
                    .add_proxy(ProxyEndpoint::new(format!("p{i}:6666")))
                    .await
                    .unwrap();
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }

    let indices: BTreeSet<u64> = coordinator
        .get_pending_discovery_events()
        .iter()
        .map(|e| e.event_index)
        .collect();
    assert_eq!(indices, (1..=16).collect());
}

#[tokio::test]
async fn test_update_servers_reconciles_locally() {
    let handler = RecordingHandler::with_proxies(&["stale:6666", "kept:6666"]);
    let rpc = ScriptedRpc::new();
    let coordinator = coordinator(false, handler.clone(), rpc.clone());

    let authoritative = vec![
        ProxyState::new("kept:6666", ProxyStatus::Ok, true),
        ProxyState::new("new:6666", ProxyStatus::Ok, true),
    ];
    let states = coordinator.update_servers_from_master_node(&authoritative).await.unwrap();

    let addresses: Vec<&str> = states.iter().map(|s| s.address.as_str()).collect();
    assert_eq!(addresses, vec!["kept:6666", "new:6666"]);
    assert_eq!(
        handler.calls(),
        vec![
            HandlerCall::Add(ProxyEndpoint::established("new:6666")),
            HandlerCall::Remove(ProxyEndpoint::new("stale:6666")),
        ]
    );
    assert!(rpc.calls().is_empty());
}

#[tokio::test]
async fn test_health_on_master_reads_handler() {
    let handler = RecordingHandler::new();
    handler.set_healthy(true);
    let rpc = ScriptedRpc::new();
    let coordinator = coordinator(true, handler, rpc.clone());

    assert!(coordinator.is_proxy_health_ok().await);
    assert!(rpc.calls().is_empty());
}

#[tokio::test]
async fn test_health_on_non_master_takes_first_present_reply() {
    let rpc = ScriptedRpc::replying(vec![
        None,
        Some(ClusterResponse::Health(true)),
        Some(ClusterResponse::Health(false)),
    ]);
    let coordinator = coordinator(false, RecordingHandler::new(), rpc.clone());

    assert!(coordinator.is_proxy_health_ok().await);
    assert_eq!(rpc.calls(), vec![ClusterRequest::IsProxyHealthOk]);
}

#[tokio::test]
async fn test_health_without_master_reply_is_unhealthy() {
    let handler = RecordingHandler::new();
    handler.set_healthy(true);
    let rpc = ScriptedRpc::replying(vec![None, None]);
    let coordinator = coordinator(false, handler, rpc);

    assert!(!coordinator.is_proxy_health_ok().await);
}

#[tokio::test]
async fn test_mark_in_error_bumps_generation_on_master() {
    let handler = RecordingHandler::new();
    let coordinator = coordinator(true, handler.clone(), ScriptedRpc::new());

    assert!(!coordinator.is_reset_necessary());
    coordinator.mark_proxies_in_error().await.unwrap();

    assert_eq!(handler.calls(), vec![HandlerCall::MarkInError]);
    assert!(coordinator.is_reset_necessary());
    assert_eq!(coordinator.generations().error_generation(), 1);
}

#[tokio::test]
async fn test_mark_in_error_bumps_generation_on_non_master() {
    let handler = RecordingHandler::new();
    let rpc = ScriptedRpc::replying(vec![None]);
    let coordinator = coordinator(false, handler.clone(), rpc.clone());

    coordinator.mark_proxies_in_error().await.unwrap();

    assert!(handler.calls().is_empty());
    assert_eq!(rpc.calls(), vec![ClusterRequest::MarkProxiesInError]);
    assert!(coordinator.is_reset_necessary());

    coordinator.reset_initiated();
    assert!(!coordinator.is_reset_necessary());
    coordinator.reset_completed();
    assert!(!coordinator.is_reset_necessary());
}

#[tokio::test]
async fn test_mark_in_error_failure_still_bumps_generation() {
    let handler = RecordingHandler::new();
    handler.fail("connection refused");
    let coordinator = coordinator(true, handler, ScriptedRpc::new());

    let result = coordinator.mark_proxies_in_error().await;
    assert!(matches!(result, Err(HandlerError::Proxy { .. })));
    assert!(coordinator.is_reset_necessary());
}

#[tokio::test]
async fn test_reset_routes_by_mastership() {
    let handler = RecordingHandler::new();
    let master = coordinator(true, handler.clone(), ScriptedRpc::new());
    master.reset().await.unwrap();
    assert_eq!(handler.calls(), vec![HandlerCall::Reset]);

    let rpc = ScriptedRpc::new();
    let peer = coordinator(false, RecordingHandler::new(), rpc.clone());
    peer.reset().await.unwrap();
    assert_eq!(rpc.calls(), vec![ClusterRequest::Reset]);
}

#[tokio::test]
async fn test_send_request_on_master_returns_handler_responses() {
    let handler = RecordingHandler::new();
    handler.respond("p1:6666", "Type=STATUS-RSP");
    let coordinator = coordinator(true, handler.clone(), ScriptedRpc::new());

    let responses = coordinator.send_request(status_command()).await.unwrap();

    assert_eq!(responses.get("p1:6666").map(String::as_str), Some("Type=STATUS-RSP"));
    assert_eq!(handler.calls(), vec![HandlerCall::Send(status_command())]);
}

#[tokio::test]
async fn test_send_request_on_non_master_forwards_command() {
    let from_master = ProxyResponses::from([("p1:6666".to_string(), "Type=STATUS-RSP".to_string())]);
    let rpc = ScriptedRpc::replying(vec![None, Some(ClusterResponse::Responses(from_master.clone()))]);
    let coordinator = coordinator(false, RecordingHandler::new(), rpc.clone());

    let responses = coordinator.send_request(status_command()).await.unwrap();

    assert_eq!(responses, from_master);
    assert_eq!(rpc.calls(), vec![ClusterRequest::SendRequest(status_command())]);
}

#[tokio::test]
async fn test_send_requests_without_master_is_empty() {
    let rpc = ScriptedRpc::replying(vec![None]);
    let coordinator = coordinator(false, RecordingHandler::new(), rpc.clone());

    let responses = coordinator.send_requests(vec![status_command()]).await.unwrap();

    assert!(responses.is_empty());
    assert_eq!(rpc.calls(), vec![ClusterRequest::SendRequests(vec![status_command()])]);
}

#[tokio::test]
async fn test_shutdown_is_always_local() {
    let handler = RecordingHandler::new();
    let rpc = ScriptedRpc::new();
    let coordinator = coordinator(false, handler.clone(), rpc.clone());

    coordinator.shutdown().await.unwrap();

    assert_eq!(handler.calls(), vec![HandlerCall::Shutdown]);
    assert!(rpc.calls().is_empty());
}

#[tokio::test]
async fn test_handler_errors_propagate_on_master() {
    let handler = RecordingHandler::new();
    handler.fail("broken pipe");
    let coordinator = coordinator(true, handler, ScriptedRpc::new());

    let err = coordinator.add_proxy(ProxyEndpoint::new("p1:6666")).await.unwrap_err();
    assert_eq!(err.to_string(), "Proxy recording failed: broken pipe");
    assert!(coordinator.send_request(status_command()).await.is_err());
}

#[tokio::test]
async fn test_non_master_init_collapses_repeated_addresses() {
    let rpc = ScriptedRpc::new();
    let coordinator = coordinator(false, RecordingHandler::new(), rpc.clone());

    let endpoints = vec![
        ProxyEndpoint::new("p1:6666"),
        ProxyEndpoint::new("p2:6666"),
        ProxyEndpoint::new("p1:6666"),
    ];
    coordinator.init(endpoints, EstablishedFlag::new()).await.unwrap();

    let pending: Vec<(String, u64)> = coordinator
        .get_pending_discovery_events()
        .into_iter()
        .map(|e| (e.endpoint.address, e.event_index))
        .collect();
    assert_eq!(
        pending,
        vec![("p1:6666".to_string(), 1), ("p2:6666".to_string(), 2)]
    );
    assert_eq!(rpc.calls().len(), 1);
}
