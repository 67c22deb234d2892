//! End-to-end discovery against a stubbed cluster.
//!
//! One mock server plays both the local engine and the controller: the
//! `dce_base` environment points `CONTROLLER_PORT` back at the server itself.

use dce::{
    Credentials, DiscoveryConfig, DiscoveryContext, DockerApiClient, EngineApi, EngineClientParams,
};
use dce_core::config::EngineEnv;
use dce_docker::EngineRegistry;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_test::assert_err;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const IP_MAP: &str = r#"{
    "node-c": {"advertised_address": "10.0.0.3"},
    "node-a": {"AdvertisedAddress": "10.0.0.1"},
    "node-b": {"advertised_address": "10.0.0.2"}
}"#;

async fn mount_cluster(server: &MockServer) {
    let port = server.address().port();

    Mock::given(method("GET"))
        .and(path("/services/dce_base"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ID": "base",
            "Spec": {
                "Name": "dce_base",
                "TaskTemplate": {"ContainerSpec": {"Env": [
                    "SWARM_PORT=2377",
                    format!("CONTROLLER_PORT={port}"),
                    "CONTROLLER_SSL_PORT=443"
                ]}}
            }
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/dce/version"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"DCEVersion": "2.7.14"})))
        .mount(server)
        .await;
}

async fn mount_info(server: &MockServer, expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path("/info"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Name": "node-1",
            "Swarm": {"NodeAddr": "127.0.0.1"}
        })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

async fn mount_topology(server: &MockServer, expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path("/nodes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"ID": "w", "Spec": {"Role": "worker"}},
            {"ID": "m", "Spec": {"Role": "manager"}, "ManagerStatus": {"Addr": "127.0.0.1:2377"}}
        ])))
        .expect(expected_calls)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/dce/ip_map"))
        .respond_with(ResponseTemplate::new(200).set_body_string(IP_MAP))
        .expect(expected_calls)
        .mount(server)
        .await;
}

fn context(ttl_secs: u64) -> DiscoveryContext {
    DiscoveryContext::with_registry(
        DiscoveryConfig::new().with_cache_ttl(ttl_secs),
        EngineRegistry::new(EngineEnv::default()),
    )
    .unwrap()
}

fn engine(server: &MockServer) -> DockerApiClient {
    DockerApiClient::builder(server.uri()).build().unwrap()
}

#[tokio::test]
async fn test_local_session_is_memoized() {
    let server = MockServer::start().await;
    mount_cluster(&server).await;
    mount_info(&server, 1).await;

    let context = context(60);
    let engine = engine(&server);
    let credentials = Credentials::new().with_token("t0ken");

    let first = context
        .local_api_session(&credentials, Some(&engine))
        .await
        .unwrap();
    let second = context
        .local_api_session(&credentials, Some(&engine))
        .await
        .unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.base_url(), server.uri());
    assert_eq!(first.credentials().token(), Some("t0ken"));
    assert_eq!(context.cache_stats().0.hits, 1);
}

#[tokio::test]
async fn test_credentials_partition_the_cache() {
    let server = MockServer::start().await;
    mount_cluster(&server).await;
    mount_info(&server, 2).await;

    let context = context(60);
    let engine = engine(&server);

    let alice = context
        .local_api_session(&Credentials::new().with_token("alice"), Some(&engine))
        .await
        .unwrap();
    let bob = context
        .local_api_session(&Credentials::new().with_token("bob"), Some(&engine))
        .await
        .unwrap();

    assert!(!Arc::ptr_eq(&alice, &bob));
}

#[tokio::test]
async fn test_node_engines_follow_ip_map_order() {
    let server = MockServer::start().await;
    mount_cluster(&server).await;
    mount_topology(&server, 1).await;

    let context = context(60);
    let engine = engine(&server);
    let credentials = Credentials::new().with_basic_auth("admin", "secret");

    let clients = context
        .node_engine_api_clients(&credentials, Some(&engine))
        .await
        .unwrap();

    let urls: Vec<&str> = clients.iter().map(|client| client.base_url()).collect();
    let uri = server.uri();
    assert_eq!(
        urls,
        vec![
            format!("{uri}/dce/nodes/10.0.0.3/docker"),
            format!("{uri}/dce/nodes/10.0.0.1/docker"),
            format!("{uri}/dce/nodes/10.0.0.2/docker"),
        ]
    );
    for client in &clients {
        assert_eq!(client.credentials().basic_auth(), Some(("admin", "secret")));
        assert_eq!(client.timeout(), context.config().engine_timeout());
    }

    let again = context
        .node_engine_clients(&credentials, Some(&engine))
        .await
        .unwrap();
    assert_eq!(again.len(), 3);
    assert!(Arc::ptr_eq(again[0].api(), &clients[0]));

    let params = EngineClientParams::new(format!("{uri}/dce/nodes/10.0.0.1/docker"))
        .with_credentials(credentials.clone())
        .with_timeout(context.config().engine_timeout());
    let registered = context.registry().engine_client(&params).unwrap();
    assert!(Arc::ptr_eq(&registered, &clients[1]));
}

#[tokio::test]
async fn test_node_engine_requests_go_through_the_proxy() {
    let server = MockServer::start().await;
    mount_cluster(&server).await;
    mount_topology(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/dce/nodes/10.0.0.2/docker/info"))
        .and(header("X-DCE-Access-Token", "t0ken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Name": "node-b",
            "Swarm": {"NodeAddr": "10.0.0.2"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let context = context(60);
    let engine = engine(&server);
    let credentials = Credentials::new().with_token("t0ken");

    let clients = context
        .node_engine_clients(&credentials, Some(&engine))
        .await
        .unwrap();
    let info = clients[2].info().await.unwrap();
    assert_eq!(info.name, "node-b");
}

#[tokio::test]
async fn test_discovery_reruns_once_after_ttl() {
    let server = MockServer::start().await;
    mount_cluster(&server).await;
    mount_topology(&server, 2).await;

    let context = context(1);
    let engine = engine(&server);
    let credentials = Credentials::new();

    let first = context
        .node_engine_api_clients(&credentials, Some(&engine))
        .await
        .unwrap();
    context
        .node_engine_api_clients(&credentials, Some(&engine))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(1100)).await;

    let refreshed = context
        .node_engine_api_clients(&credentials, Some(&engine))
        .await
        .unwrap();
    context
        .node_engine_api_clients(&credentials, Some(&engine))
        .await
        .unwrap();

    assert!(Arc::ptr_eq(&first[0], &refreshed[0]));
    let stats = context.cache_stats().1;
    assert_eq!((stats.hits, stats.misses), (2, 2));
}

#[tokio::test]
async fn test_missing_controller_port_fails_discovery() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/services/dce_base"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ID": "base",
            "Spec": {"TaskTemplate": {"ContainerSpec": {"Env": ["SWARM_PORT=2377"]}}}
        })))
        .mount(&server)
        .await;
    mount_info(&server, 1).await;

    let context = context(60);
    let engine = engine(&server);
    let err = assert_err!(
        context
            .local_api_session(&Credentials::new(), Some(&engine))
            .await
    );
    assert_eq!(err.error_code(), "DISCOVERY_FAILED");
}

#[tokio::test]
async fn test_local_client_engine_accessors() {
    let server = MockServer::start().await;
    mount_cluster(&server).await;
    mount_info(&server, 1).await;

    let context = context(60);
    let engine = engine(&server);
    let credentials = Credentials::new().with_token("t0ken");

    let client = context
        .local_client(&credentials, Some(&engine as &dyn EngineApi))
        .await
        .unwrap();
    assert_eq!(client.to_string(), "<DCEClient '127.0.0.1'>");

    let docker_api = client.docker_api_client().unwrap();
    assert_eq!(docker_api.base_url(), server.uri());
    assert_eq!(docker_api.credentials().token(), Some("t0ken"));

    let docker = client.docker_client().unwrap();
    assert!(Arc::ptr_eq(docker.api(), &docker_api));
}
