//! HTTP-level tests for the Harness client against a local mock server

use harness_client::{Agent, HarnessClient, HarnessClientConfig, HarnessError, RetryPolicy};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer, retries: u32) -> HarnessClient {
    let config = HarnessClientConfig {
        base_url: server.uri(),
        request_timeout: Duration::from_secs(5),
        retry: RetryPolicy {
            max_retries: retries,
            wait_min: Duration::from_millis(1),
            wait_max: Duration::from_millis(5),
        },
        api_key_env: None,
    };
    HarnessClient::new(config, "test-key".to_string()).expect("client")
}

#[tokio::test]
async fn get_agent_sends_key_and_account() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gitops/api/v1/agents/agent1"))
        .and(query_param("accountIdentifier", "acct"))
        .and(header("x-api-key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "accountIdentifier": "acct",
            "identifier": "agent1",
            "health": { "harnessGitopsAgent": { "status": "HEALTHY" } }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let agent = client_for(&server, 0).get_agent("agent1", "acct").await.expect("agent");
    assert!(agent.is_healthy());
}

#[tokio::test]
async fn get_agent_maps_404_to_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gitops/api/v1/agents/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("{\"code\":5}"))
        .mount(&server)
        .await;

    let err = client_for(&server, 3).get_agent("missing", "acct").await.unwrap_err();
    assert!(err.is_not_found(), "got {err:?}");
}

#[tokio::test]
async fn unauthorized_is_authentication_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let err = client_for(&server, 3).get_agent("agent1", "acct").await.unwrap_err();
    assert!(matches!(err, HarnessError::Authentication(_)), "got {err:?}");
}

#[tokio::test]
async fn server_errors_are_retried_until_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "identifier": "agent1"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let agent = client_for(&server, 3).get_agent("agent1", "acct").await.expect("agent");
    assert_eq!(agent.identifier, "agent1");
}

#[tokio::test]
async fn retries_are_bounded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let err = client_for(&server, 2).get_agent("agent1", "acct").await.unwrap_err();
    assert!(matches!(err, HarnessError::Api(_)), "got {err:?}");
}

#[tokio::test]
async fn create_agent_posts_payload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/gitops/api/v1/agents"))
        .and(query_param("accountIdentifier", "acct"))
        .and(body_partial_json(serde_json::json!({
            "accountIdentifier": "acct",
            "projectIdentifier": "",
            "name": "agent-one"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "accountIdentifier": "acct",
            "name": "agent-one",
            "health": { "harnessGitopsAgent": { "status": "UNHEALTHY" } }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let created = client_for(&server, 0)
        .create_agent(&Agent {
            account_identifier: "acct".to_string(),
            name: "agent-one".to_string(),
            ..Default::default()
        })
        .await
        .expect("created");
    assert_eq!(created.health_status().map(|s| s.as_str()), Some("UNHEALTHY"));
}

#[tokio::test]
async fn missing_key_fails_before_sending() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let config = HarnessClientConfig {
        base_url: server.uri(),
        api_key_env: None,
        ..Default::default()
    };
    let client = HarnessClient::new(config, String::new()).expect("client");
    let err = client.get_agent("agent1", "acct").await.unwrap_err();
    assert!(matches!(err, HarnessError::Authentication(_)), "got {err:?}");
}

#[tokio::test]
async fn api_key_env_is_read_on_every_request() {
    const KEY_VAR: &str = "HARNESS_HTTP_TEST_API_KEY";
    let server = MockServer::start().await;
    for key in ["first-key", "second-key", "secret-key"] {
        Mock::given(method("GET"))
            .and(header("x-api-key", key))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "identifier": "agent1"
            })))
            .expect(1)
            .mount(&server)
            .await;
    }

    let config = HarnessClientConfig {
        base_url: server.uri(),
        api_key_env: Some(KEY_VAR.to_string()),
        ..Default::default()
    };
    let client = HarnessClient::new(config, "secret-key".to_string()).expect("client");

    // SAFETY: the variable name is private to this test
    unsafe { std::env::set_var(KEY_VAR, "first-key") };
    client.get_agent("agent1", "acct").await.expect("first");

    unsafe { std::env::set_var(KEY_VAR, "second-key") };
    client.get_agent("agent1", "acct").await.expect("second");

    unsafe { std::env::remove_var(KEY_VAR) };
    client.get_agent("agent1", "acct").await.expect("credentials");
}

#[tokio::test]
async fn truncated_body_is_http_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        if let Ok((mut socket, _)) = listener.accept().await {
            let mut request = [0u8; 4096];
            let _ = socket.read(&mut request).await;
            let _ = socket
                .write_all(
                    b"HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 200\r\n\r\n{\"identifier\":",
                )
                .await;
        }
    });

    let config = HarnessClientConfig {
        base_url: format!("http://{addr}"),
        retry: RetryPolicy {
            max_retries: 0,
            wait_min: Duration::from_millis(1),
            wait_max: Duration::from_millis(5),
        },
        api_key_env: None,
        ..Default::default()
    };
    let client = HarnessClient::new(config, "test-key".to_string()).expect("client");

    let err = client.get_agent("agent1", "acct").await.unwrap_err();
    assert!(matches!(err, HarnessError::Http(_)), "got {err:?}");
}
