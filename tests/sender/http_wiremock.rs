use quotientai::sender::{AsyncTransport, ClientConfig, ClientError, HttpClient};
use serde_json::{Value, json};
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> HttpClient {
    let config = ClientConfig {
        base_url: format!("{}/api/v1", server.uri()),
        api_key: "test-api-key".to_string(),
        timeout: Duration::from_secs(5),
        connection_timeout: Duration::from_secs(2),
        user_agent: "quotientai-test/1.0".to_string(),
        ..Default::default()
    };
    HttpClient::new(config).unwrap()
}

#[tokio::test]
async fn test_post_sends_auth_and_strips_nulls() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/logs"))
        .and(header("authorization", "Bearer test-api-key"))
        .and(header("user-agent", "quotientai-test/1.0"))
        .and(body_json(json!({"id": "abc", "app_name": "my-app"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "created"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let response = client
        .post("/logs", &json!({"id": "abc", "app_name": "my-app", "user_query": null}))
        .await
        .unwrap();

    assert_eq!(response, json!({"status": "created"}));
    let stats = client.connection_stats();
    assert_eq!(stats.total_requests, 1);
    assert_eq!(stats.successful_requests, 1);
}

#[tokio::test]
async fn test_get_sends_query_params() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/logs"))
        .and(query_param("app_name", "my-app"))
        .and(query_param("limit", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"logs": []})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let params = vec![
        ("app_name".to_string(), "my-app".to_string()),
        ("limit".to_string(), "5".to_string()),
    ];
    let response = client.get("/logs", &params).await.unwrap();
    assert_eq!(response, json!({"logs": []}));
}

#[tokio::test]
async fn test_empty_body_decodes_as_null() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/logs"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let client = client_for(&server);
    assert_eq!(client.post("/logs", &json!({})).await.unwrap(), Value::Null);
}

#[tokio::test]
async fn test_unauthorized_maps_to_http_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "bad key"})))
        .mount(&server)
        .await;

    let client = client_for(&server);
    match client.get("/logs/abc/rca", &[]).await {
        Err(ClientError::HttpError { status, message }) => {
            assert_eq!(status, 401);
            assert!(message.contains("API key"));
        }
        other => panic!("Expected HttpError, got {other:?}"),
    }
    assert_eq!(client.connection_stats().failed_requests, 1);
}

#[tokio::test]
async fn test_unprocessable_entity_lists_missing_fields() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "detail": [
                {"type": "missing", "loc": ["body", "app_name"], "msg": "Field required"},
                {"type": "string_type", "loc": ["body", "environment"], "msg": "Input should be a string"}
            ]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    match client.post("/logs", &json!({})).await {
        Err(ClientError::HttpError { status: 422, message }) => {
            assert_eq!(message, "missing required fields: app_name");
        }
        other => panic!("Expected 422 HttpError, got {other:?}"),
    }
}

#[tokio::test]
async fn test_slow_server_maps_to_timeout() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let config = ClientConfig {
        base_url: server.uri(),
        api_key: "test-api-key".to_string(),
        timeout: Duration::from_millis(200),
        ..Default::default()
    };
    let client = HttpClient::new(config).unwrap();

    let error = client.get("/logs", &[]).await.unwrap_err();
    assert!(error.is_timeout(), "unexpected error: {error:?}");
}

#[tokio::test]
async fn test_unreachable_server_is_an_error() {
    let config = ClientConfig {
        base_url: "http://127.0.0.1:1".to_string(),
        api_key: "test-api-key".to_string(),
        connection_timeout: Duration::from_millis(200),
        ..Default::default()
    };
    let client = HttpClient::new(config).unwrap();

    assert!(client.get("/logs", &[]).await.is_err());
    assert_eq!(client.connection_stats().failed_requests, 1);
}
