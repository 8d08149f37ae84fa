//! Integration tests for the accounting query client.

use ledgerlink_core::api::{ApiError, QueryClient};
use ledgerlink_core::{Environment, Secret};
use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{bearer_token, body_string, body_string_contains, header, method, path, query_param},
};

const REALM: &str = "4620816365";

fn client(server: &MockServer) -> QueryClient {
    QueryClient::new(Environment::Sandbox, 73)
        .unwrap()
        .with_base_url(format!("{}/v3/company", server.uri()))
}

fn items(range: std::ops::Range<u32>) -> Vec<serde_json::Value> {
    range.map(|i| json!({"Id": i.to_string(), "Name": format!("Item {}", i)})).collect()
}

#[tokio::test]
async fn test_query_sends_statement_as_text() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(format!("/v3/company/{}/query", REALM)))
        .and(query_param("minorversion", "73"))
        .and(bearer_token("access-token"))
        .and(header("accept", "application/json"))
        .and(header("content-type", "application/text"))
        .and(body_string("SELECT Id, Name FROM Item"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "QueryResponse": {
                "Item": items(1..4),
                "startPosition": 1,
                "maxResults": 3
            },
            "time": "2025-12-30T10:00:00.000-08:00"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let page = client(&server)
        .query(&Secret::new("access-token"), REALM, "SELECT Id, Name FROM Item")
        .await
        .unwrap();

    assert_eq!(page.entity.as_deref(), Some("Item"));
    assert_eq!(page.rows.len(), 3);
    assert_eq!(page.rows[0]["Name"], "Item 1");
}

#[tokio::test]
async fn test_query_all_pages_until_short_page() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(body_string_contains("STARTPOSITION 1 MAXRESULTS 2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "QueryResponse": {"Item": items(1..3), "startPosition": 1, "maxResults": 2}
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(body_string_contains("STARTPOSITION 3 MAXRESULTS 2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "QueryResponse": {"Item": items(3..5), "startPosition": 3, "maxResults": 2}
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(body_string_contains("STARTPOSITION 5 MAXRESULTS 2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "QueryResponse": {"Item": items(5..6), "startPosition": 5, "maxResults": 1}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let all = client(&server)
        .query_all(&Secret::new("access-token"), REALM, "SELECT * FROM Item;", 2)
        .await
        .unwrap();

    assert_eq!(all.entity.as_deref(), Some("Item"));
    assert_eq!(all.rows.len(), 5);
    assert_eq!(all.rows[4]["Id"], "5");
}

#[tokio::test]
async fn test_query_all_stops_on_empty_page() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(body_string_contains("STARTPOSITION 1 MAXRESULTS 2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "QueryResponse": {"Item": items(1..3)}
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(body_string_contains("STARTPOSITION 3 MAXRESULTS 2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"QueryResponse": {}})))
        .expect(1)
        .mount(&server)
        .await;

    let all = client(&server)
        .query_all(&Secret::new("access-token"), REALM, "SELECT * FROM Item", 2)
        .await
        .unwrap();

    assert_eq!(all.rows.len(), 2);
}

#[tokio::test]
async fn test_page_size_clamped() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(body_string_contains("STARTPOSITION 1 MAXRESULTS 1000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"QueryResponse": {}})))
        .expect(1)
        .mount(&server)
        .await;

    client(&server)
        .query_all(&Secret::new("access-token"), REALM, "SELECT * FROM Invoice", 5000)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_fault_response_decoded() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "Fault": {
                "Error": [{
                    "Message": "Error parsing query",
                    "Detail": "QueryParserError: Encountered \" <IDENTIFIER> \"FORM\"",
                    "code": "4000"
                }],
                "type": "ValidationFault"
            }
        })))
        .mount(&server)
        .await;

    let result = client(&server)
        .query(&Secret::new("access-token"), REALM, "SELECT * FORM Item")
        .await;

    match result {
        Err(ApiError::Fault { status, errors }) => {
            assert_eq!(status, 400);
            assert_eq!(errors[0].code, "4000");
        }
        other => panic!("expected Fault, got {:?}", other),
    }
}

#[tokio::test]
async fn test_rejected_token_is_unauthorized() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("AuthenticationFailed"))
        .mount(&server)
        .await;

    let result = client(&server)
        .query(&Secret::new("stale"), REALM, "SELECT * FROM Item")
        .await;

    assert!(matches!(result, Err(ApiError::Unauthorized)));
}
