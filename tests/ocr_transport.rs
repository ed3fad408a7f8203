//! HTTP behaviour of the OCR client against a mocked read service.
//!
//! Uses wiremock to stand in for the remote analyze + operation endpoints.

use bytes::Bytes;
use secrecy::SecretString;
use serde_json::json;
use std::{sync::Arc, time::Duration};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_bytes, header, method, path},
};

use certificate_analyzer::{
    config::OcrSettings,
    services::ocr_client::{HttpOcrTransport, OcrClient, OcrError, PollPolicy},
};

const ANALYZE_PATH: &str = "/vision/v3.2/read/analyze";

fn client_for(server: &MockServer, max_attempts: u32) -> OcrClient {
    let settings = OcrSettings {
        endpoint: format!("{}{}", server.uri(), ANALYZE_PATH),
        api_key: SecretString::from("k-123".to_string()),
        key_header: "Ocp-Apim-Subscription-Key".into(),
        poll: PollPolicy {
            max_attempts,
            interval: Duration::from_millis(10),
        },
    };
    let transport = HttpOcrTransport::new(&settings).unwrap();
    OcrClient::new(Arc::new(transport), settings.poll)
}

#[tokio::test]
async fn submits_octet_stream_and_polls_until_succeeded() {
    let server = MockServer::start().await;
    let operation = format!("{}/operations/op-1", server.uri());

    Mock::given(method("POST"))
        .and(path(ANALYZE_PATH))
        .and(header("content-type", "application/octet-stream"))
        .and(header("Ocp-Apim-Subscription-Key", "k-123"))
        .and(body_bytes(b"image-bytes".to_vec()))
        .respond_with(ResponseTemplate::new(202).insert_header("operation-location", operation.as_str()))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/operations/op-1"))
        .and(header("Ocp-Apim-Subscription-Key", "k-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "running" })))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/operations/op-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "succeeded",
            "analyzeResult": {
                "readResults": [
                    { "lines": [{ "text": "Certificate of Completion" }] },
                    { "lines": [{ "text": "Issued by: Acme Academy" }] }
                ]
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let read = client_for(&server, 5)
        .analyze(Bytes::from_static(b"image-bytes"))
        .await
        .unwrap();

    assert_eq!(
        read.response.lines(),
        vec!["Certificate of Completion", "Issued by: Acme Academy"]
    );
    assert_eq!(read.raw["status"], "succeeded");
}

#[tokio::test]
async fn missing_operation_location_never_polls() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ANALYZE_PATH))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = client_for(&server, 5)
        .analyze(Bytes::from_static(b"x"))
        .await
        .unwrap_err();
    assert!(matches!(err, OcrError::MissingOperationLocation));
}

#[tokio::test]
async fn rejected_submission_is_reported_with_status() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ANALYZE_PATH))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = client_for(&server, 5)
        .analyze(Bytes::from_static(b"x"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        OcrError::UnexpectedStatus {
            stage: "submit",
            status: 401
        }
    ));
}

#[tokio::test]
async fn gives_up_after_the_attempt_budget() {
    let server = MockServer::start().await;
    let operation = format!("{}/operations/slow", server.uri());

    Mock::given(method("POST"))
        .and(path(ANALYZE_PATH))
        .respond_with(ResponseTemplate::new(202).insert_header("operation-location", operation.as_str()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/operations/slow"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "notStarted" })))
        .expect(3)
        .mount(&server)
        .await;

    let err = client_for(&server, 3)
        .analyze(Bytes::from_static(b"x"))
        .await
        .unwrap_err();
    assert!(matches!(err, OcrError::AnalysisTimeout { attempts: 3 }));
}
