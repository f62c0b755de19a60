//! HTTP gateway against a mock prompt service.

mod common;

use common::{clinical_note, pipeline_with};
use prompt_scribe_lib::llm::http::{HttpGateway, HttpGatewayConfig};
use prompt_scribe_lib::llm::{
    Credentials, GatewayError, GenerateRequest, InferenceGateway, ModelId,
    OptimizePromptRequest, OptimizeResponseRequest,
};
use prompt_scribe_lib::pipeline::Stage;
use prompt_scribe_lib::prompt::PromptSpec;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn gateway(server: &MockServer) -> HttpGateway {
    HttpGateway::new(&HttpGatewayConfig {
        base_url: format!("{}/", server.uri()),
        timeout: Duration::from_secs(5),
    })
    .unwrap()
}

fn credentials() -> Credentials {
    Credentials {
        model: ModelId::Gemini20Flash,
        api_key: "k1".into(),
        max_tokens: 2048,
        temperature: 1.0,
    }
}

#[tokio::test]
async fn test_validate_key_accepts_plain_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/Validate_key"))
        .and(body_string_contains("gemini-2.0-flash"))
        .and(body_string_contains("name=\"api_key\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "response": "OK" })))
        .expect(1)
        .mount(&server)
        .await;

    gateway(&server)
        .validate_key(ModelId::Gemini20Flash, "k1")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_validate_key_embedded_error_is_invalid_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/Validate_key"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "response": { "error": "Invalid API Key" } })),
        )
        .mount(&server)
        .await;

    let err = gateway(&server)
        .validate_key(ModelId::Gemini20Flash, "bad")
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::InvalidKey(m) if m == "Invalid API Key"));
}

#[tokio::test]
async fn test_optimize_prompt_uploads_document_and_fields() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .and(body_string_contains("filename=\"note.txt\""))
        .and(body_string_contains("name=\"istructions\""))
        .and(body_string_contains("name=\"system_prompt\""))
        .and(body_string_contains("Summarize."))
        .and(body_string_contains("Patient reports headache."))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "document_name": "note.txt",
            "prompt": "OPTIMIZED: Summarize the clinical note."
        })))
        .expect(1)
        .mount(&server)
        .await;

    let request = OptimizePromptRequest {
        system_prompt: "Summarize.".into(),
        instructions: "Be brief.".into(),
        example_output: String::new(),
        document_name: "note.txt".into(),
        document_bytes: b"Patient reports headache.".to_vec(),
        credentials: credentials(),
    };
    let prompt = gateway(&server).optimize_prompt(&request).await.unwrap();
    assert_eq!(prompt, "OPTIMIZED: Summarize the clinical note.");
}

#[tokio::test]
async fn test_generate_sends_prompt_with_document_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/generate_response"))
        .and(body_string_contains("name=\"prompt_result\""))
        .and(body_string_contains("Document content:\nPatient reports headache."))
        .and(body_string_contains("name=\"ai_temperature\""))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "response": "Summary: headache." })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let request = GenerateRequest {
        prompt: "Summarize the clinical note.".into(),
        document_text: Some("Patient reports headache.".into()),
        credentials: credentials(),
    };
    let response = gateway(&server).generate_response(&request).await.unwrap();
    assert_eq!(response, "Summary: headache.");
}

#[tokio::test]
async fn test_optimize_response_embedded_error_is_remote() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/optimize_response"))
        .and(body_string_contains("name=\"response_result\""))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "response": { "error": "quota exceeded" } })),
        )
        .mount(&server)
        .await;

    let request = OptimizeResponseRequest {
        response: "Summary: headache.".into(),
        credentials: credentials(),
    };
    let err = gateway(&server)
        .optimize_response(&request)
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Remote(m) if m == "quota exceeded"));
}

#[tokio::test]
async fn test_error_status_carries_service_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/generate_response"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({ "error": "An error occurred" })),
        )
        .mount(&server)
        .await;

    let request = GenerateRequest {
        prompt: "p".into(),
        document_text: None,
        credentials: credentials(),
    };
    let err = gateway(&server)
        .generate_response(&request)
        .await
        .unwrap_err();
    match err {
        GatewayError::Api { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "An error occurred");
        }
        other => panic!("expected API error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_non_json_reply_is_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/Validate_key"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .mount(&server)
        .await;

    let err = gateway(&server)
        .validate_key(ModelId::Gemini15Flash, "k1")
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Parse(_)));
}

#[tokio::test]
async fn test_full_run_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/Validate_key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "response": "OK" })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "document_name": "note.txt",
            "prompt": "OPTIMIZED: Summarize the clinical note."
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/generate_response"))
        .and(body_string_contains("OPTIMIZED: Summarize the clinical note."))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "response": "Summary: headache reported." })),
        )
        .mount(&server)
        .await;

    let pipeline = pipeline_with(Arc::new(gateway(&server)));
    pipeline.select_document(clinical_note()).unwrap();
    pipeline.update_prompt_spec(PromptSpec {
        system_prompt: "Summarize.".into(),
        instructions: String::new(),
        example_output: String::new(),
    });

    pipeline.start_analysis().await.unwrap();
    let snapshot = pipeline.generate_response().await.unwrap();
    assert_eq!(snapshot.stage, Stage::ResponseReady);
    assert_eq!(
        snapshot.response.as_deref(),
        Some("Summary: headache reported.")
    );
}
