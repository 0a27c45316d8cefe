//! LLM chat protocol tests against a mock HTTP server.

use std::time::Duration;

use mockito::Matcher;
use paperfetch::llm::{propose_titles, select_from_pool, LlmClient, LlmError, LlmOptions};
use paperfetch::resolve::PoolCandidate;

fn client(base_url: &str, disable_reasoning: bool) -> LlmClient {
    LlmClient::new(LlmOptions {
        base_url: base_url.to_string(),
        api_key: "test-key".to_string(),
        model: "test-model".to_string(),
        timeout: Duration::from_secs(5),
        disable_reasoning,
        system_prompt: String::new(),
    })
    .unwrap()
}

fn chat_body(content: &str) -> String {
    serde_json::json!({
        "choices": [{"message": {"content": content}}]
    })
    .to_string()
}

fn candidates() -> Vec<PoolCandidate> {
    vec![
        PoolCandidate {
            candidate_id: "C1".to_string(),
            title: "A Survey of Object Detection".to_string(),
            year: Some(2022),
            venue: "ACM Computing Surveys".to_string(),
            doi: None,
            citation_count: 150,
            abstract_text: String::new(),
            url: String::new(),
        },
        PoolCandidate {
            candidate_id: "C2".to_string(),
            title: "Focal Loss for Dense Object Detection".to_string(),
            year: Some(2017),
            venue: "ICCV".to_string(),
            doi: Some("10.1109/ICCV.2017.324".to_string()),
            citation_count: 20000,
            abstract_text: "We propose the focal loss.".to_string(),
            url: String::new(),
        },
    ]
}

#[tokio::test]
async fn title_proposal_round_trip() {
    let mut server = mockito::Server::new_async().await;
    let proposal = r#"{"titles": ["Focal Loss for Dense Object Detection"], "reason": "the RetinaNet paper introduced focal loss", "confidence": 0.92}"#;
    let mock = server
        .mock("POST", "/chat/completions")
        .match_header("authorization", "Bearer test-key")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(chat_body(proposal))
        .expect(1)
        .create_async()
        .await;

    let client = client(&server.url(), false);
    let result = propose_titles(&client, "focal loss").await.unwrap();

    mock.assert_async().await;
    assert_eq!(result.titles, vec!["Focal Loss for Dense Object Detection"]);
    assert_eq!(result.reason, "the RetinaNet paper introduced focal loss");
    assert!((result.confidence - 0.92).abs() < 1e-9);
}

#[tokio::test]
async fn reasoning_hint_rejection_retries_once_without_it() {
    let mut server = mockito::Server::new_async().await;
    let proposal = r#"{"titles": ["Attention Is All You Need"], "reason": "the transformer paper", "confidence": 0.8}"#;

    // Registered first: mockito serves the earliest-declared matching mock
    // that still has unmet expectations, so the initial thinking-bearing
    // request hits this 400 and the retry falls through to the success mock.
    let rejection = server
        .mock("POST", "/chat/completions")
        .match_body(Matcher::Regex("thinking".to_string()))
        .with_status(400)
        .with_body(r#"{"error": "unknown field: thinking"}"#)
        .expect(1)
        .create_async()
        .await;
    let success = server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(chat_body(proposal))
        .expect(1)
        .create_async()
        .await;

    let client = client(&server.url(), true);
    let result = propose_titles(&client, "transformer").await.unwrap();

    rejection.assert_async().await;
    success.assert_async().await;
    assert_eq!(result.titles, vec!["Attention Is All You Need"]);
}

#[tokio::test]
async fn truncated_output_salvages_titles_from_reasoning() {
    let mut server = mockito::Server::new_async().await;
    let body = serde_json::json!({
        "choices": [{"message": {
            "content": "",
            "reasoning_content": "The keyword clearly points at the transformer \
                paper, titled \"Attention Is All You Need\" by Vaswani et al. \
                Now I will produce the JSON"
        }}]
    })
    .to_string();
    let _mock = server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body)
        .create_async()
        .await;

    let client = client(&server.url(), false);
    let result = propose_titles(&client, "transformer").await.unwrap();

    assert_eq!(result.titles, vec!["Attention Is All You Need"]);
    assert!((result.confidence - 0.35).abs() < 1e-9);
    assert!(result.reason.contains("truncated"));
}

#[tokio::test]
async fn empty_reason_is_a_protocol_error() {
    let mut server = mockito::Server::new_async().await;
    let proposal = r#"{"titles": ["Focal Loss for Dense Object Detection"], "reason": "", "confidence": 0.9}"#;
    let _mock = server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(chat_body(proposal))
        .create_async()
        .await;

    // No reasoning_content to salvage from, so the parse failure surfaces.
    let client = client(&server.url(), false);
    let err = propose_titles(&client, "focal loss").await.unwrap_err();
    assert!(matches!(err, LlmError::Protocol(_)));
}

#[tokio::test]
async fn pool_selection_round_trip() {
    let mut server = mockito::Server::new_async().await;
    let selection = r#"{"selected_candidate_id": "C2", "reason": "original ICCV paper, not the survey", "confidence": 0.9}"#;
    let mock = server
        .mock("POST", "/chat/completions")
        .match_body(Matcher::Regex("selected_candidate_id".to_string()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(chat_body(selection))
        .expect(1)
        .create_async()
        .await;

    let client = client(&server.url(), false);
    let titles = vec!["Focal Loss for Dense Object Detection".to_string()];
    let result = select_from_pool(&client, "focal loss", &titles, &candidates())
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(result.candidate_id, "C2");
    assert!((result.confidence - 0.9).abs() < 1e-9);
}

#[tokio::test]
async fn malformed_selection_is_a_protocol_error() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(chat_body("I think the best candidate is probably the second one"))
        .create_async()
        .await;

    let client = client(&server.url(), false);
    let titles = vec!["Focal Loss for Dense Object Detection".to_string()];
    let err = select_from_pool(&client, "focal loss", &titles, &candidates())
        .await
        .unwrap_err();
    assert!(matches!(err, LlmError::Protocol(_)));
}

#[tokio::test]
async fn http_errors_carry_status_and_body() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/chat/completions")
        .with_status(500)
        .with_body("upstream exploded")
        .create_async()
        .await;

    let client = client(&server.url(), false);
    let err = propose_titles(&client, "anything").await.unwrap_err();
    match err {
        LlmError::Http { status, body } => {
            assert_eq!(status, 500);
            assert!(body.contains("upstream exploded"));
        }
        other => panic!("expected Http error, got {other:?}"),
    }
}

#[tokio::test]
async fn empty_pool_is_rejected_before_any_request() {
    let server = mockito::Server::new_async().await;
    let client = client(&server.url(), false);
    let titles = vec!["Focal Loss".to_string()];
    let err = select_from_pool(&client, "focal loss", &titles, &[])
        .await
        .unwrap_err();
    assert!(matches!(err, LlmError::Protocol(_)));
}
