//! Ollama wire format.

use std::time::Duration;

use kindred::providers::ollama::{build_request, parse_response, OllamaProvider, DEFAULT_OLLAMA_URL};
use kindred::providers::{CompletionRequest, LlmProvider, Message};

#[test]
fn system_prompt_becomes_first_turn() {
    let request = CompletionRequest {
        messages: vec![Message::user("hello")],
        system: Some("Be brief.".to_owned()),
        max_tokens: Some(64),
    };

    let body = build_request("llama3.1:8b", &request);
    assert!(!body.stream);
    assert_eq!(body.messages.len(), 2);
    assert_eq!(body.messages[0].role, "system");
    assert_eq!(body.messages[1].role, "user");
    assert_eq!(body.options.as_ref().map(|o| o.num_predict), Some(64));
}

#[test]
fn options_are_omitted_without_budget() {
    let request = CompletionRequest {
        messages: vec![Message::user("hello")],
        ..CompletionRequest::default()
    };
    let json = serde_json::to_value(build_request("m", &request)).expect("serialize");
    assert!(json.get("options").is_none());
    assert_eq!(json["stream"], false);
}

#[test]
fn reply_without_counts_has_zero_usage() {
    let body = r#"{"model": "llama3.1:8b", "message": {"role": "assistant", "content": "Hi!"}}"#;
    let response = parse_response(body).expect("parse");
    assert_eq!(response.text, "Hi!");
    assert_eq!(response.usage.input_tokens, 0);
    assert_eq!(response.usage.output_tokens, 0);
}

#[test]
fn default_base_url_and_spec() {
    let provider = OllamaProvider::new(
        "ollama/llama3.1:8b".to_owned(),
        "llama3.1:8b".to_owned(),
        None,
        Duration::from_secs(5),
    );
    assert_eq!(provider.base_url(), DEFAULT_OLLAMA_URL);
    assert_eq!(provider.model_id(), "ollama/llama3.1:8b");

    let custom = OllamaProvider::new(
        "ollama/m".to_owned(),
        "m".to_owned(),
        Some("http://gpu-box:11434/".to_owned()),
        Duration::from_secs(5),
    );
    assert_eq!(custom.base_url(), "http://gpu-box:11434");
}
