//! Stdio worker integration tests: envelopes in, envelopes out.

use serde_json::{json, Value};

use seo_integrity::IntegrityConfig;
use seo_integrity_cli::StdioTransport;

// ─────────────────────── helpers ───────────────────────

async fn exchange(config: IntegrityConfig, input: &str) -> (usize, Vec<Value>) {
    let transport = StdioTransport::new(config);
    let mut output: Vec<u8> = Vec::new();
    let answered = transport.serve(input.as_bytes(), &mut output).await.unwrap();
    let lines = String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    (answered, lines)
}

fn line(value: Value) -> String {
    format!("{value}\n")
}

// ─────────────────────── tests ───────────────────────

#[tokio::test]
async fn test_one_response_per_request_in_order() {
    let input = [
        line(json!({"id": 1, "op": "extract", "text": "ok: {\"n\": 1,}"})),
        "\n".to_string(),
        line(json!({"id": "two", "op": "quality", "content": "one two three", "min_words": 2})),
    ]
    .concat();

    let (answered, responses) = exchange(IntegrityConfig::default(), &input).await;
    assert_eq!(answered, 2);
    assert_eq!(responses[0]["id"], 1);
    assert_eq!(responses[0]["status"], "ok");
    assert_eq!(responses[0]["result"]["text"], "{\"n\": 1}");
    assert_eq!(responses[1]["id"], "two");
    assert_eq!(responses[1]["result"]["length"], 3);
}

#[tokio::test]
async fn test_malformed_line_answered_with_null_id() {
    let input = [
        "this is not json\n".to_string(),
        line(json!({"id": 9, "op": "extract", "text": "{}"})),
    ]
    .concat();

    let (answered, responses) = exchange(IntegrityConfig::default(), &input).await;
    assert_eq!(answered, 2);
    assert_eq!(responses[0]["id"], Value::Null);
    assert_eq!(responses[0]["status"], "error");
    assert!(responses[0]["message"].as_str().unwrap().starts_with("Parse error"));
    assert_eq!(responses[1]["id"], 9);
    assert_eq!(responses[1]["status"], "ok");
}

#[tokio::test]
async fn test_short_content_is_salvaged() {
    let input = line(json!({"id": 3, "op": "quality", "content": "<p>draft</p>"}));
    let (_, responses) = exchange(IntegrityConfig::default(), &input).await;
    assert_eq!(responses[0]["status"], "error");
    assert_eq!(responses[0]["salvaged"], "<p>draft</p>");
}

#[tokio::test]
async fn test_worker_uses_supplied_config() {
    let mut config = IntegrityConfig::default();
    config.links.min_links = 1;
    let input = line(json!({
        "id": 4,
        "op": "links",
        "document": "<p>Compare the water filter comparison chart first.</p>",
        "directory": [
            {"key": "filters", "displayName": "Water Filter Comparison Chart", "url": "/filters"}
        ]
    }));

    let (_, responses) = exchange(config, &input).await;
    let result = &responses[0]["result"];
    assert_eq!(result["report"]["injected"], 1);
    assert!(result["document"]
        .as_str()
        .unwrap()
        .contains("<a href=\"/filters?utm_source=internal"));
}

#[tokio::test]
async fn test_media_envelope() {
    let embed = |id: &str| format!("<iframe src=\"https://www.youtube.com/embed/{id}\"></iframe>");
    let doc = format!("{}{}", embed("AAAAAAAAAAA"), embed("AAAAAAAAAAA"));
    let input = line(json!({
        "id": 5,
        "op": "media",
        "document": doc,
        "items": [{"id": "AAAAAAAAAAA"}, {"id": "BBBBBBBBBBB"}]
    }));

    let (_, responses) = exchange(IntegrityConfig::default(), &input).await;
    assert_eq!(responses[0]["result"]["changed"], true);
    assert_eq!(
        responses[0]["result"]["document"],
        format!("{}{}", embed("AAAAAAAAAAA"), embed("BBBBBBBBBBB"))
    );
}

#[tokio::test]
async fn test_empty_input_answers_nothing() {
    let (answered, responses) = exchange(IntegrityConfig::default(), "\n\n").await;
    assert_eq!(answered, 0);
    assert!(responses.is_empty());
}
