//! Message framing for newline-delimited JSON envelopes.

use seo_integrity::{Request, Response};

use crate::error::{WorkerError, WorkerResult};

/// Parse one line as a request envelope.
pub fn parse_request(line: &str) -> WorkerResult<Request> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Err(WorkerError::Parse("Empty message".to_string()));
    }

    serde_json::from_str(trimmed).map_err(|e| WorkerError::Parse(e.to_string()))
}

/// Serialize a response to a JSON line (with trailing newline).
pub fn frame_response(response: &Response) -> WorkerResult<String> {
    let mut json = serde_json::to_string(response)?;
    json.push('\n');
    Ok(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use seo_integrity::RequestId;

    #[test]
    fn test_parse_rejects_empty_and_garbage() {
        assert!(matches!(parse_request("   "), Err(WorkerError::Parse(_))));
        assert!(matches!(parse_request("{not json"), Err(WorkerError::Parse(_))));
        assert!(matches!(
            parse_request(r#"{"id":1,"op":"teleport"}"#),
            Err(WorkerError::Parse(_))
        ));
    }

    #[test]
    fn test_frame_is_single_line() {
        let framed = frame_response(&Response::error(RequestId::Number(4), "multi\nline")).unwrap();
        assert!(framed.ends_with('\n'));
        assert_eq!(framed.matches('\n').count(), 1);
    }
}
