//! Sentry envelope framing
//!
//! The ingestion target accepts a three-line framed body: the envelope
//! header, the item header and the payload, each terminated by a single
//! newline.

use crate::GeneratorError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Debug, Serialize)]
struct ItemHeader<'a> {
    #[serde(rename = "type")]
    item_type: &'a str,
    length: usize,
}

/// Assemble an envelope around `body`.
///
/// `extra_headers` are merged into the envelope header next to `event_id`
/// and `sent_at`.
pub fn envelope_from_body(
    event_id: &str,
    sent_at: DateTime<Utc>,
    item_type: &str,
    extra_headers: &[(&str, Value)],
    body: &[u8],
) -> Result<Vec<u8>, GeneratorError> {
    let mut headers = Map::new();
    headers.insert("event_id".into(), Value::String(event_id.to_string()));
    headers.insert("sent_at".into(), Value::String(sent_at.to_rfc3339()));
    for (key, value) in extra_headers {
        headers.insert((*key).to_string(), value.clone());
    }

    let mut buffer = serde_json::to_vec(&Value::Object(headers))?;
    buffer.push(b'\n');
    buffer.extend_from_slice(&serde_json::to_vec(&ItemHeader {
        item_type,
        length: body.len(),
    })?);
    buffer.push(b'\n');
    buffer.extend_from_slice(body);
    buffer.push(b'\n');
    Ok(buffer)
}

/// The `X-Sentry-Auth` header value for a project key.
pub fn auth_header(project_key: &str) -> String {
    format!("Sentry sentry_key={project_key},sentry_version=7")
}

/// The envelope ingestion URL for a project.
pub fn envelope_url(target_url: &str, project_id: &str) -> String {
    format!("{}/api/{}/envelope/", target_url.trim_end_matches('/'), project_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn envelope_has_three_newline_terminated_lines() {
        let sent_at = Utc.with_ymd_and_hms(2022, 10, 10, 10, 10, 10).unwrap();
        let body = br#"{"init":true}"#;
        let buffer = envelope_from_body(
            "abc123",
            sent_at,
            "session",
            &[("public_key", Value::String("key".into()))],
            body,
        )
        .unwrap();

        assert_eq!(buffer.last(), Some(&b'\n'));
        let text = std::str::from_utf8(&buffer).unwrap();
        let lines: Vec<&str> = text.split_terminator('\n').collect();
        assert_eq!(lines.len(), 3);

        let env_header: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(env_header["event_id"], "abc123");
        assert_eq!(env_header["public_key"], "key");
        assert_eq!(env_header["sent_at"], "2022-10-10T10:10:10+00:00");

        let item_header: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(item_header["type"], "session");
        assert_eq!(item_header["length"], body.len());

        assert_eq!(lines[2].as_bytes(), body);
    }

    #[test]
    fn item_length_matches_body() {
        let buffer =
            envelope_from_body("id", Utc::now(), "transaction", &[], b"0123456789").unwrap();
        let text = std::str::from_utf8(&buffer).unwrap();
        let item_header: serde_json::Value =
            serde_json::from_str(text.split('\n').nth(1).unwrap()).unwrap();
        assert_eq!(item_header["length"], 10);
    }

    #[test]
    fn auth_header_format() {
        assert_eq!(
            auth_header("abc"),
            "Sentry sentry_key=abc,sentry_version=7"
        );
    }

    #[test]
    fn envelope_url_strips_trailing_slash() {
        assert_eq!(
            envelope_url("http://target:9000/", "42"),
            "http://target:9000/api/42/envelope/"
        );
    }
}
