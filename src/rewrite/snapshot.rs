//! Upstream response header snapshot.
//!
//! Captured once, before the rewriter touches anything, so stage selection
//! always sees what the upstream actually sent.

use axum::http::header::{CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, TRANSFER_ENCODING};
use axum::http::HeaderMap;

/// How the body is treated by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyMode {
    /// Raw bytes: forwarded unchanged, no decode/transform/encode.
    Binary,
    /// Text: decoded, transformed and re-encoded.
    Text,
}

impl BodyMode {
    /// Decide the mode from a `Content-Type` value.
    ///
    /// Only known binary families are `Binary`; everything else, including a
    /// missing or unrecognised content type, is text.
    pub fn from_content_type(content_type: Option<&str>) -> Self {
        let Some(content_type) = content_type else {
            return BodyMode::Text;
        };

        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        let binary = ["image/", "audio/", "video/", "font/"]
            .iter()
            .any(|family| essence.starts_with(family))
            || matches!(
                essence.as_str(),
                "application/octet-stream"
                    | "application/pdf"
                    | "application/zip"
                    | "application/gzip"
                    | "application/x-gzip"
                    | "application/x-tar"
                    | "application/x-7z-compressed"
                    | "application/x-bzip2"
                    | "application/x-rar-compressed"
                    | "application/zstd"
                    | "application/wasm"
                    | "application/x-protobuf"
                    | "application/protobuf"
                    | "application/grpc"
                    | "application/msgpack"
                    | "application/cbor"
            );

        if binary {
            BodyMode::Binary
        } else {
            BodyMode::Text
        }
    }
}

/// Framing and encoding headers as the upstream sent them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderSnapshot {
    /// Original `Content-Type`, if any.
    pub content_type: Option<String>,
    /// `Content-Encoding` tokens in header order, lowercased.
    pub content_encoding: Vec<String>,
    /// Whether a `Transfer-Encoding` header was present.
    pub transfer_encoding: bool,
    /// Original `Content-Length`, if present and valid.
    pub content_length: Option<u64>,
}

impl HeaderSnapshot {
    pub fn capture(headers: &HeaderMap) -> Self {
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        // Repeated headers and comma lists both count, in order.
        let content_encoding = headers
            .get_all(CONTENT_ENCODING)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .map(|token| token.trim().to_ascii_lowercase())
            .filter(|token| !token.is_empty())
            .collect();

        let content_length = headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok());

        Self {
            content_type,
            content_encoding,
            transfer_encoding: headers.contains_key(TRANSFER_ENCODING),
            content_length,
        }
    }

    pub fn body_mode(&self) -> BodyMode {
        BodyMode::from_content_type(self.content_type.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_body_mode_from_content_type() {
        assert_eq!(BodyMode::from_content_type(None), BodyMode::Text);
        assert_eq!(
            BodyMode::from_content_type(Some("text/html; charset=utf-8")),
            BodyMode::Text
        );
        assert_eq!(BodyMode::from_content_type(Some("Application/JSON")), BodyMode::Text);
        assert_eq!(
            BodyMode::from_content_type(Some("application/problem+json")),
            BodyMode::Text
        );
        assert_eq!(BodyMode::from_content_type(Some("image/png")), BodyMode::Binary);
        assert_eq!(
            BodyMode::from_content_type(Some("application/octet-stream")),
            BodyMode::Binary
        );
        assert_eq!(BodyMode::from_content_type(Some("font/woff2")), BodyMode::Binary);
        assert_eq!(BodyMode::from_content_type(Some("application/pdf")), BodyMode::Binary);
        // Non-standard media types must not blow up.
        assert_eq!(BodyMode::from_content_type(Some("image")), BodyMode::Text);
    }

    #[test]
    fn test_unlisted_text_types_are_text() {
        for content_type in [
            "application/yaml",
            "application/x-yaml",
            "application/toml",
            "application/sql",
            "application/vnd.custom",
        ] {
            assert_eq!(
                BodyMode::from_content_type(Some(content_type)),
                BodyMode::Text,
                "{}",
                content_type
            );
        }
    }

    #[test]
    fn test_capture_encoding_tokens_in_order() {
        let mut headers = HeaderMap::new();
        headers.append(CONTENT_ENCODING, HeaderValue::from_static("Zstd, gzip"));
        headers.append(CONTENT_ENCODING, HeaderValue::from_static("br"));

        let snapshot = HeaderSnapshot::capture(&headers);
        assert_eq!(snapshot.content_encoding, vec!["zstd", "gzip", "br"]);
    }

    #[test]
    fn test_capture_framing() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        headers.insert(TRANSFER_ENCODING, HeaderValue::from_static("chunked"));

        let snapshot = HeaderSnapshot::capture(&headers);
        assert!(snapshot.transfer_encoding);
        assert_eq!(snapshot.content_length, None);
        assert_eq!(snapshot.content_type.as_deref(), Some("text/plain"));
        assert_eq!(snapshot.body_mode(), BodyMode::Text);

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("42"));
        let snapshot = HeaderSnapshot::capture(&headers);
        assert!(!snapshot.transfer_encoding);
        assert_eq!(snapshot.content_length, Some(42));
        assert!(snapshot.content_encoding.is_empty());
    }
}
