//! Decode and encode stages.
//!
//! Both stages scan the `Content-Encoding` tokens in header order and apply
//! the first registered codec only. One layer is undone and the same layer
//! is redone, so the untouched `Content-Encoding` header stays truthful.
//!
//! These functions are CPU-bound; callers run them on the codec pool.

use bytes::Bytes;

use crate::rewrite::codec::CodecRegistry;
use crate::rewrite::error::RewriteError;
use crate::rewrite::transform::{transform_stage, BodyTransform, TransformConfig};

/// Undo the first registered encoding, or pass through.
pub fn decode_stage(
    registry: &CodecRegistry,
    tokens: &[String],
    input: Bytes,
) -> Result<Bytes, RewriteError> {
    for token in tokens {
        if let Some(decoder) = registry.decoder(token) {
            let decoded = decoder
                .decode(&input)
                .map_err(|source| RewriteError::Decode {
                    encoding: token.clone(),
                    source,
                })?;
            tracing::debug!(
                encoding = %token,
                encoded_bytes = input.len(),
                decoded_bytes = decoded.len(),
                "Body decoded"
            );
            return Ok(Bytes::from(decoded));
        }
    }

    Ok(input)
}

/// Apply the first registered encoding, or pass through.
pub fn encode_stage(
    registry: &CodecRegistry,
    tokens: &[String],
    input: Bytes,
) -> Result<Bytes, RewriteError> {
    for token in tokens {
        if let Some(encoder) = registry.encoder(token) {
            let encoded = encoder
                .encode(&input)
                .map_err(|source| RewriteError::Encode {
                    encoding: token.clone(),
                    source,
                })?;
            tracing::debug!(
                encoding = %token,
                plain_bytes = input.len(),
                encoded_bytes = encoded.len(),
                "Body re-encoded"
            );
            return Ok(Bytes::from(encoded));
        }
    }

    Ok(input)
}

/// Decode → transform → encode, strictly in that order.
pub fn run_text_pipeline(
    registry: &CodecRegistry,
    tokens: &[String],
    transform: &dyn BodyTransform,
    config: &TransformConfig,
    captured: Bytes,
) -> Result<Bytes, RewriteError> {
    let decoded = decode_stage(registry, tokens, captured)?;
    let transformed = transform_stage(transform, config, &decoded)?;
    drop(decoded);
    encode_stage(registry, tokens, transformed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rewrite::codec::{BodyEncoder, GzipCodec};
    use crate::rewrite::transform::Uppercase;

    fn tokens(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_unregistered_tokens_are_passthrough() {
        let registry = CodecRegistry::with_defaults();
        let input = Bytes::from_static(b"\x00\x01 raw payload");

        for list in [tokens(&[]), tokens(&["zstd"]), tokens(&["identity", "compress"])] {
            let decoded = decode_stage(&registry, &list, input.clone()).unwrap();
            assert_eq!(decoded, input);
            let encoded = encode_stage(&registry, &list, input.clone()).unwrap();
            assert_eq!(encoded, input);
        }
    }

    #[test]
    fn test_first_registered_token_wins() {
        let registry = CodecRegistry::with_defaults();
        let gz = GzipCodec::default().encode(b"payload").unwrap();

        // "zstd" is skipped, "gzip" decodes, "br" is never looked at.
        let decoded =
            decode_stage(&registry, &tokens(&["zstd", "gzip", "br"]), Bytes::from(gz)).unwrap();
        assert_eq!(&decoded[..], b"payload");
    }

    #[test]
    fn test_only_one_layer_is_undone() {
        let registry = CodecRegistry::with_defaults();
        let inner = GzipCodec::default().encode(b"twice").unwrap();
        let outer = GzipCodec::default().encode(&inner).unwrap();

        let decoded = decode_stage(&registry, &tokens(&["gzip", "gzip"]), Bytes::from(outer)).unwrap();
        assert_eq!(&decoded[..], &inner[..]);
    }

    #[test]
    fn test_decode_failure_names_encoding() {
        let registry = CodecRegistry::with_defaults();
        let err = decode_stage(&registry, &tokens(&["gzip"]), Bytes::from_static(b"nope")).unwrap_err();
        assert!(matches!(err, RewriteError::Decode { ref encoding, .. } if encoding == "gzip"));
    }

    #[test]
    fn test_gzip_pipeline() {
        let registry = CodecRegistry::with_defaults();
        let gz = GzipCodec::default().encode(b"abc").unwrap();

        let out = run_text_pipeline(
            &registry,
            &tokens(&["gzip"]),
            &Uppercase,
            &TransformConfig::default(),
            Bytes::from(gz),
        )
        .unwrap();

        let decoder = registry.decoder("gzip").unwrap();
        assert_eq!(decoder.decode(&out).unwrap(), b"ABC");
    }

    #[test]
    fn test_plain_pipeline() {
        let registry = CodecRegistry::with_defaults();
        let out = run_text_pipeline(
            &registry,
            &[],
            &Uppercase,
            &TransformConfig::default(),
            Bytes::from_static(b"hello world"),
        )
        .unwrap();
        assert_eq!(&out[..], b"HELLO WORLD");
    }
}
