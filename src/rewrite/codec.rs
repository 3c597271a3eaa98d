//! Content-encoding codec registry.
//!
//! # Responsibilities
//! - Define the decoder/encoder capabilities keyed by encoding token
//! - Build an immutable lookup table once at startup
//! - Provide the built-in `gzip`, `deflate` and `br` codecs
//!
//! # Design Decisions
//! - Registry is frozen after `build()`; shared via `Arc`, no locks on lookup
//! - Duplicate tokens are rejected at startup instead of last-one-wins
//! - Tokens are compared ASCII case-insensitively
//! - Unknown token is not an error: callers treat it as passthrough

use std::collections::HashMap;
use std::fmt;
use std::io::{self, Read, Write};
use std::sync::Arc;

use flate2::Compression;
use thiserror::Error;

/// Decodes a body that was compressed with one content-encoding.
pub trait BodyDecoder: Send + Sync + fmt::Debug {
    /// The `Content-Encoding` token this decoder handles.
    fn encoding_type(&self) -> &'static str;

    /// Fully decode `input`.
    fn decode(&self, input: &[u8]) -> io::Result<Vec<u8>>;
}

/// Encodes a body with one content-encoding.
pub trait BodyEncoder: Send + Sync + fmt::Debug {
    /// The `Content-Encoding` token this encoder handles.
    fn encoding_type(&self) -> &'static str;

    /// Fully encode `input`.
    fn encode(&self, input: &[u8]) -> io::Result<Vec<u8>>;
}

/// Errors raised while building the registry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("decoder for `{0}` registered twice")]
    DuplicateDecoder(String),

    #[error("encoder for `{0}` registered twice")]
    DuplicateEncoder(String),
}

/// Immutable table of decoders and encoders.
#[derive(Debug, Default)]
pub struct CodecRegistry {
    decoders: HashMap<String, Arc<dyn BodyDecoder>>,
    encoders: HashMap<String, Arc<dyn BodyEncoder>>,
}

impl CodecRegistry {
    /// Start building a registry.
    pub fn builder() -> CodecRegistryBuilder {
        CodecRegistryBuilder::default()
    }

    /// Registry holding the built-in `gzip`, `deflate` and `br` codecs.
    pub fn with_defaults() -> Self {
        let builtins: [(Arc<dyn BodyDecoder>, Arc<dyn BodyEncoder>); 3] = [
            (Arc::new(GzipCodec::default()), Arc::new(GzipCodec::default())),
            (Arc::new(DeflateCodec::default()), Arc::new(DeflateCodec::default())),
            (Arc::new(BrotliCodec::default()), Arc::new(BrotliCodec::default())),
        ];

        let mut registry = Self::default();
        for (decoder, encoder) in builtins {
            registry.decoders.insert(normalize(decoder.encoding_type()), decoder);
            registry.encoders.insert(normalize(encoder.encoding_type()), encoder);
        }
        registry
    }

    /// Look up the decoder for an encoding token.
    pub fn decoder(&self, token: &str) -> Option<Arc<dyn BodyDecoder>> {
        self.decoders.get(&normalize(token)).cloned()
    }

    /// Look up the encoder for an encoding token.
    pub fn encoder(&self, token: &str) -> Option<Arc<dyn BodyEncoder>> {
        self.encoders.get(&normalize(token)).cloned()
    }

    /// Tokens with a registered decoder, sorted.
    pub fn decoder_tokens(&self) -> Vec<&str> {
        let mut tokens: Vec<&str> = self.decoders.keys().map(String::as_str).collect();
        tokens.sort_unstable();
        tokens
    }

    /// Tokens with a registered encoder, sorted.
    pub fn encoder_tokens(&self) -> Vec<&str> {
        let mut tokens: Vec<&str> = self.encoders.keys().map(String::as_str).collect();
        tokens.sort_unstable();
        tokens
    }
}

/// Collects codecs before freezing them into a [`CodecRegistry`].
#[derive(Debug, Default)]
pub struct CodecRegistryBuilder {
    decoders: Vec<Arc<dyn BodyDecoder>>,
    encoders: Vec<Arc<dyn BodyEncoder>>,
}

impl CodecRegistryBuilder {
    pub fn decoder(mut self, decoder: impl BodyDecoder + 'static) -> Self {
        self.decoders.push(Arc::new(decoder));
        self
    }

    pub fn encoder(mut self, encoder: impl BodyEncoder + 'static) -> Self {
        self.encoders.push(Arc::new(encoder));
        self
    }

    /// Freeze the table, rejecting duplicate tokens.
    pub fn build(self) -> Result<CodecRegistry, RegistryError> {
        let mut decoders = HashMap::with_capacity(self.decoders.len());
        for decoder in self.decoders {
            let token = normalize(decoder.encoding_type());
            if decoders.contains_key(&token) {
                return Err(RegistryError::DuplicateDecoder(token));
            }
            decoders.insert(token, decoder);
        }

        let mut encoders = HashMap::with_capacity(self.encoders.len());
        for encoder in self.encoders {
            let token = normalize(encoder.encoding_type());
            if encoders.contains_key(&token) {
                return Err(RegistryError::DuplicateEncoder(token));
            }
            encoders.insert(token, encoder);
        }

        Ok(CodecRegistry { decoders, encoders })
    }
}

fn normalize(token: &str) -> String {
    token.trim().to_ascii_lowercase()
}

/// `gzip` via flate2.
#[derive(Debug, Clone, Copy)]
pub struct GzipCodec {
    level: Compression,
}

impl Default for GzipCodec {
    fn default() -> Self {
        Self {
            level: Compression::default(),
        }
    }
}

impl BodyDecoder for GzipCodec {
    fn encoding_type(&self) -> &'static str {
        "gzip"
    }

    fn decode(&self, input: &[u8]) -> io::Result<Vec<u8>> {
        let mut decoder = flate2::read::GzDecoder::new(input);
        let mut out = Vec::with_capacity(input.len() * 2);
        decoder.read_to_end(&mut out)?;
        Ok(out)
    }
}

impl BodyEncoder for GzipCodec {
    fn encoding_type(&self) -> &'static str {
        "gzip"
    }

    fn encode(&self, input: &[u8]) -> io::Result<Vec<u8>> {
        let mut encoder = flate2::write::GzEncoder::new(Vec::new(), self.level);
        encoder.write_all(input)?;
        encoder.finish()
    }
}

/// `deflate`, which on the wire is the zlib format.
#[derive(Debug, Clone, Copy)]
pub struct DeflateCodec {
    level: Compression,
}

impl Default for DeflateCodec {
    fn default() -> Self {
        Self {
            level: Compression::default(),
        }
    }
}

impl BodyDecoder for DeflateCodec {
    fn encoding_type(&self) -> &'static str {
        "deflate"
    }

    fn decode(&self, input: &[u8]) -> io::Result<Vec<u8>> {
        let mut decoder = flate2::read::ZlibDecoder::new(input);
        let mut out = Vec::with_capacity(input.len() * 2);
        decoder.read_to_end(&mut out)?;
        Ok(out)
    }
}

impl BodyEncoder for DeflateCodec {
    fn encoding_type(&self) -> &'static str {
        "deflate"
    }

    fn encode(&self, input: &[u8]) -> io::Result<Vec<u8>> {
        let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), self.level);
        encoder.write_all(input)?;
        encoder.finish()
    }
}

/// `br` via the brotli crate.
#[derive(Debug, Clone, Copy)]
pub struct BrotliCodec {
    quality: i32,
}

impl Default for BrotliCodec {
    fn default() -> Self {
        Self { quality: 4 }
    }
}

impl BodyDecoder for BrotliCodec {
    fn encoding_type(&self) -> &'static str {
        "br"
    }

    fn decode(&self, input: &[u8]) -> io::Result<Vec<u8>> {
        let mut out = Vec::with_capacity(input.len() * 2);
        brotli::BrotliDecompress(&mut &input[..], &mut out)?;
        Ok(out)
    }
}

impl BodyEncoder for BrotliCodec {
    fn encoding_type(&self) -> &'static str {
        "br"
    }

    fn encode(&self, input: &[u8]) -> io::Result<Vec<u8>> {
        let params = brotli::enc::BrotliEncoderParams {
            quality: self.quality,
            ..Default::default()
        };
        let mut out = Vec::new();
        brotli::BrotliCompress(&mut &input[..], &mut out, &params)?;
        Ok(out)
    }
}
