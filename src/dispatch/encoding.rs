//! Content-encoding codecs and Accept-Encoding negotiation.
//!
//! Negotiation walks the client's tokens in the order they were sent and
//! picks the first one with a registered codec. Quality values are dropped,
//! not compared: `br;q=0.1, gzip` prefers `br` when both are registered.

use std::io::Write;
use std::sync::Arc;

use bytes::Bytes;
use flate2::write::{DeflateEncoder, GzEncoder};
use flate2::Compression;
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::http::CodecMap;

/// Errors raised by codecs.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("encoding failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("encoder task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("unknown codec: {0}")]
    Unknown(String),
}

/// Transforms a buffered body into an encoded one.
pub trait ContentCodec: Send + Sync {
    fn encode(&self, input: Bytes) -> BoxFuture<'_, Result<Bytes, CodecError>>;
}

/// Compression level shared by the built-in codecs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionLevel {
    Fast,
    #[default]
    Default,
    Best,
}

impl CompressionLevel {
    fn flate(self) -> Compression {
        match self {
            Self::Fast => Compression::fast(),
            Self::Default => Compression::default(),
            Self::Best => Compression::best(),
        }
    }

    fn brotli_quality(self) -> i32 {
        match self {
            Self::Fast => 1,
            Self::Default => 6,
            Self::Best => 11,
        }
    }
}

/// `gzip` (RFC 1952).
#[derive(Debug, Clone, Copy, Default)]
pub struct GzipCodec {
    pub level: CompressionLevel,
}

/// `deflate` (RFC 1951).
#[derive(Debug, Clone, Copy, Default)]
pub struct DeflateCodec {
    pub level: CompressionLevel,
}

/// `br` (RFC 7932).
#[derive(Debug, Clone, Copy, Default)]
pub struct BrotliCodec {
    pub level: CompressionLevel,
}

impl ContentCodec for GzipCodec {
    fn encode(&self, input: Bytes) -> BoxFuture<'_, Result<Bytes, CodecError>> {
        let level = self.level.flate();
        Box::pin(blocking(move || {
            let mut encoder = GzEncoder::new(Vec::new(), level);
            encoder.write_all(&input)?;
            encoder.finish()
        }))
    }
}

impl ContentCodec for DeflateCodec {
    fn encode(&self, input: Bytes) -> BoxFuture<'_, Result<Bytes, CodecError>> {
        let level = self.level.flate();
        Box::pin(blocking(move || {
            let mut encoder = DeflateEncoder::new(Vec::new(), level);
            encoder.write_all(&input)?;
            encoder.finish()
        }))
    }
}

impl ContentCodec for BrotliCodec {
    fn encode(&self, input: Bytes) -> BoxFuture<'_, Result<Bytes, CodecError>> {
        let params = brotli::enc::BrotliEncoderParams {
            quality: self.level.brotli_quality(),
            ..Default::default()
        };
        Box::pin(blocking(move || {
            let mut output = Vec::new();
            brotli::BrotliCompress(&mut std::io::Cursor::new(&input[..]), &mut output, &params)?;
            Ok(output)
        }))
    }
}

async fn blocking<F>(f: F) -> Result<Bytes, CodecError>
where
    F: FnOnce() -> std::io::Result<Vec<u8>> + Send + 'static,
{
    let encoded = tokio::task::spawn_blocking(f).await??;
    Ok(Bytes::from(encoded))
}

/// Build a built-in codec by its content-coding name.
pub fn builtin_codec(name: &str, level: CompressionLevel) -> Result<Arc<dyn ContentCodec>, CodecError> {
    match name {
        "gzip" => Ok(Arc::new(GzipCodec { level })),
        "deflate" => Ok(Arc::new(DeflateCodec { level })),
        "br" => Ok(Arc::new(BrotliCodec { level })),
        other => Err(CodecError::Unknown(other.to_string())),
    }
}

/// Split an Accept-Encoding value into bare tokens, in header order.
pub fn parse_accept_encoding(header: &str) -> Vec<&str> {
    header
        .split(',')
        .map(|token| token.split(';').next().unwrap_or_default().trim())
        .filter(|token| !token.is_empty())
        .collect()
}

/// Pick the codec for the first acceptable token.
///
/// `*` selects the first registered codec.
pub fn negotiate<'c>(header: &str, codecs: &'c CodecMap) -> Option<(&'c str, &'c Arc<dyn ContentCodec>)> {
    for token in parse_accept_encoding(header) {
        let selected = if token == "*" {
            codecs.first()
        } else {
            codecs.get_key_value(token)
        };
        if let Some((name, codec)) = selected {
            return Some((name.as_str(), codec));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn registry(names: &[&str]) -> CodecMap {
        names
            .iter()
            .map(|name| (name.to_string(), builtin_codec(name, CompressionLevel::Fast).unwrap()))
            .collect()
    }

    #[test]
    fn test_parse_drops_quality_and_whitespace() {
        assert_eq!(
            parse_accept_encoding(" gzip;q=0.5 , br ,, deflate;q=1"),
            vec!["gzip", "br", "deflate"]
        );
    }

    #[test]
    fn test_first_listed_matching_token_wins() {
        let codecs = registry(&["gzip"]);
        let (name, _) = negotiate("br, gzip", &codecs).unwrap();
        assert_eq!(name, "gzip");
    }

    #[test]
    fn test_header_order_beats_quality() {
        let codecs = registry(&["gzip", "br"]);
        let (name, _) = negotiate("br;q=0.1, gzip;q=1.0", &codecs).unwrap();
        assert_eq!(name, "br");
    }

    #[test]
    fn test_wildcard_picks_first_registered() {
        let codecs = registry(&["deflate", "gzip"]);
        let (name, _) = negotiate("identity, *", &codecs).unwrap();
        assert_eq!(name, "deflate");
    }

    #[test]
    fn test_no_match() {
        let codecs = registry(&["gzip"]);
        assert!(negotiate("br, identity", &codecs).is_none());
        assert!(negotiate("*", &CodecMap::new()).is_none());
    }

    #[test]
    fn test_unknown_builtin() {
        assert!(matches!(
            builtin_codec("zstd", CompressionLevel::Default),
            Err(CodecError::Unknown(_))
        ));
    }

    #[tokio::test]
    async fn test_gzip_roundtrip() {
        let codec = GzipCodec::default();
        let data = Bytes::from("hello hello hello hello");
        let encoded = codec.encode(data.clone()).await.unwrap();

        let mut decoder = flate2::read::GzDecoder::new(&encoded[..]);
        let mut decoded = String::new();
        decoder.read_to_string(&mut decoded).unwrap();
        assert_eq!(decoded.as_bytes(), &data[..]);
    }

    #[tokio::test]
    async fn test_brotli_roundtrip() {
        let codec = BrotliCodec::default();
        let data = Bytes::from("brotli brotli brotli brotli");
        let encoded = codec.encode(data.clone()).await.unwrap();

        let mut decoded = Vec::new();
        brotli::BrotliDecompress(&mut std::io::Cursor::new(&encoded[..]), &mut decoded).unwrap();
        assert_eq!(decoded, data.to_vec());
    }
}
