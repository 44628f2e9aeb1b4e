//! Blueprint string codec.
//!
//! A blueprint string is a one-character version prefix followed by
//! standard base64 of the compressed JSON text of `{"blueprint": ...}`.
//! Strings written by the game are zlib; [`encode_text`] writes zlib too.
//! Brotli is available through [`encode_text_with`]. [`decode_text`] reads
//! either, telling them apart by the zlib stream header.

use crate::document::{BlueprintDocument, BlueprintEnvelope};
use crate::error::CodecError;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use serde_json::Value;
use std::io::{Cursor, Read, Write};

/// The only string version understood.
pub const VERSION_PREFIX: char = '0';

/// Compression applied before base64.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StringCompression {
    #[default]
    Zlib,
    Brotli,
}

/// A two-byte zlib header: deflate method, window of at most 32K, and a
/// check value making the pair a multiple of 31.
fn has_zlib_header(bytes: &[u8]) -> bool {
    match bytes {
        [cmf, flg, ..] => {
            cmf & 0x0f == 8 && cmf >> 4 <= 7 && ((u16::from(*cmf) << 8) | u16::from(*flg)) % 31 == 0
        }
        _ => false,
    }
}

fn compress(json: &[u8], compression: StringCompression) -> Result<Vec<u8>, CodecError> {
    match compression {
        StringCompression::Zlib => {
            let mut encoder = ZlibEncoder::new(Vec::new(), flate2::Compression::best());
            encoder.write_all(json)?;
            Ok(encoder.finish()?)
        }
        StringCompression::Brotli => {
            let mut compressed = Vec::new();
            brotli::BrotliCompress(
                &mut Cursor::new(json),
                &mut compressed,
                &brotli::enc::BrotliEncoderParams {
                    quality: 9,
                    lgwin: 22,
                    ..Default::default()
                },
            )?;
            Ok(compressed)
        }
    }
}

fn decompress(compressed: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut raw = Vec::new();
    if has_zlib_header(compressed) {
        match ZlibDecoder::new(compressed).read_to_end(&mut raw) {
            Ok(_) => return Ok(raw),
            Err(e) => {
                log::debug!("zlib header but not a zlib stream ({e}), trying brotli");
                raw.clear();
            }
        }
    }
    brotli::BrotliDecompress(&mut Cursor::new(compressed), &mut raw)?;
    Ok(raw)
}

/// Encode a JSON tree as a zlib blueprint string.
pub fn encode_text(tree: &Value) -> Result<String, CodecError> {
    encode_text_with(tree, StringCompression::default())
}

/// Encode a JSON tree as a blueprint string with the given compression.
pub fn encode_text_with(tree: &Value, compression: StringCompression) -> Result<String, CodecError> {
    let json = serde_json::to_string(tree)?;
    let compressed = compress(json.as_bytes(), compression)?;
    log::trace!(
        "compressed {} bytes to {} ({compression:?})",
        json.len(),
        compressed.len()
    );
    Ok(format!("{VERSION_PREFIX}{}", STANDARD.encode(&compressed)))
}

/// Decode a zlib or brotli blueprint string into its JSON tree.
pub fn decode_text(text: &str) -> Result<Value, CodecError> {
    let text = text.trim();
    let mut chars = text.chars();
    let version = chars.next().ok_or(CodecError::Empty)?;
    if version != VERSION_PREFIX {
        return Err(CodecError::UnsupportedVersion(version));
    }
    let compressed = STANDARD.decode(chars.as_str())?;
    let json = String::from_utf8(decompress(&compressed)?)?;
    Ok(serde_json::from_str(&json)?)
}

pub fn encode_document(doc: &BlueprintDocument) -> Result<String, CodecError> {
    let envelope = BlueprintEnvelope {
        blueprint: doc.clone(),
    };
    encode_text(&serde_json::to_value(&envelope)?)
}

pub fn decode_document(text: &str) -> Result<BlueprintDocument, CodecError> {
    let envelope: BlueprintEnvelope = serde_json::from_value(decode_text(text)?)?;
    Ok(envelope.blueprint)
}

/// Decode independent blueprint strings. Results keep input order.
#[cfg(feature = "parallel")]
pub fn decode_many(texts: &[&str]) -> Vec<Result<BlueprintDocument, CodecError>> {
    use rayon::prelude::*;
    texts.par_iter().map(|t| decode_document(t)).collect()
}

/// Decode independent blueprint strings. Results keep input order.
#[cfg(not(feature = "parallel"))]
pub fn decode_many(texts: &[&str]) -> Vec<Result<BlueprintDocument, CodecError>> {
    texts.iter().map(|t| decode_document(t)).collect()
}
