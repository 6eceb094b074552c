//! Character decoding for `C` fields and `.cpg` resolution

use std::io::Read;

use encoding_rs::Encoding;

use crate::error::{Result, ShapefileError};

/// How raw character field bytes become text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CharacterDecoder {
    /// Lossy UTF-8; accepts any bytes
    #[default]
    Passthrough,
    /// 7-bit ASCII; bytes >= 0x80 are an error
    Ascii,
    /// Strict decoding with a specific encoding
    Encoding(&'static Encoding),
}

impl CharacterDecoder {
    /// Resolve a charset name such as `UTF-8`, `ASCII` or a bare code page like `1252`.
    pub fn for_label(label: &str) -> Option<Self> {
        let label = label.trim();
        if label.eq_ignore_ascii_case("ascii") || label.eq_ignore_ascii_case("us-ascii") {
            return Some(CharacterDecoder::Ascii);
        }

        if !label.is_empty() && label.bytes().all(|b| b.is_ascii_digit()) {
            if label == "65001" {
                return Some(CharacterDecoder::Encoding(encoding_rs::UTF_8));
            }
            let windows = format!("windows-{}", label);
            return Encoding::for_label(windows.as_bytes()).map(CharacterDecoder::Encoding);
        }

        Encoding::for_label(label.as_bytes()).map(CharacterDecoder::Encoding)
    }

    /// Display name of the decoder.
    pub fn name(&self) -> &'static str {
        match self {
            CharacterDecoder::Passthrough => "passthrough",
            CharacterDecoder::Ascii => "ASCII",
            CharacterDecoder::Encoding(encoding) => encoding.name(),
        }
    }

    /// Decode raw bytes to text.
    pub fn decode(&self, bytes: &[u8]) -> Result<String> {
        match self {
            CharacterDecoder::Passthrough => Ok(String::from_utf8_lossy(bytes).into_owned()),
            CharacterDecoder::Ascii => {
                if !bytes.is_ascii() {
                    return Err(ShapefileError::InvalidCharacters { encoding: "ASCII" });
                }
                Ok(bytes.iter().map(|&b| b as char).collect())
            }
            CharacterDecoder::Encoding(encoding) => encoding
                .decode_without_bom_handling_and_without_replacement(bytes)
                .map(|text| text.into_owned())
                .ok_or(ShapefileError::InvalidCharacters {
                    encoding: encoding.name(),
                }),
        }
    }
}

/// Read a `.cpg` file and resolve the charset named on its first non-blank line.
pub fn read_cpg<R: Read>(mut reader: R) -> Result<CharacterDecoder> {
    let mut raw = Vec::new();
    reader.read_to_end(&mut raw)?;
    let text = String::from_utf8_lossy(&raw);

    let label = text
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .ok_or_else(|| ShapefileError::UnknownCharset(String::new()))?;

    CharacterDecoder::for_label(label).ok_or_else(|| ShapefileError::UnknownCharset(label.to_string()))
}
