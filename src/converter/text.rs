use super::{ConversionError, ConvertContext, DocumentConverter};

const UTF8_BOM: &str = "\u{feff}";

/// Text that is already Markdown, or close enough to pass through.
pub(crate) struct PlainTextConverter;

impl DocumentConverter for PlainTextConverter {
    fn name(&self) -> &'static str {
        "text"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["txt", "text", "md", "markdown", "log", "rst"]
    }

    fn sniff(&self, bytes: &[u8]) -> bool {
        !bytes.contains(&0) && std::str::from_utf8(bytes).is_ok()
    }

    fn convert(&self, bytes: &[u8], _ctx: &ConvertContext<'_>) -> Result<String, ConversionError> {
        let text = decode_utf8(bytes, "text")?;
        Ok(text.replace("\r\n", "\n"))
    }
}

/// Strict UTF-8 decode with the byte-order mark removed.
pub(crate) fn decode_utf8<'a>(bytes: &'a [u8], format: &'static str) -> Result<&'a str, ConversionError> {
    let text = std::str::from_utf8(bytes).map_err(|e| ConversionError::malformed(format, e))?;
    Ok(text.strip_prefix(UTF8_BOM).unwrap_or(text))
}
