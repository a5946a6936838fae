use serde_json::Value;

use super::text::decode_utf8;
use super::{ConversionError, ConvertContext, DocumentConverter};

pub(crate) struct JsonConverter;

impl DocumentConverter for JsonConverter {
    fn name(&self) -> &'static str {
        "json"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["json"]
    }

    fn sniff(&self, bytes: &[u8]) -> bool {
        let first = bytes.iter().find(|b| !b.is_ascii_whitespace());
        matches!(first, Some(b'{') | Some(b'['))
            && serde_json::from_slice::<Value>(bytes).is_ok()
    }

    fn convert(&self, bytes: &[u8], _ctx: &ConvertContext<'_>) -> Result<String, ConversionError> {
        let text = decode_utf8(bytes, "json")?;
        let value: Value =
            serde_json::from_str(text).map_err(|e| ConversionError::malformed("json", e))?;
        let pretty =
            serde_json::to_string_pretty(&value).map_err(|e| ConversionError::Internal(e.to_string()))?;
        Ok(format!("```json\n{}\n```", pretty))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ConvertContext<'static> {
        ConvertContext {
            extension: Some("json"),
            llm: None,
        }
    }

    #[test]
    fn pretty_prints_inside_fence() {
        let md = JsonConverter.convert(br#"{"a":[1,2]}"#, &ctx()).unwrap();
        assert_eq!(md, "```json\n{\n  \"a\": [\n    1,\n    2\n  ]\n}\n```");
    }

    #[test]
    fn broken_json_is_malformed() {
        let err = JsonConverter.convert(b"{\"a\":", &ctx()).unwrap_err();
        assert!(matches!(err, ConversionError::Malformed { format: "json", .. }));
    }

    #[test]
    fn sniff_requires_container_value() {
        assert!(JsonConverter.sniff(b"  [1, 2]"));
        assert!(!JsonConverter.sniff(b"42"));
        assert!(!JsonConverter.sniff(b"{ nope"));
    }
}
