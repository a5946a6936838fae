use super::{ConversionError, ConvertContext, DocumentConverter};

const DESCRIPTION_PROMPT: &str = "Write a detailed caption for this image.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ImageKind {
    Png,
    Jpeg,
    Gif,
    Webp,
}

impl ImageKind {
    fn detect(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some(ImageKind::Png)
        } else if bytes.starts_with(&[0xff, 0xd8, 0xff]) {
            Some(ImageKind::Jpeg)
        } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            Some(ImageKind::Gif)
        } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            Some(ImageKind::Webp)
        } else {
            None
        }
    }

    fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "png" => Some(ImageKind::Png),
            "jpg" | "jpeg" => Some(ImageKind::Jpeg),
            "gif" => Some(ImageKind::Gif),
            "webp" => Some(ImageKind::Webp),
            _ => None,
        }
    }

    fn mime(self) -> &'static str {
        match self {
            ImageKind::Png => "image/png",
            ImageKind::Jpeg => "image/jpeg",
            ImageKind::Gif => "image/gif",
            ImageKind::Webp => "image/webp",
        }
    }
}

/// Images carry no text of their own; with an LLM configured they get a
/// generated description, otherwise the Markdown is empty.
pub(crate) struct ImageConverter;

impl DocumentConverter for ImageConverter {
    fn name(&self) -> &'static str {
        "image"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["png", "jpg", "jpeg", "gif", "webp"]
    }

    fn sniff(&self, bytes: &[u8]) -> bool {
        ImageKind::detect(bytes).is_some()
    }

    fn convert(&self, bytes: &[u8], ctx: &ConvertContext<'_>) -> Result<String, ConversionError> {
        let kind = ImageKind::detect(bytes)
            .ok_or_else(|| ConversionError::malformed("image", "unrecognised image signature"))?;

        if let Some(claimed) = ctx.extension.and_then(ImageKind::from_extension) {
            if claimed != kind {
                return Err(ConversionError::malformed(
                    "image",
                    format!(
                        "content is {} but the file claims .{}",
                        kind.mime(),
                        ctx.extension.unwrap_or("")
                    ),
                ));
            }
        }

        let Some(llm) = ctx.llm else {
            return Ok(String::new());
        };

        let description = llm.describe_image(bytes, kind.mime(), DESCRIPTION_PROMPT)?;
        Ok(format!("# Description:\n{}", description.trim()))
    }
}
