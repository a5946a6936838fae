use serde::Deserialize;
use serde_json::Value;

use super::{ConversionError, ConvertContext, DocumentConverter};

// ── Notebook model ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct Notebook {
    cells: Vec<Cell>,
    #[serde(default)]
    metadata: Value,
}

#[derive(Debug, Deserialize)]
struct Cell {
    cell_type: String,
    #[serde(default)]
    source: Source,
}

/// nbformat allows either a single string or a list of lines.
#[derive(Debug, Default, Deserialize)]
#[serde(untagged)]
enum Source {
    Text(String),
    Lines(Vec<String>),
    #[default]
    Empty,
}

impl Source {
    fn text(&self) -> String {
        match self {
            Source::Text(s) => s.clone(),
            Source::Lines(lines) => lines.concat(),
            Source::Empty => String::new(),
        }
    }
}

// ── Converter ────────────────────────────────────────────────────────────────

/// Jupyter notebooks. Registered only when plugins are enabled.
pub(crate) struct NotebookConverter;

impl DocumentConverter for NotebookConverter {
    fn name(&self) -> &'static str {
        "ipynb"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["ipynb"]
    }

    fn sniff(&self, bytes: &[u8]) -> bool {
        match serde_json::from_slice::<Value>(bytes) {
            Ok(Value::Object(map)) => map.contains_key("nbformat") && map.contains_key("cells"),
            _ => false,
        }
    }

    fn convert(&self, bytes: &[u8], _ctx: &ConvertContext<'_>) -> Result<String, ConversionError> {
        let notebook: Notebook =
            serde_json::from_slice(bytes).map_err(|e| ConversionError::malformed("notebook", e))?;

        let language = notebook
            .metadata
            .pointer("/language_info/name")
            .and_then(Value::as_str)
            .unwrap_or("python");

        let mut blocks = Vec::new();
        if let Some(title) = notebook.metadata.get("title").and_then(Value::as_str) {
            blocks.push(format!("# {}", title.trim()));
        }

        for cell in &notebook.cells {
            let source = cell.source.text();
            let source = source.trim_end();
            if source.trim().is_empty() {
                continue;
            }
            match cell.cell_type.as_str() {
                "markdown" => blocks.push(source.to_string()),
                "code" => blocks.push(format!("```{}\n{}\n```", language, source)),
                _ => blocks.push(format!("```\n{}\n```", source)),
            }
        }

        Ok(blocks.join("\n\n"))
    }
}
