use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use super::csv::escape_cell;
use super::text::decode_utf8;
use super::{ConversionError, ConvertContext, DocumentConverter};

// ── Lazy static regexes ──────────────────────────────────────────────────────

static HTML_START_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(<\?xml[^>]*>\s*)?(<!--.*?-->\s*)*<(!doctype\s+html|html)\b").unwrap());

static MULTI_NEWLINE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

static BODY_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("body").unwrap());
static TITLE_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("title").unwrap());
static ROW_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("tr").unwrap());

// ── Walk context ─────────────────────────────────────────────────────────────

#[derive(Clone, Copy)]
struct WalkCtx {
    list_depth: usize,
}

// ── Converter ────────────────────────────────────────────────────────────────

pub(crate) struct HtmlConverter;

impl DocumentConverter for HtmlConverter {
    fn name(&self) -> &'static str {
        "html"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["html", "htm", "xhtml"]
    }

    fn sniff(&self, bytes: &[u8]) -> bool {
        let head = &bytes[..bytes.len().min(1024)];
        let head = String::from_utf8_lossy(head);
        HTML_START_RE.is_match(&head)
    }

    fn convert(&self, bytes: &[u8], _ctx: &ConvertContext<'_>) -> Result<String, ConversionError> {
        let html = decode_utf8(bytes, "html")?;
        Ok(html_to_markdown(html))
    }
}

// ── Main conversion pipeline ─────────────────────────────────────────────────

pub(crate) fn html_to_markdown(html: &str) -> String {
    let document = Html::parse_document(html);

    let title = document
        .select(&TITLE_SEL)
        .next()
        .map(|el| normalize_text(&collect_text(el)))
        .filter(|s| !s.is_empty());

    let ctx = WalkCtx { list_depth: 0 };
    let markdown = match document.select(&BODY_SEL).next() {
        Some(body) => walk_children(body, ctx),
        None => walk_children(document.root_element(), ctx),
    };

    // Collapse runs of 3+ newlines and trim.
    let markdown = MULTI_NEWLINE_RE
        .replace_all(&markdown, "\n\n")
        .trim()
        .to_string();

    match title.as_deref() {
        Some(t) => ensure_markdown_title(&markdown, t),
        None => markdown,
    }
}

// ── DOM tree walker → Markdown ───────────────────────────────────────────────

fn walk_element(el: ElementRef<'_>, ctx: WalkCtx) -> String {
    let name = el.value().name();

    // Hard-skip tags.
    if matches!(
        name,
        "head"
            | "script"
            | "style"
            | "noscript"
            | "template"
            | "svg"
            | "form"
            | "button"
            | "iframe"
            | "audio"
            | "video"
    ) {
        return String::new();
    }

    // Skip layout / navigation chrome.
    if matches!(name, "nav" | "aside") {
        return String::new();
    }

    if el.value().attr("hidden").is_some() || el.value().attr("aria-hidden") == Some("true") {
        return String::new();
    }

    match name {
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            let level = name[1..].parse::<usize>().unwrap_or(1);
            let text = normalize_text(&walk_children(el, ctx));
            if text.is_empty() {
                return String::new();
            }
            format!("\n\n{} {}\n\n", "#".repeat(level), text)
        }

        "img" => {
            let Some(src) = el.value().attr("src").map(str::trim).filter(|s| !s.is_empty()) else {
                return String::new();
            };
            // Drop inline data URIs.
            let src = if src.starts_with("data:") { "" } else { src };
            let alt = el.value().attr("alt").map(str::trim).unwrap_or("");
            format!("![{}]({})", alt, src)
        }

        "a" => {
            let content = walk_children(el, ctx);
            let trimmed = content.trim();
            if trimmed.is_empty() {
                return String::new();
            }
            match el.value().attr("href").map(str::trim) {
                Some(href) if !href.is_empty() && !href.starts_with("javascript:") => {
                    format!("[{}]({})", trimmed, href)
                }
                _ => trimmed.to_string(),
            }
        }

        "p" | "div" | "section" | "article" | "main" | "header" | "footer" | "address" => {
            let content = walk_children(el, ctx);
            let trimmed = content.trim();
            if trimmed.is_empty() {
                return String::new();
            }
            format!("\n\n{}\n\n", trimmed)
        }

        "br" => "  \n".to_string(),
        "hr" => "\n\n---\n\n".to_string(),

        "ul" => handle_list(el, ctx, false),
        "ol" => handle_list(el, ctx, true),

        "strong" | "b" => wrap_inline(el, ctx, "**"),
        "em" | "i" => wrap_inline(el, ctx, "*"),
        "del" | "s" | "strike" => wrap_inline(el, ctx, "~~"),

        "blockquote" => {
            let content = walk_children(el, ctx);
            let content = MULTI_NEWLINE_RE.replace_all(content.trim(), "\n\n");
            let quoted = content
                .lines()
                .map(|l| if l.is_empty() { ">".to_string() } else { format!("> {}", l) })
                .collect::<Vec<_>>()
                .join("\n");
            format!("\n\n{}\n\n", quoted)
        }

        "pre" => {
            let text = collect_text(el);
            let language = find_first_tag(el, "code")
                .and_then(|code| {
                    code.value()
                        .classes()
                        .find_map(|c| c.strip_prefix("language-"))
                        .map(str::to_string)
                })
                .unwrap_or_default();
            format!("\n\n```{}\n{}\n```\n\n", language, text.trim_end_matches('\n'))
        }

        "code" => {
            let text = collect_text(el);
            if text.contains('`') {
                format!("`` {} ``", text)
            } else {
                format!("`{}`", text)
            }
        }

        "table" => handle_table(el, ctx),

        _ => walk_children(el, ctx),
    }
}

fn walk_children(el: ElementRef<'_>, ctx: WalkCtx) -> String {
    use scraper::node::Node;
    let mut result = String::new();
    for child in el.children() {
        match child.value() {
            Node::Text(text) => push_text(&mut result, &text.text),
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    result.push_str(&walk_element(child_el, ctx));
                }
            }
            _ => {}
        }
    }
    result
}

/// Append a text node with HTML whitespace rules: runs collapse to one
/// space and nothing leads a fresh line.
fn push_text(out: &mut String, raw: &str) {
    let collapsed = WHITESPACE_RE.replace_all(raw, " ");
    let collapsed: &str = &collapsed;
    let at_line_start = out.is_empty() || out.ends_with('\n') || out.ends_with(' ');
    let text = if at_line_start {
        collapsed.trim_start()
    } else {
        collapsed
    };
    out.push_str(text);
}

fn wrap_inline(el: ElementRef<'_>, ctx: WalkCtx, marker: &str) -> String {
    let content = walk_children(el, ctx);
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    format!("{}{}{}", marker, trimmed, marker)
}

// ── Element-specific handlers ────────────────────────────────────────────────

fn handle_list(el: ElementRef<'_>, ctx: WalkCtx, ordered: bool) -> String {
    use scraper::node::Node;
    let indent = "  ".repeat(ctx.list_depth);
    let child_ctx = WalkCtx {
        list_depth: ctx.list_depth + 1,
    };
    let mut result = String::new();
    let mut idx = el
        .value()
        .attr("start")
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(1);

    for child in el.children() {
        if let Node::Element(_) = child.value() {
            if let Some(child_el) = ElementRef::wrap(child) {
                if child_el.value().name() != "li" {
                    continue;
                }
                let content = walk_children(child_el, child_ctx);
                let content = MULTI_NEWLINE_RE.replace_all(content.trim(), "\n");
                if content.is_empty() {
                    continue;
                }
                let marker = if ordered {
                    let m = format!("{}.", idx);
                    idx += 1;
                    m
                } else {
                    "-".to_string()
                };
                // Nested lists come back already indented; only the first line gets the marker.
                let mut lines = content.lines();
                if let Some(first) = lines.next() {
                    result.push_str(&format!("{}{} {}\n", indent, marker, first.trim()));
                }
                for line in lines.filter(|l| !l.trim().is_empty()) {
                    if line.starts_with(' ') {
                        result.push_str(&format!("{}\n", line));
                    } else {
                        result.push_str(&format!("{}  {}\n", indent, line));
                    }
                }
            }
        }
    }

    if result.is_empty() {
        return result;
    }
    if ctx.list_depth == 0 {
        format!("\n\n{}\n", result)
    } else {
        format!("\n{}", result)
    }
}

fn handle_table(el: ElementRef<'_>, ctx: WalkCtx) -> String {
    let mut rows: Vec<Vec<String>> = Vec::new();

    for row in el.select(&ROW_SEL) {
        // Skip rows that belong to a nested table.
        if nearest_table(row).map(|t| t.id()) != Some(el.id()) {
            continue;
        }
        let cells: Vec<String> = row
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|c| matches!(c.value().name(), "td" | "th"))
            .map(|c| escape_cell(&normalize_text(&walk_children(c, ctx))))
            .collect();
        if !cells.is_empty() {
            rows.push(cells);
        }
    }

    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    if width == 0 {
        return String::new();
    }

    let mut out = String::from("\n\n");
    for (idx, row) in rows.iter().enumerate() {
        let cells: Vec<&str> = (0..width)
            .map(|i| row.get(i).map(String::as_str).unwrap_or(""))
            .collect();
        out.push_str(&format!("| {} |\n", cells.join(" | ")));
        if idx == 0 {
            out.push_str(&format!("|{}\n", " --- |".repeat(width)));
        }
    }
    out.push('\n');
    out
}

fn nearest_table<'a>(el: ElementRef<'a>) -> Option<ElementRef<'a>> {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|a| a.value().name() == "table")
}

// ── Markdown post-processing ─────────────────────────────────────────────────

/// Give the document a top-level heading from `<title>` unless the body
/// already opens with one.
fn ensure_markdown_title(markdown: &str, title: &str) -> String {
    let expected = format!("# {}", title);
    let mut lines: Vec<&str> = markdown.lines().collect();

    if let Some(idx) = lines.iter().position(|l| !l.trim().is_empty()) {
        let first = lines[idx].trim();
        if first.starts_with("# ") {
            return markdown.to_string();
        }
        if first == title {
            lines[idx] = &expected;
            return lines.join("\n");
        }
    }

    if markdown.is_empty() {
        expected
    } else {
        format!("{}\n\n{}", expected, markdown)
    }
}

// ── DOM utility helpers ──────────────────────────────────────────────────────

/// Recursively collect all text from an element and its descendants.
fn collect_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>()
}

/// Collapse whitespace and trim.
fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Depth-first search for the first element with the given tag name.
fn find_first_tag<'a>(el: ElementRef<'a>, tag: &str) -> Option<ElementRef<'a>> {
    el.descendants()
        .skip(1)
        .filter_map(ElementRef::wrap)
        .find(|d| d.value().name() == tag)
}
