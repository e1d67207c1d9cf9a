//! Fetched body → `ContentFormat` conversion.

use std::io::Cursor;
use websolve_core::{ContentFormat, Error, Result};

/// Column width for html2text markdown rendering.
pub const MARKDOWN_WIDTH: usize = 100;

/// Render HTML as markdown-flavoured text.
pub fn html_to_markdown(html: &str, width: usize) -> String {
    // html2text expects bytes; Cursor avoids allocating a second large buffer.
    html2text::from_read(Cursor::new(html.as_bytes()), width).unwrap_or_else(|_| html.to_string())
}

fn norm_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Best-effort guess for whether bytes are HTML-ish.
pub fn bytes_look_like_html(bytes: &[u8]) -> bool {
    let mut i = 0usize;
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    if i >= bytes.len() {
        return false;
    }
    let rest = bytes[i..].get(..9).unwrap_or(&bytes[i..]).to_ascii_lowercase();
    ["<!doctype", "<html", "<head", "<body"]
        .iter()
        .any(|p| rest.starts_with(p.as_bytes()))
}

fn content_type_lc_prefix(ct: Option<&str>) -> String {
    ct.unwrap_or("")
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

fn is_html_type(ct: &str) -> bool {
    matches!(ct, "text/html" | "application/xhtml+xml")
}

fn is_textual_type(ct: &str) -> bool {
    ct.starts_with("text/")
        || ct.ends_with("+json")
        || ct.ends_with("+xml")
        || matches!(
            ct,
            "application/json" | "application/xml" | "application/javascript"
        )
}

fn strip_tag_blocks(html: &str, tag: &str) -> String {
    // Removes <tag ...> ... </tag> only when a close tag is found; ASCII-case-insensitive.
    let open_pat = format!("<{}", tag.to_ascii_lowercase());
    let close_pat = format!("</{}>", tag.to_ascii_lowercase());

    let mut out = String::new();
    let mut i = 0usize;
    let lower = html.to_ascii_lowercase();
    while let Some(rel_start) = lower[i..].find(&open_pat) {
        let start = i + rel_start;
        let after_open = start + open_pat.len();
        // `<s` must not swallow `<section>`.
        let boundary = lower[after_open..]
            .chars()
            .next()
            .map_or(true, |c| c == '>' || c == '/' || c.is_ascii_whitespace());
        if !boundary {
            out.push_str(&html[i..after_open]);
            i = after_open;
            continue;
        }
        if let Some(rel_end) = lower[after_open..].find(&close_pat) {
            out.push_str(&html[i..start]);
            i = after_open + rel_end + close_pat.len();
        } else {
            break;
        }
    }
    out.push_str(&html[i..]);
    out
}

/// HTML with script, style and noscript blocks removed.
pub fn clean_html(html: &str) -> String {
    ["script", "style", "noscript"]
        .iter()
        .fold(html.to_string(), |acc, tag| strip_tag_blocks(&acc, tag))
}

pub fn page_title(html: &str) -> Option<String> {
    let doc = html_scraper::Html::parse_document(html);
    let sel = html_scraper::Selector::parse("title").ok()?;
    let el = doc.select(&sel).next()?;
    let t = norm_ws(&el.text().collect::<String>());
    (!t.is_empty()).then_some(t)
}

/// All text nodes, whitespace-normalized. Expects already-cleaned HTML.
pub fn visible_text(html: &str) -> String {
    let doc = html_scraper::Html::parse_document(html);
    let parts: Vec<&str> = doc
        .root_element()
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect();
    norm_ws(&parts.join(" "))
}

#[derive(Debug, Clone, PartialEq)]
pub struct Converted {
    pub title: Option<String>,
    pub content: String,
}

/// Convert a fetched body to the requested format.
///
/// Non-HTML textual bodies come back as-is for every format. Binary bodies are
/// `NotSupported` unless `raw` is set.
pub fn convert(
    bytes: &[u8],
    content_type: Option<&str>,
    url: &str,
    format: ContentFormat,
    raw: bool,
    truncated: bool,
) -> Result<Converted> {
    let body = String::from_utf8_lossy(bytes);
    if raw {
        return Ok(Converted {
            title: None,
            content: body.into_owned(),
        });
    }

    let ct = content_type_lc_prefix(content_type);
    let sniffable = ct.is_empty() || ct == "text/plain";
    let is_html = is_html_type(&ct) || (sniffable && bytes_look_like_html(bytes));
    if !is_html {
        if ct.is_empty() || is_textual_type(&ct) {
            return Ok(Converted {
                title: None,
                content: body.into_owned(),
            });
        }
        return Err(Error::NotSupported(format!(
            "cannot convert content type {ct:?}; use raw=true"
        )));
    }

    let cleaned = clean_html(&body);
    let title = page_title(&cleaned);
    let content = match format {
        ContentFormat::Html => cleaned,
        ContentFormat::Text => visible_text(&cleaned),
        ContentFormat::Markdown => html_to_markdown(&cleaned, MARKDOWN_WIDTH),
        ContentFormat::Json => {
            let doc = serde_json::json!({
                "url": url,
                "title": title,
                "content": visible_text(&cleaned),
                "html": cleaned,
                "markdown": html_to_markdown(&cleaned, MARKDOWN_WIDTH),
                "metadata": {
                    "length": bytes.len(),
                    "format": "json",
                    "truncated": truncated,
                },
            });
            serde_json::to_string_pretty(&doc)
                .map_err(|e| Error::MalformedContent(e.to_string()))?
        }
    };
    tracing::debug!(
        format = format.as_str(),
        chars = content.chars().count(),
        "converted page"
    );
    Ok(Converted { title, content })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const PAGE: &str = r#"<!DOCTYPE html>
<html><head><title> Fix   E0502 </title>
<style>body { color: red }</style>
<script type="text/javascript">var secret = 1;</script></head>
<body><h1>Borrow checker</h1>
<p>Use a   scoped block.</p>
<noscript>enable js</noscript>
<section><p>Second section</p></section>
</body></html>"#;

    fn page(format: ContentFormat) -> Converted {
        let ct = Some("text/html; charset=utf-8");
        convert(PAGE.as_bytes(), ct, "https://x/page", format, false, false).unwrap()
    }

    #[test]
    fn clean_html_drops_script_style_noscript() {
        let c = clean_html(PAGE);
        assert!(!c.contains("secret"));
        assert!(!c.contains("color: red"));
        assert!(!c.contains("enable js"));
        assert!(c.contains("<section>"), "similar tag names survive");
        assert!(c.contains("Borrow checker"));
    }

    #[test]
    fn strip_tag_blocks_is_case_insensitive_and_needs_a_close_tag() {
        assert_eq!(strip_tag_blocks("a<SCRIPT>x</script>b", "script"), "ab");
        let open = "a<script>never closed";
        assert_eq!(strip_tag_blocks(open, "script"), open);
    }

    #[test]
    fn text_format_is_whitespace_normalized() {
        let c = page(ContentFormat::Text);
        assert_eq!(c.title.as_deref(), Some("Fix E0502"));
        assert!(c.content.contains("Use a scoped block."));
        assert!(c.content.contains("Second section"));
        assert!(!c.content.contains("secret"));
        assert!(!c.content.contains("  "));
    }

    #[test]
    fn markdown_and_html_formats() {
        let md = page(ContentFormat::Markdown);
        assert!(md.content.contains("Borrow checker"));
        assert!(!md.content.contains("secret"));

        let html = page(ContentFormat::Html);
        assert!(html.content.contains("<h1>Borrow checker</h1>"));
        assert!(!html.content.contains("<script"));
    }

    #[test]
    fn json_format_carries_all_renderings() {
        let c = convert(
            PAGE.as_bytes(),
            Some("text/html"),
            "https://x/page",
            ContentFormat::Json,
            false,
            true,
        )
        .unwrap();
        let v: serde_json::Value = serde_json::from_str(&c.content).unwrap();
        assert_eq!(v["url"], "https://x/page");
        assert_eq!(v["title"], "Fix E0502");
        assert!(v["content"].as_str().unwrap().contains("scoped block"));
        assert!(v["html"].as_str().unwrap().contains("<h1>"));
        assert!(v["markdown"].as_str().unwrap().contains("Borrow checker"));
        assert_eq!(v["metadata"]["format"], "json");
        assert_eq!(v["metadata"]["length"], PAGE.len());
        assert_eq!(v["metadata"]["truncated"], true);
    }

    #[test]
    fn raw_and_non_html_bodies_pass_through() {
        let raw = convert(
            PAGE.as_bytes(),
            Some("text/html"),
            "https://x",
            ContentFormat::Markdown,
            true,
            false,
        )
        .unwrap();
        assert_eq!(raw.content, PAGE);

        let js = br#"{"a": 1}"#;
        for f in [ContentFormat::Markdown, ContentFormat::Text, ContentFormat::Json] {
            let c = convert(js, Some("application/json"), "https://x", f, false, false).unwrap();
            assert_eq!(c.content, r#"{"a": 1}"#);
        }
    }

    #[test]
    fn sniffed_html_without_content_type_is_converted() {
        let body = b"  <html><body><p>hi</p></body></html>";
        let c = convert(body, None, "https://x", ContentFormat::Text, false, false).unwrap();
        assert_eq!(c.content, "hi");
    }

    #[test]
    fn binary_bodies_are_not_supported() {
        let png = b"\x89PNG\r\n\x1a\n\x00\x00\x00\x0dIHDR";
        let err = convert(png, Some("image/png"), "https://x", ContentFormat::Text, false, false)
            .unwrap_err();
        assert!(matches!(err, Error::NotSupported(_)));
    }

    #[test]
    fn bytes_look_like_html_sniffs_common_prefixes() {
        assert!(bytes_look_like_html(b"<!doctype html><html>"));
        assert!(bytes_look_like_html(b"   <HTML><body>x</body></html>"));
        assert!(!bytes_look_like_html(br#"{"a":1}"#));
        assert!(!bytes_look_like_html(b""));
    }

    proptest! {
        #[test]
        fn clean_html_never_panics(s in "\\PC{0,200}") {
            let _ = clean_html(&s);
        }
    }
}
