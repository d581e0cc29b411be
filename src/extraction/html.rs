//! HTML main-text extraction with scraper.

use std::path::Path;

use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};

use super::{ExtractionError, HtmlBackend};

/// Elements whose text is collected as body text.
const BLOCK_TAGS: &[&str] = &[
    "p", "h1", "h2", "h3", "h4", "h5", "h6", "li", "blockquote", "pre", "td", "th",
];

/// Elements whose subtree is page chrome, not content.
const BOILERPLATE_TAGS: &[&str] = &[
    "nav", "header", "footer", "aside", "form", "script", "style", "noscript", "button",
];

/// Text and metadata extracted from one HTML page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HtmlDocument {
    pub title: String,
    pub author: String,
    /// Host name of the page.
    pub source: String,
    pub date: String,
    pub text: String,
    pub images: Vec<String>,
    pub tags: Vec<String>,
    pub excerpt: String,
    pub categories: Vec<String>,
}

/// HTML backend built on the `scraper` crate.
#[derive(Debug, Clone, Default)]
pub struct ScraperHtmlBackend;

impl ScraperHtmlBackend {
    pub fn new() -> Self {
        Self
    }

    /// Extract from an HTML string.
    pub fn extract_str(&self, html: &str) -> Result<HtmlDocument, ExtractionError> {
        let document = Html::parse_document(html);

        let root = first_match(&document, "article")
            .or_else(|| first_match(&document, "main"))
            .or_else(|| first_match(&document, "body"))
            .ok_or(ExtractionError::Empty)?;

        let text = main_text(root)?;
        if text.is_empty() {
            return Err(ExtractionError::Empty);
        }

        let title = meta(&document, r#"meta[property="og:title"]"#)
            .or_else(|| first_text(&document, "title"))
            .or_else(|| first_text(&document, "h1"))
            .unwrap_or_default();
        let author = meta(&document, r#"meta[name="author"]"#)
            .or_else(|| meta(&document, r#"meta[property="article:author"]"#))
            .unwrap_or_else(|| "unknown".to_string());
        let date = meta(&document, r#"meta[property="article:published_time"]"#)
            .or_else(|| meta(&document, r#"meta[name="date"]"#))
            .or_else(|| attr(&document, "time[datetime]", "datetime"))
            .unwrap_or_default();
        let source = meta(&document, r#"meta[property="og:url"]"#)
            .or_else(|| attr(&document, r#"link[rel="canonical"]"#, "href"))
            .and_then(|u| url::Url::parse(&u).ok())
            .and_then(|u| u.host_str().map(|h| h.to_string()))
            .unwrap_or_default();
        let excerpt = meta(&document, r#"meta[name="description"]"#)
            .or_else(|| meta(&document, r#"meta[property="og:description"]"#))
            .unwrap_or_default();

        let mut tags: Vec<String> = meta(&document, r#"meta[name="keywords"]"#)
            .map(|k| {
                k.split(',')
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .collect()
            })
            .unwrap_or_default();
        for tag in meta_all(&document, r#"meta[property="article:tag"]"#) {
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        }

        Ok(HtmlDocument {
            title,
            author,
            source,
            date,
            text,
            images: images(root),
            tags,
            excerpt,
            categories: meta_all(&document, r#"meta[property="article:section"]"#),
        })
    }
}

impl HtmlBackend for ScraperHtmlBackend {
    fn extract(&self, path: &Path) -> Result<HtmlDocument, ExtractionError> {
        let raw = std::fs::read(path)?;
        self.extract_str(&String::from_utf8_lossy(&raw))
    }
}

fn selector(css: &str) -> Result<Selector, ExtractionError> {
    Selector::parse(css)
        .map_err(|e| ExtractionError::ExtractionFailed(format!("bad selector {}: {:?}", css, e)))
}

fn first_match<'a>(document: &'a Html, css: &str) -> Option<ElementRef<'a>> {
    let sel = selector(css).ok()?;
    document.select(&sel).next()
}

fn first_text(document: &Html, css: &str) -> Option<String> {
    first_match(document, css)
        .map(|e| normalize(&e.text().collect::<String>()))
        .filter(|t| !t.is_empty())
}

fn attr(document: &Html, css: &str, name: &str) -> Option<String> {
    first_match(document, css)
        .and_then(|e| e.value().attr(name))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn meta(document: &Html, css: &str) -> Option<String> {
    attr(document, css, "content")
}

fn meta_all(document: &Html, css: &str) -> Vec<String> {
    let Ok(sel) = selector(css) else {
        return Vec::new();
    };
    document
        .select(&sel)
        .filter_map(|e| e.value().attr("content"))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

/// Collapse runs of whitespace to single spaces.
fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whether any ancestor of `element` (below `root`) is a block or boilerplate element.
fn is_nested(element: ElementRef, root: ElementRef) -> bool {
    for ancestor in element.ancestors() {
        if ancestor.id() == root.id() {
            return false;
        }
        if let Some(el) = ancestor.value().as_element() {
            if BLOCK_TAGS.contains(&el.name()) || BOILERPLATE_TAGS.contains(&el.name()) {
                return true;
            }
        }
    }
    false
}

fn main_text(root: ElementRef) -> Result<String, ExtractionError> {
    let blocks = selector(&BLOCK_TAGS.join(", "))?;
    let paragraphs: Vec<String> = root
        .select(&blocks)
        .filter(|e| !is_nested(*e, root))
        .map(|e| normalize(&e.text().collect::<String>()))
        .filter(|t| !t.is_empty())
        .collect();
    Ok(paragraphs.join("\n"))
}

fn images(root: ElementRef) -> Vec<String> {
    let Ok(sel) = selector("img[src]") else {
        return Vec::new();
    };
    let mut images: Vec<String> = Vec::new();
    for src in root.select(&sel).filter_map(|e| e.value().attr("src")) {
        let src = src.trim().to_string();
        if !src.is_empty() && !images.contains(&src) {
            images.push(src);
        }
    }
    images
}
