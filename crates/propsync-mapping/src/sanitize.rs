//! Value coercion for loosely typed feed fields.
//!
//! Every function here is total: malformed input degrades to an empty string
//! or zero instead of failing.

use std::sync::LazyLock;

use propsync_core::json_scalar_text;
use regex::Regex;
use scraper::{ElementRef, Html, Node};
use serde_json::Value as JsonValue;

static SCRIPT_STYLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>|<style\b[^>]*>.*?</style\s*>")
        .expect("valid script/style regex")
});
static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[a-zA-Z/!?][^>]*>").expect("valid tag regex"));
static OCTET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"%[a-fA-F0-9]{2}").expect("valid octet regex"));
static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\r\n\t ]+").expect("valid whitespace regex"));
static LEADING_NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*[+-]?(?:\d+(?:\.\d*)?|\.\d+)(?:[eE][+-]?\d+)?").expect("valid number regex")
});

/// Plain-text sanitization for a single-line field.
pub fn sanitize_text(input: &str) -> String {
    let without_blocks = SCRIPT_STYLE_RE.replace_all(input, "");
    let without_tags = TAG_RE.replace_all(&without_blocks, "");
    let escaped = without_tags.replace('<', "&lt;");

    let mut current = escaped;
    loop {
        let next = OCTET_RE.replace_all(&current, "").into_owned();
        if next == current {
            break;
        }
        current = next;
    }

    WHITESPACE_RE.replace_all(&current, " ").trim().to_string()
}

pub fn as_text(value: &JsonValue) -> String {
    json_scalar_text(value)
        .map(|s| sanitize_text(&s))
        .unwrap_or_default()
}

fn leading_number(input: &str) -> Option<f64> {
    LEADING_NUMBER_RE
        .find(input)
        .and_then(|m| m.as_str().trim().parse::<f64>().ok())
        .filter(|f| f.is_finite())
}

pub fn as_int(value: &JsonValue) -> i64 {
    match value {
        JsonValue::Number(n) => n
            .as_i64()
            .or_else(|| n.as_u64().map(|u| u.min(i64::MAX as u64) as i64))
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
            .unwrap_or(0),
        JsonValue::Bool(b) => i64::from(*b),
        JsonValue::String(s) => leading_number(s).map(|f| f.trunc() as i64).unwrap_or(0),
        JsonValue::Null | JsonValue::Array(_) | JsonValue::Object(_) => 0,
    }
}

/// Like [`as_int`] but keeps the fraction; a comma is read as the decimal separator.
pub fn as_float(value: &JsonValue) -> f64 {
    match value {
        JsonValue::Number(n) => n.as_f64().filter(|f| f.is_finite()).unwrap_or(0.0),
        JsonValue::Bool(b) => f64::from(u8::from(*b)),
        JsonValue::String(s) => leading_number(&s.replace(',', ".")).unwrap_or(0.0),
        JsonValue::Null | JsonValue::Array(_) | JsonValue::Object(_) => 0.0,
    }
}

/// Digits and dots only; may be empty.
pub fn as_price_string(value: &JsonValue) -> String {
    json_scalar_text(value)
        .map(|s| s.chars().filter(|c| c.is_ascii_digit() || *c == '.').collect())
        .unwrap_or_default()
}

/// The whole string must be a finite float, with `,` accepted as decimal separator.
pub fn parse_strict_float(input: &str) -> Option<f64> {
    let normalized = input.trim().replace(',', ".");
    if normalized.is_empty() {
        return None;
    }
    normalized.parse::<f64>().ok().filter(|f| f.is_finite())
}

/// Absolute URL with a scheme and a host.
pub fn is_valid_url(input: &str) -> bool {
    match url::Url::parse(input) {
        Ok(parsed) => parsed.host_str().map(|h| !h.is_empty()).unwrap_or(false),
        Err(_) => false,
    }
}

const ALLOWED_TAGS: &[&str] = &[
    "a", "abbr", "b", "blockquote", "br", "caption", "code", "del", "div", "em", "figcaption",
    "figure", "h1", "h2", "h3", "h4", "h5", "h6", "hr", "i", "img", "ins", "li", "ol", "p", "pre",
    "q", "s", "small", "span", "strike", "strong", "sub", "sup", "table", "tbody", "td", "tfoot",
    "th", "thead", "tr", "u", "ul",
];
const DROPPED_WITH_CONTENT: &[&str] = &[
    "script", "style", "iframe", "object", "embed", "noscript", "template", "head", "title",
    "textarea", "select", "form",
];
const VOID_TAGS: &[&str] = &["br", "hr", "img"];
const GLOBAL_ATTRS: &[&str] = &["class", "title", "lang", "dir"];
const URL_ATTRS: &[&str] = &["href", "src"];

fn allowed_attr(tag: &str, attr: &str) -> bool {
    if GLOBAL_ATTRS.contains(&attr) {
        return true;
    }
    match tag {
        "a" => matches!(attr, "href" | "target" | "rel"),
        "img" => matches!(attr, "src" | "alt" | "width" | "height"),
        "td" | "th" => matches!(attr, "colspan" | "rowspan"),
        "ol" => matches!(attr, "start" | "type"),
        "q" | "blockquote" | "del" | "ins" => attr == "cite",
        _ => false,
    }
}

fn safe_url(value: &str) -> bool {
    let trimmed = value.trim();
    let lower = trimmed.to_ascii_lowercase();
    let scheme_end = lower.find(':');
    let path_start = lower.find(['/', '?', '#']);
    match (scheme_end, path_start) {
        (None, _) => true,
        (Some(colon), Some(slash)) if slash < colon => true,
        _ => ["http:", "https:", "mailto:", "tel:"]
            .iter()
            .any(|scheme| lower.starts_with(scheme)),
    }
}

fn escape_text(text: &str, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
}

fn escape_attr(text: &str, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
}

fn write_children(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => escape_text(text, out),
            Node::Element(_) => {
                if let Some(child_element) = ElementRef::wrap(child) {
                    write_element(child_element, out);
                }
            }
            _ => {}
        }
    }
}

fn write_element(element: ElementRef<'_>, out: &mut String) {
    let tag = element.value().name();
    if DROPPED_WITH_CONTENT.contains(&tag) {
        return;
    }
    if !ALLOWED_TAGS.contains(&tag) {
        write_children(element, out);
        return;
    }

    out.push('<');
    out.push_str(tag);
    for (name, value) in element.value().attrs() {
        if !allowed_attr(tag, name) {
            continue;
        }
        if URL_ATTRS.contains(&name) && !safe_url(value) {
            continue;
        }
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        escape_attr(value, out);
        out.push('"');
    }
    out.push('>');

    if VOID_TAGS.contains(&tag) {
        return;
    }
    write_children(element, out);
    out.push_str("</");
    out.push_str(tag);
    out.push('>');
}

/// HTML sanitization for post bodies: a formatting allow-list survives,
/// active content is removed together with its children, other tags are unwrapped.
pub fn as_rich_content(input: &str) -> String {
    if input.trim().is_empty() {
        return String::new();
    }
    let fragment = Html::parse_fragment(input);
    let mut out = String::with_capacity(input.len());
    write_children(fragment.root_element(), &mut out);
    out.trim().to_string()
}
