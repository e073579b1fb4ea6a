use std::sync::OnceLock;

use regex::Regex;

use crate::ScriptElement;

/// Markup with its `<script>` elements lifted out, scripts in document order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScannedMarkup {
    pub markup: String,
    pub scripts: Vec<ScriptElement>,
}

fn script_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?is)<script\b([^>]*)>(.*?)</script\s*>").expect("script pattern is valid")
    })
}

fn src_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?i)(?:^|\s)src\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#)
            .expect("src pattern is valid")
    })
}

/// Splits `markup` into script-free markup plus the scripts it contained.
/// An element with a `src` attribute becomes an external script and its body
/// is dropped, as a browser would.
pub fn extract_scripts(markup: &str) -> ScannedMarkup {
    let mut scripts = Vec::new();
    let mut stripped = String::with_capacity(markup.len());
    let mut cursor = 0;

    for captures in script_pattern().captures_iter(markup) {
        let Some(whole) = captures.get(0) else {
            continue;
        };
        stripped.push_str(&markup[cursor..whole.start()]);
        cursor = whole.end();

        let attributes = captures.get(1).map(|m| m.as_str()).unwrap_or("");
        let body = captures.get(2).map(|m| m.as_str()).unwrap_or("");
        match script_src(attributes) {
            Some(src) => scripts.push(ScriptElement::external(src)),
            None => scripts.push(ScriptElement::inline(body)),
        }
    }
    stripped.push_str(&markup[cursor..]);

    ScannedMarkup {
        markup: stripped,
        scripts,
    }
}

/// Escapes text for interpolation into element content or a quoted
/// attribute.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn script_src(attributes: &str) -> Option<String> {
    let captures = src_pattern().captures(attributes)?;
    let value = captures
        .get(1)
        .or_else(|| captures.get(2))
        .or_else(|| captures.get(3))?
        .as_str()
        .trim();
    (!value.is_empty()).then(|| value.to_string())
}
