//! Boilerplate-stripping text extraction.
//!
//! Turns raw HTML into the page's main prose: scripts, styles, and
//! markup go away, entities are decoded, and short navigation-like
//! lines are dropped.

use regex::Regex;
use std::sync::OnceLock;

fn script_style_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?is)<script\b.*?</script>|<style\b.*?</style>|<noscript\b.*?</noscript>|<svg\b.*?</svg>|<head\b.*?</head>|<nav\b.*?</nav>|<footer\b.*?</footer>|<aside\b.*?</aside>|<form\b.*?</form>",
        )
        .expect("static regex")
    })
}

fn comment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<!--.*?-->").expect("static regex"))
}

fn block_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)</?(p|div|br|li|ul|ol|h[1-6]|tr|td|th|table|section|article|blockquote)[^>]*>")
            .expect("static regex")
    })
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]+>").expect("static regex"))
}

fn title_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("static regex"))
}

/// Pull the `<title>` text out of an HTML document.
pub fn extract_title(html: &str) -> Option<String> {
    let captures = title_re().captures(html)?;
    let title = decode_entities(captures.get(1)?.as_str()).trim().to_string();
    (!title.is_empty()).then_some(title)
}

/// Extract the main text of an HTML document.
///
/// Lines shorter than `min_line_chars` are treated as navigation or
/// chrome and dropped; the result is truncated to `max_chars` on a
/// char boundary.
pub fn extract_text(html: &str, max_chars: usize) -> String {
    let without_blocks = script_style_re().replace_all(html, " ");
    let without_comments = comment_re().replace_all(&without_blocks, " ");
    let with_breaks = block_tag_re().replace_all(&without_comments, "\n");
    let stripped = tag_re().replace_all(&with_breaks, " ");
    let decoded = decode_entities(&stripped);

    let min_line_chars = 40;
    let mut text = String::with_capacity(decoded.len().min(max_chars));
    for line in decoded.lines() {
        let line = collapse_whitespace(line);
        if line.len() < min_line_chars {
            continue;
        }
        if !text.is_empty() {
            text.push('\n');
        }
        text.push_str(&line);
        if text.len() >= max_chars {
            break;
        }
    }

    truncate_at_boundary(text, max_chars)
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_at_boundary(mut s: String, max_chars: usize) -> String {
    if s.len() <= max_chars {
        return s;
    }
    let mut cut = max_chars;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    s.truncate(cut);
    s
}

fn decode_entities(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_scripts_and_tags() {
        let html = r#"
            <html><head><title>Voyager 1</title></head>
            <body>
              <script>var tracking = "evil";</script>
              <nav><a href="/">Home</a></nav>
              <p>The Voyager 1 space probe was launched by NASA on September 5, 1977.</p>
              <p>It remains the most distant human-made object from Earth to this day.</p>
            </body></html>
        "#;
        let text = extract_text(html, 10_000);
        assert!(text.contains("launched by NASA on September 5, 1977"));
        assert!(!text.contains("tracking"));
        assert!(!text.contains("<p>"));
        assert!(!text.contains("Home"));
    }

    #[test]
    fn test_extract_title() {
        let html = "<html><head><title>  Voyager &amp; Friends </title></head></html>";
        assert_eq!(extract_title(html), Some("Voyager & Friends".to_string()));
        assert_eq!(extract_title("<html></html>"), None);
    }

    #[test]
    fn test_short_lines_dropped() {
        let html = "<p>Menu</p><p>This sentence is long enough to count as real page content here.</p>";
        let text = extract_text(html, 10_000);
        assert!(!text.contains("Menu"));
        assert!(text.contains("long enough"));
    }

    #[test]
    fn test_truncation_bound() {
        let long = format!("<p>{}</p>", "word ".repeat(5_000));
        let text = extract_text(&long, 500);
        assert!(text.len() <= 500);
    }
}
