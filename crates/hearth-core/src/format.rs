//! Rule content markup.
//!
//! Rule text is plain text with three light conventions:
//! - a hyphen at the start of the text or of a line starts a numbered sub-rule
//! - `**text**` is bold and `==text==` is highlighted
//! - a line starting with `•` is a bullet item
//!
//! [`format_rule`] turns raw rule text into a structured [`FormattedRule`];
//! rendering is left to the consumer, with [`FormattedRule::to_html`] as the
//! stock renderer.

use std::fmt::Write as _;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

/// Background color of highlighted spans.
pub const HIGHLIGHT_COLOR: &str = "#fef08a";

const BULLET: char = '•';

static SUB_RULE_DELIMITER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\n)\s*-\s*").expect("valid sub-rule pattern"));

static INLINE_MARKUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*(.*?)\*\*|==(.*?)==").expect("valid inline pattern"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "text", rename_all = "lowercase")]
pub enum Span {
    Plain(String),
    Bold(String),
    Highlight(String),
}

impl Span {
    pub fn text(&self) -> &str {
        match self {
            Self::Plain(t) | Self::Bold(t) | Self::Highlight(t) => t,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "spans", rename_all = "lowercase")]
pub enum Line {
    Text(Vec<Span>),
    Bullet(Vec<Span>),
}

impl Line {
    pub fn spans(&self) -> &[Span] {
        match self {
            Self::Text(spans) | Self::Bullet(spans) => spans,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Block {
    /// 1-based sub-rule number; `None` when the rule is a single block.
    pub index: Option<usize>,
    pub lines: Vec<Line>,
}

impl Block {
    /// All spans of the block in reading order.
    pub fn spans(&self) -> impl Iterator<Item = &Span> {
        self.lines.iter().flat_map(|line| line.spans().iter())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FormattedRule {
    pub blocks: Vec<Block>,
}

/// Format raw rule content. Absent, empty and whitespace-only input all
/// produce no blocks.
pub fn format_rule<'a>(raw: impl Into<Option<&'a str>>) -> FormattedRule {
    let Some(raw) = raw.into() else {
        return FormattedRule::default();
    };
    if raw.trim().is_empty() {
        return FormattedRule::default();
    }

    let segments: Vec<&str> = SUB_RULE_DELIMITER
        .split(raw)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    if segments.len() <= 1 {
        return FormattedRule {
            blocks: vec![Block {
                index: None,
                lines: format_lines(raw),
            }],
        };
    }

    FormattedRule {
        blocks: segments
            .into_iter()
            .enumerate()
            .map(|(i, segment)| Block {
                index: Some(i + 1),
                lines: format_lines(segment),
            })
            .collect(),
    }
}

fn format_lines(text: &str) -> Vec<Line> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| match line.strip_prefix(BULLET) {
            Some(rest) => Line::Bullet(format_inline(rest.trim())),
            None => Line::Text(format_inline(line)),
        })
        .collect()
}

fn format_inline(text: &str) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut last = 0;

    for caps in INLINE_MARKUP.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        push_span(&mut spans, Span::Plain(text[last..whole.start()].to_string()));

        if let Some(bold) = caps.get(1) {
            push_span(&mut spans, Span::Bold(bold.as_str().to_string()));
        } else if let Some(highlight) = caps.get(2) {
            push_span(&mut spans, Span::Highlight(highlight.as_str().to_string()));
        }
        last = whole.end();
    }
    push_span(&mut spans, Span::Plain(text[last..].to_string()));

    spans
}

fn push_span(spans: &mut Vec<Span>, span: Span) {
    if !span.text().is_empty() {
        spans.push(span);
    }
}

impl FormattedRule {
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Text with all markup stripped. Numbered blocks keep a leading hyphen
    /// and bullets keep their bullet, so the result formats back into the
    /// same block structure.
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        for block in &self.blocks {
            for (i, line) in block.lines.iter().enumerate() {
                if !out.is_empty() {
                    out.push('\n');
                }
                if i == 0 && block.index.is_some() {
                    out.push_str("- ");
                }
                if let Line::Bullet(_) = line {
                    out.push(BULLET);
                    out.push(' ');
                }
                for span in line.spans() {
                    out.push_str(span.text());
                }
            }
        }
        out
    }

    /// Render as escaped HTML.
    pub fn to_html(&self) -> String {
        let mut html = String::new();
        for block in &self.blocks {
            match block.index {
                Some(index) => {
                    let _ = write!(
                        html,
                        r#"<div class="rule-block"><span class="rule-index">{}</span><div class="rule-body">"#,
                        index
                    );
                }
                None => html.push_str(r#"<div class="rule-block"><div class="rule-body">"#),
            }

            for line in &block.lines {
                match line {
                    Line::Text(spans) => {
                        html.push_str(r#"<div class="rule-line">"#);
                        render_spans(&mut html, spans);
                        html.push_str("</div>");
                    }
                    Line::Bullet(spans) => {
                        html.push_str(r#"<div class="rule-bullet"><span class="bullet">•</span><span>"#);
                        render_spans(&mut html, spans);
                        html.push_str("</span></div>");
                    }
                }
            }
            html.push_str("</div></div>");
        }
        html
    }
}

fn render_spans(html: &mut String, spans: &[Span]) {
    for span in spans {
        match span {
            Span::Plain(text) => escape_into(html, text),
            Span::Bold(text) => {
                html.push_str("<strong>");
                escape_into(html, text);
                html.push_str("</strong>");
            }
            Span::Highlight(text) => {
                let _ = write!(html, r#"<mark style="background-color: {};">"#, HIGHLIGHT_COLOR);
                escape_into(html, text);
                html.push_str("</mark>");
            }
        }
    }
}

fn escape_into(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(s: &str) -> Span {
        Span::Plain(s.into())
    }

    #[test]
    fn test_no_delimiters_is_one_unnumbered_block() {
        let out = format_rule("Quiet hours start at 10pm.\nNo shouting.");
        assert_eq!(out.blocks.len(), 1);
        assert_eq!(out.blocks[0].index, None);
        assert_eq!(
            out.blocks[0].lines,
            vec![
                Line::Text(vec![plain("Quiet hours start at 10pm.")]),
                Line::Text(vec![plain("No shouting.")]),
            ]
        );
    }

    #[test]
    fn test_hyphen_lines_become_numbered_blocks() {
        let out = format_rule("- A\n- B\n- C");
        let indexes: Vec<_> = out.blocks.iter().map(|b| b.index).collect();
        assert_eq!(indexes, vec![Some(1), Some(2), Some(3)]);
        let texts: Vec<_> = out.blocks.iter().map(|b| b.lines[0].spans()[0].text()).collect();
        assert_eq!(texts, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_indented_hyphens_and_leading_text() {
        let out = format_rule("Kitchen:\n   - wash up\n\n  -  take out trash");
        assert_eq!(out.blocks.len(), 3);
        assert_eq!(out.blocks[0].lines, vec![Line::Text(vec![plain("Kitchen:")])]);
        assert_eq!(out.blocks[2].lines, vec![Line::Text(vec![plain("take out trash")])]);
    }

    #[test]
    fn test_single_segment_keeps_whole_input() {
        // One hyphen item alone is not numbered, and the hyphen stays.
        let out = format_rule("- only one");
        assert_eq!(out.blocks.len(), 1);
        assert_eq!(out.blocks[0].index, None);
        assert_eq!(out.blocks[0].lines, vec![Line::Text(vec![plain("- only one")])]);
    }

    #[test]
    fn test_mid_line_hyphen_is_not_a_delimiter() {
        let out = format_rule("well-known rule - keep it");
        assert_eq!(out.blocks.len(), 1);
        assert_eq!(out.blocks[0].index, None);
    }

    #[test]
    fn test_inline_markup() {
        let out = format_rule("**bold** and ==hl==");
        let spans: Vec<_> = out.blocks[0].spans().cloned().collect();
        assert_eq!(
            spans,
            vec![Span::Bold("bold".into()), plain(" and "), Span::Highlight("hl".into())]
        );
    }

    #[test]
    fn test_inline_first_match_wins() {
        let out = format_rule("a **b ==c** d==");
        let spans: Vec<_> = out.blocks[0].spans().cloned().collect();
        assert_eq!(spans, vec![plain("a "), Span::Bold("b ==c".into()), plain(" d==")]);
    }

    #[test]
    fn test_bullets() {
        let out = format_rule("Bring:\n• **towel**\n  •soap");
        assert_eq!(
            out.blocks[0].lines,
            vec![
                Line::Text(vec![plain("Bring:")]),
                Line::Bullet(vec![Span::Bold("towel".into())]),
                Line::Bullet(vec![plain("soap")]),
            ]
        );
    }

    #[test]
    fn test_empty_inputs() {
        assert!(format_rule("").is_empty());
        assert!(format_rule(None).is_empty());
        assert!(format_rule(" \n\t ").is_empty());
    }

    #[test]
    fn test_plain_text_is_stable() {
        for raw in ["just words\nmore words", "- A\n- B", "intro\n• item"] {
            let once = format_rule(raw);
            let twice = format_rule(once.plain_text().as_str());
            assert_eq!(once, twice, "input {:?}", raw);
        }
    }

    #[test]
    fn test_html_escapes_and_styles() {
        let html = format_rule("<b> & ==x==").to_html();
        assert!(html.contains("&lt;b&gt; &amp; "));
        assert!(html.contains(r#"<mark style="background-color: #fef08a;">x</mark>"#));

        let numbered = format_rule("- one\n- **two**").to_html();
        assert!(numbered.contains(r#"<span class="rule-index">2</span>"#));
        assert!(numbered.contains("<strong>two</strong>"));
    }
}
