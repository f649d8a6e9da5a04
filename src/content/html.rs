//! HTML output for markup trees, with syntax highlighting

use syntect::highlighting::ThemeSet;
use syntect::html::highlighted_html_for_string;
use syntect::parsing::SyntaxSet;

use super::markup::{Alignment, Block, Document, Inline, TableCell};
use crate::config::HighlightConfig;

/// Attributes every rendered link carries: open in a new browsing
/// context that gets no handle back to this page
const LINK_ATTRS: &str = r#"target="_blank" rel="noopener noreferrer""#;

/// Writes a `Document` as an HTML fragment
pub struct HtmlWriter {
    highlighter: Option<Highlighter>,
}

struct Highlighter {
    syntax_set: SyntaxSet,
    theme_set: ThemeSet,
    theme_name: String,
}

impl HtmlWriter {
    /// Create a writer without syntax highlighting
    pub fn new() -> Self {
        Self { highlighter: None }
    }

    /// Create a writer with highlighting as configured
    pub fn with_options(config: &HighlightConfig) -> Self {
        if !config.enable {
            return Self::new();
        }
        Self {
            highlighter: Some(Highlighter {
                syntax_set: SyntaxSet::load_defaults_newlines(),
                theme_set: ThemeSet::load_defaults(),
                theme_name: config.theme.clone(),
            }),
        }
    }

    /// Render a document to HTML
    pub fn write(&self, doc: &Document) -> String {
        let mut out = String::new();
        for block in &doc.blocks {
            self.write_block(block, false, &mut out);
        }
        out
    }

    fn write_block(&self, block: &Block, tight: bool, out: &mut String) {
        match block {
            Block::Heading { level, content } => {
                out.push_str(&format!("<h{}>", level));
                write_inlines(content, out);
                out.push_str(&format!("</h{}>\n", level));
            }
            Block::Paragraph { content } if tight => {
                write_inlines(content, out);
            }
            Block::Paragraph { content } => {
                out.push_str("<p>");
                write_inlines(content, out);
                out.push_str("</p>\n");
            }
            Block::List {
                start,
                tight,
                items,
            } => {
                let tag = match start {
                    Some(1) => {
                        out.push_str("<ol>\n");
                        "ol"
                    }
                    Some(n) => {
                        out.push_str(&format!("<ol start=\"{}\">\n", n));
                        "ol"
                    }
                    None => {
                        out.push_str("<ul>\n");
                        "ul"
                    }
                };
                for item in items {
                    out.push_str("<li>");
                    for block in &item.blocks {
                        self.write_block(block, *tight, out);
                    }
                    out.push_str("</li>\n");
                }
                out.push_str(&format!("</{}>\n", tag));
            }
            Block::CodeBlock { language, code } => {
                out.push_str(&self.code_block(code, language.as_deref()));
                out.push('\n');
            }
            Block::BlockQuote { blocks } => {
                out.push_str("<blockquote>\n");
                for block in blocks {
                    self.write_block(block, false, out);
                }
                out.push_str("</blockquote>\n");
            }
            Block::Table { align, head, rows } => {
                out.push_str("<table>\n<thead>\n");
                write_row("th", head, align, out);
                out.push_str("</thead>\n");
                if !rows.is_empty() {
                    out.push_str("<tbody>\n");
                    for row in rows {
                        write_row("td", row, align, out);
                    }
                    out.push_str("</tbody>\n");
                }
                out.push_str("</table>\n");
            }
            Block::Rule => out.push_str("<hr>\n"),
        }
    }

    fn code_block(&self, code: &str, lang: Option<&str>) -> String {
        let class = lang
            .map(|l| format!(r#" class="language-{}""#, html_escape(l)))
            .unwrap_or_default();

        if let (Some(highlighter), Some(lang)) = (&self.highlighter, lang) {
            if let Some(highlighted) = highlighter.highlight(code, lang) {
                return format!(
                    r#"<figure class="highlight {}">{}</figure>"#,
                    html_escape(lang),
                    highlighted
                );
            }
        }

        format!("<pre><code{}>{}</code></pre>", class, html_escape(code))
    }
}

impl Default for HtmlWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl Highlighter {
    /// Highlighted HTML, `None` for unknown languages or themes
    fn highlight(&self, code: &str, lang: &str) -> Option<String> {
        let syntax = self
            .syntax_set
            .find_syntax_by_token(lang)
            .or_else(|| self.syntax_set.find_syntax_by_extension(lang))?;
        let Some(theme) = self.theme_set.themes.get(&self.theme_name) else {
            tracing::warn!("Unknown highlight theme {:?}", self.theme_name);
            return None;
        };

        match highlighted_html_for_string(code, &self.syntax_set, syntax, theme) {
            Ok(html) => Some(html),
            Err(e) => {
                tracing::warn!("Failed to highlight {} code block: {}", lang, e);
                None
            }
        }
    }
}

fn write_inlines(inlines: &[Inline], out: &mut String) {
    for inline in inlines {
        match inline {
            Inline::Text { text } => out.push_str(&html_escape(text)),
            Inline::Code { code } => {
                out.push_str("<code>");
                out.push_str(&html_escape(code));
                out.push_str("</code>");
            }
            Inline::Emphasis { content } => wrap("em", content, out),
            Inline::Strong { content } => wrap("strong", content, out),
            Inline::Strikethrough { content } => wrap("del", content, out),
            Inline::Link {
                href,
                title,
                content,
            } => {
                let title_attr = title
                    .as_ref()
                    .map(|t| format!(r#" title="{}""#, html_escape(t)))
                    .unwrap_or_default();
                out.push_str(&format!(
                    r#"<a href="{}"{} {}>"#,
                    html_escape(href),
                    title_attr,
                    LINK_ATTRS
                ));
                write_inlines(content, out);
                out.push_str("</a>");
            }
            Inline::Image { src, alt, title } => {
                let title_attr = title
                    .as_ref()
                    .map(|t| format!(r#" title="{}""#, html_escape(t)))
                    .unwrap_or_default();
                out.push_str(&format!(
                    r#"<img src="{}" alt="{}"{}>"#,
                    html_escape(src),
                    html_escape(alt),
                    title_attr
                ));
            }
            Inline::LineBreak => out.push_str("<br>\n"),
        }
    }
}

fn write_row(tag: &str, cells: &[TableCell], align: &[Alignment], out: &mut String) {
    out.push_str("<tr>");
    for (i, cell) in cells.iter().enumerate() {
        let style = match align.get(i) {
            Some(Alignment::Left) => r#" style="text-align: left""#,
            Some(Alignment::Center) => r#" style="text-align: center""#,
            Some(Alignment::Right) => r#" style="text-align: right""#,
            Some(Alignment::None) | None => "",
        };
        out.push_str(&format!("<{}{}>", tag, style));
        write_inlines(cell, out);
        out.push_str(&format!("</{}>", tag));
    }
    out.push_str("</tr>\n");
}

fn wrap(tag: &str, content: &[Inline], out: &mut String) {
    out.push_str(&format!("<{}>", tag));
    write_inlines(content, out);
    out.push_str(&format!("</{}>", tag));
}

/// Simple HTML escaping
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::render;

    #[test]
    fn test_write_basic_markdown() {
        let html = HtmlWriter::new().write(&render("# Hello World\n\nThis is a test."));
        assert!(html.contains("<h1>Hello World</h1>"));
        assert!(html.contains("<p>This is a test.</p>"));
    }

    #[test]
    fn test_links_are_hardened() {
        let html = HtmlWriter::new().write(&render("[x](https://example.com?a=1&b=2)"));
        assert_eq!(
            html,
            "<p><a href=\"https://example.com?a=1&amp;b=2\" target=\"_blank\" rel=\"noopener noreferrer\">x</a></p>\n"
        );
    }

    #[test]
    fn test_script_is_inert() {
        let html = HtmlWriter::new().write(&render("<script>alert(1)</script>"));
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
    }

    #[test]
    fn test_lists() {
        let writer = HtmlWriter::new();
        let html = writer.write(&render("- a\n- b\n"));
        assert_eq!(html, "<ul>\n<li>a</li>\n<li>b</li>\n</ul>\n");
        let html = writer.write(&render("5. x\n6. y\n"));
        assert!(html.contains("<ol start=\"5\">\n<li>x</li>\n<li>y</li>\n</ol>"));
    }

    #[test]
    fn test_table() {
        let html = HtmlWriter::new().write(&render("| a | b |\n|:-:|---|\n| <1> | 2 |\n"));
        assert_eq!(
            html,
            "<table>\n<thead>\n<tr><th style=\"text-align: center\">a</th><th>b</th></tr>\n</thead>\n\
             <tbody>\n<tr><td style=\"text-align: center\">&lt;1&gt;</td><td>2</td></tr>\n</tbody>\n</table>\n"
        );
    }

    #[test]
    fn test_image_attributes_escaped() {
        let html = HtmlWriter::new().write(&render("![say \"hi\"](/img/a.png)"));
        assert_eq!(
            html,
            "<p><img src=\"/img/a.png\" alt=\"say &quot;hi&quot;\"></p>\n"
        );
    }

    #[test]
    fn test_plain_code_block() {
        let html = HtmlWriter::new().write(&render("```html\n<b>x</b>\n```"));
        assert_eq!(
            html,
            "<pre><code class=\"language-html\">&lt;b&gt;x&lt;/b&gt;\n</code></pre>\n"
        );
    }

    #[test]
    fn test_highlighted_code_block() {
        let writer = HtmlWriter::with_options(&HighlightConfig::default());
        let html = writer.write(&render("```rust\nfn main() {}\n```"));
        assert!(html.contains("highlight rust"));
        assert!(html.contains("main"));
    }

    #[test]
    fn test_unknown_language_falls_back() {
        let writer = HtmlWriter::with_options(&HighlightConfig::default());
        let html = writer.write(&render("```nosuchlang\n<x>\n```"));
        assert!(html.contains("<pre><code class=\"language-nosuchlang\">&lt;x&gt;"));
    }
}
