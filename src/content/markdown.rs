//! Markdown to markup tree conversion

use lazy_static::lazy_static;
use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag};
use regex::Regex;

use super::markup::{inlines_text, Alignment, Block, Document, Inline, ListItem, TableCell};

/// Schemes a link may navigate to; anything else is rendered as text
const SAFE_SCHEMES: [&str; 3] = ["http", "https", "mailto"];

lazy_static! {
    /// Bare URLs in text, linked the way GitHub Flavored Markdown does
    static ref URL_LITERAL: Regex = Regex::new(r"(?:https?://|www\.)[^\s<>]+").unwrap();
}

/// Render a Markdown body into a markup tree.
///
/// Pure and infallible: constructs without a tree counterpart (raw HTML,
/// footnotes, task list markers) come out as plain text.
pub fn render(markdown: &str) -> Document {
    // Front-matter is stripped by the loader, so no metadata block option
    let options = Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS;

    let mut builder = TreeBuilder::new();
    for event in Parser::new_ext(markdown, options) {
        builder.event(event);
    }
    builder.finish()
}

/// Whether a link destination is safe to navigate to
pub fn is_safe_href(href: &str) -> bool {
    let href = href.trim();
    let Some(colon) = href.find(':') else {
        return true;
    };
    let scheme = &href[..colon];
    // `./a:b`, `?q=a:b` and `#a:b` are relative references, not schemes
    if scheme.contains(['/', '?', '#']) {
        return true;
    }
    SAFE_SCHEMES
        .iter()
        .any(|safe| scheme.eq_ignore_ascii_case(safe))
}

#[derive(Debug, Clone, Copy)]
enum SpanKind {
    Emphasis,
    Strong,
    Strikethrough,
}

impl SpanKind {
    fn wrap(self, content: Vec<Inline>) -> Inline {
        match self {
            SpanKind::Emphasis => Inline::Emphasis { content },
            SpanKind::Strong => Inline::Strong { content },
            SpanKind::Strikethrough => Inline::Strikethrough { content },
        }
    }
}

/// An open element while walking the event stream
#[derive(Debug)]
enum Frame {
    Root(Vec<Block>),
    BlockQuote(Vec<Block>),
    List {
        start: Option<u64>,
        items: Vec<ListItem>,
        loose: bool,
    },
    Item {
        blocks: Vec<Block>,
        loose: bool,
    },
    /// `implicit` paragraphs wrap loose inline content (tight list items)
    Paragraph {
        content: Vec<Inline>,
        implicit: bool,
    },
    Heading {
        level: u8,
        content: Vec<Inline>,
    },
    CodeBlock {
        language: Option<String>,
        code: String,
    },
    Span {
        kind: SpanKind,
        content: Vec<Inline>,
    },
    Link {
        href: String,
        title: Option<String>,
        content: Vec<Inline>,
    },
    Image {
        src: String,
        title: Option<String>,
        content: Vec<Inline>,
    },
    Table {
        align: Vec<Alignment>,
        head: Vec<TableCell>,
        rows: Vec<Vec<TableCell>>,
    },
    Row {
        head: bool,
        cells: Vec<TableCell>,
    },
    Cell(Vec<Inline>),
    /// Containers without a tree counterpart; their content flows to the parent
    Passthrough,
}

struct TreeBuilder {
    stack: Vec<Frame>,
}

impl TreeBuilder {
    fn new() -> Self {
        Self {
            stack: vec![Frame::Root(Vec::new())],
        }
    }

    fn event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            // Events nest, so every End closes the innermost open frame
            Event::End(_) => self.end(),
            Event::Text(text) => self.text(&text),
            Event::Code(code) => self.push_inline(Inline::Code {
                code: code.into_string(),
            }),
            Event::Html(html) | Event::InlineHtml(html) => self.text(&html),
            Event::SoftBreak => self.text("\n"),
            Event::HardBreak => self.push_inline(Inline::LineBreak),
            Event::Rule => {
                self.close_implicit();
                self.push_block(Block::Rule);
            }
            Event::FootnoteReference(label) => self.text(&format!("[{}]", label)),
            Event::TaskListMarker(checked) => self.text(if checked { "[x] " } else { "[ ] " }),
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        let frame = match tag {
            Tag::Paragraph => {
                self.close_implicit();
                self.mark_item_loose();
                Frame::Paragraph {
                    content: Vec::new(),
                    implicit: false,
                }
            }
            Tag::HtmlBlock => {
                self.close_implicit();
                Frame::Paragraph {
                    content: Vec::new(),
                    implicit: false,
                }
            }
            Tag::Heading { level, .. } => {
                self.close_implicit();
                let level = match level {
                    HeadingLevel::H1 => 1,
                    HeadingLevel::H2 => 2,
                    HeadingLevel::H3 => 3,
                    HeadingLevel::H4 => 4,
                    HeadingLevel::H5 => 5,
                    HeadingLevel::H6 => 6,
                };
                Frame::Heading {
                    level,
                    content: Vec::new(),
                }
            }
            Tag::BlockQuote(_) => {
                self.close_implicit();
                Frame::BlockQuote(Vec::new())
            }
            Tag::CodeBlock(kind) => {
                self.close_implicit();
                let language = match kind {
                    CodeBlockKind::Fenced(info) => {
                        info.split_whitespace().next().map(str::to_string)
                    }
                    CodeBlockKind::Indented => None,
                };
                Frame::CodeBlock {
                    language,
                    code: String::new(),
                }
            }
            Tag::List(start) => {
                self.close_implicit();
                Frame::List {
                    start,
                    items: Vec::new(),
                    loose: false,
                }
            }
            Tag::Item => {
                self.close_implicit();
                Frame::Item {
                    blocks: Vec::new(),
                    loose: false,
                }
            }
            Tag::Emphasis => Frame::Span {
                kind: SpanKind::Emphasis,
                content: Vec::new(),
            },
            Tag::Strong => Frame::Span {
                kind: SpanKind::Strong,
                content: Vec::new(),
            },
            Tag::Strikethrough => Frame::Span {
                kind: SpanKind::Strikethrough,
                content: Vec::new(),
            },
            Tag::Link {
                dest_url, title, ..
            } => Frame::Link {
                href: dest_url.into_string(),
                title: Some(title.into_string()).filter(|t| !t.is_empty()),
                content: Vec::new(),
            },
            Tag::Image {
                dest_url, title, ..
            } => Frame::Image {
                src: dest_url.into_string(),
                title: Some(title.into_string()).filter(|t| !t.is_empty()),
                content: Vec::new(),
            },
            Tag::Table(alignments) => {
                self.close_implicit();
                Frame::Table {
                    align: alignments.into_iter().map(alignment).collect(),
                    head: Vec::new(),
                    rows: Vec::new(),
                }
            }
            Tag::TableHead => Frame::Row {
                head: true,
                cells: Vec::new(),
            },
            Tag::TableRow => Frame::Row {
                head: false,
                cells: Vec::new(),
            },
            Tag::TableCell => Frame::Cell(Vec::new()),
            Tag::FootnoteDefinition(_) => {
                self.close_implicit();
                Frame::Passthrough
            }
            _ => Frame::Passthrough,
        };
        self.stack.push(frame);
    }

    fn end(&mut self) {
        // Implicit paragraphs have no Start, so an End never refers to one
        self.close_implicit();
        if self.stack.len() <= 1 {
            return;
        }
        let Some(frame) = self.stack.pop() else {
            return;
        };

        match frame {
            Frame::Root(blocks) => self.stack.push(Frame::Root(blocks)),
            Frame::Paragraph { mut content, .. } => {
                trim_trailing_newline(&mut content);
                if !content.is_empty() {
                    self.push_block(Block::Paragraph {
                        content: autolink(content),
                    });
                }
            }
            Frame::Heading { level, content } => {
                self.push_block(Block::Heading {
                    level,
                    content: autolink(content),
                });
            }
            Frame::BlockQuote(blocks) => self.push_block(Block::BlockQuote { blocks }),
            Frame::CodeBlock { language, code } => {
                self.push_block(Block::CodeBlock { language, code });
            }
            Frame::List {
                start,
                items,
                loose,
            } => self.push_block(Block::List {
                start,
                tight: !loose,
                items,
            }),
            Frame::Item { blocks, loose } => {
                if let Some(Frame::List {
                    items,
                    loose: list_loose,
                    ..
                }) = self.stack.last_mut()
                {
                    items.push(ListItem { blocks });
                    *list_loose |= loose;
                }
            }
            Frame::Span { kind, content } => self.push_inline(kind.wrap(content)),
            Frame::Link {
                href,
                title,
                content,
            } => {
                if is_safe_href(&href) {
                    self.push_inline(Inline::Link {
                        href,
                        title,
                        content,
                    });
                } else {
                    tracing::debug!("Dropping unsafe link target {:?}", href);
                    for inline in content {
                        self.push_inline(inline);
                    }
                }
            }
            Frame::Image {
                src,
                title,
                content,
            } => {
                let mut alt = String::new();
                inlines_text(&content, &mut alt);
                if is_safe_href(&src) {
                    self.push_inline(Inline::Image { src, alt, title });
                } else {
                    tracing::debug!("Dropping unsafe image source {:?}", src);
                    if !alt.is_empty() {
                        self.text(&alt);
                    }
                }
            }
            Frame::Table { align, head, rows } => {
                self.push_block(Block::Table { align, head, rows });
            }
            Frame::Row { head, cells } => {
                if let Some(Frame::Table {
                    head: table_head,
                    rows,
                    ..
                }) = self.stack.last_mut()
                {
                    if head {
                        *table_head = cells;
                    } else {
                        rows.push(cells);
                    }
                }
            }
            Frame::Cell(content) => {
                if let Some(Frame::Row { cells, .. }) = self.stack.last_mut() {
                    cells.push(autolink(content));
                }
            }
            Frame::Passthrough => {}
        }
    }

    fn text(&mut self, text: &str) {
        if let Some(Frame::CodeBlock { code, .. }) = self.stack.last_mut() {
            code.push_str(text);
            return;
        }
        self.push_inline(Inline::text(text));
    }

    fn push_inline(&mut self, inline: Inline) {
        for frame in self.stack.iter_mut().rev() {
            match frame {
                Frame::Paragraph { content, .. }
                | Frame::Heading { content, .. }
                | Frame::Span { content, .. }
                | Frame::Link { content, .. }
                | Frame::Image { content, .. }
                | Frame::Cell(content) => {
                    push_merged(content, inline);
                    return;
                }
                Frame::Passthrough => continue,
                // Whitespace between table cells
                Frame::Row { .. } | Frame::Table { .. } => return,
                _ => break,
            }
        }
        self.stack.push(Frame::Paragraph {
            content: vec![inline],
            implicit: true,
        });
    }

    fn push_block(&mut self, block: Block) {
        for frame in self.stack.iter_mut().rev() {
            match frame {
                Frame::Root(blocks) | Frame::BlockQuote(blocks) | Frame::Item { blocks, .. } => {
                    blocks.push(block);
                    return;
                }
                _ => continue,
            }
        }
    }

    fn close_implicit(&mut self) {
        if matches!(
            self.stack.last(),
            Some(Frame::Paragraph { implicit: true, .. })
        ) {
            if let Some(Frame::Paragraph { content, .. }) = self.stack.pop() {
                self.push_block(Block::Paragraph {
                    content: autolink(content),
                });
            }
        }
    }

    fn mark_item_loose(&mut self) {
        for frame in self.stack.iter_mut().rev() {
            match frame {
                Frame::Item { loose, .. } => {
                    *loose = true;
                    return;
                }
                Frame::Passthrough => continue,
                _ => return,
            }
        }
    }

    fn finish(mut self) -> Document {
        while self.stack.len() > 1 {
            self.end();
        }
        self.close_implicit();
        match self.stack.pop() {
            Some(Frame::Root(blocks)) => Document { blocks },
            _ => Document::default(),
        }
    }
}

/// Push an inline, merging adjacent text runs
fn push_merged(content: &mut Vec<Inline>, inline: Inline) {
    if let (Some(Inline::Text { text: last }), Inline::Text { text }) = (content.last_mut(), &inline)
    {
        last.push_str(text);
        return;
    }
    content.push(inline);
}

fn alignment(align: pulldown_cmark::Alignment) -> Alignment {
    match align {
        pulldown_cmark::Alignment::None => Alignment::None,
        pulldown_cmark::Alignment::Left => Alignment::Left,
        pulldown_cmark::Alignment::Center => Alignment::Center,
        pulldown_cmark::Alignment::Right => Alignment::Right,
    }
}

/// Turn bare URLs in text runs into links; existing links and code are left alone
fn autolink(content: Vec<Inline>) -> Vec<Inline> {
    let mut out = Vec::with_capacity(content.len());
    for inline in content {
        match inline {
            Inline::Text { text } => link_urls(&text, &mut out),
            Inline::Emphasis { content } => out.push(Inline::Emphasis {
                content: autolink(content),
            }),
            Inline::Strong { content } => out.push(Inline::Strong {
                content: autolink(content),
            }),
            Inline::Strikethrough { content } => out.push(Inline::Strikethrough {
                content: autolink(content),
            }),
            other => out.push(other),
        }
    }
    out
}

fn link_urls(text: &str, out: &mut Vec<Inline>) {
    let mut last = 0;
    for m in URL_LITERAL.find_iter(text) {
        // A literal starts a word, or follows an emphasis delimiter or `(`
        let starts_word = text[..m.start()]
            .chars()
            .next_back()
            .map_or(true, |c| c.is_whitespace() || matches!(c, '*' | '_' | '~' | '('));
        if !starts_word {
            continue;
        }

        let url = trim_url(m.as_str());
        let prefix = if url.starts_with("www.") {
            4
        } else {
            url.find("://").map_or(0, |i| i + 3)
        };
        if url.len() <= prefix {
            continue;
        }

        if m.start() > last {
            push_merged(out, Inline::text(&text[last..m.start()]));
        }
        let href = if url.starts_with("www.") {
            format!("http://{}", url)
        } else {
            url.to_string()
        };
        out.push(Inline::Link {
            href,
            title: None,
            content: vec![Inline::text(url)],
        });
        last = m.start() + url.len();
    }
    if last < text.len() {
        push_merged(out, Inline::text(&text[last..]));
    }
}

/// Drop trailing punctuation and unbalanced closing parentheses
fn trim_url(mut url: &str) -> &str {
    loop {
        if let Some(stripped) =
            url.strip_suffix(['?', '!', '.', ',', ':', ';', '*', '_', '~', '\'', '"'])
        {
            url = stripped;
        } else if url.ends_with(')') && url.matches('(').count() < url.matches(')').count() {
            url = &url[..url.len() - 1];
        } else {
            return url;
        }
    }
}

fn trim_trailing_newline(content: &mut Vec<Inline>) {
    if let Some(Inline::Text { text }) = content.last_mut() {
        let trimmed = text.trim_end_matches(['\n', '\r']).len();
        text.truncate(trimmed);
        if text.is_empty() {
            content.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraph(text: &str) -> Block {
        Block::Paragraph {
            content: vec![Inline::text(text)],
        }
    }

    #[test]
    fn test_headings_and_paragraphs() {
        let doc = render("# One\n\n## Two\n\n### Three\n\n#### Four\n\nBody text.");
        assert_eq!(
            doc.blocks,
            vec![
                Block::Heading {
                    level: 1,
                    content: vec![Inline::text("One")]
                },
                Block::Heading {
                    level: 2,
                    content: vec![Inline::text("Two")]
                },
                Block::Heading {
                    level: 3,
                    content: vec![Inline::text("Three")]
                },
                Block::Heading {
                    level: 4,
                    content: vec![Inline::text("Four")]
                },
                paragraph("Body text."),
            ]
        );
    }

    #[test]
    fn test_tight_unordered_list() {
        let doc = render("- one\n- *two*\n");
        assert_eq!(
            doc.blocks,
            vec![Block::List {
                start: None,
                tight: true,
                items: vec![
                    ListItem {
                        blocks: vec![paragraph("one")]
                    },
                    ListItem {
                        blocks: vec![Block::Paragraph {
                            content: vec![Inline::Emphasis {
                                content: vec![Inline::text("two")]
                            }]
                        }]
                    },
                ],
            }]
        );
    }

    #[test]
    fn test_loose_ordered_list_with_start() {
        let doc = render("3. first\n\n4. second\n");
        match &doc.blocks[..] {
            [Block::List {
                start: Some(3),
                tight: false,
                items,
            }] => {
                assert_eq!(items.len(), 2);
                assert_eq!(items[1].blocks, vec![paragraph("second")]);
            }
            other => panic!("unexpected blocks: {:?}", other),
        }
    }

    #[test]
    fn test_nested_list() {
        let doc = render("- outer\n  - inner\n");
        let Block::List { items, .. } = &doc.blocks[0] else {
            panic!("expected a list");
        };
        assert_eq!(items[0].blocks.len(), 2);
        assert_eq!(items[0].blocks[0], paragraph("outer"));
        assert!(matches!(items[0].blocks[1], Block::List { .. }));
    }

    #[test]
    fn test_fenced_and_inline_code() {
        let doc = render("Use `cargo` here.\n\n```rust title=x\nfn main() {}\n```\n");
        assert_eq!(
            doc.blocks,
            vec![
                Block::Paragraph {
                    content: vec![
                        Inline::text("Use "),
                        Inline::Code {
                            code: "cargo".to_string()
                        },
                        Inline::text(" here."),
                    ]
                },
                Block::CodeBlock {
                    language: Some("rust".to_string()),
                    code: "fn main() {}\n".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_links() {
        let doc = render("[site](https://example.com \"Home\") and [rel](/blog/x)");
        assert_eq!(
            doc.blocks,
            vec![Block::Paragraph {
                content: vec![
                    Inline::Link {
                        href: "https://example.com".to_string(),
                        title: Some("Home".to_string()),
                        content: vec![Inline::text("site")],
                    },
                    Inline::text(" and "),
                    Inline::Link {
                        href: "/blog/x".to_string(),
                        title: None,
                        content: vec![Inline::text("rel")],
                    },
                ]
            }]
        );
    }

    #[test]
    fn test_unsafe_link_becomes_text() {
        let doc = render("[click](javascript:alert(1)) now");
        assert_eq!(doc.blocks, vec![paragraph("click now")]);
    }

    #[test]
    fn test_raw_html_is_text() {
        let doc = render("<script>alert('x')</script>\n\nHello <b>there</b>");
        assert_eq!(
            doc.blocks,
            vec![
                paragraph("<script>alert('x')</script>"),
                paragraph("Hello <b>there</b>"),
            ]
        );
    }

    #[test]
    fn test_deep_headings_keep_level() {
        let doc = render("###### Six");
        assert_eq!(
            doc.blocks,
            vec![Block::Heading {
                level: 6,
                content: vec![Inline::text("Six")]
            }]
        );
    }

    #[test]
    fn test_images() {
        let doc = render("See ![a *diagram*](d.png \"Flow\").");
        assert_eq!(
            doc.blocks,
            vec![Block::Paragraph {
                content: vec![
                    Inline::text("See "),
                    Inline::Image {
                        src: "d.png".to_string(),
                        alt: "a diagram".to_string(),
                        title: Some("Flow".to_string()),
                    },
                    Inline::text("."),
                ]
            }]
        );
    }

    #[test]
    fn test_unsafe_image_becomes_alt_text() {
        let doc = render("See ![a diagram](javascript:x()).");
        assert_eq!(doc.blocks, vec![paragraph("See a diagram.")]);
    }

    #[test]
    fn test_tables() {
        let doc = render("| a | b |\n|---|--:|\n| 1 | **2** |\n| 3 | 4 |\n");
        assert_eq!(
            doc.blocks,
            vec![Block::Table {
                align: vec![Alignment::None, Alignment::Right],
                head: vec![vec![Inline::text("a")], vec![Inline::text("b")]],
                rows: vec![
                    vec![
                        vec![Inline::text("1")],
                        vec![Inline::Strong {
                            content: vec![Inline::text("2")]
                        }],
                    ],
                    vec![vec![Inline::text("3")], vec![Inline::text("4")]],
                ],
            }]
        );
    }

    #[test]
    fn test_bare_urls_become_links() {
        let doc = render("Docs at https://example.com/a_(b). Or www.rust-lang.org, thanks");
        assert_eq!(
            doc.blocks,
            vec![Block::Paragraph {
                content: vec![
                    Inline::text("Docs at "),
                    Inline::Link {
                        href: "https://example.com/a_(b)".to_string(),
                        title: None,
                        content: vec![Inline::text("https://example.com/a_(b)")],
                    },
                    Inline::text(". Or "),
                    Inline::Link {
                        href: "http://www.rust-lang.org".to_string(),
                        title: None,
                        content: vec![Inline::text("www.rust-lang.org")],
                    },
                    Inline::text(", thanks"),
                ]
            }]
        );
    }

    #[test]
    fn test_urls_in_links_and_code_stay() {
        let doc = render("[https://a.example](https://b.example) `https://c.example` xhttps://d");
        let Block::Paragraph { content } = &doc.blocks[0] else {
            panic!("expected a paragraph");
        };
        assert_eq!(
            content[0],
            Inline::Link {
                href: "https://b.example".to_string(),
                title: None,
                content: vec![Inline::text("https://a.example")],
            }
        );
        assert_eq!(
            content[2],
            Inline::Code {
                code: "https://c.example".to_string()
            }
        );
        assert_eq!(content[3], Inline::text(" xhttps://d"));
        assert_eq!(content.len(), 4);
    }

    #[test]
    fn test_task_list_marker() {
        let doc = render("- [x] done\n");
        let Block::List { items, .. } = &doc.blocks[0] else {
            panic!("expected a list");
        };
        assert_eq!(items[0].blocks, vec![paragraph("[x] done")]);
    }

    #[test]
    fn test_blockquote_rule_and_breaks() {
        let doc = render("> quoted **bold**\n\n---\n\nline one  \nline two");
        assert_eq!(
            doc.blocks,
            vec![
                Block::BlockQuote {
                    blocks: vec![Block::Paragraph {
                        content: vec![
                            Inline::text("quoted "),
                            Inline::Strong {
                                content: vec![Inline::text("bold")]
                            },
                        ]
                    }]
                },
                Block::Rule,
                Block::Paragraph {
                    content: vec![
                        Inline::text("line one"),
                        Inline::LineBreak,
                        Inline::text("line two"),
                    ]
                },
            ]
        );
    }

    #[test]
    fn test_empty_input() {
        assert!(render("").is_empty());
        assert!(render("   \n\n").is_empty());
    }

    #[test]
    fn test_safe_href() {
        assert!(is_safe_href("https://example.com"));
        assert!(is_safe_href("HTTP://example.com"));
        assert!(is_safe_href("mailto:me@example.com"));
        assert!(is_safe_href("/blog/post"));
        assert!(is_safe_href("#section"));
        assert!(is_safe_href("./a:b"));
        assert!(!is_safe_href("javascript:alert(1)"));
        assert!(!is_safe_href(" JavaScript:alert(1)"));
        assert!(!is_safe_href("data:text/html,hi"));
    }
}
