//! Structured markup tree produced from a post body

use serde::Serialize;

/// A rendered post body
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Document {
    pub blocks: Vec<Block>,
}

/// Block level elements
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    /// Heading, `level` is between 1 and 6
    Heading { level: u8, content: Vec<Inline> },
    Paragraph { content: Vec<Inline> },
    /// Ordered when `start` is set, unordered otherwise
    List {
        start: Option<u64>,
        tight: bool,
        items: Vec<ListItem>,
    },
    CodeBlock {
        language: Option<String>,
        code: String,
    },
    BlockQuote { blocks: Vec<Block> },
    /// `align` has one entry per column
    Table {
        align: Vec<Alignment>,
        head: Vec<TableCell>,
        rows: Vec<Vec<TableCell>>,
    },
    Rule,
}

/// Column alignment of a table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    #[default]
    None,
    Left,
    Center,
    Right,
}

pub type TableCell = Vec<Inline>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ListItem {
    pub blocks: Vec<Block>,
}

/// Inline elements
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Inline {
    Text { text: String },
    Code { code: String },
    Emphasis { content: Vec<Inline> },
    Strong { content: Vec<Inline> },
    Strikethrough { content: Vec<Inline> },
    /// Always opened as an external navigation by the display layer
    Link {
        href: String,
        title: Option<String>,
        content: Vec<Inline>,
    },
    Image {
        src: String,
        alt: String,
        title: Option<String>,
    },
    LineBreak,
}

impl Inline {
    pub fn text(text: impl Into<String>) -> Self {
        Inline::Text { text: text.into() }
    }
}

impl Document {
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// The document's text with all markup removed, one block per line
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        for block in &self.blocks {
            block_text(block, &mut out);
        }
        out.trim_end().to_string()
    }
}

fn block_text(block: &Block, out: &mut String) {
    match block {
        Block::Heading { content, .. } | Block::Paragraph { content } => {
            inlines_text(content, out);
            out.push('\n');
        }
        Block::List { start, items, .. } => {
            for (i, item) in items.iter().enumerate() {
                match start {
                    Some(n) => out.push_str(&format!("{}. ", n + i as u64)),
                    None => out.push_str("- "),
                }
                for block in &item.blocks {
                    block_text(block, out);
                }
            }
        }
        Block::CodeBlock { code, .. } => {
            out.push_str(code);
            if !code.ends_with('\n') {
                out.push('\n');
            }
        }
        Block::BlockQuote { blocks } => {
            for block in blocks {
                block_text(block, out);
            }
        }
        Block::Table { head, rows, .. } => {
            for row in std::iter::once(head).chain(rows) {
                for (i, cell) in row.iter().enumerate() {
                    if i > 0 {
                        out.push_str(" | ");
                    }
                    inlines_text(cell, out);
                }
                out.push('\n');
            }
        }
        Block::Rule => out.push_str("---\n"),
    }
}

/// Append the text of `inlines` to `out`
pub(crate) fn inlines_text(inlines: &[Inline], out: &mut String) {
    for inline in inlines {
        match inline {
            Inline::Text { text } => out.push_str(text),
            Inline::Code { code } => out.push_str(code),
            Inline::Emphasis { content }
            | Inline::Strong { content }
            | Inline::Strikethrough { content }
            | Inline::Link { content, .. } => inlines_text(content, out),
            Inline::Image { alt, .. } => out.push_str(alt),
            Inline::LineBreak => out.push('\n'),
        }
    }
}
