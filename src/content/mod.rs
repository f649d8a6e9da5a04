//! Content module - loads, orders, selects and renders posts

mod frontmatter;
pub mod html;
pub mod loader;
mod markdown;
pub mod markup;
mod post;
mod select;
mod set;

pub use frontmatter::{parse_date_string, FrontMatter};
pub use html::HtmlWriter;
pub use loader::ContentLoader;
pub use markdown::{is_safe_href, render};
pub use markup::{Alignment, Block, Document, Inline, ListItem, TableCell};
pub use post::{slug_from_path, Post};
pub use select::{select, Resolution, Selection};
pub use set::PostSet;
