//! Seams between the site builder and its rendering collaborators.

use crate::error::Result;
use crate::types::{Node, RenderedNote, TitleMap};
use crate::views::Page;

/// Turns a note's source into body HTML, a table of contents and its `id:` links.
pub trait MarkupRenderer {
    /// Render `node`. `titles` holds every published note, for link labels.
    fn render_note(&self, node: &Node, titles: &TitleMap) -> Result<RenderedNote>;
}

/// Renders a page view model to a complete HTML document.
pub trait PageTemplates {
    fn render(&self, page: &Page) -> Result<String>;
}
