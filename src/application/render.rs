//! Markdown rendering backed by comrak.

use comrak::{markdown_to_html, options::Options};

use crate::domain::posts::MarkdownRenderer;

/// GitHub-flavoured markdown renderer. Raw HTML in posts is escaped.
pub struct ComrakRenderer {
    options: Options<'static>,
}

impl ComrakRenderer {
    pub fn new() -> Self {
        let mut options = Options::default();

        let ext = &mut options.extension;
        ext.strikethrough = true;
        ext.table = true;
        ext.autolink = true;
        ext.tasklist = true;
        ext.footnotes = true;

        let render = &mut options.render;
        render.github_pre_lang = true;
        render.escape = true;

        Self { options }
    }
}

impl Default for ComrakRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkdownRenderer for ComrakRenderer {
    fn render(&self, markdown: &str) -> String {
        markdown_to_html(markdown, &self.options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_paragraphs() {
        let html = ComrakRenderer::new().render("Hello, world!");
        assert_eq!(html, "<p>Hello, world!</p>\n");
    }

    #[test]
    fn escapes_raw_html() {
        let html = ComrakRenderer::new().render("<script>alert(1)</script>");
        assert!(!html.contains("<script>"));
    }
}
