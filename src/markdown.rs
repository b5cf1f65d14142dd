//! Converts post bodies from markdown to (unsanitized) HTML fragments.

use pulldown_cmark::{html, Options, Parser};

/// Converts markdown to HTML, appending the result to `out`. Only standard
/// CommonMark is recognized (headings, paragraphs, lists, emphasis, code,
/// links, images and raw HTML); no extensions are enabled, so tables,
/// footnotes and the like render as plain text.
///
/// Raw HTML in the source is passed through verbatim. Callers must run the
/// result through [`crate::sanitize::sanitize`] before displaying it.
pub fn to_html(out: &mut String, markdown: &str) {
    html::push_html(out, Parser::new_ext(markdown, Options::empty()));
}

#[cfg(test)]
mod test {
    use super::*;

    fn render(markdown: &str) -> String {
        let mut out = String::new();
        to_html(&mut out, markdown);
        out
    }

    #[test]
    fn test_standard_markdown() {
        assert_eq!(
            render("## Setup\n\nUse *pnpm* and `npm`.\n\n- one\n- two\n"),
            "<h2>Setup</h2>\n<p>Use <em>pnpm</em> and <code>npm</code>.</p>\n\
             <ul>\n<li>one</li>\n<li>two</li>\n</ul>\n",
        );
    }

    #[test]
    fn test_links_and_images() {
        assert_eq!(
            render("[home](https://example.org) ![logo](logo.png)"),
            "<p><a href=\"https://example.org\">home</a> \
             <img src=\"logo.png\" alt=\"logo\" /></p>\n",
        );
    }

    #[test]
    fn test_no_extensions() {
        assert_eq!(render("~~gone~~"), "<p>~~gone~~</p>\n");
    }

    #[test]
    fn test_empty() {
        assert_eq!(render(""), "");
    }
}
