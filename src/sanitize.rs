//! A small HTML sanitizer for rendered post bodies.
//!
//! This is an allow-by-default sanitizer that blocks three specific script
//! injection vectors and passes everything else through:
//!
//! 1. `<script>` and `<style>` elements, which are dropped together with
//!    their contents.
//! 2. Event handler attributes (any attribute whose name starts with `on`).
//! 3. `href`, `src` and `xlink:href` attributes holding a `javascript:` URL,
//!    checked after character references are resolved.
//!
//! The input is parsed permissively into a tree (unclosed elements are
//! closed at the end of input, unmatched end tags are ignored), cleaned, and
//! serialized again. The output is written from the tree alone: tag and
//! attribute names are validated, attribute values are re-escaped, and text
//! never carries a raw `<`, so a browser reads back exactly the markup that
//! was cleaned. Comments and CDATA sections are dropped, as are declarations,
//! and input the reader cannot make sense of is dropped rather than copied
//! to the output raw. Sanitizing is idempotent.

use log::debug;
use quick_xml::escape::{resolve_html5_entity, unescape_with};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::mem;

/// Elements that never have children or an end tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link",
    "meta", "param", "source", "track", "wbr",
];

/// Elements whose content is raw text rather than markup. These are also
/// exactly the elements the sanitizer removes.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

/// Attributes that may carry a URL.
const URL_ATTRIBUTES: &[&str] = &["href", "src", "xlink:href"];

/// Sanitizes an HTML fragment. See the module documentation for the policy.
pub fn sanitize(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    for node in clean(parse(html)) {
        node.write(&mut out);
    }
    out
}

#[derive(Debug, PartialEq)]
enum Node {
    Element(Element),

    /// Escaped text, written back verbatim. Never contains `<` or a dangling
    /// `&`.
    Text(String),
}

#[derive(Debug, PartialEq)]
struct Element {
    name: String,

    /// Names with their decoded values.
    attributes: Vec<(String, String)>,
    children: Vec<Node>,
}

impl Element {
    /// Builds an element from the inside of a start tag (between `<` and
    /// `>`). Returns `None` if the tag has no valid element name.
    fn from_tag(raw: &str) -> Option<Element> {
        let (name, attributes) = split_tag(raw);
        if !is_element_name(name) {
            debug!("dropping tag with invalid name `{}`", name);
            return None;
        }

        let mut element = Element {
            name: name.to_owned(),
            attributes: Vec::new(),
            children: Vec::new(),
        };
        for (key, value) in attributes {
            // The first occurrence of an attribute wins.
            let seen = element
                .attributes
                .iter()
                .any(|(name, _)| name.eq_ignore_ascii_case(key));
            if is_attribute_name(key) && !seen {
                element.attributes.push((key.to_owned(), decode(value)));
            }
        }
        Some(element)
    }

    fn write(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (name, value) in &self.attributes {
            out.push(' ');
            out.push_str(name);
            out.push_str("=\"");
            out.push_str(&escape(value));
            out.push('"');
        }
        if is_one_of(&self.name, VOID_ELEMENTS) {
            out.push_str(" />");
            return;
        }
        out.push('>');
        for child in &self.children {
            child.write(out);
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }
}

impl Node {
    fn write(&self, out: &mut String) {
        match self {
            Node::Element(element) => element.write(out),
            Node::Text(text) => out.push_str(text),
        }
    }
}

/// Builds a tree out of a stream of start/end events, tolerating the usual
/// HTML sloppiness.
#[derive(Default)]
struct TreeBuilder {
    roots: Vec<Node>,
    open: Vec<Element>,
}

impl TreeBuilder {
    fn siblings(&mut self) -> &mut Vec<Node> {
        match self.open.last_mut() {
            Some(parent) => &mut parent.children,
            None => &mut self.roots,
        }
    }

    fn push(&mut self, node: Node) {
        self.siblings().push(node);
    }

    fn text(&mut self, text: &str) {
        let siblings = self.siblings();
        if let Some(Node::Text(previous)) = siblings.last_mut() {
            previous.push_str(text);
            return;
        }
        siblings.push(Node::Text(text.to_owned()));
    }

    fn open(&mut self, element: Element) {
        self.open.push(element);
    }

    /// Closes the innermost open element called `name` along with every
    /// element opened after it. End tags matching nothing are ignored.
    fn close(&mut self, name: &str) {
        if let Some(i) = self
            .open
            .iter()
            .rposition(|element| element.name.eq_ignore_ascii_case(name))
        {
            self.close_from(i);
        }
    }

    fn close_from(&mut self, i: usize) {
        let mut closed = self.open.split_off(i);
        while let Some(element) = closed.pop() {
            match closed.last_mut() {
                Some(parent) => parent.children.push(Node::Element(element)),
                None => self.push(Node::Element(element)),
            }
        }
    }

    fn finish(mut self) -> Vec<Node> {
        self.close_from(0);
        self.roots
    }
}

fn parse(html: &str) -> Vec<Node> {
    let mut reader = Reader::from_str(html);
    let config = reader.config_mut();
    config.trim_text(false);
    config.enable_all_checks(false);
    config.allow_unmatched_ends = true;
    config.allow_dangling_amp = true;

    let mut tree = TreeBuilder::default();
    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                let element = match Element::from_tag(&lossy(&start)) {
                    Some(element) => element,
                    None => continue,
                };
                if is_one_of(&element.name, RAW_TEXT_ELEMENTS) {
                    skip_raw_text(&mut reader, &element.name);
                    tree.push(Node::Element(element));
                } else if is_one_of(&element.name, VOID_ELEMENTS) {
                    tree.push(Node::Element(element));
                } else {
                    tree.open(element);
                }
            }
            Ok(Event::Empty(start)) => {
                if let Some(element) = Element::from_tag(&lossy(&start)) {
                    tree.push(Node::Element(element));
                }
            }
            Ok(Event::End(end)) => tree.close(tag_name(&lossy(&end))),
            Ok(Event::Text(text)) => tree.text(&escape_text(&lossy(&text))),
            Ok(Event::GeneralRef(reference)) => {
                tree.text(&reference_text(&lossy(&reference)))
            }
            // Browsers end comments and CDATA sections at places the reader
            // doesn't, so their content is never passed on.
            Ok(Event::Comment(_)) | Ok(Event::CData(_)) => {}
            // Not fragment content.
            Ok(Event::Decl(_)) | Ok(Event::PI(_)) | Ok(Event::DocType(_)) => {}
            Ok(Event::Eof) => break,
            Err(e) => {
                debug!(
                    "dropping unparseable HTML from byte {}: {}",
                    reader.error_position(),
                    e
                );
                break;
            }
        }
    }
    tree.finish()
}

/// Consumes events up to and including the end tag of the raw-text element
/// `name`. Everything in between is discarded.
fn skip_raw_text(reader: &mut Reader<&[u8]>, name: &str) {
    loop {
        match reader.read_event() {
            Ok(Event::End(end)) if tag_name(&lossy(&end)).eq_ignore_ascii_case(name) => {
                return
            }
            Ok(Event::Eof) | Err(_) => return,
            Ok(_) => {}
        }
    }
}

/// Splits the inside of a start tag into the element name and its raw
/// attributes the way the HTML tokenizer does: the name ends at whitespace
/// or `/`, a `/` between attributes acts as a separator, and an unquoted
/// value runs up to the next whitespace.
fn split_tag(raw: &str) -> (&str, Vec<(&str, &str)>) {
    let is_space = |c: char| c.is_ascii_whitespace();
    let name = tag_name(raw);
    let mut rest = &raw[name.len()..];
    let mut attributes = Vec::new();

    loop {
        rest = rest.trim_start_matches(|c: char| is_space(c) || c == '/');
        if rest.is_empty() {
            return (name, attributes);
        }

        // A leading `=` is part of the attribute name.
        let first = rest.chars().next().map_or(0, char::len_utf8);
        let name_end = rest[first..]
            .find(|c: char| is_space(c) || c == '/' || c == '=')
            .map_or(rest.len(), |i| i + first);
        let (key, after_key) = rest.split_at(name_end);
        rest = after_key.trim_start_matches(is_space);

        let value = match rest.strip_prefix('=') {
            Some(after_eq) => {
                let (value, after_value) = split_value(after_eq.trim_start_matches(is_space));
                rest = after_value;
                value
            }
            None => "",
        };
        attributes.push((key, value));
    }
}

/// Splits a quoted or unquoted attribute value off the front of `s`.
fn split_value(s: &str) -> (&str, &str) {
    match s.chars().next() {
        Some(quote) if quote == '"' || quote == '\'' => {
            let inner = &s[1..];
            match inner.find(quote) {
                Some(i) => (&inner[..i], &inner[i + 1..]),
                None => (inner, ""),
            }
        }
        _ => s.split_at(s.find(|c: char| c.is_ascii_whitespace()).unwrap_or(s.len())),
    }
}

/// The element name at the start of a start or end tag.
fn tag_name(raw: &str) -> &str {
    let end = raw
        .find(|c: char| c.is_ascii_whitespace() || c == '/')
        .unwrap_or(raw.len());
    &raw[..end]
}

fn is_element_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().map_or(false, |c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.'))
}

fn is_attribute_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.'))
}

/// Resolves character references the way a browser reads them. A value that
/// doesn't decode cleanly is kept literally; since values are escaped on
/// output, the browser then sees exactly the text that was checked.
fn decode(value: &str) -> String {
    unescape_with(value, resolve_html5_entity)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| value.to_owned())
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Character references arrive as their own events, so an `&` in text is a
/// dangling one.
fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;")
}

/// Writes a character reference back as text. Anything that isn't a plain
/// named or numeric reference is escaped.
fn reference_text(name: &str) -> String {
    let plain = !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '#');
    match plain {
        true => format!("&{};", name),
        false => format!("&amp;{};", escape(name)),
    }
}

/// Removes the raw-text elements and strips dangerous attributes from
/// everything that remains.
fn clean(nodes: Vec<Node>) -> Vec<Node> {
    nodes
        .into_iter()
        .filter_map(|node| match node {
            Node::Element(element)
                if is_one_of(&element.name, RAW_TEXT_ELEMENTS) =>
            {
                None
            }
            Node::Element(mut element) => {
                element
                    .attributes
                    .retain(|(name, value)| is_safe_attribute(name, value));
                element.children = clean(mem::take(&mut element.children));
                Some(Node::Element(element))
            }
            other => Some(other),
        })
        .collect()
}

fn is_safe_attribute(name: &str, value: &str) -> bool {
    let name = name.to_ascii_lowercase();
    if name.starts_with("on") {
        return false;
    }
    !(URL_ATTRIBUTES.contains(&name.as_str()) && is_javascript_url(value))
}

/// Browsers drop tabs and newlines anywhere in a URL, and leading spaces and
/// control characters, before reading its scheme.
fn is_javascript_url(value: &str) -> bool {
    let url: String = value
        .chars()
        .filter(|c| !matches!(c, '\t' | '\n' | '\r'))
        .collect();
    url.trim_start_matches(|c: char| c <= ' ')
        .to_ascii_lowercase()
        .starts_with("javascript:")
}

fn is_one_of(name: &str, names: &[&str]) -> bool {
    names.iter().any(|n| n.eq_ignore_ascii_case(name))
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod test {
    use super::*;

    fn fixture(wanted: &str, input: &str) {
        assert_eq!(wanted, sanitize(input), "sanitizing {:?}", input);
    }

    #[test]
    fn test_passes_markdown_output_through() {
        fixture(
            "<h2>Intro</h2>\n<p>See <a href=\"https://example.org/?a=1&amp;b=2\" \
             title=\"t\">this</a> &amp; <em>that</em>.</p>\n",
            "<h2>Intro</h2>\n<p>See <a href=\"https://example.org/?a=1&amp;b=2\" \
             title=\"t\">this</a> &amp; <em>that</em>.</p>\n",
        );
    }

    #[test]
    fn test_removes_script() {
        fixture("<p>hi</p>", "<p>hi</p><script>alert(1)</script>");
    }

    #[test]
    fn test_removes_script_any_case_and_nested() {
        fixture(
            "<div><p>a</p><p>b</p></div>",
            "<div><p>a</p><SCRIPT type=\"text/javascript\">alert(1)</SCRIPT><p>b</p></div>",
        );
    }

    #[test]
    fn test_removes_style() {
        fixture(
            "<p>styled</p>",
            "<style>p { color: red; }</style><p>styled</p>",
        );
    }

    #[test]
    fn test_removes_empty_script() {
        fixture("<p>x</p>", "<script src=\"evil.js\"/><p>x</p>");
    }

    #[test]
    fn test_strips_event_handlers() {
        fixture("<img src=\"x\" />", "<img src=x onerror=alert(1)>");
        fixture(
            "<div class=\"c\">x</div>",
            "<div ONCLICK=\"steal()\" class=\"c\" onmouseover='x()'>x</div>",
        );
    }

    #[test]
    fn test_strips_javascript_urls() {
        fixture(
            "<a title=\"t\">x</a>",
            "<a href=\"  JavaScript:alert(1)\" title=\"t\">x</a>",
        );
        fixture("<iframe></iframe>", "<iframe src=\"javascript:void(0)\"></iframe>");
    }

    #[test]
    fn test_keeps_other_urls() {
        fixture(
            "<a href=\"/posts/javascript:tips\">x</a>",
            "<a href=\"/posts/javascript:tips\">x</a>",
        );
    }

    #[test]
    fn test_closes_unclosed_elements() {
        fixture("<div><p>hi</p></div>", "<div><p>hi");
    }

    #[test]
    fn test_ignores_unmatched_end_tags() {
        fixture("hi there", "hi</span> there");
    }

    #[test]
    fn test_drops_comments() {
        fixture("<p>a</p><p>b</p>", "<p>a</p><!-- more --><p>b</p>");
    }

    #[test]
    fn test_comment_closed_early_by_browsers() {
        fixture("", "<!--><img src=x onerror=alert(1)>-->");
        fixture("<p>x</p>", "<!-- a --!><img src=x onerror=alert(1)>--><p>x</p>");
    }

    #[test]
    fn test_drops_cdata() {
        fixture(
            "<p>x</p>",
            "<![CDATA[><img src=x onerror=alert(1)>]]><p>x</p>",
        );
    }

    #[test]
    fn test_slash_separates_tag_name_and_attributes() {
        fixture("<svg></svg>", "<svg/onload=alert(1)>");
        fixture("<img src=\"x\" />", "<img/src=\"x\"/onerror=alert(1)>");
        fixture("<a href=\"/a/b\">x</a>", "<a href=/a/b>x</a>");
    }

    #[test]
    fn test_drops_tags_with_invalid_names() {
        fixture("x", "<a\"x\" onclick=alert(1)>x");
        fixture("1  2", "1 <2 onclick=x> 2");
    }

    #[test]
    fn test_escapes_markup_in_attribute_values() {
        fixture(
            "<textarea><p title=\"&lt;/textarea&gt;&lt;img src=x onerror=alert(1)&gt;\">\
             </p></textarea>",
            "<textarea><p title=\"</textarea><img src=x onerror=alert(1)>\"></p></textarea>",
        );
    }

    #[test]
    fn test_strips_encoded_javascript_urls() {
        fixture("<a>x</a>", "<a href=\"&#106;avascript:alert(1)\">x</a>");
        fixture("<a>x</a>", "<a href=\"java&#x09;script:alert(1)\">x</a>");
        fixture("<a>x</a>", "<a href=\"javascript&colon;alert(1)\">x</a>");
        fixture("<a>x</a>", "<a href=\"&#x20;&#1;javascript:alert(1)\">x</a>");
        fixture(
            "<svg><a>x</a></svg>",
            "<svg><a xlink:href=\"javascript:alert(1)\">x</a></svg>",
        );
    }

    #[test]
    fn test_undecodable_values_are_kept_literally() {
        fixture(
            "<a href=\"&amp;#106avascript:alert(1)\">x</a>",
            "<a href=\"&#106avascript:alert(1)\">x</a>",
        );
        fixture("<a href=\"?a=1&amp;b=2\">x</a>", "<a href=\"?a=1&b=2\">x</a>");
    }

    #[test]
    fn test_escapes_dangling_ampersands() {
        fixture("AT&amp;T &amp; co", "AT&T & co");
    }

    #[test]
    fn test_first_duplicate_attribute_wins() {
        fixture(
            "<a href=\"/safe\">x</a>",
            "<a href=\"/safe\" HREF=\"/other\">x</a>",
        );
    }

    #[test]
    fn test_quotes_attribute_values() {
        fixture(
            "<span title=\"say &quot;hi&quot;\">x</span>",
            "<span title='say \"hi\"'>x</span>",
        );
    }

    #[test]
    fn test_drops_unparseable_remainder() {
        let out = sanitize("<p>ok</p><a href=\"javascript:alert(1)");
        assert!(out.starts_with("<p>ok</p>"));
        assert!(!out.contains("javascript"));
    }

    #[test]
    fn test_empty() {
        fixture("", "");
    }

    #[test]
    fn test_idempotent() {
        for input in &[
            "<p>plain</p>\n",
            "<img src=x onerror=alert(1)>",
            "<div><p>unclosed",
            "<ul><li>a<li>b</ul>",
            "<a href=' javascript:x' onclick=y>z</a><script>s</script>",
            "<span title='say \"hi\"'>x</span>",
            "a &amp; b &#39;c&#39; <br> <input disabled>",
            "<!-- c --><![CDATA[d]]>",
            "<!--><img src=x onerror=alert(1)>-->",
            "<svg/onload=alert(1)><img/src=x/onerror=y>",
            "<textarea><p title=\"</textarea><img src=x onerror=alert(1)>\"></p></textarea>",
            "<a href=\"&#106;avascript:alert(1)\" title=\"a &amp; &lt;b&gt;\">x</a>",
            "<a href=\"&#106avascript:alert(1)\">x</a> &bogus<; &#60;",
        ] {
            let once = sanitize(input);
            assert_eq!(once, sanitize(&once), "sanitizing {:?}", input);
        }
    }
}
