//! Defines the [`Parser`] and [`Error`] types, which turn raw markdown
//! documents into [`ParsedPost`]s. A post document looks like this:
//!
//! ```md
//! # Hello, world!
//! Date: 2024-04-16
//! The body, in *markdown*.
//! ```
//!
//! The first line is the title (leading `#` markers are optional) and the
//! `Date:` line is optional. When it is missing or unparseable the post is
//! dated "now" and the line is treated as part of the body.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use std::fmt;

use crate::{markdown, post::ParsedPost, sanitize::sanitize};

/// The author attributed to every post unless configured otherwise.
pub const DEFAULT_AUTHOR: &str = "Jai Kapoor";

/// Date-time formats accepted on the `Date:` line, tried in order after
/// RFC 3339.
const DATE_TIME_FORMATS: &[&str] =
    &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// Date-only formats accepted on the `Date:` line. These resolve to
/// midnight UTC.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d", "%Y/%m/%d", "%B %d, %Y", "%b %d, %Y", "%d %B %Y", "%d %b %Y",
];

/// Parses [`ParsedPost`] objects from markdown source.
#[derive(Clone, Debug)]
pub struct Parser {
    /// Attributed to every post this parser produces.
    author: String,
}

impl Default for Parser {
    fn default() -> Parser {
        Parser::new(DEFAULT_AUTHOR)
    }
}

impl Parser {
    pub fn new(author: &str) -> Parser {
        Parser {
            author: author.to_owned(),
        }
    }

    /// Parses a single post. Fails only if `raw` is empty or holds nothing but
    /// whitespace; a malformed date falls back to the current time.
    pub fn parse_post(&self, raw: &str) -> Result<ParsedPost> {
        self.parse_post_at(raw, Utc::now())
    }

    fn parse_post_at(&self, raw: &str, now: DateTime<Utc>) -> Result<ParsedPost> {
        if raw.trim().is_empty() {
            return Err(Error::Empty);
        }

        let header = split_header(raw);
        let mut body = String::new();
        markdown::to_html(&mut body, header.body);

        Ok(ParsedPost {
            title: header.title,
            date: header.date.unwrap_or(now),
            author: self.author.clone(),
            html_content: sanitize(&body),
        })
    }
}

/// Parses a post with the [`DEFAULT_AUTHOR`]. A source that is empty or only
/// whitespace is [`Error::Empty`].
pub fn parse_post(raw: &str) -> Result<ParsedPost> {
    Parser::default().parse_post(raw)
}

/// The title line, optional date line, and the remaining body of a post
/// document.
pub(crate) struct Header<'a> {
    pub title: String,
    pub date: Option<DateTime<Utc>>,
    pub body: &'a str,
}

pub(crate) fn split_header(raw: &str) -> Header<'_> {
    fn split_line(s: &str) -> (&str, &str) {
        match s.find('\n') {
            Some(i) => (&s[..i], &s[i + 1..]),
            None => (s, ""),
        }
    }

    let (title_line, rest) = split_line(raw);
    let (date_line, after_date) = split_line(rest);
    let date = date_value(date_line).and_then(parse_date);
    Header {
        title: strip_heading(title_line),
        date,
        body: match date {
            Some(_) => after_date,
            None => rest,
        },
    }
}

/// Strips leading `#` markers and surrounding whitespace from a title line.
pub(crate) fn strip_heading(line: &str) -> String {
    line.trim_start().trim_start_matches('#').trim().to_owned()
}

/// Returns the text after a case-insensitive `Date:` prefix.
fn date_value(line: &str) -> Option<&str> {
    const PREFIX: &str = "date:";
    let line = line.trim();
    match line.get(..PREFIX.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(PREFIX) => {
            Some(line[PREFIX.len()..].trim())
        }
        _ => None,
    }
}

/// Parses the value of a `Date:` line. Returns `None` for anything that
/// isn't a valid calendar date in one of the accepted formats.
pub fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(date) = DateTime::parse_from_rfc3339(value) {
        return Some(date.with_timezone(&Utc));
    }
    for format in DATE_TIME_FORMATS {
        if let Ok(date) = NaiveDateTime::parse_from_str(value, format) {
            return Some(Utc.from_utc_datetime(&date));
        }
    }
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|date| Utc.from_utc_datetime(&date))
}

/// Represents the result of a [`ParsedPost`]-parse operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error parsing a [`ParsedPost`].
#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    /// Returned when the source document is empty or only whitespace.
    Empty,
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Empty => write!(f, "post source is empty"),
        }
    }
}

impl std::error::Error for Error {}
