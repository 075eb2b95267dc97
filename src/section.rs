//! Replacing the body of a named section inside a Markdown document.
//!
//! A section starts at the first line that is exactly equal to its [`Marker`] and runs until the
//! next heading of equal or shallower depth, or the end of the document. Merging replaces only the
//! body of that section; every byte before and after it is copied verbatim, so merging the same
//! entries twice yields the same document.

use std::fmt;
use std::ops::Range;
use thiserror::Error;

/// Depth assigned to markers which are not ATX headings. Any heading terminates such a section.
const NON_HEADING_DEPTH: usize = 7;

/// Reasons for rejecting a section marker.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarkerError {
    #[error("section marker must not be empty")]
    Empty,
    #[error("section marker must be a single line: {0:?}")]
    MultiLine(String),
}

/// The literal line identifying a section, e.g. `## Activities`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    line: String,
    depth: usize,
}

impl Marker {
    /// Creates a marker from a single, non-empty line.
    pub fn new<S: Into<String>>(line: S) -> Result<Marker, MarkerError> {
        let line = line.into();

        if line.trim().is_empty() {
            return Err(MarkerError::Empty);
        }

        if line.contains(['\n', '\r']) {
            return Err(MarkerError::MultiLine(line));
        }

        let depth = heading_depth(&line).unwrap_or(NON_HEADING_DEPTH);

        Ok(Marker { line, depth })
    }

    /// The marker line.
    pub fn as_str(&self) -> &str {
        &self.line
    }

    /// Heading depth of the marker, `7` if it is not a heading.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Returns `true` if `line` ends a section started by this marker.
    fn is_boundary(&self, line: &str) -> bool {
        heading_depth(line).map_or(false, |depth| depth <= self.depth)
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.line.fmt(f)
    }
}

/// Byte offsets of a section located within a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// The marker line, including its line terminator if it has one.
    pub marker: Range<usize>,
    /// The replaceable body. Blank lines right before the next heading are not part of it.
    pub body: Range<usize>,
}

/// Returns the ATX heading depth of a line, e.g. `2` for `## Notes`.
pub fn heading_depth(line: &str) -> Option<usize> {
    let hashes = line.bytes().take_while(|b| *b == b'#').count();

    if !(1..=6).contains(&hashes) {
        return None;
    }

    match line[hashes..].chars().next() {
        None | Some(' ') | Some('\t') => Some(hashes),
        _ => None,
    }
}

/// A line of a document together with its byte range, terminator included.
struct Line<'a> {
    start: usize,
    end: usize,
    content: &'a str,
}

fn lines(document: &str) -> impl Iterator<Item = Line<'_>> {
    let mut offset = 0;

    document.split_inclusive('\n').map(move |raw| {
        let start = offset;
        offset += raw.len();

        let content = raw.strip_suffix('\n').unwrap_or(raw);
        let content = content.strip_suffix('\r').unwrap_or(content);

        Line {
            start,
            end: offset,
            content,
        }
    })
}

/// Returns the line separator used by the document.
fn line_separator(document: &str) -> &'static str {
    if document.contains("\r\n") {
        "\r\n"
    } else {
        "\n"
    }
}

/// Locates the section identified by `marker`. The first exact line match wins.
pub fn find(document: &str, marker: &Marker) -> Option<Section> {
    let mut lines = lines(document);

    let marker_line = lines.find(|line| line.content == marker.as_str())?;

    let body_start = marker_line.end;
    let mut body_end = body_start;

    for line in lines {
        if marker.is_boundary(line.content) {
            break;
        }

        if !line.content.trim().is_empty() {
            body_end = line.end;
        }
    }

    Some(Section {
        marker: marker_line.start..marker_line.end,
        body: body_start..body_end,
    })
}

/// Returns `true` if the document contains a line exactly equal to the marker.
pub fn contains(document: &str, marker: &Marker) -> bool {
    lines(document).any(|line| line.content == marker.as_str())
}

/// Turns entries into body lines that survive being merged again.
///
/// Multi-line entries are split, an empty entry is a blank line, trailing blank lines are dropped
/// and lines which would end the section are escaped.
fn normalize_entries<S: AsRef<str>>(marker: &Marker, entries: &[S]) -> Vec<String> {
    let mut lines: Vec<String> = entries
        .iter()
        .flat_map(|entry| match entry.as_ref() {
            "" => vec![""],
            entry => entry.lines().collect(),
        })
        .map(|line| {
            let line = line.strip_suffix('\r').unwrap_or(line);
            if marker.is_boundary(line) {
                format!("\\{line}")
            } else {
                line.to_owned()
            }
        })
        .collect();

    while lines.last().map_or(false, |line| line.trim().is_empty()) {
        lines.pop();
    }

    lines
}

/// Replaces the body of the section identified by `marker` with `entries`.
///
/// If the document has no such section, the marker and the entries are appended at the end,
/// separated from existing content by a blank line. Entries are written in the given order.
pub fn merge<S: AsRef<str>>(document: &str, marker: &Marker, entries: &[S]) -> String {
    let sep = line_separator(document);
    let entries = normalize_entries(marker, entries);
    let body = entries.join(sep);

    let section = match find(document, marker) {
        Some(section) => section,
        None => return append(document, marker, &body, sep),
    };

    let head = &document[..section.body.start];
    let tail = &document[section.body.end..];

    let mut merged = String::with_capacity(head.len() + body.len() + tail.len() + 2 * sep.len());
    merged.push_str(head);

    if !body.is_empty() {
        if !head.ends_with('\n') {
            // The marker is the last line and has no terminator.
            merged.push_str(sep);
        }

        merged.push_str(&body);

        if !tail.is_empty() || document[..section.body.end].ends_with('\n') {
            merged.push_str(sep);
        }
    }

    merged.push_str(tail);
    merged
}

fn append(document: &str, marker: &Marker, body: &str, sep: &str) -> String {
    let mut merged = String::with_capacity(document.len() + marker.as_str().len() + body.len() + 8);
    merged.push_str(document);

    if !document.is_empty() {
        if !document.ends_with('\n') {
            merged.push_str(sep);
        }

        let ends_with_blank_line = lines(document)
            .last()
            .map_or(false, |line| line.content.trim().is_empty());

        if !ends_with_blank_line {
            merged.push_str(sep);
        }
    }

    merged.push_str(marker.as_str());

    if !body.is_empty() {
        merged.push_str(sep);
        merged.push_str(body);
    }

    if document.ends_with('\n') {
        merged.push_str(sep);
    }

    merged
}
