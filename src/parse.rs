use lazy_static::lazy_static;
use log::trace;
use regex::Regex;

use super::decode::decode_header;
use super::error::{Error, ParseError, Result};
use super::types::{Message, Stat, Summary};

pub(crate) const OK: &str = "+OK";
pub(crate) const ERR: &str = "-ERR";
pub(crate) const SENTINEL: &str = ".";

lazy_static! {
    static ref STAT_RESPONSE: Regex = Regex::new(r"^\+OK\s+(\d+)\s+(\d+)").unwrap();
    // RFC 5322 field-name: printable ASCII except `:`
    static ref HEADER_LINE: Regex = Regex::new(r"^[!-9;-~]+:").unwrap();
    static ref ANGLE_ADDRESS: Regex = Regex::new(r"<([^>]*)>").unwrap();
    static ref BOUNDARY: Regex = Regex::new(r#"(?i)\bboundary\s*=\s*"?([^";]+)"?"#).unwrap();
}

/// The first line of every server reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Status {
    Ok(String),
    Err(String),
}

pub(crate) fn parse_status(line: &str) -> Result<Status> {
    if line.starts_with(OK) {
        Ok(Status::Ok(line.to_string()))
    } else if line.starts_with(ERR) {
        Ok(Status::Err(line.to_string()))
    } else {
        Err(Error::Parse(ParseError::StatusLine(line.to_string())))
    }
}

pub(crate) fn parse_stat(line: &str) -> Result<Stat> {
    let invalid = || Error::Parse(ParseError::Stat(line.to_string()));
    let cap = STAT_RESPONSE.captures(line).ok_or_else(invalid)?;
    // both groups are all digits, so only overflow can fail here
    let count = cap[1].parse().map_err(|_| invalid())?;
    let size = cap[2].parse().map_err(|_| invalid())?;
    Ok(Stat { count, size })
}

/// Undoes the byte-stuffing of a multi-line response line (RFC 1939, section 3).
pub(crate) fn unstuff(line: &str) -> &str {
    if line.starts_with("..") {
        &line[1..]
    } else {
        line
    }
}

/// Keeps the first five whitespace-separated tokens of a `Date` value, which drops the zone
/// and any trailing comment: `Wed, 21 Oct 2015 12:34:56 +0200 (CEST)` becomes
/// `Wed, 21 Oct 2015 12:34:56`.
pub(crate) fn truncate_date(value: &str) -> String {
    value.split_whitespace().take(5).collect::<Vec<_>>().join(" ")
}

/// `Jane Doe <jane@example.com>` becomes `jane@example.com`; values without angle brackets are
/// only trimmed.
pub(crate) fn extract_address(value: &str) -> String {
    match ANGLE_ADDRESS.captures(value) {
        Some(cap) => cap[1].trim().to_string(),
        None => value.trim().to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Headers,
    Body,
    Skip,
}

/// Builds a `Message` from the content lines of a `RETR` response, one line at a time.
///
/// Lines are expected without their terminator and already unstuffed. Once a base64 transfer
/// encoding or an image part shows up, every later line is dropped unseen.
#[derive(Debug)]
pub(crate) struct MessageParser {
    headers_only: bool,
    section: Section,
    in_part: bool,
    text_part: bool,
    folded: Option<String>,
    boundaries: Vec<String>,
    from: Option<String>,
    to: Option<String>,
    date: Option<String>,
    subject: Option<String>,
    body: String,
}

impl MessageParser {
    pub(crate) fn new() -> Self {
        MessageParser {
            headers_only: false,
            section: Section::Headers,
            in_part: false,
            // RFC 2045: no Content-Type means text/plain
            text_part: true,
            folded: None,
            boundaries: Vec::new(),
            from: None,
            to: None,
            date: None,
            subject: None,
            body: String::new(),
        }
    }

    /// A parser that stops looking once the top-level header block ends.
    pub(crate) fn headers_only() -> Self {
        MessageParser {
            headers_only: true,
            ..MessageParser::new()
        }
    }

    pub(crate) fn push_line(&mut self, line: &str) {
        match self.section {
            Section::Skip => {}
            Section::Headers => self.push_header_line(line),
            Section::Body => self.push_body_line(line),
        }
    }

    pub(crate) fn finish(mut self) -> Message {
        self.flush_header();
        let date_header = self.date.unwrap_or_default();
        Message {
            from: self.from.unwrap_or_default(),
            to: self.to.unwrap_or_default(),
            date: truncate_date(&date_header),
            subject: self.subject.unwrap_or_default(),
            body: self.body,
            date_header,
        }
    }

    pub(crate) fn finish_summary(self) -> Summary {
        self.finish().summary()
    }

    fn push_header_line(&mut self, line: &str) {
        if line.starts_with([' ', '\t']) {
            if let Some(ref mut folded) = self.folded {
                folded.push_str(line);
            }
            return;
        }

        self.flush_header();
        if self.section == Section::Skip {
            return;
        }

        if line.is_empty() {
            self.section = if self.headers_only && !self.in_part {
                Section::Skip
            } else {
                Section::Body
            };
        } else if HEADER_LINE.is_match(line) {
            self.folded = Some(line.to_string());
        }
    }

    fn push_body_line(&mut self, line: &str) {
        if let Some(rest) = line.strip_prefix("--") {
            let rest = rest.trim_end();
            for boundary in &self.boundaries {
                if rest == boundary {
                    self.section = Section::Headers;
                    self.in_part = true;
                    self.text_part = true;
                    return;
                }
                if rest.strip_suffix("--") == Some(boundary.as_str()) {
                    self.text_part = false;
                    return;
                }
            }
        }

        if self.text_part {
            self.body.push_str(line);
            self.body.push('\n');
        }
    }

    fn flush_header(&mut self) {
        let line = match self.folded.take() {
            Some(line) => line,
            None => return,
        };
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.trim()),
            None => return,
        };

        if field.eq_ignore_ascii_case("From") {
            self.from.get_or_insert_with(|| extract_address(value));
        } else if field.eq_ignore_ascii_case("To") {
            self.to.get_or_insert_with(|| extract_address(value));
        } else if field.eq_ignore_ascii_case("Date") {
            self.date.get_or_insert_with(|| value.to_string());
        } else if field.eq_ignore_ascii_case("Subject") {
            self.subject.get_or_insert_with(|| decode_header(value));
        } else if self.headers_only {
            // listings ignore MIME structure
        } else if field.eq_ignore_ascii_case("Content-Type") {
            let media_type = value.to_ascii_lowercase();
            if media_type.starts_with("image/") {
                self.skip_rest(value);
                return;
            }
            self.text_part = media_type.starts_with("text/");
            if media_type.starts_with("multipart/") {
                if let Some(cap) = BOUNDARY.captures(value) {
                    self.boundaries.push(cap[1].to_string());
                }
            }
        } else if field.eq_ignore_ascii_case("Content-Transfer-Encoding")
            && value.eq_ignore_ascii_case("base64")
        {
            self.skip_rest(value);
        }
    }

    fn skip_rest(&mut self, reason: &str) {
        trace!("skipping the rest of the message after {:?}", reason);
        self.section = Section::Skip;
    }
}

/// Parses a raw message as it appears between the status line and the sentinel.
#[cfg(any(test, feature = "test_helpers"))]
pub(crate) fn parse_message(raw: &str, headers_only: bool) -> MessageParser {
    let mut parser = if headers_only {
        MessageParser::headers_only()
    } else {
        MessageParser::new()
    };
    for line in raw.lines() {
        parser.push_line(line);
    }
    parser
}
