use chrono::{DateTime, FixedOffset};
use std::fmt;

/// A message retrieved with `RETR`, reduced to the fields a reader cares about.
///
/// Every field is empty when the message did not carry the corresponding header.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct Message {
    /// The sender address. Only the part inside `<...>` is kept when brackets are present.
    pub from: String,
    /// The receiver address, extracted like `from`.
    pub to: String,
    /// The first five tokens of the `Date` header, e.g. `Wed, 21 Oct 2015 12:34:56`.
    pub date: String,
    /// The `Subject` header with any RFC 2047 encoded words decoded.
    pub subject: String,
    /// The lines of every `text/*` part, each terminated by `\n`.
    pub body: String,
    pub(crate) date_header: String,
}

impl Message {
    /// The `Date` header as a timestamp, if it is a valid [RFC 2822] date.
    ///
    /// This looks at the complete header value, including the zone that `date` leaves out.
    ///
    /// [RFC 2822]: https://tools.ietf.org/html/rfc2822#section-3.3
    pub fn parsed_date(&self) -> Option<DateTime<FixedOffset>> {
        let value = strip_comment(&self.date_header);
        DateTime::parse_from_rfc2822(value).ok()
    }

    /// The listing view of this message.
    pub fn summary(&self) -> Summary {
        Summary {
            date: self.date.clone(),
            subject: self.subject.clone(),
        }
    }
}

// chrono rejects trailing `(CEST)` style comments
fn strip_comment(value: &str) -> &str {
    match value.find('(') {
        Some(i) => value[..i].trim_end(),
        None => value.trim_end(),
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "From: {}", self.from)?;
        writeln!(f, "To: {}", self.to)?;
        writeln!(f, "Date: {}", self.date)?;
        writeln!(f, "Subject: {}", self.subject)?;
        writeln!(f)?;
        f.write_str(&self.body)
    }
}

/// The date and subject of a message, as shown in a mailbox listing.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct Summary {
    /// The first five tokens of the `Date` header.
    pub date: String,
    /// The decoded `Subject` header.
    pub subject: String,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Date: {}, Subject: {}", self.date, self.subject)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn parsed_date_ignores_comment() {
        let message = Message {
            date: "Wed, 21 Oct 2015 12:34:56".to_string(),
            date_header: "Wed, 21 Oct 2015 12:34:56 +0200 (CEST)".to_string(),
            ..Default::default()
        };
        let date = message.parsed_date().unwrap();
        assert_eq!(date.year(), 2015);
        assert_eq!(date.day(), 21);
        assert_eq!(date.hour(), 12);
        assert_eq!(date.offset().local_minus_utc(), 2 * 3600);
    }

    #[test]
    fn parsed_date_missing() {
        assert_eq!(Message::default().parsed_date(), None);
    }

    #[test]
    fn summary_display() {
        let summary = Summary {
            date: "Wed, 21 Oct 2015 12:34:56".to_string(),
            subject: "Hello".to_string(),
        };
        assert_eq!(
            summary.to_string(),
            "Date: Wed, 21 Oct 2015 12:34:56, Subject: Hello"
        );
    }

    #[test]
    fn message_display() {
        let message = Message {
            from: "alice@example.com".to_string(),
            to: "bob@example.com".to_string(),
            subject: "Hi".to_string(),
            body: "line one\n".to_string(),
            ..Default::default()
        };
        assert_eq!(
            message.to_string(),
            "From: alice@example.com\nTo: bob@example.com\nDate: \nSubject: Hi\n\nline one\n"
        );
    }
}
