//! Decoding of [RFC 2047](https://tools.ietf.org/html/rfc2047) encoded words.
//!
//! Header fields such as `Subject` may only carry ASCII. Other text is transported as one or
//! more encoded words of the form `=?charset?encoding?text?=`, where the encoding is either
//! `Q` (a quoted-printable variant) or `B` (base64).
//!
//! ```
//! use pop3_browse::decode::decode_header;
//!
//! assert_eq!(
//!     decode_header("=?iso-8859-1?Q?Mentor*innen_f=FCr_Studierende?="),
//!     "Mentor*innen für Studierende"
//! );
//! assert_eq!(decode_header("=?utf-8?B?SGVsbG8=?= =?utf-8?B?IFdvcmxk?="), "Hello World");
//! ```

use std::borrow::Cow;
use std::fmt;

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use lazy_static::lazy_static;
use log::warn;
use regex::Regex;

const MARKER: &str = "=?";
const TERMINATOR: &str = "?=";

// Mail agents regularly drop the trailing `=` padding.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

lazy_static! {
    static ref Q_ESCAPE: Regex = Regex::new("=([0-9A-Fa-f]{2})").unwrap();
}

/// The two encodings an encoded word may use.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Scheme {
    /// `Q`: `=XX` hex escapes, `_` for space.
    Q,
    /// `B`: base64.
    B,
}

impl Scheme {
    fn from_letter(letter: &str) -> Option<Scheme> {
        if letter.eq_ignore_ascii_case("q") {
            Some(Scheme::Q)
        } else if letter.eq_ignore_ascii_case("b") {
            Some(Scheme::B)
        } else {
            None
        }
    }
}

/// A single `=?charset?encoding?text?=` token.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct EncodedWord<'a> {
    /// The charset label as written, e.g. `UTF-8` or `iso-8859-1`.
    pub charset: &'a str,
    /// How `payload` is encoded.
    pub scheme: Scheme,
    /// The encoded text between the second and third `?`.
    pub payload: &'a str,
}

/// Why an encoded word could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The charset label is not one we know how to decode.
    UnknownCharset(String),
    /// The `B` payload is not valid base64.
    Base64(base64::DecodeError),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            DecodeError::UnknownCharset(ref label) => write!(f, "unknown charset {:?}", label),
            DecodeError::Base64(ref e) => write!(f, "invalid base64 payload: {}", e),
        }
    }
}

impl std::error::Error for DecodeError {}

impl<'a> EncodedWord<'a> {
    /// Parses an encoded word, with or without its leading `=?`.
    ///
    /// The trailing `?=` is optional; without it the payload runs up to the next `?` or the end
    /// of the input.
    pub fn parse(word: &'a str) -> Option<EncodedWord<'a>> {
        EncodedWord::split(word.strip_prefix(MARKER).unwrap_or(word)).map(|(word, _)| word)
    }

    /// Splits the text following a `=?` marker into the encoded word and whatever text
    /// trails its terminator.
    fn split(segment: &'a str) -> Option<(EncodedWord<'a>, &'a str)> {
        let mut fields = segment.splitn(3, '?');
        let charset = fields.next().filter(|c| !c.is_empty())?;
        let scheme = Scheme::from_letter(fields.next()?)?;
        let tail = fields.next()?;
        let (payload, rest) = match tail.find(TERMINATOR) {
            Some(end) => (&tail[..end], &tail[end + TERMINATOR.len()..]),
            None => match tail.find('?') {
                Some(end) => (&tail[..end], &tail[end + 1..]),
                None => (tail, ""),
            },
        };
        Some((
            EncodedWord {
                charset,
                scheme,
                payload,
            },
            rest,
        ))
    }

    /// Decodes the payload into text.
    ///
    /// Bytes that are invalid in the named charset become U+FFFD.
    pub fn decode(&self) -> Result<String, DecodeError> {
        // RFC 2231 allows a language tag: `=?utf-8*en?Q?...?=`
        let label = self.charset.split('*').next().unwrap_or(self.charset);
        let encoding = encoding_rs::Encoding::for_label(label.as_bytes())
            .ok_or_else(|| DecodeError::UnknownCharset(self.charset.to_string()))?;

        let bytes: Cow<'_, [u8]> = match self.scheme {
            Scheme::B => Cow::Owned(
                LENIENT_BASE64
                    .decode(self.payload.trim())
                    .map_err(DecodeError::Base64)?,
            ),
            Scheme::Q => Cow::Owned(q_decode(self.payload)),
        };

        let (text, _) = encoding.decode_without_bom_handling(&bytes);
        Ok(text.into_owned())
    }
}

/// Turns `Q` payload into raw bytes.
///
/// Hex escapes become percent escapes and the result is percent-decoded; a literal `%` is
/// escaped first so it survives.
fn q_decode(payload: &str) -> Vec<u8> {
    let escaped = payload.replace('%', "%25").replace('_', "%20");
    let escaped = Q_ESCAPE.replace_all(&escaped, "%$1");
    percent_encoding::percent_decode_str(&escaped).collect()
}

/// Decodes every encoded word in a header value.
///
/// Values without a `=?` marker are returned unchanged. Text around encoded words is kept,
/// except whitespace between two adjacent encoded words, which RFC 2047 says to drop. Words
/// that cannot be decoded are left out of the result; this function never fails.
pub fn decode_header(value: &str) -> String {
    if !value.contains(MARKER) {
        return value.to_string();
    }

    let mut decoded = String::with_capacity(value.len());
    let mut rest = value;
    let mut after_word = false;

    while let Some(start) = rest.find(MARKER) {
        let gap = &rest[..start];
        let candidate = &rest[start + MARKER.len()..];
        if !(after_word && gap.trim().is_empty()) {
            decoded.push_str(gap);
        }

        match EncodedWord::split(candidate) {
            Some((word, tail)) => {
                match word.decode() {
                    Ok(text) => decoded.push_str(&text),
                    Err(e) => warn!("skipping encoded word {:?}: {}", word, e),
                }
                after_word = true;
                rest = tail;
            }
            None => {
                warn!("skipping malformed encoded word in {:?}", value);
                rest = candidate
                    .find(MARKER)
                    .map_or("", |next| &candidate[next..]);
            }
        }
    }

    decoded.push_str(rest);
    decoded
}
