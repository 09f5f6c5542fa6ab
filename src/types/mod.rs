//! This module contains types used throughout the POP3 protocol.

/// From section [5 of RFC 1939](https://tools.ietf.org/html/rfc1939#section-5).
///
/// Each message in the maildrop is assigned a message-number, the first message being numbered
/// 1, the second 2, and so on, so that the n-th message in a maildrop is numbered n.  The
/// numbers are contiguous from 1 up to the count reported by `STAT`.
///
/// Message-numbers are only valid for the lifetime of the session.
pub type MessageIndex = u32;

mod stat;
pub use self::stat::Stat;

mod message;
pub use self::message::{Message, Summary};
