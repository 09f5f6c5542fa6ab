//! Enable the test_helpers feature to expose helper methods to build
//! message structures for testing your code that uses the pop3-browse crate
//!
//! To use add a dev-dependency on the crate adding the feature "test_helpers"
//! e.g.
//!
//! ```toml
//! [dependencies]
//! pop3-browse = { version = "0.1" }
//!
//! [dev-dependencies]
//! # mirror the same configuration your dependencies and add test_helpers
//! pop3-browse = { version = "0.1", features = ["test_helpers"] }
//! ```
//!
#[cfg(doc)]
use crate::types::*;

/// Methods to build a [`Message`] object
pub mod message {
    use crate::parse::parse_message;
    use crate::types::Message;

    /// Builds a [`Message`] from the raw text of a message, as found between the `+OK`
    /// status line and the terminating `.` of a `RETR` response.
    ///
    /// Example input.
    ///
    /// ```
    /// # #[cfg(feature = "test_helpers")] {
    /// let input = "\
    /// From: Jane <jane@example.com>\r\n\
    /// Subject: =?utf-8?Q?Gr=C3=BC=C3=9Fe?=\r\n\
    /// \r\n\
    /// Hi!\r\n";
    /// let message = pop3_browse::testing::message::parse(input);
    /// assert_eq!(message.subject, "Grüße");
    /// # }
    /// ```
    pub fn parse(input: impl AsRef<str>) -> Message {
        parse_message(input.as_ref(), false).finish()
    }
}

/// Methods to build a [`Summary`] object
pub mod summary {
    use crate::parse::parse_message;
    use crate::types::Summary;

    /// Builds a [`Summary`] from the raw text of a message.
    ///
    /// Example input.
    ///
    /// ```
    /// # #[cfg(feature = "test_helpers")] {
    /// let input = "\
    /// Date: Wed, 21 Oct 2015 12:34:56 +0200 (CEST)\r\n\
    /// Subject: Hello\r\n\
    /// \r\n";
    /// let summary = pop3_browse::testing::summary::parse(input);
    /// assert_eq!(summary.date, "Wed, 21 Oct 2015 12:34:56");
    /// # }
    /// ```
    pub fn parse(input: impl AsRef<str>) -> Summary {
        parse_message(input.as_ref(), true).finish_summary()
    }
}
