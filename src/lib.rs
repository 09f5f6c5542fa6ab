//! This crate lets you connect to a POP3 server, list the messages in the maildrop, and read
//! them one at a time. It speaks the small subset of [RFC 1939] needed for that (`USER`,
//! `PASS`, `STAT`, `RETR` and `QUIT`) and decodes [RFC 2047] encoded words in headers.
//!
//! The client is synchronous and strictly request-then-response. It is generic over any
//! `Read + Write` stream, so plain TCP, TLS, and in-memory test streams all work the same way.
//!
//! The usual flow is:
//!
//! 1. connect with [`ClientBuilder`], which reads the server greeting and yields a [`Client`];
//! 2. [`Client::login`] to get an authenticated [`Session`];
//! 3. [`Session::message_count`], then [`Session::summary`] or [`Session::retrieve`] for
//!    indices `1..=count`;
//! 4. [`Session::quit`].
//!
//! ```no_run
//! # #[cfg(feature = "native-tls")]
//! fn fetch_inbox_top() -> pop3_browse::error::Result<Option<String>> {
//!     let client = pop3_browse::ClientBuilder::new("pop.example.com", 995)
//!         .mode(pop3_browse::ConnectionMode::Tls)
//!         .connect()?;
//!
//!     // the client we have here is unauthenticated.
//!     // to do anything useful with the e-mails, we need to log in
//!     let mut session = client
//!         .login("me@example.com", "password")
//!         .map_err(|e| e.0)?;
//!
//!     if session.message_count()? == 0 {
//!         session.quit()?;
//!         return Ok(None);
//!     }
//!
//!     // message indices start at 1
//!     let message = session.retrieve(1)?;
//!
//!     // be nice to the server and say goodbye
//!     session.quit()?;
//!
//!     Ok(Some(message.body))
//! }
//! ```
//!
//! Errors follow one policy: failures of the transport or of the login end the session, while
//! a missing message ([`Error::NotFound`]) or an unparsable reply to one command leave it
//! usable. See [`Error::is_fatal`].
//!
//! [RFC 1939]: https://tools.ietf.org/html/rfc1939
//! [RFC 2047]: https://tools.ietf.org/html/rfc2047

#![deny(missing_docs)]
#![warn(rust_2018_idioms)]

mod parse;

pub mod types;

mod client;
pub use crate::client::*;
mod client_builder;
pub use crate::client_builder::*;
mod conn;
pub use crate::conn::{Connection, Pop3Connection, SetReadTimeout};

pub mod decode;
pub mod error;
pub use crate::error::{Error, Result};

#[cfg(any(test, feature = "test_helpers"))]
pub mod testing;

#[cfg(test)]
mod mock_stream;
