use bufstream::BufStream;
use log::{debug, warn};
use std::io::{BufRead, Read, Write};
use std::ops::{Deref, DerefMut};
use std::time::Duration;

use super::conn::SetReadTimeout;
use super::error::{Error, Result, ValidateError};
use super::parse::{parse_stat, parse_status, unstuff, MessageParser, Status, SENTINEL};
use super::types::*;

const CR: u8 = 0x0d;
const LF: u8 = 0x0a;

macro_rules! ok_or_unauth_client_err {
    ($r:expr, $self:expr) => {
        match $r {
            Ok(o) => o,
            Err(e) => return Err((e, $self)),
        }
    };
}

fn validate_str(value: &str) -> Result<&str> {
    if value.contains('\n') {
        return Err(Error::Validate(ValidateError('\n')));
    }
    if value.contains('\r') {
        return Err(Error::Validate(ValidateError('\r')));
    }
    Ok(value)
}

/// A connection to a POP3 server that has not yet been authenticated.
///
/// This is the state right after the server's greeting. The only useful thing to do with a
/// `Client` is to [`login`](Client::login), which yields a [`Session`], or to
/// [`quit`](Client::quit).
///
/// You get a `Client` from [`ClientBuilder::connect`](crate::ClientBuilder::connect), or by
/// wrapping an already connected stream with [`Client::new`]:
///
/// ```no_run
/// # use std::net::TcpStream;
/// # fn main() -> pop3_browse::error::Result<()> {
/// let stream = TcpStream::connect(("pop.example.com", 110))?;
/// let mut client = pop3_browse::Client::new(stream);
/// client.read_greeting()?;
/// let mut session = client.login("user", "password").map_err(|e| e.0)?;
/// println!("{} messages", session.message_count()?);
/// session.quit()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Client<T: Read + Write> {
    conn: Transport<T>,
}

/// An authenticated POP3 session.
///
/// Messages are addressed by their 1-based [`MessageIndex`]. A session that is dropped without
/// calling [`quit`](Session::quit) still sends a best-effort `QUIT`.
#[derive(Debug)]
pub struct Session<T: Read + Write> {
    conn: Transport<T>,
    closed: bool,
}

/// The line-oriented channel shared by [`Client`] and [`Session`].
///
/// Every command is one line; every reply is a status line, optionally followed by content
/// lines up to a line holding a single `.`.
#[derive(Debug)]
#[doc(hidden)]
pub struct Transport<T: Read + Write> {
    pub(crate) stream: BufStream<T>,

    /// Enable debug mode for this connection so that all client-server interactions are
    /// printed to `STDERR`.
    pub debug: bool,

    /// Tracks if we have read a greeting.
    pub greeting_read: bool,
}

// `Deref` instances are so we can make use of the same underlying primitives in Client and
// Session
impl<T: Read + Write> Deref for Client<T> {
    type Target = Transport<T>;

    fn deref(&self) -> &Transport<T> {
        &self.conn
    }
}

impl<T: Read + Write> DerefMut for Client<T> {
    fn deref_mut(&mut self) -> &mut Transport<T> {
        &mut self.conn
    }
}

impl<T: Read + Write> Deref for Session<T> {
    type Target = Transport<T>;

    fn deref(&self) -> &Transport<T> {
        &self.conn
    }
}

impl<T: Read + Write> DerefMut for Session<T> {
    fn deref_mut(&mut self) -> &mut Transport<T> {
        &mut self.conn
    }
}

impl<T: Read + Write> Client<T> {
    /// Creates a new client over the given stream.
    ///
    /// Nothing is read or written; call [`read_greeting`](Client::read_greeting) next, or let
    /// [`login`](Client::login) do it for you.
    pub fn new(stream: T) -> Client<T> {
        Client {
            conn: Transport {
                stream: BufStream::new(stream),
                debug: false,
                greeting_read: false,
            },
        }
    }

    /// Reads the server's greeting line and returns it.
    pub fn read_greeting(&mut self) -> Result<String> {
        let greeting = self.conn.read_line()?;
        self.conn.greeting_read = true;
        debug!("server greeting: {}", greeting);
        Ok(greeting)
    }

    /// Log in with `USER` and `PASS`.
    ///
    /// The reply to `USER` is not inspected: some servers accept any name and only reject the
    /// pair. Login succeeds if and only if the reply to `PASS` starts with `+OK`.
    ///
    /// On failure the `Client` is handed back together with the error, so that the caller can
    /// still [`quit`](Client::quit) cleanly:
    ///
    /// ```no_run
    /// # use std::net::TcpStream;
    /// # fn main() -> pop3_browse::error::Result<()> {
    /// # let client = pop3_browse::Client::new(TcpStream::connect(("pop.example.com", 110))?);
    /// let session = match client.login("user", "wrong") {
    ///     Ok(session) => session,
    ///     Err((e, client)) => {
    ///         eprintln!("login failed: {}", e);
    ///         return client.quit();
    ///     }
    /// };
    /// # Ok(())
    /// # }
    /// ```
    pub fn login<U: AsRef<str>, P: AsRef<str>>(
        mut self,
        username: U,
        password: P,
    ) -> ::std::result::Result<Session<T>, (Error, Client<T>)> {
        let username = ok_or_unauth_client_err!(validate_str(username.as_ref()), self);
        let password = ok_or_unauth_client_err!(validate_str(password.as_ref()), self);

        if !self.conn.greeting_read {
            ok_or_unauth_client_err!(self.read_greeting(), self);
        }

        let user_reply = ok_or_unauth_client_err!(
            self.conn.run_command_and_read_line(&format!("USER {}", username)),
            self
        );
        debug!("USER reply: {}", user_reply);

        let pass_reply = ok_or_unauth_client_err!(
            self.conn.run_command_and_read_line(&format!("PASS {}", password)),
            self
        );
        match parse_status(&pass_reply) {
            Ok(Status::Ok(reply)) => {
                debug!("logged in as {}: {}", username, reply);
                Ok(Session::new(self.conn))
            }
            _ => {
                warn!("login as {} rejected: {}", username, pass_reply);
                Err((Error::Authentication(pass_reply), self))
            }
        }
    }

    /// Ends the connection without logging in.
    pub fn quit(mut self) -> Result<()> {
        self.conn.quit()
    }
}

impl<T: Read + Write> Session<T> {
    // not public, just to avoid duplicating the struct literal
    fn new(conn: Transport<T>) -> Self {
        Session {
            conn,
            closed: false,
        }
    }

    /// Returns the number of messages and the size of the maildrop, as reported by `STAT`.
    pub fn stat(&mut self) -> Result<Stat> {
        let line = self.conn.run_command_and_read_line("STAT")?;
        parse_stat(&line)
    }

    /// Returns the number of messages in the maildrop.
    ///
    /// Valid indices for [`retrieve`](Session::retrieve) are `1..=message_count()`.
    pub fn message_count(&mut self) -> Result<u32> {
        self.stat().map(|stat| stat.count)
    }

    /// Retrieves message `index` and keeps only its date and subject.
    ///
    /// The whole message is still read off the wire, but nothing past the header block is
    /// kept.
    pub fn summary(&mut self, index: MessageIndex) -> Result<Summary> {
        let mut parser = MessageParser::headers_only();
        self.retrieve_into(index, &mut parser)?;
        Ok(parser.finish_summary())
    }

    /// Retrieves message `index`.
    ///
    /// A `-ERR` reply is reported as [`Error::NotFound`], after which the session can be used
    /// as before.
    pub fn retrieve(&mut self, index: MessageIndex) -> Result<Message> {
        let mut parser = MessageParser::new();
        self.retrieve_into(index, &mut parser)?;
        Ok(parser.finish())
    }

    fn retrieve_into(&mut self, index: MessageIndex, parser: &mut MessageParser) -> Result<()> {
        if index == 0 {
            return Err(Error::NotFound("message indices start at 1".to_string()));
        }
        let line = self
            .conn
            .run_command_and_read_line(&format!("RETR {}", index))?;
        match parse_status(&line)? {
            Status::Ok(_) => self.conn.read_multiline(|line| parser.push_line(line)),
            Status::Err(line) => Err(Error::NotFound(line)),
        }
    }

    /// Ends the session with `QUIT` and releases the stream.
    ///
    /// The server's reply is read but not interpreted.
    pub fn quit(mut self) -> Result<()> {
        self.closed = true;
        self.conn.quit()
    }
}

impl<T: Read + Write + SetReadTimeout> Session<T> {
    /// Set a timeout for subsequent reads from the server.
    ///
    /// Without one, a server that stops responding blocks the session forever.
    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        self.conn.stream.get_mut().set_read_timeout(timeout)
    }
}

impl<T: Read + Write> Drop for Session<T> {
    fn drop(&mut self) {
        if !self.closed {
            // we don't want to panic here if the connection is already gone
            if let Err(e) = self.conn.quit() {
                debug!("QUIT on drop failed: {}", e);
            }
        }
    }
}

impl<T: Read + Write> Transport<T> {
    /// Runs any command passed to it.
    pub(crate) fn run_command(&mut self, command: &str) -> Result<()> {
        self.write_line(command.as_bytes())
    }

    /// Runs a command and reads the single status line that answers it.
    pub(crate) fn run_command_and_read_line(&mut self, command: &str) -> Result<String> {
        self.run_command(command)?;
        self.read_line()
    }

    /// Reads content lines up to the terminating `.`, undoing byte-stuffing.
    ///
    /// Each line is handed to `each_line` and then dropped.
    pub(crate) fn read_multiline<F>(&mut self, mut each_line: F) -> Result<()>
    where
        F: FnMut(&str),
    {
        loop {
            let line = self.read_line()?;
            if line == SENTINEL {
                return Ok(());
            }
            each_line(unstuff(&line));
        }
    }

    fn quit(&mut self) -> Result<()> {
        self.run_command("QUIT")?;
        let mut v = Vec::new();
        self.readline(&mut v)?;
        Ok(())
    }

    /// Reads one line and strips its terminator. Bytes that are not UTF-8 are replaced.
    pub(crate) fn read_line(&mut self) -> Result<String> {
        let mut v = Vec::new();
        self.readline(&mut v)?;
        if v.last() == Some(&LF) {
            v.pop();
            if v.last() == Some(&CR) {
                v.pop();
            }
        }
        Ok(String::from_utf8_lossy(&v).into_owned())
    }

    pub(crate) fn readline(&mut self, into: &mut Vec<u8>) -> Result<usize> {
        let read = self.stream.read_until(LF, into)?;
        if read == 0 {
            return Err(Error::ConnectionLost);
        }

        if self.debug {
            let len = into.len();
            let line = &into[(len - read)..len];
            eprint!("S: {}", String::from_utf8_lossy(line));
        }

        Ok(read)
    }

    pub(crate) fn write_line(&mut self, buf: &[u8]) -> Result<()> {
        self.stream.write_all(buf)?;
        self.stream.write_all(&[CR, LF])?;
        self.stream.flush()?;
        if self.debug {
            if buf.starts_with(b"PASS ") {
                eprintln!("C: PASS ****");
            } else {
                eprintln!("C: {}", String::from_utf8_lossy(buf));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::error::ParseError;
    use super::super::mock_stream::MockStream;
    use super::*;

    macro_rules! mock_session {
        ($s:expr) => {
            Session::new(Client::new($s).conn)
        };
    }

    fn written(session: &Session<MockStream>) -> String {
        String::from_utf8(session.stream.get_ref().written_buf.clone()).unwrap()
    }

    #[test]
    fn read_greeting() {
        let greeting = "+OK Dovecot ready.\r\n";
        let mock_stream = MockStream::new(greeting.as_bytes().to_vec());
        let mut client = Client::new(mock_stream);
        assert_eq!(client.read_greeting().unwrap(), "+OK Dovecot ready.");
        assert!(client.greeting_read);
    }

    #[test]
    fn readline_delay_read() {
        let greeting = "+OK POP3 ready.\r\n";
        let expected_response: String = greeting.to_string();
        let mock_stream = MockStream::default()
            .with_buf(greeting.as_bytes().to_vec())
            .with_delay();
        let mut client = Client::new(mock_stream);
        let mut v = Vec::new();
        client.readline(&mut v).unwrap();
        let actual_response = String::from_utf8(v).unwrap();
        assert_eq!(expected_response, actual_response);
    }

    #[test]
    fn readline_eof() {
        let mock_stream = MockStream::default().with_eof();
        let mut client = Client::new(mock_stream);
        let mut v = Vec::new();
        if let Err(Error::ConnectionLost) = client.readline(&mut v) {
        } else {
            unreachable!("EOF read did not return connection lost");
        }
    }

    #[test]
    fn readline_err() {
        let mock_stream = MockStream::default().with_err();
        let mut client = Client::new(mock_stream);
        let mut v = Vec::new();
        match client.readline(&mut v) {
            Err(Error::Io(_)) => {}
            r => panic!("expected an io error, got {:?}", r),
        }
    }

    #[test]
    fn read_line_strips_terminator() {
        let mock_stream = MockStream::new(b"+OK bare\n+OK crlf\r\n".to_vec());
        let mut client = Client::new(mock_stream);
        assert_eq!(client.read_line().unwrap(), "+OK bare");
        assert_eq!(client.read_line().unwrap(), "+OK crlf");
    }

    #[test]
    fn login() {
        let response = b"+OK ready\r\n+OK send PASS\r\n+OK maildrop locked\r\n".to_vec();
        let mock_stream = MockStream::new(response);
        let client = Client::new(mock_stream);
        let session = client.login("username", "password").unwrap();
        assert_eq!(written(&session), "USER username\r\nPASS password\r\n");
    }

    #[test]
    fn login_ignores_user_reply() {
        let response = b"+OK ready\r\n-ERR who?\r\n+OK maildrop locked\r\n".to_vec();
        let client = Client::new(MockStream::new(response));
        assert!(client.login("username", "password").is_ok());
    }

    #[test]
    fn login_rejected() {
        let response = b"+OK ready\r\n+OK send PASS\r\n-ERR invalid password\r\n".to_vec();
        let client = Client::new(MockStream::new(response));
        match client.login("username", "password") {
            Err((Error::Authentication(line), client)) => {
                assert_eq!(line, "-ERR invalid password");
                assert!(client.greeting_read);
            }
            Err((e, _)) => panic!("unexpected error: {:?}", e),
            Ok(_) => panic!("login should have failed"),
        }
    }

    #[test]
    fn login_rejects_unknown_status() {
        let response = b"+OK ready\r\n+OK\r\nOK fine\r\n".to_vec();
        let client = Client::new(MockStream::new(response));
        assert!(matches!(
            client.login("u", "p"),
            Err((Error::Authentication(_), _))
        ));
    }

    #[test]
    fn login_validates_before_sending() {
        let client = Client::new(MockStream::default());
        match client.login("user", "pass\r\nDELE 1") {
            Err((Error::Validate(ValidateError('\n')), client)) => {
                assert!(client.stream.get_ref().written_buf.is_empty());
            }
            Err((e, _)) => panic!("unexpected error: {:?}", e),
            Ok(_) => panic!("login should have failed"),
        }
    }

    #[test]
    fn validate_carriage_return() {
        match validate_str("test\rstring") {
            Err(Error::Validate(ValidateError('\r'))) => {}
            r => panic!("unexpected result: {:?}", r),
        }
    }

    #[test]
    fn message_count() {
        let mut session = mock_session!(MockStream::new(b"+OK 2 320\r\n".to_vec()));
        assert_eq!(session.message_count().unwrap(), 2);
        assert_eq!(written(&session), "STAT\r\n");
    }

    #[test]
    fn stat_malformed() {
        let mut session = mock_session!(MockStream::new(b"+OK lots\r\n".to_vec()));
        match session.stat() {
            Err(Error::Parse(ParseError::Stat(line))) => assert_eq!(line, "+OK lots"),
            r => panic!("unexpected result: {:?}", r),
        }
    }

    #[test]
    fn retrieve() {
        let response = b"+OK 120 octets\r\n\
            From: Jane <jane@example.com>\r\n\
            To: <bob@example.com>\r\n\
            Date: Wed, 21 Oct 2015 12:34:56 +0200 (CEST)\r\n\
            Subject: =?utf-8?B?SGVsbG8=?=\r\n \
            =?utf-8?B?IFdvcmxk?=\r\n\
            \r\n\
            first line\r\n\
            ..hidden dot\r\n\
            .\r\n"
            .to_vec();
        let mut session = mock_session!(MockStream::new(response));
        let message = session.retrieve(1).unwrap();
        assert_eq!(written(&session), "RETR 1\r\n");
        assert_eq!(message.from, "jane@example.com");
        assert_eq!(message.to, "bob@example.com");
        assert_eq!(message.date, "Wed, 21 Oct 2015 12:34:56");
        assert_eq!(message.subject, "Hello World");
        assert_eq!(message.body, "first line\n.hidden dot\n");
    }

    #[test]
    fn retrieve_not_found() {
        let response = b"-ERR no such message\r\n+OK 1 10\r\n".to_vec();
        let mut session = mock_session!(MockStream::new(response));
        match session.retrieve(7) {
            Err(Error::NotFound(line)) => assert_eq!(line, "-ERR no such message"),
            r => panic!("unexpected result: {:?}", r),
        }
        // the session is still usable
        assert_eq!(session.message_count().unwrap(), 1);
        assert_eq!(written(&session), "RETR 7\r\nSTAT\r\n");
    }

    #[test]
    fn retrieve_index_zero() {
        let mut session = mock_session!(MockStream::default());
        assert!(matches!(session.retrieve(0), Err(Error::NotFound(_))));
        assert!(session.stream.get_ref().written_buf.is_empty());
    }

    #[test]
    fn retrieve_connection_lost() {
        let response = b"+OK message follows\r\nSubject: cut\r\n".to_vec();
        let mut session = mock_session!(MockStream::new(response));
        match session.retrieve(1) {
            Err(Error::Io(_)) | Err(Error::ConnectionLost) => {}
            r => panic!("unexpected result: {:?}", r),
        }
    }

    #[test]
    fn summary_drains_to_sentinel() {
        let response = b"+OK message follows\r\n\
            Date: Wed, 21 Oct 2015 12:34:56 +0200\r\n\
            Subject: first\r\n\
            \r\n\
            body\r\n\
            .\r\n\
            +OK message follows\r\n\
            subject: second\r\n\
            .\r\n"
            .to_vec();
        let mut session = mock_session!(MockStream::new(response));
        let first = session.summary(1).unwrap();
        assert_eq!(first.date, "Wed, 21 Oct 2015 12:34:56");
        assert_eq!(first.subject, "first");
        let second = session.summary(2).unwrap();
        assert_eq!(second.date, "");
        assert_eq!(second.subject, "second");
    }

    #[test]
    fn quit() {
        let mut session = mock_session!(MockStream::new(b"+OK bye\r\n".to_vec()));
        session.closed = true;
        session.conn.quit().unwrap();
        assert_eq!(written(&session), "QUIT\r\n");
    }

    #[test]
    fn quit_consumes_session() {
        let session = mock_session!(MockStream::new(b"+OK bye\r\n".to_vec()));
        session.quit().unwrap();
    }

    #[test]
    fn read_timeout_reaches_stream() {
        let mut session = mock_session!(MockStream::default());
        session
            .set_read_timeout(Some(Duration::from_secs(30)))
            .unwrap();
        assert_eq!(
            session.stream.get_ref().read_timeout,
            Some(Duration::from_secs(30))
        );
        session.closed = true;
    }

    #[test]
    fn client_quit() {
        let client = Client::new(MockStream::new(b"+OK bye\r\n".to_vec()));
        client.quit().unwrap();
    }

    #[test]
    fn debug_masks_password() {
        let response = b"+OK ready\r\n+OK\r\n+OK\r\n".to_vec();
        let mut client = Client::new(MockStream::new(response));
        client.debug = true;
        let session = client.login("user", "secret").unwrap();
        assert_eq!(written(&session), "USER user\r\nPASS secret\r\n");
    }
}
