use std::error::Error;
use std::io::{self, BufRead, Write};

use clap::Parser;
use pop3_browse::{ClientBuilder, Connection, ConnectionMode, Session};
use tracing_subscriber::filter::LevelFilter;

/// Browse a POP3 mailbox from the terminal.
///
/// Anything not given on the command line or in the environment is asked for interactively.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Server to connect to
    #[arg(long, env = "POP3_HOST")]
    host: Option<String>,

    /// Port to connect to [default: 110, or 995 with --tls]
    #[arg(long, env = "POP3_PORT")]
    port: Option<u16>,

    /// Connect over TLS
    #[arg(long)]
    tls: bool,

    /// Do not verify the server certificate
    #[arg(long)]
    insecure: bool,

    /// User name to log in with
    #[arg(short, long, env = "POP3_USER")]
    user: Option<String>,

    /// Print every line sent to and received from the server
    #[arg(long)]
    debug: bool,

    /// Log connection details
    #[arg(short, long)]
    verbose: bool,
}

const DEFAULT_HOST: &str = "localhost";
const RULE: &str = "========================================";

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_max_level(if args.verbose {
            LevelFilter::DEBUG
        } else {
            LevelFilter::WARN
        })
        .init();

    let stdin = io::stdin();
    let mut input = stdin.lock();

    let host = match args.host {
        Some(host) => host,
        None => read_host(&mut input)?,
    };
    let mode = connection_mode(args.tls)?;
    let port = match args.port {
        Some(port) => port,
        None => read_port(&mut input, mode.default_port())?,
    };
    let user = match args.user {
        Some(user) => user,
        None => read_required(&mut input, "Enter your username:")?,
    };
    let password = read_password()?;

    let mut builder = ClientBuilder::new(host.as_str(), port);
    builder.mode(mode);
    #[cfg(any(feature = "native-tls", feature = "rustls-tls"))]
    builder.danger_skip_tls_verify(args.insecure);
    #[cfg(not(any(feature = "native-tls", feature = "rustls-tls")))]
    let _ = args.insecure;
    let mut client = builder.connect()?;
    client.debug = args.debug;

    let mut session = client.login(&user, &password).map_err(|(e, client)| {
        if let Err(e) = client.quit() {
            log::debug!("QUIT after failed login failed: {}", e);
        }
        e
    })?;
    println!("Connected to {} on port {} as {}", host, port, user);

    let count = session.message_count()?;
    println!("{}", RULE);
    for index in 1..=count {
        match session.summary(index) {
            Ok(summary) => println!("[{}] {}", index, summary),
            Err(e) if !e.is_fatal() => println!("[{}] {}", index, e),
            Err(e) => return Err(e.into()),
        }
    }
    println!("{}", RULE);
    println!("Total amount of messages: {}", count);

    browse(&mut input, &mut session)?;

    println!("Closing connection...");
    session.quit()?;
    Ok(())
}

/// Shows messages by number until the user types `close` or input ends.
fn browse(
    input: &mut impl BufRead,
    session: &mut Session<Connection>,
) -> Result<(), Box<dyn Error>> {
    const QUESTION: &str = "Enter the number of the message you want to read or close to exit:";
    loop {
        let command = match prompt(input, QUESTION)? {
            Some(command) => command,
            None => return Ok(()),
        };
        println!("{}", RULE);
        if command == "close" {
            return Ok(());
        }

        match command.parse() {
            Ok(index) => match session.retrieve(index) {
                Ok(message) => print!("{}", message),
                Err(pop3_browse::Error::NotFound(_)) => println!("Message not found!"),
                Err(e) if !e.is_fatal() => println!("{}", e),
                Err(e) => return Err(e.into()),
            },
            Err(_) => println!("Invalid input!"),
        }
        println!("{}", RULE);
    }
}

#[cfg(any(feature = "native-tls", feature = "rustls-tls"))]
fn connection_mode(tls: bool) -> Result<ConnectionMode, Box<dyn Error>> {
    Ok(if tls {
        ConnectionMode::Tls
    } else {
        ConnectionMode::Plaintext
    })
}

#[cfg(not(any(feature = "native-tls", feature = "rustls-tls")))]
fn connection_mode(tls: bool) -> Result<ConnectionMode, Box<dyn Error>> {
    if tls {
        return Err("this build has no TLS support".into());
    }
    Ok(ConnectionMode::Plaintext)
}

/// Prints `message` and reads one trimmed line. `None` means end of input.
fn prompt(input: &mut impl BufRead, message: &str) -> io::Result<Option<String>> {
    println!("{}", message);
    io::stdout().flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

fn read_host(input: &mut impl BufRead) -> Result<String, Box<dyn Error>> {
    let message = format!("Enter the host you want to connect to ('{}'):", DEFAULT_HOST);
    loop {
        let host = prompt(input, &message)?.ok_or("no host given")?;
        if host.is_empty() {
            return Ok(DEFAULT_HOST.to_string());
        }
        if host.contains(char::is_whitespace) {
            println!("Host cannot contain spaces!");
            continue;
        }
        return Ok(host);
    }
}

fn read_port(input: &mut impl BufRead, default: u16) -> Result<u16, Box<dyn Error>> {
    let message = format!("Enter the port you want to connect to ({}):", default);
    loop {
        let port = prompt(input, &message)?.ok_or("no port given")?;
        if port.is_empty() {
            return Ok(default);
        }
        match port.parse() {
            Ok(port) => return Ok(port),
            Err(_) => println!("Invalid port number."),
        }
    }
}

fn read_required(input: &mut impl BufRead, message: &str) -> Result<String, Box<dyn Error>> {
    loop {
        let value = prompt(input, message)?.ok_or("input ended")?;
        if !value.is_empty() {
            return Ok(value);
        }
        println!("This field cannot be empty!");
    }
}

fn read_password() -> Result<String, Box<dyn Error>> {
    loop {
        let password = rpassword::prompt_password("Enter your password: ")?;
        if !password.is_empty() {
            return Ok(password);
        }
        println!("No password entered!");
    }
}
