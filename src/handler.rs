use std::{
    fmt,
    io::{Read, Write},
    net::IpAddr,
    time::{Duration, Instant},
};

use chrono::{DateTime, Utc};
use tracing::{error, info};

use crate::{
    completion::Completer,
    error::HandlerError,
    framing::{self, Framed},
    prompt,
    request::{self, RequestLine},
};

/// What happened to a connection, once it is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The client sent nothing. No response, no log line.
    Empty,
    /// A response was written. `size` is the body length.
    Responded { status: u16, size: usize },
    /// The connection itself failed; nothing (or not everything) was written.
    Failed,
}

/// One access-log line, in roughly the combined log format.
///
/// Fields that are not known yet print as `-`.
#[derive(Debug)]
pub struct AccessLog<'a> {
    pub client: IpAddr,
    pub timestamp: DateTime<Utc>,
    pub line: &'a RequestLine,
    pub status: Option<u16>,
    pub size: Option<usize>,
    pub elapsed: Option<Duration>,
}

impl<'a> AccessLog<'a> {
    pub fn new(client: IpAddr, line: &'a RequestLine) -> Self {
        AccessLog {
            client,
            timestamp: Utc::now(),
            line,
            status: None,
            size: None,
            elapsed: None,
        }
    }

    pub fn finished(mut self, status: u16, size: usize, elapsed: Duration) -> Self {
        self.status = Some(status);
        self.size = Some(size);
        self.elapsed = Some(elapsed);
        self
    }
}

fn dash<T: fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

impl fmt::Display for AccessLog<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - - [{}] \"{} {} HTTP/1.1\" {} {} \"-\" \"-\" ",
            self.client,
            self.timestamp.format("%d/%b/%Y:%H:%M:%S +0000"),
            self.line.method,
            self.line.path,
            dash(self.status),
            dash(self.size),
        )?;

        match self.elapsed {
            Some(elapsed) => write!(f, "{:.3}s", elapsed.as_secs_f64()),
            None => f.write_str("-"),
        }
    }
}

/// Handles a single request/response cycle on a connection.
///
/// Reads once, asks the completer for a response, frames it and writes it
/// back. Completion and framing failures are answered with the fixed 500
/// response; failures of the connection itself are only logged. The
/// connection is dropped, and therefore closed, before this returns.
///
/// # Arguments
///
/// * `connection` - The accepted connection, usually a `TcpStream`.
/// * `client` - Peer address, for the access log.
/// * `completer` - Produces the response text.
///
pub fn handle_connection<S, C>(mut connection: S, client: IpAddr, completer: &C) -> Outcome
where
    S: Read + Write,
    C: Completer + ?Sized,
{
    let start = Instant::now();
    let mut line = RequestLine::default();

    match respond(&mut connection, client, completer, &mut line) {
        Ok(None) => Outcome::Empty,
        Ok(Some(framed)) => {
            let log = AccessLog::new(client, &line).finished(
                framed.status,
                framed.body_len,
                start.elapsed(),
            );
            info!("{log}");

            Outcome::Responded {
                status: framed.status,
                size: framed.body_len,
            }
        }
        Err(e) => {
            let log = AccessLog::new(client, &line).finished(500, 0, start.elapsed());
            error!("{log} Error: {e}");

            Outcome::Failed
        }
    }
}

fn respond<S, C>(
    connection: &mut S,
    client: IpAddr,
    completer: &C,
    line: &mut RequestLine,
) -> Result<Option<Framed>, HandlerError>
where
    S: Read + Write,
    C: Completer + ?Sized,
{
    let Some(raw) = request::read_request(connection)? else {
        return Ok(None);
    };

    *line = RequestLine::parse(&raw);
    info!("{} Request received", AccessLog::new(client, line));

    let framed = generate(&raw, completer);

    connection.write_all(&framed.bytes)?;
    connection.flush()?;

    Ok(Some(framed))
}

/// Prompt, complete and frame. Never fails: any error becomes the fallback
/// response.
pub fn generate<C: Completer + ?Sized>(raw_request: &str, completer: &C) -> Framed {
    let prompt = prompt::build(raw_request);

    let framed = completer
        .complete(prompt.system, &prompt.user)
        .map_err(|e| e.to_string())
        .and_then(|text| framing::frame(&text).map_err(|e| e.to_string()));

    framed.unwrap_or_else(|e| {
        error!("Error: {e}");
        framing::fallback(&e)
    })
}
