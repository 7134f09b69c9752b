use std::io::Read;

use crate::error::HandlerError;

/// The most we will ever read from a connection. Anything past this is
/// silently dropped.
pub const READ_BUFFER_SIZE: usize = 4096;

/// Reads the request from a freshly accepted connection.
///
/// Unlike a real HTTP server this issues exactly one `read` and does not loop
/// until `\r\n\r\n`; whatever the first read returns is the whole request.
///
/// # Arguments
///
/// * `connection` - Anything readable, usually a `TcpStream`.
///
/// # Returns
///
/// `Ok(None)` if the client sent nothing (the caller should just close),
/// otherwise the decoded request text.
///
pub fn read_request<R: Read>(
    connection: &mut R,
) -> Result<Option<String>, HandlerError> {
    let mut request = [0u8; READ_BUFFER_SIZE];

    // `read` hands back however many bytes have arrived so far, up to the
    // size of the buffer. We take that as the whole request; anything that
    // arrives later, or that did not fit, is never looked at.
    let read = connection.read(&mut request)?;

    // Zero bytes means the client closed the connection without sending
    // anything.
    if read == 0 {
        return Ok(None);
    }

    // A multi-byte character cut off by the buffer edge also fails here.
    let request = std::str::from_utf8(&request[..read])?;
    Ok(Some(request.to_owned()))
}

/// Method and path of a request, used for logging only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    pub method: String,
    pub path: String,
}

impl Default for RequestLine {
    fn default() -> Self {
        RequestLine {
            method: "UNKNOWN".to_string(),
            path: "/".to_string(),
        }
    }
}

impl RequestLine {
    /// Pulls method and path out of the first line. Falls back to
    /// `UNKNOWN /` when the line has fewer than two tokens.
    pub fn parse(raw: &str) -> Self {
        let first = raw.split('\n').next().unwrap_or_default();
        let mut parts = first.split_whitespace();

        match (parts.next(), parts.next()) {
            (Some(method), Some(path)) => RequestLine {
                method: method.to_string(),
                path: path.to_string(),
            },
            _ => RequestLine::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Cursor};

    #[test]
    fn parses_method_and_path() {
        let line = RequestLine::parse("GET /index.html HTTP/1.1\r\nHost: x\r\n\r\n");
        assert_eq!(line.method, "GET");
        assert_eq!(line.path, "/index.html");
    }

    #[test]
    fn short_first_line_falls_back_to_sentinels() {
        assert_eq!(RequestLine::parse("GET\r\n\r\n"), RequestLine::default());
        assert_eq!(RequestLine::parse(""), RequestLine::default());
        assert_eq!(RequestLine::parse("\nGET / HTTP/1.1"), RequestLine::default());

        let line = RequestLine::parse("   ");
        assert_eq!(line.method, "UNKNOWN");
        assert_eq!(line.path, "/");
    }

    #[test]
    fn empty_read_means_no_request() {
        let mut empty = Cursor::new(Vec::new());
        assert_eq!(read_request(&mut empty).unwrap(), None);
    }

    #[test]
    fn reads_are_truncated_at_buffer_size() {
        let mut big = Cursor::new(vec![b'a'; READ_BUFFER_SIZE + 100]);
        let request = read_request(&mut big).unwrap().unwrap();
        assert_eq!(request.len(), READ_BUFFER_SIZE);
    }

    #[test]
    fn invalid_utf8_is_a_decode_error() {
        let mut bad = Cursor::new(vec![b'G', 0xff, 0xfe]);
        assert!(matches!(
            read_request(&mut bad),
            Err(HandlerError::Decode(_))
        ));
    }

    #[test]
    fn only_one_read_is_issued() {
        // Hands out the request in two pieces; only the first should be seen.
        struct Chunked(Vec<&'static [u8]>);

        impl Read for Chunked {
            fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
                if self.0.is_empty() {
                    return Ok(0);
                }
                let chunk = self.0.remove(0);
                buf[..chunk.len()].copy_from_slice(chunk);
                Ok(chunk.len())
            }
        }

        let mut conn = Chunked(vec![b"GET / HTTP/1.1\r\n", b"Host: x\r\n\r\n"]);
        let request = read_request(&mut conn).unwrap().unwrap();
        assert_eq!(request, "GET / HTTP/1.1\r\n");
    }
}
