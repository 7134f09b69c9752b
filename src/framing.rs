//! Turns model output into the bytes written back to the client.
//!
//! The model is told to produce a status line, headers, a blank line and a
//! body, but nothing checks that it did. Framing only needs to find the first
//! blank line, inject a `Content-Length` for whatever follows it, and make a
//! best guess at the status code for the access log.

use serde_json::json;

use crate::error::FramingError;

/// The line ending convention detected in the completion text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Separator {
    CrLf,
    Lf,
}

impl Separator {
    pub fn line(self) -> &'static str {
        match self {
            Separator::CrLf => "\r\n",
            Separator::Lf => "\n",
        }
    }

    pub fn blank_line(self) -> &'static str {
        match self {
            Separator::CrLf => "\r\n\r\n",
            Separator::Lf => "\n\n",
        }
    }

    /// `\r\n\r\n` wins whenever it appears at all, even if a `\n\n` shows up
    /// earlier in the text.
    pub fn detect(text: &str) -> Option<Self> {
        [Separator::CrLf, Separator::Lf]
            .into_iter()
            .find(|sep| text.contains(sep.blank_line()))
    }
}

/// A response ready to be written to the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Framed {
    pub bytes: Vec<u8>,
    /// Best-effort status, for logging. Not a statement about the response.
    pub status: u16,
    /// Byte length of the body, equal to the injected `Content-Length`.
    pub body_len: usize,
}

/// Frames completion text as a response.
///
/// The text is trimmed, then split at the first blank line. The body may
/// contain further blank lines; they are left alone.
///
/// # Returns
///
/// The framed response, or `FramingError::MissingSeparator` if the text has
/// no blank line in either convention.
///
pub fn frame(completion: &str) -> Result<Framed, FramingError> {
    let completion = completion.trim();

    let sep = Separator::detect(completion).ok_or(FramingError::MissingSeparator)?;
    let (headers, body) = completion
        .split_once(sep.blank_line())
        .ok_or(FramingError::MissingSeparator)?;

    let body_len = body.len();
    let line = sep.line();
    let response = format!("{headers}{line}Content-Length: {body_len}{line}{line}{body}");

    // A CRLF-framed reply can still use bare `\n` inside its header block.
    let status_line = if headers.contains(line) {
        headers.split(line).next()
    } else {
        headers.split('\n').next()
    }
    .unwrap_or_default();

    Ok(Framed {
        bytes: response.into_bytes(),
        status: status_code(status_line),
        body_len,
    })
}

/// Reads the status code out of a status line such as `HTTP/1.1 404 Not Found`.
///
/// Only lines containing `HTTP/` are considered; anything unparseable is
/// reported as 200.
pub fn status_code(status_line: &str) -> u16 {
    if !status_line.contains("HTTP/") {
        return 200;
    }

    status_line
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse().ok())
        .unwrap_or(200)
}

/// The fixed 500 response sent when anything before the write fails.
///
/// # Arguments
///
/// * `error` - The failure; only its `Display` output is used.
///
pub fn fallback(error: &dyn std::fmt::Display) -> Framed {
    let body = json!({
        "error": format!("Internal Server Error: {error}"),
        "status": "error",
    })
    .to_string();

    let body_len = body.len();
    let response = format!(
        concat!(
            "HTTP/1.1 500 Internal Server Error\n",
            "Content-Type: application/json\n",
            "Content-Length: {}\n",
            "Connection: close\n",
            "\n",
            "{}"
        ),
        body_len, body
    );

    Framed {
        bytes: response.into_bytes(),
        status: 500,
        body_len,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(framed: &Framed) -> &str {
        std::str::from_utf8(&framed.bytes).unwrap()
    }

    fn content_lengths(response: &str) -> Vec<usize> {
        response
            .lines()
            .filter_map(|l| l.strip_prefix("Content-Length: "))
            .map(|v| v.trim().parse().unwrap())
            .collect()
    }

    #[test]
    fn lf_response_gets_content_length() {
        let framed = frame(
            "HTTP/1.1 200 OK\nContent-Type: text/plain\nConnection: close\n\nhello",
        )
        .unwrap();

        assert_eq!(
            text(&framed),
            "HTTP/1.1 200 OK\nContent-Type: text/plain\nConnection: close\nContent-Length: 5\n\nhello"
        );
        assert_eq!(framed.status, 200);
        assert_eq!(framed.body_len, 5);
    }

    #[test]
    fn crlf_response_keeps_crlf() {
        let framed =
            frame("HTTP/1.1 404 Not Found\r\nContent-Type: text/html\r\n\r\n<h1>nope</h1>")
                .unwrap();

        assert_eq!(
            text(&framed),
            "HTTP/1.1 404 Not Found\r\nContent-Type: text/html\r\nContent-Length: 13\r\n\r\n<h1>nope</h1>"
        );
        assert_eq!(framed.status, 404);
    }

    #[test]
    fn crlf_is_preferred_over_earlier_lf() {
        assert_eq!(Separator::detect("a\n\nb\r\n\r\nc"), Some(Separator::CrLf));

        let framed = frame("HTTP/1.1 201 Created\n\nx\r\n\r\ny").unwrap();
        assert_eq!(
            text(&framed),
            "HTTP/1.1 201 Created\n\nx\r\nContent-Length: 1\r\n\r\ny"
        );
        assert_eq!(framed.body_len, 1);
    }

    #[test]
    fn only_first_blank_line_splits() {
        let framed = frame("HTTP/1.1 200 OK\n\nfirst\n\nsecond").unwrap();

        assert_eq!(framed.body_len, "first\n\nsecond".len());
        assert!(text(&framed).ends_with("Content-Length: 13\n\nfirst\n\nsecond"));
        assert_eq!(content_lengths(text(&framed)), vec![13]);
    }

    #[test]
    fn body_length_counts_bytes_not_chars() {
        let framed = frame("HTTP/1.1 200 OK\n\nこんにちは").unwrap();
        assert_eq!(framed.body_len, 15);
        assert_eq!(content_lengths(text(&framed)), vec![15]);
    }

    #[test]
    fn surrounding_whitespace_is_trimmed() {
        let framed = frame("\n\n  HTTP/1.1 200 OK\n\nbody\n\n").unwrap();
        assert!(text(&framed).starts_with("HTTP/1.1 200 OK\n"));
        assert!(text(&framed).ends_with("\n\nbody"));
    }

    #[test]
    fn missing_separator_is_an_error() {
        assert_eq!(
            frame("HTTP/1.1 200 OK\nContent-Type: text/plain"),
            Err(FramingError::MissingSeparator)
        );
        assert_eq!(frame(""), Err(FramingError::MissingSeparator));
    }

    #[test]
    fn framing_is_deterministic() {
        let input = "HTTP/1.1 200 OK\r\nX: y\r\n\r\nsame";
        assert_eq!(frame(input).unwrap(), frame(input).unwrap());
    }

    #[test]
    fn status_defaults_to_200() {
        assert_eq!(status_code("HTTP/1.1 418 I'm a teapot"), 418);
        assert_eq!(status_code("200 OK"), 200);
        assert_eq!(status_code("Status: 404"), 200);
        assert_eq!(status_code("HTTP/1.1 abc"), 200);
        assert_eq!(status_code("HTTP/1.1"), 200);
        assert_eq!(status_code("garbage"), 200);
        assert_eq!(status_code(""), 200);
    }

    #[test]
    fn lf_headers_before_crlf_blank_line_use_first_lf_line() {
        let framed = frame("A 503\nHTTP/1.1 x\r\n\r\nbody").unwrap();
        assert_eq!(framed.status, 200);

        let framed = frame("HTTP/1.1 404 Not Found\nX-A: b\r\n\r\nbody").unwrap();
        assert_eq!(framed.status, 404);
    }

    #[test]
    fn out_of_range_status_falls_back_to_200() {
        assert_eq!(status_code("HTTP/1.1 99999 Way Too Big"), 200);
        assert_eq!(status_code("HTTP/1.1 -1 Negative"), 200);
    }

    #[test]
    fn status_only_reads_first_header_line() {
        let framed = frame("Here you go:\nHTTP/1.1 503 Unavailable\n\nbody").unwrap();
        assert_eq!(framed.status, 200);
    }

    #[test]
    fn fallback_has_json_body_and_correct_length() {
        let framed = fallback(&"boom");
        let response = text(&framed);

        assert!(response.starts_with("HTTP/1.1 500 Internal Server Error\n"));
        assert!(response.contains("Content-Type: application/json\n"));
        assert!(response.contains("Connection: close\n"));
        assert_eq!(framed.status, 500);

        let (_, body) = response.split_once("\n\n").unwrap();
        assert_eq!(content_lengths(response), vec![body.len()]);
        assert_eq!(framed.body_len, body.len());

        let body: serde_json::Value = serde_json::from_str(body).unwrap();
        assert_eq!(body["error"], "Internal Server Error: boom");
        assert_eq!(body["status"], "error");
    }

    #[test]
    fn fallback_escapes_message() {
        let framed = fallback(&"quote \" and\nnewline");
        let response = text(&framed);
        let (_, body) = response.split_once("\n\n").unwrap();

        let body: serde_json::Value = serde_json::from_str(body).unwrap();
        assert_eq!(body["error"], "Internal Server Error: quote \" and\nnewline");
    }
}
