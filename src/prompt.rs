/// Instruction telling the model what shape of text to produce. The length
/// header is deliberately excluded; it is computed after the fact.
pub const SYSTEM_PROMPT: &str = "\
You are an HTTP server AI. Generate a complete HTTP response.

Rules:
- Follow HTTP format strictly: status line, headers, blank line, body
- Include Content-Type and Connection: close headers
- Do NOT include Content-Length header (calculated later)
- Return ONLY the HTTP response, no markdown code blocks or explanations

Example:
HTTP/1.1 200 OK
Content-Type: application/json
Connection: close

{\"message\": \"Hello, World!\"}";

/// A system instruction plus the user turn carrying the raw request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: &'static str,
    pub user: String,
}

/// Wraps the raw request text, verbatim, in a fenced block.
pub fn build(raw_request: &str) -> Prompt {
    Prompt {
        system: SYSTEM_PROMPT,
        user: format!("Process this HTTP request:\n\n```\n{raw_request}\n```"),
    }
}
