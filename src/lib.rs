//! A TCP server that has a language model make up its HTTP responses.
//!
//! Every connection gets exactly one read. The raw request text is handed to
//! a [`Completer`](completion::Completer), the returned text is framed with a
//! computed `Content-Length`, written back, and the connection is closed.
//! Connections are handled one at a time on a single thread.

pub mod completion;
pub mod config;
pub mod error;
pub mod framing;
pub mod handler;
pub mod prompt;
pub mod request;
pub mod server;

pub use completion::{AnthropicClient, Completer};
pub use config::Config;
pub use server::{Server, ShutdownHandle};
