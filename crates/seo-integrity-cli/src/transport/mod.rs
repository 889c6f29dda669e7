//! Envelope transport for the isolated worker.

pub mod framing;
pub mod stdio;

pub use stdio::StdioTransport;
