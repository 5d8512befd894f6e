//! Output handling.
//!
//! - Tee sinks that receive live output while it is captured
//! - ANSI escape stripping for pseudo-terminal output
//!
//! # Example
//!
//! ```
//! use shell_cmd::output::OutputSanitizer;
//!
//! let raw = b"\x1b[31mRed text\x1b[0m\r\n";
//! let clean = OutputSanitizer::strip_ansi(raw);
//! assert_eq!(clean, "Red text\n");
//! ```

mod sanitizer;
mod tee;

pub use sanitizer::OutputSanitizer;
pub use tee::{BufferSink, StdioSink, TeeSink};
