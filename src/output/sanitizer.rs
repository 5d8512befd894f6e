//! Output sanitization for pseudo-terminal output.

use vte::{Params, Parser, Perform};

/// Output sanitizer using VTE parser.
pub struct OutputSanitizer;

impl OutputSanitizer {
    /// Strip ANSI escape codes from raw bytes.
    ///
    /// Returns clean UTF-8 text with all control sequences removed and the
    /// terminal's `\r\n` line endings folded to `\n`.
    pub fn strip_ansi(input: &[u8]) -> String {
        let mut extractor = PlainTextExtractor::new();
        let mut parser = Parser::new();

        parser.advance(&mut extractor, input);

        extractor.into_string()
    }
}

/// VTE performer that extracts plain text.
struct PlainTextExtractor {
    output: Vec<u8>,
    pending_cr: bool,
}

impl PlainTextExtractor {
    fn new() -> Self {
        Self {
            output: Vec::new(),
            pending_cr: false,
        }
    }

    /// Emit a carriage return held back while waiting for a newline.
    fn flush_cr(&mut self) {
        if self.pending_cr {
            self.output.push(b'\r');
            self.pending_cr = false;
        }
    }

    fn into_string(mut self) -> String {
        self.flush_cr();
        String::from_utf8_lossy(&self.output).into_owned()
    }
}

impl Perform for PlainTextExtractor {
    fn print(&mut self, c: char) {
        self.flush_cr();
        let mut buf = [0u8; 4];
        let encoded = c.encode_utf8(&mut buf);
        self.output.extend_from_slice(encoded.as_bytes());
    }

    fn execute(&mut self, byte: u8) {
        match byte {
            0x0D => {
                self.flush_cr();
                self.pending_cr = true;
            }
            0x0A => {
                self.pending_cr = false;
                self.output.push(byte);
            }
            0x09 => {
                self.flush_cr();
                self.output.push(byte);
            }
            // Bells, backspaces and the like
            _ => {}
        }
    }

    fn hook(&mut self, _params: &Params, _intermediates: &[u8], _ignore: bool, _action: char) {}

    fn put(&mut self, _byte: u8) {}

    fn unhook(&mut self) {}

    fn osc_dispatch(&mut self, _params: &[&[u8]], _bell_terminated: bool) {}

    fn csi_dispatch(
        &mut self,
        _params: &Params,
        _intermediates: &[u8],
        _ignore: bool,
        _action: char,
    ) {
        // Cursor movement, colors, etc.
    }

    fn esc_dispatch(&mut self, _intermediates: &[u8], _ignore: bool, _byte: u8) {}
}
