//! Framed-message codec over the editor's byte streams.
//!
//! One message is a `Content-Length: <N>` header line, a blank separator
//! line, then exactly `N` body bytes. Bodies are single-line JSON; the codec
//! itself is indifferent to their shape. Reading accepts both CRLF and bare
//! LF line endings; writing always emits CRLF.

use std::io::{BufRead, ErrorKind, Write};

use tracing::debug;

use crate::error::Error;

const CONTENT_LENGTH: &str = "Content-Length:";

/// Reads framed message bodies from a buffered stream.
pub struct FrameReader<R> {
    inner: R,
}

impl<R: BufRead> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Read one framed body. End-of-stream at any point maps to
    /// [`Error::PeerClosed`]; a malformed header or separator is a protocol
    /// error.
    pub fn read_frame(&mut self) -> Result<String, Error> {
        let header = self.read_line()?;
        let length: usize = header
            .strip_prefix(CONTENT_LENGTH)
            .ok_or_else(|| Error::Protocol(format!("expected Content-Length header, got {header:?}")))?
            .trim()
            .parse()
            .map_err(|_| Error::Protocol(format!("bad Content-Length in {header:?}")))?;

        let separator = self.read_line()?;
        if !separator.is_empty() {
            return Err(Error::Protocol(format!(
                "expected blank separator line, got {separator:?}"
            )));
        }

        let mut body = vec![0u8; length];
        self.inner.read_exact(&mut body).map_err(|err| {
            if err.kind() == ErrorKind::UnexpectedEof {
                Error::PeerClosed
            } else {
                Error::Io(err)
            }
        })?;
        let body = String::from_utf8(body)
            .map_err(|_| Error::Protocol("message body is not valid utf-8".to_string()))?;
        debug!(target: "wire", "=> {body}");
        Ok(body)
    }

    fn read_line(&mut self) -> Result<String, Error> {
        let mut line = String::new();
        if self.inner.read_line(&mut line)? == 0 {
            return Err(Error::PeerClosed);
        }
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(line)
    }
}

/// Writes framed message bodies to a stream, flushing per message.
pub struct FrameWriter<W> {
    inner: W,
}

impl<W: Write> FrameWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Frame and send one body. The body must not contain a raw newline; the
    /// header relies on it.
    pub fn write_frame(&mut self, body: &str) -> Result<(), Error> {
        if body.contains('\n') || body.contains('\r') {
            return Err(Error::Protocol(
                "message body contains a raw newline".to_string(),
            ));
        }
        write!(self.inner, "Content-Length: {}\r\n\r\n{}", body.len(), body)?;
        self.inner.flush()?;
        debug!(target: "wire", "<= {body}");
        Ok(())
    }
}
