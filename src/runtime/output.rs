//! Output sinks for generated renderers.
//!
//! `Output` is the text contract every renderer writes through;
//! `EncodedOutput` adds a declared charset and byte writes so renderers can
//! emit pre-encoded literals. Adapters wrap `std::fmt::Write` and
//! `std::io::Write` sinks.

use std::convert::Infallible;
use std::fmt;
use std::io;

use crate::config::Charset;

/// A character sink. The only write primitive generated code needs.
pub trait Output {
    type Error;

    fn write_str(&mut self, s: &str) -> Result<(), Self::Error>;
}

impl Output for String {
    type Error = Infallible;

    fn write_str(&mut self, s: &str) -> Result<(), Self::Error> {
        self.push_str(s);
        Ok(())
    }
}

/// Adapts any `std::fmt::Write` sink.
pub struct FmtOutput<W>(pub W);

impl<W: fmt::Write> Output for FmtOutput<W> {
    type Error = fmt::Error;

    fn write_str(&mut self, s: &str) -> Result<(), Self::Error> {
        self.0.write_str(s)
    }
}

/// Adapts any `std::io::Write` sink, writing UTF-8 text.
pub struct IoOutput<W>(pub W);

impl<W: io::Write> Output for IoOutput<W> {
    type Error = io::Error;

    fn write_str(&mut self, s: &str) -> Result<(), Self::Error> {
        self.0.write_all(s.as_bytes())
    }
}

/// A byte sink with a declared charset. Text writes are transcoded; byte
/// writes take pre-encoded content as-is. The renderer's `write` entry point
/// checks that the declared charset matches the template's before any byte
/// reaches the sink.
pub trait EncodedOutput: Output {
    fn charset(&self) -> Charset;

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), Self::Error>;
}

fn transcode(s: &str, charset: Charset, out: &mut Vec<u8>) {
    match charset {
        Charset::Utf8 => out.extend_from_slice(s.as_bytes()),
        Charset::Latin1 => {
            // Unmappable characters degrade to `?`, matching the lossy
            // behavior of charset encoders elsewhere.
            out.extend(s.chars().map(|c| u8::try_from(c as u32).unwrap_or(b'?')));
        }
    }
}

/// An in-memory byte sink.
pub struct EncodedBuffer {
    charset: Charset,
    bytes: Vec<u8>,
}

impl EncodedBuffer {
    pub fn new(charset: Charset) -> Self {
        Self { charset, bytes: Vec::new() }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl Output for EncodedBuffer {
    type Error = Infallible;

    fn write_str(&mut self, s: &str) -> Result<(), Self::Error> {
        transcode(s, self.charset, &mut self.bytes);
        Ok(())
    }
}

impl EncodedOutput for EncodedBuffer {
    fn charset(&self) -> Charset {
        self.charset
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        self.bytes.extend_from_slice(bytes);
        Ok(())
    }
}

/// A byte sink over any `std::io::Write`.
pub struct EncodedWriter<W> {
    charset: Charset,
    writer: W,
}

impl<W: io::Write> EncodedWriter<W> {
    pub fn new(charset: Charset, writer: W) -> Self {
        Self { charset, writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: io::Write> Output for EncodedWriter<W> {
    type Error = io::Error;

    fn write_str(&mut self, s: &str) -> Result<(), Self::Error> {
        let mut buf = Vec::with_capacity(s.len());
        transcode(s, self.charset, &mut buf);
        self.writer.write_all(&buf)
    }
}

impl<W: io::Write> EncodedOutput for EncodedWriter<W> {
    fn charset(&self) -> Charset {
        self.charset
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        self.writer.write_all(bytes)
    }
}
