//! `Content-Length` frame codec.
//!
//! Each message on the worker wire is a header line `Content-Length: <n>`,
//! a blank line, and exactly `n` bytes of JSON body. Unknown headers are
//! tolerated; a missing length, a malformed header, or an oversized frame
//! is a typed error, never a panic.

use std::io::{BufRead, Write};

use thiserror::Error;

/// Maximum accepted frame body size.
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Errors on the framing layer.
#[derive(Debug, Error)]
pub enum FrameError {
    /// An I/O error on the underlying stream.
    #[error("i/o error on worker stream: {0}")]
    Io(#[from] std::io::Error),

    /// The stream ended before a complete frame arrived.
    #[error("worker stream closed before a complete frame arrived")]
    UnexpectedEof,

    /// A header line could not be parsed.
    #[error("malformed frame header: {header:?}")]
    MalformedHeader {
        /// The offending header line.
        header: String,
    },

    /// The headers ended without a `Content-Length`.
    #[error("frame headers ended without a Content-Length")]
    MissingLength,

    /// The declared body size exceeds [`MAX_FRAME_SIZE`].
    #[error("frame of {size} bytes exceeds the {max} byte limit")]
    TooLarge {
        /// Declared body size.
        size: usize,
        /// The accepted maximum.
        max: usize,
    },
}

/// Writes one framed message and flushes the stream.
///
/// # Errors
///
/// Returns [`FrameError::TooLarge`] for oversized bodies and
/// [`FrameError::Io`] on stream failures.
pub fn write_frame<W: Write>(writer: &mut W, body: &[u8]) -> Result<(), FrameError> {
    if body.len() > MAX_FRAME_SIZE {
        return Err(FrameError::TooLarge {
            size: body.len(),
            max: MAX_FRAME_SIZE,
        });
    }
    write!(writer, "Content-Length: {}\r\n\r\n", body.len())?;
    writer.write_all(body)?;
    writer.flush()?;
    Ok(())
}

/// Reads one framed message body.
///
/// # Errors
///
/// Returns a [`FrameError`] describing the first protocol violation or
/// stream failure encountered.
pub fn read_frame<R: BufRead>(reader: &mut R) -> Result<Vec<u8>, FrameError> {
    let mut length: Option<usize> = None;
    loop {
        let mut line = String::new();
        let read = reader.read_line(&mut line)?;
        if read == 0 {
            return Err(FrameError::UnexpectedEof);
        }
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed.is_empty() {
            break;
        }
        let Some((name, value)) = trimmed.split_once(':') else {
            return Err(FrameError::MalformedHeader {
                header: trimmed.to_string(),
            });
        };
        if name.trim().eq_ignore_ascii_case("content-length") {
            let size: usize =
                value
                    .trim()
                    .parse()
                    .map_err(|_| FrameError::MalformedHeader {
                        header: trimmed.to_string(),
                    })?;
            if size > MAX_FRAME_SIZE {
                return Err(FrameError::TooLarge {
                    size,
                    max: MAX_FRAME_SIZE,
                });
            }
            length = Some(size);
        }
    }

    let length = length.ok_or(FrameError::MissingLength)?;
    let mut body = vec![0_u8; length];
    reader.read_exact(&mut body).map_err(|err| {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            FrameError::UnexpectedEof
        } else {
            FrameError::Io(err)
        }
    })?;
    Ok(body)
}
