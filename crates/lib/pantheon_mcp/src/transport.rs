//! Newline-delimited JSON-RPC framing over a duplex byte stream.
//!
//! The read half yields decoded requests and silently skips anything it
//! cannot use (after a WARN on the diagnostic stream). The write half is
//! shared between tasks and serializes whole lines behind an async mutex.

use std::io;
use std::sync::Arc;

use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Stdin, Stdout,
};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::protocol::{FrameError, Request, Response};

/// Largest accepted frame, excluding the line terminator.
pub const MAX_FRAME_BYTES: usize = 4 * 1024 * 1024;

pub struct Transport<R, W> {
    reader: R,
    writer: W,
}

impl<R, W> Transport<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    pub fn into_parts(self) -> (RequestStream<R>, ResponseSink<W>) {
        (
            RequestStream::new(self.reader),
            ResponseSink {
                writer: Arc::new(Mutex::new(self.writer)),
            },
        )
    }
}

impl Transport<Stdin, Stdout> {
    /// Bind the process stdin/stdout.
    pub fn stdio() -> Self {
        Self::new(tokio::io::stdin(), tokio::io::stdout())
    }
}

enum Frame {
    Line(Vec<u8>),
    Oversized(usize),
}

/// Lazy sequence of decoded requests.
pub struct RequestStream<R> {
    reader: BufReader<R>,
    max_frame: usize,
}

impl<R: AsyncRead + Unpin + Send> RequestStream<R> {
    fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            max_frame: MAX_FRAME_BYTES,
        }
    }

    /// Next well-formed request, or `None` at end of input.
    pub async fn next(&mut self) -> io::Result<Option<Request>> {
        loop {
            let line = match self.read_frame().await? {
                None => return Ok(None),
                Some(Frame::Oversized(size)) => {
                    let e = FrameError::TooLarge {
                        size,
                        limit: self.max_frame,
                    };
                    warn!(error = %e, "dropping malformed frame");
                    continue;
                }
                Some(Frame::Line(line)) => line,
            };

            let frame = line.strip_suffix(b"\r").unwrap_or(line.as_slice());
            if frame.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            match Request::decode(frame) {
                Ok(request) => return Ok(Some(request)),
                Err(e) => warn!(error = %e, "dropping malformed frame"),
            }
        }
    }

    /// Read up to the next `\n`. Oversized frames are discarded while they
    /// stream past instead of being buffered.
    async fn read_frame(&mut self) -> io::Result<Option<Frame>> {
        let mut line = Vec::new();
        let mut size = 0usize;
        let mut started = false;

        loop {
            let (used, complete) = {
                let available = self.reader.fill_buf().await?;
                if available.is_empty() {
                    if !started {
                        return Ok(None);
                    }
                    debug!("final frame has no line terminator");
                    break;
                }
                started = true;
                let (chunk, used, complete) = match available.iter().position(|b| *b == b'\n') {
                    Some(i) => (&available[..i], i + 1, true),
                    None => (available, available.len(), false),
                };
                size += chunk.len();
                if size <= self.max_frame {
                    line.extend_from_slice(chunk);
                } else if !line.is_empty() {
                    line = Vec::new();
                }
                (used, complete)
            };
            self.reader.consume(used);
            if complete {
                break;
            }
        }

        Ok(Some(if size > self.max_frame {
            Frame::Oversized(size)
        } else {
            Frame::Line(line)
        }))
    }
}

/// Cloneable write half. Each response goes out as one line, then a flush.
pub struct ResponseSink<W> {
    writer: Arc<Mutex<W>>,
}

impl<W> Clone for ResponseSink<W> {
    fn clone(&self) -> Self {
        Self {
            writer: Arc::clone(&self.writer),
        }
    }
}

impl<W: AsyncWrite + Unpin + Send> ResponseSink<W> {
    pub async fn send(&self, response: &Response) -> io::Result<()> {
        let mut line = serde_json::to_vec(response).map_err(io::Error::other)?;
        line.push(b'\n');
        let mut writer = self.writer.lock().await;
        writer.write_all(&line).await?;
        writer.flush().await
    }
}
