//! Output sinks for the emitter.
//!
//! A sink hands out writable regions on request. During the measuring pass
//! the emitter asks with `error_on_excess = false` and writes nothing; during
//! the fill pass it asks with `error_on_excess = true`, writes into the
//! region and commits what it wrote.

use std::io;

use crate::error_channel::{self, fatal};
use crate::errors::{YamlError, YamlResult};

pub trait Sink {
    /// Return a region of at least `min_size` writable bytes.
    ///
    /// With `error_on_excess` set, a sink that cannot provide `min_size`
    /// bytes fails with [`YamlError::BufferOverflow`]. Without it the call
    /// never fails and the region may be shorter than requested.
    fn request_buffer(&mut self, min_size: usize, error_on_excess: bool) -> YamlResult<&mut [u8]>;

    /// Mark the first `len` bytes of the last requested region as written.
    fn commit(&mut self, len: usize) -> YamlResult<()>;

    /// Up-front capacity check for a fill pass of `total` bytes.
    ///
    /// Asks for the whole output as one region. Sinks without a capacity
    /// limit override this to skip the allocation.
    fn reserve(&mut self, total: usize) -> YamlResult<()> {
        self.request_buffer(total, true).map(|_| ())
    }

    fn write(&mut self, bytes: &[u8]) -> YamlResult<()> {
        error_channel::init_once();
        if bytes.is_empty() {
            return Ok(());
        }
        let region = self.request_buffer(bytes.len(), true)?;
        let available = region.len();
        let Some(target) = region.get_mut(..bytes.len()) else {
            return Err(fatal(format!(
                "sink returned {available} bytes for a {} byte request",
                bytes.len()
            )));
        };
        target.copy_from_slice(bytes);
        self.commit(bytes.len())
    }

    fn write_char(&mut self, byte: u8) -> YamlResult<()> {
        self.write(&[byte])
    }

    fn write_repeated(&mut self, byte: u8, count: usize) -> YamlResult<()> {
        error_channel::init_once();
        if count == 0 {
            return Ok(());
        }
        let region = self.request_buffer(count, true)?;
        let available = region.len();
        let Some(target) = region.get_mut(..count) else {
            return Err(fatal(format!(
                "sink returned {available} bytes for a {count} byte request"
            )));
        };
        target.fill(byte);
        self.commit(count)
    }
}

/// Growable in-memory sink.
#[derive(Debug, Default)]
pub struct VecSink {
    buf: Vec<u8>,
    committed: usize,
}

impl VecSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.committed]
    }

    pub fn len(&self) -> usize {
        self.committed
    }

    pub fn is_empty(&self) -> bool {
        self.committed == 0
    }

    pub fn into_bytes(mut self) -> Vec<u8> {
        self.buf.truncate(self.committed);
        self.buf
    }

    /// Take the written bytes as text.
    pub fn into_string(self) -> YamlResult<String> {
        error_channel::init_once();
        String::from_utf8(self.into_bytes())
            .map_err(|e| fatal(format!("emitted text is not UTF-8: {e}")))
    }
}

impl Sink for VecSink {
    fn request_buffer(&mut self, min_size: usize, _error_on_excess: bool) -> YamlResult<&mut [u8]> {
        self.buf.truncate(self.committed);
        self.buf.resize(self.committed + min_size, 0);
        Ok(&mut self.buf[self.committed..])
    }

    fn commit(&mut self, len: usize) -> YamlResult<()> {
        self.committed = (self.committed + len).min(self.buf.len());
        self.buf.truncate(self.committed);
        Ok(())
    }
}

/// Sink over a fixed caller-owned buffer.
#[derive(Debug)]
pub struct SliceSink<'b> {
    buf: &'b mut [u8],
    written: usize,
}

impl<'b> SliceSink<'b> {
    pub fn new(buf: &'b mut [u8]) -> Self {
        Self { buf, written: 0 }
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.written
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.written]
    }
}

impl Sink for SliceSink<'_> {
    fn request_buffer(&mut self, min_size: usize, error_on_excess: bool) -> YamlResult<&mut [u8]> {
        error_channel::init_once();
        let available = self.remaining();
        if min_size > available {
            if error_on_excess {
                return Err(error_channel::raise(YamlError::BufferOverflow {
                    required: min_size,
                    available,
                }));
            }
            return Ok(&mut []);
        }
        Ok(&mut self.buf[self.written..self.written + min_size])
    }

    fn commit(&mut self, len: usize) -> YamlResult<()> {
        if len > self.remaining() {
            return Err(fatal(format!(
                "commit of {len} bytes exceeds the {} remaining",
                self.remaining()
            )));
        }
        self.written += len;
        Ok(())
    }
}

/// Bytes per `write_all` call when repeating a single byte.
const REPEAT_CHUNK: usize = 64;

/// Sink that streams every fragment straight to a writer.
///
/// It has no capacity limit, so the up-front check is a no-op and only
/// regions handed out by [`Sink::request_buffer`] go through the scratch
/// buffer.
#[derive(Debug)]
pub struct WriterSink<W: io::Write> {
    writer: W,
    scratch: Vec<u8>,
    written: usize,
}

impl<W: io::Write> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            scratch: Vec::new(),
            written: 0,
        }
    }

    /// Bytes forwarded to the writer so far.
    pub fn written(&self) -> usize {
        self.written
    }

    pub fn into_inner(mut self) -> YamlResult<W> {
        self.writer
            .flush()
            .map_err(|e| error_channel::raise(YamlError::Io(e)))?;
        Ok(self.writer)
    }

    fn forward(&mut self, bytes: &[u8]) -> YamlResult<()> {
        error_channel::init_once();
        self.writer
            .write_all(bytes)
            .map_err(|e| error_channel::raise(YamlError::Io(e)))?;
        self.written += bytes.len();
        Ok(())
    }
}

impl<W: io::Write> Sink for WriterSink<W> {
    fn request_buffer(&mut self, min_size: usize, error_on_excess: bool) -> YamlResult<&mut [u8]> {
        if !error_on_excess {
            return Ok(&mut []);
        }
        self.scratch.clear();
        self.scratch.resize(min_size, 0);
        Ok(&mut self.scratch)
    }

    fn commit(&mut self, len: usize) -> YamlResult<()> {
        if len > self.scratch.len() {
            return Err(fatal(format!(
                "commit of {len} bytes exceeds the {} byte region",
                self.scratch.len()
            )));
        }
        let chunk = std::mem::take(&mut self.scratch);
        let result = self.forward(&chunk[..len]);
        self.scratch = chunk;
        result
    }

    fn reserve(&mut self, _total: usize) -> YamlResult<()> {
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> YamlResult<()> {
        self.forward(bytes)
    }

    fn write_char(&mut self, byte: u8) -> YamlResult<()> {
        self.forward(&[byte])
    }

    fn write_repeated(&mut self, byte: u8, count: usize) -> YamlResult<()> {
        let chunk = [byte; REPEAT_CHUNK];
        let mut left = count;
        while left > 0 {
            let n = left.min(REPEAT_CHUNK);
            self.forward(&chunk[..n])?;
            left -= n;
        }
        Ok(())
    }
}
