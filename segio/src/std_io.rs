// SPDX-License-Identifier: Apache-2.0

//! Adapters between [`std::io`] and [`Source`]/[`Sink`].

use std::io;
use std::io::{Read, Write};
use tracing::debug;
use crate::{Buffer, Error, Result, ResultContext, SEGMENT_SIZE};
use crate::OperationKind::{Close, Flush};
use crate::pool::Pool;
use crate::streams::{Sink, Source, Stream};
use crate::timeout::Timeout;

/// A [`Source`] reading from a wrapped [`Read`]er, one segment per call.
#[derive(Debug)]
pub struct ReaderSource<R> {
	reader: Option<R>,
	timeout: Timeout,
}

/// A [`Sink`] writing to a wrapped [`Write`]r.
#[derive(Debug)]
pub struct WriterSink<W> {
	writer: Option<W>,
	timeout: Timeout,
}

impl<R: Read> From<R> for ReaderSource<R> {
	fn from(reader: R) -> Self { Self::new(reader) }
}

impl<W: Write> From<W> for WriterSink<W> {
	fn from(writer: W) -> Self { Self::new(writer) }
}

impl<R: Read> ReaderSource<R> {
	pub fn new(reader: R) -> Self {
		Self {
			reader: Some(reader),
			timeout: Timeout::none(),
		}
	}

	/// Returns the timeout checked before each read.
	pub fn timeout_mut(&mut self) -> &mut Timeout { &mut self.timeout }

	/// Returns the wrapped reader, or `None` if closed.
	pub fn get_ref(&self) -> Option<&R> { self.reader.as_ref() }

	/// Unwraps the reader, or returns `None` if closed.
	pub fn into_inner(self) -> Option<R> { self.reader }
}

impl<W: Write> WriterSink<W> {
	pub fn new(writer: W) -> Self {
		Self {
			writer: Some(writer),
			timeout: Timeout::none(),
		}
	}

	/// Returns the timeout checked before each write.
	pub fn timeout_mut(&mut self) -> &mut Timeout { &mut self.timeout }

	/// Returns the wrapped writer, or `None` if closed.
	pub fn get_ref(&self) -> Option<&W> { self.writer.as_ref() }

	/// Unwraps the writer, or returns `None` if closed.
	pub fn into_inner(self) -> Option<W> { self.writer }
}

impl<R: Read> Stream for ReaderSource<R> {
	fn is_closed(&self) -> bool { self.reader.is_none() }

	/// Closes the underlying reader by dropping it. Subsequent reads fail.
	fn close(&mut self) -> Result {
		self.reader.take();
		Ok(())
	}

	fn timeout(&self) -> &Timeout { &self.timeout }
}

impl<R: Read> Source for ReaderSource<R> {
	fn read(&mut self, sink: &mut Buffer<impl Pool>, count: usize) -> Result<Option<usize>> {
		use crate::OperationKind::Read;

		let reader = self.reader
						 .as_mut()
						 .ok_or_else(|| Error::closed(Read))?;
		if count == 0 {
			return Ok(Some(0))
		}

		self.timeout.throw_if_reached().context(Read)?;
		sink.fill_from_reader(reader, count).context(Read)
	}
}

impl<W: Write> Stream for WriterSink<W> {
	fn is_closed(&self) -> bool { self.writer.is_none() }

	/// Flushes then closes the underlying writer by dropping it. Subsequent
	/// writes fail.
	fn close(&mut self) -> Result {
		match self.writer.take() {
			Some(mut writer) => writer.flush().context(Close),
			None => Ok(())
		}
	}

	fn timeout(&self) -> &Timeout { &self.timeout }
}

impl<W: Write> Sink for WriterSink<W> {
	fn write(&mut self, source: &mut Buffer<impl Pool>, count: usize) -> Result {
		let writer = self.writer
						 .as_mut()
						 .ok_or_else(|| Error::closed(crate::OperationKind::Write))?;
		source.drain_into_writer(writer, count, &self.timeout)
	}

	fn flush(&mut self) -> Result {
		self.writer
			.as_mut()
			.ok_or_else(|| Error::closed(Flush))?
			.flush()
			.context(Flush)
	}
}

/// A wrapper implementing the [`Read`] trait for a [`Source`].
#[derive(Debug)]
pub struct SourceReader<S: Source> {
	source: S,
	buffer: Buffer,
}

/// A wrapper implementing the [`Write`] trait for a [`Sink`].
#[derive(Debug)]
pub struct SinkWriter<S: Sink> {
	sink: S,
	buffer: Buffer,
}

impl<S: Source> SourceReader<S> {
	pub fn new(source: S) -> Self {
		Self { source, buffer: Buffer::default() }
	}

	pub fn get_ref(&self) -> &S { &self.source }

	pub fn get_mut(&mut self) -> &mut S { &mut self.source }
}

impl<S: Sink> SinkWriter<S> {
	pub fn new(sink: S) -> Self {
		Self { sink, buffer: Buffer::default() }
	}

	pub fn get_ref(&self) -> &S { &self.sink }

	pub fn get_mut(&mut self) -> &mut S { &mut self.sink }
}

impl<S: Source> Read for SourceReader<S> {
	fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
		if buf.is_empty() {
			return Ok(0)
		}

		let Self { source, buffer } = self;
		if buffer.is_empty() && source.read(buffer, SEGMENT_SIZE)?.is_none() {
			return Ok(0)
		}
		Ok(buffer.read_slice(buf))
	}
}

impl<S: Sink> Write for SinkWriter<S> {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		let Self { sink, buffer } = self;
		buffer.write_slice(buf);
		sink.write(buffer, buf.len())?;
		Ok(buf.len())
	}

	fn flush(&mut self) -> io::Result<()> {
		Ok(self.sink.flush()?)
	}
}

impl<S: Source> Drop for SourceReader<S> {
	fn drop(&mut self) {
		if let Err(error) = self.source.close() {
			debug!(%error, "failed to close source on drop");
		}
	}
}

impl<S: Sink> Drop for SinkWriter<S> {
	fn drop(&mut self) {
		if let Err(error) = self.sink.close() {
			debug!(%error, "failed to close sink on drop");
		}
	}
}
