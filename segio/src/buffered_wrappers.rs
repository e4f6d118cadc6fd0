// SPDX-License-Identifier: Apache-2.0

use tracing::{debug, warn};
use crate::{Buffer, Error, OperationKind, Result, ResultContext, SEGMENT_SIZE};
use crate::OperationKind::{BufRead, Close, Flush, Read, Write};
use crate::pool::{DefaultPool, Pool};
use crate::streams::{BufSink, BufSource, BufStream, Sink, Source, Stream};
use crate::timeout::Timeout;

/// A [`Source`] reading through an internal buffer. Reads are served from the
/// buffer, refilling it one segment at a time from the inner source only when
/// it can't satisfy a request.
#[derive(Debug)]
pub struct BufferedSource<S: Source, P: Pool = DefaultPool> {
	buffer: Buffer<P>,
	source: Option<S>,
	closed: bool,
}

impl<S: Source> BufferedSource<S> {
	/// Wraps `source` with a buffer claiming from the process-wide pool.
	pub fn new(source: S) -> Self {
		Self::with_buffer(source, Buffer::default())
	}
}

impl<S: Source, P: Pool> BufferedSource<S, P> {
	/// Wraps `source` with `buffer`. Data already in the buffer is read first.
	pub fn with_buffer(source: S, buffer: Buffer<P>) -> Self {
		let closed = source.is_closed();
		Self {
			buffer,
			source: Some(source),
			closed,
		}
	}

	/// Returns a reference to the inner source, or `None` if unwrapped.
	pub fn get_ref(&self) -> Option<&S> { self.source.as_ref() }

	/// Unwraps the inner source without closing it. Buffered data is dropped.
	pub fn into_inner(mut self) -> Option<S> {
		self.closed = true;
		self.source.take()
	}

	fn check_open(&self, op: OperationKind) -> Result {
		if self.closed || self.source.is_none() {
			Err(Error::closed(op))
		} else {
			Ok(())
		}
	}

	/// Reads one segment from the inner source into the buffer, returning
	/// `false` if the inner source is exhausted.
	fn fill(&mut self) -> Result<bool> {
		let Self { buffer, source, .. } = self;
		match source {
			Some(source) => Ok(source.read(buffer, SEGMENT_SIZE).context(Read)?.is_some()),
			None => Err(Error::closed(Read))
		}
	}
}

impl<S: Source, P: Pool> Stream for BufferedSource<S, P> {
	#[inline]
	fn is_closed(&self) -> bool { self.closed }

	/// Drops buffered data and closes the inner source.
	fn close(&mut self) -> Result {
		if self.closed {
			return Ok(())
		}

		self.closed = true;
		self.buffer.clear();
		match self.source.as_mut() {
			Some(source) => source.close().context(Close),
			None => Ok(())
		}
	}

	fn timeout(&self) -> &Timeout {
		match self.source.as_ref() {
			Some(source) => source.timeout(),
			None => Timeout::none_ref()
		}
	}
}

impl<S: Source, P: Pool> Source for BufferedSource<S, P> {
	fn read(&mut self, sink: &mut Buffer<impl Pool>, count: usize) -> Result<Option<usize>> {
		self.check_open(Read)?;
		if count == 0 {
			return Ok(Some(0))
		}

		if self.buffer.is_empty() && !self.fill()? {
			return Ok(None)
		}

		self.buffer.read(sink, count)
	}
}

impl<S: Source, P: Pool> BufStream for BufferedSource<S, P> {
	type Pool = P;

	fn buf(&self) -> &Buffer<P> { &self.buffer }
	fn buf_mut(&mut self) -> &mut Buffer<P> { &mut self.buffer }
}

impl<S: Source, P: Pool> BufSource for BufferedSource<S, P> {
	fn request(&mut self, count: usize) -> Result<bool> {
		self.check_open(BufRead)?;
		while self.buffer.count() < count {
			if !self.fill()? {
				return Ok(false)
			}
		}
		Ok(true)
	}
}

impl<S: Source, P: Pool> Drop for BufferedSource<S, P> {
	fn drop(&mut self) {
		if let Err(error) = self.close() {
			debug!(%error, "failed to close buffered source on drop");
		}
	}
}

/// A [`Sink`] writing through an internal buffer. Small writes are batched into
/// complete segments before being written to the inner sink.
#[derive(Debug)]
pub struct BufferedSink<S: Sink, P: Pool = DefaultPool> {
	buffer: Buffer<P>,
	sink: Option<S>,
	closed: bool,
}

impl<S: Sink> BufferedSink<S> {
	/// Wraps `sink` with a buffer claiming from the process-wide pool.
	pub fn new(sink: S) -> Self {
		Self::with_buffer(sink, Buffer::default())
	}
}

impl<S: Sink, P: Pool> BufferedSink<S, P> {
	/// Wraps `sink` with `buffer`. Data already in the buffer is written first.
	pub fn with_buffer(sink: S, buffer: Buffer<P>) -> Self {
		let closed = sink.is_closed();
		Self {
			buffer,
			sink: Some(sink),
			closed,
		}
	}

	/// Returns a reference to the inner sink, or `None` if unwrapped.
	pub fn get_ref(&self) -> Option<&S> { self.sink.as_ref() }

	/// Writes all buffered data, then unwraps the inner sink without closing it.
	pub fn into_inner(mut self) -> Result<S> {
		self.emit()?;
		self.closed = true;
		self.sink.take().ok_or_else(|| Error::closed(Close))
	}

	fn open_sink(&mut self, op: OperationKind) -> Result<(&mut S, &mut Buffer<P>)> {
		match (self.closed, self.sink.as_mut()) {
			(false, Some(sink)) => Ok((sink, &mut self.buffer)),
			_ => Err(Error::closed(op))
		}
	}
}

impl<S: Sink, P: Pool> Stream for BufferedSink<S, P> {
	#[inline]
	fn is_closed(&self) -> bool { self.closed }

	/// Writes buffered data, then closes the inner sink. The sink is closed even
	/// if writing fails; the first error is returned.
	fn close(&mut self) -> Result {
		if self.closed {
			return Ok(())
		}

		self.closed = true;
		let Some(sink) = self.sink.as_mut() else {
			self.buffer.clear();
			return Ok(())
		};

		let count = self.buffer.count();
		let emit = if count > 0 {
			sink.write(&mut self.buffer, count).context(Close)
		} else {
			Ok(())
		};
		let close = sink.close().context(Close);
		self.buffer.clear();

		match (emit, close) {
			(Err(error), Err(secondary)) => {
				warn!(%secondary, "failed to close sink after a failed write");
				Err(error)
			}
			(emit, close) => emit.and(close)
		}
	}

	fn timeout(&self) -> &Timeout {
		match self.sink.as_ref() {
			Some(sink) => sink.timeout(),
			None => Timeout::none_ref()
		}
	}
}

impl<S: Sink, P: Pool> Sink for BufferedSink<S, P> {
	/// Moves `count` bytes into the buffer, then writes any complete segments.
	fn write(&mut self, source: &mut Buffer<impl Pool>, count: usize) -> Result {
		let (_, buffer) = self.open_sink(Write)?;
		if count > source.count() {
			return Err(Error::out_of_bounds(Write))
		}

		buffer.move_from(source, count);
		self.emit_complete_segments()
	}

	/// Writes all buffered data, then flushes the inner sink.
	fn flush(&mut self) -> Result {
		let (sink, buffer) = self.open_sink(Flush)?;
		let count = buffer.count();
		// Both need a chance to run before returning an error.
		let emit = sink.write(buffer, count).context(Flush);
		let flush = sink.flush().context(Flush);
		emit.and(flush)
	}
}

impl<S: Sink, P: Pool> BufStream for BufferedSink<S, P> {
	type Pool = P;

	fn buf(&self) -> &Buffer<P> { &self.buffer }
	fn buf_mut(&mut self) -> &mut Buffer<P> { &mut self.buffer }
}

impl<S: Sink, P: Pool> BufSink for BufferedSink<S, P> {
	fn emit_complete_segments(&mut self) -> Result {
		let (sink, buffer) = self.open_sink(Write)?;
		let count = buffer.complete_segment_byte_count();
		if count > 0 {
			sink.write(buffer, count).context(Write)?;
		}
		Ok(())
	}

	fn emit(&mut self) -> Result {
		let (sink, buffer) = self.open_sink(Write)?;
		let count = buffer.count();
		if count > 0 {
			sink.write(buffer, count).context(Write)?;
		}
		Ok(())
	}
}

impl<S: Sink, P: Pool> Drop for BufferedSink<S, P> {
	fn drop(&mut self) {
		if let Err(error) = self.close() {
			debug!(%error, "failed to close buffered sink on drop");
		}
	}
}
