// Copyright 2023 Strixpyrr
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

pub mod blackhole;
pub mod file;
#[cfg(feature = "hash")]
pub mod hashing;
pub mod socket;

use crate::{Buffer, Error, Result, SEGMENT_SIZE};
use crate::buffered_wrappers::{BufferedSink, BufferedSource};
use crate::pool::{DefaultPool, Pool};
use crate::std_io::ReaderSource;
use crate::timeout::Timeout;
use crate::OperationKind::{BufRead, BufWrite};

/// A data stream, either [`Source`] or [`Sink`].
pub trait Stream {
	/// Returns `true` if the stream is closed.
	fn is_closed(&self) -> bool { false }

	/// Closes the stream. Closing is idempotent: calling [`close`] again has no
	/// effect and returns `Ok`. Streams holding resources close automatically
	/// when dropped.
	///
	/// [`close`]: Self::close
	fn close(&mut self) -> Result { Ok(()) }

	/// Returns the timeout governing the stream's blocking calls.
	fn timeout(&self) -> &Timeout { Timeout::none_ref() }
}

/// A data source.
pub trait Source: Stream {
	/// Reads up to `count` bytes from the source into `sink`, returning the
	/// number of bytes read, or `None` if the source is exhausted. Reading zero
	/// bytes returns `Some(0)`.
	fn read(&mut self, sink: &mut Buffer<impl Pool>, count: usize) -> Result<Option<usize>>;
}

/// A data sink.
pub trait Sink: Stream {
	/// Writes exactly `count` bytes from `source` into the sink, retrying partial
	/// writes until all bytes are written or an error occurs. Fails with an
	/// "out of bounds" error if `source` holds fewer than `count` bytes.
	fn write(&mut self, source: &mut Buffer<impl Pool>, count: usize) -> Result;

	/// Writes all bytes from `source` into the sink.
	fn write_all(&mut self, source: &mut Buffer<impl Pool>) -> Result {
		let count = source.count();
		self.write(source, count)
	}

	/// Writes all buffered data to its final target.
	fn flush(&mut self) -> Result { Ok(()) }
}

impl<S: Stream + ?Sized> Stream for &mut S {
	fn is_closed(&self) -> bool { (**self).is_closed() }

	fn close(&mut self) -> Result { (**self).close() }

	fn timeout(&self) -> &Timeout { (**self).timeout() }
}

impl<S: Source> Source for &mut S {
	#[inline]
	fn read(&mut self, sink: &mut Buffer<impl Pool>, count: usize) -> Result<Option<usize>> {
		(**self).read(sink, count)
	}
}

impl<S: Sink> Sink for &mut S {
	#[inline]
	fn write(&mut self, source: &mut Buffer<impl Pool>, count: usize) -> Result {
		(**self).write(source, count)
	}

	#[inline]
	fn flush(&mut self) -> Result { (**self).flush() }
}

pub trait SourceExt: Source + Sized {
	/// Wraps the source in a buffered source.
	fn buffered(self) -> BufferedSource<Self> { BufferedSource::new(self) }
}

impl<S: Source> SourceExt for S { }

pub trait SinkExt: Sink + Sized {
	/// Wraps the sink in a buffered sink.
	fn buffered(self) -> BufferedSink<Self> { BufferedSink::new(self) }
}

impl<S: Sink> SinkExt for S { }

/// A stream with an internal buffer.
pub trait BufStream {
	type Pool: Pool;

	fn buf(&self) -> &Buffer<Self::Pool>;
	fn buf_mut(&mut self) -> &mut Buffer<Self::Pool>;
}

macro_rules! gen_int_reads {
    ($($name:ident$le_name:ident$ty:ident),+) => {
		$(
		#[doc = concat!("Reads a big-endian `", stringify!($ty), "`.")]
		fn $name(&mut self) -> Result<$ty> {
			let mut bytes = [0; std::mem::size_of::<$ty>()];
			self.read_slice_exact(&mut bytes)?;
			Ok($ty::from_be_bytes(bytes))
		}

		#[doc = concat!("Reads a little-endian `", stringify!($ty), "`.")]
		fn $le_name(&mut self) -> Result<$ty> {
			let mut bytes = [0; std::mem::size_of::<$ty>()];
			self.read_slice_exact(&mut bytes)?;
			Ok($ty::from_le_bytes(bytes))
		}
		)+
	};
}

/// A buffered data source.
pub trait BufSource: BufStream + Source {
	/// Reads from the underlying source until at least `count` bytes are
	/// buffered, returning `false` if it was exhausted first.
	fn request(&mut self, count: usize) -> Result<bool>;

	/// Like [`request`](Self::request), but fails with an "end-of-stream" error
	/// if the source was exhausted before `count` bytes were buffered.
	fn require(&mut self, count: usize) -> Result {
		if self.request(count)? {
			Ok(())
		} else {
			Err(Error::eos(BufRead))
		}
	}

	/// Returns `true` if both the buffer and the underlying source are exhausted.
	fn exhausted(&mut self) -> Result<bool> {
		Ok(!self.request(1)?)
	}

	/// Reads one byte.
	fn read_u8(&mut self) -> Result<u8> {
		self.require(1)?;
		self.buf_mut()
			.pop()
			.ok_or_else(|| Error::eos(BufRead))
	}

	/// Reads one signed byte.
	fn read_i8(&mut self) -> Result<i8> {
		self.read_u8().map(|value| value as i8)
	}

	gen_int_reads! {
		read_i16 read_i16_le i16,
		read_u16 read_u16_le u16,
		read_i32 read_i32_le i32,
		read_u32 read_u32_le u32,
		read_i64 read_i64_le i64,
		read_u64 read_u64_le u64
	}

	/// Reads up to `buf.len()` bytes, returning the number of bytes read or
	/// `None` if the source is exhausted.
	fn read_slice(&mut self, buf: &mut [u8]) -> Result<Option<usize>> {
		if buf.is_empty() {
			return Ok(Some(0))
		}

		if !self.request(1)? {
			return Ok(None)
		}

		Ok(Some(self.buf_mut().read_slice(buf)))
	}

	/// Fills `buf` completely, failing with an "end-of-stream" error if the
	/// source is exhausted first. Nothing is consumed on failure.
	fn read_slice_exact(&mut self, buf: &mut [u8]) -> Result {
		self.require(buf.len())?;
		let read = self.buf_mut().read_slice(buf);
		debug_assert_eq!(read, buf.len(), "require should ensure all bytes are available");
		Ok(())
	}

	/// Reads exactly `count` bytes into a new vector.
	fn read_vec(&mut self, count: usize) -> Result<Vec<u8>> {
		let mut vec = vec![0; count];
		self.read_slice_exact(&mut vec)?;
		Ok(vec)
	}

	/// Reads all remaining bytes into `vec`, returning the number read.
	fn read_to_end(&mut self, vec: &mut Vec<u8>) -> Result<usize> {
		let start = vec.len();
		while self.request(1)? {
			let buf = self.buf_mut();
			let len = vec.len();
			vec.resize(len + buf.count(), 0);
			buf.read_slice(&mut vec[len..]);
		}
		Ok(vec.len() - start)
	}

	/// Skips up to `count` bytes, returning the number skipped. Fewer are
	/// skipped only if the source is exhausted.
	fn skip(&mut self, count: usize) -> Result<usize> {
		let mut skipped = 0;
		while skipped < count && self.request(1)? {
			skipped += self.buf_mut().skip(count - skipped);
		}
		Ok(skipped)
	}

	/// Reads all remaining bytes into `sink`, returning the number written.
	fn read_all(&mut self, sink: &mut impl Sink) -> Result<usize> {
		let mut count = 0;
		while self.request(1)? {
			let buf = self.buf_mut();
			let len = buf.count();
			sink.write(buf, len)?;
			count += len;
		}
		Ok(count)
	}
}

macro_rules! gen_int_writes {
    ($($name:ident$le_name:ident$ty:ident),+) => {
		$(
		#[doc = concat!("Writes a big-endian `", stringify!($ty), "`.")]
		fn $name(&mut self, value: $ty) -> Result {
			self.write_slice(&value.to_be_bytes())
		}

		#[doc = concat!("Writes a little-endian `", stringify!($ty), "`.")]
		fn $le_name(&mut self, value: $ty) -> Result {
			self.write_slice(&value.to_le_bytes())
		}
		)+
	};
}

/// A buffered data sink.
pub trait BufSink: BufStream + Sink {
	/// Writes all complete segments in the buffer to the underlying sink, keeping
	/// a partially filled tail for further writes.
	fn emit_complete_segments(&mut self) -> Result;

	/// Writes all buffered bytes to the underlying sink, without flushing it.
	fn emit(&mut self) -> Result;

	/// Writes one byte.
	fn write_u8(&mut self, value: u8) -> Result {
		self.buf_mut().push(value);
		self.emit_complete_segments()
	}

	/// Writes one signed byte.
	fn write_i8(&mut self, value: i8) -> Result {
		self.write_u8(value as u8)
	}

	gen_int_writes! {
		write_i16 write_i16_le i16,
		write_u16 write_u16_le u16,
		write_i32 write_i32_le i32,
		write_u32 write_u32_le u32,
		write_i64 write_i64_le i64,
		write_u64 write_u64_le u64
	}

	/// Writes all of `data`.
	fn write_slice(&mut self, data: &[u8]) -> Result {
		self.buf_mut().write_slice(data);
		self.emit_complete_segments()
	}

	/// Writes exactly `count` bytes read from `source`, failing with an
	/// "end-of-stream" error if it's exhausted first.
	fn write_from(&mut self, source: &mut impl Source, count: usize) -> Result {
		let mut remaining = count;
		while remaining > 0 {
			match source.read(self.buf_mut(), remaining)? {
				Some(read) if read > 0 => remaining -= read,
				_ => return Err(Error::eos(BufWrite))
			}
			self.emit_complete_segments()?;
		}
		Ok(())
	}

	/// Writes all bytes read from `source` until it's exhausted, returning the
	/// number written.
	fn write_all_from(&mut self, source: &mut impl Source) -> Result<usize> {
		let mut count = 0;
		while let Some(read) = source.read(self.buf_mut(), SEGMENT_SIZE)? {
			count += read;
			self.emit_complete_segments()?;
		}
		Ok(count)
	}
}

/// Copies all bytes from `source` to `sink` until the source is exhausted,
/// then flushes the sink. Returns the number of bytes copied.
pub fn copy(source: &mut impl Source, sink: &mut impl Sink) -> Result<usize> {
	let mut buffer: Buffer = Buffer::default();
	let mut count = 0;
	while let Some(read) = source.read(&mut buffer, SEGMENT_SIZE)? {
		let len = buffer.count();
		sink.write(&mut buffer, len)?;
		count += read;
	}
	sink.flush()?;
	Ok(count)
}

/// Reads all bytes from `source` into a vector.
pub fn read_to_vec(source: &mut impl Source) -> Result<Vec<u8>> {
	let mut buffer: Buffer = Buffer::default();
	while source.read(&mut buffer, SEGMENT_SIZE)?.is_some() { }
	Ok(buffer.to_vec())
}

/// Drains `source` through `hasher`, returning the digest of all its bytes.
#[cfg(feature = "hash")]
pub fn checksum<D: digest::Digest + Clone>(source: &mut impl Source, hasher: D) -> Result<digest::Output<D>> {
	let mut sink = hashing::HashSink::new(blackhole::blackhole(), hasher);
	copy(source, &mut sink)?;
	Ok(sink.hash())
}

/// Creates a source reading from a byte slice.
pub fn slice_source(data: &[u8]) -> ReaderSource<&[u8]> {
	ReaderSource::new(data)
}

/// Creates a buffered source reading from a byte slice.
pub fn buffered_slice(data: &[u8]) -> BufferedSource<ReaderSource<&[u8]>, DefaultPool> {
	slice_source(data).buffered()
}
