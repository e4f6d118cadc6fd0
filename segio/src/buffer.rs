// SPDX-License-Identifier: Apache-2.0

mod read;
mod write;
mod options;

pub use options::*;

use std::cmp::min;
use std::collections::VecDeque;
use std::fmt;
use std::fmt::{Debug, Formatter};
use std::mem;
use std::ops::Range;
use all_asserts::debug_assert_le;
use crate::pool::{DefaultPool, Pool};
use crate::segment::{Segment, SEGMENT_SIZE};
use crate::util::check_range;
use crate::{OperationKind, Result, ResultContext};

/// A FIFO byte queue made of pooled segments. Bytes are written to the tail
/// segment and read from the head segment; drained segments are returned to the
/// pool.
///
/// The segments sit in a ring buffer, so appending at the tail and popping at
/// the head are both `O(1)`. Every segment in the ring holds at least one
/// readable byte once an operation returns, and the byte count is tracked
/// incrementally rather than recomputed.
pub struct Buffer<P: Pool = DefaultPool> {
	segments: VecDeque<Segment>,
	count: usize,
	pool: P,
	share_threshold: usize,
	allocation: Allocate,
}

impl<P: Pool> Default for Buffer<P> {
	fn default() -> Self { Self::new(P::get()) }
}

impl<P: Pool> From<BufferOptions> for Buffer<P> {
	fn from(options: BufferOptions) -> Self {
		Self::with_options(P::get(), options)
	}
}

impl Buffer {
	/// Creates a new "lean" buffer. See [`BufferOptions::lean`] for details.
	pub fn lean() -> Self { BufferOptions::lean().into() }

	/// Creates a new buffer containing a copy of `data`.
	pub fn from_slice(data: &[u8]) -> Self {
		let mut buf = Self::default();
		buf.write_slice(data);
		buf
	}
}

impl<P: Pool> Buffer<P> {
	/// Creates a new buffer claiming segments from `pool`.
	pub fn new(pool: P) -> Self {
		Self::with_options(pool, BufferOptions::default())
	}

	/// Creates a new buffer claiming segments from `pool`, with options.
	pub fn with_options(
		pool: P,
		BufferOptions {
			share_threshold,
			allocation,
		}: BufferOptions
	) -> Self {
		Self {
			segments: VecDeque::new(),
			count: 0,
			pool,
			share_threshold,
			allocation,
		}
	}

	/// Returns the options used to create the buffer.
	pub fn options(&self) -> BufferOptions {
		BufferOptions {
			share_threshold: self.share_threshold,
			allocation: self.allocation,
		}
	}

	/// Returns the pool segments are claimed from.
	pub fn pool(&self) -> &P { &self.pool }

	/// Returns the number of readable bytes in the buffer.
	#[inline]
	pub fn count(&self) -> usize { self.count }
	/// Returns `true` if the buffer is empty.
	#[inline]
	pub fn is_empty(&self) -> bool { self.count == 0 }
	/// Returns `true` if the buffer is not empty.
	#[inline]
	pub fn is_not_empty(&self) -> bool { self.count > 0 }
	/// Returns the number of segments held by the buffer.
	#[inline]
	pub fn segment_count(&self) -> usize { self.segments.len() }

	/// Returns the number of bytes in segments that will no longer be written to,
	/// excluding a partially filled, writable tail. This is the number of bytes
	/// that can be flushed to a sink without breaking up a segment.
	pub fn complete_segment_byte_count(&self) -> usize {
		match self.segments.back() {
			Some(tail) if !tail.is_full() && !tail.is_shared() => self.count - tail.len(),
			_ => self.count
		}
	}

	/// Writes all of `data` to the end of the buffer, claiming segments as needed.
	pub fn write_slice(&mut self, mut data: &[u8]) {
		while !data.is_empty() {
			let written = self.writable_segment(1).write(data);
			self.count += written;
			data = &data[written..];
		}
	}

	/// Writes `count` bytes of `data` starting at `offset`. Fails without writing
	/// anything if the range is out of bounds.
	pub fn write_range(&mut self, data: &[u8], offset: usize, count: usize) -> Result {
		let range = check_range(data.len(), offset, count).context(OperationKind::BufWrite)?;
		self.write_slice(&data[range]);
		Ok(())
	}

	/// Pushes one byte to the end of the buffer.
	pub fn push(&mut self, value: u8) {
		self.writable_segment(1).push(value);
		self.count += 1;
	}

	/// Reads bytes into `buf` until it's full or the buffer is empty, returning
	/// the number of bytes read.
	pub fn read_slice(&mut self, buf: &mut [u8]) -> usize {
		let mut read = 0;
		while read < buf.len() {
			let Some(head) = self.segments.front_mut() else { break };
			read += head.read(&mut buf[read..]);
			if head.is_empty() {
				self.recycle_head();
			}
		}
		self.count -= read;
		read
	}

	/// Reads up to `count` bytes into `buf` starting at `offset`, returning the
	/// number of bytes read or `None` if the buffer is empty. Reading zero bytes
	/// always returns `Some(0)`. Fails without reading anything if the range is
	/// out of bounds.
	pub fn read_range(&mut self, buf: &mut [u8], offset: usize, count: usize) -> Result<Option<usize>> {
		let range = check_range(buf.len(), offset, count).context(OperationKind::BufRead)?;
		if count == 0 {
			return Ok(Some(0))
		}

		if self.is_empty() {
			return Ok(None)
		}

		Ok(Some(self.read_slice(&mut buf[range])))
	}

	/// Pops one byte from the front of the buffer.
	pub fn pop(&mut self) -> Option<u8> {
		let head = self.segments.front_mut()?;
		let value = head.pop()?;
		if head.is_empty() {
			self.recycle_head();
		}
		self.count -= 1;
		Some(value)
	}

	/// Skips up to `count` bytes, returning the number of bytes skipped.
	pub fn skip(&mut self, count: usize) -> usize {
		if count >= self.count {
			let skipped = self.count;
			self.clear();
			return skipped
		}

		let mut skipped = 0;
		while skipped < count {
			let Some(head) = self.segments.front_mut() else { break };
			skipped += head.consume(count - skipped);
			if head.is_empty() {
				self.recycle_head();
			}
		}
		self.count -= skipped;
		skipped
	}

	/// Clears data from the buffer, returning all segments to the pool.
	pub fn clear(&mut self) {
		let segments = mem::take(&mut self.segments);
		self.count = 0;
		match self.allocation {
			Allocate::Pooled => self.pool.collect(segments),
			Allocate::Always => drop(segments),
		}
	}

	/// Returns the byte at `index`, or `None` if `index` is out of bounds.
	pub fn get(&self, mut index: usize) -> Option<u8> {
		if index >= self.count { return None }

		for seg in &self.segments {
			if index < seg.len() {
				return Some(seg.data()[index])
			}
			index -= seg.len();
		}
		None
	}

	/// Copies the buffer contents into a vector without consuming them.
	pub fn to_vec(&self) -> Vec<u8> {
		let mut vec = Vec::with_capacity(self.count);
		for slice in self.iter_slices() {
			vec.extend_from_slice(slice);
		}
		vec
	}

	/// Returns an iterator over the readable window of each segment.
	pub fn iter_slices(&self) -> impl Iterator<Item = &[u8]> + '_ {
		self.segments.iter().map(Segment::data)
	}

	/// Copies `count` bytes starting at `offset` into `sink` without consuming
	/// them. Runs of at least the sink's share threshold are shared rather than
	/// copied; the segments holding them become read-only in both buffers.
	pub fn copy_to(&mut self, sink: &mut Buffer<impl Pool>, offset: usize, count: usize) -> Result {
		check_range(self.count, offset, count).context(OperationKind::BufCopy)?;
		self.copy_range_to(sink, offset, count);
		Ok(())
	}

	/// Returns a new buffer with the same contents, sharing segment memory where
	/// the share threshold allows.
	pub fn snapshot(&mut self) -> Buffer<P> {
		let mut copy = Buffer::with_options(self.pool.clone(), self.options());
		let count = self.count;
		self.copy_range_to(&mut copy, 0, count);
		copy
	}

	/// Updates `hasher` with buffer data within `range`, without consuming it.
	#[cfg(feature = "hash")]
	pub fn hash_range(&self, range: Range<usize>, hasher: &mut impl digest::Digest) {
		for slice in self.slices_in_range(range) {
			hasher.update(slice);
		}
	}

	/// Reads up to `count` bytes into a new [`bytes::Bytes`].
	#[cfg(feature = "bytes")]
	pub fn read_bytes(&mut self, count: usize) -> bytes::Bytes {
		let mut vec = vec![0; min(count, self.count)];
		let read = self.read_slice(&mut vec);
		debug_assert_eq!(read, vec.len());
		vec.into()
	}

	/// Writes the contents of `bytes` to the end of the buffer.
	#[cfg(feature = "bytes")]
	pub fn write_bytes(&mut self, bytes: &bytes::Bytes) {
		self.write_slice(bytes);
	}
}

impl<P: Pool> Buffer<P> {
	/// Returns the tail segment if it has at least `min_capacity` bytes of
	/// writable space, otherwise claims a fresh segment and appends it.
	///
	/// # Panics
	///
	/// Panics if `min_capacity` is zero or greater than the segment size.
	pub(crate) fn writable_segment(&mut self, min_capacity: usize) -> &mut Segment {
		assert!(
			(1..=SEGMENT_SIZE).contains(&min_capacity),
			"minimum capacity must be within 1..={SEGMENT_SIZE}, was {min_capacity}"
		);

		let has_room = self.segments
						   .back()
						   .is_some_and(|tail| tail.writable_len() >= min_capacity);
		if !has_room {
			let seg = self.claim();
			self.segments.push_back(seg);
		}
		self.segments
			.back_mut()
			.expect("a writable segment should have been claimed")
	}

	/// Removes the tail segment if nothing was written to it.
	pub(crate) fn trim_tail(&mut self) {
		if self.segments.back().is_some_and(Segment::is_empty) {
			if let Some(seg) = self.segments.pop_back() {
				self.recycle(seg);
			}
		}
	}

	/// Records `count` bytes written directly into the tail segment.
	pub(crate) fn grow_tail(&mut self, count: usize) {
		if let Some(tail) = self.segments.back_mut() {
			tail.grow(count);
			self.count += count;
		}
	}

	/// Returns the readable length of each segment, head first.
	pub(crate) fn segment_lens(&self) -> impl Iterator<Item = usize> + '_ {
		self.segments.iter().map(Segment::len)
	}

	/// Returns the head segment's readable window.
	pub(crate) fn head_data(&self) -> Option<&[u8]> {
		self.segments.front().map(Segment::data)
	}

	/// Consumes `count` bytes from the head segment, recycling it if drained.
	pub(crate) fn consume_head(&mut self, count: usize) {
		let Some(head) = self.segments.front_mut() else { return };
		let consumed = head.consume(count);
		if head.is_empty() {
			self.recycle_head();
		}
		self.count -= consumed;
	}

	/// Returns non-empty slices of buffer data within `range`.
	#[cfg_attr(not(feature = "hash"), allow(dead_code))]
	pub(crate) fn slices_in_range(&self, range: Range<usize>) -> impl Iterator<Item = &[u8]> + '_ {
		let Range { mut start, mut end } = range;
		self.segments.iter().filter_map(move |seg| {
			let data = seg.data();
			let len = data.len();
			let slice = (start < len && end > start).then(|| &data[start..min(end, len)]);
			start = start.saturating_sub(len);
			end = end.saturating_sub(len);
			slice
		})
	}

	/// Moves `count` bytes from the front of `source` to the end of this buffer.
	/// Whole segments are moved without copying; a partial head segment is either
	/// copied into the tail, shared, or copied into a fresh segment.
	pub(crate) fn move_from(&mut self, source: &mut Buffer<impl Pool>, mut count: usize) {
		debug_assert_le!(count, source.count());

		while count > 0 {
			let Some(head) = source.segments.front_mut() else { break };
			let head_len = head.len();
			if count < head_len {
				let fits_tail = self.segments
									.back_mut()
									.is_some_and(|tail| tail.write_from(head, count));
				if !fits_tail {
					let prefix = if count >= self.share_threshold {
						head.split_shared(count)
					} else {
						let mut seg = self.claim();
						seg.write(&head.data()[..count]);
						head.consume(count);
						seg
					};
					self.segments.push_back(prefix);
				}
				source.count -= count;
				self.count += count;
				return
			}

			if let Some(seg) = source.segments.pop_front() {
				source.count -= head_len;
				self.push_compacted(seg);
				count -= head_len;
			}
		}
	}

	/// Appends a segment, copying it into the tail instead if it fits there.
	fn push_compacted(&mut self, mut seg: Segment) {
		let len = seg.len();
		self.count += len;
		let compacted = self.segments
							.back_mut()
							.is_some_and(|tail| tail.write_from(&mut seg, len));
		if compacted || seg.is_empty() {
			self.recycle(seg);
		} else {
			self.segments.push_back(seg);
		}
	}

	fn copy_range_to(&mut self, sink: &mut Buffer<impl Pool>, mut offset: usize, mut count: usize) {
		let threshold = sink.share_threshold;
		for seg in self.segments.iter_mut() {
			if count == 0 { break }

			let len = seg.len();
			if offset >= len {
				offset -= len;
				continue
			}

			let size = min(len - offset, count);
			if size >= threshold {
				sink.count += size;
				sink.segments.push_back(seg.share(offset, size));
			} else {
				sink.write_slice(&seg.data()[offset..offset + size]);
			}
			count -= size;
			offset = 0;
		}
	}

	fn claim(&self) -> Segment {
		match self.allocation {
			Allocate::Pooled => self.pool.claim_one(),
			Allocate::Always => Segment::new(),
		}
	}

	fn recycle(&self, seg: Segment) {
		if self.allocation.is_pooled() {
			self.pool.collect_one(seg);
		}
	}

	fn recycle_head(&mut self) {
		if let Some(seg) = self.segments.pop_front() {
			self.recycle(seg);
		}
	}
}

impl<P: Pool> Drop for Buffer<P> {
	fn drop(&mut self) {
		self.clear();
	}
}

impl<P: Pool> Debug for Buffer<P> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Buffer")
			.field("count", &self.count)
			.field("segments", &self.segments)
			.field("share_threshold", &self.share_threshold)
			.field("allocation", &self.allocation)
			.finish_non_exhaustive()
	}
}

impl<P: Pool> PartialEq<[u8]> for Buffer<P> {
	fn eq(&self, mut other: &[u8]) -> bool {
		if self.count != other.len() {
			return false
		}

		self.iter_slices().all(move |slice| {
			let (cur, rest) = other.split_at(slice.len());
			other = rest;
			slice == cur
		})
	}
}

impl<P: Pool> PartialEq<&[u8]> for Buffer<P> {
	fn eq(&self, other: &&[u8]) -> bool { self == *other }
}

impl<P: Pool, const N: usize> PartialEq<[u8; N]> for Buffer<P> {
	fn eq(&self, other: &[u8; N]) -> bool { self == &other[..] }
}

impl<P: Pool, const N: usize> PartialEq<&[u8; N]> for Buffer<P> {
	fn eq(&self, other: &&[u8; N]) -> bool { self == &other[..] }
}

impl<P: Pool> PartialEq<Vec<u8>> for Buffer<P> {
	fn eq(&self, other: &Vec<u8>) -> bool { self == &other[..] }
}

impl<P: Pool, Q: Pool> PartialEq<Buffer<Q>> for Buffer<P> {
	fn eq(&self, other: &Buffer<Q>) -> bool {
		self.count == other.count &&
		self.iter_slices()
			.flatten()
			.eq(other.iter_slices().flatten())
	}
}
