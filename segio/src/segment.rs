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

use std::cmp::min;
use std::fmt;
use std::fmt::{Debug, Formatter};
use std::mem;
use std::sync::Arc;
use all_asserts::debug_assert_le;
use once_cell::sync::Lazy;

/// The fixed capacity of every segment, in bytes.
pub const SEGMENT_SIZE: usize = 8192;

/// A raw, fixed-size block of segment memory.
pub type Block = [u8; SEGMENT_SIZE];

/// Stands in for owned memory while it's being converted to shared memory.
static EMPTY_BLOCK: Lazy<SharedBlock> = Lazy::new(|| SharedBlock(Arc::new([0; SEGMENT_SIZE])));

/// Allocates a new zeroed block on the heap.
pub(crate) fn alloc_block() -> Box<Block> {
	Box::new([0; SEGMENT_SIZE])
}

/// A read-only view of a block referenced by more than one segment. There is
/// no way to get mutable access to its contents, so data reachable from two
/// buffers can never be written through either of them.
#[derive(Clone)]
pub struct SharedBlock(Arc<Block>);

impl SharedBlock {
	#[inline]
	fn as_slice(&self) -> &Block { &self.0 }
}

enum Memory {
	/// Uniquely owned memory, writable and recyclable.
	Owned(Box<Block>),
	/// Memory shared with at least one other segment, read-only.
	Shared(SharedBlock),
}

impl Memory {
	#[inline]
	fn as_slice(&self) -> &Block {
		match self {
			Self::Owned(block) => block,
			Self::Shared(block) => block.as_slice(),
		}
	}
}

/// A fixed-capacity byte block with a readable window `[pos,limit)`.
pub struct Segment {
	mem: Memory,
	/// The first unread offset.
	pos: usize,
	/// The first unwritten offset.
	limit: usize,
}

impl Segment {
	/// Allocates a new empty segment, bypassing any pool.
	pub fn new() -> Self { alloc_block().into() }

	/// Returns the first unread offset, from `[0,limit]`.
	#[inline]
	pub fn pos(&self) -> usize { self.pos }
	/// Returns the first unwritten offset, from `[pos,SEGMENT_SIZE]`.
	#[inline]
	pub fn limit(&self) -> usize { self.limit }
	/// Returns the number of readable bytes.
	#[inline]
	pub fn len(&self) -> usize { self.limit - self.pos }
	/// Returns `true` if the segment has no readable bytes.
	#[inline]
	pub fn is_empty(&self) -> bool { self.pos == self.limit }
	/// Returns `true` if no more bytes can be written after the limit.
	#[inline]
	pub fn is_full(&self) -> bool { self.limit == SEGMENT_SIZE }
	/// Returns `true` if the segment's memory is shared with another segment.
	#[inline]
	pub fn is_shared(&self) -> bool { matches!(self.mem, Memory::Shared(_)) }

	/// Returns the number of bytes that can be written after the limit. Shared
	/// segments are never writable.
	pub fn writable_len(&self) -> usize {
		if self.is_shared() { 0 } else { SEGMENT_SIZE - self.limit }
	}

	/// Returns the number of bytes this segment could hold after compacting its
	/// data to the start. Zero when shared.
	pub fn free_len(&self) -> usize {
		if self.is_shared() { 0 } else { SEGMENT_SIZE - self.len() }
	}

	/// Returns the readable window.
	#[inline]
	pub fn data(&self) -> &[u8] {
		&self.mem.as_slice()[self.pos..self.limit]
	}

	/// Returns the writable space after the limit, or `None` if shared.
	pub fn spare_mut(&mut self) -> Option<&mut [u8]> {
		match &mut self.mem {
			Memory::Owned(block) => Some(&mut block[self.limit..]),
			Memory::Shared(_) => None,
		}
	}

	/// Advances the limit by `count` bytes after writing into [`spare_mut`].
	///
	/// [`spare_mut`]: Self::spare_mut
	pub fn grow(&mut self, count: usize) {
		debug_assert!(!self.is_shared(), "shared segments cannot grow");
		debug_assert_le!(self.limit + count, SEGMENT_SIZE);
		self.limit = min(self.limit + count, SEGMENT_SIZE);
	}

	/// Advances the position by up to `count` bytes, returning the number of
	/// bytes consumed.
	pub fn consume(&mut self, count: usize) -> usize {
		let count = min(count, self.len());
		self.pos += count;
		count
	}

	/// Moves the readable window to the start of the block, making all free
	/// space writable. Has no effect on shared segments.
	pub fn compact(&mut self) {
		let Self { mem: Memory::Owned(block), pos, limit } = self else { return };
		if *pos > 0 {
			block.copy_within(*pos..*limit, 0);
			*limit -= *pos;
			*pos = 0;
		}
	}

	/// Writes as many bytes from `data` as fit, returning the number written.
	/// Writes nothing to shared segments.
	pub fn write(&mut self, data: &[u8]) -> usize {
		let Some(spare) = self.spare_mut() else { return 0 };
		let count = min(spare.len(), data.len());
		spare[..count].copy_from_slice(&data[..count]);
		self.grow(count);
		count
	}

	/// Reads as many bytes as fit into `buf`, returning the number read.
	pub fn read(&mut self, buf: &mut [u8]) -> usize {
		let count = min(self.len(), buf.len());
		buf[..count].copy_from_slice(&self.data()[..count]);
		self.pos += count;
		count
	}

	/// Pushes one byte, returning `false` if the segment is full or shared.
	pub fn push(&mut self, value: u8) -> bool {
		self.write(&[value]) == 1
	}

	/// Pops one byte from the front of the window.
	pub fn pop(&mut self) -> Option<u8> {
		let value = *self.data().first()?;
		self.pos += 1;
		Some(value)
	}

	/// Moves `count` bytes from the front of `source` into this segment,
	/// compacting first if the bytes don't fit after the limit. Returns `false`
	/// and moves nothing if they can't fit at all.
	pub fn write_from(&mut self, source: &mut Segment, count: usize) -> bool {
		let count = min(count, source.len());
		if count > self.free_len() {
			return false
		}

		if count > self.writable_len() {
			self.compact();
		}

		let written = self.write(&source.data()[..count]);
		debug_assert_eq!(written, count);
		source.pos += written;
		true
	}

	/// Converts this segment to shared memory, returning a new segment sharing
	/// `len` bytes of the window starting at `offset`.
	///
	/// # Panics
	///
	/// Panics if the range is outside the readable window.
	pub fn share(&mut self, offset: usize, len: usize) -> Segment {
		assert!(offset + len <= self.len(), "shared range must be within the readable window");
		let block = self.make_shared();
		let pos = self.pos + offset;
		Self {
			mem: Memory::Shared(block),
			pos,
			limit: pos + len,
		}
	}

	/// Splits the first `count` bytes off into a new segment sharing this one's
	/// memory, advancing this segment's position past them.
	pub fn split_shared(&mut self, count: usize) -> Segment {
		let prefix = self.share(0, count);
		self.pos += count;
		prefix
	}

	/// Resets the window to `[0,0)`.
	pub fn clear(&mut self) {
		self.pos = 0;
		self.limit = 0;
	}

	/// Returns the memory block, or `None` if shared. Shared memory is never
	/// recycled.
	pub(crate) fn into_block(self) -> Option<Box<Block>> {
		match self.mem {
			Memory::Owned(block) => Some(block),
			Memory::Shared(_) => None,
		}
	}

	fn make_shared(&mut self) -> SharedBlock {
		if let Memory::Shared(block) = &self.mem {
			return block.clone()
		}

		let placeholder = Memory::Shared(EMPTY_BLOCK.clone());
		let Memory::Owned(block) = mem::replace(&mut self.mem, placeholder) else {
			unreachable!("memory was checked to be owned")
		};
		let shared = SharedBlock(Arc::from(block));
		self.mem = Memory::Shared(shared.clone());
		shared
	}
}

impl Default for Segment {
	fn default() -> Self { Self::new() }
}

impl From<Box<Block>> for Segment {
	/// Creates an empty segment from a block, with `pos == limit == 0`.
	fn from(block: Box<Block>) -> Self {
		Self {
			mem: Memory::Owned(block),
			pos: 0,
			limit: 0,
		}
	}
}

impl Debug for Segment {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Segment")
			.field("pos", &self.pos)
			.field("limit", &self.limit)
			.field("shared", &self.is_shared())
			.finish()
	}
}

impl PartialEq<[u8]> for Segment {
	fn eq(&self, other: &[u8]) -> bool {
		self.data() == other
	}
}
