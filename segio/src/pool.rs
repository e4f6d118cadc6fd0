// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tracing::trace;
use crate::segment::{alloc_block, Block, Segment, SEGMENT_SIZE};

/// The default cumulative byte budget of a pool, eight segments.
pub const DEFAULT_POOL_BYTES: usize = 64 * 1024;

/// A source of recycled segments.
///
/// Pools are a best-effort cache: claiming never fails, falling back to
/// allocation when no recycled segments are left, and collecting silently drops
/// segments the pool has no room for.
pub trait Pool: Clone {
	/// Gets a shared reference to the process-wide pool.
	fn get() -> Self;

	/// Claims a single segment with `pos == limit == 0`.
	fn claim_one(&self) -> Segment;

	/// Collects a single segment back into the pool. Shared segments are never
	/// pooled.
	fn collect_one(&self, segment: Segment);

	/// Collects many segments back into the pool.
	fn collect(&self, segments: impl IntoIterator<Item = Segment>) {
		for seg in segments {
			self.collect_one(seg)
		}
	}

	/// Clears all pooled segments to free memory.
	fn shed(&self);
}

/// Options for tuning a [`SegmentPool`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub struct PoolOptions {
	/// The maximum number of bytes held by recycled segments. Segments collected
	/// beyond this budget are dropped.
	pub max_bytes: usize,
}

impl Default for PoolOptions {
	fn default() -> Self { Self::new() }
}

impl PoolOptions {
	pub const fn new() -> Self {
		Self { max_bytes: DEFAULT_POOL_BYTES }
	}

	/// Returns the pool byte budget.
	#[inline]
	pub const fn max_bytes(&self) -> usize { self.max_bytes }

	/// Sets the pool byte budget.
	#[inline]
	pub const fn with_max_bytes(mut self, value: usize) -> Self {
		self.max_bytes = value;
		self
	}
}

#[derive(Default)]
struct FreeList {
	blocks: Vec<Box<Block>>,
	byte_count: usize,
}

/// A synchronized free-list of recycled segment blocks, bounded by a byte
/// budget.
pub struct SegmentPool {
	free: Mutex<FreeList>,
	options: PoolOptions,
}

impl SegmentPool {
	/// Creates a new, empty pool.
	pub fn new(options: PoolOptions) -> Self {
		Self {
			free: Mutex::default(),
			options,
		}
	}

	/// Returns the options the pool was created with.
	pub fn options(&self) -> PoolOptions { self.options }

	/// Returns the number of bytes held by pooled segments.
	pub fn byte_count(&self) -> usize { self.free.lock().byte_count }

	/// Returns the number of pooled segments.
	pub fn segment_count(&self) -> usize { self.free.lock().blocks.len() }

	/// Takes a recycled segment, or allocates one if the pool is empty.
	pub fn take(&self) -> Segment {
		let block = {
			let mut free = self.free.lock();
			let block = free.blocks.pop();
			if block.is_some() {
				free.byte_count -= SEGMENT_SIZE;
			}
			block
		};
		block.unwrap_or_else(alloc_block).into()
	}

	/// Returns a drained segment to the pool while the pool is under budget.
	pub fn recycle(&self, segment: Segment) {
		let Some(block) = segment.into_block() else { return };
		let mut free = self.free.lock();
		if free.byte_count + SEGMENT_SIZE > self.options.max_bytes {
			trace!(pooled = free.byte_count, "segment pool full, discarding segment");
			return
		}

		free.byte_count += SEGMENT_SIZE;
		free.blocks.push(block);
	}

	/// Drops all pooled segments.
	pub fn clear(&self) {
		let mut free = self.free.lock();
		free.blocks.clear();
		free.byte_count = 0;
	}
}

impl Default for SegmentPool {
	fn default() -> Self { Self::new(PoolOptions::default()) }
}

impl Debug for SegmentPool {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		let free = self.free.lock();
		f.debug_struct("SegmentPool")
			.field("segments", &free.blocks.len())
			.field("byte_count", &free.byte_count)
			.field("options", &self.options)
			.finish()
	}
}

/// A cloneable handle to a [`SegmentPool`], either the process-wide pool or one
/// injected by the caller.
#[derive(Clone, Debug)]
pub struct DefaultPool(Arc<SegmentPool>);

impl DefaultPool {
	/// Creates a handle to a new, independent pool.
	pub fn new(options: PoolOptions) -> Self {
		Self(Arc::new(SegmentPool::new(options)))
	}

	/// Returns the pool this handle refers to.
	pub fn inner(&self) -> &SegmentPool { &self.0 }

	/// Returns the number of bytes held by pooled segments.
	pub fn byte_count(&self) -> usize { self.0.byte_count() }

	/// Returns the number of pooled segments.
	pub fn segment_count(&self) -> usize { self.0.segment_count() }
}

impl From<Arc<SegmentPool>> for DefaultPool {
	fn from(value: Arc<SegmentPool>) -> Self { Self(value) }
}

impl Default for DefaultPool {
	fn default() -> Self { pool() }
}

impl Pool for DefaultPool {
	fn get() -> Self { pool() }

	#[inline]
	fn claim_one(&self) -> Segment { self.0.take() }

	#[inline]
	fn collect_one(&self, segment: Segment) { self.0.recycle(segment) }

	fn shed(&self) { self.0.clear() }
}

/// Clones a shared reference to the process-wide segment pool.
#[inline]
pub fn pool() -> DefaultPool { POOL.clone() }

static POOL: Lazy<DefaultPool> = Lazy::new(|| DefaultPool::new(PoolOptions::default()));
