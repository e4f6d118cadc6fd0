// SPDX-License-Identifier: Apache-2.0

/// The default minimum size for segment data to be shared rather than copied.
pub const DEFAULT_SHARE_THRESHOLD: usize = 1024;

/// Options for tuning [`Buffer`](super::Buffer)'s behavior and performance.
///
/// # Share threshold
///
/// The minimum size for segment data to be shared rather than copying it to
/// another segment, when part of a segment moves between buffers. Defaults to
/// `1024B`, one eighth the segment size. With a value more than the segment
/// size, segments are never shared.
///
/// Sharing is O(1) where copying is O(n), but a shared segment can never be
/// written again, so sharing small amounts of data wastes most of a segment.
///
/// # Allocation
///
/// By default, segments are claimed from the pool and returned to it once
/// drained. Buffers can also be set to always allocate, ignoring the pool.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub struct BufferOptions {
	pub share_threshold: usize,
	pub allocation: Allocate,
}

/// The segment allocation mode.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum Allocate {
	/// Claim segments from the pool, recycling them when drained.
	#[default]
	Pooled,
	/// Always allocate segments, ignoring the pool.
	Always,
}

impl Allocate {
	/// Returns `true` if the mode is [`Pooled`](Self::Pooled).
	pub fn is_pooled(&self) -> bool {
		matches!(self, Self::Pooled)
	}

	/// Returns `true` if the mode is [`Always`](Self::Always).
	pub fn is_always(&self) -> bool {
		matches!(self, Self::Always)
	}
}

impl Default for BufferOptions {
	fn default() -> Self { Self::new() }
}

impl BufferOptions {
	/// Creates a new set of buffer options.
	pub const fn new() -> Self {
		Self {
			share_threshold: DEFAULT_SHARE_THRESHOLD,
			allocation: Allocate::Pooled,
		}
	}

	/// Presets the options to create a "lean" buffer, disabling sharing. The
	/// buffer always copies partial segments.
	#[inline]
	pub const fn lean() -> Self {
		Self {
			share_threshold: usize::MAX,
			..Self::new()
		}
	}

	/// Returns the segment share threshold.
	#[inline]
	pub const fn share_threshold(&self) -> usize { self.share_threshold }

	/// Returns the segment allocation mode.
	#[inline]
	pub const fn allocation(&self) -> Allocate { self.allocation }

	/// Sets the segment share threshold.
	#[inline]
	pub const fn with_share_threshold(mut self, value: usize) -> Self {
		self.share_threshold = value;
		self
	}

	/// Sets the segment allocation mode.
	#[inline]
	pub const fn with_allocation(mut self, value: Allocate) -> Self {
		self.allocation = value;
		self
	}

	/// Sets segment allocation to [`Always`](Allocate::Always).
	#[inline]
	pub const fn always_allocate(self) -> Self {
		self.with_allocation(Allocate::Always)
	}
}
