// SPDX-License-Identifier: Apache-2.0

use std::cmp::min;
use std::io;
use std::io::ErrorKind::Interrupted;
use crate::{Buffer, Result};
use crate::pool::Pool;
use crate::streams::{BufSource, BufStream, Source, Stream};

impl<P: Pool> Stream for Buffer<P> { }

impl<P: Pool> Source for Buffer<P> {
	/// Moves up to `count` bytes into `sink`. Whole segments are moved rather
	/// than copied.
	fn read(&mut self, sink: &mut Buffer<impl Pool>, count: usize) -> Result<Option<usize>> {
		if count == 0 {
			return Ok(Some(0))
		}

		if self.is_empty() {
			return Ok(None)
		}

		let count = min(count, self.count());
		sink.move_from(self, count);
		Ok(Some(count))
	}
}

impl<P: Pool> BufStream for Buffer<P> {
	type Pool = P;

	#[inline]
	fn buf(&self) -> &Buffer<P> { self }
	#[inline]
	fn buf_mut(&mut self) -> &mut Buffer<P> { self }
}

impl<P: Pool> BufSource for Buffer<P> {
	/// Returns `true` if at least `count` bytes are buffered. A buffer has no
	/// underlying source to read more from.
	fn request(&mut self, count: usize) -> Result<bool> {
		Ok(self.count() >= count)
	}
}

impl<P: Pool> Buffer<P> {
	/// Reads up to `count` bytes from `reader` into the tail segment with one
	/// call, retrying if interrupted. Returns `None` if the reader is exhausted.
	pub(crate) fn fill_from_reader(
		&mut self,
		reader: &mut impl io::Read,
		count: usize
	) -> io::Result<Option<usize>> {
		if count == 0 {
			return Ok(Some(0))
		}

		let spare = self.writable_segment(1)
						.spare_mut()
						.expect("writable segments should be owned");
		let limit = min(count, spare.len());
		let result = loop {
			match reader.read(&mut spare[..limit]) {
				Err(error) if error.kind() == Interrupted => continue,
				result => break result
			}
		};

		match result {
			Ok(0) => {
				self.trim_tail();
				Ok(None)
			}
			Ok(read) => {
				self.grow_tail(read);
				Ok(Some(read))
			}
			Err(error) => {
				self.trim_tail();
				Err(error)
			}
		}
	}
}
