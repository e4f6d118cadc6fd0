// SPDX-License-Identifier: Apache-2.0

use crate::{Buffer, Error, Result};
use crate::OperationKind::Write;
use crate::pool::Pool;
use super::{Sink, Source, Stream};

/// Returns a [`Sink`] that writes to nowhere, dropping any data written to it.
pub fn blackhole() -> Blackhole { Blackhole }

/// Returns a [`Source`] that reads from nowhere, producing no data.
pub fn empty() -> Empty { Empty }

/// A [`Sink`] that writes to nowhere, dropping any data written to it.
#[derive(Copy, Clone, Debug, Default)]
pub struct Blackhole;

impl Stream for Blackhole { }

impl Sink for Blackhole {
	/// Skips `count` bytes at `source`.
	fn write(&mut self, source: &mut Buffer<impl Pool>, count: usize) -> Result {
		if count > source.count() {
			return Err(Error::out_of_bounds(Write))
		}

		source.skip(count);
		Ok(())
	}
}

/// A [`Source`] that reads from nowhere, producing no data.
#[derive(Copy, Clone, Debug, Default)]
pub struct Empty;

impl Stream for Empty { }

impl Source for Empty {
	/// Reads nothing, returning `None` unless `count` is zero.
	fn read(&mut self, _sink: &mut Buffer<impl Pool>, count: usize) -> Result<Option<usize>> {
		Ok((count == 0).then_some(0))
	}
}
