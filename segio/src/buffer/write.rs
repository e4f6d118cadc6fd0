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
use std::io;
use std::io::ErrorKind::{Interrupted, WriteZero};
use crate::{Buffer, Error, Result, ResultContext};
use crate::pool::Pool;
use crate::streams::{BufSink, Sink};
use crate::timeout::Timeout;
use crate::OperationKind::{BufWrite, Write};

impl<P: Pool> Sink for Buffer<P> {
	fn write(&mut self, source: &mut Buffer<impl Pool>, count: usize) -> Result {
		if count > source.count() {
			return Err(Error::out_of_bounds(BufWrite))
		}

		self.move_from(source, count);
		Ok(())
	}
}

impl<P: Pool> BufSink for Buffer<P> {
	/// Does nothing; a buffer is its own target.
	fn emit_complete_segments(&mut self) -> Result { Ok(()) }

	/// Does nothing; a buffer is its own target.
	fn emit(&mut self) -> Result { Ok(()) }
}

impl<P: Pool> Buffer<P> {
	/// Writes `count` bytes to `writer` segment by segment, retrying partial and
	/// interrupted writes. The timeout is checked before every write. Bytes are
	/// consumed as they're written, so on failure the buffer holds exactly the
	/// bytes that weren't.
	pub(crate) fn drain_into_writer(
		&mut self,
		writer: &mut impl io::Write,
		mut count: usize,
		timeout: &Timeout
	) -> Result {
		if count > self.count() {
			return Err(Error::out_of_bounds(Write))
		}

		while count > 0 {
			timeout.throw_if_reached().context(Write)?;
			let Some(head) = self.head_data() else { break };
			let len = min(head.len(), count);
			let written = match writer.write(&head[..len]) {
				Ok(0) => return Err(Error::io(Write, WriteZero.into())),
				Ok(written) => written,
				Err(error) if error.kind() == Interrupted => continue,
				Err(error) => return Err(Error::from(error).with_operation(Write))
			};
			self.consume_head(written);
			count -= written;
		}
		Ok(())
	}
}
