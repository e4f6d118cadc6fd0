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

//! ## How it works
//!
//! Data is written to and read from reusable blocks of memory called *segments*.
//! Each segment holds up to 8KiB with a readable window; bytes are written after
//! the window and read from its front. When a segment is drained, it's returned
//! to a *pool*, and segments are claimed from this pool to write data. The pool
//! is a best-effort cache bounded by a byte budget, 64KiB by default; when it's
//! empty segments are allocated, and segments returned to a full pool are
//! dropped.
//!
//! ### Buffers
//!
//! A [`Buffer`] is a FIFO queue of segments in a ring buffer. Moving data between
//! buffers moves whole segments without copying. When part of a segment moves,
//! its memory is either copied or, for runs of at least 1024B by default, shared.
//! Shared memory is read-only: a shared segment can never be written again and is
//! never pooled, so data reachable from two buffers can't change under either.
//!
//! ### Streams
//!
//! A [`Source`] reads data into a buffer and a [`Sink`] writes data from one.
//! Adapters wrap [readers and writers](std_io), [files](streams::file), and
//! [sockets](streams::socket). The [buffered wrappers](buffered_wrappers) pair a
//! stream with a buffer for batched access, reading one segment at a time and
//! writing only complete segments until flushed.
//!
//! ### Timeouts
//!
//! Blocking socket calls can't be interrupted, so socket streams are guarded by
//! an [`AsyncTimeout`]. Before each blocking call, the timeout registers with a
//! [`Watchdog`], a single background thread that sleeps until the earliest
//! deadline. If the call is still in flight by then, the watchdog shuts the
//! socket down, forcing the call to return, and the call reports a timeout
//! error rather than the transport error the shutdown caused.

mod buffer;
pub mod buffered_wrappers;
mod error;
pub mod pool;
mod segment;
pub mod std_io;
pub mod streams;
pub mod timeout;
mod util;

pub use buffer::*;
pub use error::*;
pub use segment::{Block, Segment, SharedBlock, SEGMENT_SIZE};
pub use streams::{
	BufSink,
	BufSource,
	BufStream,
	Sink,
	SinkExt,
	Source,
	SourceExt,
	Stream,
};
pub use timeout::{AsyncTimeout, Timeout, Watchdog};
