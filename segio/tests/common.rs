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

#![allow(dead_code, unused_macros)]

use std::fmt::{Arguments, Debug};
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use parking_lot::{Condvar, Mutex};
use segio::pool::{DefaultPool, Pool, PoolOptions};
use segio::Segment;

macro_rules! qc_assert_eq {
	($left:expr,$right:expr) => {{
		let left = $left;
		let right = $right;
		if left == right {
			TestResult::passed()
		} else {
			TestResult::error(
				common::format_qc_assert_error(&left, &right, None)
			)
		}
	}};
    ($left:expr,$right:expr,$($arg:tt)+) => {{
		let left = $left;
		let right = $right;
		if left == right {
			TestResult::passed()
		} else {
			TestResult::error(
				common::format_qc_assert_error(&left, &right, Some(format_args!($($arg)+)))
			)
		}
	}};
}

pub fn format_qc_assert_error<L: Debug, R: Debug>(left: &L, right: &R, msg: Option<Arguments>) -> String {
	if let Some(msg) = msg {
		format!(
			"assertion failed `(left == right)`: {msg}\n \
			left: `{left:?}`,\nright: `{right:?}`",
		)
	} else {
		format!(
			"assertion failed `(left == right)`:\n \
			left: `{left:?}`,\nright: `{right:?}`",
		)
	}
}

/// Returns `len` bytes of patterned data.
pub fn data(len: usize) -> Vec<u8> {
	(0..len).map(|i| (i % 251) as u8).collect()
}

/// A writer accepting only one byte per call.
#[derive(Debug, Default)]
pub struct OneByteWriter {
	pub data: Vec<u8>,
	pub calls: usize,
}

impl io::Write for OneByteWriter {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		self.calls += 1;
		match buf.first() {
			Some(&byte) => {
				self.data.push(byte);
				Ok(1)
			}
			None => Ok(0)
		}
	}

	fn flush(&mut self) -> io::Result<()> { Ok(()) }
}

/// A latch shared between a blocking mock transport and its closer.
#[derive(Clone, Debug, Default)]
pub struct Blocker(Arc<(Mutex<bool>, Condvar)>);

impl Blocker {
	/// Releases all blocked calls, as closing a socket would.
	pub fn unblock(&self) {
		let (closed, wake) = &*self.0;
		*closed.lock() = true;
		wake.notify_all();
	}

	pub fn is_unblocked(&self) -> bool { *self.0.0.lock() }

	/// Blocks until released, then fails like a call on a closed socket.
	fn block(&self) -> io::Error {
		let (closed, wake) = &*self.0;
		let mut closed = closed.lock();
		while !*closed {
			wake.wait(&mut closed);
		}
		io::ErrorKind::ConnectionAborted.into()
	}
}

/// A reader whose calls never complete until its [`Blocker`] is released.
#[derive(Debug)]
pub struct BlockingReader(pub Blocker);

impl io::Read for BlockingReader {
	fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
		Err(self.0.block())
	}
}

/// A writer whose calls never complete until its [`Blocker`] is released.
#[derive(Debug)]
pub struct BlockingWriter(pub Blocker);

impl io::Write for BlockingWriter {
	fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
		Err(self.0.block())
	}

	fn flush(&mut self) -> io::Result<()> { Ok(()) }
}

/// An isolated pool counting segments claimed and collected.
#[derive(Clone, Debug)]
pub struct CountingPool {
	inner: DefaultPool,
	claimed: Arc<AtomicUsize>,
	collected: Arc<AtomicUsize>,
}

impl CountingPool {
	pub fn new() -> Self {
		Self {
			inner: DefaultPool::new(PoolOptions::default()),
			claimed: Arc::default(),
			collected: Arc::default(),
		}
	}

	pub fn claimed(&self) -> usize { self.claimed.load(Ordering::SeqCst) }

	pub fn collected(&self) -> usize { self.collected.load(Ordering::SeqCst) }

	/// Returns the number of claimed segments not yet collected.
	pub fn outstanding(&self) -> usize { self.claimed() - self.collected() }

	/// Returns the number of segments held by the pool.
	pub fn pooled(&self) -> usize { self.inner.segment_count() }
}

impl Pool for CountingPool {
	fn get() -> Self { Self::new() }

	fn claim_one(&self) -> Segment {
		self.claimed.fetch_add(1, Ordering::SeqCst);
		self.inner.claim_one()
	}

	fn collect_one(&self, segment: Segment) {
		self.collected.fetch_add(1, Ordering::SeqCst);
		self.inner.collect_one(segment)
	}

	fn shed(&self) { self.inner.shed() }
}
