// SPDX-License-Identifier: Apache-2.0

use std::cmp::min;
use std::fmt;
use std::fmt::{Debug, Formatter};
use std::io;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::Instant;
use itertools::FoldWhile::{Continue, Done};
use itertools::Itertools;
use tracing::debug;
use crate::{Buffer, Error, OperationKind, Result, ResultContext};
use crate::pool::Pool;
use crate::streams::{Sink, Source, Stream};
use super::{Action, Ticket, Timeout, Watchdog, TIMEOUT_WRITE_SIZE};
use OperationKind::{Close, Enter, Flush, Read, Write};

/// A [`Timeout`] enforced by a [`Watchdog`]: while a guarded call is in flight,
/// the watchdog runs a callback once the timeout elapses. The callback usually
/// closes the resource the call is blocked on, forcing it to return.
pub struct AsyncTimeout {
	timeout: Timeout,
	watchdog: Watchdog,
	on_timeout: Action,
	ticket: Option<Ticket>,
	entered: bool,
}

impl AsyncTimeout {
	/// Creates a timeout running `on_timeout` on the process-wide watchdog.
	pub fn new(on_timeout: impl Fn() + Send + Sync + 'static) -> Self {
		Self::with_watchdog(Watchdog::global(), on_timeout)
	}

	/// Creates a timeout running `on_timeout` on `watchdog`.
	pub fn with_watchdog(watchdog: Watchdog, on_timeout: impl Fn() + Send + Sync + 'static) -> Self {
		Self {
			timeout: Timeout::none(),
			watchdog,
			on_timeout: Arc::new(on_timeout),
			ticket: None,
			entered: false,
		}
	}

	/// Creates a timeout calling `close` on timeout. Close errors are logged
	/// and dropped; the blocked call reports the failure.
	pub fn with_closer(
		watchdog: Watchdog,
		close: impl Fn() -> io::Result<()> + Send + Sync + 'static
	) -> Self {
		Self::with_watchdog(watchdog, move || {
			if let Err(error) = close() {
				debug!(%error, "failed to close timed out resource");
			}
		})
	}

	/// Returns the underlying timeout.
	pub fn timeout(&self) -> &Timeout { &self.timeout }

	/// Returns the watchdog this timeout schedules on.
	pub fn watchdog(&self) -> &Watchdog { &self.watchdog }

	/// Arms the timeout before a blocking call. Does nothing if neither a
	/// duration nor a deadline is set. Fails if the timeout is already armed.
	pub fn enter(&mut self) -> Result {
		if self.entered {
			return Err(Error::other(Enter, "unbalanced enter/exit"))
		}

		let Some(at) = self.timeout.fire_at(Instant::now()) else {
			self.entered = true;
			return Ok(())
		};

		self.ticket = Some(self.watchdog.schedule(at, Arc::clone(&self.on_timeout))?);
		self.entered = true;
		Ok(())
	}

	/// Disarms the timeout after a blocking call, returning `true` if it fired
	/// while the call was in flight.
	pub fn exit(&mut self) -> bool {
		self.entered = false;
		match self.ticket.take() {
			Some(ticket) => !self.watchdog.cancel(ticket),
			None => false
		}
	}

	/// Runs a blocking call between [`enter`] and [`exit`]. If the timeout fired,
	/// the call fails with a timeout error whether it failed or not, keeping its
	/// error as the source.
	///
	/// [`enter`]: Self::enter
	/// [`exit`]: Self::exit
	pub fn guard<T>(&mut self, op: OperationKind, call: impl FnOnce() -> Result<T>) -> Result<T> {
		self.timeout.throw_if_reached().context(op)?;
		self.enter().context(op)?;
		let result = call();
		match (result, self.exit()) {
			(Err(error), true) => Err(Error::timed_out(op, Some(error))),
			(Ok(_), true) => Err(Error::timed_out(op, None)),
			(result, false) => result
		}
	}

	/// Runs a close call. A canceled timeout or a passed deadline doesn't fail
	/// the close; the call runs without arming the watchdog instead.
	pub fn guard_close(&mut self, call: impl FnOnce() -> Result) -> Result {
		if self.timeout.throw_if_reached().is_err() {
			return call()
		}
		self.guard(Close, call)
	}

	/// Wraps `source`, guarding each of its calls with this timeout.
	pub fn source<S: Source>(self, source: S) -> TimeoutSource<S> {
		TimeoutSource { source, timeout: self }
	}

	/// Wraps `sink`, guarding each of its calls with this timeout.
	pub fn sink<S: Sink>(self, sink: S) -> TimeoutSink<S> {
		TimeoutSink { sink, timeout: self }
	}
}

impl Deref for AsyncTimeout {
	type Target = Timeout;

	fn deref(&self) -> &Timeout { &self.timeout }
}

impl DerefMut for AsyncTimeout {
	fn deref_mut(&mut self) -> &mut Timeout { &mut self.timeout }
}

impl Drop for AsyncTimeout {
	fn drop(&mut self) {
		if let Some(ticket) = self.ticket.take() {
			self.watchdog.cancel(ticket);
		}
	}
}

impl Debug for AsyncTimeout {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("AsyncTimeout")
			.field("timeout", &self.timeout)
			.field("ticket", &self.ticket)
			.field("entered", &self.entered)
			.finish_non_exhaustive()
	}
}

/// A source guarded by an [`AsyncTimeout`].
#[derive(Debug)]
pub struct TimeoutSource<S> {
	source: S,
	timeout: AsyncTimeout,
}

impl<S> TimeoutSource<S> {
	pub fn timeout_mut(&mut self) -> &mut AsyncTimeout { &mut self.timeout }

	pub fn inner(&self) -> &S { &self.source }

	pub fn into_inner(self) -> S { self.source }
}

impl<S: Source> Stream for TimeoutSource<S> {
	fn is_closed(&self) -> bool { self.source.is_closed() }

	fn close(&mut self) -> Result {
		let Self { source, timeout } = self;
		timeout.guard_close(|| source.close())
	}

	fn timeout(&self) -> &Timeout { &self.timeout }
}

impl<S: Source> Source for TimeoutSource<S> {
	fn read(&mut self, sink: &mut Buffer<impl Pool>, count: usize) -> Result<Option<usize>> {
		let Self { source, timeout } = self;
		timeout.guard(Read, || source.read(sink, count))
	}
}

/// A sink guarded by an [`AsyncTimeout`]. Large writes are split into chunks of
/// at most [`TIMEOUT_WRITE_SIZE`] bytes on segment boundaries, each guarded on
/// its own, so a slow but progressing write doesn't time out.
#[derive(Debug)]
pub struct TimeoutSink<S> {
	sink: S,
	timeout: AsyncTimeout,
}

impl<S> TimeoutSink<S> {
	pub fn timeout_mut(&mut self) -> &mut AsyncTimeout { &mut self.timeout }

	pub fn inner(&self) -> &S { &self.sink }

	pub fn into_inner(self) -> S { self.sink }
}

impl<S: Sink> Stream for TimeoutSink<S> {
	fn is_closed(&self) -> bool { self.sink.is_closed() }

	fn close(&mut self) -> Result {
		let Self { sink, timeout } = self;
		timeout.guard_close(|| sink.close())
	}

	fn timeout(&self) -> &Timeout { &self.timeout }
}

impl<S: Sink> Sink for TimeoutSink<S> {
	fn write(&mut self, source: &mut Buffer<impl Pool>, mut count: usize) -> Result {
		if count > source.count() {
			return Err(Error::out_of_bounds(Write))
		}

		let Self { sink, timeout } = self;
		while count > 0 {
			let chunk = chunk_len(source, count);
			timeout.guard(Write, || sink.write(source, chunk))?;
			count -= chunk;
		}
		Ok(())
	}

	fn flush(&mut self) -> Result {
		let Self { sink, timeout } = self;
		timeout.guard(Flush, || sink.flush())
	}
}

/// Returns the number of bytes to write under one guarded call: whole segments
/// up to [`TIMEOUT_WRITE_SIZE`], but no more than `count`.
fn chunk_len(source: &Buffer<impl Pool>, count: usize) -> usize {
	let len = source.segment_lens().fold_while(0, |sum, len| {
		if sum >= count || (sum > 0 && sum + len > TIMEOUT_WRITE_SIZE) {
			Done(sum)
		} else {
			Continue(sum + len)
		}
	}).into_inner();
	min(len, count)
}

#[cfg(test)]
mod test {
	use std::sync::Arc;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::thread::sleep;
	use std::time::{Duration, Instant};
	use crate::Buffer;
	use crate::segment::SEGMENT_SIZE;
	use crate::timeout::{TIMEOUT_WRITE_SIZE, Watchdog};
	use super::{chunk_len, AsyncTimeout};

	fn counting() -> (AsyncTimeout, Arc<AtomicUsize>) {
		let fired = Arc::new(AtomicUsize::new(0));
		let count = fired.clone();
		let timeout = AsyncTimeout::with_watchdog(Watchdog::new(), move || {
			count.fetch_add(1, Ordering::SeqCst);
		});
		(timeout, fired)
	}

	#[test]
	fn unset_timeout_never_schedules() {
		let (mut timeout, _) = counting();
		timeout.enter().unwrap();
		assert_eq!(timeout.watchdog().pending(), 0);
		assert!(!timeout.exit());
	}

	#[test]
	fn unbalanced_enter_fails() {
		let (mut timeout, _) = counting();
		timeout.set_timeout(Duration::from_secs(10));
		timeout.enter().unwrap();
		assert!(timeout.enter().is_err());
		assert!(!timeout.exit());
		assert_eq!(timeout.watchdog().pending(), 0);
	}

	#[test]
	fn exit_reports_fired() {
		let (mut timeout, fired) = counting();
		timeout.set_timeout(Duration::from_millis(10));
		timeout.enter().unwrap();
		let start = Instant::now();
		while fired.load(Ordering::SeqCst) == 0 && start.elapsed() < Duration::from_secs(5) {
			sleep(Duration::from_millis(5));
		}
		assert!(timeout.exit());
	}

	#[test]
	fn completed_call_past_timeout_fails() {
		let (mut timeout, _) = counting();
		timeout.set_timeout(Duration::from_millis(10));
		let result = timeout.guard(crate::OperationKind::Read, || {
			sleep(Duration::from_millis(100));
			Ok(())
		});
		assert!(result.unwrap_err().is_timeout());

		let result = timeout.guard(crate::OperationKind::Read, || Ok(5));
		assert_eq!(result.unwrap(), 5);
	}

	#[test]
	fn close_runs_when_reached() {
		let (mut timeout, _) = counting();
		timeout.cancel();
		let mut closed = false;
		timeout.guard_close(|| { closed = true; Ok(()) }).unwrap();
		assert!(closed);

		let (mut timeout, _) = counting();
		timeout.set_deadline(Instant::now() - Duration::from_millis(1));
		timeout.guard_close(|| Ok(())).unwrap();
		assert_eq!(timeout.watchdog().pending(), 0);
	}

	#[test]
	fn chunks_split_on_segment_boundaries() {
		let mut buffer = Buffer::lean();
		buffer.write_slice(&vec![0; 10 * SEGMENT_SIZE + 100]);
		assert_eq!(chunk_len(&buffer, buffer.count()), TIMEOUT_WRITE_SIZE);
		assert_eq!(chunk_len(&buffer, 100), 100);
		assert_eq!(chunk_len(&buffer, SEGMENT_SIZE + 1), SEGMENT_SIZE + 1);
	}
}
