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

mod async_timeout;
mod watchdog;

pub use async_timeout::*;
pub use watchdog::*;

use std::cmp::min;
use std::time::{Duration, Instant};
use crate::{Error, OperationKind, Result};

/// The largest number of bytes a timeout sink writes under one guarded call.
pub const TIMEOUT_WRITE_SIZE: usize = 64 * 1024;

/// How long a watchdog thread waits with an empty queue before exiting.
pub const WATCHDOG_IDLE: Duration = Duration::from_secs(60);

static NO_TIMEOUT: Timeout = Timeout::none();

/// A deadline and duration consulted between chunks of blocking work.
///
/// The duration is relative to the start of each guarded call, re-armed every
/// time. The deadline is absolute, spanning every call until it's cleared. When
/// both are set, whichever comes first applies.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Timeout {
	duration: Option<Duration>,
	deadline: Option<Instant>,
	canceled: bool,
}

impl Timeout {
	/// Creates a timeout with neither a duration nor a deadline.
	pub const fn none() -> Self {
		Self {
			duration: None,
			deadline: None,
			canceled: false,
		}
	}

	/// Returns a reference to a timeout that never applies.
	#[inline]
	pub fn none_ref() -> &'static Timeout { &NO_TIMEOUT }

	/// Creates a timeout with a per-call duration.
	pub fn after(duration: Duration) -> Self {
		let mut timeout = Self::none();
		timeout.set_timeout(duration);
		timeout
	}

	/// Sets the per-call duration. A zero duration clears it.
	pub fn set_timeout(&mut self, duration: Duration) -> &mut Self {
		self.duration = (!duration.is_zero()).then_some(duration);
		self
	}

	/// Returns the per-call duration, if set.
	#[inline]
	pub fn timeout(&self) -> Option<Duration> { self.duration }

	pub fn clear_timeout(&mut self) -> &mut Self {
		self.duration = None;
		self
	}

	/// Sets the absolute deadline.
	pub fn set_deadline(&mut self, deadline: Instant) -> &mut Self {
		self.deadline = Some(deadline);
		self
	}

	/// Sets the absolute deadline to `duration` from now.
	pub fn deadline_after(&mut self, duration: Duration) -> &mut Self {
		self.set_deadline(Instant::now() + duration)
	}

	/// Returns the absolute deadline, if set.
	#[inline]
	pub fn deadline(&self) -> Option<Instant> { self.deadline }

	#[inline]
	pub fn has_deadline(&self) -> bool { self.deadline.is_some() }

	pub fn clear_deadline(&mut self) -> &mut Self {
		self.deadline = None;
		self
	}

	/// Cancels the timeout. Subsequent chunks of guarded work fail with a
	/// "canceled" error.
	pub fn cancel(&mut self) { self.canceled = true }

	#[inline]
	pub fn is_canceled(&self) -> bool { self.canceled }

	/// Returns `true` if either a duration or a deadline is set.
	#[inline]
	pub fn is_set(&self) -> bool {
		self.duration.is_some() || self.deadline.is_some()
	}

	/// Fails if the timeout was canceled or the deadline has passed.
	pub fn throw_if_reached(&self) -> Result {
		if self.canceled {
			return Err(Error::canceled(OperationKind::Unknown))
		}

		if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
			return Err(Error::timed_out(OperationKind::Other("deadline reached"), None))
		}

		Ok(())
	}

	/// Returns the instant a call starting at `now` should be timed out, the
	/// earliest of the duration from now and the deadline.
	pub fn fire_at(&self, now: Instant) -> Option<Instant> {
		match (self.duration, self.deadline) {
			(Some(duration), Some(deadline)) => Some(min(now + duration, deadline)),
			(Some(duration), None) => Some(now + duration),
			(None, deadline) => deadline,
		}
	}
}

#[cfg(test)]
mod test {
	use std::time::{Duration, Instant};
	use super::Timeout;

	#[test]
	fn zero_duration_clears() {
		let mut timeout = Timeout::after(Duration::from_secs(1));
		assert!(timeout.is_set());
		timeout.set_timeout(Duration::ZERO);
		assert_eq!(timeout.timeout(), None);
		assert!(!timeout.is_set());
	}

	#[test]
	fn fire_at_is_earliest() {
		let now = Instant::now();
		let mut timeout = Timeout::after(Duration::from_secs(10));
		assert_eq!(timeout.fire_at(now), Some(now + Duration::from_secs(10)));
		timeout.set_deadline(now + Duration::from_secs(2));
		assert_eq!(timeout.fire_at(now), Some(now + Duration::from_secs(2)));
		timeout.clear_timeout();
		assert_eq!(timeout.fire_at(now), Some(now + Duration::from_secs(2)));
		timeout.clear_deadline();
		assert_eq!(timeout.fire_at(now), None);
	}

	#[test]
	fn throw_if_reached() {
		let mut timeout = Timeout::none();
		assert!(timeout.throw_if_reached().is_ok());
		timeout.set_deadline(Instant::now() - Duration::from_millis(1));
		assert!(timeout.throw_if_reached().unwrap_err().is_timeout());
		timeout.clear_deadline().cancel();
		assert_eq!(
			timeout.throw_if_reached().unwrap_err().kind(),
			crate::ErrorKind::Canceled
		);
	}
}
