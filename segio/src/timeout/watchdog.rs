// SPDX-License-Identifier: Apache-2.0

//! The watchdog service, a background thread firing timeout actions in deadline
//! order.
//!
//! Any number of threads schedule actions concurrently; one lock guards the
//! queue and the thread's wake condition. The thread starts on the first
//! schedule, sleeps until the earliest deadline or until an earlier one is
//! queued, and exits after sitting idle with an empty queue. It's restarted by
//! the next schedule.

use std::collections::VecDeque;
use std::fmt;
use std::fmt::{Debug, Formatter};
use std::panic;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use once_cell::sync::Lazy;
use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{debug, warn};
use crate::{Error, OperationKind, Result};
use super::WATCHDOG_IDLE;

/// A callback run on the watchdog thread when its deadline passes.
pub type Action = Arc<dyn Fn() + Send + Sync>;

/// Identifies a scheduled action.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Ticket(u64);

struct Entry {
	at: Instant,
	ticket: Ticket,
	action: Action,
}

#[derive(Default)]
struct Queue {
	/// Entries sorted by deadline, earliest first.
	entries: VecDeque<Entry>,
	running: bool,
	next_id: u64,
}

struct Inner {
	queue: Mutex<Queue>,
	wake: Condvar,
	idle: Duration,
}

/// A handle to a watchdog service. Clones share the same queue and thread.
#[derive(Clone)]
pub struct Watchdog {
	inner: Arc<Inner>,
}

static GLOBAL: Lazy<Watchdog> = Lazy::new(Watchdog::new);

impl Default for Watchdog {
	fn default() -> Self { Self::new() }
}

impl Watchdog {
	/// Creates a new, independent watchdog.
	pub fn new() -> Self { Self::with_idle_timeout(WATCHDOG_IDLE) }

	/// Creates a new watchdog whose thread exits after `idle` with nothing
	/// queued.
	pub fn with_idle_timeout(idle: Duration) -> Self {
		Self {
			inner: Arc::new(Inner {
				queue: Mutex::default(),
				wake: Condvar::new(),
				idle,
			})
		}
	}

	/// Returns a handle to the process-wide watchdog.
	pub fn global() -> Self { GLOBAL.clone() }

	/// Schedules `action` to run at `at`, starting the watchdog thread if it's
	/// not running.
	pub fn schedule(&self, at: Instant, action: Action) -> Result<Ticket> {
		let mut queue = self.inner.queue.lock();
		let ticket = Ticket(queue.next_id);
		queue.next_id += 1;

		let index = queue.entries.partition_point(|entry| entry.at <= at);
		queue.entries.insert(index, Entry { at, ticket, action });

		if !queue.running {
			if let Err(error) = self.spawn() {
				queue.entries.remove(index);
				return Err(Error::io(OperationKind::Enter, error))
			}
			queue.running = true;
		} else if index == 0 {
			self.inner.wake.notify_one();
		}
		Ok(ticket)
	}

	/// Removes a scheduled action, returning `true` if it was still queued, or
	/// `false` if it already fired.
	pub fn cancel(&self, ticket: Ticket) -> bool {
		let mut queue = self.inner.queue.lock();
		match queue.entries.iter().position(|entry| entry.ticket == ticket) {
			Some(index) => {
				queue.entries.remove(index);
				true
			}
			None => false
		}
	}

	/// Returns the number of queued actions.
	pub fn pending(&self) -> usize { self.inner.queue.lock().entries.len() }

	/// Returns `true` if the watchdog thread is running.
	pub fn is_running(&self) -> bool { self.inner.queue.lock().running }

	fn spawn(&self) -> std::io::Result<()> {
		let inner = Arc::clone(&self.inner);
		thread::Builder::new()
			.name("segio watchdog".into())
			.spawn(move || inner.run())?;
		Ok(())
	}
}

impl Inner {
	fn run(&self) {
		debug!("watchdog thread started");
		let mut queue = self.queue.lock();
		loop {
			let Some(at) = queue.entries.front().map(|entry| entry.at) else {
				let idle = self.wake.wait_for(&mut queue, self.idle).timed_out();
				if idle && queue.entries.is_empty() {
					queue.running = false;
					debug!(idle = ?self.idle, "watchdog thread idle, exiting");
					return
				}
				continue
			};

			let now = Instant::now();
			if at > now {
				self.wake.wait_until(&mut queue, at);
				continue
			}

			let mut expired = Vec::new();
			while queue.entries.front().is_some_and(|entry| entry.at <= now) {
				expired.extend(queue.entries.pop_front());
			}

			MutexGuard::unlocked(&mut queue, || {
				for Entry { at, ticket, action } in expired {
					debug!(?ticket, overshoot = ?now.saturating_duration_since(at), "timeout fired");
					if panic::catch_unwind(AssertUnwindSafe(|| action())).is_err() {
						warn!(?ticket, "timeout action panicked");
					}
				}
			});
		}
	}
}

impl Debug for Watchdog {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		let queue = self.inner.queue.lock();
		f.debug_struct("Watchdog")
			.field("pending", &queue.entries.len())
			.field("running", &queue.running)
			.field("idle", &self.inner.idle)
			.finish()
	}
}

#[cfg(test)]
mod test {
	use std::sync::Arc;
	use std::sync::mpsc::channel;
	use std::thread::sleep;
	use std::time::{Duration, Instant};
	use super::Watchdog;

	#[test]
	fn fires_in_deadline_order() {
		let watchdog = Watchdog::new();
		let (send, recv) = channel();
		let now = Instant::now();
		for (i, delay) in [(2, 60), (0, 20), (1, 40)] {
			let send = send.clone();
			watchdog.schedule(
				now + Duration::from_millis(delay),
				Arc::new(move || send.send(i).unwrap())
			).unwrap();
		}

		let order: Vec<i32> = (0..3).map(|_| recv.recv_timeout(Duration::from_secs(5)).unwrap()).collect();
		assert_eq!(order, [0, 1, 2]);
		assert_eq!(watchdog.pending(), 0);
	}

	#[test]
	fn canceled_actions_never_fire() {
		let watchdog = Watchdog::new();
		let (send, recv) = channel();
		let ticket = watchdog.schedule(
			Instant::now() + Duration::from_millis(30),
			Arc::new(move || send.send(()).unwrap())
		).unwrap();
		assert!(watchdog.cancel(ticket));
		assert!(!watchdog.cancel(ticket));
		assert!(recv.recv_timeout(Duration::from_millis(100)).is_err());
	}

	#[test]
	fn panicking_action_keeps_thread_alive() {
		let watchdog = Watchdog::new();
		let (send, recv) = channel();
		watchdog.schedule(Instant::now(), Arc::new(|| panic!("action failed"))).unwrap();
		watchdog.schedule(
			Instant::now() + Duration::from_millis(10),
			Arc::new(move || send.send(()).unwrap())
		).unwrap();
		recv.recv_timeout(Duration::from_secs(5)).unwrap();
		assert_eq!(watchdog.pending(), 0);
		assert!(watchdog.is_running());
	}

	#[test]
	fn idle_thread_exits_and_restarts() {
		let watchdog = Watchdog::with_idle_timeout(Duration::from_millis(20));
		let (send, recv) = channel();
		let action = {
			let send = send.clone();
			Arc::new(move || send.send(()).unwrap())
		};
		watchdog.schedule(Instant::now(), action.clone()).unwrap();
		recv.recv_timeout(Duration::from_secs(5)).unwrap();

		let start = Instant::now();
		while watchdog.is_running() && start.elapsed() < Duration::from_secs(5) {
			sleep(Duration::from_millis(10));
		}
		assert!(!watchdog.is_running());

		watchdog.schedule(Instant::now(), action).unwrap();
		recv.recv_timeout(Duration::from_secs(5)).unwrap();
	}
}
