// SPDX-License-Identifier: Apache-2.0

//! Socket streams guarded by watchdog timeouts. A blocking socket call can't be
//! interrupted, so when its timeout fires the watchdog shuts the socket down from
//! its own thread through a cloned handle, forcing the call to return.

use std::io;
use std::net::{Shutdown, TcpStream};
use cfg_if::cfg_if;
use crate::{Result, ResultContext};
use crate::OperationKind::Other;
use crate::std_io::{ReaderSource, WriterSink};
use crate::timeout::{AsyncTimeout, TimeoutSink, TimeoutSource, Watchdog};

/// A socket source, reading through a [`ReaderSource`] guarded by an
/// [`AsyncTimeout`].
pub type SocketSource<S> = TimeoutSource<ReaderSource<S>>;

/// A socket sink, writing through a [`WriterSink`] guarded by an
/// [`AsyncTimeout`].
pub type SocketSink<S> = TimeoutSink<WriterSink<S>>;

/// A blocking socket that can be shut down from another thread.
pub trait Socket: io::Read + io::Write + Send + Sync + Sized + 'static {
	/// Creates a new handle to the same socket.
	fn try_clone_socket(&self) -> io::Result<Self>;

	/// Shuts down both halves of the socket, unblocking any pending calls.
	fn shutdown_socket(&self) -> io::Result<()>;
}

impl Socket for TcpStream {
	fn try_clone_socket(&self) -> io::Result<Self> { self.try_clone() }

	fn shutdown_socket(&self) -> io::Result<()> { self.shutdown(Shutdown::Both) }
}

cfg_if! {
	if #[cfg(unix)] {
		use std::os::unix::net::UnixStream;

		impl Socket for UnixStream {
			fn try_clone_socket(&self) -> io::Result<Self> { self.try_clone() }

			fn shutdown_socket(&self) -> io::Result<()> { self.shutdown(Shutdown::Both) }
		}
	}
}

/// Creates a source reading from `socket`, timed out by the process-wide
/// watchdog.
pub fn socket_source<S: Socket>(socket: S) -> Result<SocketSource<S>> {
	socket_source_with(socket, Watchdog::global())
}

/// Creates a source reading from `socket`, timed out by `watchdog`.
pub fn socket_source_with<S: Socket>(socket: S, watchdog: Watchdog) -> Result<SocketSource<S>> {
	let timeout = shutdown_timeout(&socket, watchdog)?;
	Ok(timeout.source(ReaderSource::new(socket)))
}

/// Creates a sink writing to `socket`, timed out by the process-wide watchdog.
pub fn socket_sink<S: Socket>(socket: S) -> Result<SocketSink<S>> {
	socket_sink_with(socket, Watchdog::global())
}

/// Creates a sink writing to `socket`, timed out by `watchdog`.
pub fn socket_sink_with<S: Socket>(socket: S, watchdog: Watchdog) -> Result<SocketSink<S>> {
	let timeout = shutdown_timeout(&socket, watchdog)?;
	Ok(timeout.sink(WriterSink::new(socket)))
}

/// Splits `socket` into a source and a sink with independent timeouts.
pub fn split_socket<S: Socket>(socket: S, watchdog: Watchdog) -> Result<(SocketSource<S>, SocketSink<S>)> {
	let read_half = socket.try_clone_socket().context(Other("clone socket"))?;
	Ok((
		socket_source_with(read_half, watchdog.clone())?,
		socket_sink_with(socket, watchdog)?
	))
}

fn shutdown_timeout<S: Socket>(socket: &S, watchdog: Watchdog) -> Result<AsyncTimeout> {
	let handle = socket.try_clone_socket().context(Other("clone socket"))?;
	Ok(AsyncTimeout::with_closer(watchdog, move || handle.shutdown_socket()))
}
