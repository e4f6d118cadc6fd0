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

use std::error::Error as StdError;
use std::{io, result};
use amplify_derive::Display;
use ErrorKind::{Canceled, Closed, Eos, Io, OutOfBounds, Other, TimedOut};

pub type ErrorBox = Box<dyn StdError + Send + Sync>;
pub type Result<T = (), E = Error> = result::Result<T, E>;

/// The operation that was running when an error occurred.
#[derive(Copy, Clone, Debug, Default, Display, Eq, PartialEq)]
pub enum OperationKind {
	#[default]
	#[display("unknown operation")]
	Unknown,
	#[display("read from buffer")]
	BufRead,
	#[display("write to buffer")]
	BufWrite,
	#[display("copy buffer")]
	BufCopy,
	#[display("skip buffer")]
	BufSkip,
	#[display("read from stream")]
	Read,
	#[display("write to stream")]
	Write,
	#[display("flush stream")]
	Flush,
	#[display("close stream")]
	Close,
	#[display("enter timeout")]
	Enter,
	#[display("{0}")]
	Other(&'static str),
}

/// What went wrong.
#[derive(Copy, Clone, Debug, Display, Eq, PartialEq)]
pub enum ErrorKind {
	/// Data was required, but the source was exhausted first.
	#[display("premature end-of-stream")]
	Eos,
	/// The underlying transport failed.
	#[display("IO error")]
	Io,
	/// The operation outlived its deadline or timeout, either because the
	/// watchdog closed its resource or because the deadline had already passed.
	#[display("timed out")]
	TimedOut,
	/// The timeout governing the operation was canceled.
	#[display("canceled")]
	Canceled,
	#[display("stream closed")]
	Closed,
	/// An offset or count fell outside the bounds of its target.
	#[display("offset or count out of bounds")]
	OutOfBounds,
	#[display("{0}")]
	Other(&'static str),
}

#[derive(Debug, thiserror::Error)]
#[error("{op} failed; {kind}")]
pub struct Error {
	op: OperationKind,
	kind: ErrorKind,
	#[source]
	source: Option<ErrorBox>,
}

impl Error {
	pub(crate) fn new(
		op: OperationKind,
		kind: ErrorKind,
		source: Option<ErrorBox>
	) -> Self {
		Self { op, kind, source }
	}

	/// Creates a new error with a custom message.
	pub fn other(op: OperationKind, message: &'static str) -> Self {
		Self::new(op, Other(message), None)
	}

	/// Creates a new "end-of-stream" error.
	pub fn eos(op: OperationKind) -> Self { Self::new(op, Eos, None) }

	/// Creates a new IO error.
	pub fn io(op: OperationKind, error: io::Error) -> Self {
		Self::new(op, Io, Some(error.into()))
	}

	/// Creates a new "closed" error.
	pub fn closed(op: OperationKind) -> Self { Self::new(op, Closed, None) }

	/// Creates a new "out of bounds" error.
	pub fn out_of_bounds(op: OperationKind) -> Self { Self::new(op, OutOfBounds, None) }

	/// Creates a new "canceled" error.
	pub fn canceled(op: OperationKind) -> Self { Self::new(op, Canceled, None) }

	/// Creates a new timeout error, keeping the transport error the forced close
	/// provoked, if any, as its source.
	pub fn timed_out(op: OperationKind, cause: Option<Error>) -> Self {
		Self::new(op, TimedOut, cause.map(Into::into))
	}

	/// Returns the operation kind.
	pub fn operation(&self) -> OperationKind { self.op }

	/// Sets the operation kind.
	pub fn with_operation(mut self, op: OperationKind) -> Self {
		self.op = op;
		self
	}

	/// Returns the error kind.
	pub fn kind(&self) -> ErrorKind { self.kind }

	/// Returns `true` if the error is an end-of-stream error.
	pub fn is_eos(&self) -> bool { matches!(self.kind, Eos) }

	/// Returns `true` if the operation timed out.
	pub fn is_timeout(&self) -> bool { matches!(self.kind, TimedOut) }

	/// Returns `true` if the stream was closed.
	pub fn is_closed(&self) -> bool { matches!(self.kind, Closed) }

	/// Returns the source downcast into an IO Error, if possible.
	pub fn io_source(&self) -> Option<&io::Error> {
		self.source.as_deref()?.downcast_ref()
	}
}

impl From<io::Error> for Error {
	fn from(value: io::Error) -> Self {
		match value.kind() {
			io::ErrorKind::UnexpectedEof => Self::eos(OperationKind::Unknown),
			// Socket read/write timeouts surface as either of these, depending on
			// the platform.
			io::ErrorKind::TimedOut |
			io::ErrorKind::WouldBlock =>
				Self::new(OperationKind::Unknown, TimedOut, Some(value.into())),
			_ => Self::io(OperationKind::Unknown, value)
		}
	}
}

impl From<Error> for io::Error {
	fn from(value: Error) -> Self {
		let kind = match value.kind {
			Eos => io::ErrorKind::UnexpectedEof,
			TimedOut => io::ErrorKind::TimedOut,
			Canceled => io::ErrorKind::Interrupted,
			Closed => io::ErrorKind::NotConnected,
			OutOfBounds => io::ErrorKind::InvalidInput,
			Io => {
				return match value.source.map(|source| source.downcast::<io::Error>()) {
					Some(Ok(error)) => *error,
					Some(Err(source)) => io::Error::other(source),
					None => io::Error::other(value.op.to_string()),
				}
			}
			Other(_) => io::ErrorKind::Other,
		};
		io::Error::new(kind, value)
	}
}

/// Attaches an [`OperationKind`] to errors as they cross layer boundaries.
pub trait ResultContext<T> {
	fn context(self, op: OperationKind) -> Result<T>;
}

impl<T, E: Into<Error>> ResultContext<T> for result::Result<T, E> {
	#[inline]
	fn context(self, op: OperationKind) -> Result<T> {
		self.map_err(|err| err.into().with_operation(op))
	}
}
