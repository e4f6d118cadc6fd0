// SPDX-License-Identifier: Apache-2.0

use std::fs::{File, OpenOptions};
use std::path::Path;
use crate::{Buffer, Result, ResultContext};
use crate::OperationKind::{Flush, Other};
use crate::pool::Pool;
use crate::std_io::{ReaderSource, WriterSink};
use crate::timeout::Timeout;
use super::{Sink, Source, Stream};

/// A [`Source`] reading from a [file](File).
#[derive(Debug)]
pub struct FileSource {
	source: ReaderSource<File>,
	read_count: usize,
	len: Option<usize>,
}

/// A [`Sink`] writing to a [file](File).
#[derive(Debug)]
pub struct FileSink {
	sink: WriterSink<File>,
}

impl FileSource {
	/// Opens the file at `path` for reading.
	pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
		Ok(File::open(path).context(Other("open file"))?.into())
	}

	/// Returns the number of bytes read so far.
	pub fn read_count(&self) -> usize { self.read_count }

	/// Returns the file length when it was opened, if known.
	pub fn file_len(&self) -> Option<usize> { self.len }

	/// Returns the timeout checked before each read.
	pub fn timeout_mut(&mut self) -> &mut Timeout { self.source.timeout_mut() }

	/// Unwraps the file, or returns `None` if closed.
	pub fn into_inner(self) -> Option<File> { self.source.into_inner() }
}

impl From<File> for FileSource {
	fn from(value: File) -> Self {
		let len = value.metadata().ok().map(|meta| meta.len() as usize);
		Self {
			source: value.into(),
			read_count: 0,
			len,
		}
	}
}

impl Stream for FileSource {
	fn is_closed(&self) -> bool { self.source.is_closed() }

	fn close(&mut self) -> Result { self.source.close() }

	fn timeout(&self) -> &Timeout { self.source.timeout() }
}

impl Source for FileSource {
	fn read(&mut self, sink: &mut Buffer<impl Pool>, count: usize) -> Result<Option<usize>> {
		let read = self.source.read(sink, count)?;
		self.read_count += read.unwrap_or_default();
		Ok(read)
	}
}

impl FileSink {
	/// Creates or truncates the file at `path` for writing.
	pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
		Ok(File::create(path).context(Other("create file"))?.into())
	}

	/// Opens or creates the file at `path` for appending.
	pub fn append<P: AsRef<Path>>(path: P) -> Result<Self> {
		let file = OpenOptions::new()
			.append(true)
			.create(true)
			.open(path)
			.context(Other("open file"))?;
		Ok(file.into())
	}

	/// Syncs written data and metadata to disk.
	pub fn sync(&mut self) -> Result {
		self.sink.flush()?;
		match self.sink.get_ref() {
			Some(file) => file.sync_all().context(Flush),
			None => Ok(())
		}
	}

	/// Returns the timeout checked before each write.
	pub fn timeout_mut(&mut self) -> &mut Timeout { self.sink.timeout_mut() }

	/// Unwraps the file, or returns `None` if closed.
	pub fn into_inner(self) -> Option<File> { self.sink.into_inner() }
}

impl From<File> for FileSink {
	fn from(value: File) -> Self {
		Self { sink: value.into() }
	}
}

impl Stream for FileSink {
	fn is_closed(&self) -> bool { self.sink.is_closed() }

	fn close(&mut self) -> Result { self.sink.close() }

	fn timeout(&self) -> &Timeout { self.sink.timeout() }
}

impl Sink for FileSink {
	fn write(&mut self, source: &mut Buffer<impl Pool>, count: usize) -> Result {
		self.sink.write(source, count)
	}

	fn flush(&mut self) -> Result { self.sink.flush() }
}
