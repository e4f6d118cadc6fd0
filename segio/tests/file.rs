// SPDX-License-Identifier: Apache-2.0

mod common;

use std::io::{Read, Seek, SeekFrom};
use pretty_assertions::assert_eq;
use tempfile::{tempdir, tempfile};
use segio::{BufSink, BufSource, Result, SinkExt, SourceExt, Stream, SEGMENT_SIZE};
use segio::streams::file::{FileSink, FileSource};
use segio::streams::{copy, read_to_vec};
use common::data;

#[test]
fn file_sink() -> Result {
	let payload = data(5 * SEGMENT_SIZE + 3);
	let file = tempfile()?;
	let mut sink = FileSink::from(file).buffered();
	sink.write_slice(&payload)?;
	sink.write_u32(0xDEAD_BEEF)?;

	let mut file = sink.into_inner()?
					   .into_inner()
					   .unwrap();
	file.seek(SeekFrom::Start(0))?;
	let mut target = Vec::with_capacity(payload.len() + 4);
	file.read_to_end(&mut target)?;
	assert_eq!(&target[..payload.len()], payload);
	assert_eq!(&target[payload.len()..], [0xDEu8, 0xAD, 0xBE, 0xEF]);
	Ok(())
}

#[test]
fn file_source() -> Result {
	let dir = tempdir()?;
	let path = dir.path().join("source.bin");
	let payload = data(3 * SEGMENT_SIZE + 1);
	std::fs::write(&path, &payload)?;

	let mut source = FileSource::open(&path)?;
	assert_eq!(source.file_len(), Some(payload.len()));
	assert_eq!(read_to_vec(&mut source)?, payload);
	assert_eq!(source.read_count(), payload.len());

	source.close()?;
	source.close()?;
	assert!(source.is_closed());
	Ok(())
}

#[test]
fn file_round_trip() -> Result {
	let dir = tempdir()?;
	let path = dir.path().join("round_trip.bin");
	let payload = data(2 * SEGMENT_SIZE + 40);

	let mut source = segio::streams::slice_source(&payload);
	let mut sink = FileSink::create(&path)?;
	assert_eq!(copy(&mut source, &mut sink)?, payload.len());
	sink.sync()?;
	sink.close()?;

	let mut source = FileSource::open(&path)?.buffered();
	assert_eq!(source.read_vec(SEGMENT_SIZE)?, &payload[..SEGMENT_SIZE]);
	assert_eq!(source.skip(SEGMENT_SIZE)?, SEGMENT_SIZE);
	let mut rest = Vec::new();
	assert_eq!(source.read_to_end(&mut rest)?, 40);
	assert_eq!(rest, &payload[2 * SEGMENT_SIZE..]);
	Ok(())
}

#[test]
fn file_append() -> Result {
	let dir = tempdir()?;
	let path = dir.path().join("append.txt");

	let mut sink = FileSink::create(&path)?.buffered();
	sink.write_slice(b"first ")?;
	sink.close()?;

	let mut sink = FileSink::append(&path)?.buffered();
	sink.write_slice(b"second")?;
	sink.close()?;

	assert_eq!(std::fs::read(&path)?, b"first second");
	Ok(())
}

#[test]
fn missing_file_fails() {
	let dir = tempdir().unwrap();
	let error = FileSource::open(dir.path().join("missing")).unwrap_err();
	assert_eq!(
		error.io_source().map(std::io::Error::kind),
		Some(std::io::ErrorKind::NotFound)
	);
}
