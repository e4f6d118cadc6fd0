// SPDX-License-Identifier: Apache-2.0

mod common;

use pretty_assertions::assert_eq;
use segio::{Buffer, BufSink, BufSource, BufStream, ErrorKind, Result, Sink, SinkExt, Stream, SEGMENT_SIZE};
use segio::buffered_wrappers::{BufferedSink, BufferedSource};
use segio::std_io::WriterSink;
use segio::streams::{buffered_slice, slice_source};
use segio::streams::blackhole::empty;
use common::data;

#[test]
fn integers() -> Result {
	let mut sink = WriterSink::new(Vec::new()).buffered();
	sink.write_u8(0xAB)?;
	sink.write_i8(-2)?;
	sink.write_u16(0x0102)?;
	sink.write_u16_le(0x0102)?;
	sink.write_i32(-3)?;
	sink.write_u32_le(0xA1B2_C3D4)?;
	sink.write_i64(i64::MIN)?;
	sink.write_u64_le(42)?;
	let written = sink.into_inner()?.into_inner().unwrap();
	assert_eq!(written.len(), 1 + 1 + 2 + 2 + 4 + 4 + 8 + 8);
	assert_eq!(&written[2..6], [1u8, 2, 2, 1]);

	let mut source = buffered_slice(&written);
	assert_eq!(source.read_u8()?, 0xAB);
	assert_eq!(source.read_i8()?, -2);
	assert_eq!(source.read_u16()?, 0x0102);
	assert_eq!(source.read_u16_le()?, 0x0102);
	assert_eq!(source.read_i32()?, -3);
	assert_eq!(source.read_u32_le()?, 0xA1B2_C3D4);
	assert_eq!(source.read_i64()?, i64::MIN);
	assert_eq!(source.read_u64_le()?, 42);
	assert!(source.exhausted()?);
	Ok(())
}

#[test]
fn short_reads_fail_without_consuming() -> Result {
	let mut source = buffered_slice(b"abc");
	let error = source.read_u32().unwrap_err();
	assert_eq!(error.kind(), ErrorKind::Eos);
	assert_eq!(source.buf().count(), 3);
	assert_eq!(source.read_vec(3)?, b"abc");
	Ok(())
}

#[test]
fn read_all() -> Result {
	let payload = data(3 * SEGMENT_SIZE + 9);
	let mut source = buffered_slice(&payload);
	assert_eq!(source.skip(9)?, 9);

	let mut sink: Buffer = Buffer::default();
	assert_eq!(source.read_all(&mut sink)?, 3 * SEGMENT_SIZE);
	assert_eq!(sink.to_vec(), &payload[9..]);
	assert_eq!(source.skip(1)?, 0);
	Ok(())
}

#[test]
fn write_from() -> Result {
	let payload = data(2 * SEGMENT_SIZE + 5);
	let mut sink = BufferedSink::new(Buffer::lean());
	let mut source = slice_source(&payload);
	sink.write_from(&mut source, SEGMENT_SIZE + 1)?;
	assert_eq!(sink.write_all_from(&mut source)?, SEGMENT_SIZE + 4);

	let error = sink.write_from(&mut empty(), 1).unwrap_err();
	assert_eq!(error.kind(), ErrorKind::Eos);

	let inner = sink.into_inner()?;
	assert_eq!(inner.to_vec(), payload);
	Ok(())
}

#[test]
fn flush_writes_partial_segments() -> Result {
	let mut sink = WriterSink::new(Vec::new()).buffered();
	sink.write_slice(b"partial")?;
	assert_eq!(sink.get_ref().and_then(WriterSink::get_ref).map(Vec::len), Some(0));
	sink.flush()?;
	assert_eq!(sink.get_ref().and_then(WriterSink::get_ref).map(Vec::as_slice), Some(&b"partial"[..]));
	assert!(sink.buf().is_empty());
	Ok(())
}

#[test]
fn close_writes_buffered_data() -> Result {
	let mut sink = BufferedSink::new(WriterSink::new(Vec::new()));
	sink.write_slice(b"closing")?;
	sink.close()?;
	assert!(sink.is_closed());
	assert!(sink.get_ref().is_some_and(Stream::is_closed));

	let mut source = BufferedSource::new(slice_source(b"abc"));
	assert_eq!(source.read_u8()?, b'a');
	source.close()?;
	assert!(source.buf().is_empty());
	assert!(source.read_u8().unwrap_err().is_closed());
	Ok(())
}

#[test]
fn sink_write_bounds() {
	let mut sink = WriterSink::new(Vec::new()).buffered();
	let error = sink.write(&mut Buffer::from_slice(b"ab"), 3).unwrap_err();
	assert_eq!(error.kind(), ErrorKind::OutOfBounds);
}
