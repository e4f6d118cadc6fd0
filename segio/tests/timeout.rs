// SPDX-License-Identifier: Apache-2.0

mod common;

use std::io::Write;
use std::net::{TcpListener, TcpStream};
use std::thread::sleep;
use std::time::{Duration, Instant};
use pretty_assertions::assert_eq;
use segio::{AsyncTimeout, Buffer, ErrorKind, OperationKind, Result, Sink, Source, Stream, Watchdog};
use segio::std_io::{ReaderSource, WriterSink};
use segio::streams::slice_source;
use segio::streams::socket::{socket_sink_with, socket_source_with, split_socket};
use common::{data, Blocker, BlockingReader, BlockingWriter};

fn tcp_pair() -> std::io::Result<(TcpStream, TcpStream)> {
	let listener = TcpListener::bind("127.0.0.1:0")?;
	let client = TcpStream::connect(listener.local_addr()?)?;
	let (server, _) = listener.accept()?;
	Ok((client, server))
}

#[test]
fn blocked_read_times_out() {
	let blocker = Blocker::default();
	let closer = blocker.clone();
	let timeout = AsyncTimeout::with_watchdog(Watchdog::new(), move || closer.unblock());
	let mut source = timeout.source(ReaderSource::new(BlockingReader(blocker.clone())));
	source.timeout_mut().set_timeout(Duration::from_millis(50));

	let start = Instant::now();
	let error = source.read(&mut Buffer::lean(), 1).unwrap_err();
	let elapsed = start.elapsed();

	assert!(error.is_timeout(), "expected a timeout, got {error}");
	assert_eq!(error.operation(), OperationKind::Read);
	assert!(blocker.is_unblocked());
	assert!(elapsed >= Duration::from_millis(50));
	assert!(elapsed < Duration::from_millis(250), "took {elapsed:?} to time out");
	assert_eq!(source.timeout_mut().watchdog().pending(), 0);
}

#[test]
fn blocked_write_times_out() {
	let blocker = Blocker::default();
	let closer = blocker.clone();
	let timeout = AsyncTimeout::with_watchdog(Watchdog::new(), move || closer.unblock());
	let mut sink = timeout.sink(WriterSink::new(BlockingWriter(blocker)));
	sink.timeout_mut().set_timeout(Duration::from_millis(50));

	let mut source = Buffer::from_slice(b"stuck");
	let error = sink.write_all(&mut source).unwrap_err();
	assert!(error.is_timeout(), "expected a timeout, got {error}");
	assert_eq!(error.operation(), OperationKind::Write);
}

#[test]
fn completed_calls_cancel_timeout() -> Result {
	let watchdog = Watchdog::new();
	let timeout = AsyncTimeout::with_watchdog(watchdog.clone(), || { });
	let mut source = timeout.source(slice_source(b"ready"));
	source.timeout_mut().set_timeout(Duration::from_secs(10));

	let mut sink: Buffer = Buffer::default();
	assert_eq!(source.read(&mut sink, 5)?, Some(5));
	assert_eq!(sink, b"ready");
	assert_eq!(watchdog.pending(), 0);
	Ok(())
}

#[test]
fn past_deadline_fails_fast() {
	let mut source = slice_source(b"data");
	source.timeout_mut().set_deadline(Instant::now());
	sleep(Duration::from_millis(1));
	let error = source.read(&mut Buffer::lean(), 4).unwrap_err();
	assert!(error.is_timeout());

	let mut source = slice_source(b"data");
	source.timeout_mut().cancel();
	let error = source.read(&mut Buffer::lean(), 4).unwrap_err();
	assert_eq!(error.kind(), ErrorKind::Canceled);
}

#[test]
fn silent_peer_read_times_out() -> Result {
	let (client, _server) = tcp_pair()?;
	let mut source = socket_source_with(client, Watchdog::new())?;
	source.timeout_mut().set_timeout(Duration::from_millis(50));

	let start = Instant::now();
	let error = source.read(&mut Buffer::lean(), 1).unwrap_err();
	assert!(error.is_timeout(), "expected a timeout, got {error}");
	let elapsed = start.elapsed();
	assert!(elapsed < Duration::from_millis(250), "took {elapsed:?} to time out");
	Ok(())
}

#[test]
fn stalled_peer_write_times_out() -> Result {
	let (client, _server) = tcp_pair()?;
	let mut sink = socket_sink_with(client, Watchdog::new())?;
	sink.timeout_mut().set_timeout(Duration::from_millis(100));

	// Large enough to fill both socket buffers, since the peer never reads.
	let payload = data(64 * 1024 * 1024);
	let mut source = Buffer::from_slice(&payload);
	let error = sink.write_all(&mut source).unwrap_err();
	assert!(error.is_timeout(), "expected a timeout, got {error}");
	assert!(source.count() < payload.len(), "some chunks should have been written");
	Ok(())
}

#[test]
fn split_socket_halves() -> Result {
	let (client, mut server) = tcp_pair()?;
	let (mut source, mut sink) = split_socket(client, Watchdog::new())?;
	source.timeout_mut().set_timeout(Duration::from_secs(5));
	sink.timeout_mut().set_timeout(Duration::from_secs(5));

	sink.write_all(&mut Buffer::from_slice(b"ping"))?;
	sink.flush()?;
	let mut echo = [0; 4];
	std::io::Read::read_exact(&mut server, &mut echo)?;
	assert_eq!(&echo, b"ping");

	server.write_all(b"pong")?;
	let mut received: Buffer = Buffer::default();
	while received.count() < 4 {
		if source.read(&mut received, 4)?.is_none() {
			break
		}
	}
	assert_eq!(received, b"pong");
	Ok(())
}

#[test]
fn close_after_cancel() -> Result {
	let (client, _server) = tcp_pair()?;
	let mut source = socket_source_with(client, Watchdog::new())?;
	source.timeout_mut().cancel();

	source.close()?;
	source.close()?;
	assert!(source.is_closed());
	Ok(())
}

#[test]
fn close_after_deadline() -> Result {
	let (client, _server) = tcp_pair()?;
	let mut sink = socket_sink_with(client, Watchdog::new())?;
	sink.timeout_mut().set_deadline(Instant::now());
	sleep(Duration::from_millis(1));

	assert!(sink.flush().unwrap_err().is_timeout());
	sink.close()?;
	sink.close()?;
	assert!(sink.is_closed());
	assert_eq!(sink.timeout_mut().watchdog().pending(), 0);
	Ok(())
}
