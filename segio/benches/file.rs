// SPDX-License-Identifier: Apache-2.0

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::time::Duration;
use criterion::{Criterion, criterion_group, criterion_main};
use tempfile::{tempfile, NamedTempFile};
use segio::{BufSource, Sink, SinkExt, SourceExt};
use segio::streams::file::{FileSink, FileSource};

fn source_file() -> NamedTempFile {
	let mut file = NamedTempFile::new().unwrap();
	let data: Vec<u8> = (0..1024 * 1024).map(|i| (i % 251) as u8).collect();
	file.write_all(&data).unwrap();
	file
}

fn file_read_write(c: &mut Criterion) {
	let path = source_file();
	c.bench_function("file_read_write", |b| b.iter(|| {
		let mut source = FileSource::open(path.path()).unwrap().buffered();
		let mut sink = FileSink::from(tempfile().unwrap()).buffered();
		source.read_all(&mut sink).unwrap();
		sink.flush().unwrap();
	}));
}

fn file_read_write_with_std(c: &mut Criterion) {
	let path = source_file();
	c.bench_function("file_read_write_with_std", |b| b.iter(|| {
		let mut reader = BufReader::new(File::open(path.path()).unwrap());
		let mut writer = BufWriter::new(tempfile().unwrap());
		loop {
			let data = reader.fill_buf().unwrap();
			if data.is_empty() {
				break
			}

			writer.write_all(data).unwrap();
			let written = data.len();
			reader.consume(written);
		}
		writer.flush().unwrap();
	}));
}

// https://github.com/bheisler/criterion.rs/issues/162
criterion_group! {
	name = benches;
	config = Criterion::default()
		.sample_size(10)
		.warm_up_time(Duration::from_millis(5))
		.measurement_time(Duration::from_millis(50));
	targets = file_read_write, file_read_write_with_std
}
criterion_main!(benches);
