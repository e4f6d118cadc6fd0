// SPDX-License-Identifier: Apache-2.0

use digest::{Digest, FixedOutputReset, Output};
use crate::{Buffer, Error, Result};
use crate::OperationKind::Write;
use crate::pool::Pool;
use crate::timeout::Timeout;
use super::{Sink, Source, Stream};

/// A [`Source`] that hashes data read from its inner source.
#[derive(Debug)]
pub struct HashSource<H, S> {
	hasher: H,
	source: S,
}

/// A [`Sink`] that hashes data written to its inner sink.
#[derive(Debug)]
pub struct HashSink<H, S> {
	hasher: H,
	sink: S,
}

macro_rules! hash_accessors {
    ($inner:ident$ty:ident) => {
		/// Returns a reference to the hasher.
		#[inline]
		pub fn hasher(&self) -> &H { &self.hasher }

		/// Returns a mutable reference to the hasher.
		#[inline]
		pub fn hasher_mut(&mut self) -> &mut H { &mut self.hasher }

		/// Returns the hash of all data so far, leaving the hasher intact.
		pub fn hash(&self) -> Output<H> where H: Clone {
			self.hasher.clone().finalize()
		}

		/// Takes the hash of all data so far, resetting the hasher.
		pub fn take_hash(&mut self) -> Output<H> where H: FixedOutputReset {
			Digest::finalize_reset(&mut self.hasher)
		}

		/// Returns the hash of all data so far as a lowercase hex string.
		pub fn hex(&self) -> String where H: Clone {
			base16ct::lower::encode_string(&self.hash())
		}

		/// Returns a reference to the inner stream.
		#[inline]
		pub fn get_ref(&self) -> &$ty { &self.$inner }

		/// Returns a mutable reference to the inner stream, bypassing hashing.
		#[inline]
		pub fn get_mut(&mut self) -> &mut $ty { &mut self.$inner }

		/// Unwraps the inner stream, dropping the hasher.
		pub fn into_inner(self) -> $ty { self.$inner }
	};
}

impl<H: Digest, S: Source> HashSource<H, S> {
	/// Creates a new hash source, hashing data read from `source` with `hasher`.
	pub fn new(source: S, hasher: H) -> Self {
		Self { hasher, source }
	}

	hash_accessors! { source S }
}

impl<H: Digest, S: Sink> HashSink<H, S> {
	/// Creates a new hash sink, hashing data written to `sink` with `hasher`.
	pub fn new(sink: S, hasher: H) -> Self {
		Self { hasher, sink }
	}

	hash_accessors! { sink S }
}

impl<H, S: Source> Stream for HashSource<H, S> {
	fn is_closed(&self) -> bool { self.source.is_closed() }

	/// Closes the inner source. The hash is left intact.
	fn close(&mut self) -> Result { self.source.close() }

	fn timeout(&self) -> &Timeout { self.source.timeout() }
}

impl<H: Digest, S: Source> Source for HashSource<H, S> {
	fn read(&mut self, sink: &mut Buffer<impl Pool>, count: usize) -> Result<Option<usize>> {
		let start = sink.count();
		let read = self.source.read(sink, count)?;
		if let Some(read) = read {
			sink.hash_range(start..start + read, &mut self.hasher);
		}
		Ok(read)
	}
}

impl<H, S: Sink> Stream for HashSink<H, S> {
	fn is_closed(&self) -> bool { self.sink.is_closed() }

	/// Closes the inner sink. The hash is left intact.
	fn close(&mut self) -> Result { self.sink.close() }

	fn timeout(&self) -> &Timeout { self.sink.timeout() }
}

impl<H: Digest, S: Sink> Sink for HashSink<H, S> {
	/// Writes `count` bytes to the inner sink, hashing only the bytes it accepted.
	fn write(&mut self, source: &mut Buffer<impl Pool>, count: usize) -> Result {
		if count > source.count() {
			return Err(Error::out_of_bounds(Write))
		}

		// The inner sink is handed a copy, so bytes it failed to write can be
		// told apart from those it wrote.
		let mut chunk = Buffer::with_options(source.pool().clone(), source.options());
		source.copy_to(&mut chunk, 0, count)?;
		let result = self.sink.write(&mut chunk, count);
		let written = count - chunk.count();
		source.hash_range(0..written, &mut self.hasher);
		source.skip(written);
		result
	}

	fn flush(&mut self) -> Result { self.sink.flush() }
}

macro_rules! hash {
    ($sec:tt$feature:literal$module:ident
	$($size_name:literal$size_fn:ident$size_hasher:ident)+
	) => {
		$(
		hash! {
			$sec
			$module::$size_hasher
			$feature
			$size_name
			$size_fn
		}
		)+
	};
    (secure $module:ident::$ty:ident$feature:literal$name:literal$method:ident) => {
		#[cfg(feature = $feature)]
		impl<S: Source> HashSource<$module::$ty, S> {
			/// Creates a new hash source, hashing data read from `source` with
			#[doc = concat!($name, ".")]
			#[inline]
			pub fn $method(source: S) -> Self {
				Self::new(source, $module::$ty::new())
			}
		}

		#[cfg(feature = $feature)]
		impl<S: Sink> HashSink<$module::$ty, S> {
			/// Creates a new hash sink, hashing data written to `sink` with
			#[doc = concat!($name, ".")]
			#[inline]
			pub fn $method(sink: S) -> Self {
				Self::new(sink, $module::$ty::new())
			}
		}
	};
    (broken $module:ident::$ty:ident$feature:literal$name:literal$method:ident) => {
		#[cfg(feature = $feature)]
		impl<S: Source> HashSource<$module::$ty, S> {
			/// Creates a new hash source, hashing data read from `source` with
			#[doc = concat!($name, ".")]
			/// This hash function has been broken; use it for checksums only.
			#[inline]
			pub fn $method(source: S) -> Self {
				Self::new(source, $module::$ty::new())
			}
		}

		#[cfg(feature = $feature)]
		impl<S: Sink> HashSink<$module::$ty, S> {
			/// Creates a new hash sink, hashing data written to `sink` with
			#[doc = concat!($name, ".")]
			/// This hash function has been broken; use it for checksums only.
			#[inline]
			pub fn $method(sink: S) -> Self {
				Self::new(sink, $module::$ty::new())
			}
		}
	};
}

hash! {
	broken "md5" md5
	"MD5" md5 Md5
}

hash! {
	broken "sha1" sha1
	"SHA1" sha1 Sha1
}

hash! {
	secure "sha2" sha2
	"SHA-256" sha256 Sha256
	"SHA-512" sha512 Sha512
}

hash! {
	secure "sha3" sha3
	"SHA3-256 (Keccak)" sha3_256 Sha3_256
	"SHA3-512 (Keccak)" sha3_512 Sha3_512
}

hash! {
	secure "groestl" groestl
	"Grøstl-256" groestl256 Groestl256
	"Grøstl-512" groestl512 Groestl512
}

hash! {
	secure "shabal" shabal
	"Shabal-256" shabal256 Shabal256
	"Shabal-512" shabal512 Shabal512
}

hash! {
	secure "whirlpool" whirlpool
	"Whirlpool" whirlpool Whirlpool
}
