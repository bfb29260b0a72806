//! The byte-reservoir shared by every demuxer: a growing buffer fed forward from a
//! [`Read`] source, with a logical cursor that never moves backward.
//!
//! All containers this crate parses are read from a single forward pass. There is
//! no [`Seek`](std::io::Seek) bound anywhere below this module: the input is
//! modeled as a pull-style stream of unknown length, and "skip forward" is
//! implemented by actually reading (and discarding) bytes, not by seeking.

use std::io::Read;

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::error::{Error, Result};
use crate::macros::eof;

/// Upper bound on how much we'll grow the buffer to satisfy a single `ensure`
/// request before we consider the atomic unit being parsed to be bogus. This is
/// generous enough for an ASF Header Object but catches a corrupt 4 GiB size field
/// from ballooning memory.
const MAX_ATOMIC_UNIT: usize = 16 * 1024 * 1024;

/// A growing byte buffer fed by a [`Read`] source, addressed with a logical
/// cursor measured in bytes consumed since the start of the stream.
pub struct Reservoir<R> {
	source: R,
	buf: Vec<u8>,
	/// Index into `buf` of the current logical position.
	cursor: usize,
	/// File offset corresponding to `buf[0]`.
	base_offset: u64,
	eof: bool,
}

impl<R: Read> Reservoir<R> {
	pub fn new(source: R) -> Self {
		Reservoir {
			source,
			buf: Vec::new(),
			cursor: 0,
			base_offset: 0,
			eof: false,
		}
	}

	/// Logical byte offset of the cursor since the start of the stream. This is
	/// the invariant tracked for the "single-pass forward read" property: it
	/// never decreases across the lifetime of a `Reservoir`.
	pub fn position(&self) -> u64 {
		self.base_offset + self.cursor as u64
	}

	/// Discards buffered bytes before the cursor, bounding memory to the window
	/// still needed (the largest atomic unit currently being parsed).
	pub fn compact(&mut self) {
		if self.cursor == 0 {
			return;
		}
		self.buf.drain(0..self.cursor);
		self.base_offset += self.cursor as u64;
		self.cursor = 0;
	}

	/// Ensures at least `n` bytes are available past the cursor, growing the
	/// buffer by reading from the source as needed. Returns `false` if clean EOF
	/// was hit before `n` bytes could be made available (and some bytes short of
	/// `n` may still have been buffered); returns an error if the source errored
	/// or the unit being read is implausibly large.
	pub fn ensure(&mut self, n: usize) -> Result<bool> {
		if n > MAX_ATOMIC_UNIT {
			return Err(Error::malformed(
				"stream",
				format!("refusing to buffer a {n}-byte atomic unit"),
			));
		}

		while self.buf.len() - self.cursor < n {
			if self.eof {
				return Ok(false);
			}

			let want = n - (self.buf.len() - self.cursor);
			let start = self.buf.len();
			self.buf.resize(start + want.max(4096), 0);
			let read = self.source.read(&mut self.buf[start..])?;
			self.buf.truncate(start + read);
			if read == 0 {
				self.eof = true;
			}
		}

		Ok(true)
	}

	/// Returns a slice of exactly `n` buffered bytes past the cursor without
	/// advancing it. The slice is only valid until the next mutating call on
	/// this reservoir (it may be relocated by [`compact`](Self::compact)).
	pub fn peek(&mut self, n: usize) -> Result<&[u8]> {
		if !self.ensure(n)? {
			eof!("expected {n} bytes, stream ended");
		}
		Ok(&self.buf[self.cursor..self.cursor + n])
	}

	/// Like [`peek`](Self::peek) but returns as many bytes as are left when
	/// fewer than `n` remain before EOF, instead of failing.
	pub fn peek_up_to(&mut self, n: usize) -> Result<&[u8]> {
		self.ensure(n)?;
		let have = (self.buf.len() - self.cursor).min(n);
		Ok(&self.buf[self.cursor..self.cursor + have])
	}

	/// Consumes and returns exactly `n` bytes past the cursor.
	pub fn take(&mut self, n: usize) -> Result<Vec<u8>> {
		let bytes = self.peek(n)?.to_vec();
		self.cursor += n;
		Ok(bytes)
	}

	/// Skips forward by `n` bytes, reading and discarding from the source as
	/// needed. Never seeks backward; this is the only way to move the cursor
	/// past data a demuxer doesn't need.
	pub fn advance(&mut self, mut n: u64) -> Result<()> {
		while n > 0 {
			let chunk = n.min(64 * 1024) as usize;
			if !self.ensure(chunk)? {
				eof!("tried to skip past end of stream");
			}
			self.cursor += chunk;
			n -= chunk as u64;
			self.compact();
		}
		Ok(())
	}

	/// Skips to EOF, discarding everything. Used for trailing-garbage regions
	/// a demuxer doesn't need to inspect.
	pub fn skip_to_eof(&mut self) -> Result<()> {
		loop {
			self.cursor = self.buf.len();
			self.compact();
			if !self.ensure(4096)? {
				return Ok(());
			}
		}
	}

	/// `true` once the source has reported clean EOF and every buffered byte has
	/// been consumed.
	pub fn at_eof(&mut self) -> Result<bool> {
		Ok(!self.ensure(1)?)
	}

	pub fn read_u8(&mut self) -> Result<u8> {
		Ok(self.take(1)?[0])
	}

	pub fn read_u16be(&mut self) -> Result<u16> {
		Ok(BigEndian::read_u16(&self.take(2)?))
	}

	pub fn read_u16le(&mut self) -> Result<u16> {
		Ok(LittleEndian::read_u16(&self.take(2)?))
	}

	pub fn read_u24be(&mut self) -> Result<u32> {
		let b = self.take(3)?;
		Ok(u32::from(b[0]) << 16 | u32::from(b[1]) << 8 | u32::from(b[2]))
	}

	pub fn read_u32be(&mut self) -> Result<u32> {
		Ok(BigEndian::read_u32(&self.take(4)?))
	}

	pub fn read_u32le(&mut self) -> Result<u32> {
		Ok(LittleEndian::read_u32(&self.take(4)?))
	}

	pub fn read_u64be(&mut self) -> Result<u64> {
		Ok(BigEndian::read_u64(&self.take(8)?))
	}

	pub fn read_u64le(&mut self) -> Result<u64> {
		Ok(LittleEndian::read_u64(&self.take(8)?))
	}

	pub fn read_i16be(&mut self) -> Result<i16> {
		Ok(BigEndian::read_i16(&self.take(2)?))
	}

	pub fn read_fourcc(&mut self) -> Result<[u8; 4]> {
		let b = self.take(4)?;
		Ok([b[0], b[1], b[2], b[3]])
	}

	/// Reads a 16-byte little-endian GUID, as used throughout ASF.
	pub fn read_guid(&mut self) -> Result<[u8; 16]> {
		let b = self.take(16)?;
		let mut guid = [0u8; 16];
		guid.copy_from_slice(&b);
		Ok(guid)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn ensure_and_take_advance_cursor() {
		let mut r = Reservoir::new(&b"hello world"[..]);
		assert!(r.ensure(5).unwrap());
		assert_eq!(r.take(5).unwrap(), b"hello");
		assert_eq!(r.position(), 5);
	}

	#[test]
	fn ensure_false_at_clean_eof() {
		let mut r = Reservoir::new(&b"abc"[..]);
		assert!(!r.ensure(10).unwrap());
	}

	#[test]
	fn advance_never_moves_backward_and_tracks_position() {
		let data = vec![0u8; 200_000];
        let mut r = Reservoir::new(&data[..]);
		let mut last = r.position();
		r.advance(70_000).unwrap();
		assert!(r.position() > last);
		last = r.position();
		r.advance(70_000).unwrap();
		assert!(r.position() > last);
	}

	#[test]
	fn compact_preserves_logical_offsets() {
		let mut r = Reservoir::new(&b"0123456789"[..]);
		r.take(4).unwrap();
		r.compact();
		assert_eq!(r.position(), 4);
		assert_eq!(r.take(3).unwrap(), b"456");
	}

	#[test]
	fn big_endian_readers() {
		let mut r = Reservoir::new(&[0x00, 0x00, 0x01, 0x00][..]);
		assert_eq!(r.read_u32be().unwrap(), 256);
	}

	#[test]
	fn rejects_implausibly_large_unit() {
		let mut r = Reservoir::new(&[0u8; 8][..]);
		assert!(r.ensure(MAX_ATOMIC_UNIT + 1).is_err());
	}
}
