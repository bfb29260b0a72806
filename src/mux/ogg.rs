//! OGG page muxer for Opus/Vorbis output, and the CRC-32 variant OGG actually
//! uses (polynomial `0x04C11DB7`, MSB-first, not reflected — distinct from
//! the far more common reflected CRC-32 used by zip/png/ethernet).

use crate::error::Result;

const CRC_POLY: u32 = 0x04C1_1DB7;

/// Computes the OGG page CRC-32 (MSB-first, polynomial `0x04C11DB7`, not
/// reflected — unrelated to the zip/png/ethernet CRC-32 of the same name)
/// over `data`, which must have its CRC field already zeroed.
pub fn crc32(data: &[u8]) -> u32 {
	let mut crc = 0u32;
	for &byte in data {
		crc ^= u32::from(byte) << 24;
		for _ in 0..8 {
			crc = if crc & 0x8000_0000 != 0 { (crc << 1) ^ CRC_POLY } else { crc << 1 };
		}
	}
	crc
}

pub const HEADER_TYPE_CONTINUED: u8 = 0x01;
pub const HEADER_TYPE_BOS: u8 = 0x02;
pub const HEADER_TYPE_EOS: u8 = 0x04;

/// Segments `payload` into OGG lacing values: `ceil(len/255)` full 255-byte
/// segments followed by the remainder, with an explicit trailing zero segment
/// when `len` is an exact multiple of 255.
pub fn lacing_segments(len: usize) -> Vec<u8> {
	let mut segments = Vec::new();
	let mut remaining = len;
	while remaining >= 255 {
		segments.push(255);
		remaining -= 255;
	}
	segments.push(remaining as u8);
	segments
}

/// Builds one complete OGG page (header + segment table + payload) with a
/// correctly computed CRC.
pub fn build_page(header_type: u8, granule_position: u64, serial: u32, sequence: u32, payload: &[u8]) -> Vec<u8> {
	let segments = lacing_segments(payload.len());

	let mut page = Vec::with_capacity(27 + segments.len() + payload.len());
	page.extend_from_slice(b"OggS");
	page.push(0); // version
	page.push(header_type);
	page.extend_from_slice(&granule_position.to_le_bytes());
	page.extend_from_slice(&serial.to_le_bytes());
	page.extend_from_slice(&sequence.to_le_bytes());
	let crc_offset = page.len();
	page.extend_from_slice(&0u32.to_le_bytes());
	page.push(segments.len() as u8);
	page.extend_from_slice(&segments);
	page.extend_from_slice(payload);

	let crc = crc32(&page);
	page[crc_offset..crc_offset + 4].copy_from_slice(&crc.to_le_bytes());
	page
}

/// Synthesizes a minimal 19-byte `OpusHead` packet when the source container
/// didn't carry a Matroska `CodecPrivate` blob to pass through verbatim.
pub fn synthesize_opus_head(channel_count: u16) -> Vec<u8> {
	let mut head = Vec::with_capacity(19);
	head.extend_from_slice(b"OpusHead");
	head.push(1); // version
	head.push(channel_count.min(255) as u8);
	head.extend_from_slice(&312u16.to_le_bytes()); // pre-skip
	head.extend_from_slice(&48000u32.to_le_bytes()); // input sample rate
	head.extend_from_slice(&0i16.to_le_bytes()); // output gain
	head.push(0); // channel mapping family (mono/stereo only)
	head
}

/// Builds the `OpusTags` comment-header packet with an empty comment list.
pub fn synthesize_opus_tags() -> Vec<u8> {
	let vendor = b"media-utils";
	let mut tags = Vec::new();
	tags.extend_from_slice(b"OpusTags");
	tags.extend_from_slice(&(vendor.len() as u32).to_le_bytes());
	tags.extend_from_slice(vendor);
	tags.extend_from_slice(&0u32.to_le_bytes()); // user comment list length
	tags
}

/// Splits a Matroska Vorbis `CodecPrivate` blob (identification + comment +
/// setup headers, Xiph-laced: a count-minus-one byte, then 255-encoded
/// lengths for all but the last header, then the headers back to back) into
/// its three constituent packets.
pub fn split_vorbis_codec_private(blob: &[u8]) -> Option<[Vec<u8>; 3]> {
	if blob.is_empty() {
		return None;
	}
	let header_count = usize::from(blob[0]) + 1;
	if header_count != 3 {
		return None;
	}

	let mut pos = 1;
	let mut lengths = Vec::new();
	for _ in 0..2 {
		let mut len = 0usize;
		loop {
			let b = *blob.get(pos)?;
			pos += 1;
			len += usize::from(b);
			if b != 255 {
				break;
			}
		}
		lengths.push(len);
	}

	let header_area_start = pos;
	let first_len = lengths[0];
	let second_len = lengths[1];
	let third_len = blob.len().checked_sub(header_area_start + first_len + second_len)?;

	let first = blob.get(header_area_start..header_area_start + first_len)?.to_vec();
	let second_start = header_area_start + first_len;
	let second = blob.get(second_start..second_start + second_len)?.to_vec();
	let third_start = second_start + second_len;
	let third = blob.get(third_start..third_start + third_len)?.to_vec();

	Some([first, second, third])
}

/// Synthesizes a minimal Vorbis identification + comment header pair when no
/// `CodecPrivate` is available. Produces only two packets (no setup header),
/// which is enough to satisfy a passthrough consumer that never decodes.
pub fn synthesize_minimal_vorbis_headers(channel_count: u16, sample_rate: u32) -> [Vec<u8>; 2] {
	let mut id_header = Vec::new();
	id_header.push(1);
	id_header.extend_from_slice(b"vorbis");
	id_header.extend_from_slice(&0u32.to_le_bytes()); // vorbis_version
	id_header.push(channel_count.min(255) as u8);
	id_header.extend_from_slice(&sample_rate.to_le_bytes());
	id_header.extend_from_slice(&0i32.to_le_bytes()); // bitrate_maximum
	id_header.extend_from_slice(&0i32.to_le_bytes()); // bitrate_nominal
	id_header.extend_from_slice(&0i32.to_le_bytes()); // bitrate_minimum
	id_header.push(0xB8); // blocksize_0/1 nibbles, framing bit set below
	id_header.push(1); // framing bit

	let vendor = b"media-utils";
	let mut comment_header = Vec::new();
	comment_header.push(3);
	comment_header.extend_from_slice(b"vorbis");
	comment_header.extend_from_slice(&(vendor.len() as u32).to_le_bytes());
	comment_header.extend_from_slice(vendor);
	comment_header.extend_from_slice(&0u32.to_le_bytes()); // comment list length
	comment_header.push(1); // framing bit

	[id_header, comment_header]
}

/// Simple auto-incrementing page sequence number / granule accumulator for a
/// single-stream OGG muxer instance.
pub struct OggMuxer {
	serial: u32,
	sequence: u32,
	granule: u64,
	samples_per_frame: u64,
}

impl OggMuxer {
	/// `samples_per_frame` drives the granule-position approximation: 960 for
	/// Opus at 48 kHz, 1024 for Vorbis. True Opus granule requires decoding
	/// the TOC byte, which this crate doesn't do.
	pub fn new(serial: u32, samples_per_frame: u64) -> Self {
		OggMuxer {
			serial,
			sequence: 0,
			granule: 0,
			samples_per_frame,
		}
	}

	fn next_page(&mut self, header_type: u8, payload: &[u8]) -> Vec<u8> {
		let page = build_page(header_type, self.granule, self.serial, self.sequence, payload);
		self.sequence += 1;
		page
	}

	pub fn write_bos_page(&mut self, payload: &[u8]) -> Vec<u8> {
		self.next_page(HEADER_TYPE_BOS, payload)
	}

	pub fn write_header_page(&mut self, payload: &[u8]) -> Vec<u8> {
		self.next_page(0, payload)
	}

	pub fn write_data_page(&mut self, payload: &[u8]) -> Vec<u8> {
		self.granule += self.samples_per_frame;
		self.next_page(0, payload)
	}

	pub fn write_eos_page(&mut self, payload: &[u8]) -> Vec<u8> {
		self.granule += self.samples_per_frame;
		self.next_page(HEADER_TYPE_EOS, payload)
	}
}

/// Writes a complete Opus stream: BOS `OpusHead`, `OpusTags`, then one data
/// page per frame (EOS flag set on the last one), to `sink`.
pub fn write_opus_stream(
	serial: u32,
	opus_head: Option<&[u8]>,
	channel_count: u16,
	frames: impl ExactSizeIterator<Item = Vec<u8>>,
	sink: &mut dyn std::io::Write,
) -> Result<()> {
	let mut muxer = OggMuxer::new(serial, 960);
	let head = opus_head.map(<[u8]>::to_vec).unwrap_or_else(|| synthesize_opus_head(channel_count));
	sink.write_all(&muxer.write_bos_page(&head))?;
	sink.write_all(&muxer.write_header_page(&synthesize_opus_tags()))?;

	let total = frames.len();
	for (i, frame) in frames.enumerate() {
		let page = if i + 1 == total {
			muxer.write_eos_page(&frame)
		} else {
			muxer.write_data_page(&frame)
		};
		sink.write_all(&page)?;
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn crc_recomputation_matches_stored_value() {
		let page = build_page(HEADER_TYPE_BOS, 0, 1234, 0, b"hello world");
		let mut zeroed = page.clone();
		zeroed[22..26].copy_from_slice(&[0, 0, 0, 0]);
		let recomputed = crc32(&zeroed);
		let stored = u32::from_le_bytes(page[22..26].try_into().unwrap());
		assert_eq!(recomputed, stored);
	}

	#[test]
	fn lacing_adds_trailing_zero_on_exact_multiple() {
		assert_eq!(lacing_segments(255), vec![255, 0]);
		assert_eq!(lacing_segments(0), vec![0]);
		assert_eq!(lacing_segments(300), vec![255, 45]);
		assert_eq!(lacing_segments(510), vec![255, 255, 0]);
	}

	#[test]
	fn splits_xiph_laced_vorbis_headers() {
		let id = vec![1u8; 30];
		let comment = vec![2u8; 10];
		let setup = vec![3u8; 5];
		let mut blob = vec![2u8]; // header_count - 1
		blob.push(30);
		blob.push(10);
		blob.extend_from_slice(&id);
		blob.extend_from_slice(&comment);
		blob.extend_from_slice(&setup);

		let [a, b, c] = split_vorbis_codec_private(&blob).unwrap();
		assert_eq!(a, id);
		assert_eq!(b, comment);
		assert_eq!(c, setup);
	}

	#[test]
	fn synthesized_opus_head_is_19_bytes() {
		assert_eq!(synthesize_opus_head(2).len(), 19);
	}
}
