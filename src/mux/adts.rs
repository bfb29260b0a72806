//! ADTS framer: wraps each raw AAC access unit (an ISOBMFF `mdat` sample or a
//! Matroska `SimpleBlock` frame) in a 7-byte ADTS header so the concatenation
//! is a standalone, self-delimited AAC bitstream.

use crate::codec::aac::sampling_frequency_index;
use crate::codec::AudioObjectType;
use crate::error::{Error, Result};

/// Syncword plus the fixed bits this crate always emits: MPEG-4 (ID bit 0),
/// layer 00, protection_absent 1.
const FIXED_HEADER_PREFIX: u16 = 0xFFF1;

/// Builds the 7-byte ADTS header for one `raw_block` of `raw_block_len` bytes.
/// `audio_object_type` is clamped to 1-4; anything else (SBR/PS and
/// beyond) has no 2-bit ADTS profile field and is rejected.
pub fn header(
	audio_object_type: AudioObjectType,
	sample_rate: u32,
	channel_configuration: u8,
	raw_block_len: usize,
) -> Result<[u8; 7]> {
	let profile_bits = audio_object_type
		.adts_profile_bits()
		.ok_or_else(|| Error::UnsupportedCodec(format!("AudioObjectType {audio_object_type:?} has no ADTS profile encoding")))?;
	let sfi = sampling_frequency_index(sample_rate).ok_or(Error::UnsupportedSampleRate(sample_rate))?;

	let frame_length = 7 + raw_block_len;
	if frame_length > 0x1FFF {
		return Err(Error::malformed("aac", format!("ADTS frame length {frame_length} exceeds 13 bits")));
	}

	let mut out = [0u8; 7];
	out[0] = (FIXED_HEADER_PREFIX >> 8) as u8;
	out[1] = (FIXED_HEADER_PREFIX & 0xFF) as u8;
	out[2] = (profile_bits << 6) | (sfi << 2) | ((channel_configuration >> 2) & 0b1);
	out[3] = ((channel_configuration & 0b11) << 6) | ((frame_length >> 11) as u8 & 0b11);
	out[4] = ((frame_length >> 3) & 0xFF) as u8;
	out[5] = (((frame_length & 0b111) << 5) as u8) | 0b1_1111; // buffer fullness 0x7FF
	out[6] = 0b1111_1100; // buffer fullness low bits + number_of_raw_data_blocks_in_frame - 1 = 0
	Ok(out)
}

/// Wraps one raw AAC access unit in its ADTS header, returning the complete frame.
pub fn frame(
	audio_object_type: AudioObjectType,
	sample_rate: u32,
	channel_configuration: u8,
	raw_block: &[u8],
) -> Result<Vec<u8>> {
	let h = header(audio_object_type, sample_rate, channel_configuration, raw_block.len())?;
	let mut out = Vec::with_capacity(7 + raw_block.len());
	out.extend_from_slice(&h);
	out.extend_from_slice(raw_block);
	Ok(out)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn builds_header_with_correct_syncword() {
		let h = header(AudioObjectType::Lc, 44100, 2, 100).unwrap();
		assert_eq!(h[0], 0xFF);
		assert_eq!(h[1] & 0xF0, 0xF0);
	}

	#[test]
	fn frame_length_round_trips_through_header() {
		let raw = vec![0u8; 50];
		let f = frame(AudioObjectType::Lc, 48000, 2, &raw).unwrap();
		assert_eq!(f.len(), 57);
		let frame_length = ((u16::from(f[3] & 0b11) << 11) | (u16::from(f[4]) << 3) | (u16::from(f[5]) >> 5)) as usize;
		assert_eq!(frame_length, 57);
	}

	#[test]
	fn rejects_rate_outside_adts_table() {
		assert!(header(AudioObjectType::Lc, 44000, 2, 10).is_err());
	}

	#[test]
	fn rejects_object_type_without_adts_profile_bits() {
		assert!(header(AudioObjectType::Sbr, 44100, 2, 10).is_err());
	}
}
