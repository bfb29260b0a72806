//! Container detection and dispatch: inspect the first bytes of the
//! input and hand off to the matching demuxer's `probe`.

use std::io::Read;

use crate::demux;
use crate::error::{Error, Result};
use crate::model::MediaInfo;
use crate::reservoir::Reservoir;

const ASF_HEADER_GUID: [u8; 16] = [
	0x30, 0x26, 0xB2, 0x75, 0x8E, 0x66, 0xCF, 0x11, 0xA6, 0xD9, 0x00, 0xAA, 0x00, 0x62, 0xCE, 0x6C,
];

fn is_ebml(probe: &[u8]) -> bool {
	probe.len() >= 4 && probe[0..4] == [0x1A, 0x45, 0xDF, 0xA3]
}

fn is_riff(probe: &[u8], kind: &[u8; 4]) -> bool {
	probe.len() >= 12 && &probe[0..4] == b"RIFF" && &probe[8..12] == kind
}

fn is_isobmff(probe: &[u8]) -> bool {
	probe.len() >= 8 && &probe[4..8] == b"ftyp"
}

fn is_mpegts(probe: &[u8]) -> bool {
	for offset in [0usize, 188, 376] {
		match probe.get(offset) {
			Some(0x47) => continue,
			_ => return false,
		}
	}
	probe.len() > 376
}

fn is_adts(probe: &[u8]) -> bool {
	probe.len() >= 2 && probe[0] == 0xFF && (probe[1] & 0xF6) == 0xF0
}

fn is_mp3_sync(probe: &[u8]) -> bool {
	probe.len() >= 2 && probe[0] == 0xFF && (probe[1] & 0xE0) == 0xE0
}

/// Detects the container family from the input's leading bytes, following
/// the fixed precedence order: RIFF/AVI, RIFF/WAV, ISOBMFF, EBML/Matroska,
/// ASF, MPEG-TS, OGG, ADTS, raw MP3. The first match wins even when a later
/// rule would also match (e.g. an MP3 file can never also start with `OggS`,
/// but the order still matters for formats with looser magic, like MPEG-TS's
/// sync-byte check against a short ADTS-looking buffer).
fn detect<R: Read>(r: &mut Reservoir<R>) -> Result<&'static str> {
	// MPEG-TS needs up to 377 bytes to confirm; everything else fits in 12.
	let probe = r.peek_up_to(512)?;

	if is_riff(probe, b"AVI ") {
		return Ok("avi");
	}
	if is_riff(probe, b"WAVE") {
		return Ok("wav");
	}
	if is_isobmff(probe) {
		return Ok("mp4");
	}
	if is_ebml(probe) {
		return Ok("mkv");
	}
	if probe.len() >= 16 && probe[0..16] == ASF_HEADER_GUID {
		return Ok("asf");
	}
	if is_mpegts(probe) {
		return Ok("mpegts");
	}
	if probe.len() >= 4 && &probe[0..4] == b"OggS" {
		return Ok("ogg");
	}
	if is_adts(probe) {
		return Ok("aac");
	}
	if is_mp3_sync(probe) {
		return Ok("mp3");
	}

	Err(Error::UnsupportedFormat(
		"no recognized container magic at the start of the input".to_string(),
	))
}

/// Detects the container and returns a structured description of its
/// elementary streams. Consumes as little of `input` as the chosen demuxer
/// needs to answer the question — `extract_audio` re-probes from a fresh
/// reader over the same source rather than resuming this one, since the
/// reservoir's forward-only cursor can't be rewound.
pub fn probe<R: Read>(input: R) -> Result<MediaInfo> {
	let mut reservoir = Reservoir::new(input);
	match detect(&mut reservoir)? {
		"avi" => demux::avi::probe(&mut reservoir),
		"wav" => demux::wav_raw::probe(&mut reservoir),
		"mp4" => demux::mp4::probe(&mut reservoir),
		"mkv" => demux::mkv::probe(&mut reservoir),
		"asf" => demux::asf::probe(&mut reservoir),
		"mpegts" => demux::mpegts::probe(&mut reservoir),
		"ogg" => demux::ogg_raw::probe(&mut reservoir),
		"aac" => demux::aac_raw::probe(&mut reservoir),
		"mp3" => demux::mp3_raw::probe(&mut reservoir),
		other => unreachable!("detect() returned unhandled tag {other}"),
	}
}

/// The container tag `probe` would assign, without doing any demuxer-specific
/// parsing. Used by `extract_audio` to pick a demuxer/muxer pair without
/// probing twice.
pub(crate) fn detect_container<R: Read>(r: &mut Reservoir<R>) -> Result<&'static str> {
	detect(r)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn detects_riff_wave() {
		let mut data = b"RIFF".to_vec();
		data.extend_from_slice(&0u32.to_le_bytes());
		data.extend_from_slice(b"WAVE");
		let mut r = Reservoir::new(&data[..]);
		assert_eq!(detect(&mut r).unwrap(), "wav");
	}

	#[test]
	fn detects_isobmff_ftyp() {
		let mut data = vec![0, 0, 0, 20];
		data.extend_from_slice(b"ftypisom");
		data.extend_from_slice(&[0u8; 8]);
		let mut r = Reservoir::new(&data[..]);
		assert_eq!(detect(&mut r).unwrap(), "mp4");
	}

	#[test]
	fn detects_ebml_matroska() {
		let data = [0x1A, 0x45, 0xDF, 0xA3, 0x9F, 0, 0, 0];
		let mut r = Reservoir::new(&data[..]);
		assert_eq!(detect(&mut r).unwrap(), "mkv");
	}

	#[test]
	fn detects_ogg_capture_pattern() {
		let data = b"OggS\x00\x02".to_vec();
		let mut r = Reservoir::new(&data[..]);
		assert_eq!(detect(&mut r).unwrap(), "ogg");
	}

	#[test]
	fn detects_adts_syncword() {
		let data = [0xFF, 0xF1, 0x50, 0x80, 0x00, 0x1F, 0xFC];
		let mut r = Reservoir::new(&data[..]);
		assert_eq!(detect(&mut r).unwrap(), "aac");
	}

	#[test]
	fn rejects_unrecognized_input() {
		let data = b"not a media file at all".to_vec();
		let mut r = Reservoir::new(&data[..]);
		assert!(detect(&mut r).is_err());
	}
}
