//! Raw MPEG audio (MP3/MP2) demuxer: frames are self-delimiting, no container.

use std::io::Read;

use crate::error::Result;
use crate::macros::malformed;
use crate::model::{AudioStreamInfo, ContainerKind, MediaInfo, Sample};
use crate::reservoir::Reservoir;

use super::{select_audio_stream, ExtractOptions, SampleEmit};

const BITRATES_V1_L3: [u32; 16] = [
	0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 0,
];
const BITRATES_V2_L3: [u32; 16] = [0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160, 0];
const SAMPLE_RATES_V1: [u32; 3] = [44100, 48000, 32000];
const SAMPLE_RATES_V2: [u32; 3] = [22050, 24000, 16000];
const SAMPLE_RATES_V25: [u32; 3] = [11025, 12000, 8000];

struct Mp3Header {
	version_bits: u8,
	bitrate_kbps: u32,
	sample_rate: u32,
	channels: u16,
	frame_length: usize,
}

fn is_syncword(b: &[u8]) -> bool {
	b.len() >= 2 && b[0] == 0xFF && (b[1] & 0xE0) == 0xE0
}

/// Parses the 4-byte MPEG audio frame header. Caller guarantees a valid syncword.
fn parse_header(b: &[u8]) -> Result<Mp3Header> {
	let version_bits = (b[1] >> 3) & 0b11;
	let layer_bits = (b[1] >> 1) & 0b11;
	let bitrate_index = (b[2] >> 4) & 0b1111;
	let sample_rate_index = (b[2] >> 2) & 0b11;
	let padding = u32::from((b[2] >> 1) & 0b1);
	let channel_mode = (b[3] >> 6) & 0b11;

	if layer_bits != 0b01 {
		malformed!("mp3", "only Layer III frames are supported");
	}
	if sample_rate_index == 0b11 {
		malformed!("mp3", "reserved sampling rate index");
	}

	let sample_rate = match version_bits {
		0b11 => SAMPLE_RATES_V1[sample_rate_index as usize],
		0b10 => SAMPLE_RATES_V2[sample_rate_index as usize],
		0b00 => SAMPLE_RATES_V25[sample_rate_index as usize],
		_ => malformed!("mp3", "reserved MPEG version"),
	};

	let bitrate_kbps = if version_bits == 0b11 {
		BITRATES_V1_L3[bitrate_index as usize]
	} else {
		BITRATES_V2_L3[bitrate_index as usize]
	};
	if bitrate_kbps == 0 {
		malformed!("mp3", "free or reserved bitrate index");
	}

	let channels = if channel_mode == 0b11 { 1 } else { 2 };

	// Layer III frame length formula; version 1 uses 144, versions 2/2.5 use 72.
	let samples_per_frame_factor = if version_bits == 0b11 { 144 } else { 72 };
	let frame_length = (samples_per_frame_factor * bitrate_kbps * 1000 / sample_rate + padding) as usize;

	Ok(Mp3Header {
		version_bits,
		bitrate_kbps: bitrate_kbps * 1000,
		sample_rate,
		channels,
		frame_length,
	})
}

fn audio_info(header: &Mp3Header) -> AudioStreamInfo {
	AudioStreamInfo {
		id: 0,
		codec: "mp3".to_string(),
		codec_detail: Some(match header.version_bits {
			0b11 => "mpeg1-layer3".to_string(),
			0b10 => "mpeg2-layer3".to_string(),
			_ => "mpeg2.5-layer3".to_string(),
		}),
		channel_count: Some(header.channels),
		sample_rate: Some(header.sample_rate),
		bits_per_sample: None,
		bitrate: Some(header.bitrate_kbps),
		profile: None,
		duration: None,
		wave_format_extra: None,
	}
}

fn first_header<R: Read>(r: &mut Reservoir<R>) -> Result<Mp3Header> {
	let head = r.peek(4)?;
	if !is_syncword(head) {
		malformed!("mp3", "missing MPEG audio frame sync");
	}
	parse_header(head)
}

pub fn probe<R: Read>(r: &mut Reservoir<R>) -> Result<MediaInfo> {
	let header = first_header(r)?;
	let mut info = MediaInfo::new(ContainerKind::Mp3);
	info.audio_streams.push(audio_info(&header));
	Ok(info)
}

pub fn extract<R: Read>(
	r: &mut Reservoir<R>,
	opts: &mut ExtractOptions<'_>,
	emit: &mut dyn SampleEmit,
) -> Result<AudioStreamInfo> {
	let header = first_header(r)?;
	let mut info = audio_info(&header);
	info.id = 0;
	let selected = select_audio_stream(std::slice::from_ref(&info), opts)?.clone();

	// A raw MPEG audio stream carries no declared frame count or duration, so
	// intermediate progress can't be estimated; only start and completion
	// are reported.
	opts.report_progress(0);
	loop {
		if r.at_eof()? {
			break;
		}
		let head = r.peek(4)?;
		if !is_syncword(head) {
			malformed!("mp3", "lost MPEG audio frame sync mid-stream");
		}
		let h = parse_header(head)?;
		if h.frame_length < 4 {
			malformed!("mp3", "frame length shorter than header");
		}
		let frame = r.take(h.frame_length)?;
		emit.emit(Sample::new(selected.id, frame, 0.0))?;
	}

	opts.report_progress(100);
	Ok(selected)
}

#[cfg(test)]
mod tests {
	use super::*;

	/// MPEG1 Layer III, 128 kbps, 44100 Hz, stereo, no padding.
	fn mp3_frame() -> Vec<u8> {
		let mut head = [0xFFu8, 0xFB, 0x90, 0xC0];
		head[1] = 0xFB; // version=11 (MPEG1), layer=01 (III), protection=1
		head[2] = (9 << 4) | (0 << 2); // bitrate index 9 = 128kbps, sample_rate index 0 = 44100
		head[3] = 0xC0; // stereo, no extras
		let frame_len = 144 * 128 * 1000 / 44100;
		let mut out = head.to_vec();
		out.resize(frame_len, 0);
		out
	}

	#[test]
	fn probes_mpeg1_layer3() {
		let data = mp3_frame();
		let mut r = Reservoir::new(&data[..]);
		let info = probe(&mut r).unwrap();
		assert_eq!(info.audio_streams[0].codec, "mp3");
		assert_eq!(info.audio_streams[0].sample_rate, Some(44100));
		assert_eq!(info.audio_streams[0].bitrate, Some(128000));
	}

	#[test]
	fn extracts_consecutive_frames() {
		let mut data = mp3_frame();
		data.extend(mp3_frame());
		let mut r = Reservoir::new(&data[..]);
		let mut opts = ExtractOptions::new();
		let mut count = 0;
		extract(&mut r, &mut opts, &mut |_s: Sample| {
			count += 1;
			Ok(())
		})
		.unwrap();
		assert_eq!(count, 2);
	}
}
