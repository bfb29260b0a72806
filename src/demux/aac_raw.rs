//! Raw ADTS (Audio Data Transport Stream) demuxer: no container at all, just
//! back-to-back AAC frames each carrying its own 7-byte sync header.

use std::io::Read;

use crate::codec::aac::sample_rate_for_index;
use crate::codec::AudioObjectType;
use crate::error::Result;
use crate::macros::malformed;
use crate::model::{AudioStreamInfo, ContainerKind, MediaInfo, Sample};
use crate::reservoir::Reservoir;

use super::{select_audio_stream, ExtractOptions, SampleEmit};

/// One parsed ADTS frame header.
struct AdtsHeader {
	/// `AudioObjectType - 1`, as carried in the 2-bit `profile` field.
	profile_bits: u8,
	sampling_frequency_index: u8,
	channel_configuration: u8,
	/// Total frame length including the 7-byte header.
	frame_length: u16,
}

/// Parses a 7-byte ADTS fixed+variable header out of `b`. Caller guarantees
/// `b.len() >= 7` and the 12-bit syncword has already been checked.
fn parse_adts_header(b: &[u8]) -> AdtsHeader {
	let profile_bits = (b[2] >> 6) & 0b11;
	let sampling_frequency_index = (b[2] >> 2) & 0b1111;
	let channel_configuration = ((b[2] & 0b1) << 2) | (b[3] >> 6);
	let frame_length = (u16::from(b[3] & 0b11) << 11) | (u16::from(b[4]) << 3) | (u16::from(b[5]) >> 5);
	AdtsHeader {
		profile_bits,
		sampling_frequency_index,
		channel_configuration,
		frame_length,
	}
}

fn is_syncword(b: &[u8]) -> bool {
	b.len() >= 2 && b[0] == 0xFF && (b[1] & 0xF6) == 0xF0
}

fn audio_info(header: &AdtsHeader) -> AudioStreamInfo {
	let aot = AudioObjectType::from_u8(header.profile_bits + 1);
	AudioStreamInfo {
		id: 0,
		codec: "aac".to_string(),
		codec_detail: Some(format!("mp4a.40.{}", header.profile_bits + 1)),
		channel_count: Some(u16::from(header.channel_configuration)),
		sample_rate: sample_rate_for_index(header.sampling_frequency_index),
		bits_per_sample: None,
		bitrate: None,
		profile: aot.map(AudioObjectType::profile_name).map(str::to_string),
		duration: None,
		wave_format_extra: None,
	}
}

/// Locates and parses the first ADTS frame, failing if the stream has no
/// valid syncword within the first few bytes.
fn first_header<R: Read>(r: &mut Reservoir<R>) -> Result<AdtsHeader> {
	let head = r.peek(7)?;
	if !is_syncword(head) {
		malformed!("aac", "missing ADTS syncword");
	}
	Ok(parse_adts_header(head))
}

pub fn probe<R: Read>(r: &mut Reservoir<R>) -> Result<MediaInfo> {
	let header = first_header(r)?;
	let mut info = MediaInfo::new(ContainerKind::Aac);
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

	// A raw ADTS stream carries no declared frame count or duration, so
	// intermediate progress can't be estimated; only start and completion
	// are reported.
	opts.report_progress(0);
	loop {
		if r.at_eof()? {
			break;
		}
		let head = r.peek(7)?;
		if !is_syncword(head) {
			malformed!("aac", "lost ADTS sync mid-stream");
		}
		let h = parse_adts_header(head);
		if usize::from(h.frame_length) < 7 {
			malformed!("aac", "ADTS frame length shorter than header");
		}
		let frame = r.take(usize::from(h.frame_length))?;
		let raw_block = frame[7..].to_vec();
		emit.emit(Sample::new(selected.id, raw_block, 0.0))?;
	}

	opts.report_progress(100);
	Ok(selected)
}

#[cfg(test)]
mod tests {
	use super::*;

	/// Builds one ADTS frame: profile LC (AudioObjectType 2), sampling-frequency-index
	/// 4 (44100 Hz), 2-channel stereo.
	fn adts_frame(payload: &[u8]) -> Vec<u8> {
		let frame_len = 7 + payload.len();
		let profile_bits: u8 = 1; // AOT 2 (LC) - 1
		let sampling_frequency_index: u8 = 4; // 44100
		let channel_configuration: u8 = 2;
		let mut out = vec![0xFFu8, 0xF1, 0, 0, 0, 0, 0xFC];
		out[2] = (profile_bits << 6) | (sampling_frequency_index << 2) | (channel_configuration >> 2);
		out[3] = ((channel_configuration & 0b11) << 6) | ((frame_len >> 11) as u8 & 0b11);
		out[4] = ((frame_len >> 3) & 0xFF) as u8;
		out[5] = (((frame_len & 0b111) << 5) as u8) | 0b1_1111;
		out.extend_from_slice(payload);
		out
	}

	#[test]
	fn probes_aac_lc_stream() {
		let data = adts_frame(&[0u8; 10]);
		let mut r = Reservoir::new(&data[..]);
		let info = probe(&mut r).unwrap();
		assert_eq!(info.audio_streams[0].codec, "aac");
		assert_eq!(info.audio_streams[0].sample_rate, Some(44100));
		assert_eq!(info.audio_streams[0].channel_count, Some(2));
	}

	#[test]
	fn extracts_raw_blocks() {
		let mut data = adts_frame(&[1, 2, 3]);
		data.extend(adts_frame(&[4, 5, 6, 7]));
		let mut r = Reservoir::new(&data[..]);
		let mut opts = ExtractOptions::new();
		let mut frames = Vec::new();
		extract(&mut r, &mut opts, &mut |s: Sample| {
			frames.push(s.data);
			Ok(())
		})
		.unwrap();
		assert_eq!(frames, vec![vec![1, 2, 3], vec![4, 5, 6, 7]]);
	}
}
