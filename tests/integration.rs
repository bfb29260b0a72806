//! End-to-end probe/extract scenarios against the public API only.

use mediatap::{extract_audio, probe, ExtractOptions};

fn riff_chunk(id: &[u8; 4], data: &[u8]) -> Vec<u8> {
	let mut out = id.to_vec();
	out.extend((data.len() as u32).to_le_bytes());
	out.extend_from_slice(data);
	if data.len() % 2 == 1 {
		out.push(0);
	}
	out
}

fn build_wav(channels: u16, sample_rate: u32, bits_per_sample: u16, pcm: &[u8]) -> Vec<u8> {
	let block_align = channels * bits_per_sample / 8;
	let byte_rate = sample_rate * u32::from(block_align);

	let mut fmt = Vec::new();
	fmt.extend(1u16.to_le_bytes()); // WAVE_FORMAT_PCM
	fmt.extend(channels.to_le_bytes());
	fmt.extend(sample_rate.to_le_bytes());
	fmt.extend(byte_rate.to_le_bytes());
	fmt.extend(block_align.to_le_bytes());
	fmt.extend(bits_per_sample.to_le_bytes());

	let mut body = Vec::new();
	body.extend_from_slice(b"WAVE");
	body.extend(riff_chunk(b"fmt ", &fmt));
	body.extend(riff_chunk(b"data", pcm));
	riff_chunk(b"RIFF", &body)
}

fn adts_frame(payload: &[u8]) -> Vec<u8> {
	// AOT 2 (LC), 44100 Hz, stereo.
	let profile_bits: u8 = 1;
	let sampling_frequency_index: u8 = 4;
	let channel_configuration: u8 = 2;
	let frame_len = 7 + payload.len();

	let mut out = vec![0xFFu8, 0xF1, 0, 0, 0, 0, 0xFC];
	out[2] = (profile_bits << 6) | (sampling_frequency_index << 2) | (channel_configuration >> 2);
	out[3] = ((channel_configuration & 0b11) << 6) | ((frame_len >> 11) as u8 & 0b11);
	out[4] = ((frame_len >> 3) & 0xFF) as u8;
	out[5] = (((frame_len & 0b111) << 5) as u8) | 0b1_1111;
	out.extend_from_slice(payload);
	out
}

fn mp3_frame(payload_len: usize) -> Vec<u8> {
	// MPEG1 Layer III, 128 kbps, 44100 Hz, stereo.
	let frame_len = 144 * 128_000 / 44100;
	let mut out = vec![0xFFu8, 0xFB, (9 << 4) | (0 << 2), 0xC0];
	out.resize(frame_len.max(4 + payload_len), 0);
	out
}

#[test]
fn probe_fails_on_unrecognized_input() {
	let data = b"this is not a media container".to_vec();
	let err = probe(&data[..]).unwrap_err();
	assert!(err.is_unsupported_format());
}

#[test]
fn wav_pcm_round_trips_through_extraction() {
	let pcm: Vec<u8> = (0..64u8).collect();
	let source = build_wav(2, 44100, 16, &pcm);

	let info = probe(&source[..]).unwrap();
	assert_eq!(info.container, "wav");
	assert_eq!(info.audio_streams.len(), 1);
	assert_eq!(info.audio_streams[0].codec, "pcm_s16le");
	assert_eq!(info.audio_streams[0].sample_rate, Some(44100));
	assert_eq!(info.audio_streams[0].channel_count, Some(2));
	assert_eq!(info.audio_streams[0].bits_per_sample, Some(16));

	let mut output = Vec::new();
	let extracted = extract_audio(&source[..], &mut output, ExtractOptions::default()).unwrap();
	assert_eq!(extracted.codec, "pcm_s16le");

	// The extraction output is itself a valid, probeable WAV with the same
	// stream description (universal invariant 2).
	let reprobed = probe(&output[..]).unwrap();
	assert_eq!(reprobed.container, "wav");
	assert_eq!(reprobed.audio_streams[0].codec, "pcm_s16le");
	assert_eq!(reprobed.audio_streams[0].channel_count, Some(2));
	assert_eq!(reprobed.audio_streams[0].sample_rate, Some(44100));
}

#[test]
fn aac_adts_extraction_preserves_frame_count_and_bytes() {
	let frame_a = adts_frame(&[1, 2, 3, 4, 5]);
	let frame_b = adts_frame(&[6, 7, 8]);
	let mut source = frame_a.clone();
	source.extend(frame_b.clone());

	let info = probe(&source[..]).unwrap();
	assert_eq!(info.container, "aac");
	assert_eq!(info.audio_streams[0].codec, "aac");
	assert_eq!(info.audio_streams[0].profile.as_deref(), Some("LC"));

	let mut output = Vec::new();
	extract_audio(&source[..], &mut output, ExtractOptions::default()).unwrap();

	// Re-parsing the extracted ADTS stream must yield the same two frames
	// with identical payload bytes (universal invariant 4).
	let mut frames = Vec::new();
	let mut cursor = &output[..];
	while !cursor.is_empty() {
		let header = &cursor[0..7];
		let frame_len = ((usize::from(header[3] & 0b11) << 11) | (usize::from(header[4]) << 3) | (usize::from(header[5]) >> 5)).max(7);
		frames.push(cursor[7..frame_len].to_vec());
		cursor = &cursor[frame_len..];
	}
	assert_eq!(frames, vec![vec![1, 2, 3, 4, 5], vec![6, 7, 8]]);
}

#[test]
fn mp3_extraction_is_byte_exact_passthrough() {
	let frame_one = mp3_frame(0);
	let frame_two = mp3_frame(0);
	let mut source = frame_one.clone();
	source.extend(frame_two.clone());

	let info = probe(&source[..]).unwrap();
	assert_eq!(info.audio_streams[0].codec, "mp3");
	assert_eq!(info.audio_streams[0].bitrate, Some(128_000));

	let mut output = Vec::new();
	extract_audio(&source[..], &mut output, ExtractOptions::default()).unwrap();
	assert_eq!(output, source);
}

#[test]
fn stream_index_out_of_range_fails_not_found() {
	let pcm = vec![0u8; 16];
	let source = build_wav(1, 22050, 8, &pcm);

	let opts = ExtractOptions {
		stream_index: 5,
		..Default::default()
	};
	let mut output = Vec::new();
	let err = extract_audio(&source[..], &mut output, opts).unwrap_err();
	assert!(!err.is_unsupported_format());
	assert!(format!("{err}").contains('5') || !format!("{err}").is_empty());
}

#[test]
fn truncated_container_fails_with_documented_error() {
	// Valid ftyp box but nothing after it: no moov, no mdat.
	let mut data = vec![0, 0, 0, 20];
	data.extend_from_slice(b"ftypisom");
	data.extend_from_slice(&[0u8; 8]);

	let err = probe(&data[..]).unwrap_err();
	// Either outcome is an accepted, documented failure per universal invariant 1.
	assert!(matches!(
		err,
		mediatap::Error::Malformed { .. } | mediatap::Error::EndOfStream(_)
	));
}
