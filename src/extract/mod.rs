//! Audio extraction dispatcher: detect the source container, run its
//! demuxer, then shape the emitted samples into the output format the
//! selected codec calls for.
//!
//! The per-container `extract` functions in [`crate::demux`] only resolve and
//! return the selected [`AudioStreamInfo`] once their sample loop finishes —
//! none of them hand it back before the first sample is emitted. Reshaping a
//! sample (wrapping it in ADTS, an OGG page, ...) needs that stream info
//! up front, so this dispatcher buffers the raw samples during the demux
//! walk and performs the codec-specific write in a second pass once the walk
//! completes. This trades strict single-pass streaming for a dispatcher that
//! works cleanly against the existing per-demuxer API; see `DESIGN.md`.

use std::io::{Read, Write};

use crate::codec::AudioObjectType;
use crate::demux::{self, ExtractOptions, SampleEmit};
use crate::error::{Error, Result};
use crate::model::{AudioStreamInfo, Sample};
use crate::mux::{adts, asf as asf_mux, ogg as ogg_mux, wav as wav_mux};
use crate::reservoir::Reservoir;

/// Picks the `AudioObjectType` an AAC stream's profile name decodes to,
/// defaulting to LC — by far the most common AAC profile — when the source
/// didn't resolve one (raw ADTS re-extraction always does; MP4/Matroska only
/// when the `esds`/`CodecPrivate` decoder-specific info was present).
fn audio_object_type(info: &AudioStreamInfo) -> AudioObjectType {
	match info.profile.as_deref() {
		Some("Main") => AudioObjectType::Main,
		Some("SSR") => AudioObjectType::Ssr,
		Some("LTP") => AudioObjectType::Ltp,
		Some("SBR") => AudioObjectType::Sbr,
		other => {
			if other.is_some() {
				tracing::debug!(profile = other, "unrecognized AAC profile, defaulting to LC");
			}
			AudioObjectType::Lc
		},
	}
}

/// Stdlib-only pseudo-random seed for the OGG stream serial. The dependency
/// stack has no `rand`, and this only needs to be unlikely to collide within
/// one process, not cryptographically unpredictable.
fn pseudo_random_serial() -> u32 {
	use std::collections::hash_map::RandomState;
	use std::hash::{BuildHasher, Hasher};
	RandomState::new().build_hasher().finish() as u32
}

fn write_adts(info: &AudioStreamInfo, samples: &[Sample], sink: &mut dyn Write) -> Result<()> {
	let aot = audio_object_type(info);
	let sample_rate = info.sample_rate.unwrap_or(44100);
	let channel_configuration = info.channel_count.unwrap_or(2).min(7) as u8;
	for sample in samples {
		let frame = adts::frame(aot, sample_rate, channel_configuration, &sample.data)?;
		sink.write_all(&frame)?;
	}
	Ok(())
}

fn write_raw_frames(samples: &[Sample], sink: &mut dyn Write) -> Result<()> {
	for sample in samples {
		sink.write_all(&sample.data)?;
	}
	Ok(())
}

fn write_ogg(info: &AudioStreamInfo, samples: Vec<Sample>, sink: &mut dyn Write) -> Result<()> {
	let channel_count = info.channel_count.unwrap_or(2);
	let sample_rate = info.sample_rate.unwrap_or(48000);
	let serial = pseudo_random_serial();

	if info.codec == "opus" {
		return ogg_mux::write_opus_stream(serial, None, channel_count, samples.into_iter().map(|s| s.data), sink);
	}

	let mut muxer = ogg_mux::OggMuxer::new(serial, 1024);
	let [id_header, comment_header] = ogg_mux::synthesize_minimal_vorbis_headers(channel_count, sample_rate);
	sink.write_all(&muxer.write_bos_page(&id_header))?;
	sink.write_all(&muxer.write_header_page(&comment_header))?;

	let total = samples.len();
	for (i, sample) in samples.into_iter().enumerate() {
		let page = if i + 1 == total {
			muxer.write_eos_page(&sample.data)
		} else {
			muxer.write_data_page(&sample.data)
		};
		sink.write_all(&page)?;
	}
	Ok(())
}

fn write_wav(info: &AudioStreamInfo, samples: Vec<Sample>, sink: &mut dyn Write) -> Result<()> {
	let format_tag: u16 = match info.codec.as_str() {
		"pcm_s16le" | "pcm_u8" => 1,
		"adpcm_ms" => 2,
		"adpcm_ima" => 0x11,
		_ => 1,
	};
	let channel_count = info.channel_count.unwrap_or(2);
	let bits_per_sample = info.bits_per_sample.unwrap_or(16);

	// ADPCM's real block_align (and, for MS ADPCM, its predictor coefficient
	// table) was carried from the source container's format block; PCM has no
	// such block framing and is always derived from channels/bits-per-sample.
	let (block_align, adpcm) = match &info.wave_format_extra {
		Some(extra) => (
			extra.block_align,
			Some(wav_mux::AdpcmExtra {
				samples_per_block: extra.samples_per_block,
				coefficients: extra.coefficients.clone(),
			}),
		),
		None => ((u32::from(channel_count) * u32::from(bits_per_sample) / 8).max(1) as u16, None),
	};

	let mut writer = wav_mux::WavWriter::new(info, format_tag, block_align, adpcm);
	for sample in &samples {
		writer.push(&sample.data);
	}
	writer.finish(sink)
}

/// Shapes buffered samples by routing on the selected stream's
/// codec tag.
fn shape_and_write(info: &AudioStreamInfo, samples: Vec<Sample>, sink: &mut dyn Write) -> Result<()> {
	match info.codec.as_str() {
		"aac" => write_adts(info, &samples, sink),
		"mp3" | "mp2" => write_raw_frames(&samples, sink),
		"opus" | "vorbis" => write_ogg(info, samples, sink),
		codec if codec.starts_with("pcm_") || codec.starts_with("adpcm_") => write_wav(info, samples, sink),
		other => Err(Error::UnsupportedCodec(format!("no output path for codec \"{other}\""))),
	}
}

type DemuxExtractFn<R> = fn(&mut Reservoir<R>, &mut ExtractOptions<'_>, &mut dyn SampleEmit) -> Result<AudioStreamInfo>;

fn extract_fn_for<R: Read>(container: &str) -> Result<DemuxExtractFn<R>> {
	Ok(match container {
		"avi" => demux::avi::extract,
		"wav" => demux::wav_raw::extract,
		"mp4" => demux::mp4::extract,
		"mkv" => demux::mkv::extract,
		"mpegts" => demux::mpegts::extract,
		"ogg" => demux::ogg_raw::extract,
		"aac" => demux::aac_raw::extract,
		"mp3" => demux::mp3_raw::extract,
		other => return Err(Error::UnsupportedFormat(format!("no extraction path for container \"{other}\""))),
	})
}

/// Buffers and reshapes a non-ASF source: every container besides ASF emits
/// samples whose bytes, once wrapped or concatenated per codec, are the
/// entire output — no container-level metadata besides the selected stream's
/// [`AudioStreamInfo`] is needed downstream.
fn extract_generic<R: Read>(r: &mut Reservoir<R>, container: &str, opts: &mut ExtractOptions<'_>, sink: &mut dyn Write) -> Result<AudioStreamInfo> {
	let extract = extract_fn_for::<R>(container)?;
	let mut samples = Vec::new();
	let info = extract(r, opts, &mut |s: Sample| {
		samples.push(s);
		Ok(())
	})?;
	shape_and_write(&info, samples, sink)?;
	Ok(info)
}

fn format_tag_for_codec(codec: &str) -> u16 {
	match codec {
		"pcm_s16le" | "pcm_u8" => 0x0001,
		"adpcm_ms" => 0x0002,
		"adpcm_ima" => 0x0011,
		"mp2" => 0x0050,
		"mp3" => 0x0055,
		"aac" => 0x00FF,
		"wmav2" => 0x0161,
		"wmapro" => 0x0162,
		"ac3" => 0x2000,
		other => {
			let resolved = other.strip_prefix("0x").and_then(|hex| u16::from_str_radix(hex, 16).ok());
			if resolved.is_none() {
				tracing::debug!(codec = other, "no known WAVEFORMATEX tag, defaulting to WMA2 (0x0161)");
			}
			resolved.unwrap_or(0x0161)
		},
	}
}

/// ASF needs its own path: the writer repackages the source's raw payload
/// records (media-object number, offset, replicated data) rather than
/// reshaping decoded samples, and needs File Properties / per-stream detail
/// that the generic `extract` functions don't return.
fn extract_asf<R: Read>(r: &mut Reservoir<R>, opts: &mut ExtractOptions<'_>, sink: &mut dyn Write) -> Result<AudioStreamInfo> {
	let mut samples = Vec::new();
	let (info, file_properties, detail) = demux::asf::extract_with_header(r, opts, &mut |s: Sample| {
		samples.push(s);
		Ok(())
	})?;

	let avg_bytes_per_sec = info.bitrate.map(|b| b / 8).unwrap_or(16_000);
	let block_align = u16::try_from(avg_bytes_per_sec).unwrap_or(u16::MAX).max(1);

	let params = asf_mux::AsfStreamParams {
		stream_number: info.id as u8,
		codec_private: detail.codec_private,
		extended_stream_properties: detail.extended_stream_properties,
		channels: info.channel_count.unwrap_or(2),
		sample_rate: info.sample_rate.unwrap_or(44100),
		bits_per_sample: info.bits_per_sample.unwrap_or(16),
		block_align,
		avg_bytes_per_sec,
		format_tag: format_tag_for_codec(&info.codec),
	};

	let mut writer = asf_mux::AsfWriter::new(params, file_properties);
	for sample in samples {
		writer.push(sample);
	}
	writer.finish(sink)?;
	Ok(info)
}

/// Extracts the selected audio stream from `input` and writes it to `sink` in
/// the output format its codec calls for. Returns the stream description
/// that was extracted.
pub fn extract_audio<R: Read>(input: R, sink: &mut dyn Write, mut opts: ExtractOptions<'_>) -> Result<AudioStreamInfo> {
	let mut r = Reservoir::new(input);
	let container = crate::probe::detect_container(&mut r)?;

	if container == "asf" {
		return extract_asf(&mut r, &mut opts, sink);
	}

	extract_generic(&mut r, container, &mut opts, sink)
}
