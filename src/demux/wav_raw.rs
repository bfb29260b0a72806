//! WAV/RIFF demuxer. A WAV file is a `RIFF....WAVE` chunk holding a `fmt `
//! chunk (WAVEFORMATEX) and a `data` chunk; extraction is a pure passthrough
//! of the `data` chunk's bytes, chunked back out in fixed-size blocks.

use std::io::Read;

use crate::codec::avi::format_tag_to_codec;
use crate::error::{Error, Result};
use crate::macros::malformed;
use crate::model::{AudioStreamInfo, ContainerKind, MediaInfo, Sample, WaveFormatExtra};
use crate::reservoir::Reservoir;

use super::{report_progress_fraction, select_audio_stream, ExtractOptions, SampleEmit};

const FCC_RIFF: [u8; 4] = *b"RIFF";
const FCC_WAVE: [u8; 4] = *b"WAVE";
const FCC_FMT: [u8; 4] = *b"fmt ";
const FCC_DATA: [u8; 4] = *b"data";

/// Samples are emitted in chunks this large rather than byte-by-byte; matches
/// the scaffolding's "atomic unit" guidance for streaming formats.
const SAMPLE_CHUNK_BYTES: usize = 4096;

struct WaveFormat {
	format_tag: u16,
	channels: u16,
	sample_rate: u32,
	avg_bytes_per_sec: u32,
	block_align: u16,
	bits_per_sample: u16,
	adpcm: Option<WaveFormatExtra>,
}

/// Parses the `cbSize` extension block following the common 16-byte
/// `WAVEFORMATEX` fields, for the two ADPCM format tags this crate round-trips:
/// `0x0002` (MS ADPCM, `wSamplesPerBlock` + `wNumCoef` + coefficient pairs) and
/// `0x0011` (IMA ADPCM, `wSamplesPerBlock` only).
fn parse_adpcm_extension(format_tag: u16, block_align: u16, ext: &[u8]) -> Option<WaveFormatExtra> {
	match format_tag {
		0x0002 => {
			if ext.len() < 4 {
				return None;
			}
			let samples_per_block = u16::from_le_bytes(ext[0..2].try_into().unwrap());
			let num_coef = u16::from_le_bytes(ext[2..4].try_into().unwrap()) as usize;
			let mut coefficients = Vec::with_capacity(num_coef);
			let mut pos = 4;
			for _ in 0..num_coef {
				if pos + 4 > ext.len() {
					break;
				}
				let coef1 = i16::from_le_bytes(ext[pos..pos + 2].try_into().unwrap());
				let coef2 = i16::from_le_bytes(ext[pos + 2..pos + 4].try_into().unwrap());
				coefficients.push((coef1, coef2));
				pos += 4;
			}
			Some(WaveFormatExtra {
				block_align,
				samples_per_block,
				coefficients,
			})
		},
		0x0011 => {
			if ext.len() < 2 {
				return None;
			}
			let samples_per_block = u16::from_le_bytes(ext[0..2].try_into().unwrap());
			Some(WaveFormatExtra {
				block_align,
				samples_per_block,
				coefficients: Vec::new(),
			})
		},
		_ => None,
	}
}

fn parse_waveformatex(data: &[u8]) -> Option<WaveFormat> {
	if data.len() < 16 {
		return None;
	}
	let format_tag = u16::from_le_bytes(data[0..2].try_into().unwrap());
	let block_align = u16::from_le_bytes(data[12..14].try_into().unwrap());

	let adpcm = if data.len() >= 18 {
		let cb_size = u16::from_le_bytes(data[16..18].try_into().unwrap()) as usize;
		let ext = &data[18..(18 + cb_size).min(data.len())];
		parse_adpcm_extension(format_tag, block_align, ext)
	} else {
		None
	};

	Some(WaveFormat {
		format_tag,
		channels: u16::from_le_bytes(data[2..4].try_into().unwrap()),
		sample_rate: u32::from_le_bytes(data[4..8].try_into().unwrap()),
		avg_bytes_per_sec: u32::from_le_bytes(data[8..12].try_into().unwrap()),
		block_align,
		bits_per_sample: u16::from_le_bytes(data[14..16].try_into().unwrap()),
		adpcm,
	})
}

fn audio_info(wf: &WaveFormat, data_size: u64) -> AudioStreamInfo {
	let duration = if wf.avg_bytes_per_sec > 0 {
		Some(data_size as f64 / f64::from(wf.avg_bytes_per_sec))
	} else {
		None
	};
	AudioStreamInfo {
		id: 0,
		codec: format_tag_to_codec(wf.format_tag, wf.bits_per_sample),
		codec_detail: None,
		channel_count: Some(wf.channels),
		sample_rate: Some(wf.sample_rate),
		bits_per_sample: Some(wf.bits_per_sample),
		bitrate: Some(wf.avg_bytes_per_sec * 8),
		profile: None,
		duration,
		wave_format_extra: wf.adpcm.clone(),
	}
}

struct WavHeader {
	format: WaveFormat,
	/// Remaining bytes in the `data` chunk; the reservoir is positioned right
	/// at the start of the chunk's bytes when this is returned.
	data_len: u64,
}

fn read_header<R: Read>(r: &mut Reservoir<R>) -> Result<WavHeader> {
	if r.read_fourcc()? != FCC_RIFF {
		return Err(Error::UnsupportedFormat("missing RIFF signature".into()));
	}
	let _riff_size = r.read_u32le()?;
	if r.read_fourcc()? != FCC_WAVE {
		return Err(Error::UnsupportedFormat("RIFF form is not WAVE".into()));
	}

	let mut format = None;

	loop {
		if r.at_eof()? {
			malformed!("wav", "reached end of stream without finding a data chunk");
		}
		let id = r.read_fourcc()?;
		let size = r.read_u32le()?;

		if id == FCC_FMT {
			let body = r.take(size as usize)?;
			format = parse_waveformatex(&body);
			if size % 2 == 1 {
				r.advance(1)?;
			}
		} else if id == FCC_DATA {
			let format = format.ok_or_else(|| Error::malformed("wav", "data chunk before fmt chunk"))?;
			return Ok(WavHeader {
				format,
				data_len: u64::from(size),
			});
		} else {
			let pad = u64::from(size % 2);
			r.advance(u64::from(size) + pad)?;
		}
	}
}

pub fn probe<R: Read>(r: &mut Reservoir<R>) -> Result<MediaInfo> {
	let header = read_header(r)?;
	let mut info = MediaInfo::new(ContainerKind::Wav);
	let stream = audio_info(&header.format, header.data_len);
	info.duration_in_seconds = stream.duration;
	info.audio_streams.push(stream);
	Ok(info)
}

pub fn extract<R: Read>(
	r: &mut Reservoir<R>,
	opts: &mut ExtractOptions<'_>,
	emit: &mut dyn SampleEmit,
) -> Result<AudioStreamInfo> {
	let header = read_header(r)?;
	let info = audio_info(&header.format, header.data_len);
	let selected = select_audio_stream(std::slice::from_ref(&info), opts)?.clone();

	let bytes_per_sec = f64::from(header.format.avg_bytes_per_sec).max(1.0);
	let mut remaining = header.data_len;
	let mut byte_offset = 0u64;
	while remaining > 0 {
		let want = remaining.min(SAMPLE_CHUNK_BYTES as u64) as usize;
		let data = r.take(want)?;
		let time = byte_offset as f64 / bytes_per_sec;
		byte_offset += data.len() as u64;
		remaining -= want as u64;
		report_progress_fraction(opts, byte_offset, header.data_len);
		emit.emit(Sample::new(selected.id, data, time))?;
	}

	opts.report_progress(100);
	Ok(selected)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn chunk(id: &[u8; 4], data: &[u8]) -> Vec<u8> {
		let mut out = id.to_vec();
		out.extend((data.len() as u32).to_le_bytes());
		out.extend_from_slice(data);
		if data.len() % 2 == 1 {
			out.push(0);
		}
		out
	}

	fn build_minimal_wav(pcm: &[u8]) -> Vec<u8> {
		let mut fmt = Vec::new();
		fmt.extend(1u16.to_le_bytes()); // PCM
		fmt.extend(2u16.to_le_bytes()); // channels
		fmt.extend(44100u32.to_le_bytes());
		fmt.extend(176_400u32.to_le_bytes());
		fmt.extend(4u16.to_le_bytes());
		fmt.extend(16u16.to_le_bytes());
		let fmt_chunk = chunk(&FCC_FMT, &fmt);
		let data_chunk = chunk(&FCC_DATA, pcm);

		let mut body = Vec::new();
		body.extend_from_slice(&FCC_WAVE);
		body.extend(fmt_chunk);
		body.extend(data_chunk);
		chunk(&FCC_RIFF, &body)
	}

	#[test]
	fn probes_pcm_wav() {
		let data = build_minimal_wav(&[0u8; 8]);
		let mut r = Reservoir::new(&data[..]);
		let info = probe(&mut r).unwrap();
		assert_eq!(info.container, "wav");
		assert_eq!(info.audio_streams[0].codec, "pcm_s16le");
		assert_eq!(info.audio_streams[0].sample_rate, Some(44100));
		assert_eq!(info.audio_streams[0].bits_per_sample, Some(16));
	}

	#[test]
	fn extracts_data_passthrough() {
		let payload = vec![1, 2, 3, 4, 5, 6, 7, 8];
		let data = build_minimal_wav(&payload);
		let mut r = Reservoir::new(&data[..]);
		let mut opts = ExtractOptions::new();
		let mut out = Vec::new();
		extract(&mut r, &mut opts, &mut |s: Sample| {
			out.extend(s.data);
			Ok(())
		})
		.unwrap();
		assert_eq!(out, payload);
	}
}
