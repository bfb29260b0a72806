//! AVI / RIFF demuxer.
//!
//! An AVI file is a single `RIFF....AVI ` chunk containing a `LIST hdrl`
//! (per-stream headers) followed by a `LIST movi` (the interleaved payload).
//! Every chunk, nested or not, is `fourcc(4) + size_le(4) + data[size]`,
//! padded to an even byte count — there is no box-size-includes-header
//! ambiguity to resolve here, unlike ISOBMFF.
//!
//! Stream numbering is positional: the n-th `LIST strl` under `hdrl` is
//! stream `n`, and its payload chunks in `movi` are tagged with the
//! two-ASCII-digit stream number followed by a two-letter type code
//! (`wb` for audio, `dc`/`db` for video).

use std::io::Read;

use crate::codec::avi::format_tag_to_codec;
use crate::error::{Error, Result};
use crate::macros::malformed;
use crate::model::{AudioStreamInfo, ContainerKind, MediaInfo, Sample, VideoStreamInfo, WaveFormatExtra};
use crate::reservoir::Reservoir;

use super::{report_progress_fraction, select_audio_stream, ExtractOptions, SampleEmit};

const FCC_RIFF: [u8; 4] = *b"RIFF";
const FCC_AVI: [u8; 4] = *b"AVI ";
const FCC_LIST: [u8; 4] = *b"LIST";
const FCC_HDRL: [u8; 4] = *b"hdrl";
const FCC_STRL: [u8; 4] = *b"strl";
const FCC_MOVI: [u8; 4] = *b"movi";
const FCC_AVIH: [u8; 4] = *b"avih";
const FCC_STRH: [u8; 4] = *b"strh";
const FCC_STRF: [u8; 4] = *b"strf";
const FCC_VIDS: [u8; 4] = *b"vids";
const FCC_AUDS: [u8; 4] = *b"auds";

struct AviStream {
	index: u32,
	fcc_type: [u8; 4],
	scale: u32,
	rate: u32,
	length: u32,
	strf: Vec<u8>,
}

impl AviStream {
	fn is_audio(&self) -> bool {
		self.fcc_type == FCC_AUDS
	}

	fn is_video(&self) -> bool {
		self.fcc_type == FCC_VIDS
	}

	fn duration(&self) -> Option<f64> {
		if self.rate == 0 {
			return None;
		}
		Some(f64::from(self.length) * f64::from(self.scale) / f64::from(self.rate))
	}
}

struct WaveFormat {
	format_tag: u16,
	channels: u16,
	sample_rate: u32,
	avg_bytes_per_sec: u32,
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
		bits_per_sample: u16::from_le_bytes(data[14..16].try_into().unwrap()),
		adpcm,
	})
}

struct BitmapInfoHeader {
	width: u32,
	height: u32,
	compression: [u8; 4],
}

fn parse_bitmapinfoheader(data: &[u8]) -> Option<BitmapInfoHeader> {
	if data.len() < 20 {
		return None;
	}
	Some(BitmapInfoHeader {
		width: u32::from_le_bytes(data[4..8].try_into().unwrap()),
		height: i32::from_le_bytes(data[8..12].try_into().unwrap()).unsigned_abs(),
		compression: data[16..20].try_into().unwrap(),
	})
}

fn video_codec_tag(fourcc: &[u8; 4]) -> String {
	match fourcc {
		b"H264" | b"h264" | b"avc1" => "h264".to_string(),
		b"\0\0\0\0" => "rawvideo".to_string(),
		b"MJPG" | b"mjpg" => "mjpeg".to_string(),
		b"XVID" | b"xvid" | b"FMP4" => "mpeg4".to_string(),
		other => String::from_utf8_lossy(other).trim_end_matches('\0').to_ascii_lowercase(),
	}
}

/// Walks a fully materialized chunk list, calling `on_chunk(id, body)` for
/// each direct child. `LIST` chunks are reported like any other chunk; the
/// caller inspects the first 4 bytes of `body` for the list type.
fn riff_walk(data: &[u8], mut on_chunk: impl FnMut(&[u8; 4], &[u8])) {
	let mut pos = 0usize;
	while pos + 8 <= data.len() {
		let mut id = [0u8; 4];
		id.copy_from_slice(&data[pos..pos + 4]);
		let size = u32::from_le_bytes(data[pos + 4..pos + 8].try_into().unwrap()) as usize;
		pos += 8;
		if pos + size > data.len() {
			break;
		}
		on_chunk(&id, &data[pos..pos + size]);
		pos += size + (size & 1);
	}
}

fn parse_strl(body: &[u8], index: u32) -> Option<AviStream> {
	let mut fcc_type = [0u8; 4];
	let mut scale = 0u32;
	let mut rate = 0u32;
	let mut length = 0u32;
	let mut strf = Vec::new();
	let mut found_strh = false;

	riff_walk(body, |id, data| {
		if *id == FCC_STRH && data.len() >= 56 {
			fcc_type.copy_from_slice(&data[0..4]);
			scale = u32::from_le_bytes(data[20..24].try_into().unwrap());
			rate = u32::from_le_bytes(data[24..28].try_into().unwrap());
			length = u32::from_le_bytes(data[32..36].try_into().unwrap());
			found_strh = true;
		} else if *id == FCC_STRF {
			strf = data.to_vec();
		}
	});

	if !found_strh {
		return None;
	}
	Some(AviStream {
		index,
		fcc_type,
		scale,
		rate,
		length,
		strf,
	})
}

fn parse_hdrl(body: &[u8]) -> (Vec<AviStream>, Option<(u32, u32)>) {
	let mut streams = Vec::new();
	let mut avih = None;
	let mut next_index = 0u32;

	riff_walk(body, |id, data| {
		if *id == FCC_LIST && data.len() >= 4 && data[0..4] == FCC_STRL {
			if let Some(s) = parse_strl(&data[4..], next_index) {
				streams.push(s);
			}
			next_index += 1;
		} else if *id == FCC_AVIH && data.len() >= 28 {
			let micros_per_frame = u32::from_le_bytes(data[0..4].try_into().unwrap());
			let total_frames = u32::from_le_bytes(data[16..20].try_into().unwrap());
			avih = Some((micros_per_frame, total_frames));
		}
	});

	(streams, avih)
}

struct AviHeader {
	streams: Vec<AviStream>,
	duration: Option<f64>,
	/// Remaining bytes in the `movi` list body; the reservoir is positioned
	/// right after the `movi` list-type fourcc when this is returned.
	movi_len: u64,
}

fn read_header<R: Read>(r: &mut Reservoir<R>) -> Result<AviHeader> {
	if r.read_fourcc()? != FCC_RIFF {
		return Err(Error::UnsupportedFormat("missing RIFF signature".into()));
	}
	let _riff_size = r.read_u32le()?;
	if r.read_fourcc()? != FCC_AVI {
		return Err(Error::UnsupportedFormat("RIFF form is not AVI".into()));
	}

	let mut streams = Vec::new();
	let mut avih = None;

	loop {
		if r.at_eof()? {
			malformed!("avi", "reached end of stream without finding a movi list");
		}
		let id = r.read_fourcc()?;
		let size = r.read_u32le()?;

		if id == FCC_LIST {
			let list_type = r.read_fourcc()?;
			let body_len = (size as u64).saturating_sub(4);
			if list_type == FCC_HDRL {
				let body = r.take(body_len as usize)?;
				let (parsed_streams, parsed_avih) = parse_hdrl(&body);
				streams = parsed_streams;
				avih = parsed_avih;
			} else if list_type == FCC_MOVI {
				let duration = avih
					.map(|(micros, frames)| f64::from(frames) * f64::from(micros) / 1_000_000.0)
					.or_else(|| streams.iter().find_map(AviStream::duration));
				return Ok(AviHeader {
					streams,
					duration,
					movi_len: body_len,
				});
			} else {
				r.advance(body_len)?;
			}
			if size % 2 == 1 {
				r.advance(1)?;
			}
		} else {
			let pad = u64::from(size % 2);
			r.advance(u64::from(size) + pad)?;
		}
	}
}

fn stream_to_audio_info(s: &AviStream) -> AudioStreamInfo {
	let wf = parse_waveformatex(&s.strf);
	if wf.is_none() {
		tracing::debug!(stream = s.index, "strf too short to parse as WAVEFORMATEX, codec reported as unknown");
	}
	AudioStreamInfo {
		id: s.index,
		codec: wf
			.as_ref()
			.map(|w| format_tag_to_codec(w.format_tag, w.bits_per_sample))
			.unwrap_or_else(|| "unknown".to_string()),
		codec_detail: None,
		channel_count: wf.as_ref().map(|w| w.channels),
		sample_rate: wf.as_ref().map(|w| w.sample_rate),
		bits_per_sample: wf.as_ref().map(|w| w.bits_per_sample),
		bitrate: wf.as_ref().map(|w| w.avg_bytes_per_sec * 8),
		profile: None,
		duration: s.duration(),
		wave_format_extra: wf.and_then(|w| w.adpcm),
	}
}

fn stream_to_video_info(s: &AviStream) -> VideoStreamInfo {
	let bmp = parse_bitmapinfoheader(&s.strf);
	if bmp.is_none() {
		tracing::debug!(stream = s.index, "strf too short to parse as BITMAPINFOHEADER, codec reported as unknown");
	}
	VideoStreamInfo {
		id: s.index,
		codec: bmp.as_ref().map(|b| video_codec_tag(&b.compression)).unwrap_or_else(|| "unknown".to_string()),
		codec_detail: None,
		width: bmp.as_ref().map(|b| b.width),
		height: bmp.as_ref().map(|b| b.height),
		fps: if s.scale != 0 { Some(f64::from(s.rate) / f64::from(s.scale)) } else { None },
		bitrate: None,
		duration: s.duration(),
	}
}

pub fn probe<R: Read>(r: &mut Reservoir<R>) -> Result<MediaInfo> {
	let header = read_header(r)?;
	let mut info = MediaInfo::new(ContainerKind::Avi);
	info.duration_in_seconds = header.duration;
	for s in &header.streams {
		if s.is_audio() {
			info.audio_streams.push(stream_to_audio_info(s));
		} else if s.is_video() {
			info.video_streams.push(stream_to_video_info(s));
		}
	}
	Ok(info)
}

fn chunk_id_for_stream(index: u32) -> [u8; 4] {
	let tag = format!("{index:02}wb");
	let bytes = tag.as_bytes();
	[bytes[0], bytes[1], bytes[2], bytes[3]]
}

pub fn extract<R: Read>(r: &mut Reservoir<R>, opts: &mut ExtractOptions<'_>, emit: &mut dyn SampleEmit) -> Result<AudioStreamInfo> {
	let header = read_header(r)?;
	let infos: Vec<AudioStreamInfo> = header.streams.iter().filter(|s| s.is_audio()).map(stream_to_audio_info).collect();
	let selected = select_audio_stream(&infos, opts)?.clone();
	let wanted_chunk_id = chunk_id_for_stream(selected.id);
	let bytes_per_sec = selected.bitrate.map(|b| f64::from(b) / 8.0).filter(|&b| b > 0.0);

	let mut consumed = 0u64;
	let mut byte_offset = 0u64;
	while consumed < header.movi_len {
		if r.at_eof()? {
			break;
		}
		let id = r.read_fourcc()?;
		let size = r.read_u32le()?;
		consumed += 8;

		if id == FCC_LIST {
			// `rec ` lists just wrap a run of ordinary chunks inline; unwrap
			// the list-type fourcc and keep scanning through its body as if
			// it were top-level.
			let _list_type = r.read_fourcc()?;
			consumed += 4;
			continue;
		}

		let data = r.take(size as usize)?;
		consumed += u64::from(size);
		if size % 2 == 1 {
			r.advance(1)?;
			consumed += 1;
		}

		if id == wanted_chunk_id {
			let time = bytes_per_sec.map_or(0.0, |bps| byte_offset as f64 / bps);
			byte_offset += data.len() as u64;
			emit.emit(Sample::new(selected.id, data, time))?;
		}
		report_progress_fraction(opts, consumed, header.movi_len);
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

	fn list(list_type: &[u8; 4], body: &[u8]) -> Vec<u8> {
		let mut payload = list_type.to_vec();
		payload.extend_from_slice(body);
		chunk(&FCC_LIST, &payload)
	}

	fn build_minimal_avi() -> Vec<u8> {
		let mut avih = Vec::new();
		avih.extend(22_675u32.to_le_bytes()); // micros per frame (unused by audio-only test)
		avih.extend(0u32.to_le_bytes());
		avih.extend(0u32.to_le_bytes());
		avih.extend(0u32.to_le_bytes());
		avih.extend(44u32.to_le_bytes()); // total frames
		avih.extend([0u8; 8]);
		let avih_chunk = chunk(&FCC_AVIH, &avih);

		let mut strh = Vec::new();
		strh.extend_from_slice(b"auds");
		strh.extend_from_slice(b"\0\0\0\0");
		strh.extend(0u32.to_le_bytes());
		strh.extend(0u16.to_le_bytes());
		strh.extend(0u16.to_le_bytes());
		strh.extend(0u32.to_le_bytes());
		strh.extend(1u32.to_le_bytes()); // scale
		strh.extend(44100u32.to_le_bytes()); // rate
		strh.extend(0u32.to_le_bytes());
		strh.extend(88200u32.to_le_bytes()); // length (samples)
		strh.extend(0u32.to_le_bytes());
		strh.extend(0u32.to_le_bytes());
		strh.extend(0u32.to_le_bytes());
		strh.extend([0u8; 8]);
		let strh_chunk = chunk(&FCC_STRH, &strh);

		let mut strf = Vec::new();
		strf.extend(1u16.to_le_bytes()); // PCM
		strf.extend(2u16.to_le_bytes()); // channels
		strf.extend(44100u32.to_le_bytes());
		strf.extend(176_400u32.to_le_bytes()); // avg bytes/sec
		strf.extend(4u16.to_le_bytes()); // block align
		strf.extend(16u16.to_le_bytes()); // bits per sample
		let strf_chunk = chunk(&FCC_STRF, &strf);

		let mut strl_body = Vec::new();
		strl_body.extend(strh_chunk);
		strl_body.extend(strf_chunk);
		let strl = list(&FCC_STRL, &strl_body);

		let mut hdrl_body = Vec::new();
		hdrl_body.extend(avih_chunk);
		hdrl_body.extend(strl);
		let hdrl = list(&FCC_HDRL, &hdrl_body);

		let audio_chunk = chunk(b"00wb", &[1, 2, 3, 4]);
		let movi = list(&FCC_MOVI, &audio_chunk);

		let mut riff_body = Vec::new();
		riff_body.extend_from_slice(&FCC_AVI);
		riff_body.extend(hdrl);
		riff_body.extend(movi);
		chunk(&FCC_RIFF, &riff_body)
	}

	#[test]
	fn probes_pcm_stream() {
		let data = build_minimal_avi();
		let mut r = Reservoir::new(&data[..]);
		let info = probe(&mut r).unwrap();
		assert_eq!(info.container, "avi");
		assert_eq!(info.audio_streams.len(), 1);
		assert_eq!(info.audio_streams[0].codec, "pcm_s16le");
		assert_eq!(info.audio_streams[0].sample_rate, Some(44100));
	}

	#[test]
	fn extracts_audio_chunk() {
		let data = build_minimal_avi();
		let mut r = Reservoir::new(&data[..]);
		let mut opts = ExtractOptions::new();
		let mut out = Vec::new();
		extract(&mut r, &mut opts, &mut |s: Sample| {
			out.push(s);
			Ok(())
		})
		.unwrap();
		assert_eq!(out.len(), 1);
		assert_eq!(out[0].data, vec![1, 2, 3, 4]);
	}
}
