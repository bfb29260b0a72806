//! Matroska / WebM demuxer.
//!
//! EBML is a nested tag-length-value format: both element IDs and sizes are
//! "VINT" encoded, with the length of the encoding signalled by the number
//! of leading zero bits of the first byte. We read the top-level `Segment`
//! tree straight off the [`Reservoir`] (it can be gigabytes), but fully
//! materialize the small interior elements (`Info`, `TrackEntry`, one
//! `Cluster` at a time) into a `Vec<u8>` and walk those in memory — mirrors
//! the same "read the header fully, then walk its bytes" shape the MP4
//! demuxer uses for `stsd` sample entries.

use std::io::Read;

use crate::error::{Error, Result};
use crate::macros::malformed;
use crate::model::{AudioStreamInfo, ContainerKind, MediaInfo, Sample, VideoStreamInfo};
use crate::reservoir::Reservoir;

use super::{report_progress_fraction, select_audio_stream, ExtractOptions, SampleEmit};

const ID_EBML: u32 = 0x1A45_DFA3;
const ID_SEGMENT: u32 = 0x1853_8067;
const ID_SEEK_HEAD: u32 = 0x114D_9B74;
const ID_INFO: u32 = 0x1549_A966;
const ID_TIMECODE_SCALE: u32 = 0x2AD7_B1;
const ID_DURATION: u32 = 0x4489;
const ID_TRACKS: u32 = 0x1654_AE6B;
const ID_TRACK_ENTRY: u32 = 0xAE;
const ID_TRACK_NUMBER: u32 = 0xD7;
const ID_TRACK_TYPE: u32 = 0x83;
const ID_CODEC_ID: u32 = 0x86;
const ID_CODEC_PRIVATE: u32 = 0x63A2;
const ID_AUDIO: u32 = 0xE1;
const ID_VIDEO: u32 = 0xE0;
const ID_SAMPLING_FREQUENCY: u32 = 0xB5;
const ID_CHANNELS: u32 = 0x9F;
const ID_BIT_DEPTH: u32 = 0x6264;
const ID_PIXEL_WIDTH: u32 = 0xB0;
const ID_PIXEL_HEIGHT: u32 = 0xBA;
const ID_CLUSTER: u32 = 0x1F43_B675;
const ID_TIMECODE: u32 = 0xE7;
const ID_SIMPLE_BLOCK: u32 = 0xA3;
const ID_BLOCK_GROUP: u32 = 0xA0;
const ID_BLOCK: u32 = 0xA1;
const ID_DOC_TYPE: u32 = 0x4282;

const TRACK_TYPE_VIDEO: u64 = 1;
const TRACK_TYPE_AUDIO: u64 = 2;

/// Marker for EBML's "unknown size" encoding (all data bits set to 1).
const UNKNOWN_SIZE: u64 = u64::MAX;

fn vint_len(first_byte: u8) -> Option<u8> {
	if first_byte == 0 {
		return None;
	}
	Some(first_byte.leading_zeros() as u8 + 1)
}

fn read_id_stream<R: Read>(r: &mut Reservoir<R>) -> Result<Option<u32>> {
	if r.at_eof()? {
		return Ok(None);
	}
	let first = r.read_u8()?;
	let len = vint_len(first).ok_or_else(|| Error::malformed("mkv", "invalid EBML ID"))?;
	let mut id = u32::from(first);
	for _ in 1..len {
		id = (id << 8) | u32::from(r.read_u8()?);
	}
	Ok(Some(id))
}

fn read_size_stream<R: Read>(r: &mut Reservoir<R>) -> Result<u64> {
	let first = r.read_u8()?;
	let len = vint_len(first).ok_or_else(|| Error::malformed("mkv", "invalid EBML size"))?;
	let mut value = u64::from(first & (0xFFu8 >> len));
	for _ in 1..len {
		value = (value << 8) | u64::from(r.read_u8()?);
	}
	let max_value = (1u64 << (7 * len)).wrapping_sub(1);
	if value == max_value {
		return Ok(UNKNOWN_SIZE);
	}
	Ok(value)
}

fn read_id_slice(data: &[u8], pos: &mut usize) -> Option<u32> {
	let first = *data.get(*pos)?;
	let len = vint_len(first)? as usize;
	if *pos + len > data.len() {
		return None;
	}
	let mut id = u32::from(first);
	for i in 1..len {
		id = (id << 8) | u32::from(data[*pos + i]);
	}
	*pos += len;
	Some(id)
}

fn read_size_slice(data: &[u8], pos: &mut usize) -> Option<u64> {
	let first = *data.get(*pos)?;
	let len = vint_len(first)? as usize;
	if *pos + len > data.len() {
		return None;
	}
	let mut value = u64::from(first & (0xFFu8 >> len));
	for i in 1..len {
		value = (value << 8) | u64::from(data[*pos + i]);
	}
	*pos += len;
	let max_value = (1u64 << (7 * len)).wrapping_sub(1);
	if value == max_value {
		return Some(UNKNOWN_SIZE);
	}
	Some(value)
}

/// A signed VINT as used for every lacing size after the first in EBML
/// lacing: same encoding as an unsigned VINT, biased by `2^(7*len-1) - 1`.
fn read_signed_vint_slice(data: &[u8], pos: &mut usize) -> Option<i64> {
	let first = *data.get(*pos)?;
	let len = vint_len(first)? as u32;
	let unsigned = read_size_slice(data, pos)?;
	let bias = (1i64 << (7 * len - 1)) - 1;
	Some(unsigned as i64 - bias)
}

fn read_uint(bytes: &[u8]) -> u64 {
	bytes.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
}

fn read_float(bytes: &[u8]) -> f64 {
	match bytes.len() {
		4 => {
			let mut a = [0u8; 4];
			a.copy_from_slice(bytes);
			f64::from(f32::from_be_bytes(a))
		},
		8 => {
			let mut a = [0u8; 8];
			a.copy_from_slice(bytes);
			f64::from_be_bytes(a)
		},
		_ => 0.0,
	}
}

/// Walks a fully materialized element's children, calling `on_elem(id, body)`
/// for each direct child.
fn ebml_walk(data: &[u8], mut on_elem: impl FnMut(u32, &[u8])) {
	let mut pos = 0usize;
	while pos < data.len() {
		let Some(id) = read_id_slice(data, &mut pos) else {
			break;
		};
		let Some(size) = read_size_slice(data, &mut pos) else {
			break;
		};
		if size == UNKNOWN_SIZE {
			break;
		}
		let size = size as usize;
		if pos + size > data.len() {
			break;
		}
		on_elem(id, &data[pos..pos + size]);
		pos += size;
	}
}

/// Returns the body of the first direct child of `data` with the given ID.
fn find_child(data: &[u8], want_id: u32) -> Option<&[u8]> {
	let mut pos = 0usize;
	while pos < data.len() {
		let id = read_id_slice(data, &mut pos)?;
		let size = read_size_slice(data, &mut pos)?;
		if size == UNKNOWN_SIZE {
			return None;
		}
		let size = size as usize;
		if pos + size > data.len() {
			return None;
		}
		if id == want_id {
			return Some(&data[pos..pos + size]);
		}
		pos += size;
	}
	None
}

#[derive(Default, Clone)]
struct MkvTrack {
	number: u64,
	track_type: u64,
	codec_id: String,
	codec_private: Vec<u8>,
	sampling_frequency: Option<f64>,
	channels: Option<u16>,
	bit_depth: Option<u16>,
	pixel_width: Option<u32>,
	pixel_height: Option<u32>,
}

impl MkvTrack {
	fn is_audio(&self) -> bool {
		self.track_type == TRACK_TYPE_AUDIO
	}

	fn is_video(&self) -> bool {
		self.track_type == TRACK_TYPE_VIDEO
	}

	fn codec_tag(&self) -> &'static str {
		codec_id_to_tag(&self.codec_id)
	}
}

fn codec_id_to_tag(codec_id: &str) -> &'static str {
	match codec_id {
		"A_AAC" | "A_AAC/MPEG4/LC" | "A_AAC/MPEG2/LC" => "aac",
		"A_MPEG/L3" => "mp3",
		"A_MPEG/L2" => "mp2",
		"A_OPUS" => "opus",
		"A_VORBIS" => "vorbis",
		"A_PCM/INT/LIT" => "pcm_s16le",
		"A_AC3" => "ac3",
		"A_MS/ACM" => "wmav2",
		"V_MPEG4/ISO/AVC" => "h264",
		"V_MPEGH/ISO/HEVC" => "hevc",
		"V_VP8" => "vp8",
		"V_VP9" => "vp9",
		"V_AV1" => "av1",
		_ => "unknown",
	}
}

fn parse_track_entry(data: &[u8]) -> MkvTrack {
	let mut track = MkvTrack::default();
	ebml_walk(data, |id, body| match id {
		ID_TRACK_NUMBER => track.number = read_uint(body),
		ID_TRACK_TYPE => track.track_type = read_uint(body),
		ID_CODEC_ID => track.codec_id = String::from_utf8_lossy(body).trim_end_matches('\0').to_string(),
		ID_CODEC_PRIVATE => track.codec_private = body.to_vec(),
		ID_AUDIO => ebml_walk(body, |aid, abody| match aid {
			ID_SAMPLING_FREQUENCY => track.sampling_frequency = Some(read_float(abody)),
			ID_CHANNELS => track.channels = Some(read_uint(abody) as u16),
			ID_BIT_DEPTH => track.bit_depth = Some(read_uint(abody) as u16),
			_ => {},
		}),
		ID_VIDEO => ebml_walk(body, |vid, vbody| match vid {
			ID_PIXEL_WIDTH => track.pixel_width = Some(read_uint(vbody) as u32),
			ID_PIXEL_HEIGHT => track.pixel_height = Some(read_uint(vbody) as u32),
			_ => {},
		}),
		_ => {},
	});
	track
}

struct SegmentHeader {
	doc_type: String,
	timecode_scale: u64,
	duration_units: Option<f64>,
	tracks: Vec<MkvTrack>,
}

/// Reads the `EBML` header (for `DocType`) and walks `Segment` until `Tracks`
/// has been seen, then returns — the cluster data that follows is left
/// untouched on the reservoir for `extract` to continue from.
fn read_header<R: Read>(r: &mut Reservoir<R>) -> Result<SegmentHeader> {
	let id = read_id_stream(r)?.ok_or_else(|| Error::UnsupportedFormat("empty stream".into()))?;
	if id != ID_EBML {
		return Err(Error::UnsupportedFormat("missing EBML header".into()));
	}
	let ebml_size = read_size_stream(r)?;
	let ebml_body = if ebml_size == UNKNOWN_SIZE {
		malformed!("mkv", "EBML header may not have unknown size");
	} else {
		r.take(ebml_size as usize)?
	};
	let mut doc_type = "matroska".to_string();
	ebml_walk(&ebml_body, |eid, body| {
		if eid == ID_DOC_TYPE {
			doc_type = String::from_utf8_lossy(body).trim_end_matches('\0').to_string();
		}
	});

	let seg_id = read_id_stream(r)?.ok_or_else(|| Error::UnsupportedFormat("no Segment element".into()))?;
	if seg_id != ID_SEGMENT {
		malformed!("mkv", "expected Segment element, found {seg_id:08X}");
	}
	let _segment_size = read_size_stream(r)?;

	let mut timecode_scale = 1_000_000u64;
	let mut duration_units = None;
	let mut tracks = Vec::new();

	loop {
		let Some(id) = read_id_stream(r)? else {
			break;
		};
		if id == ID_CLUSTER {
			// Reached the payload region; stop here and leave the Cluster's
			// ID already consumed for `extract`'s caller to pick up via the
			// `first_cluster_id_consumed` flag.
			return Ok(SegmentHeader {
				doc_type,
				timecode_scale,
				duration_units,
				tracks,
			});
		}

		let size = read_size_stream(r)?;
		if size == UNKNOWN_SIZE {
			malformed!("mkv", "unsupported unknown-size element before first Cluster");
		}
		let body = r.take(size as usize)?;

		match id {
			ID_INFO => ebml_walk(&body, |iid, ibody| match iid {
				ID_TIMECODE_SCALE => timecode_scale = read_uint(ibody),
				ID_DURATION => duration_units = Some(read_float(ibody)),
				_ => {},
			}),
			ID_TRACKS => ebml_walk(&body, |tid, tbody| {
				if tid == ID_TRACK_ENTRY {
					tracks.push(parse_track_entry(tbody));
				}
			}),
			_ => {},
		}
	}

	Err(Error::UnsupportedFormat("no Cluster found in Segment".into()))
}

fn track_to_audio_info(t: &MkvTrack) -> AudioStreamInfo {
	AudioStreamInfo {
		id: t.number as u32,
		codec: t.codec_tag().to_string(),
		codec_detail: None,
		channel_count: t.channels,
		sample_rate: t.sampling_frequency.map(|f| f.round() as u32),
		bits_per_sample: t.bit_depth,
		bitrate: None,
		profile: None,
		duration: None,
		wave_format_extra: None,
	}
}

fn track_to_video_info(t: &MkvTrack) -> VideoStreamInfo {
	VideoStreamInfo {
		id: t.number as u32,
		codec: t.codec_tag().to_string(),
		codec_detail: None,
		width: t.pixel_width,
		height: t.pixel_height,
		fps: None,
		bitrate: None,
		duration: None,
	}
}

pub fn probe<R: Read>(r: &mut Reservoir<R>) -> Result<MediaInfo> {
	let header = read_header(r)?;
	let kind = if header.doc_type == "webm" {
		ContainerKind::WebM
	} else {
		ContainerKind::Matroska
	};
	let mut info = MediaInfo::new(kind);
	info.container_detail = Some(header.doc_type);
	info.duration_in_seconds = header
		.duration_units
		.map(|units| units * header.timecode_scale as f64 / 1_000_000_000.0);

	for t in &header.tracks {
		if t.is_audio() {
			info.audio_streams.push(track_to_audio_info(t));
		} else if t.is_video() {
			info.video_streams.push(track_to_video_info(t));
		}
	}
	Ok(info)
}

enum Lacing {
	None,
	Xiph,
	Fixed,
	Ebml,
}

fn lacing_mode(flags: u8) -> Lacing {
	match (flags >> 1) & 0x3 {
		0 => Lacing::None,
		1 => Lacing::Xiph,
		3 => Lacing::Ebml,
		_ => Lacing::Fixed,
	}
}

/// Splits a (Simple)Block body into its track number, relative timecode,
/// keyframe flag, and de-laced frames.
fn parse_block(data: &[u8]) -> Result<(u64, i16, bool, Vec<&[u8]>)> {
	let mut pos = 0usize;
	let track_number =
		read_size_slice(data, &mut pos).ok_or_else(|| Error::malformed("mkv", "block missing track number"))?;
	if pos + 3 > data.len() {
		malformed!("mkv", "block too short for timecode/flags");
	}
	let timecode = i16::from_be_bytes([data[pos], data[pos + 1]]);
	let flags = data[pos + 2];
	pos += 3;
	let keyframe = flags & 0x80 != 0;

	let frames = match lacing_mode(flags) {
		Lacing::None => vec![&data[pos..]],
		Lacing::Xiph => {
			let count = usize::from(*data.get(pos).ok_or_else(|| Error::malformed("mkv", "missing lace count"))?) + 1;
			pos += 1;
			let mut sizes = Vec::with_capacity(count);
			for _ in 0..count - 1 {
				let mut size = 0usize;
				loop {
					let b = *data.get(pos).ok_or_else(|| Error::malformed("mkv", "truncated xiph lace size"))?;
					pos += 1;
					size += usize::from(b);
					if b != 0xFF {
						break;
					}
				}
				sizes.push(size);
			}
			let mut frames = Vec::with_capacity(count);
			for size in sizes {
				if pos + size > data.len() {
					malformed!("mkv", "xiph lace frame runs past block end");
				}
				frames.push(&data[pos..pos + size]);
				pos += size;
			}
			frames.push(&data[pos..]);
			frames
		},
		Lacing::Fixed => {
			let count = usize::from(*data.get(pos).ok_or_else(|| Error::malformed("mkv", "missing lace count"))?) + 1;
			pos += 1;
			let remaining = data.len() - pos;
			if count == 0 || remaining % count != 0 {
				malformed!("mkv", "fixed lacing frame count does not evenly divide block body");
			}
			let frame_size = remaining / count;
			(0..count).map(|i| &data[pos + i * frame_size..pos + (i + 1) * frame_size]).collect()
		},
		Lacing::Ebml => {
			let count = usize::from(*data.get(pos).ok_or_else(|| Error::malformed("mkv", "missing lace count"))?) + 1;
			pos += 1;
			let mut sizes = Vec::with_capacity(count);
			let first = read_size_slice(data, &mut pos).ok_or_else(|| Error::malformed("mkv", "missing first ebml lace size"))?;
			sizes.push(first as i64);
			for _ in 1..count - 1 {
				let delta = read_signed_vint_slice(data, &mut pos)
					.ok_or_else(|| Error::malformed("mkv", "truncated ebml lace delta"))?;
				let prev = *sizes.last().unwrap();
				sizes.push(prev + delta);
			}
			let mut frames = Vec::with_capacity(count);
			for &size in &sizes {
				let size = size.max(0) as usize;
				if pos + size > data.len() {
					malformed!("mkv", "ebml lace frame runs past block end");
				}
				frames.push(&data[pos..pos + size]);
				pos += size;
			}
			frames.push(&data[pos..]);
			frames
		},
	};

	Ok((track_number, timecode, keyframe, frames))
}

pub fn extract<R: Read>(r: &mut Reservoir<R>, opts: &mut ExtractOptions<'_>, emit: &mut dyn SampleEmit) -> Result<AudioStreamInfo> {
	let header = read_header(r)?;
	let timecode_scale = header.timecode_scale as f64;
	// `duration_units` and `cluster_timecode` are both expressed in the same
	// tick unit (scaled by `timecode_scale` to get seconds), so they can be
	// compared directly without converting either one.
	let total_ticks = header.duration_units.map(|d| d as u64).unwrap_or(0);

	let audio_tracks: Vec<&MkvTrack> = header.tracks.iter().filter(|t| t.is_audio()).collect();
	let infos: Vec<AudioStreamInfo> = audio_tracks.iter().map(|t| track_to_audio_info(t)).collect();
	let selected = select_audio_stream(&infos, opts)?.clone();
	let target_track_number = u64::from(selected.id);

	// `read_header` stops with the first top-level element's ID already
	// consumed; it is always a Cluster (`read_header` only returns once one
	// has been found). Elements after the last Cluster (Cues, Tags, ...) are
	// skipped wholesale rather than assumed to be further Clusters.
	let mut next_id = Some(ID_CLUSTER);

	while let Some(id) = next_id {
		let size = read_size_stream(r)?;
		if size == UNKNOWN_SIZE {
			malformed!("mkv", "unsupported unknown-size top-level element");
		}

		if id != ID_CLUSTER {
			r.advance(size)?;
			next_id = read_id_stream(r)?;
			continue;
		}

		let cluster_body = r.take(size as usize)?;

		let mut cluster_timecode = 0u64;
		let mut pos = 0usize;
		while pos < cluster_body.len() {
			let Some(cid) = read_id_slice(&cluster_body, &mut pos) else {
				break;
			};
			let Some(csize) = read_size_slice(&cluster_body, &mut pos) else {
				break;
			};
			if csize == UNKNOWN_SIZE || pos + csize as usize > cluster_body.len() {
				break;
			}
			let body = &cluster_body[pos..pos + csize as usize];
			pos += csize as usize;

			match cid {
				ID_TIMECODE => cluster_timecode = read_uint(body),
				ID_SIMPLE_BLOCK => {
					emit_block(body, cluster_timecode, timecode_scale, target_track_number, emit)?;
				},
				ID_BLOCK_GROUP => {
					if let Some(block_body) = find_child(body, ID_BLOCK) {
						emit_block(block_body, cluster_timecode, timecode_scale, target_track_number, emit)?;
					}
				},
				_ => {},
			}
		}

		report_progress_fraction(opts, cluster_timecode, total_ticks);
		next_id = read_id_stream(r)?;
	}

	opts.report_progress(100);
	Ok(selected)
}

fn emit_block(
	body: &[u8],
	cluster_timecode: u64,
	timecode_scale: f64,
	target_track_number: u64,
	emit: &mut dyn SampleEmit,
) -> Result<()> {
	let (track_number, rel_timecode, keyframe, frames) = parse_block(body)?;
	if track_number != target_track_number {
		return Ok(());
	}
	let absolute_ticks = cluster_timecode as i64 + i64::from(rel_timecode);
	let time = (absolute_ticks as f64 * timecode_scale) / 1_000_000_000.0;
	for frame in frames {
		let mut sample = Sample::new(track_number as u32, frame.to_vec(), time.max(0.0));
		sample.extra.is_keyframe = keyframe;
		emit.emit(sample)?;
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	fn vint_size(value: u64, len: u8) -> Vec<u8> {
		let marker = 0x80u8 >> (len - 1);
		let mut bytes = vec![0u8; len as usize];
		let mut v = value;
		for i in (0..len as usize).rev() {
			bytes[i] = (v & 0xFF) as u8;
			v >>= 8;
		}
		bytes[0] |= marker;
		bytes
	}

	fn elem(id_bytes: &[u8], size: u64, size_len: u8, body: &[u8]) -> Vec<u8> {
		let mut out = id_bytes.to_vec();
		out.extend(vint_size(size, size_len));
		out.extend_from_slice(body);
		out
	}

	fn build_minimal_mkv(doc_type: &[u8]) -> Vec<u8> {
		let doc_type_elem = elem(&[0x42, 0x82], doc_type.len() as u64, 1, doc_type);
		let ebml_body = doc_type_elem;
		let ebml = elem(&[0x1A, 0x45, 0xDF, 0xA3], ebml_body.len() as u64, 4, &ebml_body);

		let codec_id = b"A_OPUS";
		let track_number = elem(&[0xD7], 1, 1, &[1]);
		let track_type = elem(&[0x83], 1, 1, &[2]);
		let codec_id_elem = elem(&[0x86], codec_id.len() as u64, 1, codec_id);
		let mut audio_body = Vec::new();
		audio_body.extend(elem(&[0xB5], 4, 1, &48000f32.to_be_bytes()));
		audio_body.extend(elem(&[0x9F], 1, 1, &[2]));
		let audio = elem(&[0xE1], audio_body.len() as u64, 1, &audio_body);

		let mut track_entry_body = Vec::new();
		track_entry_body.extend(track_number);
		track_entry_body.extend(track_type);
		track_entry_body.extend(codec_id_elem);
		track_entry_body.extend(audio);
		let track_entry = elem(&[0xAE], track_entry_body.len() as u64, 2, &track_entry_body);
		let tracks = elem(&[0x16, 0x54, 0xAE, 0x6B], track_entry.len() as u64, 4, &track_entry);

		let timecode_scale = elem(&[0x2A, 0xD7, 0xB1], 4, 1, &1_000_000u32.to_be_bytes());
		let info = elem(&[0x15, 0x49, 0xA9, 0x66], timecode_scale.len() as u64, 4, &timecode_scale);

		let frame = [0x01u8, 0x02, 0x03, 0x04];
		let mut block_body = Vec::new();
		block_body.push(0x81); // track number VINT = 1
		block_body.extend_from_slice(&0i16.to_be_bytes());
		block_body.push(0x00); // flags: no lacing, not keyframe
		block_body.extend_from_slice(&frame);
		let simple_block = elem(&[0xA3], block_body.len() as u64, 2, &block_body);

		let timecode = elem(&[0xE7], 1, 1, &[0]);
		let mut cluster_body = Vec::new();
		cluster_body.extend(timecode);
		cluster_body.extend(simple_block);
		let cluster = elem(&[0x1F, 0x43, 0xB6, 0x75], cluster_body.len() as u64, 4, &cluster_body);

		let mut segment_body = Vec::new();
		segment_body.extend(info);
		segment_body.extend(tracks);
		segment_body.extend(cluster);
		let segment = elem(&[0x18, 0x53, 0x80, 0x67], segment_body.len() as u64, 4, &segment_body);

		let mut out = ebml;
		out.extend(segment);
		out
	}

	#[test]
	fn probes_webm_opus() {
		let data = build_minimal_mkv(b"webm");
		let mut r = Reservoir::new(&data[..]);
		let info = probe(&mut r).unwrap();
		assert_eq!(info.container, "webm");
		assert_eq!(info.audio_streams.len(), 1);
		assert_eq!(info.audio_streams[0].codec, "opus");
		assert_eq!(info.audio_streams[0].sample_rate, Some(48000));
		assert_eq!(info.audio_streams[0].channel_count, Some(2));
	}

	#[test]
	fn extracts_single_frame() {
		let data = build_minimal_mkv(b"webm");
		let mut r = Reservoir::new(&data[..]);
		let mut opts = ExtractOptions::new();
		let mut out = Vec::new();
		let info = extract(&mut r, &mut opts, &mut |s: Sample| {
			out.push(s);
			Ok(())
		})
		.unwrap();
		assert_eq!(info.codec, "opus");
		assert_eq!(out.len(), 1);
		assert_eq!(out[0].data, vec![1, 2, 3, 4]);
	}
}
