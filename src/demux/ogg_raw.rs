//! OGG page parsing and packet reassembly (Opus/Vorbis logical bitstreams).

use std::io::Read;

use byteorder::{ByteOrder, LittleEndian};

use crate::error::Result;
use crate::macros::malformed;
use crate::model::{AudioStreamInfo, ContainerKind, MediaInfo, Sample};
use crate::reservoir::Reservoir;

use super::{select_audio_stream, ExtractOptions, SampleEmit};

const CAPTURE_PATTERN: &[u8; 4] = b"OggS";
pub const HEADER_TYPE_CONTINUED: u8 = 0x01;
pub const HEADER_TYPE_BOS: u8 = 0x02;
pub const HEADER_TYPE_EOS: u8 = 0x04;

/// One parsed OGG page: fixed header fields plus the reassembled segment table
/// and raw payload (not yet split into packets).
pub struct Page {
	pub header_type: u8,
	pub granule_position: u64,
	pub serial: u32,
	pub sequence: u32,
	pub segment_table: Vec<u8>,
	pub payload: Vec<u8>,
}

/// Reads one page from `r`, or returns `Ok(None)` at clean EOF between pages.
pub fn read_page<R: Read>(r: &mut Reservoir<R>) -> Result<Option<Page>> {
	if r.at_eof()? {
		return Ok(None);
	}
	let magic = r.take(4)?;
	if magic != CAPTURE_PATTERN {
		malformed!("ogg", "missing OggS capture pattern");
	}
	let _version = r.read_u8()?;
	let header_type = r.read_u8()?;
	let granule_position = r.read_u64le()?;
	let serial = r.read_u32le()?;
	let sequence = r.read_u32le()?;
	let _crc = r.read_u32le()?;
	let segment_count = usize::from(r.read_u8()?);
	let segment_table = r.take(segment_count)?;
	let payload_len: usize = segment_table.iter().map(|&b| usize::from(b)).sum();
	let payload = r.take(payload_len)?;

	Ok(Some(Page {
		header_type,
		granule_position,
		serial,
		sequence,
		segment_table,
		payload,
	}))
}

/// De-laces a page's segment table into individual packets, returning each
/// complete packet plus whether the *last* one is still open (continues onto
/// the next page).
pub fn split_packets(page: &Page) -> (Vec<Vec<u8>>, bool) {
	let mut packets = Vec::new();
	let mut current = Vec::new();
	let mut offset = 0usize;
	for &seg_len in &page.segment_table {
		let seg_len = usize::from(seg_len);
		current.extend_from_slice(&page.payload[offset..offset + seg_len]);
		offset += seg_len;
		if seg_len < 255 {
			packets.push(std::mem::take(&mut current));
		}
	}
	let still_open = page.segment_table.last() == Some(&255);
	if still_open {
		packets.push(current);
	}
	(packets, still_open)
}

fn detect_codec(first_packet: &[u8]) -> (&'static str, Option<u32>, Option<u16>) {
	if first_packet.len() >= 19 && &first_packet[0..8] == b"OpusHead" {
		let channels = u16::from(first_packet[9]);
		let sample_rate = LittleEndian::read_u32(&first_packet[12..16]);
		("opus", Some(sample_rate), Some(channels))
	} else if first_packet.len() >= 30 && first_packet[0] == 1 && &first_packet[1..7] == b"vorbis" {
		let channels = u16::from(first_packet[11]);
		let sample_rate = LittleEndian::read_u32(&first_packet[12..16]);
		("vorbis", Some(sample_rate), Some(channels))
	} else {
		("unknown", None, None)
	}
}

fn audio_info(codec: &str, sample_rate: Option<u32>, channels: Option<u16>) -> AudioStreamInfo {
	AudioStreamInfo {
		id: 0,
		codec: codec.to_string(),
		codec_detail: None,
		channel_count: channels,
		sample_rate,
		bits_per_sample: None,
		bitrate: None,
		profile: None,
		duration: None,
		wave_format_extra: None,
	}
}

pub fn probe<R: Read>(r: &mut Reservoir<R>) -> Result<MediaInfo> {
	let mut info = MediaInfo::new(ContainerKind::Ogg);

	// Scan BOS pages; each distinct serial starts one logical bitstream. We only
	// care about the first packet of each to identify the codec, since this crate
	// only ever extracts a single audio stream.
	loop {
		let Some(page) = read_page(r)? else {
			break;
		};
		if page.header_type & HEADER_TYPE_BOS == 0 {
			break;
		}
		let (packets, _) = split_packets(&page);
		if let Some(first) = packets.first() {
			let (codec, sample_rate, channels) = detect_codec(first);
			if codec != "unknown" {
				let mut stream = audio_info(codec, sample_rate, channels);
				stream.id = info.audio_streams.len() as u32;
				info.audio_streams.push(stream);
			}
		}
	}

	Ok(info)
}

pub fn extract<R: Read>(
	r: &mut Reservoir<R>,
	opts: &mut ExtractOptions<'_>,
	emit: &mut dyn SampleEmit,
) -> Result<AudioStreamInfo> {
	// First pass isn't possible without Seek, so probing and extraction share a
	// single forward walk: find the first audio BOS stream's serial, then pass
	// every subsequent page belonging to it straight through as samples.
	let mut target_serial: Option<u32> = None;
	let mut selected: Option<AudioStreamInfo> = None;
	let mut seen = Vec::new();
	let mut pending_open: Option<Vec<u8>> = None;

	// An OGG stream declares no overall page or sample count up front, so
	// intermediate progress can't be estimated; only start and completion
	// are reported.
	opts.report_progress(0);
	loop {
		let Some(page) = read_page(r)? else {
			break;
		};

		if page.header_type & HEADER_TYPE_BOS != 0 {
			let (packets, still_open) = split_packets(&page);
			if let Some(first) = packets.first() {
				let (codec, sample_rate, channels) = detect_codec(first);
				if codec != "unknown" {
					let mut info = audio_info(codec, sample_rate, channels);
					info.id = seen.len() as u32;
					seen.push((page.serial, info));
				}
			}
			if target_serial.is_none() {
				if let Ok(found) = select_audio_stream(
					&seen.iter().map(|(_, i)| i.clone()).collect::<Vec<_>>(),
					opts,
				) {
					let idx = seen.iter().position(|(_, i)| i.id == found.id).unwrap();
					target_serial = Some(seen[idx].0);
					selected = Some(seen[idx].1.clone());
				}
			}
			if still_open && Some(page.serial) == target_serial {
				pending_open = packets.last().cloned();
			}
			continue;
		}

		if Some(page.serial) != target_serial {
			continue;
		}

		let (packets, still_open) = split_packets(&page);
		let mut packets = packets;
		if let (Some(open), Some(first)) = (pending_open.take(), packets.first_mut()) {
			let mut joined = open;
			joined.extend_from_slice(first);
			*first = joined;
		}
		let n = packets.len();
		for (i, packet) in packets.into_iter().enumerate() {
			if still_open && i + 1 == n {
				pending_open = Some(packet);
				break;
			}
			let track_id = selected.as_ref().map(|s| s.id).unwrap_or(0);
			emit.emit(Sample::new(track_id, packet, 0.0))?;
		}
	}

	let selected = selected.ok_or_else(|| super::not_found_error(seen.len()))?;
	opts.report_progress(100);
	Ok(selected)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn crc_placeholder_page(header_type: u8, serial: u32, sequence: u32, packets: &[&[u8]]) -> Vec<u8> {
		let mut segment_table = Vec::new();
		let mut payload = Vec::new();
		for packet in packets {
			let mut remaining = packet.len();
			if remaining == 0 {
				segment_table.push(0);
			}
			while remaining >= 255 {
				segment_table.push(255);
				remaining -= 255;
			}
			segment_table.push(remaining as u8);
			payload.extend_from_slice(packet);
		}

		let mut out = Vec::new();
		out.extend_from_slice(CAPTURE_PATTERN);
		out.push(0); // version
		out.push(header_type);
		out.extend_from_slice(&0u64.to_le_bytes()); // granule
		out.extend_from_slice(&serial.to_le_bytes());
		out.extend_from_slice(&sequence.to_le_bytes());
		out.extend_from_slice(&0u32.to_le_bytes()); // crc placeholder
		out.push(segment_table.len() as u8);
		out.extend_from_slice(&segment_table);
		out.extend_from_slice(&payload);
		out
	}

	fn opus_head() -> Vec<u8> {
		let mut h = b"OpusHead".to_vec();
		h.push(1); // version
		h.push(2); // channels
		h.extend_from_slice(&312u16.to_le_bytes()); // pre-skip
		h.extend_from_slice(&48000u32.to_le_bytes()); // sample rate
		h.extend_from_slice(&0i16.to_le_bytes()); // output gain
		h.push(0); // channel mapping family
		h
	}

	#[test]
	fn probes_opus_stream() {
		let head = opus_head();
		let mut data = crc_placeholder_page(HEADER_TYPE_BOS, 42, 0, &[&head]);
		data.extend(crc_placeholder_page(0, 42, 1, &[&[1, 2, 3]]));
		let mut r = Reservoir::new(&data[..]);
		let info = probe(&mut r).unwrap();
		assert_eq!(info.audio_streams[0].codec, "opus");
		assert_eq!(info.audio_streams[0].sample_rate, Some(48000));
		assert_eq!(info.audio_streams[0].channel_count, Some(2));
	}

	#[test]
	fn extracts_data_packets() {
		let head = opus_head();
		let mut data = crc_placeholder_page(HEADER_TYPE_BOS, 7, 0, &[&head]);
		data.extend(crc_placeholder_page(0, 7, 1, &[&[9, 9, 9], &[8, 8]]));
		let mut r = Reservoir::new(&data[..]);
		let mut opts = ExtractOptions::new();
		let mut frames = Vec::new();
		extract(&mut r, &mut opts, &mut |s: Sample| {
			frames.push(s.data);
			Ok(())
		})
		.unwrap();
		assert_eq!(frames, vec![vec![9, 9, 9], vec![8, 8]]);
	}
}
