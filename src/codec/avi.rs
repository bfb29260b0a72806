//! `WAVEFORMATEX.wFormatTag` to codec-tag mapping, used by the AVI demuxer.

/// Maps a `WAVEFORMATEX` format tag to the crate's short codec tag. Unknown tags
/// fall through to a hex passthrough string so probing a stream with an exotic
/// codec still reports *something* rather than failing.
pub fn format_tag_to_codec(tag: u16, bits_per_sample: u16) -> String {
	match tag {
		0x0001 if bits_per_sample == 8 => "pcm_u8".to_string(),
		0x0001 => "pcm_s16le".to_string(),
		0x0002 => "adpcm_ms".to_string(),
		0x0011 => "adpcm_ima".to_string(),
		0x0055 => "mp3".to_string(),
		0x0050 => "mp2".to_string(),
		0x00ff => "aac".to_string(),
		0x0161 => "wmav2".to_string(),
		0x0162 => "wmapro".to_string(),
		0x2000 => "ac3".to_string(),
		other => format!("0x{other:04x}"),
	}
}

/// `true` for format tags the AVI→WAV extraction path can reframe directly
/// (PCM and ADPCM variants); anything else needs a different output container or
/// is simply unsupported from AVI: AAC-in-AVI has no
/// output path).
pub fn is_pcm_like(tag: u16) -> bool {
	matches!(tag, 0x0001 | 0x0002 | 0x0011)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn maps_known_tags() {
		assert_eq!(format_tag_to_codec(0x0001, 16), "pcm_s16le");
		assert_eq!(format_tag_to_codec(0x0001, 8), "pcm_u8");
		assert_eq!(format_tag_to_codec(0x0002, 16), "adpcm_ms");
		assert_eq!(format_tag_to_codec(0x0055, 16), "mp3");
	}

	#[test]
	fn falls_back_to_hex_for_unknown_tag() {
		assert_eq!(format_tag_to_codec(0x9999, 16), "0x9999");
	}
}
