//! Codec and format tag tables shared by every demuxer/muxer.

pub mod aac;
pub mod asf;
pub mod avi;

/// AAC `AudioObjectType`, truncated to the values ADTS and this crate's MP4/Matroska
/// parsers care about. See ISO/IEC 14496-3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum AudioObjectType {
	Main = 1,
	Lc = 2,
	Ssr = 3,
	Ltp = 4,
	Sbr = 5,
}

impl AudioObjectType {
	/// Decodes the 5-bit `AudioObjectType` field from the front of an AAC
	/// `AudioSpecificConfig` (MP4 `esds`/Matroska `CodecPrivate`).
	pub fn from_u8(value: u8) -> Option<Self> {
		match value {
			1 => Some(Self::Main),
			2 => Some(Self::Lc),
			3 => Some(Self::Ssr),
			4 => Some(Self::Ltp),
			5 => Some(Self::Sbr),
			_ => None,
		}
	}

	/// Human-readable profile name, as surfaced in [`crate::model::AudioStreamInfo::profile`].
	pub fn profile_name(self) -> &'static str {
		match self {
			AudioObjectType::Main => "Main",
			AudioObjectType::Lc => "LC",
			AudioObjectType::Ssr => "SSR",
			AudioObjectType::Ltp => "LTP",
			AudioObjectType::Sbr => "SBR",
		}
	}

	/// ADTS's 2-bit `profile` field is `AudioObjectType - 1`, and only objects
	/// 1-4 fit in two bits at all.
	pub fn adts_profile_bits(self) -> Option<u8> {
		let aot = self as u8;
		if (1..=4).contains(&aot) {
			Some(aot - 1)
		} else {
			None
		}
	}
}
