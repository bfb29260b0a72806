//! Well-known ASF object and stream-type GUIDs.
//!
//! All GUIDs in an ASF file are stored as 16 raw bytes in little-endian field
//! order; we keep them as plain `[u8; 16]` byte arrays rather than a structured
//! GUID type so comparison is just an array equality check.

pub type Guid = [u8; 16];

pub const HEADER_OBJECT: Guid = [
	0x30, 0x26, 0xB2, 0x75, 0x8E, 0x66, 0xCF, 0x11, 0xA6, 0xD9, 0x00, 0xAA, 0x00, 0x62, 0xCE, 0x6C,
];
pub const DATA_OBJECT: Guid = [
	0x36, 0x26, 0xB2, 0x75, 0x8E, 0x66, 0xCF, 0x11, 0xA6, 0xD9, 0x00, 0xAA, 0x00, 0x62, 0xCE, 0x6C,
];
pub const FILE_PROPERTIES: Guid = [
	0xA1, 0xDC, 0xAB, 0x8C, 0x47, 0xA9, 0xCF, 0x11, 0x8E, 0xE4, 0x00, 0xC0, 0x0C, 0x20, 0x53, 0x65,
];
pub const STREAM_PROPERTIES: Guid = [
	0x91, 0x07, 0xDC, 0xB7, 0xB7, 0xA9, 0xCF, 0x11, 0x8E, 0xE6, 0x00, 0xC0, 0x0C, 0x20, 0x53, 0x65,
];
pub const HEADER_EXTENSION: Guid = [
	0xB5, 0x03, 0xBF, 0x5F, 0x2E, 0xA9, 0xCF, 0x11, 0x8E, 0xE3, 0x00, 0xC0, 0x0C, 0x20, 0x53, 0x65,
];
pub const EXTENDED_STREAM_PROPERTIES: Guid = [
	0xCB, 0xA5, 0xE6, 0x14, 0x72, 0xC6, 0x32, 0x43, 0x83, 0x99, 0xA9, 0x69, 0x52, 0x06, 0x5B, 0x5A,
];
pub const STREAM_TYPE_AUDIO: Guid = [
	0x40, 0x9E, 0x69, 0xF8, 0x4D, 0x5B, 0xCF, 0x11, 0xA8, 0xFD, 0x00, 0x80, 0x5F, 0x5C, 0x44, 0x2B,
];
pub const STREAM_TYPE_VIDEO: Guid = [
	0xC0, 0xEF, 0x19, 0xBC, 0x4D, 0x5B, 0xCF, 0x11, 0xA8, 0xFD, 0x00, 0x80, 0x5F, 0x5C, 0x44, 0x2B,
];
/// Audio-spread error-correction GUID, used both to recognize incoming Error
/// Correction Data and to stamp it on our own WMA output packets.
pub const AUDIO_SPREAD: Guid = [
	0x50, 0xCD, 0xC3, 0xBF, 0x8F, 0x61, 0xCF, 0x11, 0x8B, 0xB2, 0x00, 0xAA, 0x00, 0xB4, 0xE2, 0x20,
];
pub const NO_ERROR_CORRECTION: Guid = [
	0x20, 0x53, 0x3C, 0x57, 0x89, 0x66, 0xD1, 0x11, 0xA7, 0x81, 0x00, 0xA0, 0xC9, 0x03, 0x48, 0xF6,
];

/// Formats a raw ASF GUID the way tools conventionally print a Windows GUID
/// (fields 1-3 byte-swapped to big-endian, 4-5 left as stored). Used only for
/// diagnostics; GUIDs are never compared through this representation.
pub fn format_guid(g: &Guid) -> String {
	format!(
		"{:02X}{:02X}{:02X}{:02X}-{:02X}{:02X}-{:02X}{:02X}-{:02X}{:02X}-{:02X}{:02X}{:02X}{:02X}{:02X}{:02X}",
		g[3], g[2], g[1], g[0], g[5], g[4], g[7], g[6], g[8], g[9], g[10], g[11], g[12], g[13], g[14], g[15]
	)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn header_guid_formats_as_expected() {
		assert_eq!(format_guid(&HEADER_OBJECT), "75B22630-668E-11CF-A6D9-00AA0062CE6C");
	}
}
