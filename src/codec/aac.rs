//! The 13-entry ADTS/MPEG-4 sampling-frequency-index table.

/// Sampling rates addressable by a 4-bit ADTS sampling-frequency-index, in table
/// order. Index 13 and 14 are reserved, 15 means "explicit frequency" and is not
/// representable in ADTS; both are absent here.
pub const SAMPLE_RATES: [u32; 13] = [
	96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000, 7350,
];

/// Looks up the ADTS sampling-frequency-index for an exact sample rate.
pub fn sampling_frequency_index(sample_rate: u32) -> Option<u8> {
	SAMPLE_RATES
		.iter()
		.position(|&r| r == sample_rate)
		.map(|i| i as u8)
}

/// Looks up the sample rate for an ADTS sampling-frequency-index.
pub fn sample_rate_for_index(index: u8) -> Option<u32> {
	SAMPLE_RATES.get(index as usize).copied()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn round_trips_common_rates() {
		for &rate in &[44100, 48000, 22050, 8000] {
			let idx = sampling_frequency_index(rate).unwrap();
			assert_eq!(sample_rate_for_index(idx), Some(rate));
		}
	}

	#[test]
	fn rejects_rate_not_in_table() {
		assert_eq!(sampling_frequency_index(44000), None);
	}
}
