//! WAV/RIFF writer. Buffers PCM/ADPCM payloads in memory, then writes a
//! `RIFF`/`WAVE`/`fmt `/`data` file in one shot once the total size is known.

use std::io::Write;

use crate::error::Result;
use crate::model::AudioStreamInfo;

/// Extra `WAVEFORMATEX` fields an ADPCM stream needs beyond the PCM-common
/// ones, carried from the source container's codec-private/`strf` blob.
#[derive(Debug, Clone, Default)]
pub struct AdpcmExtra {
	pub samples_per_block: u16,
	/// MS ADPCM predictor coefficient pairs (`iCoef1`, `iCoef2`); empty for
	/// IMA ADPCM, which carries no coefficient table.
	pub coefficients: Vec<(i16, i16)>,
}

pub struct WavWriter {
	format_tag: u16,
	channels: u16,
	sample_rate: u32,
	bits_per_sample: u16,
	block_align: u16,
	byte_rate: u32,
	adpcm: Option<AdpcmExtra>,
	data: Vec<u8>,
}

impl WavWriter {
	/// `format_tag` is the `WAVEFORMATEX` tag (1 = PCM, 2 = ADPCM_MS, 0x11 =
	/// ADPCM_IMA); `block_align` and `adpcm` come from the source stream's
	/// format block so round-tripped ADPCM keeps its original framing.
	pub fn new(stream: &AudioStreamInfo, format_tag: u16, block_align: u16, adpcm: Option<AdpcmExtra>) -> Self {
		let channels = stream.channel_count.unwrap_or(2);
		let sample_rate = stream.sample_rate.unwrap_or(44100);
		let bits_per_sample = stream.bits_per_sample.unwrap_or(16);

		let byte_rate = if let Some(ref extra) = adpcm {
			if extra.samples_per_block > 0 {
				(u64::from(sample_rate) * u64::from(block_align) / u64::from(extra.samples_per_block)) as u32
			} else {
				sample_rate * u32::from(block_align)
			}
		} else {
			sample_rate * u32::from(channels) * u32::from(bits_per_sample) / 8
		};

		WavWriter {
			format_tag,
			channels,
			sample_rate,
			bits_per_sample,
			block_align,
			byte_rate,
			adpcm,
			data: Vec::new(),
		}
	}

	pub fn push(&mut self, payload: &[u8]) {
		self.data.extend_from_slice(payload);
	}

	fn fmt_chunk(&self) -> Vec<u8> {
		let mut fmt = Vec::new();
		fmt.extend_from_slice(&self.format_tag.to_le_bytes());
		fmt.extend_from_slice(&self.channels.to_le_bytes());
		fmt.extend_from_slice(&self.sample_rate.to_le_bytes());
		fmt.extend_from_slice(&self.byte_rate.to_le_bytes());
		fmt.extend_from_slice(&self.block_align.to_le_bytes());
		fmt.extend_from_slice(&self.bits_per_sample.to_le_bytes());
		if let Some(extra) = &self.adpcm {
			if extra.coefficients.is_empty() {
				// ADPCM_IMA: wSamplesPerBlock only.
				let cb_size = 2u16;
				fmt.extend_from_slice(&cb_size.to_le_bytes());
				fmt.extend_from_slice(&extra.samples_per_block.to_le_bytes());
			} else {
				// ADPCM_MS: wSamplesPerBlock, wNumCoef, then the coefficient table.
				let cb_size = 4 + 4 * extra.coefficients.len() as u16;
				fmt.extend_from_slice(&cb_size.to_le_bytes());
				fmt.extend_from_slice(&extra.samples_per_block.to_le_bytes());
				fmt.extend_from_slice(&(extra.coefficients.len() as u16).to_le_bytes());
				for (coef1, coef2) in &extra.coefficients {
					fmt.extend_from_slice(&coef1.to_le_bytes());
					fmt.extend_from_slice(&coef2.to_le_bytes());
				}
			}
		}
		fmt
	}

	/// Writes the complete file: `RIFF` header, `fmt ` chunk, `data` chunk.
	pub fn finish(self, sink: &mut dyn Write) -> Result<()> {
		let fmt = self.fmt_chunk();
		let data_len = self.data.len();
		let data_pad = data_len % 2;

		let riff_size = 4 // "WAVE"
			+ 8 + fmt.len()
			+ 8 + data_len + data_pad;

		sink.write_all(b"RIFF")?;
		sink.write_all(&(riff_size as u32).to_le_bytes())?;
		sink.write_all(b"WAVE")?;

		sink.write_all(b"fmt ")?;
		sink.write_all(&(fmt.len() as u32).to_le_bytes())?;
		sink.write_all(&fmt)?;

		sink.write_all(b"data")?;
		sink.write_all(&(data_len as u32).to_le_bytes())?;
		sink.write_all(&self.data)?;
		if data_pad == 1 {
			sink.write_all(&[0u8])?;
		}

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn pcm_stream() -> AudioStreamInfo {
		AudioStreamInfo {
			channel_count: Some(2),
			sample_rate: Some(44100),
			bits_per_sample: Some(16),
			..Default::default()
		}
	}

	#[test]
	fn writes_valid_pcm_header() {
		let stream = pcm_stream();
		let mut writer = WavWriter::new(&stream, 1, 4, None);
		writer.push(&[1, 2, 3, 4, 5, 6, 7, 8]);
		let mut out = Vec::new();
		writer.finish(&mut out).unwrap();

		assert_eq!(&out[0..4], b"RIFF");
		let riff_size = u32::from_le_bytes(out[4..8].try_into().unwrap());
		assert_eq!(riff_size as usize, out.len() - 8);
		assert_eq!(&out[8..12], b"WAVE");
		assert_eq!(&out[12..16], b"fmt ");

		let data_pos = out.windows(4).position(|w| w == b"data").unwrap();
		let data_size = u32::from_le_bytes(out[data_pos + 4..data_pos + 8].try_into().unwrap());
		assert_eq!(data_size, 8);
	}

	#[test]
	fn adpcm_byte_rate_uses_samples_per_block() {
		let stream = AudioStreamInfo {
			channel_count: Some(1),
			sample_rate: Some(44100),
			bits_per_sample: Some(4),
			..Default::default()
		};
		let extra = AdpcmExtra {
			samples_per_block: 1012,
			coefficients: vec![(256, 0); 7],
		};
		let writer = WavWriter::new(&stream, 2, 1024, Some(extra));
		assert_eq!(writer.byte_rate, 44100 * 1024 / 1012);
	}
}
