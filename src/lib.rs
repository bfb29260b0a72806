//! Probes media containers and extracts a single audio stream from them.
//!
//! # Supported containers
//!
//! | Container        | Probe | Extract | Audio codecs handled                  |
//! |-------------------|-------|---------|----------------------------------------|
//! | MP4 / MOV          | X     | X       | AAC, MP3                               |
//! | Matroska / WebM     | X     | X       | AAC, MP3, Opus, Vorbis, PCM            |
//! | AVI                | X     | X       | PCM, ADPCM, MP3                        |
//! | ASF / WMV           | X     | X       | WMA (repackaged into ASF)              |
//! | MPEG-TS             | X     | X       | AAC (ADTS), MP3/MP2                    |
//! | OGG                | X     | X       | Opus, Vorbis                           |
//! | WAV                | X     | X       | PCM, ADPCM                             |
//! | raw ADTS / MP3      | X     | X       | AAC, MP3                               |
//!
//! # Examples
//!
//! ## Probing a container
//!
//! ```no_run
//! use std::fs::File;
//!
//! let file = File::open("input.mkv").unwrap();
//! let info = mediatap::probe(file).unwrap();
//! println!("{} has {} audio stream(s)", info.container, info.audio_streams.len());
//! ```
//!
//! ## Extracting the first audio stream
//!
//! ```no_run
//! use std::fs::File;
//!
//! mediatap::extract_audio_from_file_to_file("input.mp4", "output.aac", mediatap::ExtractOptions::default()).unwrap();
//! ```
//!
//! # Design
//!
//! Every container is read in a single forward pass — there is no seeking
//! anywhere in this crate, see [`reservoir`]. `probe` and `extract_audio`
//! each make their own pass over the input; calling both on the same stream
//! means opening it twice.

mod codec;
mod demux;
mod error;
mod extract;
mod macros;
mod model;
mod mux;
mod probe;
mod reservoir;

pub use error::{Error, ErrorKind, Result};
pub use model::{
	AsfFileProperties, AsfStreamDetail, AudioStreamInfo, ContainerExtensions, ContainerKind, MediaInfo, Sample, SampleExtra,
	VideoStreamInfo, WaveFormatExtra,
};

pub use demux::ExtractOptions;

/// Detects the input's container and describes its elementary streams.
///
/// Fails with [`Error::UnsupportedFormat`] when no known container magic is
/// found at the start of the input, or with [`Error::Malformed`] when the
/// magic matched but the structure that followed didn't parse.
pub fn probe<R: std::io::Read>(input: R) -> Result<MediaInfo> {
	probe::probe(input)
}

/// Extracts the selected audio stream from `input` and writes it to `sink` in
/// the output format the codec calls for (raw ADTS for AAC, raw frames for
/// MP3/MP2, an OGG container for Opus/Vorbis, a WAV file for PCM/ADPCM, a
/// single-stream ASF file for WMA). Returns the extracted stream's
/// description.
///
/// Fails with [`Error::NotFound`] when `options.track_id` or
/// `options.stream_index` doesn't resolve to an audio stream, with
/// [`Error::UnsupportedCodec`] when the selected stream's codec has no output
/// path from its source container, and with [`Error::FragmentationUnsupported`]
/// when an ASF source's payload doesn't fit the computed output packet size.
pub fn extract_audio<R: std::io::Read>(
	input: R,
	sink: &mut dyn std::io::Write,
	options: ExtractOptions<'_>,
) -> Result<AudioStreamInfo> {
	extract::extract_audio(input, sink, options)
}

/// Convenience wrapper: opens `in_path`, extracts its selected audio stream,
/// and writes the result to `out_path` (created or truncated).
pub fn extract_audio_from_file_to_file(
	in_path: impl AsRef<std::path::Path>,
	out_path: impl AsRef<std::path::Path>,
	options: ExtractOptions<'_>,
) -> Result<AudioStreamInfo> {
	let input = std::fs::File::open(in_path)?;
	let mut output = std::io::BufWriter::new(std::fs::File::create(out_path)?);
	let info = extract_audio(input, &mut output, options)?;
	std::io::Write::flush(&mut output)?;
	Ok(info)
}
