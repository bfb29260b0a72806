//! The probe result type and the per-sample unit handed from a demuxer to a muxer.

use std::collections::HashMap;

/// Coarse identity of the container that was detected by [`crate::probe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ContainerKind {
	Mp4,
	Mov,
	Matroska,
	WebM,
	Avi,
	Asf,
	MpegTs,
	Ogg,
	Wav,
	Aac,
	Mp3,
}

impl ContainerKind {
	/// The lowercase tag used in [`MediaInfo::container`] and in error messages.
	#[must_use]
	pub fn tag(self) -> &'static str {
		match self {
			ContainerKind::Mp4 => "mp4",
			ContainerKind::Mov => "mov",
			ContainerKind::Matroska => "mkv",
			ContainerKind::WebM => "webm",
			ContainerKind::Avi => "avi",
			ContainerKind::Asf => "asf",
			ContainerKind::MpegTs => "mpegts",
			ContainerKind::Ogg => "ogg",
			ContainerKind::Wav => "wav",
			ContainerKind::Aac => "aac",
			ContainerKind::Mp3 => "mp3",
		}
	}
}

/// A probed video elementary stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoStreamInfo {
	/// Track/stream identifier, unique within the owning [`MediaInfo`].
	pub id: u32,
	/// Short codec tag (`"h264"`, `"vp9"`, `"mjpeg"`, ...), or the raw FOURCC when unrecognized.
	pub codec: String,
	/// Longer codec-specific detail string (e.g. `"avc1.640028"`).
	pub codec_detail: Option<String>,
	pub width: Option<u32>,
	pub height: Option<u32>,
	pub fps: Option<f64>,
	pub bitrate: Option<u32>,
	pub duration: Option<f64>,
}

/// A probed audio elementary stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioStreamInfo {
	/// Track/stream identifier, unique within the owning [`MediaInfo`].
	pub id: u32,
	/// Short codec tag (`"aac"`, `"mp3"`, `"opus"`, `"pcm_s16le"`, `"wmav2"`, ...).
	pub codec: String,
	/// Longer codec-specific detail string (e.g. `"mp4a.40.2"`).
	pub codec_detail: Option<String>,
	pub channel_count: Option<u16>,
	pub sample_rate: Option<u32>,
	pub bits_per_sample: Option<u16>,
	pub bitrate: Option<u32>,
	/// Profile name where the codec has one (`"LC"`, `"Main"`, `"SSR"`, `"LTP"`, `"SBR"`).
	pub profile: Option<String>,
	pub duration: Option<f64>,
	/// `WAVEFORMATEX` fields an ADPCM stream needs beyond the common ones
	/// (`adpcm_ms`/`adpcm_ima`), carried from the source container's format
	/// block so a re-mux reproduces the original block framing exactly.
	pub wave_format_extra: Option<WaveFormatExtra>,
}

/// ADPCM-specific `WAVEFORMATEX` detail: block alignment, samples per block,
/// and (for MS ADPCM) the predictor coefficient table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WaveFormatExtra {
	pub block_align: u16,
	pub samples_per_block: u16,
	/// MS ADPCM predictor coefficient pairs (`iCoef1`, `iCoef2`); empty for
	/// IMA ADPCM, which carries no coefficient table.
	pub coefficients: Vec<(i16, i16)>,
}

/// File Properties fields lofted out of an ASF header, exposed for callers that
/// need ASF-specific detail `probe` alone wouldn't surface.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AsfFileProperties {
	pub play_duration_hns: u64,
	pub send_duration_hns: u64,
	pub preroll_ms: u64,
	pub max_bitrate: u32,
	pub broadcast: bool,
	pub seekable: bool,
	pub min_packet_size: u32,
	pub max_packet_size: u32,
}

/// Per-stream ASF detail, keyed by stream number, exposed alongside `audioStreams`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AsfStreamDetail {
	pub codec_private: Vec<u8>,
	pub extended_stream_properties: Option<Vec<u8>>,
}

/// Container-specific extension data that doesn't belong in the generic model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContainerExtensions {
	pub asf_file_properties: Option<AsfFileProperties>,
	pub asf_additional_stream_info: HashMap<u8, AsfStreamDetail>,
}

/// The result of [`crate::probe`]: a structured description of a container's
/// elementary streams.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaInfo {
	/// Enumerated container tag, see [`ContainerKind::tag`].
	pub container: String,
	/// Free-form detail about the container (e.g. major brand for MP4, DocType for Matroska).
	pub container_detail: Option<String>,
	pub duration_in_seconds: Option<f64>,
	/// Streams in container declaration order.
	pub video_streams: Vec<VideoStreamInfo>,
	/// Streams in container declaration order.
	pub audio_streams: Vec<AudioStreamInfo>,
	pub extensions: ContainerExtensions,
}

impl MediaInfo {
	pub(crate) fn new(container: ContainerKind) -> Self {
		MediaInfo {
			container: container.tag().to_string(),
			..Default::default()
		}
	}
}

/// Container-specific fields carried alongside a [`Sample`] that only some
/// demuxers populate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleExtra {
	/// `true` when the sample starts a new ASF media object ("keyframe" for audio).
	pub is_keyframe: bool,
	/// ASF: the media object this payload belongs to.
	pub media_object_number: Option<u32>,
	/// ASF: byte offset of this payload within its media object.
	pub offset_into_media_object: Option<u32>,
	/// ASF: the replicated-data block copied verbatim from the source payload.
	pub replicated_data: Vec<u8>,
	/// ASF: the packet's Send Time field, in milliseconds.
	pub packet_send_time: Option<u32>,
	/// ASF: the packet's Duration field, in milliseconds.
	pub packet_duration: Option<u16>,
}

/// One codec access unit emitted by a demuxer and consumed by a muxer.
///
/// `data` is borrowed from the demuxer's internal reservoir only for the
/// duration of the callback; anything that needs to retain it beyond that
/// point must copy it. [`Sample`] itself owns a copy so call sites that do
/// want to hold on to samples (buffering muxers) may do so freely.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
	pub data: Vec<u8>,
	pub track_id: u32,
	/// Presentation time, in seconds when the container's timescale lets us derive
	/// one reliably, otherwise left at `0.0` and the container-native unit is
	/// carried in `extra` instead (ASF).
	pub time: f64,
	pub extra: SampleExtra,
}

impl Sample {
	pub(crate) fn new(track_id: u32, data: Vec<u8>, time: f64) -> Self {
		Sample {
			data,
			track_id,
			time,
			extra: SampleExtra::default(),
		}
	}
}
