/// Errors produced while probing a container or extracting an audio stream from it.
///
/// Every variant is terminal: the engine never retries internally, it is up to the
/// caller to decide whether to fall back to another prober or surface the failure.
#[derive(thiserror::Error, Debug)]
pub enum Error {
	/// The input didn't match any known container magic, or the container/codec
	/// combination has no extraction path at all.
	#[error("unsupported format: {0}")]
	UnsupportedFormat(String),

	/// The container was recognized but the audio codec inside it cannot be
	/// reframed into an output container (e.g. AAC inside AVI).
	#[error("unsupported codec: {0}")]
	UnsupportedCodec(String),

	/// Container magic was present but the structure that followed was invalid.
	#[error("malformed {container}: {reason}")]
	Malformed {
		/// The container being parsed when the problem was found.
		container: &'static str,
		/// Human-readable description of what was wrong.
		reason: String,
	},

	/// The input closed before a required section had been fully read.
	#[error("end of stream while reading {0}")]
	EndOfStream(String),

	/// `trackId` or `streamIndex` did not resolve to an audio stream.
	#[error("{0}")]
	NotFound(String),

	/// An ADTS sampling-frequency-index lookup failed for the given rate.
	#[error("sample rate {0} Hz has no ADTS sampling-frequency-index")]
	UnsupportedSampleRate(u32),

	/// An ASF payload is larger than the fixed packet size can hold.
	#[error("payload of {payload_len} bytes does not fit in a {packet_size}-byte ASF packet")]
	FragmentationUnsupported {
		/// Size of the offending payload, in bytes.
		payload_len: usize,
		/// Fixed packet size chosen for the output.
		packet_size: usize,
	},

	/// A wrapped I/O error from the input source or output sink.
	#[error(transparent)]
	Io(#[from] std::io::Error),
}

/// Coarse classification of [`Error`], useful for logging without matching on the
/// full variant (which carries heap-allocated context).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
	UnsupportedFormat,
	UnsupportedCodec,
	Malformed,
	EndOfStream,
	NotFound,
	UnsupportedSampleRate,
	FragmentationUnsupported,
	Io,
}

impl Error {
	/// `true` for the class of errors that mean "this prober doesn't understand the
	/// input", as opposed to "the input is broken". Callers probing with several
	/// engines in sequence should only fall through to the next one on `true`.
	#[must_use]
	pub fn is_unsupported_format(&self) -> bool {
		matches!(self, Error::UnsupportedFormat(_))
	}

	/// The coarse [`ErrorKind`] for this error.
	#[must_use]
	pub fn kind(&self) -> ErrorKind {
		match self {
			Error::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
			Error::UnsupportedCodec(_) => ErrorKind::UnsupportedCodec,
			Error::Malformed { .. } => ErrorKind::Malformed,
			Error::EndOfStream(_) => ErrorKind::EndOfStream,
			Error::NotFound(_) => ErrorKind::NotFound,
			Error::UnsupportedSampleRate(_) => ErrorKind::UnsupportedSampleRate,
			Error::FragmentationUnsupported { .. } => ErrorKind::FragmentationUnsupported,
			Error::Io(_) => ErrorKind::Io,
		}
	}

	pub(crate) fn malformed(container: &'static str, reason: impl Into<String>) -> Self {
		Error::Malformed {
			container,
			reason: reason.into(),
		}
	}
}

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
