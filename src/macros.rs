// Shorthand for `return Err(crate::error::Error::Malformed { .. })`.
//
// Usage:
// - malformed!("mp4", "missing stsd atom")
macro_rules! malformed {
	($container:literal, $($arg:tt)*) => {
		return Err(crate::error::Error::malformed($container, format!($($arg)*)))
	};
}

// Shorthand for `return Err(crate::error::Error::EndOfStream(..))`.
macro_rules! eof {
	($($arg:tt)*) => {
		return Err(crate::error::Error::EndOfStream(format!($($arg)*)))
	};
}

pub(crate) use {eof, malformed};
