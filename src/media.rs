#[cfg(feature = "media-ffmpeg")]
pub(crate) mod ffmpeg;
pub(crate) mod sampler;
pub(crate) mod source;
