//! Audio constants shared by the endpointing pipeline.

/// Sample rate all endpointing runs at (Hz).
pub const SAMPLE_RATE_HZ: u32 = 16_000;

/// Frame duration in milliseconds. 30 ms is the largest window the WebRTC
/// classifier accepts.
pub const FRAME_DURATION_MS: u32 = 30;

/// Frame size in samples at 16 kHz / 30 ms.
pub const FRAME_SIZE_SAMPLES: usize = 480;

/// Mono capture only.
pub const CHANNELS_MONO: u16 = 1;

/// Upper bound for the voice debounce counter.
pub const DEBOUNCE_CEILING: u8 = 10;
