//! Music playback feed and audio-reactivity helpers.
//!
//! The flora layer never decodes audio itself. It receives an
//! [`AudioFrame`] per rendered frame from the playback side and maps its
//! values onto colours, scales and emission.

pub mod feed;
pub mod frame;
pub mod palette;
pub mod reactive;

pub use feed::AudioFeed;
pub use frame::{ActiveEffect, AudioFrame, ChannelData};
pub use palette::{CyclicRamp, Lerp, NotePalette};
pub use reactive::{Envelope, TriggerEdge, decay, pitch_band};
