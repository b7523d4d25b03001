//! Per-frame music analysis data.
//!
//! The playback side hands over one [`AudioFrame`] per rendered frame. Every
//! field defaults to zero, so a short or missing channel list reads as
//! silence instead of failing.

use serde::{Deserialize, Serialize};

/// Tracker effect currently running on a channel
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActiveEffect {
    #[default]
    None,
    Arpeggio,
    Portamento,
    Vibrato,
    Tremolo,
    VolumeSlide,
    Retrigger,
}

impl ActiveEffect {
    /// Decode a ProTracker/XM style effect command and parameter.
    pub fn from_tracker(command: u8, param: u8) -> Self {
        match command {
            0x0 if param != 0 => Self::Arpeggio,
            0x1 | 0x2 | 0x3 | 0x5 => Self::Portamento,
            0x4 | 0x6 => Self::Vibrato,
            0x7 => Self::Tremolo,
            0xA => Self::VolumeSlide,
            0xE if param >> 4 == 0x9 => Self::Retrigger,
            _ => Self::None,
        }
    }
}

/// Wire form of an effect: its name, or a raw `[command, param]` pair
#[derive(Deserialize)]
#[serde(untagged)]
enum EffectRepr {
    Named(ActiveEffect),
    Tracker([u8; 2]),
}

fn effect_or_tracker<'de, D: serde::Deserializer<'de>>(deserializer: D) -> Result<ActiveEffect, D::Error> {
    Ok(match EffectRepr::deserialize(deserializer)? {
        EffectRepr::Named(effect) => effect,
        EffectRepr::Tracker([command, param]) => ActiveEffect::from_tracker(command, param),
    })
}

/// Analysis of one playback channel
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelData {
    /// Dominant frequency in Hz (0 when silent)
    pub frequency: f32,
    /// Channel volume, 0..1
    pub volume: f32,
    /// Strength of a note trigger this frame, 0..1 (0 = no trigger)
    pub trigger_strength: f32,
    /// Stereo pan, -1 (left) .. 1 (right)
    pub pan: f32,
    /// Effect name, or a tracker `[command, param]` pair when parsed
    #[serde(deserialize_with = "effect_or_tracker")]
    pub active_effect: ActiveEffect,
    /// Note number of the last trigger (60 = C4)
    pub note: u8,
}

impl ChannelData {
    /// True when a note fired on this channel this frame
    pub fn triggered(&self) -> bool {
        self.trigger_strength > 0.0
    }

    pub fn is_silent(&self) -> bool {
        self.volume <= f32::EPSILON
    }
}

/// Per-frame music feed
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioFrame {
    pub channels: Vec<ChannelData>,
    /// Kick drum trigger, 0..1
    pub kick_trigger: f32,
    /// How strongly the current pattern swings, 0..1
    pub groove_amount: f32,
    /// Position within the current beat, 0..1
    pub beat_phase: f32,
}

impl AudioFrame {
    /// A silent frame
    pub fn silent() -> Self {
        Self::default()
    }

    /// Channel `index`, or a zeroed channel when it does not exist
    pub fn channel(&self, index: usize) -> ChannelData {
        self.channels.get(index).copied().unwrap_or_default()
    }

    /// Mean volume across all channels
    pub fn average_volume(&self) -> f32 {
        if self.channels.is_empty() {
            return 0.0;
        }
        self.channels.iter().map(|c| c.volume).sum::<f32>() / self.channels.len() as f32
    }

    /// Loudest channel volume
    pub fn peak_volume(&self) -> f32 {
        self.channels.iter().map(|c| c.volume).fold(0.0, f32::max)
    }

    /// Volume of the lowest-pitched sounding channel (bass line)
    pub fn bass_volume(&self) -> f32 {
        self.channels
            .iter()
            .filter(|c| c.frequency > 0.0 && !c.is_silent())
            .min_by(|a, b| a.frequency.total_cmp(&b.frequency))
            .map(|c| c.volume)
            .unwrap_or(0.0)
    }

    /// Volume-weighted mean pan
    pub fn pan_activity(&self) -> f32 {
        let total: f32 = self.channels.iter().map(|c| c.volume).sum();
        if total <= f32::EPSILON {
            return 0.0;
        }
        self.channels.iter().map(|c| c.pan * c.volume).sum::<f32>() / total
    }

    /// Parse one frame from a JSON line of an audio feed dump
    pub fn from_json_line(line: &str) -> crate::core::Result<Self> {
        serde_json::from_str(line)
            .map_err(|e| crate::core::Error::Audio(format!("bad frame: {e}")))
    }
}
