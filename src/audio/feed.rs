//! Audio feeds for headless runs: a synthetic groove or a recorded dump.

use std::io::BufRead;
use std::path::Path;

use super::{ActiveEffect, AudioFrame, ChannelData};
use crate::core::{Error, Result};

/// Tempo of the synthetic feed
pub const SYNTHETIC_BPM: f32 = 120.0;

/// Source of one [`AudioFrame`] per simulated frame
pub enum AudioFeed {
    /// Four-channel loop: bass, arpeggiated lead, tremolo pad, sliding hats
    Synthetic,
    /// Recorded frames, replayed in a loop
    Recorded(Vec<AudioFrame>),
}

impl AudioFeed {
    /// Read a JSON-lines dump, one frame per line. Blank lines are skipped.
    pub fn load_jsonl(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)?;
        let mut frames = Vec::new();

        for (n, line) in std::io::BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let frame = AudioFrame::from_json_line(&line)
                .map_err(|e| Error::Audio(format!("{}:{}: {}", path.display(), n + 1, e)))?;
            frames.push(frame);
        }

        if frames.is_empty() {
            return Err(Error::Audio(format!("{}: no frames", path.display())));
        }
        log::info!("Loaded {} audio frames from {}", frames.len(), path.display());
        Ok(Self::Recorded(frames))
    }

    /// Frame for simulation step `index` at `time` seconds. An empty
    /// recording plays silence.
    pub fn frame(&self, index: u64, time: f32) -> AudioFrame {
        match self {
            Self::Synthetic => synthetic_frame(time),
            Self::Recorded(frames) if frames.is_empty() => AudioFrame::silent(),
            Self::Recorded(frames) => frames[(index % frames.len() as u64) as usize].clone(),
        }
    }
}

/// Deterministic test groove at [`SYNTHETIC_BPM`]
pub fn synthetic_frame(time: f32) -> AudioFrame {
    let beats = time * SYNTHETIC_BPM / 60.0;
    let beat_phase = beats.fract();
    let bar = (beats / 4.0) as u32;
    let sixteenth = (beats * 4.0).fract();

    let kick_trigger = if beat_phase < 0.1 { 1.0 - beat_phase * 10.0 } else { 0.0 };
    let groove_amount = 0.5 + 0.5 * (time * 0.25).sin();

    // arpeggio on odd bars, notes cycling through a minor triad
    let arp_on = bar % 2 == 1;
    let arp_note = [57u8, 60, 64][((beats * 4.0) as u32 % 3) as usize];

    let channels = vec![
        ChannelData {
            frequency: 55.0,
            volume: 0.6 + 0.3 * (time * 0.5).sin().abs(),
            trigger_strength: kick_trigger,
            pan: 0.0,
            active_effect: ActiveEffect::None,
            note: 33,
        },
        ChannelData {
            frequency: 440.0,
            volume: 0.5,
            trigger_strength: if sixteenth < 0.25 { 0.8 } else { 0.0 },
            pan: (time * 0.7).sin() * 0.6,
            active_effect: if arp_on { ActiveEffect::Arpeggio } else { ActiveEffect::None },
            note: arp_note,
        },
        ChannelData {
            frequency: 220.0,
            volume: 0.35,
            trigger_strength: 0.0,
            pan: -0.4,
            active_effect: ActiveEffect::Tremolo,
            note: 45,
        },
        ChannelData {
            frequency: 6000.0,
            volume: 0.25,
            trigger_strength: if beat_phase > 0.5 && beat_phase < 0.55 { 0.6 } else { 0.0 },
            pan: (time * 0.3).cos(),
            active_effect: if bar % 4 == 3 { ActiveEffect::Portamento } else { ActiveEffect::None },
            note: 96,
        },
    ];

    AudioFrame { channels, kick_trigger, groove_amount, beat_phase }
}
