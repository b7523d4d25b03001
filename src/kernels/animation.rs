//! Batched music-driven animation kernels.
//!
//! Each kernel walks a packed array of [`AnimationEntry`] records and writes
//! one [`AnimationOutput`] per entry. Stateful kernels (snare snap, cymbal
//! shake, panning bob, spirit fade) persist their state in `param1`/`param2`
//! of the entry, so the caller must keep the entry array between frames.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// Per-object kernel input (24 bytes)
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct AnimationEntry {
    /// Random phase offset of the object
    pub offset: f32,
    pub intensity: f32,
    /// Rest height of the object
    pub original_y: f32,
    pub wobble_boost: f32,
    /// Kernel-specific input or persisted state
    pub param1: f32,
    /// Kernel-specific input or persisted state
    pub param2: f32,
}

/// Per-object kernel output (16 bytes). Meaning of each lane depends on the
/// kernel, see [`BatchedAnimation`].
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct AnimationOutput(pub [f32; 4]);

/// Animations evaluated through the batch kernels. Discriminants are the
/// wire tags used by the animation-type metadata.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum BatchedAnimation {
    /// out: [pos_y, rot_x (snap), 0, 0]; state: param1 = snap
    SnareSnap = 13,
    /// out: [stretch_y, width_xz, 0, 0]
    Accordion = 14,
    /// in: param1 = branch index; out: [base_rot_y, branch_rot_z, 0, 0]
    FiberWhip = 15,
    /// out: [rot_y, y_offset, scale, 0]
    SpiralWave = 16,
    /// out: [rot_x, rot_y, shake_speed, 0]
    VibratoShake = 17,
    /// out: [pulse_scale, opacity, emission, 0]
    TremoloPulse = 18,
    /// state: param1 = rot_z, param2 = rot_x; out: [rot_z, rot_x, scale, 0]
    CymbalShake = 19,
    /// in: param1 = pan bias; state: param2 = bob; out: [pos_y, rot_z, glow, 0]
    PanningBob = 20,
    /// state: param1 = opacity, param2 = flee speed; out: [opacity, pos_y, flee_speed, 0]
    SpiritFade = 21,
}

impl BatchedAnimation {
    pub const ALL: [Self; 9] = [
        Self::SnareSnap,
        Self::Accordion,
        Self::FiberWhip,
        Self::SpiralWave,
        Self::VibratoShake,
        Self::TremoloPulse,
        Self::CymbalShake,
        Self::PanningBob,
        Self::SpiritFade,
    ];

    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.tag() == tag)
    }
}

/// Global inputs shared by a whole batch
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BatchParams {
    pub time: f32,
    pub beat_phase: f32,
    pub kick: f32,
    pub groove: f32,
    /// Kernel-specific audio input (snare trigger, lead volume, vibrato
    /// depth, tremolo depth, high band, pan activity or volume)
    pub audio_param: f32,
}

/// Route a batch to its kernel.
///
/// Processes `min(entries.len(), outputs.len())` objects. Intensity for the
/// groove-scaled kernels is `1 + 5 * groove`.
pub fn process_batch(
    kind: BatchedAnimation,
    entries: &mut [AnimationEntry],
    outputs: &mut [AnimationOutput],
    params: BatchParams,
) {
    let n = entries.len().min(outputs.len());
    let (entries, outputs) = (&mut entries[..n], &mut outputs[..n]);
    let intensity = 1.0 + params.groove * 5.0;
    let t = params.time;
    let audio = params.audio_param;

    match kind {
        BatchedAnimation::SnareSnap => snare_snap(entries, outputs, audio),
        BatchedAnimation::Accordion => accordion(entries, outputs, t, intensity),
        BatchedAnimation::FiberWhip => fiber_whip(entries, outputs, t, audio, true),
        BatchedAnimation::SpiralWave => spiral_wave(entries, outputs, t, intensity, params.groove),
        BatchedAnimation::VibratoShake => vibrato_shake(outputs, t, audio),
        BatchedAnimation::TremoloPulse => tremolo_pulse(entries, outputs, t, audio, intensity),
        BatchedAnimation::CymbalShake => cymbal_shake(entries, outputs, t, audio),
        BatchedAnimation::PanningBob => panning_bob(entries, outputs, t, audio, intensity),
        BatchedAnimation::SpiritFade => spirit_fade(entries, outputs, t, audio),
    }
}

/// Snap to 1 on a snare hit above 0.2, otherwise relax by 0.1 per frame
pub fn snare_snap(entries: &mut [AnimationEntry], outputs: &mut [AnimationOutput], snare: f32) {
    for (e, out) in entries.iter_mut().zip(outputs.iter_mut()) {
        let mut snap = e.param1;
        if snare > 0.2 {
            if snap < 0.2 {
                snap = 1.0;
            }
        } else {
            snap = (snap - 0.1).max(0.0);
        }
        e.param1 = snap;
        *out = AnimationOutput([0.0, snap, 0.0, 0.0]);
    }
}

/// Volume-preserving vertical stretch
pub fn accordion(entries: &[AnimationEntry], outputs: &mut [AnimationOutput], time: f32, intensity: f32) {
    for (e, out) in entries.iter().zip(outputs.iter_mut()) {
        let raw = ((time + e.offset) * 10.0).sin();
        let stretch_y = 1.0 + raw.max(0.0) * 0.31 * intensity;
        let width_xz = 1.0 / stretch_y.sqrt();
        *out = AnimationOutput([stretch_y, width_xz, 0.0, 0.0]);
    }
}

/// Branch whip driven by the lead channel volume
pub fn fiber_whip(
    entries: &[AnimationEntry],
    outputs: &mut [AnimationOutput],
    time: f32,
    lead_volume: f32,
    active: bool,
) {
    let whip = lead_volume * 2.0;
    for (e, out) in entries.iter().zip(outputs.iter_mut()) {
        let base_rot_y = (time * 0.5 + e.offset).sin() * 0.1;
        let child_offset = e.param1 * 0.5;
        let mut branch_rot_z = std::f32::consts::FRAC_PI_4 + (time * 2.0 + child_offset).sin() * 0.1;
        if active {
            branch_rot_z += (time * 10.0 + child_offset).sin() * whip;
        }
        *out = AnimationOutput([base_rot_y, branch_rot_z, 0.0, 0.0]);
    }
}

/// Rotating wave, each successive entry half a radian behind
pub fn spiral_wave(
    entries: &[AnimationEntry],
    outputs: &mut [AnimationOutput],
    time: f32,
    intensity: f32,
    groove: f32,
) {
    for (i, (e, out)) in entries.iter().zip(outputs.iter_mut()).enumerate() {
        let t = time + e.offset + i as f32 * 0.5;
        let rot_y = (t * 2.0).sin() * 0.2 * intensity;
        let y_offset = (t * 3.0).sin() * 0.1 * (1.0 + groove);
        let scale = 1.0 + (t * 4.0).sin() * 0.05 * intensity;
        *out = AnimationOutput([rot_y, y_offset, scale, 0.0]);
    }
}

/// Fast head shake that speeds up and widens with vibrato depth
pub fn vibrato_shake(outputs: &mut [AnimationOutput], time: f32, vibrato: f32) {
    let speed = 50.0 + vibrato * 100.0;
    let amount = 0.05 + vibrato * 0.25;
    for (i, out) in outputs.iter_mut().enumerate() {
        let phase = i as f32 * 0.5;
        let rot_x = -std::f32::consts::FRAC_PI_2 + (time * speed + phase).sin() * amount;
        let rot_y = (time * speed * 1.3 + phase).cos() * amount * 0.8;
        *out = AnimationOutput([rot_x, rot_y, speed, 0.0]);
    }
}

/// Scale/opacity pulse that follows tremolo depth
pub fn tremolo_pulse(
    entries: &[AnimationEntry],
    outputs: &mut [AnimationOutput],
    time: f32,
    tremolo: f32,
    intensity: f32,
) {
    let speed = 8.0 + tremolo * 15.0;
    let amount = 0.1 + tremolo * 0.3;
    let emission = 0.3 + tremolo * 0.7;
    for (e, out) in entries.iter().zip(outputs.iter_mut()) {
        let s = (time * speed + e.offset).sin();
        let pulse = 1.0 + s * amount;
        let opacity = 0.7 + s * 0.2 * intensity;
        *out = AnimationOutput([pulse, opacity, emission, 0.0]);
    }
}

/// Jitter on high-band energy, easing back to rest when quiet
pub fn cymbal_shake(entries: &mut [AnimationEntry], outputs: &mut [AnimationOutput], time: f32, high: f32) {
    for (i, (e, out)) in entries.iter_mut().zip(outputs.iter_mut()).enumerate() {
        let (mut rot_z, mut rot_x) = (e.param1, e.param2);
        if high > 0.05 {
            let twitch = high * 0.2;
            let seed = time * 10.0 + i as f32;
            rot_z = seed.sin() * twitch;
            rot_x = (seed * 1.3).cos() * twitch;
        } else {
            rot_z *= 0.9;
            rot_x *= 0.9;
        }
        e.param1 = rot_z;
        e.param2 = rot_x;

        let scale = if high > 0.4 { 1.0 + (high - 0.4) * 0.5 } else { 1.0 };
        *out = AnimationOutput([rot_z, rot_x, scale, 0.0]);
    }
}

/// Float up with stereo activity, leaning towards the object's pan side
pub fn panning_bob(
    entries: &mut [AnimationEntry],
    outputs: &mut [AnimationOutput],
    time: f32,
    pan_activity: f32,
    intensity: f32,
) {
    for (e, out) in entries.iter_mut().zip(outputs.iter_mut()) {
        let bob = e.param2 + (pan_activity - e.param2) * 0.1;
        e.param2 = bob;

        let height = bob * 1.5 * intensity;
        let pos_y = (time * 2.0 + e.offset).sin() * 0.1 + height;
        let rot_z = e.param1 * height * 0.2;
        let glow = 0.6 + height * 0.8;
        *out = AnimationOutput([pos_y, rot_z, glow, 0.0]);
    }
}

/// Spirits show up in quiet passages and flee when the music gets loud
pub fn spirit_fade(entries: &mut [AnimationEntry], outputs: &mut [AnimationOutput], time: f32, volume: f32) {
    const QUIET: f32 = 0.1;
    for (e, out) in entries.iter_mut().zip(outputs.iter_mut()) {
        let mut opacity = e.param1;
        let mut flee = e.param2;

        let target = if volume < QUIET {
            flee = (flee - 0.01).max(0.0);
            0.8
        } else {
            if opacity > 0.1 {
                flee = (flee + 0.01).min(0.2);
            }
            0.0
        };

        opacity += (target - opacity) * 0.05;
        e.param1 = opacity;
        e.param2 = flee;

        let pos_y = e.original_y + (time * 1.5 + e.offset).sin() * 0.2;
        *out = AnimationOutput([opacity, pos_y, flee, 0.0]);
    }
}

/// Result of one arpeggio unfurl step
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ArpeggioStep {
    /// Number of fronds that should be open
    pub target: f32,
    /// Smoothed open amount, chasing `target`
    pub unfurl: f32,
}

/// Advance the arpeggio unfurl state by one frame.
///
/// While the arpeggio effect is active each new note (rising edge of the
/// trigger) opens one more step, capped at `max_steps`. When it stops the
/// target collapses to 0. The open amount moves 30% of the way per frame
/// when opening and 5% when closing.
pub fn arpeggio_step(
    current_unfurl: f32,
    current_target: f32,
    last_trigger: bool,
    arpeggio_active: bool,
    note_trigger: bool,
    max_steps: f32,
) -> ArpeggioStep {
    let mut target = current_target;
    if arpeggio_active {
        if note_trigger && !last_trigger {
            target = (target + 1.0).min(max_steps);
        }
    } else {
        target = 0.0;
    }

    let speed = if target > current_unfurl { 0.3 } else { 0.05 };
    ArpeggioStep {
        target,
        unfurl: current_unfurl + (target - current_unfurl) * speed,
    }
}
