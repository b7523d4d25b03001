//! Animation driver for loose (non-batched) objects.
//!
//! Simple animations are evaluated inline per object. Music-driven ones are
//! packed per kind into dense [`AnimationEntry`] arrays and run through the
//! batch kernels; kernels that keep state write it back into the entry, and
//! the pool keeps entry and id together across removals.

use std::collections::HashMap;
use std::f32::consts::{FRAC_PI_2, FRAC_PI_4};

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use super::{AnimationKind, FoliageObject};
use crate::audio::{pitch_band, ActiveEffect, AudioFrame};
use crate::kernels::{process_batch, AnimationEntry, AnimationOutput, BatchParams, BatchedAnimation};
use crate::pool::{DenseInstancePool, FoliageId};

/// Inline-animated object record
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
struct SimpleEntry {
    tag: u32,
    phase: f32,
}

fn loudest(values: impl Iterator<Item = f32>) -> f32 {
    values.fold(0.0, f32::max)
}

/// Kernel input picked from the frame for a batched animation
pub fn audio_param(kind: BatchedAnimation, audio: &AudioFrame) -> f32 {
    let channels = || audio.channels.iter().filter(|c| !c.is_silent());

    match kind {
        BatchedAnimation::SnareSnap => loudest(channels()
            .filter(|c| (0.35..0.7).contains(&pitch_band(c.frequency)))
            .map(|c| c.trigger_strength)),
        BatchedAnimation::FiberWhip => channels()
            .max_by(|a, b| a.frequency.total_cmp(&b.frequency))
            .map_or(0.0, |c| c.volume),
        BatchedAnimation::VibratoShake => loudest(channels()
            .filter(|c| c.active_effect == ActiveEffect::Vibrato)
            .map(|c| c.volume)),
        BatchedAnimation::TremoloPulse => loudest(channels()
            .filter(|c| c.active_effect == ActiveEffect::Tremolo)
            .map(|c| c.volume)),
        BatchedAnimation::CymbalShake => loudest(channels()
            .filter(|c| pitch_band(c.frequency) >= 0.7)
            .map(|c| c.volume)),
        BatchedAnimation::PanningBob => audio.pan_activity().abs(),
        BatchedAnimation::SpiritFade => audio.average_volume(),
        BatchedAnimation::Accordion | BatchedAnimation::SpiralWave => 0.0,
    }
}

pub struct AnimationDriver {
    capacity: u32,
    simple: DenseInstancePool<SimpleEntry>,
    batched: HashMap<BatchedAnimation, DenseInstancePool<AnimationEntry>>,
    outputs: Vec<AnimationOutput>,
}

impl AnimationDriver {
    pub fn new(capacity: u32) -> Self {
        Self {
            capacity,
            simple: DenseInstancePool::new("loose_simple", capacity),
            batched: HashMap::new(),
            outputs: Vec::new(),
        }
    }

    /// Tracked objects across all animation kinds
    pub fn len(&self) -> u32 {
        self.simple.count() + self.batched.values().map(|p| p.count()).sum::<u32>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: FoliageId) -> bool {
        self.simple.contains(id) || self.batched.values().any(|p| p.contains(id))
    }

    /// Start animating an object. Returns false for `AnimationKind::None`
    /// or when the driver is full.
    pub fn track(&mut self, id: FoliageId, object: &FoliageObject) -> bool {
        if object.animation == AnimationKind::None {
            return false;
        }
        // a kind change moves the object between pools
        self.remove(id);
        if self.len() >= self.capacity {
            log::warn!("Animation driver full ({} objects), {} stays static", self.capacity, id);
            return false;
        }

        match object.animation.batched() {
            Some(kind) => {
                let capacity = self.capacity;
                let pool = self
                    .batched
                    .entry(kind)
                    .or_insert_with(|| DenseInstancePool::new("loose_batched", capacity));
                pool.register(id, initial_entry(kind, object)).is_some()
            }
            None => {
                let entry = SimpleEntry { tag: object.animation.tag() as u32, phase: object.phase };
                self.simple.register(id, entry).is_some()
            }
        }
    }

    pub fn remove(&mut self, id: FoliageId) -> bool {
        self.simple.remove(id) || self.batched.values_mut().any(|p| p.remove(id))
    }

    /// Animate every tracked object in `objects`
    pub fn update(
        &mut self,
        objects: &mut HashMap<FoliageId, FoliageObject>,
        audio: &AudioFrame,
        time: f32,
        _dt: f32,
    ) {
        let kick = audio.kick_trigger.clamp(0.0, 1.0);
        let groove = audio.groove_amount.clamp(0.0, 1.0);

        for (slot, entry) in self.simple.live().iter().enumerate() {
            let Some(obj) = self.simple.id_at(slot as u32).and_then(|id| objects.get_mut(&id)) else {
                continue;
            };
            let Some(kind) = AnimationKind::from_tag(entry.tag as u8) else {
                continue;
            };
            apply_simple(kind, obj, entry.phase, time, kick, groove);
        }

        for kind in BatchedAnimation::ALL {
            let Some(pool) = self.batched.get_mut(&kind) else {
                continue;
            };
            if pool.is_empty() {
                continue;
            }

            // rest height may have moved since the entry was packed
            for slot in 0..pool.count() {
                if let Some(obj) = pool.id_at(slot).and_then(|id| objects.get(&id)) {
                    let original_y = obj.original_y;
                    pool.modify(slot, |e| e.original_y = original_y);
                }
            }

            let params = BatchParams {
                time,
                beat_phase: audio.beat_phase,
                kick,
                groove,
                audio_param: audio_param(kind, audio),
            };
            self.outputs.clear();
            self.outputs.resize(pool.count() as usize, AnimationOutput::default());
            process_batch(kind, pool.live_mut(), &mut self.outputs, params);

            for (slot, out) in self.outputs.iter().enumerate() {
                if let Some(obj) = pool.id_at(slot as u32).and_then(|id| objects.get_mut(&id)) {
                    apply_batched(kind, obj, out);
                }
            }
        }
    }
}

fn initial_entry(kind: BatchedAnimation, object: &FoliageObject) -> AnimationEntry {
    let param1 = match kind {
        // branch index spreads the whip phase
        BatchedAnimation::FiberWhip => object.phase.rem_euclid(1.0) * 8.0,
        // lean towards the side of the world the object stands on
        BatchedAnimation::PanningBob => (object.position.x / 10.0).clamp(-1.0, 1.0),
        _ => 0.0,
    };
    AnimationEntry {
        offset: object.phase,
        intensity: 1.0,
        original_y: object.original_y,
        wobble_boost: 0.0,
        param1,
        param2: 0.0,
    }
}

fn apply_simple(kind: AnimationKind, obj: &mut FoliageObject, phase: f32, time: f32, kick: f32, groove: f32) {
    let rest = obj.original_y;
    match kind {
        AnimationKind::Sway => {
            obj.pose.euler.z = (time * 1.5 + phase).sin() * 0.1 * (1.0 + groove);
        }
        AnimationKind::Bounce => {
            obj.position.y = rest + (time * 3.0 + phase).sin().abs() * 0.2 * (1.0 + kick);
        }
        AnimationKind::Wobble => {
            let t = time * 2.0 + phase;
            obj.pose.euler.x = t.sin() * 0.08;
            obj.pose.euler.z = t.cos() * 0.08;
        }
        AnimationKind::Hop => {
            obj.position.y = rest + (time * 4.0 + phase).sin().max(0.0) * 0.3 * (0.5 + kick);
        }
        AnimationKind::Gentle => {
            obj.pose.euler.y = (time * 0.5 + phase).sin() * 0.05;
        }
        AnimationKind::Float => {
            obj.position.y = rest + (time + phase).sin() * 0.3;
        }
        _ => {}
    }
}

fn apply_batched(kind: BatchedAnimation, obj: &mut FoliageObject, out: &AnimationOutput) {
    let [a, b, c, _] = out.0;
    let rest = obj.original_y;
    let pose = &mut obj.pose;
    match kind {
        BatchedAnimation::SnareSnap => {
            pose.euler.x = -b * 0.4;
        }
        BatchedAnimation::Accordion => {
            pose.scale = Vec3::new(b, a, b);
        }
        BatchedAnimation::FiberWhip => {
            pose.euler.y = a;
            pose.euler.z = b - FRAC_PI_4;
        }
        BatchedAnimation::SpiralWave => {
            pose.euler.y = a;
            pose.scale = Vec3::splat(c);
            obj.position.y = rest + b;
        }
        BatchedAnimation::VibratoShake => {
            // kernel output is centred on a head facing straight up
            pose.euler.x = a + FRAC_PI_2;
            pose.euler.y = b;
        }
        BatchedAnimation::TremoloPulse => {
            pose.scale = Vec3::splat(a);
            pose.opacity = b.clamp(0.0, 1.0);
        }
        BatchedAnimation::CymbalShake => {
            pose.euler.z = a;
            pose.euler.x = b;
            pose.scale = Vec3::splat(c);
        }
        BatchedAnimation::PanningBob => {
            pose.euler.z = b;
            obj.position.y = rest + a;
        }
        BatchedAnimation::SpiritFade => {
            pose.opacity = a.clamp(0.0, 1.0);
            obj.position.y = b;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::ChannelData;
    use crate::flora::FoliageKind;

    fn world_with(objects: &[(u64, FoliageObject)]) -> (AnimationDriver, HashMap<FoliageId, FoliageObject>) {
        let mut driver = AnimationDriver::new(16);
        let mut map = HashMap::new();
        for (id, obj) in objects {
            driver.track(FoliageId(*id), obj);
            map.insert(FoliageId(*id), obj.clone());
        }
        (driver, map)
    }

    fn grass(animation: AnimationKind, y: f32) -> FoliageObject {
        FoliageObject::new(FoliageKind::Grass, Vec3::new(0.0, y, 0.0)).with_animation(animation)
    }

    #[test]
    fn test_static_objects_not_tracked() {
        let mut driver = AnimationDriver::new(4);
        assert!(!driver.track(FoliageId(1), &grass(AnimationKind::None, 0.0)));
        assert!(driver.is_empty());
    }

    #[test]
    fn test_float_moves_relative_to_rest() {
        let (mut driver, mut objects) = world_with(&[(1, grass(AnimationKind::Float, 2.0))]);
        driver.update(&mut objects, &AudioFrame::silent(), std::f32::consts::FRAC_PI_2, 0.016);
        assert!((objects[&FoliageId(1)].position.y - 2.3).abs() < 1e-5);
        assert_eq!(objects[&FoliageId(1)].original_y, 2.0);
    }

    #[test]
    fn test_spirit_fade_state_persists() {
        let spirit = FoliageObject::new(FoliageKind::Tree, Vec3::new(0.0, 1.0, 0.0))
            .with_animation(AnimationKind::SpiritFade);
        let (mut driver, mut objects) = world_with(&[(5, spirit)]);
        for i in 0..100 {
            driver.update(&mut objects, &AudioFrame::silent(), i as f32 * 0.016, 0.016);
        }
        // quiet: spirits fade in towards 0.8 across frames
        let opacity = objects[&FoliageId(5)].pose.opacity;
        assert!(opacity > 0.7 && opacity <= 0.8, "opacity {opacity}");
    }

    #[test]
    fn test_accordion_scales_pose() {
        let (mut driver, mut objects) = world_with(&[(2, grass(AnimationKind::Accordion, 0.0).with_phase(0.1))]);
        driver.update(&mut objects, &AudioFrame::silent(), 0.0, 0.016);
        let scale = objects[&FoliageId(2)].pose.scale;
        assert!(scale.y > 1.0);
        assert!((scale.y * scale.x * scale.z - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_kind_change_moves_pools() {
        let mut driver = AnimationDriver::new(4);
        let obj = grass(AnimationKind::Sway, 0.0);
        assert!(driver.track(FoliageId(1), &obj));
        assert!(driver.track(FoliageId(1), &obj.clone().with_animation(AnimationKind::CymbalShake)));
        assert_eq!(driver.len(), 1);
        assert!(driver.remove(FoliageId(1)));
        assert!(!driver.contains(FoliageId(1)));
        assert!(!driver.remove(FoliageId(1)));
    }

    #[test]
    fn test_capacity_shared_across_kinds() {
        let mut driver = AnimationDriver::new(2);
        assert!(driver.track(FoliageId(1), &grass(AnimationKind::Sway, 0.0)));
        assert!(driver.track(FoliageId(2), &grass(AnimationKind::SnareSnap, 0.0)));
        assert!(!driver.track(FoliageId(3), &grass(AnimationKind::Hop, 0.0)));
        assert_eq!(driver.len(), 2);
    }

    #[test]
    fn test_missing_object_skipped() {
        let (mut driver, mut objects) = world_with(&[(1, grass(AnimationKind::Bounce, 0.0))]);
        objects.clear();
        driver.update(&mut objects, &AudioFrame::silent(), 1.0, 0.016);
        assert_eq!(driver.len(), 1);
    }

    #[test]
    fn test_audio_params() {
        let frame = AudioFrame {
            channels: vec![
                ChannelData { frequency: 60.0, volume: 0.9, ..Default::default() },
                ChannelData { frequency: 440.0, volume: 0.5, trigger_strength: 0.8, active_effect: ActiveEffect::Vibrato, ..Default::default() },
                ChannelData { frequency: 4000.0, volume: 0.3, active_effect: ActiveEffect::Tremolo, ..Default::default() },
            ],
            ..Default::default()
        };
        assert_eq!(audio_param(BatchedAnimation::SnareSnap, &frame), 0.8);
        assert_eq!(audio_param(BatchedAnimation::FiberWhip, &frame), 0.3);
        assert_eq!(audio_param(BatchedAnimation::VibratoShake, &frame), 0.5);
        assert_eq!(audio_param(BatchedAnimation::TremoloPulse, &frame), 0.3);
        assert_eq!(audio_param(BatchedAnimation::CymbalShake, &frame), 0.3);
        assert_eq!(audio_param(BatchedAnimation::Accordion, &AudioFrame::silent()), 0.0);
    }
}
