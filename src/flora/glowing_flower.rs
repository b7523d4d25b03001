//! Glowing flower batcher: emission follows the bound channel's volume.
//! Channels running a tremolo effect switch their flowers to the batched
//! tremolo-pulse kernel instead.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

use super::config::GlowingFlowerConfig;
use super::{base_color, Batcher, FoliageKind, FoliageObject, InstanceBase, SpawnOptions};
use crate::audio::{ActiveEffect, AudioFrame, Envelope, NotePalette};
use crate::geometry::{generate_cone, generate_cylinder, generate_sphere, MeshData};
use crate::kernels::{process_batch, AnimationEntry, AnimationOutput, BatchParams, BatchedAnimation};
use crate::pool::{DenseInstancePool, FoliageId};

const DEFAULT_PETAL: [f32; 3] = [0.55, 0.85, 1.0];

/// Glowing flower instance (80 bytes)
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct GlowingFlowerInstance {
    pub base: InstanceBase,
    pub color: [f32; 3],
    /// Emissive strength, 0..1
    pub emission: f32,
    /// Head scale multiplier
    pub pulse: f32,
    pub opacity: f32,
    pub _pad: [f32; 2],
}

pub struct GlowingFlowerBatcher {
    config: GlowingFlowerConfig,
    palette: NotePalette,
    geometry: MeshData,
    pool: DenseInstancePool<GlowingFlowerInstance>,
    // (channel, slot) pairs on a tremolo channel this frame
    tremolo: Vec<(u32, u32)>,
    entries: Vec<AnimationEntry>,
    outputs: Vec<AnimationOutput>,
}

impl GlowingFlowerBatcher {
    pub fn new(config: GlowingFlowerConfig) -> Self {
        let stem = generate_cylinder(0.025, 0.02, 0.7, 5).with_color([0.3, 0.55, 0.3, 1.0]);
        let bloom = generate_cone(0.18, 0.22, 8)
            .transformed(Mat4::from_rotation_translation(
                glam::Quat::from_rotation_x(std::f32::consts::PI),
                Vec3::new(0.0, 0.92, 0.0),
            ));
        let bulb = generate_sphere(0.06, 6, 4).transformed(Mat4::from_translation(Vec3::new(0.0, 0.75, 0.0)));
        let geometry = MeshData::merge([&stem, &bloom, &bulb]);
        log::info!(
            "Glowing flower batcher: {} vertices, capacity {}",
            geometry.vertex_count(),
            config.capacity
        );

        Self {
            pool: DenseInstancePool::new("glowing_flower", config.capacity),
            palette: NotePalette::default(),
            geometry,
            tremolo: Vec::new(),
            entries: Vec::new(),
            outputs: Vec::new(),
            config,
        }
    }

    pub fn with_capacity(capacity: u32) -> Self {
        Self::new(GlowingFlowerConfig { capacity, ..Default::default() })
    }
}

impl Batcher for GlowingFlowerBatcher {
    type Instance = GlowingFlowerInstance;

    fn kind(&self) -> FoliageKind {
        FoliageKind::GlowingFlower
    }

    fn geometry(&self) -> &MeshData {
        &self.geometry
    }

    fn pool(&self) -> &DenseInstancePool<GlowingFlowerInstance> {
        &self.pool
    }

    fn pool_mut(&mut self) -> &mut DenseInstancePool<GlowingFlowerInstance> {
        &mut self.pool
    }

    fn register(&mut self, id: FoliageId, object: &FoliageObject, options: &SpawnOptions) -> Option<u32> {
        let instance = GlowingFlowerInstance {
            base: InstanceBase::from_object(object),
            color: base_color(object, options, &self.palette, DEFAULT_PETAL),
            pulse: 1.0,
            opacity: 1.0,
            ..Default::default()
        };
        self.pool.register(id, instance)
    }

    fn update(&mut self, slot: u32, object: &FoliageObject) {
        self.pool.modify(slot, |inst| inst.base = InstanceBase::from_object(object));
    }

    fn update_audio(&mut self, audio: &AudioFrame, time: f32, dt: f32) {
        let envelope = Envelope::new(self.config.emission_attack, self.config.emission_release);
        let live = self.pool.live_mut();
        self.tremolo.clear();

        for (slot, inst) in live.iter_mut().enumerate() {
            let ch = audio.channel(inst.base.channel_index());
            if ch.active_effect == ActiveEffect::Tremolo {
                self.tremolo.push((inst.base.channel, slot as u32));
                continue;
            }
            let mut env = Envelope { value: inst.emission, ..envelope };
            inst.emission = env.follow(ch.volume.clamp(0.0, 1.0), dt);
            inst.pulse = 1.0 + 0.1 * inst.emission;
            inst.opacity = 1.0;
        }

        if self.tremolo.is_empty() {
            return;
        }

        // one kernel call per tremolo channel
        self.tremolo.sort_unstable();
        for run in self.tremolo.chunk_by(|a, b| a.0 == b.0) {
            let depth = audio.channel(run[0].0 as usize).volume.clamp(0.0, 1.0);

            self.entries.clear();
            self.entries.extend(run.iter().map(|&(_, slot)| AnimationEntry {
                offset: live[slot as usize].base.phase,
                original_y: live[slot as usize].base.position[1],
                ..Default::default()
            }));
            self.outputs.clear();
            self.outputs.resize(run.len(), AnimationOutput::default());

            let params = BatchParams {
                time,
                beat_phase: audio.beat_phase,
                kick: audio.kick_trigger,
                groove: audio.groove_amount,
                audio_param: depth,
            };
            process_batch(BatchedAnimation::TremoloPulse, &mut self.entries, &mut self.outputs, params);

            for (&(_, slot), out) in run.iter().zip(&self.outputs) {
                let inst = &mut live[slot as usize];
                let [pulse, opacity, emission, _] = out.0;
                inst.pulse = pulse;
                inst.opacity = opacity.clamp(0.0, 1.0);
                inst.emission = emission;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::ChannelData;

    fn flowers(channels: &[usize]) -> GlowingFlowerBatcher {
        let mut batcher = GlowingFlowerBatcher::with_capacity(channels.len() as u32);
        for (i, &ch) in channels.iter().enumerate() {
            let obj = FoliageObject::new(FoliageKind::GlowingFlower, Vec3::X * i as f32)
                .with_channel(ch)
                .with_phase(i as f32);
            batcher.register(FoliageId(i as u64), &obj, &SpawnOptions::default());
        }
        batcher
    }

    fn channel(volume: f32, effect: ActiveEffect) -> ChannelData {
        ChannelData { volume, active_effect: effect, ..Default::default() }
    }

    #[test]
    fn test_instance_size() {
        assert_eq!(std::mem::size_of::<GlowingFlowerInstance>(), 80);
    }

    #[test]
    fn test_emission_follows_volume() {
        let mut batcher = flowers(&[0]);
        let loud = AudioFrame { channels: vec![channel(0.8, ActiveEffect::None)], ..Default::default() };
        for _ in 0..60 {
            batcher.update_audio(&loud, 0.0, 1.0 / 60.0);
        }
        let inst = batcher.pool().get(0).unwrap();
        assert!((inst.emission - 0.8).abs() < 0.01);
        assert_eq!(inst.opacity, 1.0);

        for _ in 0..240 {
            batcher.update_audio(&AudioFrame::silent(), 0.0, 1.0 / 60.0);
        }
        assert!(batcher.pool().get(0).unwrap().emission < 0.01);
    }

    #[test]
    fn test_tremolo_channel_uses_kernel() {
        // flowers 0 and 2 on the tremolo channel, flower 1 on a plain one
        let mut batcher = flowers(&[1, 0, 1]);
        let frame = AudioFrame {
            channels: vec![channel(0.5, ActiveEffect::None), channel(0.6, ActiveEffect::Tremolo)],
            groove_amount: 0.2,
            ..Default::default()
        };
        batcher.update_audio(&frame, 1.3, 0.016);

        let expected_emission = 0.3 + 0.6 * 0.7;
        for slot in [0, 2] {
            let inst = batcher.pool().get(slot).unwrap();
            assert!((inst.emission - expected_emission).abs() < 1e-5);
            let s = (1.3 * (8.0 + 0.6 * 15.0) + inst.base.phase).sin();
            assert!((inst.pulse - (1.0 + s * (0.1 + 0.6 * 0.3))).abs() < 1e-4);
        }
        let plain = batcher.pool().get(1).unwrap();
        assert!(plain.emission < 0.5);
        assert_eq!(plain.opacity, 1.0);
    }

    #[test]
    fn test_missing_channel_is_silent() {
        let mut batcher = flowers(&[9]);
        batcher.update_audio(&AudioFrame::silent(), 0.0, 0.1);
        assert_eq!(batcher.pool().get(0).unwrap().emission, 0.0);
    }
}
