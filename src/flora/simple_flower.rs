//! Simple flower batcher: stem sway plus an accordion stretch that grows
//! with the groove.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

use super::config::SimpleFlowerConfig;
use super::{base_color, Batcher, FoliageKind, FoliageObject, InstanceBase, SpawnOptions};
use crate::audio::{AudioFrame, NotePalette};
use crate::geometry::{generate_cylinder, generate_sphere, MeshData};
use crate::kernels::{process_batch, AnimationEntry, AnimationOutput, BatchParams, BatchedAnimation};
use crate::pool::{DenseInstancePool, FoliageId};

const DEFAULT_PETAL: [f32; 3] = [1.0, 0.85, 0.35];

/// Simple flower instance (80 bytes)
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct SimpleFlowerInstance {
    pub base: InstanceBase,
    pub color: [f32; 3],
    /// Stem sway angle, radians
    pub sway: f32,
    pub stretch_y: f32,
    /// Horizontal scale keeping the volume constant
    pub width_xz: f32,
    pub _pad: [f32; 2],
}

pub struct SimpleFlowerBatcher {
    config: SimpleFlowerConfig,
    palette: NotePalette,
    geometry: MeshData,
    pool: DenseInstancePool<SimpleFlowerInstance>,
    entries: Vec<AnimationEntry>,
    outputs: Vec<AnimationOutput>,
}

impl SimpleFlowerBatcher {
    pub fn new(config: SimpleFlowerConfig) -> Self {
        let stem = generate_cylinder(0.02, 0.018, 0.45, 5).with_color([0.35, 0.65, 0.3, 1.0]);
        let petals = generate_sphere(0.1, 8, 4)
            .transformed(Mat4::from_scale_rotation_translation(
                Vec3::new(1.0, 0.35, 1.0),
                glam::Quat::IDENTITY,
                Vec3::new(0.0, 0.47, 0.0),
            ));
        let center = generate_sphere(0.04, 6, 4)
            .with_color([0.45, 0.3, 0.1, 1.0])
            .transformed(Mat4::from_translation(Vec3::new(0.0, 0.5, 0.0)));
        let geometry = MeshData::merge([&stem, &petals, &center]);
        log::info!(
            "Simple flower batcher: {} vertices, capacity {}",
            geometry.vertex_count(),
            config.capacity
        );

        Self {
            pool: DenseInstancePool::new("simple_flower", config.capacity),
            palette: NotePalette::default(),
            geometry,
            entries: Vec::new(),
            outputs: Vec::new(),
            config,
        }
    }

    pub fn with_capacity(capacity: u32) -> Self {
        Self::new(SimpleFlowerConfig { capacity, ..Default::default() })
    }
}

impl Batcher for SimpleFlowerBatcher {
    type Instance = SimpleFlowerInstance;

    fn kind(&self) -> FoliageKind {
        FoliageKind::SimpleFlower
    }

    fn geometry(&self) -> &MeshData {
        &self.geometry
    }

    fn pool(&self) -> &DenseInstancePool<SimpleFlowerInstance> {
        &self.pool
    }

    fn pool_mut(&mut self) -> &mut DenseInstancePool<SimpleFlowerInstance> {
        &mut self.pool
    }

    fn register(&mut self, id: FoliageId, object: &FoliageObject, options: &SpawnOptions) -> Option<u32> {
        let instance = SimpleFlowerInstance {
            base: InstanceBase::from_object(object),
            color: base_color(object, options, &self.palette, DEFAULT_PETAL),
            stretch_y: 1.0,
            width_xz: 1.0,
            ..Default::default()
        };
        self.pool.register(id, instance)
    }

    fn update(&mut self, slot: u32, object: &FoliageObject) {
        self.pool.modify(slot, |inst| inst.base = InstanceBase::from_object(object));
    }

    fn update_audio(&mut self, audio: &AudioFrame, time: f32, _dt: f32) {
        let groove = audio.groove_amount.clamp(0.0, 1.0);
        let sway = self.config.sway * (1.0 + groove);
        let live = self.pool.live_mut();

        self.entries.clear();
        self.entries.extend(live.iter().map(|inst| AnimationEntry {
            offset: inst.base.phase,
            ..Default::default()
        }));
        self.outputs.clear();
        self.outputs.resize(live.len(), AnimationOutput::default());

        let params = BatchParams {
            time,
            beat_phase: audio.beat_phase,
            kick: audio.kick_trigger,
            groove,
            audio_param: 0.0,
        };
        process_batch(BatchedAnimation::Accordion, &mut self.entries, &mut self.outputs, params);

        for (inst, out) in live.iter_mut().zip(&self.outputs) {
            inst.sway = (time * 2.0 + inst.base.phase).sin() * sway;
            // no groove, no stretch
            inst.stretch_y = 1.0 + (out.0[0] - 1.0) * groove;
            inst.width_xz = 1.0 / inst.stretch_y.sqrt();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn garden(n: u64) -> SimpleFlowerBatcher {
        let mut batcher = SimpleFlowerBatcher::with_capacity(n as u32);
        for i in 0..n {
            let obj = FoliageObject::new(FoliageKind::SimpleFlower, Vec3::ZERO).with_phase(i as f32 * 0.37);
            batcher.register(FoliageId(i), &obj, &SpawnOptions::default());
        }
        batcher
    }

    #[test]
    fn test_instance_size() {
        assert_eq!(std::mem::size_of::<SimpleFlowerInstance>(), 80);
    }

    #[test]
    fn test_no_groove_no_stretch() {
        let mut batcher = garden(8);
        batcher.update_audio(&AudioFrame::silent(), 0.42, 0.016);
        for inst in batcher.pool().live() {
            assert_eq!(inst.stretch_y, 1.0);
            assert_eq!(inst.width_xz, 1.0);
        }
    }

    #[test]
    fn test_groove_stretch_preserves_volume() {
        let mut batcher = garden(16);
        let frame = AudioFrame { groove_amount: 0.8, ..Default::default() };
        batcher.update_audio(&frame, 0.42, 0.016);
        let mut stretched = 0;
        for inst in batcher.pool().live() {
            assert!(inst.stretch_y >= 1.0);
            let volume = inst.stretch_y * inst.width_xz * inst.width_xz;
            assert!((volume - 1.0).abs() < 1e-4);
            if inst.stretch_y > 1.0 {
                stretched += 1;
            }
        }
        assert!(stretched > 0);
    }

    #[test]
    fn test_sway_bounded() {
        let mut batcher = garden(4);
        let frame = AudioFrame { groove_amount: 1.0, ..Default::default() };
        for i in 0..50 {
            batcher.update_audio(&frame, i as f32 * 0.1, 0.1);
            for inst in batcher.pool().live() {
                assert!(inst.sway.abs() <= 0.2 + 1e-6);
            }
        }
    }

    #[test]
    fn test_empty_batch_is_noop() {
        let mut batcher = SimpleFlowerBatcher::with_capacity(4);
        batcher.update_audio(&AudioFrame::silent(), 0.0, 0.016);
        assert!(!batcher.pool().is_dirty());
    }
}
