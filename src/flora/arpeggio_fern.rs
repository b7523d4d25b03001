//! Arpeggio fern batcher: one frond unfurls per arpeggio note and the fern
//! curls back up when the arpeggio stops.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Quat, Vec3};

use super::config::ArpeggioFernConfig;
use super::{Batcher, FoliageKind, FoliageObject, InstanceBase, SpawnOptions};
use crate::audio::{ActiveEffect, AudioFrame};
use crate::geometry::{generate_cylinder, generate_quad, MeshData};
use crate::kernels::arpeggio_step;
use crate::pool::{DenseInstancePool, FoliageId};

/// Arpeggio fern instance (64 bytes)
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct ArpeggioFernInstance {
    pub base: InstanceBase,
    /// Smoothed number of open fronds
    pub unfurl: f32,
    /// Fronds that should be open
    pub target: f32,
    /// 1 if the bound channel triggered last frame
    pub last_trigger: f32,
    /// `unfurl / max_steps`, what the shader reads
    pub openness: f32,
}

pub struct ArpeggioFernBatcher {
    config: ArpeggioFernConfig,
    geometry: MeshData,
    pool: DenseInstancePool<ArpeggioFernInstance>,
}

impl ArpeggioFernBatcher {
    pub fn new(config: ArpeggioFernConfig) -> Self {
        let green = [0.25, 0.7, 0.35, 1.0];
        let stalk = generate_cylinder(0.03, 0.01, 0.8, 5).with_color(green);
        let mut parts = vec![stalk];
        // fronds fanned around the stalk, one per step
        let steps = config.max_steps.max(1);
        for i in 0..steps {
            let angle = i as f32 / steps as f32 * std::f32::consts::TAU;
            let height = 0.15 + 0.6 * i as f32 / steps as f32;
            let frond = generate_quad(0.12, 0.5)
                .with_color(green)
                .transformed(Mat4::from_rotation_translation(
                    Quat::from_rotation_y(angle) * Quat::from_rotation_x(-0.9),
                    Vec3::new(0.0, height, 0.0),
                ));
            parts.push(frond);
        }
        let geometry = MeshData::merge(parts.iter());
        log::info!(
            "Arpeggio fern batcher: {} fronds, capacity {}",
            steps,
            config.capacity
        );

        Self {
            pool: DenseInstancePool::new("arpeggio_fern", config.capacity),
            geometry,
            config,
        }
    }

    pub fn with_capacity(capacity: u32) -> Self {
        Self::new(ArpeggioFernConfig { capacity, ..Default::default() })
    }
}

impl Batcher for ArpeggioFernBatcher {
    type Instance = ArpeggioFernInstance;

    fn kind(&self) -> FoliageKind {
        FoliageKind::ArpeggioFern
    }

    fn geometry(&self) -> &MeshData {
        &self.geometry
    }

    fn pool(&self) -> &DenseInstancePool<ArpeggioFernInstance> {
        &self.pool
    }

    fn pool_mut(&mut self) -> &mut DenseInstancePool<ArpeggioFernInstance> {
        &mut self.pool
    }

    fn register(&mut self, id: FoliageId, object: &FoliageObject, _options: &SpawnOptions) -> Option<u32> {
        let instance = ArpeggioFernInstance {
            base: InstanceBase::from_object(object),
            ..Default::default()
        };
        self.pool.register(id, instance)
    }

    fn update(&mut self, slot: u32, object: &FoliageObject) {
        self.pool.modify(slot, |inst| inst.base = InstanceBase::from_object(object));
    }

    fn update_audio(&mut self, audio: &AudioFrame, _time: f32, _dt: f32) {
        let max_steps = self.config.max_steps.max(1) as f32;

        self.pool.for_each_mut(|_, inst| {
            let ch = audio.channel(inst.base.channel_index());
            let triggered = ch.triggered();
            let step = arpeggio_step(
                inst.unfurl,
                inst.target,
                inst.last_trigger > 0.5,
                ch.active_effect == ActiveEffect::Arpeggio,
                triggered,
                max_steps,
            );
            inst.target = step.target;
            inst.unfurl = step.unfurl;
            inst.last_trigger = if triggered { 1.0 } else { 0.0 };
            inst.openness = (inst.unfurl / max_steps).clamp(0.0, 1.0);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::ChannelData;

    fn arp(trigger: f32) -> AudioFrame {
        AudioFrame {
            channels: vec![ChannelData {
                volume: 0.7,
                trigger_strength: trigger,
                active_effect: ActiveEffect::Arpeggio,
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    fn fern() -> ArpeggioFernBatcher {
        let mut batcher = ArpeggioFernBatcher::with_capacity(1);
        let obj = FoliageObject::new(FoliageKind::ArpeggioFern, Vec3::ZERO).with_channel(0);
        batcher.register(FoliageId(1), &obj, &SpawnOptions::default());
        batcher
    }

    #[test]
    fn test_instance_size() {
        assert_eq!(std::mem::size_of::<ArpeggioFernInstance>(), 64);
    }

    #[test]
    fn test_one_step_per_note() {
        let mut batcher = fern();
        for _ in 0..3 {
            batcher.update_audio(&arp(1.0), 0.0, 0.016);
            batcher.update_audio(&arp(0.0), 0.0, 0.016);
        }
        assert_eq!(batcher.pool().get(0).unwrap().target, 3.0);
    }

    #[test]
    fn test_held_trigger_counts_once() {
        let mut batcher = fern();
        for _ in 0..5 {
            batcher.update_audio(&arp(1.0), 0.0, 0.016);
        }
        assert_eq!(batcher.pool().get(0).unwrap().target, 1.0);
    }

    #[test]
    fn test_caps_at_twelve_steps() {
        let mut batcher = fern();
        for _ in 0..40 {
            batcher.update_audio(&arp(1.0), 0.0, 0.016);
            batcher.update_audio(&arp(0.0), 0.0, 0.016);
        }
        let inst = batcher.pool().get(0).unwrap();
        assert_eq!(inst.target, 12.0);
        assert!(inst.openness > 0.95 && inst.openness <= 1.0);
    }

    #[test]
    fn test_curls_up_when_arpeggio_stops() {
        let mut batcher = fern();
        for _ in 0..4 {
            batcher.update_audio(&arp(1.0), 0.0, 0.016);
            batcher.update_audio(&arp(0.0), 0.0, 0.016);
        }
        let plain = AudioFrame {
            channels: vec![ChannelData { volume: 0.7, ..Default::default() }],
            ..Default::default()
        };
        batcher.update_audio(&plain, 0.0, 0.016);
        let inst = batcher.pool().get(0).unwrap();
        assert_eq!(inst.target, 0.0);
        for _ in 0..200 {
            batcher.update_audio(&plain, 0.0, 0.016);
        }
        assert!(batcher.pool().get(0).unwrap().unfurl < 0.01);
    }
}
