//! Cloud batcher: drifting puffs that brighten with the groove and rain
//! with the bass line.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

use super::config::CloudConfig;
use super::{Batcher, FoliageKind, FoliageObject, InstanceBase, SpawnOptions};
use crate::audio::{AudioFrame, Envelope};
use crate::geometry::{generate_sphere, MeshData, SoftMesh};
use crate::kernels::deform::DeformKind;
use crate::pool::{DenseInstancePool, FoliageId};

/// Cloud instance (80 bytes)
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct CloudInstance {
    pub base: InstanceBase,
    /// Home position the drift wraps around
    pub home: [f32; 2],
    /// Distance drifted along X, kept inside `[-radius, radius)`
    pub drift: f32,
    /// Drift speed multiplier from spawn options
    pub speed: f32,
    pub brightness: f32,
    /// Rain intensity, 0..1
    pub rain: f32,
    pub _pad: [f32; 2],
}

impl CloudInstance {
    pub fn is_raining(&self) -> bool {
        self.rain > 0.3
    }
}

pub struct CloudBatcher {
    config: CloudConfig,
    geometry: SoftMesh,
    pool: DenseInstancePool<CloudInstance>,
    brightness: Envelope,
    rain: Envelope,
}

/// Wrap `x` into `[-radius, radius)`. A non-positive radius pins to 0.
fn wrap(x: f32, radius: f32) -> f32 {
    if !(radius > 0.0) {
        return 0.0;
    }
    (x + radius).rem_euclid(2.0 * radius) - radius
}

impl CloudBatcher {
    pub fn new(config: CloudConfig) -> Self {
        let white = [1.0, 1.0, 1.0, 0.9];
        let puffs = [
            (Vec3::new(0.0, 0.0, 0.0), 1.6),
            (Vec3::new(1.4, -0.2, 0.3), 1.1),
            (Vec3::new(-1.3, -0.3, -0.2), 1.2),
            (Vec3::new(0.4, 0.5, -0.5), 1.0),
        ]
        .map(|(offset, radius)| {
            generate_sphere(radius, 10, 6)
                .with_color(white)
                .transformed(Mat4::from_translation(offset))
        });
        let geometry = MeshData::merge(puffs.iter());
        log::info!(
            "Cloud batcher: {} vertices, capacity {}",
            geometry.vertex_count(),
            config.capacity
        );

        Self {
            pool: DenseInstancePool::new("cloud", config.capacity),
            geometry: SoftMesh::new(geometry, DeformKind::Wave, 0.15).with_frequency(1.2),
            brightness: Envelope { value: 0.7, ..Envelope::new(2.0, 1.0) },
            rain: Envelope::new(config.rain_response, config.rain_response * 0.5),
            config,
        }
    }

    pub fn with_capacity(capacity: u32) -> Self {
        Self::new(CloudConfig { capacity, ..Default::default() })
    }

    /// Current smoothed rain intensity shared by all clouds
    pub fn rain(&self) -> f32 {
        self.rain.value
    }
}

impl Batcher for CloudBatcher {
    type Instance = CloudInstance;

    fn kind(&self) -> FoliageKind {
        FoliageKind::Cloud
    }

    fn geometry(&self) -> &MeshData {
        self.geometry.mesh()
    }

    fn soft_mesh_mut(&mut self) -> Option<&mut SoftMesh> {
        Some(&mut self.geometry)
    }

    fn pool(&self) -> &DenseInstancePool<CloudInstance> {
        &self.pool
    }

    fn pool_mut(&mut self) -> &mut DenseInstancePool<CloudInstance> {
        &mut self.pool
    }

    fn register(&mut self, id: FoliageId, object: &FoliageObject, options: &SpawnOptions) -> Option<u32> {
        let instance = CloudInstance {
            base: InstanceBase::from_object(object),
            home: [object.position.x, object.position.z],
            speed: options.speed,
            brightness: 0.7,
            ..Default::default()
        };
        self.pool.register(id, instance)
    }

    fn update(&mut self, slot: u32, object: &FoliageObject) {
        self.pool.modify(slot, |inst| {
            inst.base = InstanceBase::from_object(object);
            inst.home = [object.position.x, object.position.z];
            inst.base.position[0] = inst.home[0] + inst.drift;
        });
    }

    fn update_audio(&mut self, audio: &AudioFrame, time: f32, dt: f32) {
        let brightness = self.brightness.follow(0.7 + 0.3 * audio.groove_amount.clamp(0.0, 1.0), dt);
        let rain = self.rain.follow(audio.bass_volume().clamp(0.0, 1.0), dt);
        let radius = self.config.drift_radius;
        let step = self.config.drift_speed * dt.max(0.0);

        self.pool.for_each_mut(|_, inst| {
            inst.drift = wrap(inst.drift + step * inst.speed, radius);
            inst.base.position[0] = inst.home[0] + inst.drift;
            // slow sideways meander
            inst.base.position[2] = inst.home[1] + (time * 0.1 + inst.base.phase).sin() * 0.5;
            inst.brightness = brightness;
            inst.rain = rain;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::ChannelData;

    #[test]
    fn test_instance_size() {
        assert_eq!(std::mem::size_of::<CloudInstance>(), 80);
    }

    #[test]
    fn test_wrap() {
        assert_eq!(wrap(0.0, 10.0), 0.0);
        assert!((wrap(11.0, 10.0) - -9.0).abs() < 1e-5);
        assert!((wrap(-11.0, 10.0) - 9.0).abs() < 1e-5);
        assert_eq!(wrap(3.0, 0.0), 0.0);
        assert_eq!(wrap(3.0, f32::NAN), 0.0);
    }

    #[test]
    fn test_zero_radius_keeps_clouds_home() {
        let mut batcher = CloudBatcher::new(CloudConfig { capacity: 1, drift_radius: 0.0, ..Default::default() });
        let obj = FoliageObject::new(FoliageKind::Cloud, Vec3::new(4.0, 30.0, 2.0));
        batcher.register(FoliageId(1), &obj, &SpawnOptions::default());
        batcher.update_audio(&AudioFrame::silent(), 0.0, 0.016);

        let cloud = batcher.pool().get(0).unwrap();
        assert!(cloud.base.position.iter().all(|v| v.is_finite()));
        assert_eq!(cloud.base.position[0], 4.0);
    }

    #[test]
    fn test_drift_stays_within_radius() {
        let mut batcher = CloudBatcher::new(CloudConfig { capacity: 2, drift_speed: 7.0, drift_radius: 5.0, ..Default::default() });
        let obj = FoliageObject::new(FoliageKind::Cloud, Vec3::new(100.0, 30.0, 0.0));
        batcher.register(FoliageId(1), &obj, &SpawnOptions::default());

        for i in 0..500 {
            batcher.update_audio(&AudioFrame::silent(), i as f32 * 0.05, 0.05);
            let cloud = batcher.pool().get(0).unwrap();
            assert!((cloud.base.position[0] - 100.0).abs() <= 5.0);
            assert_eq!(cloud.base.position[1], 30.0);
        }
    }

    #[test]
    fn test_bass_brings_rain() {
        let mut batcher = CloudBatcher::with_capacity(1);
        batcher.register(FoliageId(1), &FoliageObject::new(FoliageKind::Cloud, Vec3::ZERO), &SpawnOptions::default());
        let bass = AudioFrame {
            channels: vec![
                ChannelData { frequency: 60.0, volume: 1.0, ..Default::default() },
                ChannelData { frequency: 880.0, volume: 0.2, ..Default::default() },
            ],
            ..Default::default()
        };
        for _ in 0..120 {
            batcher.update_audio(&bass, 0.0, 1.0 / 60.0);
        }
        assert!(batcher.pool().get(0).unwrap().is_raining());

        for _ in 0..600 {
            batcher.update_audio(&AudioFrame::silent(), 0.0, 1.0 / 60.0);
        }
        assert!(!batcher.pool().get(0).unwrap().is_raining());
    }

    #[test]
    fn test_groove_brightens() {
        let mut batcher = CloudBatcher::with_capacity(1);
        batcher.register(FoliageId(1), &FoliageObject::new(FoliageKind::Cloud, Vec3::ZERO), &SpawnOptions::default());
        for _ in 0..300 {
            batcher.update_audio(&AudioFrame { groove_amount: 1.0, ..Default::default() }, 0.0, 1.0 / 60.0);
        }
        assert!(batcher.pool().get(0).unwrap().brightness > 0.95);
    }
}
