//! Mushroom batcher: note-coloured caps that squash on triggers and glow on
//! the kick.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

use super::config::MushroomConfig;
use super::{base_color, Batcher, FoliageKind, FoliageObject, InstanceBase, SpawnOptions};
use crate::audio::{decay, AudioFrame, NotePalette};
use crate::geometry::{generate_cylinder, generate_dome, MeshData, SoftMesh};
use crate::kernels::deform::DeformKind;
use crate::pool::{DenseInstancePool, FoliageId};

const STEM_COLOR: [f32; 4] = [0.95, 0.92, 0.85, 1.0];
const DEFAULT_CAP: [f32; 3] = [0.90, 0.25, 0.30];

/// Mushroom instance (80 bytes)
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct MushroomInstance {
    pub base: InstanceBase,
    pub cap_color: [f32; 3],
    /// Emissive boost from the kick, 0..1
    pub glow: f32,
    /// Vertical cap scale; horizontal is `1 / sqrt(squash)`
    pub squash: f32,
    /// Bounce envelope, 0..1
    pub bounce: f32,
    /// Last note that coloured the cap
    pub note: f32,
    pub _pad: f32,
}

pub struct MushroomBatcher {
    config: MushroomConfig,
    palette: NotePalette,
    geometry: SoftMesh,
    pool: DenseInstancePool<MushroomInstance>,
}

impl MushroomBatcher {
    pub fn new(config: MushroomConfig) -> Self {
        let stem = generate_cylinder(0.12, 0.09, 0.6, 8).with_color(STEM_COLOR);
        let cap = generate_dome(0.4, 12, 4)
            .transformed(Mat4::from_scale_rotation_translation(
                Vec3::new(1.0, 0.6, 1.0),
                glam::Quat::IDENTITY,
                Vec3::new(0.0, 0.55, 0.0),
            ));
        let geometry = MeshData::merge([&stem, &cap]);
        log::info!(
            "Mushroom batcher: {} vertices, capacity {}",
            geometry.vertex_count(),
            config.capacity
        );

        Self {
            pool: DenseInstancePool::new("mushroom", config.capacity),
            palette: NotePalette::default(),
            geometry: SoftMesh::new(geometry, DeformKind::Jiggle, 0.3),
            config,
        }
    }

    pub fn with_capacity(capacity: u32) -> Self {
        Self::new(MushroomConfig { capacity, ..Default::default() })
    }
}

impl Batcher for MushroomBatcher {
    type Instance = MushroomInstance;

    fn kind(&self) -> FoliageKind {
        FoliageKind::Mushroom
    }

    fn geometry(&self) -> &MeshData {
        self.geometry.mesh()
    }

    fn soft_mesh_mut(&mut self) -> Option<&mut SoftMesh> {
        Some(&mut self.geometry)
    }

    fn pool(&self) -> &DenseInstancePool<MushroomInstance> {
        &self.pool
    }

    fn pool_mut(&mut self) -> &mut DenseInstancePool<MushroomInstance> {
        &mut self.pool
    }

    fn register(&mut self, id: FoliageId, object: &FoliageObject, options: &SpawnOptions) -> Option<u32> {
        let instance = MushroomInstance {
            base: InstanceBase::from_object(object),
            cap_color: base_color(object, options, &self.palette, DEFAULT_CAP),
            squash: 1.0,
            note: object.note.map_or(0.0, f32::from),
            ..Default::default()
        };
        self.pool.register(id, instance)
    }

    fn update(&mut self, slot: u32, object: &FoliageObject) {
        self.pool.modify(slot, |inst| inst.base = InstanceBase::from_object(object));
    }

    fn update_audio(&mut self, audio: &AudioFrame, _time: f32, dt: f32) {
        let kick = audio.kick_trigger.clamp(0.0, 1.0);
        let config = &self.config;
        let palette = &self.palette;

        self.pool.for_each_mut(|_, inst| {
            let ch = audio.channel(inst.base.channel_index());
            if ch.triggered() {
                inst.bounce = inst.bounce.max(ch.trigger_strength.min(1.0));
                inst.note = f32::from(ch.note);
                inst.cap_color = palette.color(inst.note);
            } else {
                inst.bounce = decay(inst.bounce, config.bounce_release, dt);
            }
            inst.squash = 1.0 - config.bounce_squash * inst.bounce;
            inst.glow = decay(inst.glow, config.glow_release, dt).max(kick);
        });
    }
}
