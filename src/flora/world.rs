//! The flora world: object registry, batchers, loose-object animation and
//! particle effects behind one explicitly owned context.

use std::collections::HashMap;
use std::fmt;

use glam::Vec3;

use super::{
    AnimationDriver, AnimationKind, ArpeggioFernBatcher, Batcher, CloudBatcher, DandelionBatcher, FloraConfig,
    FoliageKind, FoliageObject, GlowingFlowerBatcher, MushroomBatcher, PortamentoPineBatcher,
    Pose, SimpleFlowerBatcher, SpawnOptions, WaterfallBatcher,
};
use crate::audio::AudioFrame;
use crate::core::Result;
use crate::kernels::batch::{batch_distance_cull, batch_distances};
use crate::kernels::bootstrap::{ground_height, BootstrapProgress};
use crate::kernels::deform::{batch_deform, DeformJob};
use crate::kernels::{FluidGrid, ParticleBuffer, ParticleStep, SpawnHeightmap};
use crate::pool::FoliageId;

/// Per-batcher occupancy
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BatchStats {
    pub kind: FoliageKind,
    pub count: u32,
    pub capacity: u32,
    pub dropped: u64,
}

/// Snapshot of world occupancy
#[derive(Clone, Debug, PartialEq)]
pub struct FloraStats {
    pub frame: u64,
    pub objects: usize,
    pub animated: u32,
    pub batches: Vec<BatchStats>,
    pub particles_alive: usize,
    pub mist_density: f32,
}

impl FloraStats {
    pub fn instances(&self) -> u32 {
        self.batches.iter().map(|b| b.count).sum()
    }

    pub fn dropped(&self) -> u64 {
        self.batches.iter().map(|b| b.dropped).sum()
    }

    pub fn batch(&self, kind: FoliageKind) -> Option<&BatchStats> {
        self.batches.iter().find(|b| b.kind == kind)
    }
}

impl fmt::Display for FloraStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "frame {}: {} objects, {} instances, {} animated, {} particles",
            self.frame,
            self.objects,
            self.instances(),
            self.animated,
            self.particles_alive
        )?;
        if self.dropped() > 0 {
            write!(f, ", {} dropped", self.dropped())?;
        }
        Ok(())
    }
}

/// Deform job of a batch with a soft mesh and at least one instance
fn deform_job<B: Batcher>(batcher: &mut B, time: f32, audio_pulse: f32) -> Option<DeformJob<'_>> {
    if batcher.pool().is_empty() {
        return None;
    }
    batcher.soft_mesh_mut().map(|soft| soft.job(time, audio_pulse))
}

fn batch_stats<B: Batcher>(batcher: &B) -> BatchStats {
    let pool = batcher.pool();
    BatchStats {
        kind: batcher.kind(),
        count: pool.count(),
        capacity: pool.capacity(),
        dropped: pool.dropped(),
    }
}

pub struct FloraWorld {
    config: FloraConfig,
    next_id: u64,
    frame: u64,
    objects: HashMap<FoliageId, FoliageObject>,
    driver: AnimationDriver,

    pub(crate) mushrooms: MushroomBatcher,
    pub(crate) dandelions: DandelionBatcher,
    pub(crate) clouds: CloudBatcher,
    pub(crate) waterfalls: WaterfallBatcher,
    pub(crate) glowing_flowers: GlowingFlowerBatcher,
    pub(crate) simple_flowers: SimpleFlowerBatcher,
    pub(crate) arpeggio_ferns: ArpeggioFernBatcher,
    pub(crate) portamento_pines: PortamentoPineBatcher,

    particles: ParticleBuffer,
    mist: Option<FluidGrid>,
    heightmap: Option<SpawnHeightmap>,
}

impl FloraWorld {
    /// Build every batcher from `config`. Fails if the config does not
    /// validate.
    pub fn new(config: FloraConfig) -> Result<Self> {
        config.validate()?;

        let particles = ParticleBuffer::new(
            config.particles.count,
            Vec3::from(config.particles.spawn),
            config.particles.seed,
        );
        let mist = (config.fluid_grid_size > 0).then(|| FluidGrid::new(config.fluid_grid_size));
        let heightmap = config
            .bootstrap_heightmap
            .then(|| SpawnHeightmap::generate(&BootstrapProgress::default()));

        let world = Self {
            next_id: 1,
            frame: 0,
            objects: HashMap::new(),
            driver: AnimationDriver::new(config.loose_capacity),
            mushrooms: MushroomBatcher::new(config.mushroom.clone()),
            dandelions: DandelionBatcher::new(config.dandelion.clone()),
            clouds: CloudBatcher::new(config.cloud.clone()),
            waterfalls: WaterfallBatcher::new(config.waterfall.clone()),
            glowing_flowers: GlowingFlowerBatcher::new(config.glowing_flower.clone()),
            simple_flowers: SimpleFlowerBatcher::new(config.simple_flower.clone()),
            arpeggio_ferns: ArpeggioFernBatcher::new(config.arpeggio_fern.clone()),
            portamento_pines: PortamentoPineBatcher::new(config.portamento_pine.clone()),
            particles,
            mist,
            heightmap,
            config,
        };

        log::info!(
            "Flora world ready: {} batched slots, {} loose, {} particles",
            world.config.total_capacity(),
            world.config.loose_capacity,
            world.particles.len()
        );
        Ok(world)
    }

    pub fn config(&self) -> &FloraConfig {
        &self.config
    }

    /// Add an object with default spawn options
    pub fn spawn(&mut self, object: FoliageObject) -> FoliageId {
        self.spawn_with(object, &SpawnOptions::default())
    }

    /// Add an object. Batchable kinds go to their batcher, the rest to the
    /// animation driver. The id is returned even when the batch is full; the
    /// object is then registered but not drawn.
    pub fn spawn_with(&mut self, object: FoliageObject, options: &SpawnOptions) -> FoliageId {
        let id = FoliageId(self.next_id);
        self.next_id += 1;

        let kind = object.kind;
        let placed = match kind {
            FoliageKind::Mushroom => self.mushrooms.register(id, &object, options).is_some(),
            FoliageKind::Dandelion => self.dandelions.register(id, &object, options).is_some(),
            FoliageKind::Cloud => self.clouds.register(id, &object, options).is_some(),
            FoliageKind::Waterfall => self.waterfalls.register(id, &object, options).is_some(),
            FoliageKind::GlowingFlower => self.glowing_flowers.register(id, &object, options).is_some(),
            FoliageKind::SimpleFlower => self.simple_flowers.register(id, &object, options).is_some(),
            FoliageKind::ArpeggioFern => self.arpeggio_ferns.register(id, &object, options).is_some(),
            FoliageKind::PortamentoPine => self.portamento_pines.register(id, &object, options).is_some(),
            FoliageKind::Grass | FoliageKind::Tree => {
                self.driver.track(id, &object);
                true
            }
        };
        if !placed {
            log::debug!("{} {} registered without an instance slot", kind.name(), id);
        }

        self.objects.insert(id, object);
        id
    }

    /// Remove an object. Returns false for unknown ids.
    pub fn despawn(&mut self, id: FoliageId) -> bool {
        let Some(object) = self.objects.remove(&id) else {
            return false;
        };
        match object.kind {
            FoliageKind::Mushroom => self.mushrooms.remove(id),
            FoliageKind::Dandelion => self.dandelions.remove(id),
            FoliageKind::Cloud => self.clouds.remove(id),
            FoliageKind::Waterfall => self.waterfalls.remove(id),
            FoliageKind::GlowingFlower => self.glowing_flowers.remove(id),
            FoliageKind::SimpleFlower => self.simple_flowers.remove(id),
            FoliageKind::ArpeggioFern => self.arpeggio_ferns.remove(id),
            FoliageKind::PortamentoPine => self.portamento_pines.remove(id),
            FoliageKind::Grass | FoliageKind::Tree => self.driver.remove(id),
        };
        true
    }

    pub fn object(&self, id: FoliageId) -> Option<&FoliageObject> {
        self.objects.get(&id)
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Move an object, re-caching its rest height and rewriting its slot
    pub fn move_object(&mut self, id: FoliageId, position: Vec3) -> bool {
        let Some(object) = self.objects.get_mut(&id) else {
            return false;
        };
        object.set_position(position);
        let object = &*object;
        match object.kind {
            FoliageKind::Mushroom => self.mushrooms.update_by_id(id, object),
            FoliageKind::Dandelion => self.dandelions.update_by_id(id, object),
            FoliageKind::Cloud => self.clouds.update_by_id(id, object),
            FoliageKind::Waterfall => self.waterfalls.update_by_id(id, object),
            FoliageKind::GlowingFlower => self.glowing_flowers.update_by_id(id, object),
            FoliageKind::SimpleFlower => self.simple_flowers.update_by_id(id, object),
            FoliageKind::ArpeggioFern => self.arpeggio_ferns.update_by_id(id, object),
            FoliageKind::PortamentoPine => self.portamento_pines.update_by_id(id, object),
            // the driver re-reads the rest height every frame
            FoliageKind::Grass | FoliageKind::Tree => true,
        };
        true
    }

    /// Switch a loose object (grass, tree) to another animation, starting
    /// from its rest pose. `AnimationKind::None` stops it. Batched kinds are
    /// animated by their batcher and return false, as do unknown ids.
    pub fn set_animation(&mut self, id: FoliageId, animation: AnimationKind) -> bool {
        let Some(object) = self.objects.get_mut(&id) else {
            return false;
        };
        if object.kind.is_batched() {
            return false;
        }

        object.animation = animation;
        object.pose = Pose::default();
        object.position.y = object.original_y;
        self.driver.remove(id);
        self.driver.track(id, object);
        true
    }

    /// Advance every system by one frame, in a fixed order
    pub fn update_frame(&mut self, audio: &AudioFrame, time: f32, dt: f32) {
        self.driver.update(&mut self.objects, audio, time, dt);

        self.mushrooms.update_audio(audio, time, dt);
        self.dandelions.update_audio(audio, time, dt);
        self.clouds.update_audio(audio, time, dt);
        self.waterfalls.update_audio(audio, time, dt);
        self.glowing_flowers.update_audio(audio, time, dt);
        self.simple_flowers.update_audio(audio, time, dt);
        self.arpeggio_ferns.update_audio(audio, time, dt);
        self.portamento_pines.update_audio(audio, time, dt);
        if self.config.soft_meshes {
            self.deform_meshes(audio, time);
        }

        let pulse = audio.kick_trigger.max(audio.average_volume()).clamp(0.0, 1.0);
        self.particles.update(ParticleStep {
            dt,
            gravity_y: self.config.particles.gravity,
            audio_pulse: pulse,
            spawn: Vec3::from(self.config.particles.spawn),
        });

        if let Some(mist) = self.mist.as_mut() {
            // bass breathes mist into the middle of the field, pan pushes it sideways
            let center = (mist.size() / 2) as i32;
            mist.add_density(center, center, audio.bass_volume() * 10.0);
            mist.add_velocity(center, center, audio.pan_activity() * 2.0, 0.5 * pulse);
            mist.step(dt.clamp(0.0, 0.1), 0.0001, 0.0001);
        }

        self.frame += 1;
        log::debug!("{}", self.stats());
    }

    /// Bend the shared soft meshes in one parallel pass
    fn deform_meshes(&mut self, audio: &AudioFrame, time: f32) {
        let kick = audio.kick_trigger.clamp(0.0, 1.0);
        let bass = audio.bass_volume().clamp(0.0, 1.0);
        let volume = audio.average_volume().clamp(0.0, 1.0);

        let mut jobs: Vec<DeformJob<'_>> = [
            deform_job(&mut self.mushrooms, time, kick),
            deform_job(&mut self.clouds, time, bass),
            deform_job(&mut self.waterfalls, time, kick),
            deform_job(&mut self.portamento_pines, time, volume),
        ]
        .into_iter()
        .flatten()
        .collect();
        if jobs.is_empty() {
            return;
        }
        batch_deform(&mut jobs);
        drop(jobs);

        for soft in [
            self.mushrooms.soft_mesh_mut(),
            self.clouds.soft_mesh_mut(),
            self.waterfalls.soft_mesh_mut(),
            self.portamento_pines.soft_mesh_mut(),
        ]
        .into_iter()
        .flatten()
        {
            soft.apply();
        }
    }

    /// Packed positions of every object, with ids in the same order
    fn packed_positions(&self) -> (Vec<FoliageId>, Vec<f32>) {
        let mut ids = Vec::with_capacity(self.objects.len());
        let mut positions = Vec::with_capacity(self.objects.len() * 3);
        for (&id, object) in &self.objects {
            ids.push(id);
            positions.extend_from_slice(&object.position.to_array());
        }
        (ids, positions)
    }

    /// Number of objects within `max_distance` of `eye`
    pub fn count_visible(&self, eye: Vec3, max_distance: f32) -> usize {
        let (ids, positions) = self.packed_positions();
        let mut flags = vec![0.0; ids.len()];
        batch_distance_cull(&positions, &mut flags, eye, max_distance)
    }

    /// Closest object to `point` and its distance
    pub fn nearest_object(&self, point: Vec3) -> Option<(FoliageId, f32)> {
        let (ids, positions) = self.packed_positions();
        let mut distances = vec![0.0; ids.len()];
        batch_distances(&positions, &mut distances, point);
        ids.into_iter()
            .zip(distances)
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }

    pub fn stats(&self) -> FloraStats {
        FloraStats {
            frame: self.frame,
            objects: self.objects.len(),
            animated: self.driver.len(),
            batches: vec![
                batch_stats(&self.mushrooms),
                batch_stats(&self.dandelions),
                batch_stats(&self.clouds),
                batch_stats(&self.waterfalls),
                batch_stats(&self.glowing_flowers),
                batch_stats(&self.simple_flowers),
                batch_stats(&self.arpeggio_ferns),
                batch_stats(&self.portamento_pines),
            ],
            particles_alive: self.particles.alive(),
            mist_density: self.mist.as_ref().map_or(0.0, |m| m.total_density()),
        }
    }

    pub fn particles(&self) -> &ParticleBuffer {
        &self.particles
    }

    pub fn mist(&self) -> Option<&FluidGrid> {
        self.mist.as_ref()
    }

    pub fn heightmap(&self) -> Option<&SpawnHeightmap> {
        self.heightmap.as_ref()
    }

    /// Install a heightmap computed elsewhere (e.g. on a loading thread)
    pub fn set_heightmap(&mut self, heightmap: SpawnHeightmap) {
        self.heightmap = Some(heightmap);
    }

    /// Ground height, from the precomputed map when available
    pub fn ground_height(&self, x: f32, z: f32) -> f32 {
        match &self.heightmap {
            Some(map) => map.height(x, z),
            None => ground_height(x, z),
        }
    }

    pub fn mushrooms(&self) -> &MushroomBatcher {
        &self.mushrooms
    }

    pub fn dandelions(&self) -> &DandelionBatcher {
        &self.dandelions
    }

    pub fn clouds(&self) -> &CloudBatcher {
        &self.clouds
    }

    pub fn waterfalls(&self) -> &WaterfallBatcher {
        &self.waterfalls
    }

    pub fn glowing_flowers(&self) -> &GlowingFlowerBatcher {
        &self.glowing_flowers
    }

    pub fn simple_flowers(&self) -> &SimpleFlowerBatcher {
        &self.simple_flowers
    }

    pub fn arpeggio_ferns(&self) -> &ArpeggioFernBatcher {
        &self.arpeggio_ferns
    }

    pub fn portamento_pines(&self) -> &PortamentoPineBatcher {
        &self.portamento_pines
    }
}
