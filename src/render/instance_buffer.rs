//! GPU buffers for instanced flora batches and world effects.
//!
//! Each batcher gets one mesh (vertex + index buffer) and one instance
//! buffer sized for the pool's capacity. Syncing uploads the live range
//! `[0, count)` only when the pool was touched since the last upload, and
//! always after every writer of the frame has run. Soft meshes re-upload
//! their vertices when the deform pass moved them. Particles and mist
//! change every frame and are uploaded on every sync.

use std::marker::PhantomData;

use bytemuck::Pod;

use crate::flora::{
    ArpeggioFernInstance, Batcher, CloudInstance, DandelionInstance, FloraWorld, FoliageKind,
    GlowingFlowerInstance, MushroomInstance, PortamentoPineInstance, SimpleFlowerInstance,
    WaterfallInstance,
};
use crate::geometry::{MeshData, Vertex};
use crate::kernels::ParticleBuffer;
use crate::kernels::particles::ParticlePosition;
use crate::pool::DenseInstancePool;

/// wgpu rejects empty buffers
const MIN_BUFFER_SIZE: u64 = 16;

/// Instance buffer mirroring a [`DenseInstancePool`]
pub struct InstanceBuffer<T: Pod> {
    buffer: wgpu::Buffer,
    capacity: u32,
    /// Instances in the last upload
    len: u32,
    uploads: u64,
    _marker: PhantomData<T>,
}

impl<T: Pod> InstanceBuffer<T> {
    /// Bytes needed for `capacity` instances
    pub fn byte_size(capacity: u32) -> u64 {
        (capacity as u64 * std::mem::size_of::<T>() as u64).max(MIN_BUFFER_SIZE)
    }

    pub fn new(device: &wgpu::Device, label: &str, capacity: u32) -> Self {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: Self::byte_size(capacity),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            buffer,
            capacity,
            len: 0,
            uploads: 0,
            _marker: PhantomData,
        }
    }

    /// Upload the pool's live range if it changed. Returns true if an
    /// upload happened.
    pub fn sync(&mut self, queue: &wgpu::Queue, pool: &mut DenseInstancePool<T>) -> bool {
        if !pool.take_dirty() {
            return false;
        }

        self.len = pool.count().min(self.capacity);
        if self.len > 0 {
            let bytes = &pool.as_bytes()[..self.len as usize * std::mem::size_of::<T>()];
            queue.write_buffer(&self.buffer, 0, bytes);
        }
        self.uploads += 1;
        true
    }

    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Uploads since creation
    pub fn uploads(&self) -> u64 {
        self.uploads
    }
}

/// Mesh of a batch
pub struct MeshBuffers {
    pub vertex: wgpu::Buffer,
    pub index: wgpu::Buffer,
    pub index_count: u32,
    /// Vertex rewrites after creation
    pub vertex_uploads: u64,
}

impl MeshBuffers {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, label: &str, mesh: &MeshData) -> Self {
        let vertex = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(format!("{label} vertices").as_str()),
            size: (mesh.vertex_count() as u64 * std::mem::size_of::<Vertex>() as u64).max(MIN_BUFFER_SIZE),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let index = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(format!("{label} indices").as_str()),
            size: (mesh.indices.len() as u64 * 4).max(MIN_BUFFER_SIZE),
            usage: wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        if !mesh.is_empty() {
            queue.write_buffer(&vertex, 0, mesh.vertex_bytes());
            queue.write_buffer(&index, 0, mesh.index_bytes());
        }

        Self {
            vertex,
            index,
            index_count: mesh.indices.len() as u32,
            vertex_uploads: 0,
        }
    }

    /// Rewrite vertex positions of a re-posed mesh. Topology never changes.
    pub fn write_vertices(&mut self, queue: &wgpu::Queue, mesh: &MeshData) {
        if mesh.vertices.is_empty() {
            return;
        }
        queue.write_buffer(&self.vertex, 0, mesh.vertex_bytes());
        self.vertex_uploads += 1;
    }
}

/// Mesh plus instances for one batcher
pub struct BatchBuffers<T: Pod> {
    pub kind: FoliageKind,
    pub mesh: MeshBuffers,
    pub instances: InstanceBuffer<T>,
}

impl<T: Pod> BatchBuffers<T> {
    pub fn new<B: Batcher<Instance = T>>(device: &wgpu::Device, queue: &wgpu::Queue, batcher: &B) -> Self {
        let label = batcher.kind().name();
        Self {
            kind: batcher.kind(),
            mesh: MeshBuffers::new(device, queue, label, batcher.geometry()),
            instances: InstanceBuffer::new(device, &format!("{label} instances"), batcher.pool().capacity()),
        }
    }

    /// Upload what changed in `batcher`: the soft mesh if it was re-posed,
    /// the instances if the pool is dirty. Returns true if instances were
    /// uploaded.
    pub fn sync<B: Batcher<Instance = T>>(&mut self, queue: &wgpu::Queue, batcher: &mut B) -> bool {
        if let Some(soft) = batcher.soft_mesh_mut() {
            if soft.take_dirty() {
                self.mesh.write_vertices(queue, soft.mesh());
            }
        }
        self.instances.sync(queue, batcher.pool_mut())
    }

    /// Indexed draw of the whole live range
    pub fn draw(&self) -> DrawBatch {
        DrawBatch {
            kind: self.kind,
            index_count: self.mesh.index_count,
            instance_count: self.instances.len(),
        }
    }
}

/// Arguments of one instanced draw call
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrawBatch {
    pub kind: FoliageKind,
    pub index_count: u32,
    pub instance_count: u32,
}

/// Particle positions (with life in `w`) and the mist density field
pub struct EffectBuffers {
    pub particles: wgpu::Buffer,
    pub particle_count: u32,
    /// Row-major `size * size` densities, absent when mist is off
    pub mist: Option<wgpu::Buffer>,
    pub mist_size: u32,
}

impl EffectBuffers {
    pub fn new(device: &wgpu::Device, world: &FloraWorld) -> Self {
        let particles = world.particles();
        let particle_bytes = particles.len() as u64 * std::mem::size_of::<ParticlePosition>() as u64;
        let particle_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("flora particles"),
            size: particle_bytes.max(MIN_BUFFER_SIZE),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mist_size = world.mist().map_or(0, |m| m.size());
        let mist = world.mist().map(|grid| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("flora mist density"),
                size: (grid.density().len() as u64 * 4).max(MIN_BUFFER_SIZE),
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        });

        Self {
            particles: particle_buffer,
            particle_count: particles.len() as u32,
            mist,
            mist_size: mist_size as u32,
        }
    }

    /// Upload the current particle and mist state
    pub fn sync(&self, queue: &wgpu::Queue, particles: &ParticleBuffer, mist: Option<&[f32]>) {
        let positions = particles.positions();
        let count = positions.len().min(self.particle_count as usize);
        if count > 0 {
            queue.write_buffer(&self.particles, 0, bytemuck::cast_slice(&positions[..count]));
        }
        if let (Some(buffer), Some(density)) = (&self.mist, mist) {
            if !density.is_empty() {
                queue.write_buffer(buffer, 0, bytemuck::cast_slice(density));
            }
        }
    }
}

/// GPU side of a [`FloraWorld`]
pub struct FloraGpu {
    mushrooms: BatchBuffers<MushroomInstance>,
    dandelions: BatchBuffers<DandelionInstance>,
    clouds: BatchBuffers<CloudInstance>,
    waterfalls: BatchBuffers<WaterfallInstance>,
    glowing_flowers: BatchBuffers<GlowingFlowerInstance>,
    simple_flowers: BatchBuffers<SimpleFlowerInstance>,
    arpeggio_ferns: BatchBuffers<ArpeggioFernInstance>,
    portamento_pines: BatchBuffers<PortamentoPineInstance>,
    effects: EffectBuffers,
}

impl FloraGpu {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, world: &FloraWorld) -> Self {
        let gpu = Self {
            mushrooms: BatchBuffers::new(device, queue, world.mushrooms()),
            dandelions: BatchBuffers::new(device, queue, world.dandelions()),
            clouds: BatchBuffers::new(device, queue, world.clouds()),
            waterfalls: BatchBuffers::new(device, queue, world.waterfalls()),
            glowing_flowers: BatchBuffers::new(device, queue, world.glowing_flowers()),
            simple_flowers: BatchBuffers::new(device, queue, world.simple_flowers()),
            arpeggio_ferns: BatchBuffers::new(device, queue, world.arpeggio_ferns()),
            portamento_pines: BatchBuffers::new(device, queue, world.portamento_pines()),
            effects: EffectBuffers::new(device, world),
        };
        log::info!("Flora GPU buffers created ({} batches)", gpu.draws().len());
        gpu
    }

    /// Upload every dirty batch in the world's pass order, then the
    /// effects. Call after [`FloraWorld::update_frame`]. Returns the number
    /// of instance uploads.
    pub fn sync(&mut self, queue: &wgpu::Queue, world: &mut FloraWorld) -> usize {
        let uploads = [
            self.mushrooms.sync(queue, &mut world.mushrooms),
            self.dandelions.sync(queue, &mut world.dandelions),
            self.clouds.sync(queue, &mut world.clouds),
            self.waterfalls.sync(queue, &mut world.waterfalls),
            self.glowing_flowers.sync(queue, &mut world.glowing_flowers),
            self.simple_flowers.sync(queue, &mut world.simple_flowers),
            self.arpeggio_ferns.sync(queue, &mut world.arpeggio_ferns),
            self.portamento_pines.sync(queue, &mut world.portamento_pines),
        ]
        .into_iter()
        .filter(|&uploaded| uploaded)
        .count();

        self.effects.sync(queue, world.particles(), world.mist().map(|m| m.density()));
        uploads
    }

    pub fn effects(&self) -> &EffectBuffers {
        &self.effects
    }

    /// Vertex rewrites of the soft meshes since creation
    pub fn mesh_uploads(&self) -> u64 {
        [
            &self.mushrooms.mesh,
            &self.dandelions.mesh,
            &self.clouds.mesh,
            &self.waterfalls.mesh,
            &self.glowing_flowers.mesh,
            &self.simple_flowers.mesh,
            &self.arpeggio_ferns.mesh,
            &self.portamento_pines.mesh,
        ]
        .iter()
        .map(|m| m.vertex_uploads)
        .sum()
    }

    /// Draw arguments for every batch, empty ones included
    pub fn draws(&self) -> Vec<DrawBatch> {
        vec![
            self.mushrooms.draw(),
            self.dandelions.draw(),
            self.clouds.draw(),
            self.waterfalls.draw(),
            self.glowing_flowers.draw(),
            self.simple_flowers.draw(),
            self.arpeggio_ferns.draw(),
            self.portamento_pines.draw(),
        ]
    }
}
