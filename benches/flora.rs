use criterion::{criterion_group, criterion_main, Criterion, black_box};

use tunegrove::audio::feed::synthetic_frame;
use tunegrove::flora::{AnimationKind, FloraConfig, FloraWorld, FoliageKind, FoliageObject};
use tunegrove::kernels::{
    process_batch, AnimationEntry, AnimationOutput, BatchParams, BatchedAnimation, FluidGrid,
    ParticleBuffer, ParticleStep,
};
use tunegrove::kernels::batch::batch_distance_cull;
use tunegrove::pool::{DenseInstancePool, FoliageId};

use glam::Vec3;

fn bench_pool_churn(c: &mut Criterion) {
    let mut pool: DenseInstancePool<[f32; 16]> = DenseInstancePool::new("bench", 10_000);
    for i in 0..10_000 {
        pool.register(FoliageId(i), [i as f32; 16]);
    }

    c.bench_function("pool_remove_register_10k", |b| {
        let mut next = 10_000u64;
        b.iter(|| {
            // remove from the middle, refill at the end
            let victim = pool.id_at(black_box(5_000)).unwrap();
            pool.remove(victim);
            pool.register(FoliageId(next), [0.0; 16]);
            next += 1;
        });
    });
}

fn bench_tremolo_kernel(c: &mut Criterion) {
    let mut entries: Vec<AnimationEntry> = (0..4096)
        .map(|i| AnimationEntry { offset: i as f32 * 0.01, ..Default::default() })
        .collect();
    let mut outputs = vec![AnimationOutput::default(); entries.len()];
    let params = BatchParams { time: 1.5, groove: 0.4, audio_param: 0.7, ..Default::default() };

    c.bench_function("tremolo_pulse_4096", |b| {
        b.iter(|| {
            process_batch(BatchedAnimation::TremoloPulse, &mut entries, &mut outputs, black_box(params));
        });
    });
}

fn bench_distance_cull(c: &mut Criterion) {
    let positions: Vec<f32> = (0..100_000).flat_map(|i| {
        let f = i as f32;
        [(f * 0.37).sin() * 100.0, 0.0, (f * 0.11).cos() * 100.0]
    }).collect();
    let mut flags = vec![0.0; 100_000];

    c.bench_function("distance_cull_100k", |b| {
        b.iter(|| batch_distance_cull(&positions, &mut flags, black_box(Vec3::ZERO), 50.0));
    });
}

fn bench_particles(c: &mut Criterion) {
    let mut particles = ParticleBuffer::new(10_000, Vec3::new(0.0, 8.0, 0.0), 7);

    c.bench_function("particles_update_10k", |b| {
        b.iter(|| particles.update(black_box(ParticleStep { audio_pulse: 0.5, ..Default::default() })));
    });
}

fn bench_fluid_step(c: &mut Criterion) {
    let mut grid = FluidGrid::new(64);

    c.bench_function("fluid_step_64", |b| {
        b.iter(|| {
            grid.add_density(32, 32, 10.0);
            grid.add_velocity(32, 32, 1.0, 0.5);
            grid.step(black_box(1.0 / 60.0), 0.0001, 0.0001);
        });
    });
}

fn bench_world_frame(c: &mut Criterion) {
    let mut config = FloraConfig::default();
    config.bootstrap_heightmap = false;
    config.fluid_grid_size = 0;
    let mut world = FloraWorld::new(config).unwrap();

    for i in 0..4000u32 {
        let kind = FoliageKind::BATCHED[i as usize % FoliageKind::BATCHED.len()];
        let pos = Vec3::new((i % 64) as f32, 0.0, (i / 64) as f32);
        world.spawn(FoliageObject::new(kind, pos).with_phase(i as f32 * 0.1).with_channel((i % 4) as usize));
    }
    for i in 0..1000u32 {
        let pos = Vec3::new(-((i % 32) as f32), 0.0, (i / 32) as f32);
        world.spawn(FoliageObject::new(FoliageKind::Grass, pos).with_animation(AnimationKind::CymbalShake));
    }

    c.bench_function("world_update_frame_5k", |b| {
        let mut t = 0.0f32;
        b.iter(|| {
            t += 1.0 / 60.0;
            let audio = synthetic_frame(t);
            world.update_frame(black_box(&audio), t, 1.0 / 60.0);
        });
    });
}

criterion_group!(
    benches,
    bench_pool_churn,
    bench_tremolo_kernel,
    bench_distance_cull,
    bench_particles,
    bench_fluid_step,
    bench_world_frame,
);
criterion_main!(benches);
