//! Tunegrove - headless flora simulation
//!
//! Usage: cargo run --release -- --frames 1200 --objects 5000 [--audio feed.jsonl]
//!        [--config flora.json] [--save-config out.json] [--gpu] [--seed N]

use std::f32::consts::TAU;
use std::path::PathBuf;
use std::time::Instant;

use glam::Vec3;

use tunegrove::audio::AudioFeed;
use tunegrove::core::{logging, time::FrameClock, Error, Result};
use tunegrove::flora::{AnimationKind, FloraConfig, FloraWorld, FoliageKind, FoliageObject};
use tunegrove::kernels::{SpawnHeightmap, XorShift32};
use tunegrove::render::{FloraGpu, GpuContext};

const USAGE: &str = "Usage: tunegrove [--frames N] [--objects N] [--fps N] [--seed N] \
                     [--audio feed.jsonl] [--config flora.json] [--save-config out.json] [--gpu]";

struct Options {
    frames: u64,
    objects: u32,
    fps: f32,
    seed: u32,
    audio: Option<PathBuf>,
    config: Option<PathBuf>,
    save_config: Option<PathBuf>,
    gpu: bool,
}

impl Options {
    fn parse(args: &[String]) -> Result<Self> {
        fn value<'a>(args: &'a [String], flag: &str) -> Option<&'a String> {
            args.iter().position(|a| a == flag).and_then(|i| args.get(i + 1))
        }
        fn number<T: std::str::FromStr>(args: &[String], flag: &str, default: T) -> Result<T> {
            match value(args, flag) {
                Some(v) => v
                    .parse()
                    .map_err(|_| Error::Config(format!("{} expects a number, got '{}'", flag, v))),
                None => Ok(default),
            }
        }

        Ok(Self {
            frames: number(args, "--frames", 600)?,
            objects: number(args, "--objects", 2000)?,
            fps: number(args, "--fps", 60.0)?,
            seed: number(args, "--seed", 12345)?,
            audio: value(args, "--audio").map(PathBuf::from),
            config: value(args, "--config").map(PathBuf::from),
            save_config: value(args, "--save-config").map(PathBuf::from),
            gpu: args.iter().any(|a| a == "--gpu"),
        })
    }
}

/// Loose objects cycle through these
const LOOSE_ANIMATIONS: [AnimationKind; 10] = [
    AnimationKind::Sway,
    AnimationKind::Gentle,
    AnimationKind::Wobble,
    AnimationKind::Hop,
    AnimationKind::Float,
    AnimationKind::SnareSnap,
    AnimationKind::FiberWhip,
    AnimationKind::CymbalShake,
    AnimationKind::PanningBob,
    AnimationKind::SpiritFade,
];

/// Scatter `count` objects over the spawn area, every kind represented
fn populate(world: &mut FloraWorld, count: u32, seed: u32) {
    let mut rng = XorShift32::new(seed);
    let kinds = [
        FoliageKind::Grass,
        FoliageKind::Grass,
        FoliageKind::SimpleFlower,
        FoliageKind::SimpleFlower,
        FoliageKind::GlowingFlower,
        FoliageKind::Mushroom,
        FoliageKind::Dandelion,
        FoliageKind::ArpeggioFern,
        FoliageKind::PortamentoPine,
        FoliageKind::Tree,
        FoliageKind::Cloud,
        FoliageKind::Waterfall,
    ];

    for i in 0..count {
        let kind = kinds[(rng.next_u32() as usize) % kinds.len()];
        let angle = rng.range(0.0, TAU);
        // sqrt keeps the disc evenly covered
        let radius = rng.next_f32().sqrt() * 30.0;
        let (x, z) = (angle.cos() * radius, angle.sin() * radius);
        let y = match kind {
            FoliageKind::Cloud => 25.0 + rng.range(0.0, 8.0),
            _ => world.ground_height(x, z),
        };

        let mut object = FoliageObject::new(kind, Vec3::new(x, y, z))
            .with_phase(rng.range(0.0, TAU))
            .with_yaw(rng.range(0.0, TAU))
            .with_scale(rng.range(0.8, 1.3))
            .with_channel((rng.next_u32() % 4) as usize)
            .with_note(48 + (rng.next_u32() % 24) as u8);
        if !kind.is_batched() {
            object = object.with_animation(LOOSE_ANIMATIONS[i as usize % LOOSE_ANIMATIONS.len()]);
        }
        world.spawn(object);
    }
}

fn run(options: Options) -> Result<()> {
    let mut config = match &options.config {
        Some(path) => FloraConfig::load(path)?,
        None => FloraConfig::default(),
    };
    if let Some(path) = &options.save_config {
        config.save(path)?;
        log::info!("Wrote config to {}", path.display());
    }

    let feed = match &options.audio {
        Some(path) => AudioFeed::load_jsonl(path)?,
        None => AudioFeed::Synthetic,
    };

    // heightmap on a worker while the batchers build their meshes
    let bootstrap = config.bootstrap_heightmap;
    config.bootstrap_heightmap = false;
    let pending = bootstrap.then(SpawnHeightmap::spawn);

    let mut world = FloraWorld::new(config)?;

    if let Some((progress, handle)) = pending {
        let mut reported = 0;
        while !progress.is_complete() {
            let percent = progress.percent();
            if percent >= reported + 25 {
                log::info!("Spawn heightmap {}%", percent);
                reported = percent;
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        match handle.join() {
            Ok(map) => world.set_heightmap(map),
            Err(_) => log::warn!("Heightmap worker panicked, using the slow ground path"),
        }
    }

    populate(&mut world, options.objects, options.seed);
    log::info!("Populated: {}", world.stats());

    let mut gpu = if options.gpu {
        match GpuContext::new_headless_blocking() {
            Ok(ctx) => {
                let flora = FloraGpu::new(&ctx.device, &ctx.queue, &world);
                Some((ctx, flora))
            }
            Err(e) => {
                log::warn!("{}; continuing without uploads", e);
                None
            }
        }
    } else {
        None
    };

    let fps = options.fps.max(1.0);
    let report_every = (fps as u64).max(1);
    let mut clock = FrameClock::new();
    let mut uploads = 0usize;
    let start = Instant::now();

    for frame in 0..options.frames {
        clock.advance(1.0 / fps);
        let audio = feed.frame(frame, clock.elapsed());
        world.update_frame(&audio, clock.elapsed(), clock.delta());

        if let Some((ctx, flora)) = gpu.as_mut() {
            uploads += flora.sync(&ctx.queue, &mut world);
        }

        if (frame + 1) % report_every == 0 {
            log::info!("{}", world.stats());
        }
    }

    let wall = start.elapsed().as_secs_f64();
    let window = clock.window(5.0);
    let stats = world.stats();
    log::info!(
        "Simulated {} frames ({:.1}s at {:.0} fps) in {:.2}s wall, {:.3} ms/frame",
        clock.frame_count(),
        clock.elapsed(),
        window.avg_fps,
        wall,
        wall * 1000.0 / options.frames.max(1) as f64
    );
    for batch in &stats.batches {
        log::info!(
            "  {:<16} {:>6}/{:<6} dropped {}",
            batch.kind.name(),
            batch.count,
            batch.capacity,
            batch.dropped
        );
    }
    let eye = Vec3::new(0.0, 2.0, 0.0);
    log::info!("Within 40m of the origin: {} objects", world.count_visible(eye, 40.0));
    if let Some((id, distance)) = world.nearest_object(eye) {
        log::info!("Nearest object: {} at {:.1}m", id, distance);
    }
    if gpu.is_some() {
        log::info!("GPU uploads: {}", uploads);
    }
    Ok(())
}

fn main() {
    logging::init();

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        println!("{}", USAGE);
        return;
    }

    let result = Options::parse(&args).and_then(run);
    if let Err(e) = result {
        log::error!("{}", e);
        eprintln!("{}", USAGE);
        std::process::exit(1);
    }
}
