//! Flora configuration (capacities and per-batcher tuning).
//!
//! Every field has a default, so a config file only needs the values it
//! changes.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::{Error, Result};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MushroomConfig {
    pub capacity: u32,
    /// Cap squash at a full-strength trigger (0.3 = 30% shorter)
    pub bounce_squash: f32,
    /// Bounce envelope release rate, per second
    pub bounce_release: f32,
    /// Glow release rate after a kick, per second
    pub glow_release: f32,
}

impl Default for MushroomConfig {
    fn default() -> Self {
        Self { capacity: 2048, bounce_squash: 0.3, bounce_release: 6.0, glow_release: 4.0 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DandelionConfig {
    pub capacity: u32,
    /// Seconds for a blown seed head to grow back
    pub regrow_seconds: f32,
    /// Kick level that counts as a hit
    pub kick_threshold: f32,
    /// Stem sway amplitude in radians at zero groove
    pub sway: f32,
}

impl Default for DandelionConfig {
    fn default() -> Self {
        Self { capacity: 1024, regrow_seconds: 3.0, kick_threshold: 0.5, sway: 0.05 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudConfig {
    pub capacity: u32,
    /// Drift speed along +X, units per second
    pub drift_speed: f32,
    /// Clouds wrap around within this distance of their home position
    pub drift_radius: f32,
    /// Rain intensity smoothing rate, per second
    pub rain_response: f32,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self { capacity: 256, drift_speed: 1.5, drift_radius: 60.0, rain_response: 2.0 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaterfallConfig {
    pub capacity: u32,
    /// Texture scroll speed with no beat surge, UV units per second
    pub flow_speed: f32,
    /// Extra speed at the start of each beat, as a fraction of `flow_speed`
    pub beat_surge: f32,
    pub foam_release: f32,
}

impl Default for WaterfallConfig {
    fn default() -> Self {
        Self { capacity: 64, flow_speed: 0.8, beat_surge: 0.75, foam_release: 3.0 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlowingFlowerConfig {
    pub capacity: u32,
    pub emission_attack: f32,
    pub emission_release: f32,
}

impl Default for GlowingFlowerConfig {
    fn default() -> Self {
        Self { capacity: 2048, emission_attack: 25.0, emission_release: 4.0 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimpleFlowerConfig {
    pub capacity: u32,
    /// Sway amplitude in radians
    pub sway: f32,
}

impl Default for SimpleFlowerConfig {
    fn default() -> Self {
        Self { capacity: 4096, sway: 0.1 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArpeggioFernConfig {
    pub capacity: u32,
    /// Fronds that can open, one per arpeggio note
    pub max_steps: u32,
}

impl Default for ArpeggioFernConfig {
    fn default() -> Self {
        Self { capacity: 512, max_steps: 12 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortamentoPineConfig {
    pub capacity: u32,
    /// Bend at full pan, radians
    pub max_bend: f32,
    /// Smoothing time normally
    pub smooth_time: f32,
    /// Smoothing time while a portamento slide is running
    pub slide_smooth_time: f32,
}

impl Default for PortamentoPineConfig {
    fn default() -> Self {
        Self { capacity: 512, max_bend: 0.35, smooth_time: 0.4, slide_smooth_time: 0.08 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticleConfig {
    pub count: usize,
    pub spawn: [f32; 3],
    pub seed: u32,
    pub gravity: f32,
}

impl Default for ParticleConfig {
    fn default() -> Self {
        Self { count: 4096, spawn: [0.0, 8.0, 0.0], seed: 12345, gravity: -9.8 }
    }
}

/// Top-level flora settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FloraConfig {
    pub mushroom: MushroomConfig,
    pub dandelion: DandelionConfig,
    pub cloud: CloudConfig,
    pub waterfall: WaterfallConfig,
    pub glowing_flower: GlowingFlowerConfig,
    pub simple_flower: SimpleFlowerConfig,
    pub arpeggio_fern: ArpeggioFernConfig,
    pub portamento_pine: PortamentoPineConfig,
    /// Loose (non-batched) objects handled by the animation driver
    pub loose_capacity: u32,
    pub particles: ParticleConfig,
    /// Side of the mist fluid grid
    pub fluid_grid_size: usize,
    /// Precompute the spawn heightmap on world creation
    pub bootstrap_heightmap: bool,
    /// Bend the shared cloud, mushroom, waterfall and pine meshes each frame
    pub soft_meshes: bool,
}

impl Default for FloraConfig {
    fn default() -> Self {
        Self {
            mushroom: MushroomConfig::default(),
            dandelion: DandelionConfig::default(),
            cloud: CloudConfig::default(),
            waterfall: WaterfallConfig::default(),
            glowing_flower: GlowingFlowerConfig::default(),
            simple_flower: SimpleFlowerConfig::default(),
            arpeggio_fern: ArpeggioFernConfig::default(),
            portamento_pine: PortamentoPineConfig::default(),
            loose_capacity: 4096,
            particles: ParticleConfig::default(),
            fluid_grid_size: crate::kernels::fluid::DEFAULT_GRID_SIZE,
            bootstrap_heightmap: true,
            soft_meshes: true,
        }
    }
}

impl FloraConfig {
    /// Load from a JSON file and validate
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        log::info!("Loaded flora config from {}", path.display());
        Ok(config)
    }

    /// Save as pretty JSON, creating parent directories
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Reject values the batchers can't work with
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("dandelion.regrow_seconds", self.dandelion.regrow_seconds),
            ("cloud.drift_radius", self.cloud.drift_radius),
            ("portamento_pine.smooth_time", self.portamento_pine.smooth_time),
            ("portamento_pine.slide_smooth_time", self.portamento_pine.slide_smooth_time),
        ];
        for (name, value) in positive {
            if !(value > 0.0) {
                return Err(Error::Config(format!("{} must be positive, got {}", name, value)));
            }
        }
        if self.arpeggio_fern.max_steps == 0 {
            return Err(Error::Config("arpeggio_fern.max_steps must be at least 1".into()));
        }
        Ok(())
    }

    /// Sum of all batcher capacities
    pub fn total_capacity(&self) -> u64 {
        [
            self.mushroom.capacity,
            self.dandelion.capacity,
            self.cloud.capacity,
            self.waterfall.capacity,
            self.glowing_flower.capacity,
            self.simple_flower.capacity,
            self.arpeggio_fern.capacity,
            self.portamento_pine.capacity,
        ]
        .iter()
        .map(|&c| c as u64)
        .sum()
    }
}
