//! Foliage object records and their type tags.

use glam::{EulerRot, Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::kernels::BatchedAnimation;

/// What a foliage object is. Decides which batcher owns it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FoliageKind {
    Mushroom,
    Dandelion,
    Cloud,
    Waterfall,
    GlowingFlower,
    SimpleFlower,
    ArpeggioFern,
    PortamentoPine,
    /// Loose object, animated by the animation driver
    Grass,
    /// Loose object, animated by the animation driver
    Tree,
}

impl FoliageKind {
    /// Kinds drawn through an instance batcher
    pub const BATCHED: [Self; 8] = [
        Self::Mushroom,
        Self::Dandelion,
        Self::Cloud,
        Self::Waterfall,
        Self::GlowingFlower,
        Self::SimpleFlower,
        Self::ArpeggioFern,
        Self::PortamentoPine,
    ];

    pub fn is_batched(self) -> bool {
        !matches!(self, Self::Grass | Self::Tree)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Mushroom => "mushroom",
            Self::Dandelion => "dandelion",
            Self::Cloud => "cloud",
            Self::Waterfall => "waterfall",
            Self::GlowingFlower => "glowing_flower",
            Self::SimpleFlower => "simple_flower",
            Self::ArpeggioFern => "arpeggio_fern",
            Self::PortamentoPine => "portamento_pine",
            Self::Grass => "grass",
            Self::Tree => "tree",
        }
    }
}

/// Animation-type tag. Numeric values match the animation metadata tags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum AnimationKind {
    #[default]
    None = 0,
    Sway = 1,
    Bounce = 2,
    Wobble = 3,
    Hop = 4,
    Gentle = 5,
    Float = 6,
    SnareSnap = 13,
    Accordion = 14,
    FiberWhip = 15,
    SpiralWave = 16,
    VibratoShake = 17,
    TremoloPulse = 18,
    CymbalShake = 19,
    PanningBob = 20,
    SpiritFade = 21,
}

impl AnimationKind {
    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            0 => Self::None,
            1 => Self::Sway,
            2 => Self::Bounce,
            3 => Self::Wobble,
            4 => Self::Hop,
            5 => Self::Gentle,
            6 => Self::Float,
            _ => BatchedAnimation::from_tag(tag)?.into(),
        })
    }

    /// The batch kernel for this animation, if it runs through one
    pub fn batched(self) -> Option<BatchedAnimation> {
        BatchedAnimation::from_tag(self.tag())
    }
}

impl From<BatchedAnimation> for AnimationKind {
    fn from(kind: BatchedAnimation) -> Self {
        match kind {
            BatchedAnimation::SnareSnap => Self::SnareSnap,
            BatchedAnimation::Accordion => Self::Accordion,
            BatchedAnimation::FiberWhip => Self::FiberWhip,
            BatchedAnimation::SpiralWave => Self::SpiralWave,
            BatchedAnimation::VibratoShake => Self::VibratoShake,
            BatchedAnimation::TremoloPulse => Self::TremoloPulse,
            BatchedAnimation::CymbalShake => Self::CymbalShake,
            BatchedAnimation::PanningBob => Self::PanningBob,
            BatchedAnimation::SpiritFade => Self::SpiritFade,
        }
    }
}

/// Animated offset on top of the rest transform
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pose {
    /// Euler angles (XYZ), radians
    pub euler: Vec3,
    /// Multiplies the rest scale
    pub scale: Vec3,
    pub opacity: f32,
}

impl Default for Pose {
    fn default() -> Self {
        Self { euler: Vec3::ZERO, scale: Vec3::ONE, opacity: 1.0 }
    }
}

/// One decorative object in the world
#[derive(Clone, Debug, PartialEq)]
pub struct FoliageObject {
    pub kind: FoliageKind,
    pub animation: AnimationKind,
    /// Random phase offset so neighbours don't move in lockstep
    pub phase: f32,
    /// Rest height, cached at creation
    pub original_y: f32,
    pub position: Vec3,
    /// Rest rotation
    pub rotation: Quat,
    /// Rest scale
    pub scale: Vec3,
    /// Note index (60 = C4) used for colouring
    pub note: Option<u8>,
    /// Playback channel the object listens to
    pub channel: Option<usize>,
    pub pose: Pose,
}

impl FoliageObject {
    pub fn new(kind: FoliageKind, position: Vec3) -> Self {
        Self {
            kind,
            animation: AnimationKind::None,
            phase: 0.0,
            original_y: position.y,
            position,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            note: None,
            channel: None,
            pose: Pose::default(),
        }
    }

    pub fn with_animation(mut self, animation: AnimationKind) -> Self {
        self.animation = animation;
        self
    }

    pub fn with_phase(mut self, phase: f32) -> Self {
        self.phase = phase;
        self
    }

    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = Vec3::splat(scale);
        self
    }

    pub fn with_yaw(mut self, yaw: f32) -> Self {
        self.rotation = Quat::from_rotation_y(yaw);
        self
    }

    pub fn with_note(mut self, note: u8) -> Self {
        self.note = Some(note);
        self
    }

    pub fn with_channel(mut self, channel: usize) -> Self {
        self.channel = Some(channel);
        self
    }

    /// Move the object and re-cache its rest height
    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.original_y = position.y;
    }

    /// Rest rotation combined with the animated pose
    pub fn posed_rotation(&self) -> Quat {
        let e = self.pose.euler;
        self.rotation * Quat::from_euler(EulerRot::XYZ, e.x, e.y, e.z)
    }

    pub fn transform(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale * self.pose.scale, self.posed_rotation(), self.position)
    }
}
