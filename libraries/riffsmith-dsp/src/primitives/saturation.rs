//! Static waveshaping curves shared by the drive and amp stages

use riffsmith_core::{AmpModel, DriveType};

/// Symmetric tanh saturation
#[inline]
pub fn soft_clip(x: f32) -> f32 {
    x.tanh()
}

/// Brick-wall clip at ±0.95
#[inline]
pub fn hard_clip(x: f32) -> f32 {
    x.clamp(-0.95, 0.95)
}

/// Asymmetric overdrive: harder on the positive half-wave
#[inline]
pub fn tube(x: f32) -> f32 {
    if x > 0.0 {
        (x * 1.5).tanh() * 0.7
    } else {
        (x * 0.8).tanh() * 0.9
    }
}

/// Gated square-ish fuzz; quiet signals get a linear boost
#[inline]
pub fn fuzz(x: f32) -> f32 {
    let magnitude = x.abs();
    if magnitude < 0.1 {
        x * 5.0
    } else {
        x.signum() * (0.5 + 0.5 * (magnitude * 10.0).tanh())
    }
}

/// Curve for a drive pedal type
#[inline]
pub fn shape(drive_type: DriveType, x: f32) -> f32 {
    match drive_type {
        DriveType::SoftClip => soft_clip(x),
        DriveType::HardClip => hard_clip(x),
        DriveType::Tube => tube(x),
        DriveType::Fuzz => fuzz(x),
    }
}

/// Warm, gently compressing preamp curve
#[inline]
pub fn tube_warm(x: f32) -> f32 {
    let y = x / (1.0 + x.abs());
    0.6 * y + 0.4 * (x * 0.8).tanh()
}

/// Chimey crunch with a touch of even-order asymmetry
#[inline]
pub fn tube_crunch(x: f32) -> f32 {
    (x + 0.1 * x * x).tanh()
}

/// Two cascaded saturation stages with a small bias
#[inline]
pub fn tube_high_gain(x: f32) -> f32 {
    let first = (1.8 * x + 0.05).tanh() - 0.05f32.tanh();
    (2.2 * first).tanh()
}

/// Solid-state style clipping with a soft corner
#[inline]
pub fn solid_state(x: f32) -> f32 {
    if x.abs() < 0.6 {
        x
    } else {
        x.signum() * (0.6 + 0.4 * ((x.abs() - 0.6) / 0.4).tanh())
    }
}

/// Preamp curve for an amp voicing
#[inline]
pub fn amp_curve(model: AmpModel, x: f32) -> f32 {
    match model {
        AmpModel::CleanBlackface => tube_warm(x),
        AmpModel::JanglyVox => tube_crunch(x),
        AmpModel::BritCrunch => 0.7 * tube_crunch(x) + 0.3 * solid_state(x),
        AmpModel::HiGain => tube_high_gain(x),
    }
}
