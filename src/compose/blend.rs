use super::{color, BlendingMode};
use nanorand::{Rng, WyRand};
use num_traits::clamp;

/// Blends `src` over `dst`, returning the new `dst` pixel.
///
/// Both pixels are straight alpha RGBA. `rng` is only consumed by
/// [`BlendingMode::Dissolve`].
pub fn blend(mode: BlendingMode, dst: [u8; 4], src: [u8; 4], rng: &mut WyRand) -> [u8; 4] {
    match mode {
        BlendingMode::Normal => normal(dst, src, src[3]),
        BlendingMode::Dissolve => dissolve(dst, src, rng),
        BlendingMode::Behind => dst,
        BlendingMode::Hue => math(dst, color::hue(dst, src), src[3]),
        BlendingMode::Saturation => math(dst, color::saturation(dst, src), src[3]),
        BlendingMode::Value => math(dst, color::value(dst, src), src[3]),
        BlendingMode::Color => math(dst, color::color(dst, src), src[3]),
        _ => match channel_op(mode) {
            Some(channel) => {
                let mut rgb = [0; 3];
                for (out, (&d, &s)) in rgb.iter_mut().zip(dst.iter().zip(&src)) {
                    *out = channel(d.into(), s.into()) as u8;
                }
                math(dst, rgb, src[3])
            }
            // unknown modes overwrite.
            None => src,
        },
    }
}

/// Per-channel function of the separable modes, [`None`] for the rest.
///
/// Results are always within `0..=255`.
fn channel_op(mode: BlendingMode) -> Option<fn(u32, u32) -> u32> {
    let op: fn(u32, u32) -> u32 = match mode {
        BlendingMode::Multiply => multiply,
        BlendingMode::Screen => screen,
        BlendingMode::Overlay | BlendingMode::Softlight => overlay,
        BlendingMode::Difference => |d: u32, s: u32| d.abs_diff(s),
        BlendingMode::Addition => |d: u32, s: u32| (d + s).min(255),
        BlendingMode::Subtract => |d: u32, s: u32| d.saturating_sub(s),
        BlendingMode::DarkenOnly => |d: u32, s: u32| d.min(s),
        BlendingMode::LightenOnly => |d: u32, s: u32| d.max(s),
        BlendingMode::Divide => divide,
        BlendingMode::Dodge => dodge,
        BlendingMode::Burn => burn,
        BlendingMode::Hardlight => hardlight,
        BlendingMode::GrainExtract => |d: u32, s: u32| clamp(d as i32 - s as i32 + 128, 0, 255) as u32,
        BlendingMode::GrainMerge => |d: u32, s: u32| clamp(d as i32 + s as i32 - 128, 0, 255) as u32,
        _ => return None,
    };

    Some(op)
}

/// Normal blend of `rgb` with the effective alpha `min(da, sa)`, shared by
/// every mode that computes its color from both layers.
#[inline]
fn math(dst: [u8; 4], rgb: [u8; 3], sa: u8) -> [u8; 4] {
    normal(dst, [rgb[0], rgb[1], rgb[2], sa], sa.min(dst[3]))
}

/// Plain "over" of `src` with alpha `sa`.
fn normal(dst: [u8; 4], src: [u8; 4], sa: u8) -> [u8; 4] {
    let (da, sa) = (u32::from(dst[3]), u32::from(sa));

    let alpha = 255 - (255 - da) * (255 - sa) / 255;
    if alpha == 0 {
        return dst;
    }

    // `sa <= alpha`, so `k` stays within `0..=255`.
    let k = 255 * sa / alpha;
    let mix = |d: u8, s: u8| (((255 - k) * u32::from(d) + k * u32::from(s)) / 255) as u8;

    [
        mix(dst[0], src[0]),
        mix(dst[1], src[1]),
        mix(dst[2], src[2]),
        alpha as u8,
    ]
}

fn dissolve(dst: [u8; 4], src: [u8; 4], rng: &mut WyRand) -> [u8; 4] {
    if rng.generate::<u8>() <= src[3] {
        [src[0], src[1], src[2], 255]
    } else {
        dst
    }
}

fn multiply(d: u32, s: u32) -> u32 {
    d * s / 255
}

fn screen(d: u32, s: u32) -> u32 {
    255 - (255 - d) * (255 - s) / 255
}

fn overlay(d: u32, s: u32) -> u32 {
    let inv = 255 - s;
    ((inv * d * d / 255 + d * (255 - inv * inv / 255)) / 255).min(255)
}

fn divide(d: u32, s: u32) -> u32 {
    match s {
        0 if d == 0 => 0,
        0 => 255,
        s => (255 * d / s).min(255),
    }
}

fn dodge(d: u32, s: u32) -> u32 {
    match s {
        255 if d == 0 => 0,
        255 => 255,
        s => (255 * d / (255 - s)).min(255),
    }
}

fn burn(d: u32, s: u32) -> u32 {
    match s {
        0 if d == 255 => 255,
        0 => 0,
        s => 255 - (255 * (255 - d) / s).min(255),
    }
}

fn hardlight(d: u32, s: u32) -> u32 {
    if s < 128 {
        2 * d * s / 255
    } else {
        255 - 2 * (255 - d) * (255 - s) / 255
    }
}
