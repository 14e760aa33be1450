//! The component modes: Hue, Saturation, Value (in HSV) and Color (in HSL).
//!
//! Hue is scaled to `0..=255` like every other channel, so a sixth of the
//! wheel is `42.5`.

/// Channel with the largest value, and the smallest one.
#[inline]
fn extremes(r: f64, g: f64, b: f64) -> (f64, f64) {
    if r > g {
        (r.max(b), g.min(b))
    } else {
        (g.max(b), r.min(b))
    }
}

/// Shared hue computation, only valid when `max != min`.
fn hue_of(r: f64, g: f64, b: f64, max: f64, min: f64) -> f64 {
    let delta = max - min;

    let hue = if r == max {
        (g - b) / delta
    } else if g == max {
        2.0 + (b - r) / delta
    } else {
        4.0 + (r - g) / delta
    } * 42.5;

    if hue < 0.0 {
        hue + 255.0
    } else if hue > 255.0 {
        hue - 255.0
    } else {
        hue
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Hsv {
    h: f64,
    s: f64,
    v: f64,
}

impl Hsv {
    /// Components are truncated to whole numbers.
    fn from_rgb([r, g, b]: [u8; 3]) -> Self {
        let (r, g, b) = (f64::from(r), f64::from(g), f64::from(b));
        let (max, min) = extremes(r, g, b);

        let s = if max == 0.0 {
            0.0
        } else {
            ((max - min) * 255.0 / max).trunc()
        };

        let h = if s == 0.0 {
            0.0
        } else {
            hue_of(r, g, b, max, min).trunc()
        };

        Self { h, s, v: max }
    }

    fn to_rgb(self) -> [u8; 3] {
        if self.s == 0.0 {
            return [self.v as u8; 3];
        }

        let h = self.h * 6.0 / 255.0;
        let s = self.s / 255.0;
        let v = self.v / 255.0;

        let f = h.fract();
        let p = v * (1.0 - s);
        let q = v * (1.0 - s * f);
        let t = v * (1.0 - s * (1.0 - f));

        let (r, g, b) = match h as u32 % 6 {
            0 => (v, t, p),
            1 => (q, v, p),
            2 => (p, v, t),
            3 => (p, q, v),
            4 => (t, p, v),
            _ => (v, p, q),
        };

        [to_channel(r), to_channel(g), to_channel(b)]
    }
}

/// `0.0..=1.0` to `0..=255`, rounding.
#[inline]
fn to_channel(value: f64) -> u8 {
    (value * 255.0).round().clamp(0.0, 255.0) as u8
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Hsl {
    h: f64,
    s: f64,
    l: f64,
}

impl Hsl {
    /// Components are rounded to whole numbers.
    fn from_rgb([r, g, b]: [u8; 3]) -> Self {
        let (r, g, b) = (f64::from(r), f64::from(g), f64::from(b));
        let (max, min) = extremes(r, g, b);
        let l = (max + min) / 2.0;

        if max == min {
            return Self {
                h: 0.0,
                s: 0.0,
                l: l.round(),
            };
        }

        let delta = max - min;
        let s = if l < 128.0 {
            255.0 * delta / (max + min)
        } else {
            255.0 * delta / (511.0 - max - min)
        };

        Self {
            h: hue_of(r, g, b, max, min).round(),
            s: s.round(),
            l: l.round(),
        }
    }

    fn to_rgb(self) -> [u8; 3] {
        if self.s == 0.0 {
            return [self.l as u8; 3];
        }

        let (h, s, l) = (self.h, self.s, self.l);
        let m2 = if l < 128.0 {
            l * (255.0 + s) / 65025.0
        } else {
            (l + s - l * s / 255.0) / 255.0
        };
        let m1 = l / 127.5 - m2;

        [
            hsl_value(m1, m2, h + 85.0),
            hsl_value(m1, m2, h),
            hsl_value(m1, m2, h - 85.0),
        ]
    }
}

fn hsl_value(n1: f64, n2: f64, hue: f64) -> u8 {
    let hue = if hue > 255.0 {
        hue - 255.0
    } else if hue < 0.0 {
        hue + 255.0
    } else {
        hue
    };

    let value = if hue < 42.5 {
        n1 + (n2 - n1) * (hue / 42.5)
    } else if hue < 127.5 {
        n2
    } else if hue < 170.0 {
        n1 + (n2 - n1) * ((170.0 - hue) / 42.5)
    } else {
        n1
    };

    (value * 255.0).round().clamp(0.0, 255.0) as u8
}

#[inline]
fn rgb(px: [u8; 4]) -> [u8; 3] {
    [px[0], px[1], px[2]]
}

/// Hue of `src`, saturation and value of `dst`.
///
/// A gray `src` has no hue to give, `dst` is kept as is.
pub(super) fn hue(dst: [u8; 4], src: [u8; 4]) -> [u8; 3] {
    let from = Hsv::from_rgb(rgb(src));
    if from.s == 0.0 {
        return rgb(dst);
    }

    let to = Hsv::from_rgb(rgb(dst));
    Hsv { h: from.h, ..to }.to_rgb()
}

/// Saturation of `src`, hue and value of `dst`.
pub(super) fn saturation(dst: [u8; 4], src: [u8; 4]) -> [u8; 3] {
    let from = Hsv::from_rgb(rgb(src));
    let to = Hsv::from_rgb(rgb(dst));

    Hsv { s: from.s, ..to }.to_rgb()
}

/// Value of `src`, hue and saturation of `dst`.
pub(super) fn value(dst: [u8; 4], src: [u8; 4]) -> [u8; 3] {
    let from = Hsv::from_rgb(rgb(src));
    let to = Hsv::from_rgb(rgb(dst));

    Hsv { v: from.v, ..to }.to_rgb()
}

/// Hue and saturation of `src`, lightness of `dst`.
pub(super) fn color(dst: [u8; 4], src: [u8; 4]) -> [u8; 3] {
    let from = Hsl::from_rgb(rgb(src));
    let to = Hsl::from_rgb(rgb(dst));

    Hsl { l: to.l, ..from }.to_rgb()
}
