use clap::ValueEnum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    #[value(alias = "green")]
    Matrix,
    #[value(alias = "cyan")]
    Cyber,
    #[value(alias = "red")]
    Fire,
    #[value(alias = "mono", alias = "grayscale")]
    Bw,
    Rainbow,
    Dynamic,
    #[value(alias = "fade_up_down", alias = "fade-up-down")]
    Flow,
}

impl ColorMode {
    pub const ALL: [ColorMode; 7] = [
        Self::Matrix,
        Self::Cyber,
        Self::Fire,
        Self::Bw,
        Self::Rainbow,
        Self::Dynamic,
        Self::Flow,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Matrix => "matrix",
            Self::Cyber => "cyber",
            Self::Fire => "fire",
            Self::Bw => "bw",
            Self::Rainbow => "rainbow",
            Self::Dynamic => "dynamic",
            Self::Flow => "flow",
        }
    }

    pub fn cycle(self, step: isize) -> Self {
        let n = Self::ALL.len() as isize;
        let cur = Self::ALL.iter().position(|m| *m == self).unwrap_or(0) as isize;
        Self::ALL[(cur + step).rem_euclid(n) as usize]
    }

    /// Fixed hue for modes that do not derive hue from audio or position.
    pub fn base_hue(self) -> f32 {
        match self {
            Self::Matrix => 120.0,
            Self::Cyber => 190.0,
            Self::Fire | Self::Bw => 0.0,
            Self::Rainbow | Self::Dynamic | Self::Flow => 120.0,
        }
    }

    pub fn saturation(self) -> f32 {
        match self {
            Self::Bw => 0.0,
            Self::Flow => 90.0,
            _ => 100.0,
        }
    }
}

/// Hue in degrees, saturation and lightness in percent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hsl {
    pub h: f32,
    pub s: f32,
    pub l: f32,
}

impl Hsl {
    pub fn new(h: f32, s: f32, l: f32) -> Self {
        Self { h, s, l }
    }

    pub fn to_rgb(self) -> (u8, u8, u8) {
        hsl_to_rgb(self.h, self.s, self.l)
    }
}

/// CSS-style HSL to 8-bit RGB. Hue wraps, saturation and lightness clamp to 0..100.
pub fn hsl_to_rgb(h: f32, s: f32, l: f32) -> (u8, u8, u8) {
    let h = if h.is_finite() { h.rem_euclid(360.0) } else { 0.0 };
    let s = (if s.is_finite() { s } else { 0.0 }).clamp(0.0, 100.0) / 100.0;
    let l = (if l.is_finite() { l } else { 0.0 }).clamp(0.0, 100.0) / 100.0;

    let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let hp = h / 60.0;
    let x = c * (1.0 - (hp % 2.0 - 1.0).abs());
    let (r1, g1, b1) = match hp as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = l - c / 2.0;
    let to_u8 = |v: f32| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    (to_u8(r1), to_u8(g1), to_u8(b1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_hues() {
        assert_eq!(hsl_to_rgb(0.0, 100.0, 50.0), (255, 0, 0));
        assert_eq!(hsl_to_rgb(120.0, 100.0, 50.0), (0, 255, 0));
        assert_eq!(hsl_to_rgb(240.0, 100.0, 50.0), (0, 0, 255));
        assert_eq!(hsl_to_rgb(360.0, 100.0, 50.0), (255, 0, 0));
    }

    #[test]
    fn zero_saturation_is_gray() {
        let (r, g, b) = hsl_to_rgb(200.0, 0.0, 50.0);
        assert_eq!(r, g);
        assert_eq!(g, b);
        assert_eq!(hsl_to_rgb(17.0, 0.0, 100.0), (255, 255, 255));
        assert_eq!(hsl_to_rgb(17.0, 80.0, 0.0), (0, 0, 0));
    }

    #[test]
    fn cycle_wraps_both_ways() {
        assert_eq!(ColorMode::Matrix.cycle(-1), ColorMode::Flow);
        assert_eq!(ColorMode::Flow.cycle(1), ColorMode::Matrix);
    }
}
