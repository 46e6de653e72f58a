use super::{FrameSource, FrameView};
use crate::config::VideoSource;
use std::f32::consts::TAU;
use std::time::Instant;

/// Animated plasma with a bright orbiting spot. Needs no devices, so it doubles as a demo
/// source and a fixture for tests.
pub struct TestPattern {
    width: usize,
    height: usize,
    start: Instant,
    frozen_at: Option<f32>,
    rgba: Vec<u8>,
}

impl TestPattern {
    pub fn new(width: usize, height: usize) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            width,
            height,
            start: Instant::now(),
            frozen_at: None,
            rgba: vec![0; width * height * 4],
        }
    }

    /// Pins the animation clock to `t` seconds.
    pub fn freeze_at(mut self, t: f32) -> Self {
        self.frozen_at = Some(t);
        self
    }

    fn paint(&mut self, t: f32) {
        let (w, h) = (self.width as f32, self.height as f32);
        let spot_x = 0.5 + 0.3 * (t * 0.7).cos();
        let spot_y = 0.5 + 0.3 * (t * 0.9).sin();
        for (i, px) in self.rgba.chunks_exact_mut(4).enumerate() {
            let x = (i % self.width) as f32 / w;
            let y = (i / self.width) as f32 / h;
            let v = ((x * 6.0 + t).sin() + (y * 5.0 - t * 1.3).sin() + ((x + y) * 4.0 + t * 0.6).sin())
                / 3.0;
            let dx = x - spot_x;
            let dy = y - spot_y;
            let spot = (1.0 - (dx * dx + dy * dy).sqrt() * 5.0).max(0.0);
            let base = (v * 0.5 + 0.5) * 0.7 + spot;
            px[0] = ((base * (0.6 + 0.4 * (t * 0.3).sin())).clamp(0.0, 1.0) * 255.0) as u8;
            px[1] = ((base * (0.5 + 0.5 * (x * TAU).cos().abs())).clamp(0.0, 1.0) * 255.0) as u8;
            px[2] = ((base * (0.8 - 0.3 * y)).clamp(0.0, 1.0) * 255.0) as u8;
            px[3] = 255;
        }
    }
}

impl FrameSource for TestPattern {
    fn kind(&self) -> VideoSource {
        VideoSource::TestPattern
    }

    fn label(&self) -> &str {
        "test pattern"
    }

    fn is_ready(&self) -> bool {
        true
    }

    fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    fn frame(&mut self) -> Option<FrameView<'_>> {
        let t = self
            .frozen_at
            .unwrap_or_else(|| self.start.elapsed().as_secs_f32());
        self.paint(t);
        Some(FrameView {
            width: self.width,
            height: self.height,
            rgba: &self.rgba,
        })
    }
}
