use crate::source::{FrameSource, FrameView};

/// Owned RGBA buffer, reallocated only when its dimensions change.
#[derive(Debug, Clone, Default)]
pub struct PixelBuffer {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl PixelBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rgba(width: usize, height: usize, data: Vec<u8>) -> Self {
        assert_eq!(data.len(), width * height * 4, "rgba length mismatch");
        Self {
            width,
            height,
            data,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn as_rgba(&self) -> &[u8] {
        &self.data
    }

    pub fn rgb(&self, x: usize, y: usize) -> (u8, u8, u8) {
        let i = (y * self.width + x) * 4;
        (self.data[i], self.data[i + 1], self.data[i + 2])
    }

    /// Resizes to `width x height`, clearing to opaque black. Returns false (and keeps the
    /// previous contents) when the size is unchanged.
    pub fn resize(&mut self, width: usize, height: usize) -> bool {
        if width == self.width && height == self.height {
            return false;
        }
        self.width = width;
        self.height = height;
        self.data = vec![0; width * height * 4];
        for px in self.data.chunks_exact_mut(4) {
            px[3] = 255;
        }
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownsampleOutcome {
    Drawn,
    /// Source had nothing to read; the buffer still holds the previous frame.
    Skipped,
}

#[derive(Debug, Default)]
pub struct Downsampler {
    buffer: PixelBuffer,
    col_spans: Vec<(usize, usize)>,
    row_spans: Vec<(usize, usize)>,
    reallocations: usize,
}

impl Downsampler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn buffer(&self) -> &PixelBuffer {
        &self.buffer
    }

    pub fn reallocations(&self) -> usize {
        self.reallocations
    }

    pub fn update(
        &mut self,
        source: &mut dyn FrameSource,
        width: usize,
        height: usize,
        mirrored: bool,
    ) -> DownsampleOutcome {
        if self.buffer.resize(width, height) {
            self.reallocations += 1;
            log::debug!("downsample grid resized to {width}x{height}");
        }
        if width == 0 || height == 0 || !source.is_ready() {
            return DownsampleOutcome::Skipped;
        }
        let Some(frame) = source.frame() else {
            return DownsampleOutcome::Skipped;
        };
        if frame.width == 0
            || frame.height == 0
            || frame.rgba.len() < frame.width * frame.height * 4
        {
            return DownsampleOutcome::Skipped;
        }

        // Mirroring is folded into the column table: destination column x reads the source
        // span of column w-1-x.
        fill_spans(&mut self.col_spans, frame.width, width);
        if mirrored {
            self.col_spans.reverse();
        }
        fill_spans(&mut self.row_spans, frame.height, height);

        box_sample(&frame, &self.col_spans, &self.row_spans, &mut self.buffer);
        DownsampleOutcome::Drawn
    }
}

/// Source index range `[start, end)` covered by each of `dst` output cells.
fn fill_spans(spans: &mut Vec<(usize, usize)>, src: usize, dst: usize) {
    spans.clear();
    spans.extend((0..dst).map(|i| {
        let start = (i * src / dst).min(src - 1);
        let end = ((i + 1) * src / dst).clamp(start + 1, src);
        (start, end)
    }));
}

// Caps the per-cell sample count when the source is much larger than the grid.
const MAX_TAPS_PER_AXIS: usize = 6;

fn box_sample(
    frame: &FrameView<'_>,
    col_spans: &[(usize, usize)],
    row_spans: &[(usize, usize)],
    dst: &mut PixelBuffer,
) {
    let stride = frame.width * 4;
    let w = dst.width;
    for (dy, &(y0, y1)) in row_spans.iter().enumerate() {
        let ystep = ((y1 - y0) / MAX_TAPS_PER_AXIS).max(1);
        for (dx, &(x0, x1)) in col_spans.iter().enumerate() {
            let xstep = ((x1 - x0) / MAX_TAPS_PER_AXIS).max(1);
            let (mut r, mut g, mut b, mut n) = (0u32, 0u32, 0u32, 0u32);
            for sy in (y0..y1).step_by(ystep) {
                let row = &frame.rgba[sy * stride..];
                for sx in (x0..x1).step_by(xstep) {
                    let i = sx * 4;
                    r += row[i] as u32;
                    g += row[i + 1] as u32;
                    b += row[i + 2] as u32;
                    n += 1;
                }
            }
            let n = n.max(1);
            let o = (dy * w + dx) * 4;
            dst.data[o] = (r / n) as u8;
            dst.data[o + 1] = (g / n) as u8;
            dst.data[o + 2] = (b / n) as u8;
            dst.data[o + 3] = 255;
        }
    }
}
