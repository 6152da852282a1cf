use std::collections::VecDeque;
use std::io::Cursor;
use std::time::{Duration, Instant};
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use plotters::prelude::*;
use crate::drivers::buffer::SampleBuffer;
use crate::drivers::error::ScopeError;
use crate::drivers::signal::{DisplayRange, SignalDescriptor};
use crate::drivers::view::ViewParameters;
#[derive(Clone, Debug)]
pub struct ScopeStyle {
    pub background: RGBColor,
    pub grid_minor: RGBColor,
    pub grid_major: RGBColor,
    pub primary: RGBColor,
    pub envelope: RGBColor,
    pub primary_width: u32,
    pub envelope_width: u32,
    pub grid_x: u32,
    pub grid_y: u32,
    /// Minor subdivisions per major division; 0 or 1 disables them.
    pub minor_per_major: u32,
    /// Sample count shown edge to edge at 100% horizontal zoom.
    pub base_capacity: usize,
}
impl Default for ScopeStyle {
    fn default() -> Self {
        Self {
            background: RGBColor(254, 254, 254),
            grid_minor: RGBColor(200, 224, 200),
            grid_major: RGBColor(144, 192, 144),
            primary: RGBColor(0, 102, 204),
            envelope: RGBColor(220, 38, 38),
            primary_width: 2,
            envelope_width: 3,
            grid_x: 10,
            grid_y: 8,
            minor_per_major: 5,
            base_capacity: 1200,
        }
    }
}
/// One painted scope image, RGB8, row-major.
#[derive(Clone, Debug)]
pub struct ScopeFrame {
    pub width: u32,
    pub height: u32,
    pub rgb: Vec<u8>,
}
impl ScopeFrame {
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = ((y * self.width + x) * 3) as usize;
        Some([self.rgb[idx], self.rgb[idx + 1], self.rgb[idx + 2]])
    }
    pub fn to_png(&self) -> Result<Vec<u8>, ScopeError> {
        encode_png(&self.rgb, self.width, self.height)
    }
}
/// Screen row for `value`. Larger values map to smaller rows.
///
/// `offset` shifts the trace in half-spans of the zoomed range.
pub fn map_y(value: f64, range: DisplayRange, zoom: f64, offset: f64, height: f64) -> f64 {
    let mid = range.mid();
    let half_span = (range.max - range.min) / zoom / 2.0;
    let norm = (value - mid + offset * half_span) / half_span;
    height / 2.0 - norm * height / 2.0
}
/// How many of the newest samples are drawn.
pub fn visible_count(len: usize, base_capacity: usize, horizontal_zoom: f64) -> usize {
    let capacity = (base_capacity as f64 / horizontal_zoom).floor() as usize;
    len.min(capacity)
}
/// Screen points for the newest `visible_count` values; older ones are skipped, not clipped.
pub fn trace_points(
    values: &VecDeque<f64>,
    range: DisplayRange,
    view: &ViewParameters,
    base_capacity: usize,
    width: f64,
    height: f64,
) -> Vec<(f64, f64)> {
    let visible = visible_count(values.len(), base_capacity, view.horizontal_zoom_factor());
    if visible < 2 {
        return Vec::new();
    }
    let start = values.len() - visible;
    let step = width / (visible - 1) as f64;
    values
        .iter()
        .skip(start)
        .enumerate()
        .map(|(i, v)| {
            let y = map_y(
                *v,
                range,
                view.vertical_zoom_factor(),
                view.vertical_offset,
                height,
            );
            (i as f64 * step, y)
        })
        .collect()
}
/// Paints buffer contents into a scope image.
pub struct ScopeRenderer {
    style: ScopeStyle,
}
impl ScopeRenderer {
    pub fn new(style: ScopeStyle) -> Self {
        Self { style }
    }
    pub fn style(&self) -> &ScopeStyle {
        &self.style
    }
    pub fn render(
        &self,
        buffer: &SampleBuffer,
        descriptor: &SignalDescriptor,
        view: &ViewParameters,
        width: u32,
        height: u32,
    ) -> Result<ScopeFrame, ScopeError> {
        if width == 0 || height == 0 {
            return Err(ScopeError::Plot("scope area has zero size".into()));
        }
        let style = &self.style;
        let mut rgb = vec![0u8; (width * height * 3) as usize];
        {
            let root = BitMapBackend::with_buffer(&mut rgb, (width, height)).into_drawing_area();
            root.fill(&style.background)?;
            self.draw_grid(&root, width, height)?;
            let (w, h) = (width as f64, height as f64);
            let primary = trace_points(
                buffer.primary(),
                descriptor.display_range,
                view,
                style.base_capacity,
                w,
                h,
            );
            draw_trace(&root, &primary, style.primary, style.primary_width, height)?;
            if let Some(envelope_range) = descriptor.envelope_range {
                let envelope = trace_points(
                    buffer.envelope(),
                    envelope_range,
                    view,
                    style.base_capacity,
                    w,
                    h,
                );
                draw_trace(&root, &envelope, style.envelope, style.envelope_width, height)?;
            }
            root.present()?;
        }
        Ok(ScopeFrame { width, height, rgb })
    }
    fn draw_grid(
        &self,
        root: &DrawingArea<BitMapBackend<'_>, plotters::coord::Shift>,
        width: u32,
        height: u32,
    ) -> Result<(), ScopeError> {
        let style = &self.style;
        let (w, h) = (width as i32, height as i32);
        let gx = style.grid_x.max(1);
        let gy = style.grid_y.max(1);
        if style.minor_per_major > 1 {
            let minor = ShapeStyle::from(&style.grid_minor).stroke_width(1);
            let cols = gx * style.minor_per_major;
            let rows = gy * style.minor_per_major;
            for i in 0..=cols {
                let x = grid_line(i, cols, w);
                root.draw(&PathElement::new(vec![(x, 0), (x, h)], minor))?;
            }
            for i in 0..=rows {
                let y = grid_line(i, rows, h);
                root.draw(&PathElement::new(vec![(0, y), (w, y)], minor))?;
            }
        }
        let major = ShapeStyle::from(&style.grid_major).stroke_width(1);
        for i in 0..=gx {
            let x = grid_line(i, gx, w);
            root.draw(&PathElement::new(vec![(x, 0), (x, h)], major))?;
        }
        for i in 0..=gy {
            let y = grid_line(i, gy, h);
            root.draw(&PathElement::new(vec![(0, y), (w, y)], major))?;
        }
        // Baseline.
        let baseline = ShapeStyle::from(&style.grid_major).stroke_width(2);
        let mid = h / 2;
        root.draw(&PathElement::new(vec![(0, mid), (w, mid)], baseline))?;
        Ok(())
    }
}
fn grid_line(i: u32, divisions: u32, extent: i32) -> i32 {
    let pos = (i as f64 / divisions as f64 * extent as f64).round() as i32;
    pos.min(extent - 1)
}
fn draw_trace(
    root: &DrawingArea<BitMapBackend<'_>, plotters::coord::Shift>,
    points: &[(f64, f64)],
    color: RGBColor,
    stroke: u32,
    height: u32,
) -> Result<(), ScopeError> {
    if points.len() < 2 {
        return Ok(());
    }
    // Overscaled values leave the canvas; bound them so rasterizing stays cheap.
    let limit = height as f64 * 2.0;
    let pixels: Vec<(i32, i32)> = points
        .iter()
        .map(|(x, y)| (x.round() as i32, y.clamp(-limit, limit).round() as i32))
        .collect();
    root.draw(&PathElement::new(
        pixels,
        ShapeStyle::from(&color).stroke_width(stroke),
    ))?;
    Ok(())
}
/// Fixed-cadence display tick, independent of data arrival.
///
/// `tick` returns `true` at most once per interval; bursts of frames between
/// ticks are therefore coalesced into a single paint.
#[derive(Debug)]
pub struct RenderTick {
    interval: Duration,
    next_at: Option<Instant>,
    cancelled: bool,
}
impl RenderTick {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_at: None,
            cancelled: false,
        }
    }
    pub fn interval(&self) -> Duration {
        self.interval
    }
    pub fn tick(&mut self, now: Instant) -> bool {
        if self.cancelled {
            return false;
        }
        match self.next_at {
            Some(at) if now < at => false,
            _ => {
                self.next_at = Some(now + self.interval);
                true
            }
        }
    }
    /// Time left until the next paint is due.
    pub fn remaining(&self, now: Instant) -> Duration {
        self.next_at
            .map_or(Duration::ZERO, |at| at.saturating_duration_since(now))
    }
    pub fn cancel(&mut self) {
        self.cancelled = true;
    }
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}
fn encode_png(buffer: &[u8], width: u32, height: u32) -> Result<Vec<u8>, ScopeError> {
    let image = ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, buffer.to_vec())
        .ok_or_else(|| ScopeError::Plot("failed to allocate image buffer".into()))?;
    let mut output = Vec::new();
    let dynamic = DynamicImage::ImageRgb8(image);
    dynamic.write_to(&mut Cursor::new(&mut output), ImageFormat::Png)?;
    Ok(output)
}
