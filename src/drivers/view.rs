pub const MIN_ZOOM_PERCENT: i32 = 25;
pub const MAX_ZOOM_PERCENT: i32 = 400;
pub const ZOOM_STEP_PERCENT: i32 = 10;
/// Pan limit, in half-spans of the visible range.
pub const MAX_OFFSET: f64 = 4.0;
/// Zoom, pan and pause state owned by the view controller.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewParameters {
    pub vertical_zoom_percent: i32,
    pub horizontal_zoom_percent: i32,
    pub vertical_offset: f64,
    pub paused: bool,
}
impl Default for ViewParameters {
    fn default() -> Self {
        Self {
            vertical_zoom_percent: 100,
            horizontal_zoom_percent: 100,
            vertical_offset: 0.0,
            paused: false,
        }
    }
}
impl ViewParameters {
    pub fn vertical_zoom_factor(&self) -> f64 {
        self.vertical_zoom_percent as f64 / 100.0
    }
    pub fn horizontal_zoom_factor(&self) -> f64 {
        self.horizontal_zoom_percent as f64 / 100.0
    }
    pub fn set_vertical_zoom(&mut self, percent: i32) {
        self.vertical_zoom_percent = percent.clamp(MIN_ZOOM_PERCENT, MAX_ZOOM_PERCENT);
    }
    pub fn set_horizontal_zoom(&mut self, percent: i32) {
        self.horizontal_zoom_percent = percent.clamp(MIN_ZOOM_PERCENT, MAX_ZOOM_PERCENT);
    }
    pub fn zoom_in(&mut self) {
        self.set_vertical_zoom(self.vertical_zoom_percent + ZOOM_STEP_PERCENT);
    }
    pub fn zoom_out(&mut self) {
        self.set_vertical_zoom(self.vertical_zoom_percent - ZOOM_STEP_PERCENT);
    }
    /// Wheel gesture: scrolling up zooms in.
    pub fn apply_wheel(&mut self, delta_y: f32) {
        if delta_y > 0.0 {
            self.zoom_in();
        } else if delta_y < 0.0 {
            self.zoom_out();
        }
    }
    /// Drag gesture. `dy_pixels` is positive downwards; dragging down moves the trace down.
    pub fn pan_by_pixels(&mut self, dy_pixels: f32, height_pixels: f32) {
        if height_pixels <= 0.0 {
            return;
        }
        let delta = -(dy_pixels as f64) / (height_pixels as f64 / 2.0);
        self.vertical_offset = (self.vertical_offset + delta).clamp(-MAX_OFFSET, MAX_OFFSET);
    }
    pub fn toggle_pause(&mut self) {
        self.paused = !self.paused;
    }
    /// Restores zoom and pan; the pause state is left alone.
    pub fn reset_view(&mut self) {
        let paused = self.paused;
        *self = Self {
            paused,
            ..Self::default()
        };
    }
}
