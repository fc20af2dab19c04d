//! Screen placement for map pins.
//!
//! The map view does not use a geographic projection. Pins are placed with a
//! linear transform centred on Seoul City Hall, expressed as percentages of the
//! viewport so the caller can position them however it draws the map.

use serde::Serialize;

use crate::entities::apartment::GeoPoint;

pub const CENTER: GeoPoint = GeoPoint {
    lat: 37.5665,
    lng: 126.9780,
};

const BASE_SCALE: f64 = 800.0;
/// Latitude is stretched relative to longitude to roughly match the peninsula.
const LAT_STRETCH: f64 = 1.3;

pub const ZOOM_MIN: f64 = 0.6;
pub const ZOOM_MAX: f64 = 3.0;
pub const ZOOM_STEP: f64 = 0.3;

/// Pin position in percent of the viewport; `(50, 50)` is the centre.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

impl ScreenPoint {
    pub fn is_visible(&self) -> bool {
        (0.0..=100.0).contains(&self.x) && (0.0..=100.0).contains(&self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    zoom: f64,
    pan_x: f64,
    pan_y: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            pan_x: 0.0,
            pan_y: 0.0,
        }
    }
}

impl Viewport {
    pub fn new(zoom: f64, pan_x: f64, pan_y: f64) -> Self {
        Self {
            zoom: zoom.clamp(ZOOM_MIN, ZOOM_MAX),
            pan_x,
            pan_y,
        }
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn zoom_in(&mut self) {
        self.zoom = (self.zoom + ZOOM_STEP).min(ZOOM_MAX);
    }

    pub fn zoom_out(&mut self) {
        self.zoom = (self.zoom - ZOOM_STEP).max(ZOOM_MIN);
    }

    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        self.pan_x += dx;
        self.pan_y += dy;
    }

    pub fn project(&self, point: GeoPoint) -> ScreenPoint {
        let scale = BASE_SCALE * self.zoom;
        ScreenPoint {
            x: (point.lng - CENTER.lng) * scale + 50.0 + self.pan_x,
            y: (CENTER.lat - point.lat) * scale * LAT_STRETCH + 50.0 + self.pan_y,
        }
    }
}
