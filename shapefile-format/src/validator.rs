//! Geographic validation of decoded shapes
//!
//! Boxes are treated as lat/lng rectangles on the sphere. Latitude is a closed
//! interval; longitude is a circular interval that wraps across the
//! antimeridian when `min_x > max_x`.

use std::fmt;

use crate::bbox::BoundingBox;
use crate::error::{Result, ShapefileError};
use crate::geometry::{Part, Point, Polygon, Polyline, Shape};

/// Shapes that can be checked against a file's bounding box
pub trait Validate {
    /// Check the shape, returning [`ShapefileError::Validation`] on the first violation.
    fn validate(&self, validator: &Validator) -> Result<()>;
}

/// Validates shapes against the bounding box declared in the .shp header
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Validator {
    file_box: Rect,
}

impl Validator {
    /// Build a validator from the file bounding box.
    pub fn new(bounding_box: &BoundingBox) -> Result<Self> {
        Ok(Self {
            file_box: Rect::from_box(bounding_box)?,
        })
    }
}

impl Validate for Point {
    fn validate(&self, validator: &Validator) -> Result<()> {
        let ll = LatLng {
            lat: self.y,
            lng: self.x,
        };

        if let Some(shape_box) = self.shape_box() {
            let own = Rect::from_box(shape_box)?;
            if !own.contains(ll) {
                return Err(ShapefileError::Validation(format!(
                    "point {} is not in own bounding box '{}'",
                    ll, own
                )));
            }
        }

        if !validator.file_box.contains(ll) {
            return Err(ShapefileError::Validation(format!(
                "point '{}' is not in file bounding box '{}'",
                ll, validator.file_box
            )));
        }
        Ok(())
    }
}

impl Validate for Polyline {
    fn validate(&self, validator: &Validator) -> Result<()> {
        validate_parts(&self.parts, validator)
    }
}

impl Validate for Polygon {
    fn validate(&self, validator: &Validator) -> Result<()> {
        validate_parts(&self.parts, validator)
    }
}

impl Validate for Shape {
    fn validate(&self, validator: &Validator) -> Result<()> {
        match self {
            Shape::Point(p) => p.validate(validator),
            Shape::Polyline(p) => p.validate(validator),
            Shape::Polygon(p) => p.validate(validator),
        }
    }
}

fn validate_parts(parts: &[Part], validator: &Validator) -> Result<()> {
    if parts.is_empty() {
        return Err(ShapefileError::Validation(
            "must contain at least 1 part".to_string(),
        ));
    }

    for part in parts {
        for point in part.iter() {
            point.validate(validator)?;
        }
        if part.edge_count() < 1 {
            return Err(ShapefileError::Validation(
                "part must have at least 1 edge".to_string(),
            ));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct LatLng {
    lat: f64,
    lng: f64,
}

impl LatLng {
    fn is_valid(self) -> bool {
        self.lat.abs() <= 90.0 && self.lng.abs() <= 180.0
    }
}

impl fmt::Display for LatLng {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:.7}, {:.7}]", self.lat, self.lng)
    }
}

/// Lat/lng rectangle in degrees
#[derive(Debug, Clone, Copy, PartialEq)]
struct Rect {
    lat_lo: f64,
    lat_hi: f64,
    lng_lo: f64,
    lng_hi: f64,
}

impl Rect {
    fn from_box(bbox: &BoundingBox) -> Result<Self> {
        let (mut lng_lo, mut lng_hi) = (bbox.min_x, bbox.max_x);
        // -180 and 180 are the same meridian; keep the representation canonical.
        if lng_lo == -180.0 && lng_hi != 180.0 {
            lng_lo = 180.0;
        }
        if lng_hi == -180.0 && lng_lo != 180.0 {
            lng_hi = 180.0;
        }

        let rect = Rect {
            lat_lo: bbox.min_y,
            lat_hi: bbox.max_y,
            lng_lo,
            lng_hi,
        };
        if !rect.is_valid() {
            return Err(ShapefileError::Validation(format!(
                "invalid box {}",
                bbox
            )));
        }
        Ok(rect)
    }

    fn lat_is_empty(&self) -> bool {
        self.lat_lo > self.lat_hi
    }

    fn lng_is_inverted(&self) -> bool {
        self.lng_lo > self.lng_hi
    }

    fn lng_is_empty(&self) -> bool {
        self.lng_lo == 180.0 && self.lng_hi == -180.0
    }

    fn is_valid(&self) -> bool {
        let lat_ok = self.lat_lo.abs() <= 90.0 && self.lat_hi.abs() <= 90.0;
        let lng_ok = self.lng_lo.abs() <= 180.0
            && self.lng_hi.abs() <= 180.0
            && !(self.lng_lo == -180.0 && self.lng_hi != 180.0)
            && !(self.lng_hi == -180.0 && self.lng_lo != 180.0);
        lat_ok && lng_ok && self.lat_is_empty() == self.lng_is_empty()
    }

    fn contains(&self, ll: LatLng) -> bool {
        if !ll.is_valid() {
            return false;
        }
        let lat_ok = ll.lat >= self.lat_lo && ll.lat <= self.lat_hi;

        let lng = if ll.lng == -180.0 { 180.0 } else { ll.lng };
        let lng_ok = if self.lng_is_inverted() {
            (lng >= self.lng_lo || lng <= self.lng_hi) && !self.lng_is_empty()
        } else {
            lng >= self.lng_lo && lng <= self.lng_hi
        };
        lat_ok && lng_ok
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lo = LatLng {
            lat: self.lat_lo,
            lng: self.lng_lo,
        };
        let hi = LatLng {
            lat: self.lat_hi,
            lng: self.lng_hi,
        };
        write!(f, "[Lo{}, Hi{}]", lo, hi)
    }
}
