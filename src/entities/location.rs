use geo_types::{Geometry, Point};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Finite, non-NaN, and inside [-90, 90] x [-180, 180].
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

impl From<Coordinate> for Point<f64> {
    fn from(coordinate: Coordinate) -> Self {
        Point::new(coordinate.longitude, coordinate.latitude)
    }
}

impl From<Coordinate> for Geometry<f64> {
    fn from(coordinate: Coordinate) -> Self {
        Geometry::Point(coordinate.into())
    }
}

#[test]
fn coordinate_validity() {
    assert!(Coordinate::new(47.6062, -122.3321).is_valid());
    assert!(Coordinate::new(90.0, 180.0).is_valid());
    assert!(Coordinate::new(-90.0, -180.0).is_valid());

    assert!(!Coordinate::new(90.5, 0.0).is_valid());
    assert!(!Coordinate::new(0.0, -180.1).is_valid());
    assert!(!Coordinate::new(f64::NAN, 0.0).is_valid());
    assert!(!Coordinate::new(0.0, f64::INFINITY).is_valid());
}

#[test]
fn coordinate_into_point_is_lng_lat() {
    let point: Point<f64> = Coordinate::new(10.0, 20.0).into();

    assert_eq!(point.x(), 20.0);
    assert_eq!(point.y(), 10.0);

    let geometry: Geometry<f64> = Coordinate::new(10.0, 20.0).into();
    assert_eq!(geometry, Geometry::Point(point));
}
