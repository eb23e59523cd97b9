mod annotation;
mod bathroom;
mod location;

pub use annotation::{DisplayAnnotation, MapAnnotation};
pub use bathroom::{BathroomRecord, RawInput};
pub use location::Coordinate;
