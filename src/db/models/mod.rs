pub mod measure;
pub mod reading;

pub use measure::{CompositeView, Measure, NewMeasure, OnConflict};
pub use reading::{ToolKind, ToolReading};
