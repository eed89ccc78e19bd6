mod primitives;
mod robot;

pub use primitives::{box_geometry, cylinder_geometry};
pub use robot::create_example_robot;
