mod aabb;
mod color;

pub use aabb::AABB;
pub use color::{hex_to_rgb, parse_hex_color, rgb_to_hex};
