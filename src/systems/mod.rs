mod transform;

pub use transform::transform_system;
