//! Decoders for packed vertex attributes and rotations.

pub mod rotation;
pub mod vertex;
