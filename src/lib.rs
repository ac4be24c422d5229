/// Decoders for packed vertex attributes and rotations
pub mod codec;
/// Error definitions
pub mod error;
/// The extraction pipeline driver
pub mod extract;
/// Per-version record layouts, kept as data
pub mod layouts;
/// Output containers and the writer collaborator traits
pub mod output;
/// Access to a foreign process's address space
pub mod process;
/// Locating and reconstructing world geometry
pub mod world;

#[cfg(test)]
pub(crate) mod testutil;
