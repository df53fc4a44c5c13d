//! Collaborator traits
//!
//! These traits define the interface between the mixer and the layers
//! around it that live outside this crate.

/// Source of the machine's current height
///
/// Implemented by the kinematics layer; the gradient samples it once per
/// planned motion segment.
pub trait HeightSource {
    /// Current vertical axis position in millimeters
    fn current_height(&self) -> f32;
}
