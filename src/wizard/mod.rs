pub mod engine;
pub mod normalize;
pub mod options;

// Re-export the state machine entry points
pub use engine::{advance, cancel, start};
pub use normalize::{normalize_username, normalize_vm_name};
