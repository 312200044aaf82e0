pub mod discovery;
pub mod instance;
pub mod provision;
pub mod resize;
pub mod snapshot;

// Re-export commonly used functions
pub use discovery::{discover_ip, UNKNOWN_IP};
pub use provision::commit;
pub use resize::parse_resize_instruction;
