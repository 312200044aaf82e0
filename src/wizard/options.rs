//! Fixed menu values offered by the sizing steps.

pub const RAM_OPTIONS_MB: [u32; 3] = [2048, 4096, 8192];

pub const CORE_OPTIONS: [u32; 3] = [1, 2, 4];

pub const DISK_OPTIONS_GB: [u32; 4] = [20, 40, 60, 80];

pub const CUSTOM_DISK_OPTIONS_GB: [u32; 17] = [
    10, 15, 20, 25, 30, 40, 50, 60, 80, 100, 120, 150, 200, 250, 300, 400, 500,
];

/// Menu value that flips DiskSelect into the custom size sub-menu.
pub const DISK_CUSTOM_VALUE: &str = "custom";

/// Menu value that returns from the custom sub-menu to DiskSelect.
pub const DISK_BACK_VALUE: &str = "back";

/// Submitting this at any step abandons the wizard.
pub const CANCEL_VALUE: &str = "cancel";

/// The confirm step commits only on this value (case-insensitive).
pub const CONFIRM_VALUE: &str = "create";
