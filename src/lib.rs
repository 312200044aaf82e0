pub mod api;
pub mod cloudinit;
pub mod config;
pub mod create;
pub mod error;
pub mod hypervisor;
pub mod instances;
pub mod models;
pub mod services;
pub mod sessions;
pub mod shell;
pub mod ssh;
pub mod util;
pub mod wizard;
