pub mod agents;
pub mod cli;
pub mod collection;
pub mod config;
pub mod hooks;
pub mod logging;
pub mod memory;
pub mod providers;
pub mod sessions;
