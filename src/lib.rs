// Library surface for headless/integration tests and reuse.
// Keep this lean to avoid coupling to bin-only types in main.rs.
pub mod app_dirs;
pub mod clock;
pub mod config;
pub mod constant;
pub mod digits;
pub mod engine;
pub mod ghost;
pub mod history;
pub mod learning;
pub mod persistence;
pub mod race;
pub mod records;
pub mod runtime;
pub mod scheduler;
pub mod session;
pub mod stats;
pub mod trainer;
