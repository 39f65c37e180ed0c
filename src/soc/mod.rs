pub mod core;
pub mod device;
pub mod memory;
