pub mod loader;
pub mod soc;
