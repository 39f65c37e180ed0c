pub mod paged;

pub use paged::{Memory, PAGE_SIZE};
