#[path = "device.rs"]
mod device_trait;
pub mod error;
pub mod latch;
pub mod mailbox;
pub mod table;

pub use device_trait::{Device, DeviceAccess};
pub use error::{DeviceError, DeviceResult};
pub use latch::{Latch, LatchProbe};
pub use mailbox::{Mailbox, MailboxHost};
pub use table::{DeviceRef, DeviceTable};
