pub mod error;
pub mod lock;

pub use error::{TstatError, TstatResult};
pub use lock::InstanceLock;
