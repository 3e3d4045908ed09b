pub mod error;
pub mod follow_up;
pub mod message;
pub mod patient;
pub mod webhook;

pub use error::*;
pub use follow_up::*;
pub use message::*;
pub use patient::*;
pub use webhook::*;
