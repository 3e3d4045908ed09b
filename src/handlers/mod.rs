pub mod error;
pub mod patient;
pub mod webhook;

pub use error::*;
pub use patient::*;
pub use webhook::*;
