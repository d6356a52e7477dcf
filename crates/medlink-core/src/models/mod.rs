//! Domain models for the medlink system.

mod access;
mod medicine;
mod otp;
mod report;
mod user;

pub use access::*;
pub use medicine::*;
pub use otp::*;
pub use report::*;
pub use user::*;
