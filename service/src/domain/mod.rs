//! Domain definitions.

pub mod device;
pub mod session;
pub mod user;

pub use self::{device::Device, session::Session, user::Account};
