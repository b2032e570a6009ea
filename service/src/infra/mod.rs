//! Infrastructure layer.

pub mod database;
pub mod password;

pub use self::{
    database::{Database, DeviceStore, Memory, SessionStore, UserStore},
    password::PasswordHasher,
};
#[cfg(feature = "postgres")]
pub use self::database::{postgres, Postgres};
