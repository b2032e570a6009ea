//! [`Database`]-related implementations.

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

use common::operations::{By, Delete, Insert, Select, Update};
use derive_more::{Display, Error as StdError, From};
use tracerr::Traced;

use crate::domain::{device, session, user, Account, Device, Session};

pub use self::memory::Memory;
#[cfg(feature = "postgres")]
pub use self::postgres::Postgres;

/// Database operation.
pub use common::Handler as Database;

/// [`Database`] error.
#[derive(Debug, Display, From, StdError)]
pub enum Error {
    /// [`Memory`] error.
    Memory(memory::Error),

    #[cfg(feature = "postgres")]
    /// [`Postgres`] error.
    Postgres(postgres::Error),
}

/// Durable storage of [`Session`]s.
pub trait SessionStore:
    Database<Insert<Session>, Ok = (), Err = Traced<Error>>
    + Database<
        Select<By<Option<Session>, session::Id>>,
        Ok = Option<Session>,
        Err = Traced<Error>,
    > + Database<Update<Session>, Ok = (), Err = Traced<Error>>
    + Database<Delete<By<Session, session::Id>>, Ok = (), Err = Traced<Error>>
    + Database<Delete<By<Session, user::Id>>, Ok = u64, Err = Traced<Error>>
    + Database<
        Delete<By<Session, session::ExpirationDateTime>>,
        Ok = u64,
        Err = Traced<Error>,
    >
{
}

impl<T> SessionStore for T where
    T: Database<Insert<Session>, Ok = (), Err = Traced<Error>>
        + Database<
            Select<By<Option<Session>, session::Id>>,
            Ok = Option<Session>,
            Err = Traced<Error>,
        > + Database<Update<Session>, Ok = (), Err = Traced<Error>>
        + Database<Delete<By<Session, session::Id>>, Ok = (), Err = Traced<Error>>
        + Database<Delete<By<Session, user::Id>>, Ok = u64, Err = Traced<Error>>
        + Database<
            Delete<By<Session, session::ExpirationDateTime>>,
            Ok = u64,
            Err = Traced<Error>,
        >
{
}

/// Durable storage of [`Device`]s.
pub trait DeviceStore:
    Database<Insert<Device>, Ok = (), Err = Traced<Error>>
    + Database<
        Select<By<Option<Device>, session::refresh::TokenHash>>,
        Ok = Option<Device>,
        Err = Traced<Error>,
    > + Database<Update<Device>, Ok = (), Err = Traced<Error>>
    + Database<Delete<By<Device, session::Id>>, Ok = (), Err = Traced<Error>>
    + Database<Delete<By<Device, user::Id>>, Ok = u64, Err = Traced<Error>>
    + Database<
        Delete<By<Device, device::ExpirationDateTime>>,
        Ok = u64,
        Err = Traced<Error>,
    >
{
}

impl<T> DeviceStore for T where
    T: Database<Insert<Device>, Ok = (), Err = Traced<Error>>
        + Database<
            Select<By<Option<Device>, session::refresh::TokenHash>>,
            Ok = Option<Device>,
            Err = Traced<Error>,
        > + Database<Update<Device>, Ok = (), Err = Traced<Error>>
        + Database<Delete<By<Device, session::Id>>, Ok = (), Err = Traced<Error>>
        + Database<Delete<By<Device, user::Id>>, Ok = u64, Err = Traced<Error>>
        + Database<
            Delete<By<Device, device::ExpirationDateTime>>,
            Ok = u64,
            Err = Traced<Error>,
        >
{
}

/// Read-only storage of [`Account`]s.
pub trait UserStore:
    Database<
    Select<By<Option<Account>, user::Login>>,
    Ok = Option<Account>,
    Err = Traced<Error>,
>
{
}

impl<T> UserStore for T where
    T: Database<
        Select<By<Option<Account>, user::Login>>,
        Ok = Option<Account>,
        Err = Traced<Error>,
    >
{
}
