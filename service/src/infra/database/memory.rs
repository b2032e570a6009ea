//! In-memory [`Database`] implementation.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
};

use common::operations::{
    By, Commit, Delete, Insert, Select, Transact, Update,
};
use derive_more::{Display, Error as StdError};
use tokio::sync::RwLock;
use tracerr::Traced;

use crate::{
    domain::{device, session, user, Account, Device, Session},
    infra::{database, Database},
};

/// Process-local [`Database`].
///
/// Changes are visible immediately, so [`Commit`] does nothing. Clones share
/// the same data.
#[derive(Clone, Debug, Default)]
pub struct Memory(Arc<Inner>);

/// Shared state of a [`Memory`] database.
#[derive(Debug, Default)]
struct Inner {
    /// Stored [`Session`]s.
    sessions: RwLock<HashMap<session::Id, Session>>,

    /// Stored [`Device`]s.
    devices: RwLock<HashMap<device::Id, Device>>,

    /// Stored [`Account`]s.
    accounts: RwLock<HashMap<user::Login, Account>>,

    /// Indicator whether every operation should fail.
    offline: AtomicBool,

    /// Indicator whether every modifying operation should fail.
    read_only: AtomicBool,

    /// Number of [`Session`] reads performed.
    session_reads: AtomicUsize,

    /// Number of [`Session`] inserts performed.
    session_inserts: AtomicUsize,

    /// Number of [`Session`] updates performed.
    session_updates: AtomicUsize,

    /// Number of [`Session`] deletes performed.
    session_deletes: AtomicUsize,
}

/// Numbers of [`Session`] operations a [`Memory`] database has performed.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Stats {
    /// Number of reads.
    pub reads: usize,

    /// Number of inserts.
    pub inserts: usize,

    /// Number of updates.
    pub updates: usize,

    /// Number of deletes.
    pub deletes: usize,
}

impl Memory {
    /// Creates a new empty [`Memory`] database.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Switches this [`Memory`] database offline or back online.
    ///
    /// While offline every operation fails with [`Error::Unavailable`].
    pub fn set_offline(&self, offline: bool) {
        self.0.offline.store(offline, Ordering::SeqCst);
    }

    /// Switches this [`Memory`] database into read-only mode or back.
    ///
    /// While read-only, transactions and modifying operations fail with
    /// [`Error::ReadOnly`].
    pub fn set_read_only(&self, read_only: bool) {
        self.0.read_only.store(read_only, Ordering::SeqCst);
    }

    /// Stores the provided [`Account`], replacing one with the same login.
    pub async fn insert_account(&self, account: Account) {
        drop(
            self.0
                .accounts
                .write()
                .await
                .insert(account.login.clone(), account),
        );
    }

    /// Returns the [`Stats`] of [`Session`] operations performed so far.
    #[must_use]
    pub fn stats(&self) -> Stats {
        Stats {
            reads: self.0.session_reads.load(Ordering::SeqCst),
            inserts: self.0.session_inserts.load(Ordering::SeqCst),
            updates: self.0.session_updates.load(Ordering::SeqCst),
            deletes: self.0.session_deletes.load(Ordering::SeqCst),
        }
    }

    /// Returns all the stored [`Session`]s.
    pub async fn sessions(&self) -> Vec<Session> {
        self.0.sessions.read().await.values().cloned().collect()
    }

    /// Returns all the stored [`Device`]s.
    pub async fn devices(&self) -> Vec<Device> {
        self.0.devices.read().await.values().cloned().collect()
    }

    /// Fails if this [`Memory`] database is offline.
    fn ensure_online(&self) -> Result<(), Traced<database::Error>> {
        if self.0.offline.load(Ordering::SeqCst) {
            return Err(tracerr::new!(database::Error::from(
                Error::Unavailable
            )));
        }
        Ok(())
    }

    /// Fails if this [`Memory`] database is offline or read-only.
    fn ensure_writable(&self) -> Result<(), Traced<database::Error>> {
        self.ensure_online().map_err(tracerr::wrap!())?;
        if self.0.read_only.load(Ordering::SeqCst) {
            return Err(tracerr::new!(database::Error::from(Error::ReadOnly)));
        }
        Ok(())
    }

    /// Counts an operation with the provided counter.
    fn count(counter: &AtomicUsize) {
        _ = counter.fetch_add(1, Ordering::SeqCst);
    }
}

/// [`Memory`] database error.
#[derive(Clone, Debug, Display, StdError)]
pub enum Error {
    /// [`Session`] with the same ID is already stored.
    #[display("`Session(id: {_0})` already exists")]
    DuplicateSession(#[error(not(source))] session::Id),

    /// Database is switched offline.
    #[display("in-memory database is offline")]
    Unavailable,

    /// Database is switched into read-only mode.
    #[display("in-memory database is read-only")]
    ReadOnly,
}

impl Database<Transact> for Memory {
    type Ok = Self;
    type Err = Traced<database::Error>;

    async fn execute(&self, _: Transact) -> Result<Self::Ok, Self::Err> {
        self.ensure_writable().map_err(tracerr::wrap!())?;
        Ok(self.clone())
    }
}

impl Database<Commit> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(&self, _: Commit) -> Result<Self::Ok, Self::Err> {
        self.ensure_writable().map_err(tracerr::wrap!())
    }
}

impl Database<Insert<Session>> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(session): Insert<Session>,
    ) -> Result<Self::Ok, Self::Err> {
        self.ensure_writable().map_err(tracerr::wrap!())?;
        Self::count(&self.0.session_inserts);

        let mut sessions = self.0.sessions.write().await;
        if sessions.contains_key(&session.id) {
            return Err(tracerr::new!(database::Error::from(
                Error::DuplicateSession(session.id)
            )));
        }
        drop(sessions.insert(session.id.clone(), session));
        Ok(())
    }
}

impl Database<Select<By<Option<Session>, session::Id>>> for Memory {
    type Ok = Option<Session>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Session>, session::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        self.ensure_online().map_err(tracerr::wrap!())?;
        Self::count(&self.0.session_reads);

        Ok(self.0.sessions.read().await.get(&by.into_inner()).cloned())
    }
}

impl Database<Update<Session>> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(session): Update<Session>,
    ) -> Result<Self::Ok, Self::Err> {
        self.ensure_writable().map_err(tracerr::wrap!())?;
        Self::count(&self.0.session_updates);

        if let Some(stored) =
            self.0.sessions.write().await.get_mut(&session.id)
        {
            stored.expires_at = session.expires_at;
        }
        Ok(())
    }
}

impl Database<Delete<By<Session, session::Id>>> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Delete(by): Delete<By<Session, session::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        self.ensure_writable().map_err(tracerr::wrap!())?;
        Self::count(&self.0.session_deletes);

        drop(self.0.sessions.write().await.remove(&by.into_inner()));
        Ok(())
    }
}

impl Database<Delete<By<Session, user::Id>>> for Memory {
    type Ok = u64;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Delete(by): Delete<By<Session, user::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        self.ensure_writable().map_err(tracerr::wrap!())?;
        Self::count(&self.0.session_deletes);

        let user_id = by.into_inner();
        Ok(retain(&mut *self.0.sessions.write().await, |s| {
            s.user_id != user_id
        }))
    }
}

impl Database<Delete<By<Session, session::ExpirationDateTime>>> for Memory {
    type Ok = u64;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Delete(by): Delete<By<Session, session::ExpirationDateTime>>,
    ) -> Result<Self::Ok, Self::Err> {
        self.ensure_writable().map_err(tracerr::wrap!())?;
        Self::count(&self.0.session_deletes);

        let now = by.into_inner();
        Ok(retain(&mut *self.0.sessions.write().await, |s| {
            !s.is_expired_at(now)
        }))
    }
}

impl Database<Insert<Device>> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(device): Insert<Device>,
    ) -> Result<Self::Ok, Self::Err> {
        self.execute(Update(device)).await.map_err(tracerr::wrap!())
    }
}

impl Database<Select<By<Option<Device>, session::refresh::TokenHash>>>
    for Memory
{
    type Ok = Option<Device>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Device>, session::refresh::TokenHash>>,
    ) -> Result<Self::Ok, Self::Err> {
        self.ensure_online().map_err(tracerr::wrap!())?;

        let hash = by.into_inner();
        Ok(self
            .0
            .devices
            .read()
            .await
            .values()
            .find(|d| d.refresh_token_hash == hash)
            .cloned())
    }
}

impl Database<Update<Device>> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(device): Update<Device>,
    ) -> Result<Self::Ok, Self::Err> {
        self.ensure_writable().map_err(tracerr::wrap!())?;

        drop(self.0.devices.write().await.insert(device.id, device));
        Ok(())
    }
}

impl Database<Delete<By<Device, session::Id>>> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Delete(by): Delete<By<Device, session::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        self.ensure_writable().map_err(tracerr::wrap!())?;

        let session_id = by.into_inner();
        _ = retain(&mut *self.0.devices.write().await, |d| {
            d.session_id != session_id
        });
        Ok(())
    }
}

impl Database<Delete<By<Device, user::Id>>> for Memory {
    type Ok = u64;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Delete(by): Delete<By<Device, user::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        self.ensure_writable().map_err(tracerr::wrap!())?;

        let user_id = by.into_inner();
        Ok(retain(&mut *self.0.devices.write().await, |d| {
            d.user_id != user_id
        }))
    }
}

impl Database<Delete<By<Device, device::ExpirationDateTime>>> for Memory {
    type Ok = u64;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Delete(by): Delete<By<Device, device::ExpirationDateTime>>,
    ) -> Result<Self::Ok, Self::Err> {
        self.ensure_writable().map_err(tracerr::wrap!())?;

        let now = by.into_inner();
        Ok(retain(&mut *self.0.devices.write().await, |d| {
            !d.is_expired_at(now)
        }))
    }
}

impl Database<Select<By<Option<Account>, user::Login>>> for Memory {
    type Ok = Option<Account>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Account>, user::Login>>,
    ) -> Result<Self::Ok, Self::Err> {
        self.ensure_online().map_err(tracerr::wrap!())?;

        Ok(self.0.accounts.read().await.get(&by.into_inner()).cloned())
    }
}

/// Retains only the values matching the predicate, returning the number of
/// removed ones.
fn retain<K, V>(
    map: &mut HashMap<K, V>,
    mut keep: impl FnMut(&V) -> bool,
) -> u64 {
    let before = map.len();
    map.retain(|_, v| keep(v));
    (before - map.len()) as u64
}
