//! [`CleanExpiredSessions`] [`Task`].

use std::{convert::Infallible, error::Error, time};

use common::operations::{By, Delete, Perform, Start};
use smart_default::SmartDefault;
use tokio::time::interval;
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::{device, session, Device, Session},
    infra::{database, Database},
    Service,
};

use super::Task;

/// Configuration for [`CleanExpiredSessions`] [`Task`].
#[derive(Clone, Copy, Debug, SmartDefault)]
pub struct Config {
    /// Interval between sweeps.
    #[default(time::Duration::from_secs(60 * 60))]
    pub interval: time::Duration,
}

/// [`Task`] deleting expired [`Session`]s and [`Device`]s.
#[derive(Clone, Copy, Debug)]
pub struct CleanExpiredSessions<S> {
    /// [`Config`] of this [`Task`].
    config: Config,

    /// [`Service`] instance.
    service: S,
}

/// Numbers of entities removed by a single [`CleanExpiredSessions`] sweep.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Output {
    /// Number of removed [`Session`]s.
    pub sessions: u64,

    /// Number of removed [`Device`]s.
    pub devices: u64,
}

impl<Db> Task<Start<By<CleanExpiredSessions<Self>, Config>>> for Service<Db>
where
    CleanExpiredSessions<Service<Db>>:
        Task<Perform<()>, Ok = Output, Err: Error> + 'static,
    Self: Clone,
{
    type Ok = ();
    type Err = Infallible;

    async fn execute(
        &self,
        Start(by): Start<By<CleanExpiredSessions<Self>, Config>>,
    ) -> Result<Self::Ok, Self::Err> {
        let config = by.into_inner();
        let task = CleanExpiredSessions {
            config,
            service: self.clone(),
        };

        let mut interval = interval(task.config.interval);
        loop {
            let _ = interval.tick().await;
            match task.execute(Perform(())).await {
                Ok(Output { sessions, devices }) => log::debug!(
                    "`task::CleanExpiredSessions` removed {sessions} sessions \
                     and {devices} devices",
                ),
                Err(e) => {
                    log::error!("`task::CleanExpiredSessions` failed: {e}");
                }
            }
        }
    }
}

impl<Db> Task<Perform<()>> for CleanExpiredSessions<Service<Db>>
where
    Db: Database<
            Delete<By<Session, session::ExpirationDateTime>>,
            Ok = u64,
            Err = Traced<database::Error>,
        > + Database<
            Delete<By<Device, device::ExpirationDateTime>>,
            Ok = u64,
            Err = Traced<database::Error>,
        >,
{
    type Ok = Output;
    type Err = ExecutionError;

    async fn execute(&self, _: Perform<()>) -> Result<Self::Ok, Self::Err> {
        let now = self.service.config().timer.current_time();

        let sessions = self
            .service
            .database()
            .execute(Delete(By::<Session, session::ExpirationDateTime>::new(
                now.coerce(),
            )))
            .await
            .map_err(tracerr::wrap!())?;
        let devices = self
            .service
            .database()
            .execute(Delete(By::<Device, device::ExpirationDateTime>::new(
                now.coerce(),
            )))
            .await
            .map_err(tracerr::wrap!())?;

        Ok(Output { sessions, devices })
    }
}

/// Error of [`CleanExpiredSessions`] execution.
pub type ExecutionError = Traced<database::Error>;
