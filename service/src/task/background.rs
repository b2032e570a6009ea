//! Background environment for running [`Task`]s.

use std::{
    error::Error,
    future::{Future, IntoFuture},
};

use futures::{
    future::{self, LocalBoxFuture},
    FutureExt as _, TryFutureExt as _,
};
use tokio::task;

#[cfg(doc)]
use crate::Task;

/// Type-erased error of a [`Task`].
type BoxError = Box<dyn Error>;

/// Set of [`Task`]s running on the current thread.
///
/// Nothing runs until the [`Background`] is awaited. The resulting future
/// resolves with the first [`Task`] error, or once all [`Task`]s are done.
#[derive(Debug, Default)]
pub struct Background {
    /// Local set driving the spawned [`Task`]s.
    set: task::LocalSet,

    /// Handles of the spawned [`Task`]s.
    tasks: Vec<task::JoinHandle<Result<(), BoxError>>>,
}

impl Background {
    /// Spawns a new [`Task`] inside this [`Background`].
    pub fn spawn<F, E>(&mut self, task: F)
    where
        F: Future<Output = Result<(), E>> + 'static,
        E: Error + 'static,
    {
        self.tasks.push(
            self.set
                .spawn_local(task.map_err(|e| BoxError::from(Box::new(e)))),
        );
    }
}

impl IntoFuture for Background {
    type Output = Result<(), BoxError>;
    type IntoFuture = LocalBoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        let Self { set, tasks } = self;
        let all = future::try_join_all(tasks.into_iter().map(|h| async {
            h.await.map_err(BoxError::from)?
        }));
        async move { set.run_until(all).await.map(drop) }.boxed_local()
    }
}

#[cfg(test)]
mod spec {
    use std::{
        cell::Cell,
        fmt,
        future::{self, IntoFuture as _},
        rc::Rc,
    };

    use derive_more::{Display, Error};

    use super::Background;

    #[derive(Debug, Display, Error)]
    #[display("boom")]
    struct Boom;

    #[tokio::test]
    async fn runs_tasks_when_awaited() {
        let ran = Rc::new(Cell::new(0));
        let mut bg = Background::default();
        for _ in 0..3 {
            let ran = Rc::clone(&ran);
            bg.spawn(async move {
                ran.set(ran.get() + 1);
                Ok::<_, fmt::Error>(())
            });
        }
        assert_eq!(ran.get(), 0);

        bg.into_future().await.unwrap();

        assert_eq!(ran.get(), 3);
    }

    #[tokio::test]
    async fn resolves_with_the_first_error() {
        let mut bg = Background::default();
        bg.spawn(future::pending::<Result<(), Boom>>());
        bg.spawn(async { Err(Boom) });

        let err = bg.into_future().await.unwrap_err();

        assert_eq!(err.to_string(), "boom");
    }
}
