use super::semaphore::UpdateSemaphore;
use actix::prelude::*;
use async_trait::async_trait;
use catalog_types::update::Cadence;
use derive_more::Display;
use futures::FutureExt;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

#[async_trait]
pub trait UpdateRunner: Send + Sync {
    async fn run_tasks(&self, cadence: Cadence) -> Result<(), anyhow::Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum RunStatus {
    #[display("another run holds the semaphore")]
    Busy,
    #[display("completed")]
    Completed,
    #[display("failed")]
    Failed,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Activate;

#[derive(Message)]
#[rtype(result = "()")]
pub struct Deactivate;

#[derive(Message)]
#[rtype(result = "RunStatus")]
pub struct RunTasks(pub Cadence);

#[derive(Message)]
#[rtype(result = "Vec<Cadence>")]
pub struct GetSchedule;

/// Fires one update run per cadence period.
pub struct UpdateTimer {
    semaphore: UpdateSemaphore,
    runner: Arc<dyn UpdateRunner>,
    schedule: BTreeMap<Cadence, SpawnHandle>,
}

impl UpdateTimer {
    pub fn new(semaphore: UpdateSemaphore, runner: Arc<dyn UpdateRunner>) -> Self {
        Self {
            semaphore,
            runner,
            schedule: BTreeMap::new(),
        }
    }
}

/// Runs `cadence` under its semaphore. The semaphore is released even if the
/// runner fails or panics.
pub async fn run_guarded(
    semaphore: &UpdateSemaphore,
    runner: &dyn UpdateRunner,
    cadence: Cadence,
) -> RunStatus {
    if !semaphore.acquire(cadence).await {
        log::debug!("Skipping {cadence} update run: semaphore is held");
        return RunStatus::Busy;
    }
    log::info!("Starting {cadence} update run");
    let res = AssertUnwindSafe(runner.run_tasks(cadence))
        .catch_unwind()
        .await;
    semaphore.release(cadence).await;
    match res {
        Ok(Ok(())) => {
            log::info!("Finished {cadence} update run");
            RunStatus::Completed
        }
        Ok(Err(err)) => {
            log::error!("Unable to run {cadence} update tasks: {err:#}");
            RunStatus::Failed
        }
        Err(_) => {
            log::error!("{cadence} update run panicked");
            RunStatus::Failed
        }
    }
}

impl Actor for UpdateTimer {
    type Context = Context<Self>;

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        log::info!("Update timer stopped");
    }
}

impl Handler<Activate> for UpdateTimer {
    type Result = ();

    fn handle(&mut self, _: Activate, ctx: &mut Self::Context) -> Self::Result {
        for cadence in Cadence::ALL {
            if self.schedule.contains_key(&cadence) {
                continue;
            }
            let handle = ctx.run_interval(cadence.period(), move |_, ctx| {
                ctx.notify(RunTasks(cadence));
            });
            log::info!("Scheduled {} every {:?}", cadence.hook(), cadence.period());
            self.schedule.insert(cadence, handle);
        }
    }
}

impl Handler<Deactivate> for UpdateTimer {
    type Result = ();

    fn handle(&mut self, _: Deactivate, ctx: &mut Self::Context) -> Self::Result {
        for (cadence, handle) in std::mem::take(&mut self.schedule) {
            ctx.cancel_future(handle);
            log::info!("Unscheduled {}", cadence.hook());
        }
    }
}

impl Handler<RunTasks> for UpdateTimer {
    type Result = ResponseActFuture<Self, RunStatus>;

    fn handle(&mut self, RunTasks(cadence): RunTasks, _ctx: &mut Self::Context) -> Self::Result {
        let semaphore = self.semaphore.clone();
        let runner = self.runner.clone();
        let fut = async move { run_guarded(&semaphore, runner.as_ref(), cadence).await };
        Box::pin(fut.into_actor(self))
    }
}

impl Handler<GetSchedule> for UpdateTimer {
    type Result = MessageResult<GetSchedule>;

    fn handle(&mut self, _: GetSchedule, _ctx: &mut Self::Context) -> Self::Result {
        MessageResult(self.schedule.keys().copied().collect())
    }
}
