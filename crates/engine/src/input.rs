use crate::error::EngineError;
use crate::executor::PollingExecutor;
use crate::scheduler::{Job, Scheduler, Timer};
use async_trait::async_trait;
use configuration::Settings;
use database::{ConnectionParams, Connector, PgClient, PgConnector, RetryPolicy};
use events::EventRouter;
use std::sync::Arc;
use std::time::Duration;

/// Intervals longer than this get an extra early run after start.
pub const FIRST_RUN_THRESHOLD: Duration = Duration::from_secs(60);
pub const FIRST_RUN_DELAY: Duration = Duration::from_secs(1);

pub const FIRST_RUN_TIMER: &str = "run_queries_first";
pub const RUN_TIMER: &str = "run_queries";

/// A configured polling input: settings, client and executor wired together.
pub struct PgQueryInput<C: Connector = PgConnector> {
    interval: Duration,
    executor: PollingExecutor<C>,
}

impl PgQueryInput<PgConnector> {
    /// Validates the settings and builds an input backed by PostgreSQL.
    pub fn configure(settings: Settings, router: Arc<dyn EventRouter>) -> Result<Self, EngineError> {
        Self::configure_with(settings, PgConnector, router)
    }
}

impl<C: Connector> PgQueryInput<C> {
    /// Validates the settings and builds an input on top of `connector`.
    ///
    /// Nothing is connected here: the first query opens the connection.
    pub fn configure_with(
        settings: Settings,
        connector: C,
        router: Arc<dyn EventRouter>,
    ) -> Result<Self, EngineError> {
        settings.validate()?;

        let client = PgClient::new(
            connector,
            ConnectionParams::try_from(&settings)?,
            RetryPolicy::try_from(&settings)?,
        );
        let interval = settings.interval();
        let executor = PollingExecutor::new(settings.tag, settings.queries, client, router);

        Ok(Self { interval, executor })
    }

    pub fn tag(&self) -> &str {
        self.executor.tag()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn executor(&self) -> &PollingExecutor<C> {
        &self.executor
    }

    /// Registers the polling timers.
    pub fn start<S: Scheduler>(&self, scheduler: &mut S) {
        if self.interval > FIRST_RUN_THRESHOLD {
            scheduler.schedule(Timer { name: FIRST_RUN_TIMER, period: FIRST_RUN_DELAY, repeat: false });
        }
        scheduler.schedule(Timer { name: RUN_TIMER, period: self.interval, repeat: true });

        tracing::info!(
            tag = %self.tag(),
            interval = ?self.interval,
            queries = self.executor.queries().len(),
            "pg_query input started."
        );
    }

    pub async fn run_queries(&mut self) {
        self.executor.run_cycle().await;
    }

    /// Closes the connection. Consumes the input, so it happens exactly once.
    pub async fn shutdown(mut self) {
        self.executor.close().await;
        tracing::info!(tag = %self.tag(), "pg_query input shut down.");
    }
}

#[async_trait]
impl<C: Connector> Job for PgQueryInput<C> {
    async fn run(&mut self) {
        self.run_queries().await;
    }
}
