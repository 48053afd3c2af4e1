use crate::error::EngineError;
use chrono::{DateTime, Utc};
use configuration::QuerySettings;
use database::{Connector, PgClient, PgConnector};
use events::{EventRouter, EventStream, Record};
use std::sync::Arc;

/// Runs every configured query once per cycle and routes the rows as events.
pub struct PollingExecutor<C: Connector = PgConnector> {
    tag: String,
    queries: Arc<[QuerySettings]>,
    client: PgClient<C>,
    router: Arc<dyn EventRouter>,
}

impl<C: Connector> PollingExecutor<C> {
    pub fn new(
        tag: String,
        queries: Vec<QuerySettings>,
        client: PgClient<C>,
        router: Arc<dyn EventRouter>,
    ) -> Self {
        Self { tag, queries: queries.into(), client, router }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn queries(&self) -> &[QuerySettings] {
        &self.queries
    }

    pub fn client(&self) -> &PgClient<C> {
        &self.client
    }

    /// One polling cycle.
    ///
    /// Queries run in configured order. An error in one of them is logged and
    /// the cycle moves on to the next. The connection is put on standby once
    /// all of them are done.
    pub async fn run_cycle(&mut self) {
        let queries = Arc::clone(&self.queries);
        for query in queries.iter() {
            if let Err(e) = self.run_query(query).await {
                tracing::error!(sql = %query.sql, error = %e, "Error while running query.");
            }
        }
        self.client.standby().await;
    }

    /// Runs a single query and emits its rows, all stamped with the time
    /// taken just before the query was sent.
    pub async fn run_query(&mut self, query: &QuerySettings) -> Result<(), EngineError> {
        let query_time = Utc::now();
        let records = self.client.query(&query.sql).await;
        tracing::debug!(sql = %query.sql, rows = records.len(), "Query finished.");
        self.emit(records, query_time, query.tag.as_deref()).await
    }

    /// Hands all records of one query to the router in a single batch.
    pub async fn emit(
        &self,
        records: Vec<Record>,
        query_time: DateTime<Utc>,
        query_tag: Option<&str>,
    ) -> Result<(), EngineError> {
        let tag = self.event_tag(query_tag);
        let mut stream = EventStream::with_capacity(records.len());
        for record in records {
            stream.add(query_time, record);
        }
        self.router.emit_stream(&tag, stream).await?;
        Ok(())
    }

    /// `<tag>` or `<tag>.<suffix>`.
    pub fn event_tag(&self, query_tag: Option<&str>) -> String {
        match query_tag {
            Some(suffix) if !suffix.is_empty() => format!("{}.{}", self.tag, suffix),
            _ => self.tag.clone(),
        }
    }

    pub async fn close(&mut self) {
        self.client.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use database::testing::{ScriptedConnector, failure, rows};
    use database::{ConnectionParams, RetryPolicy};
    use events::EventsError;
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Records every batch; fails the calls whose index is listed.
    #[derive(Default)]
    struct RecordingRouter {
        emitted: Mutex<Vec<(String, EventStream)>>,
        calls: Mutex<usize>,
        fail_on_call: Vec<usize>,
    }

    impl RecordingRouter {
        fn emitted(&self) -> Vec<(String, EventStream)> {
            self.emitted.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl EventRouter for RecordingRouter {
        async fn emit_stream(&self, tag: &str, stream: EventStream) -> Result<(), EventsError> {
            let call = {
                let mut calls = self.calls.lock().unwrap();
                *calls += 1;
                *calls
            };
            if self.fail_on_call.contains(&call) {
                return Err(EventsError::Closed);
            }
            self.emitted.lock().unwrap().push((tag.to_string(), stream));
            Ok(())
        }
    }

    fn query(sql: &str, tag: Option<&str>) -> QuerySettings {
        QuerySettings { sql: sql.to_string(), tag: tag.map(str::to_string) }
    }

    fn executor(
        connector: &ScriptedConnector,
        queries: Vec<QuerySettings>,
        router: Arc<RecordingRouter>,
    ) -> PollingExecutor<ScriptedConnector> {
        let client = PgClient::new(
            connector.clone(),
            ConnectionParams { database: "test".to_string(), ..Default::default() },
            RetryPolicy { try_count: 3, try_delay: Duration::from_secs(5) },
        );
        PollingExecutor::new("pg_query".to_string(), queries, client, router)
    }

    #[tokio::test]
    async fn it_calls_the_client_with_the_expected_query() {
        let connector = ScriptedConnector::new();
        let router = Arc::new(RecordingRouter::default());
        let mut executor = executor(&connector, vec![query("select * from data", None)], router);

        executor.run_cycle().await;

        assert_eq!(connector.executed(), vec!["select * from data".to_string()]);
    }

    #[tokio::test]
    async fn it_emits_returned_records_under_the_base_tag() {
        let connector = ScriptedConnector::new();
        connector.push_execute(rows(vec![json!({ "test1": "test1" }), json!({ "test2": "test2" })]));
        let router = Arc::new(RecordingRouter::default());
        let mut executor =
            executor(&connector, vec![query("select * from data", None)], Arc::clone(&router));

        executor.run_cycle().await;

        let emitted = router.emitted();
        assert_eq!(emitted.len(), 1);
        let (tag, stream) = &emitted[0];
        assert_eq!(tag, "pg_query");
        let records: Vec<_> = stream.iter().map(|e| serde_json::Value::Object(e.record.clone())).collect();
        assert_eq!(records, vec![json!({ "test1": "test1" }), json!({ "test2": "test2" })]);
        assert!(stream.iter().all(|e| e.time == stream.iter().next().unwrap().time));
    }

    #[tokio::test]
    async fn it_emits_events_on_the_query_tag() {
        let connector = ScriptedConnector::new();
        connector.push_execute(rows(vec![json!({ "test3": "test3" })]));
        let router = Arc::new(RecordingRouter::default());
        let mut executor =
            executor(&connector, vec![query("select * from data", Some("test"))], Arc::clone(&router));

        executor.run_cycle().await;

        let emitted = router.emitted();
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].0, "pg_query.test");
        assert_eq!(emitted[0].1.len(), 1);
    }

    #[test]
    fn an_empty_query_tag_keeps_the_base_tag() {
        let executor = executor(&ScriptedConnector::new(), Vec::new(), Arc::default());

        assert_eq!(executor.event_tag(None), "pg_query");
        assert_eq!(executor.event_tag(Some("")), "pg_query");
        assert_eq!(executor.event_tag(Some("errors")), "pg_query.errors");
    }

    #[tokio::test]
    async fn a_failing_query_does_not_stop_the_cycle() {
        let connector = ScriptedConnector::new();
        connector.push_execute(rows(vec![json!({ "n": 1 })]));
        connector.push_execute(rows(vec![json!({ "n": 2 })]));
        connector.push_execute(rows(vec![json!({ "n": 3 })]));
        let router = Arc::new(RecordingRouter { fail_on_call: vec![2], ..Default::default() });
        let queries = vec![query("q1", Some("one")), query("q2", Some("two")), query("q3", Some("three"))];
        let mut executor = executor(&connector, queries, Arc::clone(&router));

        executor.run_cycle().await;

        let tags: Vec<_> = router.emitted().into_iter().map(|(tag, _)| tag).collect();
        assert_eq!(tags, vec!["pg_query.one".to_string(), "pg_query.three".to_string()]);
        assert_eq!(connector.executed(), vec!["q1", "q2", "q3"]);
    }

    #[tokio::test(start_paused = true)]
    async fn an_exhausted_query_emits_an_empty_batch_and_the_cycle_goes_on() {
        let connector = ScriptedConnector::new();
        for _ in 0..3 {
            connector.push_execute(failure("relation does not exist"));
        }
        connector.push_execute(rows(vec![json!({ "ok": true })]));
        let router = Arc::new(RecordingRouter::default());
        let queries = vec![query("select * from missing", None), query("select true as ok", Some("ok"))];
        let mut executor = executor(&connector, queries, Arc::clone(&router));

        executor.run_cycle().await;

        let emitted = router.emitted();
        assert_eq!(emitted.len(), 2);
        assert!(emitted[0].1.is_empty());
        assert_eq!(emitted[1].0, "pg_query.ok");
        assert_eq!(emitted[1].1.len(), 1);
    }

    #[tokio::test]
    async fn standby_runs_once_per_cycle() {
        let connector = ScriptedConnector::new();
        let router = Arc::new(RecordingRouter::default());
        let queries = vec![query("q1", None), query("q2", None), query("q3", None)];
        let mut executor = executor(&connector, queries, router);

        executor.run_cycle().await;

        // All three queries share one connection, closed once at the end.
        assert_eq!(connector.connects(), 1);
        assert_eq!(connector.closes(), 1);
        assert!(!executor.client().is_connected());

        executor.run_cycle().await;
        assert_eq!(connector.connects(), 2);
        assert_eq!(connector.closes(), 2);
    }

    #[tokio::test]
    async fn close_releases_a_connection_left_open_by_run_query() {
        let connector = ScriptedConnector::new();
        let router = Arc::new(RecordingRouter::default());
        let q = query("select 1", None);
        let mut executor = executor(&connector, vec![q.clone()], router);

        executor.run_query(&q).await.unwrap();
        assert!(executor.client().is_connected());

        executor.close().await;
        assert!(!executor.client().is_connected());
        assert_eq!(connector.closes(), 1);
    }

    #[tokio::test]
    async fn standby_runs_even_when_every_query_fails_to_emit() {
        let connector = ScriptedConnector::new();
        let router = Arc::new(RecordingRouter { fail_on_call: vec![1, 2], ..Default::default() });
        let mut executor = executor(&connector, vec![query("q1", None), query("q2", None)], router);

        executor.run_cycle().await;

        assert_eq!(connector.closes(), 1);
    }
}
