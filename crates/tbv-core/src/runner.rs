//! Batch execution of versioned operations against a graph session.
//!
//! A runner captures "now" once. Mutations of a run are anchored at that
//! instant and executed in order; queries are anchored `read_offset_secs`
//! later so they observe the run's writes, and run concurrently. Callers may
//! pin any operation to another instant by passing `_version` themselves;
//! such instants, and `ver` arguments, are re-rendered in the stored form.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{TbvError, TbvResult};
use crate::rewrite::{RewritePlan, VersionedSchema};
use crate::traits::GraphSession;
use crate::types::{Cypher, FieldCall, Row};
use crate::versioning::{
    instant_value, normalize_instant, parse_instant, VersionClock, VersionTimeline, VersionWindow,
};

/// Resource identity: type name and id.
type ResourceKey = (String, String);

/// Executes operation batches through a [`VersionedSchema`].
pub struct VersionedRunner {
    schema: Arc<VersionedSchema>,
    session: Arc<dyn GraphSession>,
    clock: VersionClock,
    write_locks: Mutex<HashMap<ResourceKey, Arc<Mutex<()>>>>,
}

impl VersionedRunner {
    /// Create a runner whose clock captures the current instant.
    pub fn new(schema: Arc<VersionedSchema>, session: Arc<dyn GraphSession>) -> Self {
        let clock = VersionClock::now(schema.config().read_offset_secs);
        Self::with_clock(schema, session, clock)
    }

    pub fn with_clock(
        schema: Arc<VersionedSchema>,
        session: Arc<dyn GraphSession>,
        clock: VersionClock,
    ) -> Self {
        Self {
            schema,
            session,
            clock,
            write_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn clock(&self) -> VersionClock {
        self.clock
    }

    pub fn schema(&self) -> &VersionedSchema {
        &self.schema
    }

    /// Run mutations in order at the run's write instant.
    pub async fn run_mutations(&self, calls: Vec<FieldCall>) -> Vec<TbvResult<Vec<Row>>> {
        info!("Running {} mutations", calls.len());
        self.run_at(calls, self.clock.write_instant()).await
    }

    /// Run queries concurrently at the run's read instant.
    pub async fn run_queries(&self, calls: Vec<FieldCall>) -> Vec<TbvResult<Vec<Row>>> {
        info!("Running {} queries", calls.len());
        let instant = self.clock.read_instant();
        join_all(calls.into_iter().map(|call| self.execute(call, instant))).await
    }

    /// Run operations in order at an explicit instant.
    ///
    /// A failing operation does not stop the rest of the batch.
    pub async fn run_at(
        &self,
        calls: Vec<FieldCall>,
        instant: DateTime<Utc>,
    ) -> Vec<TbvResult<Vec<Row>>> {
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            results.push(self.execute(call, instant).await);
        }
        results
    }

    /// Execute one operation. `_version` defaults to `instant`.
    pub async fn execute(&self, mut call: FieldCall, instant: DateTime<Utc>) -> TbvResult<Vec<Row>> {
        let config = self.schema.config();
        for name in [&config.version_param, &config.version_argument] {
            if let Some(value) = call.params.get_mut(name.as_str()) {
                *value = normalize_instant(value)?;
            }
        }
        let version_param = &config.version_param;
        call.param_if_absent(version_param, instant_value(instant));

        let mut cypher = self.schema.resolve(&call)?;
        if let Some(version) = call.params.get(version_param) {
            cypher.param_if_absent(version_param, version.clone());
        }

        let Some(key) = self.write_key(&call) else {
            debug!(field = %call.field, "Executing: {}", cypher);
            return self.session.run(&cypher).await;
        };

        let lock = self.write_lock(key.clone()).await;
        let result = {
            let _guard = lock.lock().await;
            debug!(field = %call.field, "Executing: {}", cypher);
            self.session.run(&cypher).await
        };
        self.release_write_lock(&key, lock).await;
        result
    }

    /// Read the version windows of one resource and check them.
    pub async fn audit_resource(&self, type_name: &str, id: &str) -> TbvResult<VersionTimeline> {
        let labels = &self.schema.config().labels;
        let cypher = Cypher::new(format!(
            "MATCH (r:{resource} {{id: $id}})<-[v:{edge}]-() \
             RETURN v.from AS from, v.to AS to ORDER BY v.from",
            resource = labels.resource_labels(type_name),
            edge = labels.version_edge,
        ))
        .param("id", id);

        let rows = self.session.run(&cypher).await?;
        let windows = rows
            .iter()
            .map(window_from_row)
            .collect::<TbvResult<Vec<_>>>()?;
        let timeline = VersionTimeline::from_windows(windows);
        timeline.validate()?;

        debug!(
            "Audited {} '{}': {} versions",
            type_name,
            id,
            timeline.len()
        );
        Ok(timeline)
    }

    fn write_key(&self, call: &FieldCall) -> Option<ResourceKey> {
        if !self.schema.config().serialize_writes {
            return None;
        }
        let RewritePlan::Create(rewrite) = self.schema.plan(&call.field)? else {
            return None;
        };
        let id = match call.params.get("id")? {
            Value::String(id) => id.clone(),
            other => other.to_string(),
        };
        Some((rewrite.type_name().to_string(), id))
    }

    async fn write_lock(&self, key: ResourceKey) -> Arc<Mutex<()>> {
        let mut locks = self.write_locks.lock().await;
        locks.entry(key).or_default().clone()
    }

    /// Drop the entry once no other writer holds or waits for it.
    async fn release_write_lock(&self, key: &ResourceKey, lock: Arc<Mutex<()>>) {
        let mut locks = self.write_locks.lock().await;
        drop(lock);
        if locks.get(key).is_some_and(|entry| Arc::strong_count(entry) == 1) {
            locks.remove(key);
        }
    }
}

fn window_from_row(row: &Row) -> TbvResult<VersionWindow> {
    let from = match row.get("from") {
        Some(Value::String(from)) => parse_instant(from)?,
        other => {
            return Err(TbvError::Internal(format!(
                "version edge without a valid 'from': {:?}",
                other
            )))
        }
    };
    let to = match row.get("to") {
        None | Some(Value::Null) => None,
        Some(Value::String(to)) => Some(parse_instant(to)?),
        Some(other) => {
            return Err(TbvError::Internal(format!(
                "version edge with invalid 'to': {}",
                other
            )))
        }
    };
    Ok(VersionWindow { from, to })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    use crate::config::TbvConfig;
    use crate::error::ErrorCode;
    use crate::traits::{CompiledField, CompiledSchema, ResolverKind, SchemaCompiler};
    use crate::types::{TypeDefinition, TypeRef, TypeRegistry};
    use crate::versioning::format_instant;

    #[derive(Default)]
    struct StubSession {
        statements: std::sync::Mutex<Vec<Cypher>>,
        rows: Vec<Row>,
    }

    #[async_trait]
    impl GraphSession for StubSession {
        async fn run(&self, cypher: &Cypher) -> TbvResult<Vec<Row>> {
            self.statements.lock().unwrap().push(cypher.clone());
            Ok(self.rows.clone())
        }
    }

    struct PersonCompiler;

    impl SchemaCompiler for PersonCompiler {
        fn compile(&self, _registry: &TypeRegistry) -> TbvResult<CompiledSchema> {
            let field = |name: &str, kind: ResolverKind, query: &'static str| {
                CompiledField::new(
                    name,
                    TypeRef::named("Person"),
                    kind,
                    Arc::new(move |call: &FieldCall| -> TbvResult<Cypher> {
                        Ok(Cypher::with_params(query, call.params.clone()))
                    }),
                )
            };
            Ok(CompiledSchema {
                queries: vec![field(
                    "person",
                    ResolverKind::Query,
                    "MATCH (person:Person) WHERE person.id = $id RETURN person { .name } AS person",
                )],
                mutations: vec![
                    field(
                        "createPerson",
                        ResolverKind::Create,
                        "CREATE (createPerson:Person { id: $id, name: $name }) \
                         WITH createPerson RETURN createPerson { .id } AS createPerson",
                    ),
                    field("deletePerson", ResolverKind::Other, "MATCH (n) DETACH DELETE n"),
                ],
            })
        }
    }

    fn t1() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 9, 0, 0).unwrap()
    }

    fn runner(session: Arc<StubSession>) -> VersionedRunner {
        let registry = TypeRegistry::new().with_type(TypeDefinition::object("Person"));
        let schema = VersionedSchema::build(&registry, &PersonCompiler, TbvConfig::default()).unwrap();
        VersionedRunner::with_clock(Arc::new(schema), session, VersionClock::at(t1(), 1))
    }

    #[tokio::test]
    async fn test_mutations_and_queries_share_captured_instant() {
        let session = Arc::new(StubSession::default());
        let runner = runner(session.clone());

        runner
            .run_mutations(vec![FieldCall::new("createPerson")
                .param("id", "ne")
                .param("name", "Neo")])
            .await;
        runner
            .run_queries(vec![
                FieldCall::new("person").param("id", "ne"),
                FieldCall::new("person").with_alias("p").param("id", "ne"),
            ])
            .await;

        let statements = session.statements.lock().unwrap();
        assert_eq!(statements.len(), 3);
        assert_eq!(statements[0].params["_version"], json!(format_instant(t1())));
        let read_instant = json!(format_instant(t1() + Duration::seconds(1)));
        assert_eq!(statements[1].params["_version"], read_instant);
        assert_eq!(statements[2].params["_version"], read_instant);
    }

    #[tokio::test]
    async fn test_explicit_version_is_kept_and_appended_last() {
        let session = Arc::new(StubSession::default());
        let runner = runner(session.clone());

        runner
            .run_mutations(vec![FieldCall::new("createPerson")
                .param("id", "ne")
                .param("name", "Neo")])
            .await;
        runner
            .run_queries(vec![FieldCall::new("person")
                .param("_version", "2020-01-01T00:00:00.000Z")
                .param("id", "ne")])
            .await;

        let statements = session.statements.lock().unwrap();
        let keys: Vec<&str> = statements[0].params.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["id", "name", "_version"]);
        assert_eq!(statements[1].params["_version"], "2020-01-01T00:00:00.000Z");
    }

    #[tokio::test]
    async fn test_explicit_version_is_rendered_in_stored_form() {
        let session = Arc::new(StubSession::default());
        let runner = runner(session.clone());

        runner
            .run_queries(vec![
                FieldCall::new("person")
                    .param("id", "ne")
                    .param("_version", "2026-10-18T09:00:00Z"),
                FieldCall::new("person")
                    .param("id", "ne")
                    .param("_version", "2026-10-18T11:00:00.5+02:00"),
                FieldCall::new("person")
                    .param("id", "ne")
                    .param("ver", "2026-10-18T09:00:00Z"),
            ])
            .await;

        let statements = session.statements.lock().unwrap();
        assert_eq!(statements[0].params["_version"], "2026-10-18T09:00:00.000Z");
        assert_eq!(statements[1].params["_version"], "2026-10-18T09:00:00.500Z");
        assert_eq!(statements[2].params["ver"], "2026-10-18T09:00:00.000Z");
    }

    #[tokio::test]
    async fn test_unparsable_version_is_rejected() {
        let session = Arc::new(StubSession::default());
        let runner = runner(session.clone());

        let results = runner
            .run_queries(vec![
                FieldCall::new("person").param("id", "ne").param("_version", "yesterday"),
                FieldCall::new("person").param("id", "ne").param("ver", 20261018),
            ])
            .await;

        for result in &results {
            assert_eq!(
                result.as_ref().unwrap_err().code(),
                ErrorCode::VerInvalidInstant
            );
        }
        assert!(session.statements.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_write_locks_released_after_creates() {
        let session = Arc::new(StubSession::default());
        let runner = runner(session.clone());

        let calls = (0..100)
            .map(|i| {
                FieldCall::new("createPerson")
                    .param("id", format!("p{i}"))
                    .param("name", "Neo")
            })
            .collect();
        let results = runner.run_mutations(calls).await;

        assert!(results.iter().all(Result::is_ok));
        assert_eq!(session.statements.lock().unwrap().len(), 100);
        assert!(runner.write_locks.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_writers_leave_no_lock_entry() {
        let session = Arc::new(StubSession::default());
        let runner = runner(session.clone());
        let call = FieldCall::new("createPerson").param("id", "ne").param("name", "Neo");

        let (a, b) = tokio::join!(
            runner.execute(call.clone(), t1()),
            runner.execute(call, t1() + Duration::hours(1)),
        );
        assert!(a.is_ok() && b.is_ok());
        assert!(runner.write_locks.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_operation_does_not_stop_batch() {
        let session = Arc::new(StubSession::default());
        let runner = runner(session.clone());

        let results = runner
            .run_mutations(vec![
                FieldCall::new("deletePerson").param("id", "ne"),
                FieldCall::new("createPerson").param("id", "ne").param("name", "Neo"),
            ])
            .await;

        assert_eq!(
            results[0].as_ref().unwrap_err().code(),
            ErrorCode::OpUnsupportedMutation
        );
        assert!(results[1].is_ok());
        assert_eq!(session.statements.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_audit_resource_reads_windows() {
        let t2 = t1() + Duration::hours(1);
        let row = |from: Value, to: Value| {
            let mut row = Row::new();
            row.insert("from".to_string(), from);
            row.insert("to".to_string(), to);
            row
        };
        let session = Arc::new(StubSession {
            rows: vec![
                row(json!(format_instant(t1())), json!(format_instant(t2))),
                row(json!(format_instant(t2)), Value::Null),
            ],
            ..Default::default()
        });
        let runner = runner(session.clone());

        let timeline = runner.audit_resource("Person", "ne").await.unwrap();
        assert_eq!(
            timeline.windows(),
            &[VersionWindow::closed(t1(), t2), VersionWindow::open(t2)]
        );

        let statements = session.statements.lock().unwrap();
        assert!(statements[0]
            .query
            .starts_with("MATCH (r:Person_R:RESOURCE {id: $id})<-[v:VERSION_OF]-()"));
    }

    #[tokio::test]
    async fn test_audit_resource_rejects_overlap() {
        let session = Arc::new(StubSession {
            rows: vec![
                serde_json::from_value(json!({"from": "2026-10-18T09:00:00.000Z", "to": null}))
                    .unwrap(),
                serde_json::from_value(json!({"from": "2026-10-18T10:00:00.000Z", "to": null}))
                    .unwrap(),
            ],
            ..Default::default()
        });
        let err = runner(session).audit_resource("Person", "ne").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::VerMultipleOpen);
    }
}
