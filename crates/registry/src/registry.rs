//! The registry service: serialized writers, lock-free readers.
//!
//! ```text
//! command
//!   -> writer lock
//!   -> handle against the current catalog snapshot
//!   -> append to journal (expected version = snapshot version)
//!   -> apply to a copy, swap the snapshot pointer
//!   -> activation notices
//! ```
//!
//! Readers `load()` the snapshot pointer and never touch the writer lock, so a
//! reader observes either the catalog before a promotion or after it.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use chrono::Utc;
use tracing::{debug, info, warn};

use gridcast_core::{Aggregate, ExpectedVersion, Horizon, ModelArtifact, SchemaVersion, VersionId};
use gridcast_events::{Event, ModelActivated};

use crate::catalog::{CatalogCommand, CatalogEvent, ModelCatalog};
use crate::error::{RegistryError, RegistryResult};
use crate::journal::{JournalError, RegistryJournal, UncommittedEntry};
use crate::notify::{ActivationSink, ArtifactCheck};
use crate::policy::ValidationPolicy;

pub struct ModelRegistry<J> {
    journal: J,
    writer: Mutex<()>,
    state: ArcSwap<ModelCatalog>,
    sinks: Vec<Arc<dyn ActivationSink>>,
    checks: Vec<Arc<dyn ArtifactCheck>>,
}

impl<J> core::fmt::Debug for ModelRegistry<J> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("version", &self.state.load().version())
            .field("sinks", &self.sinks.len())
            .field("checks", &self.checks.len())
            .finish()
    }
}

impl<J> ModelRegistry<J>
where
    J: RegistryJournal,
{
    /// Rebuild the catalog from `journal`. `recognized` seeds the accepted
    /// feature schemas (normally the pipeline's current version).
    pub fn open(journal: J, recognized: impl IntoIterator<Item = SchemaVersion>) -> RegistryResult<Self> {
        let mut catalog = ModelCatalog::new(recognized);

        let entries = journal.load()?;
        for entry in &entries {
            let expected = catalog.version() + 1;
            if entry.sequence_number != expected {
                return Err(JournalError::Storage(format!(
                    "journal gap: expected sequence {expected}, found {}",
                    entry.sequence_number
                ))
                .into());
            }
            catalog.apply(&entry.decode()?);
        }

        info!(
            entries = entries.len(),
            active_horizons = catalog.active_all().len(),
            "model registry opened"
        );

        Ok(Self {
            journal,
            writer: Mutex::new(()),
            state: ArcSwap::from_pointee(catalog),
            sinks: Vec::new(),
            checks: Vec::new(),
        })
    }

    pub fn with_activation_sink(mut self, sink: Arc<dyn ActivationSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Checks run by `register`, in insertion order.
    pub fn with_artifact_check(mut self, check: Arc<dyn ArtifactCheck>) -> Self {
        self.checks.push(check);
        self
    }

    pub fn journal(&self) -> &J {
        &self.journal
    }

    /// Insert a STAGED artifact.
    pub fn register(&self, artifact: ModelArtifact) -> RegistryResult<Arc<ModelArtifact>> {
        let version_id = artifact.version_id();
        for check in &self.checks {
            if let Err(reason) = check.check(&artifact) {
                warn!(version = %version_id, %reason, "artifact rejected at registration");
                return Err(RegistryError::Validation(reason));
            }
        }
        let catalog = self.dispatch(CatalogCommand::Register {
            artifact,
            occurred_at: Utc::now(),
        })?;
        let artifact = Self::lookup(&catalog, version_id)?;
        info!(
            horizon = %artifact.horizon(),
            version = %version_id,
            schema = %artifact.schema_version(),
            "artifact registered"
        );
        Ok(artifact)
    }

    /// STAGED -> VALIDATED (offline checks already passed).
    pub fn validate(&self, version_id: VersionId) -> RegistryResult<Arc<ModelArtifact>> {
        let catalog = self.dispatch(CatalogCommand::Validate {
            version_id,
            occurred_at: Utc::now(),
        })?;
        debug!(version = %version_id, "artifact validated");
        Self::lookup(&catalog, version_id)
    }

    /// STAGED -> VALIDATED if the artifact's metrics satisfy `policy`.
    pub fn validate_with(
        &self,
        version_id: VersionId,
        policy: &ValidationPolicy,
    ) -> RegistryResult<Arc<ModelArtifact>> {
        let artifact = self.get(version_id)?;
        if let Err(reason) = policy.check(artifact.metrics()) {
            warn!(version = %version_id, %reason, "artifact failed validation policy");
            return Err(RegistryError::ValidationRejected { version_id, reason });
        }
        self.validate(version_id)
    }

    /// VALIDATED -> ACTIVE, retiring the previous ACTIVE artifact atomically.
    pub fn promote(&self, version_id: VersionId) -> RegistryResult<Arc<ModelArtifact>> {
        let catalog = self.dispatch(CatalogCommand::Promote {
            version_id,
            occurred_at: Utc::now(),
        })?;
        let artifact = Self::lookup(&catalog, version_id)?;
        info!(horizon = %artifact.horizon(), version = %version_id, "artifact promoted");
        Ok(artifact)
    }

    /// Re-activate the most recently retired-by-promotion artifact.
    pub fn rollback(&self, horizon: Horizon) -> RegistryResult<Arc<ModelArtifact>> {
        let catalog = self.dispatch(CatalogCommand::Rollback {
            horizon,
            occurred_at: Utc::now(),
        })?;
        let artifact = catalog
            .active(horizon)
            .cloned()
            .ok_or(RegistryError::ModelUnavailable(horizon))?;
        warn!(horizon = %horizon, version = %artifact.version_id(), "rolled back");
        Ok(artifact)
    }

    pub fn recognize_schema(&self, schema_version: SchemaVersion) -> RegistryResult<()> {
        self.dispatch(CatalogCommand::RecognizeSchema {
            schema_version,
            occurred_at: Utc::now(),
        })?;
        Ok(())
    }

    fn dispatch(&self, command: CatalogCommand) -> RegistryResult<Arc<ModelCatalog>> {
        let _writer = self.writer.lock().map_err(|_| RegistryError::Poisoned)?;

        let current = self.state.load_full();
        let events = current.handle(&command)?;
        if events.is_empty() {
            return Ok(current);
        }

        let entries = events
            .iter()
            .map(UncommittedEntry::from_event)
            .collect::<Result<Vec<_>, _>>()?;
        self.journal
            .append(entries, ExpectedVersion::Exact(current.version()))?;

        let mut next = (*current).clone();
        for event in &events {
            next.apply(event);
        }
        let next = Arc::new(next);
        self.state.store(Arc::clone(&next));

        for event in &events {
            self.notify(&next, event);
        }

        Ok(next)
    }

    fn notify(&self, catalog: &ModelCatalog, event: &CatalogEvent) {
        let Some((horizon, version_id, previous)) = event.activation() else {
            return;
        };
        let Some(artifact) = catalog.get(version_id) else {
            return;
        };

        let notice = ModelActivated {
            horizon,
            version_id,
            metrics: *artifact.metrics(),
            previous,
            rollback: matches!(event, CatalogEvent::RolledBack { .. }),
            activated_at: event.occurred_at(),
        };
        for sink in &self.sinks {
            sink.activated(&notice);
        }
    }

    fn lookup(catalog: &ModelCatalog, version_id: VersionId) -> RegistryResult<Arc<ModelArtifact>> {
        catalog
            .get(version_id)
            .cloned()
            .ok_or(RegistryError::UnknownVersion(version_id))
    }
}

impl<J> ModelRegistry<J> {
    /// Lock-free read of the ACTIVE artifact for `horizon`.
    pub fn get_active(&self, horizon: Horizon) -> RegistryResult<Arc<ModelArtifact>> {
        self.state
            .load()
            .active(horizon)
            .cloned()
            .ok_or(RegistryError::ModelUnavailable(horizon))
    }

    /// Every ACTIVE artifact, taken from one snapshot.
    pub fn snapshot(&self) -> BTreeMap<Horizon, Arc<ModelArtifact>> {
        self.state.load().active_all()
    }

    /// The whole catalog as of now. Later writes do not affect it.
    pub fn catalog(&self) -> Arc<ModelCatalog> {
        self.state.load_full()
    }

    pub fn get(&self, version_id: VersionId) -> RegistryResult<Arc<ModelArtifact>> {
        self.state
            .load()
            .get(version_id)
            .cloned()
            .ok_or(RegistryError::UnknownVersion(version_id))
    }

    pub fn list(&self, horizon: Horizon) -> Vec<Arc<ModelArtifact>> {
        self.state.load().list(horizon)
    }

    pub fn is_recognized(&self, schema_version: &SchemaVersion) -> bool {
        self.state.load().is_recognized(schema_version)
    }

    pub fn version(&self) -> u64 {
        self.state.load().version()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    use chrono::{DateTime, TimeZone};
    use gridcast_core::{ArtifactMetrics, ArtifactStatus, TimeRange};
    use gridcast_events::{EventEnvelope, GridEvent, InMemoryEventBus, SequencedPublisher};

    use crate::journal::InMemoryRegistryJournal;

    fn schema() -> SchemaVersion {
        SchemaVersion::new("fs-00000000000000aa")
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
    }

    fn artifact(horizon: Horizon, mae: f64) -> ModelArtifact {
        ModelArtifact::staged(
            VersionId::new(),
            horizon,
            schema(),
            TimeRange::new(t0(), t0() + chrono::Duration::days(90)).unwrap(),
            ArtifactMetrics {
                mae,
                rmse: mae * 1.2,
                mape: 0.03,
                peak_load_error: mae * 4.0,
            },
            t0(),
        )
    }

    fn registry() -> ModelRegistry<Arc<InMemoryRegistryJournal>> {
        ModelRegistry::open(Arc::new(InMemoryRegistryJournal::new()), [schema()]).unwrap()
    }

    fn ready(r: &ModelRegistry<Arc<InMemoryRegistryJournal>>, horizon: Horizon) -> VersionId {
        let id = r.register(artifact(horizon, 10.0)).unwrap().version_id();
        r.validate(id).unwrap();
        id
    }

    #[test]
    fn promote_and_rollback_scenario() {
        let r = registry();
        assert_eq!(
            r.get_active(Horizon::DAY_1).unwrap_err(),
            RegistryError::ModelUnavailable(Horizon::DAY_1)
        );

        let v1 = ready(&r, Horizon::DAY_1);
        r.promote(v1).unwrap();
        assert_eq!(r.get_active(Horizon::DAY_1).unwrap().version_id(), v1);

        let v2 = ready(&r, Horizon::DAY_1);
        r.promote(v2).unwrap();
        assert_eq!(r.get_active(Horizon::DAY_1).unwrap().version_id(), v2);
        assert_eq!(r.get(v1).unwrap().status(), ArtifactStatus::Retired);

        let restored = r.rollback(Horizon::DAY_1).unwrap();
        assert_eq!(restored.version_id(), v1);
        assert_eq!(r.get_active(Horizon::DAY_1).unwrap().version_id(), v1);
        assert_eq!(r.get(v2).unwrap().status(), ArtifactStatus::Retired);

        assert_eq!(
            r.rollback(Horizon::DAY_1).unwrap_err(),
            RegistryError::NoPriorVersion(Horizon::DAY_1)
        );
    }

    #[test]
    fn rollback_without_history_fails() {
        let r = registry();
        let v1 = ready(&r, Horizon::HOUR_1);
        r.promote(v1).unwrap();
        assert_eq!(
            r.rollback(Horizon::HOUR_1).unwrap_err(),
            RegistryError::NoPriorVersion(Horizon::HOUR_1)
        );
    }

    #[test]
    fn failed_commands_leave_state_untouched() {
        let r = registry();
        let staged = r.register(artifact(Horizon::HOUR_1, 10.0)).unwrap().version_id();
        let before = r.version();

        assert!(matches!(
            r.promote(staged),
            Err(RegistryError::InvalidTransition { .. })
        ));
        assert!(matches!(
            r.promote(VersionId::new()),
            Err(RegistryError::UnknownVersion(_))
        ));
        assert_eq!(r.version(), before);
        assert_eq!(r.journal().load().unwrap().len() as u64, before);
    }

    #[test]
    fn validation_policy_keeps_artifact_staged() {
        let r = registry();
        let id = r.register(artifact(Horizon::HOUR_1, 50.0)).unwrap().version_id();
        let policy = ValidationPolicy {
            max_mae: Some(20.0),
            ..ValidationPolicy::default()
        };

        let err = r.validate_with(id, &policy).unwrap_err();
        assert!(matches!(err, RegistryError::ValidationRejected { .. }));
        assert_eq!(r.get(id).unwrap().status(), ArtifactStatus::Staged);

        let lenient = ValidationPolicy {
            max_mae: Some(60.0),
            ..ValidationPolicy::default()
        };
        assert_eq!(
            r.validate_with(id, &lenient).unwrap().status(),
            ArtifactStatus::Validated
        );
    }

    #[test]
    fn schemas_must_be_recognized_before_register() {
        let r = registry();
        let other = SchemaVersion::new("fs-00000000000000bb");
        let a = ModelArtifact::staged(
            VersionId::new(),
            Horizon::HOUR_1,
            other.clone(),
            TimeRange::new(t0(), t0()).unwrap(),
            *artifact(Horizon::HOUR_1, 1.0).metrics(),
            t0(),
        );
        assert_eq!(
            r.register(a.clone()).unwrap_err(),
            RegistryError::UnrecognizedSchema(other.clone())
        );

        r.recognize_schema(other.clone()).unwrap();
        assert!(r.is_recognized(&other));
        r.register(a).unwrap();
    }

    #[test]
    fn reopening_replays_the_journal() {
        let journal = Arc::new(InMemoryRegistryJournal::new());
        let r = ModelRegistry::open(Arc::clone(&journal), [schema()]).unwrap();
        let v1 = ready(&r, Horizon::HOUR_1);
        let v2 = ready(&r, Horizon::HOUR_1);
        r.promote(v1).unwrap();
        r.promote(v2).unwrap();
        let staged = r.register(artifact(Horizon::DAY_1, 9.0)).unwrap().version_id();

        let reopened = ModelRegistry::open(Arc::clone(&journal), [schema()]).unwrap();
        assert_eq!(reopened.version(), r.version());
        assert_eq!(reopened.get_active(Horizon::HOUR_1).unwrap().version_id(), v2);
        assert_eq!(reopened.get(staged).unwrap().status(), ArtifactStatus::Staged);
        assert_eq!(reopened.catalog().rollback_candidates(Horizon::HOUR_1), &[v1]);
        assert_eq!(reopened.rollback(Horizon::HOUR_1).unwrap().version_id(), v1);
    }

    #[test]
    fn activations_are_forwarded_to_the_bus() {
        let bus: Arc<InMemoryEventBus<EventEnvelope<GridEvent>>> = Arc::new(InMemoryEventBus::new());
        let publisher = Arc::new(SequencedPublisher::new(bus));
        let sub = publisher.subscribe();
        let r = registry().with_activation_sink(publisher);

        let v1 = ready(&r, Horizon::HOUR_1);
        r.promote(v1).unwrap();
        let v2 = ready(&r, Horizon::HOUR_1);
        r.promote(v2).unwrap();
        r.rollback(Horizon::HOUR_1).unwrap();

        let notices: Vec<_> = std::iter::from_fn(|| sub.try_recv().ok())
            .map(|env| match env.into_payload() {
                GridEvent::ModelActivated(n) => (n.version_id, n.previous, n.rollback),
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(
            notices,
            vec![(v1, None, false), (v2, Some(v1), false), (v1, Some(v2), true)]
        );
    }

    struct DayAheadOnly;

    impl ArtifactCheck for DayAheadOnly {
        fn check(&self, artifact: &ModelArtifact) -> Result<(), String> {
            if artifact.horizon() == Horizon::DAY_1 {
                Ok(())
            } else {
                Err(format!("runtime cannot serve {}", artifact.horizon()))
            }
        }
    }

    #[test]
    fn failed_artifact_check_leaves_no_trace() {
        let r = registry().with_artifact_check(Arc::new(DayAheadOnly));
        let before = r.version();

        let err = r.register(artifact(Horizon::HOUR_1, 9.0)).unwrap_err();
        assert!(matches!(err, RegistryError::Validation(ref m) if m.contains("cannot serve 1h")));
        assert_eq!(err.kind(), "validation_error");
        assert_eq!(r.version(), before);
        assert!(r.list(Horizon::HOUR_1).is_empty());

        assert!(r.register(artifact(Horizon::DAY_1, 9.0)).is_ok());
    }

    #[test]
    fn readers_see_old_or_new_never_neither() {
        let r = Arc::new(registry());
        let v1 = ready(&r, Horizon::HOUR_1);
        r.promote(v1).unwrap();
        let candidates: Vec<VersionId> = (0..20).map(|_| ready(&r, Horizon::HOUR_1)).collect();

        let done = Arc::new(AtomicBool::new(false));
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let r = Arc::clone(&r);
                let done = Arc::clone(&done);
                thread::spawn(move || {
                    let mut seen = Vec::new();
                    while !done.load(Ordering::Acquire) {
                        let active = r.get_active(Horizon::HOUR_1).expect("always an active model");
                        assert_eq!(active.status(), ArtifactStatus::Active);
                        if seen.last() != Some(&active.version_id()) {
                            seen.push(active.version_id());
                        }
                    }
                    seen
                })
            })
            .collect();

        for id in &candidates {
            r.promote(*id).unwrap();
        }
        done.store(true, Ordering::Release);

        let order: Vec<VersionId> = std::iter::once(v1).chain(candidates.iter().copied()).collect();
        for reader in readers {
            let seen = reader.join().unwrap();
            // Each reader observes activations in commit order, possibly skipping some.
            let mut cursor = 0;
            for v in seen {
                let pos = order[cursor..]
                    .iter()
                    .position(|o| *o == v)
                    .expect("observed version was active at some instant");
                cursor += pos;
            }
        }
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Op {
            Register(usize),
            Validate(usize),
            Promote(usize),
            Rollback(usize),
        }

        const HORIZONS: [Horizon; 2] = [Horizon::HOUR_1, Horizon::DAY_1];

        fn op() -> impl Strategy<Value = Op> {
            prop_oneof![
                (0usize..2).prop_map(Op::Register),
                (0usize..16).prop_map(Op::Validate),
                (0usize..16).prop_map(Op::Promote),
                (0usize..2).prop_map(Op::Rollback),
            ]
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 256,
                ..ProptestConfig::default()
            })]

            /// Property: any sequence of operations leaves 0 or 1 ACTIVE artifact per horizon.
            #[test]
            fn at_most_one_active_per_horizon(ops in prop::collection::vec(op(), 1..60)) {
                let r = registry();
                let mut ids: Vec<VersionId> = Vec::new();

                for op in ops {
                    let _ = match op {
                        Op::Register(h) => r.register(artifact(HORIZONS[h], 5.0)).map(|a| {
                            ids.push(a.version_id());
                        }),
                        Op::Validate(i) if !ids.is_empty() => r.validate(ids[i % ids.len()]).map(|_| ()),
                        Op::Promote(i) if !ids.is_empty() => r.promote(ids[i % ids.len()]).map(|_| ()),
                        Op::Rollback(h) => r.rollback(HORIZONS[h]).map(|_| ()),
                        _ => Ok(()),
                    };

                    for h in HORIZONS {
                        let active: Vec<_> = r
                            .list(h)
                            .into_iter()
                            .filter(|a| a.status() == ArtifactStatus::Active)
                            .collect();
                        prop_assert!(active.len() <= 1);
                        match r.get_active(h) {
                            Ok(a) => {
                                prop_assert_eq!(active.len(), 1);
                                prop_assert_eq!(active[0].version_id(), a.version_id());
                            }
                            Err(e) => {
                                prop_assert!(active.is_empty());
                                prop_assert_eq!(e, RegistryError::ModelUnavailable(h));
                            }
                        }
                    }
                }
            }
        }
    }
}
