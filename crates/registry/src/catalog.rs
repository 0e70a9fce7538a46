//! Model catalog aggregate.
//!
//! Pure decision logic over the set of registered artifacts:
//!
//! - `register` adds a STAGED artifact (recognized schema, unique version id)
//! - `validate` moves STAGED -> VALIDATED
//! - `promote` moves VALIDATED -> ACTIVE and retires the previous ACTIVE
//!   artifact of the same horizon in the same event
//! - `rollback` re-activates the most recently retired-by-promotion artifact
//!
//! Timestamps travel inside commands; nothing here reads a clock.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gridcast_core::{Aggregate, ArtifactStatus, Horizon, ModelArtifact, SchemaVersion, VersionId};
use gridcast_events::Event;

use crate::error::RegistryError;

#[derive(Debug, Clone, PartialEq)]
pub enum CatalogCommand {
    RecognizeSchema {
        schema_version: SchemaVersion,
        occurred_at: DateTime<Utc>,
    },
    Register {
        artifact: ModelArtifact,
        occurred_at: DateTime<Utc>,
    },
    Validate {
        version_id: VersionId,
        occurred_at: DateTime<Utc>,
    },
    Promote {
        version_id: VersionId,
        occurred_at: DateTime<Utc>,
    },
    Rollback {
        horizon: Horizon,
        occurred_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CatalogEvent {
    SchemaRecognized {
        schema_version: SchemaVersion,
        occurred_at: DateTime<Utc>,
    },
    ArtifactRegistered {
        artifact: ModelArtifact,
        occurred_at: DateTime<Utc>,
    },
    ArtifactValidated {
        version_id: VersionId,
        occurred_at: DateTime<Utc>,
    },
    ArtifactPromoted {
        version_id: VersionId,
        horizon: Horizon,
        /// Previous ACTIVE artifact, now RETIRED and a rollback candidate.
        retired: Option<VersionId>,
        occurred_at: DateTime<Utc>,
    },
    RolledBack {
        horizon: Horizon,
        restored: VersionId,
        /// Artifact rolled away from; RETIRED but never a rollback candidate.
        retired: Option<VersionId>,
        occurred_at: DateTime<Utc>,
    },
}

impl Event for CatalogEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CatalogEvent::SchemaRecognized { .. } => "registry.schema_recognized",
            CatalogEvent::ArtifactRegistered { .. } => "registry.artifact_registered",
            CatalogEvent::ArtifactValidated { .. } => "registry.artifact_validated",
            CatalogEvent::ArtifactPromoted { .. } => "registry.artifact_promoted",
            CatalogEvent::RolledBack { .. } => "registry.rolled_back",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            CatalogEvent::SchemaRecognized { occurred_at, .. }
            | CatalogEvent::ArtifactRegistered { occurred_at, .. }
            | CatalogEvent::ArtifactValidated { occurred_at, .. }
            | CatalogEvent::ArtifactPromoted { occurred_at, .. }
            | CatalogEvent::RolledBack { occurred_at, .. } => *occurred_at,
        }
    }
}

impl CatalogEvent {
    /// The activation this event performs, if any: `(horizon, now ACTIVE, previous)`.
    pub fn activation(&self) -> Option<(Horizon, VersionId, Option<VersionId>)> {
        match self {
            CatalogEvent::ArtifactPromoted {
                version_id,
                horizon,
                retired,
                ..
            } => Some((*horizon, *version_id, *retired)),
            CatalogEvent::RolledBack {
                horizon,
                restored,
                retired,
                ..
            } => Some((*horizon, *restored, *retired)),
            _ => None,
        }
    }
}

/// Catalog state. Cheap to clone: artifacts are shared behind `Arc`.
#[derive(Debug, Clone, Default)]
pub struct ModelCatalog {
    artifacts: BTreeMap<VersionId, Arc<ModelArtifact>>,
    active: BTreeMap<Horizon, VersionId>,
    /// Retired-by-promotion artifacts per horizon, most recent last.
    rollback_candidates: BTreeMap<Horizon, Vec<VersionId>>,
    recognized_schemas: BTreeSet<SchemaVersion>,
    version: u64,
}

impl ModelCatalog {
    pub fn new(recognized: impl IntoIterator<Item = SchemaVersion>) -> Self {
        Self {
            recognized_schemas: recognized.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn get(&self, version_id: VersionId) -> Option<&Arc<ModelArtifact>> {
        self.artifacts.get(&version_id)
    }

    pub fn active(&self, horizon: Horizon) -> Option<&Arc<ModelArtifact>> {
        self.active
            .get(&horizon)
            .and_then(|v| self.artifacts.get(v))
    }

    pub fn active_all(&self) -> BTreeMap<Horizon, Arc<ModelArtifact>> {
        self.active
            .iter()
            .filter_map(|(h, v)| self.artifacts.get(v).map(|a| (*h, Arc::clone(a))))
            .collect()
    }

    /// Artifacts of one horizon, oldest registration first.
    pub fn list(&self, horizon: Horizon) -> Vec<Arc<ModelArtifact>> {
        let mut out: Vec<_> = self
            .artifacts
            .values()
            .filter(|a| a.horizon() == horizon)
            .cloned()
            .collect();
        out.sort_by_key(|a| (a.created_at(), a.version_id()));
        out
    }

    pub fn rollback_candidates(&self, horizon: Horizon) -> &[VersionId] {
        self.rollback_candidates
            .get(&horizon)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_recognized(&self, schema_version: &SchemaVersion) -> bool {
        self.recognized_schemas.contains(schema_version)
    }

    pub fn recognized_schemas(&self) -> impl Iterator<Item = &SchemaVersion> {
        self.recognized_schemas.iter()
    }

    fn require(&self, version_id: VersionId) -> Result<&Arc<ModelArtifact>, RegistryError> {
        self.artifacts
            .get(&version_id)
            .ok_or(RegistryError::UnknownVersion(version_id))
    }

    fn set_status(&mut self, version_id: VersionId, status: ArtifactStatus) {
        if let Some(a) = self.artifacts.get_mut(&version_id) {
            *a = Arc::new(a.with_status(status));
        }
    }
}

impl Aggregate for ModelCatalog {
    type Command = CatalogCommand;
    type Event = CatalogEvent;
    type Error = RegistryError;

    fn version(&self) -> u64 {
        self.version
    }

    fn apply(&mut self, event: &Self::Event) {
        match event {
            CatalogEvent::SchemaRecognized { schema_version, .. } => {
                self.recognized_schemas.insert(schema_version.clone());
            }
            CatalogEvent::ArtifactRegistered { artifact, .. } => {
                self.artifacts.insert(
                    artifact.version_id(),
                    Arc::new(artifact.with_status(ArtifactStatus::Staged)),
                );
            }
            CatalogEvent::ArtifactValidated { version_id, .. } => {
                self.set_status(*version_id, ArtifactStatus::Validated);
            }
            CatalogEvent::ArtifactPromoted {
                version_id,
                horizon,
                retired,
                ..
            } => {
                if let Some(prev) = retired {
                    self.set_status(*prev, ArtifactStatus::Retired);
                    self.rollback_candidates.entry(*horizon).or_default().push(*prev);
                }
                self.set_status(*version_id, ArtifactStatus::Active);
                self.active.insert(*horizon, *version_id);
            }
            CatalogEvent::RolledBack {
                horizon,
                restored,
                retired,
                ..
            } => {
                if let Some(stack) = self.rollback_candidates.get_mut(horizon) {
                    stack.retain(|v| v != restored);
                }
                if let Some(prev) = retired {
                    self.set_status(*prev, ArtifactStatus::Retired);
                }
                self.set_status(*restored, ArtifactStatus::Active);
                self.active.insert(*horizon, *restored);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            CatalogCommand::RecognizeSchema {
                schema_version,
                occurred_at,
            } => {
                if schema_version.as_str().trim().is_empty() {
                    return Err(RegistryError::Validation(
                        "schema version cannot be empty".to_string(),
                    ));
                }
                if self.is_recognized(schema_version) {
                    return Ok(vec![]);
                }
                Ok(vec![CatalogEvent::SchemaRecognized {
                    schema_version: schema_version.clone(),
                    occurred_at: *occurred_at,
                }])
            }

            CatalogCommand::Register {
                artifact,
                occurred_at,
            } => {
                if self.artifacts.contains_key(&artifact.version_id()) {
                    return Err(RegistryError::DuplicateVersion(artifact.version_id()));
                }
                if !self.is_recognized(artifact.schema_version()) {
                    return Err(RegistryError::UnrecognizedSchema(
                        artifact.schema_version().clone(),
                    ));
                }
                artifact
                    .metrics()
                    .validate()
                    .map_err(|e| RegistryError::Validation(e.to_string()))?;

                Ok(vec![CatalogEvent::ArtifactRegistered {
                    artifact: artifact.with_status(ArtifactStatus::Staged),
                    occurred_at: *occurred_at,
                }])
            }

            CatalogCommand::Validate {
                version_id,
                occurred_at,
            } => {
                let artifact = self.require(*version_id)?;
                if artifact.status() != ArtifactStatus::Staged {
                    return Err(RegistryError::InvalidTransition {
                        version_id: *version_id,
                        from: artifact.status(),
                        to: ArtifactStatus::Validated,
                    });
                }
                Ok(vec![CatalogEvent::ArtifactValidated {
                    version_id: *version_id,
                    occurred_at: *occurred_at,
                }])
            }

            CatalogCommand::Promote {
                version_id,
                occurred_at,
            } => {
                let artifact = self.require(*version_id)?;
                if artifact.status() != ArtifactStatus::Validated {
                    return Err(RegistryError::InvalidTransition {
                        version_id: *version_id,
                        from: artifact.status(),
                        to: ArtifactStatus::Active,
                    });
                }
                let horizon = artifact.horizon();
                Ok(vec![CatalogEvent::ArtifactPromoted {
                    version_id: *version_id,
                    horizon,
                    retired: self.active.get(&horizon).copied(),
                    occurred_at: *occurred_at,
                }])
            }

            CatalogCommand::Rollback {
                horizon,
                occurred_at,
            } => {
                let restored = self
                    .rollback_candidates(*horizon)
                    .last()
                    .copied()
                    .ok_or(RegistryError::NoPriorVersion(*horizon))?;
                Ok(vec![CatalogEvent::RolledBack {
                    horizon: *horizon,
                    restored,
                    retired: self.active.get(horizon).copied(),
                    occurred_at: *occurred_at,
                }])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use gridcast_core::aggregate::execute;
    use gridcast_core::{ArtifactMetrics, TimeRange};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 1, 12, 0, 0).unwrap()
    }

    fn schema() -> SchemaVersion {
        SchemaVersion::new("fs-0000000000000001")
    }

    fn artifact(horizon: Horizon) -> ModelArtifact {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        ModelArtifact::staged(
            VersionId::new(),
            horizon,
            schema(),
            TimeRange::new(start, now()).unwrap(),
            ArtifactMetrics {
                mae: 10.0,
                rmse: 12.0,
                mape: 0.02,
                peak_load_error: 30.0,
            },
            now(),
        )
    }

    fn run(c: &mut ModelCatalog, cmd: CatalogCommand) -> Result<Vec<CatalogEvent>, RegistryError> {
        execute(c, &cmd)
    }

    fn register_validated(c: &mut ModelCatalog, horizon: Horizon) -> VersionId {
        let a = artifact(horizon);
        let id = a.version_id();
        run(c, CatalogCommand::Register { artifact: a, occurred_at: now() }).unwrap();
        run(c, CatalogCommand::Validate { version_id: id, occurred_at: now() }).unwrap();
        id
    }

    fn promote(c: &mut ModelCatalog, id: VersionId) -> Result<Vec<CatalogEvent>, RegistryError> {
        run(c, CatalogCommand::Promote { version_id: id, occurred_at: now() })
    }

    #[test]
    fn promote_requires_validated() {
        let mut c = ModelCatalog::new([schema()]);
        let a = artifact(Horizon::HOUR_1);
        let id = a.version_id();
        run(&mut c, CatalogCommand::Register { artifact: a, occurred_at: now() }).unwrap();

        let err = promote(&mut c, id).unwrap_err();
        assert_eq!(
            err,
            RegistryError::InvalidTransition {
                version_id: id,
                from: ArtifactStatus::Staged,
                to: ArtifactStatus::Active
            }
        );
        assert_eq!(c.version(), 1);
    }

    #[test]
    fn promotion_retires_previous_active_in_one_event() {
        let mut c = ModelCatalog::new([schema()]);
        let v1 = register_validated(&mut c, Horizon::HOUR_1);
        let v2 = register_validated(&mut c, Horizon::HOUR_1);

        promote(&mut c, v1).unwrap();
        let events = promote(&mut c, v2).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].activation(), Some((Horizon::HOUR_1, v2, Some(v1))));

        assert_eq!(c.active(Horizon::HOUR_1).unwrap().version_id(), v2);
        assert_eq!(c.get(v1).unwrap().status(), ArtifactStatus::Retired);
        assert_eq!(c.rollback_candidates(Horizon::HOUR_1), &[v1]);
    }

    #[test]
    fn rolled_away_artifact_is_not_a_candidate() {
        let mut c = ModelCatalog::new([schema()]);
        let v1 = register_validated(&mut c, Horizon::HOUR_1);
        let v2 = register_validated(&mut c, Horizon::HOUR_1);
        promote(&mut c, v1).unwrap();
        promote(&mut c, v2).unwrap();

        run(&mut c, CatalogCommand::Rollback { horizon: Horizon::HOUR_1, occurred_at: now() }).unwrap();
        assert_eq!(c.active(Horizon::HOUR_1).unwrap().version_id(), v1);
        assert_eq!(c.get(v2).unwrap().status(), ArtifactStatus::Retired);
        assert!(c.rollback_candidates(Horizon::HOUR_1).is_empty());

        let err = run(&mut c, CatalogCommand::Rollback { horizon: Horizon::HOUR_1, occurred_at: now() })
            .unwrap_err();
        assert_eq!(err, RegistryError::NoPriorVersion(Horizon::HOUR_1));
    }

    #[test]
    fn horizons_are_independent() {
        let mut c = ModelCatalog::new([schema()]);
        let h1 = register_validated(&mut c, Horizon::HOUR_1);
        let d1 = register_validated(&mut c, Horizon::DAY_1);
        promote(&mut c, h1).unwrap();
        let events = promote(&mut c, d1).unwrap();
        assert_eq!(events[0].activation(), Some((Horizon::DAY_1, d1, None)));
        assert_eq!(c.active_all().len(), 2);
    }

    #[test]
    fn register_guards() {
        let mut c = ModelCatalog::new([schema()]);
        let a = artifact(Horizon::HOUR_1);
        run(&mut c, CatalogCommand::Register { artifact: a.clone(), occurred_at: now() }).unwrap();

        let dup = run(&mut c, CatalogCommand::Register { artifact: a.clone(), occurred_at: now() });
        assert_eq!(dup.unwrap_err(), RegistryError::DuplicateVersion(a.version_id()));

        let foreign = ModelArtifact::staged(
            VersionId::new(),
            Horizon::HOUR_1,
            SchemaVersion::new("fs-ffffffffffffffff"),
            a.trained_window(),
            *a.metrics(),
            now(),
        );
        let err = run(&mut c, CatalogCommand::Register { artifact: foreign, occurred_at: now() });
        assert!(matches!(err, Err(RegistryError::UnrecognizedSchema(_))));
    }

    #[test]
    fn recognizing_a_known_schema_is_a_no_op() {
        let mut c = ModelCatalog::new([schema()]);
        let events = run(
            &mut c,
            CatalogCommand::RecognizeSchema { schema_version: schema(), occurred_at: now() },
        )
        .unwrap();
        assert!(events.is_empty());
        assert_eq!(c.version(), 0);
    }

    #[test]
    fn events_round_trip_through_json() {
        let ev = CatalogEvent::ArtifactRegistered {
            artifact: artifact(Horizon::DAY_1),
            occurred_at: now(),
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["type"], "artifact_registered");
        let back: CatalogEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, ev);
    }
}
