//! `gridcast-registry`: the Model Registry.
//!
//! The catalog of model artifacts is an event-sourced aggregate
//! ([`ModelCatalog`]). Every state change is a [`CatalogEvent`] appended to a
//! [`RegistryJournal`]; [`ModelRegistry`] replays the journal on open and
//! serves reads from an atomically swapped snapshot, so `get_active` never
//! waits on a promotion in flight.

pub mod catalog;
pub mod error;
pub mod journal;
pub mod notify;
pub mod policy;
pub mod registry;

pub use catalog::{CatalogCommand, CatalogEvent, ModelCatalog};
pub use error::{RegistryError, RegistryResult};
pub use journal::{InMemoryRegistryJournal, JournalEntry, JournalError, RegistryJournal, UncommittedEntry};
pub use notify::{ActivationSink, ArtifactCheck};
pub use policy::ValidationPolicy;
pub use registry::ModelRegistry;
