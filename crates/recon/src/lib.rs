//! `routegrid-recon`: matching, contact completion, intros and the run
//! orchestrator.
//!
//! Collaborators (enrichment, verification, email discovery, match enhancement, copy writing)
//! are reached only through the traits in [`collaborators`]; nothing here
//! does network IO.

mod bounded;
pub mod cache;
pub mod collaborators;
pub mod contact;
pub mod deadline;
pub mod engine;
pub mod error;
pub mod events;
pub mod export;
pub mod intro;
pub mod matcher;
pub mod model;
pub mod parity;
pub mod resolve;
pub mod snapshot;

pub use cache::{CacheKey, DecisionMakerCache};
pub use collaborators::{Collaborators, Disabled};
pub use engine::{Pipeline, RunOutcome};
pub use error::{CollaboratorError, ExportError};
pub use events::{EventKind, EventLog, Metrics, RunEvent};
pub use intro::IntroCache;
pub use matcher::{match_entities, MatchOutput};
pub use model::{DatasetInput, PipelineStage, Readiness, RunRequest, StageProgress};
pub use parity::{compare, compare_snapshots, ParityReport, ParityStage, ParityView, StabilityTracker};
pub use snapshot::{PipelineRunSnapshot, SnapshotHistory};
