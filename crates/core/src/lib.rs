//! `routegrid-core`: canonical entity model shared by every pipeline stage.
//!
//! Pure data crate: types, normalization helpers and stable hashing.
//! No IO, no collaborators.

pub mod block;
pub mod contact;
pub mod entity;
pub mod evidence;
pub mod hashing;
pub mod intro;
pub mod matching;
pub mod normalize;
pub mod validation;

pub use block::{BlockCode, BlockReason, Stage};
pub use contact::{CachedDecisionMaker, CachedEmail, EmailStatus};
pub use entity::{
    CanonicalEntity, CompanyInfo, Contacts, EntityConfidence, EntityType, PersonInfo, SourceInfo,
};
pub use evidence::{Evidence, EvidenceType};
pub use hashing::entity_id;
pub use intro::{IntroDraft, IntroSource};
pub use matching::{MatchResult, MatchType};
pub use validation::{FailureCode, ValidationFailure};
