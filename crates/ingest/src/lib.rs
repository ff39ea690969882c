//! `routegrid-ingest`: turns arbitrary provider JSON into canonical entities.
//!
//! itemize → discover → draft mapping → entity mapping. Everything here is
//! synchronous and CPU-bound; no collaborators are called.

pub mod discover;
pub mod draft;
pub mod itemize;
pub mod mapper;
pub mod path;
pub mod scorers;

pub use discover::{discover, CandidatePath, DiscoveryOptions, DiscoveryReport};
pub use draft::{draft_mapping, CanonicalField, MappingSpec, MappingTransforms};
pub use itemize::{itemize, ItemizationMethod, ItemizeMeta, RawEnvelope};
pub use mapper::{map_items, MapOutput, MapStats, MapperContext};
pub use scorers::FieldCategory;
