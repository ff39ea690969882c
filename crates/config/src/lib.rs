// Configuration loading

pub mod error;
pub mod policy;
pub mod settings;

pub use error::ConfigError;
pub use policy::{EvidenceRule, ModePolicies, ModePolicy, ModePolicySource, VocabularyProfile};
pub use settings::{
    CollaboratorSettings, CopySettings, DiscoverySettings, HistorySettings, MatchStrategy,
    MatchingSettings, ParitySettings, Settings,
};
