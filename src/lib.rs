// Progressive multi-provider lodging search: fan-out, event stream and client-side merge

pub mod config;
pub mod consumer;
pub mod events;
pub mod http;
pub mod offer;
pub mod orchestrator;
pub mod provider;
pub mod query;
pub mod simulator;

// Re-export key types for convenience
pub use config::{ConfigError, ServiceConfig, SimulatorConfig};
pub use consumer::{
    ConsumerError, FrameParser, IncrementalMerger, MergeParseError, SearchClient, SearchObserver,
    SearchView, StreamConsumer, StreamOutcome,
};
pub use events::{search_events, SearchEvent};
pub use offer::{AggregateResult, DedupKey, Offer};
pub use orchestrator::{Chunk, SearchError, SearchOrchestrator};
pub use provider::{HotelsProvider, ProviderError, RetryConfig};
pub use query::{SearchQuery, ValidationError};
pub use simulator::HotelsSimulatorProvider;
