pub mod limiter;
pub mod payload;
pub mod pipeline;

// Re-exports
pub use limiter::RateLimiter;
pub use payload::{EditorSnapshot, SuggestionPayload};
pub use pipeline::{SuggestConfig, SuggestionFetcher, SuggestionPipeline};
