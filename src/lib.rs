pub mod config;
pub mod errors;
pub mod summary;
pub mod telemetry;

pub use summary::models::{Document, SummaryProgress, SummaryRequest, SummaryResult, SummaryStatus};
pub use summary::runner::{JobRunner, Submission};
pub use summary::store::{InMemoryStore, SummaryStore};
pub use summary::summarizer::Summarizer;
