//! Summary service: iterative document summarization jobs.
//!
//! ## Overview
//!
//! A client submits an ordered list of markdown documents. The service
//! returns a request id at once and builds the summary in the background:
//! the first document is summarized on its own, then each later document is
//! folded into the running summary. Progress is stored after every step so
//! the client can poll it.
//!
//! ## Module Map
//!
//! ```text
//! ┌──────────┐   HTTP   ┌──────────────────────────────────────────────────┐
//! │  Client  │ ───────> │  server.rs  (axum Router, graceful shutdown)     │
//! │          │ <─────── │    └─ api.rs  (route handlers, AppState)         │
//! └──────────┘          │         │                                        │
//!                       │         │ JobRunner::submit()                    │
//!                       │         v                                        │
//!                       │  runner.rs  (one tokio task per job)             │
//!                       │         │                                        │
//!                       │         │ SummaryOrchestrator::process()         │
//!                       │         v                                        │
//!                       │  orchestrator.rs ──> summarizer.rs (Summarizer)  │
//!                       │         │                                        │
//!                       │         v                                        │
//!                       │  store.rs / db.rs  (SummaryStore)                │
//!                       └──────────────────────────────────────────────────┘
//! ```
//!
//! ## Supporting Modules
//!
//! | Module       | Responsibility                                          |
//! |--------------|---------------------------------------------------------|
//! | `models`     | `Document`, `SummaryProgress`, `SummaryResult`, status  |
//! | `store`      | `SummaryStore` trait + process-local `InMemoryStore`    |
//! | `db`         | `SqliteStore`, the durable `SummaryStore`               |
//! | `summarizer` | `Summarizer` trait + `AnthropicSummarizer`              |
//!
//! ## Job Lifecycle
//!
//! 1. `POST /summaries` → `JobRunner::submit()` writes a `Pending` snapshot
//!    and spawns the job.
//! 2. The orchestrator writes `InProgress`, then one snapshot per document.
//! 3. On success the snapshot becomes `Completed` and the result is stored.
//! 4. On any failure progress is reset to index 0, status `Failed`, and a
//!    `Failed` result carries the error message.
//! 5. At startup `recap serve` calls `JobRunner::recover_interrupted()` to
//!    settle jobs a previous process left without a result.

pub mod api;
pub mod db;
pub mod models;
pub mod orchestrator;
pub mod runner;
pub mod server;
pub mod store;
pub mod summarizer;
