//! Dual-Tier Decaying Memory
//!
//! Two tiers share one record shape:
//! - Long-term: every utterance, cooling over about a month
//! - Short-term: recently recalled long-term records, cooling over minutes
//!
//! # Lifecycle
//!
//! 1. Utterances are ingested into long-term memory (re-ingestion reinforces)
//! 2. Each turn recalls long-term records and promotes them to short-term
//! 3. The prompt is built from short-term recall, oldest first
//! 4. The cleanup scheduler forgets records whose heat has decayed away

mod prompt;
mod scheduler;
mod system;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use prompt::{format_memory_lines, render_prompt, DEFAULT_PERSONA};
pub use scheduler::{
    next_daily_run, CleanupScheduler, JobStatus, SchedulerStatus, Trigger, LONG_TERM_JOB,
    SHORT_TERM_JOB,
};
pub use system::{
    softmax_weights, truncate_with_ellipsis, Ingested, MemorySystem, RetrievalOptions, TurnContext,
};
