//! Date plan scoring: an LLM oracle grades each submitted plan, the grades are
//! folded into a composite, and every stored plan is re-ranked against the
//! full population on each submission.

pub mod config;
pub mod error;
pub mod oracle;
pub mod plans;
pub mod scoring;
pub mod store;
pub mod telemetry;
