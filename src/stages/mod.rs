//! The two pipeline stages.
//!
//! Each stage takes an already validated request, creates its workspace,
//! records a run manifest in it and runs its steps strictly in sequence. The
//! workspace is left in place whatever the outcome.

pub mod cef;
pub mod windows;
