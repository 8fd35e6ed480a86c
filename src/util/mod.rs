//! Shared utilities: interning, diagnostics, profiling, cancellation.

pub mod cancel;
pub mod diagnostic;
pub mod interning;
pub mod profile;

pub use cancel::CancelToken;
pub use interning::Symbol;
pub use profile::{Phase, Profiler};
