//! Per-phase timing for resolver diagnostics.
//!
//! The profiler accumulates wall-clock time and call counts per phase and
//! dumps them on demand. It is bookkeeping only; nothing in the resolution
//! algorithm depends on it.

use std::time::{Duration, Instant};

/// A timed phase of resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    ParameterChecks,
    CacheLookups,
    ModuleLoads,
    ProviderInvocations,
    ResolutionPasses,
}

impl Phase {
    const ALL: [Phase; 5] = [
        Phase::ParameterChecks,
        Phase::CacheLookups,
        Phase::ModuleLoads,
        Phase::ProviderInvocations,
        Phase::ResolutionPasses,
    ];

    fn label(&self) -> &'static str {
        match self {
            Phase::ParameterChecks => "parameter checks",
            Phase::CacheLookups => "cache lookups",
            Phase::ModuleLoads => "module loads",
            Phase::ProviderInvocations => "provider invocations",
            Phase::ResolutionPasses => "resolution passes",
        }
    }

    fn index(&self) -> usize {
        match self {
            Phase::ParameterChecks => 0,
            Phase::CacheLookups => 1,
            Phase::ModuleLoads => 2,
            Phase::ProviderInvocations => 3,
            Phase::ResolutionPasses => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct PhaseTotal {
    elapsed: Duration,
    count: u64,
}

/// Accumulated per-phase timings for one session.
#[derive(Debug, Default)]
pub struct Profiler {
    totals: [PhaseTotal; 5],
}

impl Profiler {
    pub fn new() -> Self {
        Profiler::default()
    }

    /// Record one occurrence of a phase.
    pub fn record(&mut self, phase: Phase, elapsed: Duration) {
        let total = &mut self.totals[phase.index()];
        total.elapsed += elapsed;
        total.count += 1;
    }

    /// Time a closure and attribute it to a phase.
    pub fn time<T>(&mut self, phase: Phase, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let out = f();
        self.record(phase, start.elapsed());
        out
    }

    /// Total time recorded for a phase.
    pub fn elapsed(&self, phase: Phase) -> Duration {
        self.totals[phase.index()].elapsed
    }

    /// Number of occurrences recorded for a phase.
    pub fn count(&self, phase: Phase) -> u64 {
        self.totals[phase.index()].count
    }

    /// Render the timings as indented text, one line per phase.
    pub fn report(&self, indent: usize) -> String {
        let pad = " ".repeat(indent);
        let mut out = String::new();
        for phase in Phase::ALL {
            let total = self.totals[phase.index()];
            out.push_str(&format!(
                "{}{}: {:.3}ms over {} call(s)\n",
                pad,
                phase.label(),
                total.elapsed.as_secs_f64() * 1000.0,
                total.count,
            ));
        }
        out
    }

    /// Dump the timings through `tracing`.
    pub fn print_profiling_info(&self, indent: usize) {
        for line in self.report(indent).lines() {
            tracing::info!("{}", line);
        }
    }
}
