//! Attack pipeline timing
//!
//! Accumulates wall-clock time per stage of an attack run (image
//! preprocessing, forward passes, the input-gradient backward pass and the
//! convolution and GEMM kernels underneath them). Off unless `--verbose`.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{LazyLock, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Timed stages of an attack run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TraceStep {
    /// Image decode, resize and normalization
    Preprocess,
    /// Forward pass through a classifier
    Forward,
    /// Backward pass (input gradient)
    Backward,
    /// Convolution kernel
    Conv,
    /// Matrix multiplication kernel
    Matmul,
    /// Weight file parsing and batch-norm folding
    LoadWeights,
    /// JPEG encoding of the adversarial example
    Encode,
}

impl TraceStep {
    /// Kernels run inside Forward/Backward and are not added to the stage total
    fn is_kernel(self) -> bool {
        matches!(self, TraceStep::Conv | TraceStep::Matmul)
    }
}

impl fmt::Display for TraceStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Aggregate of every finished span of one step
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepStats {
    pub count: usize,
    pub total: Duration,
    pub slowest: Duration,
    /// Metadata of the slowest span
    pub slowest_detail: String,
}

impl StepStats {
    fn record(&mut self, elapsed: Duration, detail: String) {
        self.count += 1;
        self.total += elapsed;
        if elapsed >= self.slowest {
            self.slowest = elapsed;
            self.slowest_detail = detail;
        }
    }
}

#[derive(Default)]
struct TraceState {
    open: HashMap<TraceStep, Instant>,
    stats: HashMap<TraceStep, StepStats>,
}

/// Process-wide stage timer
#[derive(Default)]
pub struct Tracer {
    enabled: AtomicBool,
    state: Mutex<TraceState>,
}

impl Tracer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Relaxed);
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    fn state(&self) -> MutexGuard<'_, TraceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open a span for `step`, replacing any span of the same step still open
    pub fn start(&self, step: TraceStep) {
        if self.is_enabled() {
            self.state().open.insert(step, Instant::now());
        }
    }

    /// Close the open span for `step`; a close without an open span is ignored
    pub fn end(&self, step: TraceStep, metadata: impl Into<String>) {
        if !self.is_enabled() {
            return;
        }
        let mut state = self.state();
        if let Some(opened) = state.open.remove(&step) {
            state.stats.entry(step).or_default().record(opened.elapsed(), metadata.into());
        }
    }

    /// Time `f` as one span of `step`
    pub fn span<R>(&self, step: TraceStep, metadata: impl Into<String>, f: impl FnOnce() -> R) -> R {
        if !self.is_enabled() {
            return f();
        }
        self.start(step);
        let result = f();
        self.end(step, metadata);
        result
    }

    /// Forget all spans, open or finished
    pub fn clear(&self) {
        *self.state() = TraceState::default();
    }

    /// Statistics for one step, if any span of it finished
    pub fn stats(&self, step: TraceStep) -> Option<StepStats> {
        self.state().stats.get(&step).cloned()
    }

    /// Plain-text table of the recorded steps, slowest first
    pub fn report(&self) -> String {
        let state = self.state();
        if state.stats.is_empty() {
            return "trace: nothing recorded".to_string();
        }

        let mut rows: Vec<(&TraceStep, &StepStats)> = state.stats.iter().collect();
        rows.sort_by(|a, b| b.1.total.cmp(&a.1.total).then(a.0.cmp(b.0)));

        let stage_total: Duration =
            rows.iter().filter(|(step, _)| !step.is_kernel()).map(|(_, s)| s.total).sum();

        let mut out = format!("trace: {stage_total:.2?} across stages\n");
        out.push_str(&format!(
            "  {:<12} {:>6} {:>12} {:>7}  slowest\n",
            "step", "spans", "total", "share"
        ));
        for (step, stats) in rows {
            let share = if stage_total.is_zero() {
                0.0
            } else {
                stats.total.as_secs_f64() / stage_total.as_secs_f64() * 100.0
            };
            out.push_str(&format!(
                "  {:<12} {:>6} {:>12.2?} {:>6.1}%  {:.2?} {}\n",
                step.to_string(),
                stats.count,
                stats.total,
                share,
                stats.slowest,
                stats.slowest_detail
            ));
        }
        out
    }
}

/// Global tracer instance.
pub static TRACER: LazyLock<Tracer> = LazyLock::new(Tracer::new);
