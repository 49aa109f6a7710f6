use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

/// Receives `(done, total)` sample counts while a pass runs.
pub trait ProgressSink {
    fn report(&mut self, done: u64, total: u64);
}

impl<F: FnMut(u64, u64)> ProgressSink for F {
    fn report(&mut self, done: u64, total: u64) {
        self(done, total)
    }
}

/// Shared flag which stops a running pass before its next sample.
#[derive(Clone, Debug, Default)]
pub struct AbortSignal(Arc<AtomicBool>);

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_sink() {
        let mut calls = Vec::new();
        {
            let mut sink = |done: u64, total: u64| calls.push((done, total));
            let sink: &mut dyn ProgressSink = &mut sink;
            sink.report(1, 2);
            sink.report(2, 2);
        }
        assert_eq!(calls, vec![(1, 2), (2, 2)]);
    }

    #[test]
    fn test_abort_signal_shared() {
        let signal = AbortSignal::new();
        let clone = signal.clone();
        assert!(!signal.is_requested());
        clone.request();
        assert!(signal.is_requested());
    }
}
