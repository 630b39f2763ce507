use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative stop flag for a virtual consumer, shared between the poll
/// loop and whichever thread supervises it.
///
/// Two channels feed it: an explicit stop request, which latches, and an
/// external interrupt raised through an [`InterruptHandle`]. Observing the
/// interrupt clears it, so a lone interrupt is reported exactly once --
/// matching how a polling loop is expected to notice an interrupt, act on
/// it, and move on.
#[derive(Debug, Default)]
pub struct StopSignal {
    requested: AtomicBool,
    interrupt: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.requested.store(true, Ordering::Release);
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire) || self.interrupt.swap(false, Ordering::AcqRel)
    }

    pub fn interrupt_handle(&self) -> InterruptHandle {
        InterruptHandle(Arc::clone(&self.interrupt))
    }
}

/// Cloneable handle for interrupting a poll loop from another thread.
#[derive(Debug, Clone)]
pub struct InterruptHandle(Arc<AtomicBool>);

impl InterruptHandle {
    pub fn interrupt(&self) {
        self.0.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_latches() {
        let signal = StopSignal::new();
        assert!(!signal.is_requested());

        signal.request();
        assert!(signal.is_requested());
        assert!(signal.is_requested());
    }

    #[test]
    fn test_interrupt_observed_once() {
        let signal = StopSignal::new();
        let handle = signal.interrupt_handle();

        handle.interrupt();
        assert!(signal.is_requested());
        // Observation cleared the interrupt; no stop was requested.
        assert!(!signal.is_requested());
    }

    #[test]
    fn test_interrupt_does_not_mask_request() {
        let signal = StopSignal::new();
        let handle = signal.interrupt_handle();

        signal.request();
        handle.interrupt();
        assert!(signal.is_requested());
        assert!(signal.is_requested());
    }

    #[test]
    fn test_visible_across_threads() {
        let signal = Arc::new(StopSignal::new());
        let other = Arc::clone(&signal);

        std::thread::spawn(move || other.request())
            .join()
            .unwrap();

        assert!(signal.is_requested());
    }
}
