use std::fmt;

use parking_lot::RwLock;

use crate::types::{Message, SidelineRequestId};

/// One predicate in a filter chain. A true verdict drops the message.
pub trait FilterStep: Send + Sync {
    fn filter(&self, message: &Message) -> bool;
}

impl<F> FilterStep for F
where
    F: Fn(&Message) -> bool + Send + Sync,
{
    fn filter(&self, message: &Message) -> bool {
        self(message)
    }
}

/// Ordered list of filter steps, each keyed by the sideline request that
/// installed it. The first step returning true wins and the rest are not
/// consulted. Steps are immutable once installed; the chain itself may be
/// mutated by the supervisor between polls, so access is lock-guarded.
#[derive(Default)]
pub struct FilterChain {
    steps: RwLock<Vec<(SidelineRequestId, Box<dyn FilterStep>)>>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_step(&self, id: SidelineRequestId, step: Box<dyn FilterStep>) {
        self.steps.write().push((id, step));
    }

    pub fn remove_step(&self, id: &SidelineRequestId) -> Option<Box<dyn FilterStep>> {
        let mut steps = self.steps.write();
        let index = steps.iter().position(|(step_id, _)| step_id == id)?;
        Some(steps.remove(index).1)
    }

    pub fn has_step(&self, id: &SidelineRequestId) -> bool {
        self.steps.read().iter().any(|(step_id, _)| step_id == id)
    }

    /// True iff any step wants the message dropped.
    pub fn filter(&self, message: &Message) -> bool {
        self.steps.read().iter().any(|(_, step)| step.filter(message))
    }

    pub fn step_count(&self) -> usize {
        self.steps.read().len()
    }
}

impl fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterChain")
            .field("steps", &self.step_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::types::{MessageId, VirtualConsumerId};

    fn message(offset: i64) -> Message {
        let id = MessageId::new(
            "events",
            0,
            offset,
            VirtualConsumerId::new("test").unwrap(),
        );
        Message::new(id, vec![json!(offset)])
    }

    #[test]
    fn test_empty_chain_passes_everything() {
        let chain = FilterChain::new();

        assert!(!chain.filter(&message(1)));
        assert_eq!(chain.step_count(), 0);
    }

    #[test]
    fn test_first_positive_step_wins() {
        let chain = FilterChain::new();
        let later_calls = Arc::new(AtomicUsize::new(0));
        let calls = Arc::clone(&later_calls);

        chain.add_step(SidelineRequestId::new(), Box::new(|_: &Message| true));
        chain.add_step(
            SidelineRequestId::new(),
            Box::new(move |_: &Message| {
                calls.fetch_add(1, Ordering::SeqCst);
                false
            }),
        );

        assert!(chain.filter(&message(1)));
        // Short-circuit: the second step never ran.
        assert_eq!(later_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_any_step_can_drop() {
        let chain = FilterChain::new();
        chain.add_step(SidelineRequestId::new(), Box::new(|_: &Message| false));
        chain.add_step(
            SidelineRequestId::new(),
            Box::new(|message: &Message| message.id().offset() == 11),
        );

        assert!(chain.filter(&message(11)));
        assert!(!chain.filter(&message(12)));
    }

    #[test]
    fn test_add_and_remove_by_request() {
        let chain = FilterChain::new();
        let request = SidelineRequestId::new();

        chain.add_step(request, Box::new(|_: &Message| true));
        assert!(chain.has_step(&request));
        assert_eq!(chain.step_count(), 1);
        assert!(chain.filter(&message(1)));

        assert!(chain.remove_step(&request).is_some());
        assert!(!chain.has_step(&request));
        assert!(!chain.filter(&message(1)));
        assert!(chain.remove_step(&request).is_none());
    }
}
