use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The page is being hidden or torn down: navigation, close, refresh.
    PageHide,
}

/// Process-wide hub for page lifecycle signals.
#[derive(Clone)]
pub struct PageLifecycle {
    events: broadcast::Sender<LifecycleEvent>,
}

impl Default for PageLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl PageLifecycle {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(16);
        Self { events }
    }

    /// Returns how many listeners were notified.
    pub fn page_hide(&self) -> usize {
        self.events.send(LifecycleEvent::PageHide).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.events.subscribe()
    }
}
