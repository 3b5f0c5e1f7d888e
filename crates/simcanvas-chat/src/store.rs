//! Chat/streaming state for the active simulation.

use simcanvas_core::observe::{Listeners, SubscriptionId};
use simcanvas_core::types::Message;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatState {
    pub simulation_id: Option<String>,
    pub messages: Vec<Message>,
    pub loading: bool,
    /// Completion percentage, 0..=100.
    pub progress: u8,
    pub error: Option<String>,
}

/// Any subset of the resettable fields, applied as one transition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatUpdate {
    pub messages: Option<Vec<Message>>,
    pub loading: Option<bool>,
    pub progress: Option<u8>,
    /// `Some(None)` clears the error.
    pub error: Option<Option<String>>,
}

impl ChatUpdate {
    pub fn is_empty(&self) -> bool {
        self.messages.is_none()
            && self.loading.is_none()
            && self.progress.is_none()
            && self.error.is_none()
    }
}

/// Plain state container. Every method is one transition and notifies once.
#[derive(Debug, Default)]
pub struct ChatStore {
    state: ChatState,
    listeners: Listeners<ChatState>,
}

impl ChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ChatState {
        &self.state
    }

    pub fn simulation_id(&self) -> Option<&str> {
        self.state.simulation_id.as_deref()
    }

    pub fn messages(&self) -> &[Message] {
        &self.state.messages
    }

    pub fn loading(&self) -> bool {
        self.state.loading
    }

    pub fn progress(&self) -> u8 {
        self.state.progress
    }

    pub fn error(&self) -> Option<&str> {
        self.state.error.as_deref()
    }

    pub fn set_simulation_id(&mut self, id: Option<String>) {
        self.state.simulation_id = id;
        self.emit();
    }

    pub fn set_messages(&mut self, messages: Vec<Message>) {
        self.state.messages = messages;
        self.emit();
    }

    pub fn add_message(&mut self, message: Message) {
        self.state.messages.push(message);
        self.emit();
    }

    pub fn set_loading(&mut self, loading: bool) {
        self.state.loading = loading;
        self.emit();
    }

    pub fn set_progress(&mut self, progress: u8) {
        self.state.progress = progress.min(100);
        self.emit();
    }

    pub fn set_error(&mut self, error: Option<String>) {
        self.state.error = error;
        self.emit();
    }

    /// Clear messages, loading, progress, and error. The simulation id is kept.
    pub fn reset(&mut self) {
        self.state.messages.clear();
        self.state.loading = false;
        self.state.progress = 0;
        self.state.error = None;
        self.emit();
    }

    /// Apply several fields at once. An empty update is not a transition.
    pub fn batch_update(&mut self, update: ChatUpdate) {
        if update.is_empty() {
            return;
        }
        if let Some(messages) = update.messages {
            self.state.messages = messages;
        }
        if let Some(loading) = update.loading {
            self.state.loading = loading;
        }
        if let Some(progress) = update.progress {
            self.state.progress = progress.min(100);
        }
        if let Some(error) = update.error {
            self.state.error = error;
        }
        self.emit();
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&ChatState) + Send + 'static) -> SubscriptionId {
        self.listeners.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.listeners.unsubscribe(id)
    }

    fn emit(&mut self) {
        self.listeners.notify(&self.state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counted(store: &mut ChatStore) -> Arc<AtomicUsize> {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        store.subscribe(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });
        hits
    }

    fn populated() -> ChatStore {
        let mut store = ChatStore::new();
        store.set_simulation_id(Some("sim-1".into()));
        store.add_message(Message::user("hi"));
        store.set_loading(true);
        store.set_progress(30);
        store.set_error(Some("boom".into()));
        store
    }

    #[test]
    fn test_add_message_appends() {
        let mut store = ChatStore::new();
        store.add_message(Message::user("one"));
        store.add_message(Message::user("two"));
        let contents: Vec<&str> = store.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "two"]);
    }

    #[test]
    fn test_reset_keeps_simulation_id() {
        let mut store = populated();
        let hits = counted(&mut store);

        store.reset();

        assert_eq!(
            store.state(),
            &ChatState {
                simulation_id: Some("sim-1".into()),
                messages: vec![],
                loading: false,
                progress: 0,
                error: None,
            }
        );
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_batch_update_progress_only() {
        let mut store = populated();
        let before = store.state().clone();

        store.batch_update(ChatUpdate {
            progress: Some(42),
            ..Default::default()
        });

        let after = store.state();
        assert_eq!(after.progress, 42);
        assert_eq!(after.simulation_id, before.simulation_id);
        assert_eq!(after.messages, before.messages);
        assert_eq!(after.loading, before.loading);
        assert_eq!(after.error, before.error);
    }

    #[test]
    fn test_batch_update_is_single_transition() {
        let mut store = populated();
        let hits = counted(&mut store);

        store.batch_update(ChatUpdate {
            messages: Some(vec![]),
            loading: Some(false),
            progress: Some(100),
            error: Some(None),
        });
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(store.error(), None);

        store.batch_update(ChatUpdate::default());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_progress_capped() {
        let mut store = ChatStore::new();
        store.set_progress(250);
        assert_eq!(store.progress(), 100);
    }
}
