//! Typed publish/subscribe keyed by event kind.

use std::collections::HashMap;
use std::hash::Hash;

/// An event that can be routed by its kind.
pub trait Event {
    type Kind: Copy + Eq + Hash + std::fmt::Debug;

    fn kind(&self) -> Self::Kind;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

pub type Listener<E> = Box<dyn FnMut(&E) + Send + Sync>;

struct Entry<E> {
    id: ListenerId,
    once: bool,
    listener: Listener<E>,
}

pub struct Emitter<E: Event> {
    listeners: HashMap<E::Kind, Vec<Entry<E>>>,
    next_id: u64,
}

impl<E: Event> Default for Emitter<E> {
    fn default() -> Self {
        Self {
            listeners: HashMap::new(),
            next_id: 0,
        }
    }
}

impl<E: Event> std::fmt::Debug for Emitter<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: HashMap<_, _> = self
            .listeners
            .iter()
            .map(|(kind, entries)| (*kind, entries.len()))
            .collect();
        f.debug_struct("Emitter")
            .field("listeners", &counts)
            .finish()
    }
}

impl<E: Event> Emitter<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(
        &mut self,
        kind: E::Kind,
        listener: impl FnMut(&E) + Send + Sync + 'static,
    ) -> ListenerId {
        self.insert(kind, false, Box::new(listener))
    }

    /// Like [`Emitter::on`], removed after its first call.
    pub fn once(
        &mut self,
        kind: E::Kind,
        listener: impl FnMut(&E) + Send + Sync + 'static,
    ) -> ListenerId {
        self.insert(kind, true, Box::new(listener))
    }

    pub fn off(&mut self, kind: E::Kind, id: ListenerId) -> bool {
        let Some(entries) = self.listeners.get_mut(&kind) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|entry| entry.id != id);
        before != entries.len()
    }

    pub fn dispatch(&mut self, event: &E) {
        let Some(entries) = self.listeners.get_mut(&event.kind()) else {
            return;
        };
        for entry in entries.iter_mut() {
            (entry.listener)(event);
        }
        entries.retain(|entry| !entry.once);
    }

    pub fn listener_count(&self, kind: E::Kind) -> usize {
        self.listeners.get(&kind).map_or(0, Vec::len)
    }

    fn insert(&mut self, kind: E::Kind, once: bool, listener: Listener<E>) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.entry(kind).or_default().push(Entry {
            id,
            once,
            listener,
        });
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Debug)]
    enum Ping {
        A,
        B,
    }

    impl Event for Ping {
        type Kind = u8;

        fn kind(&self) -> u8 {
            match self {
                Ping::A => 0,
                Ping::B => 1,
            }
        }
    }

    #[test]
    fn routes_by_kind_and_unsubscribes() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut emitter = Emitter::<Ping>::new();
        let id = emitter.on(0, {
            let hits = hits.clone();
            move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
            }
        });

        emitter.dispatch(&Ping::A);
        emitter.dispatch(&Ping::B);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        assert!(emitter.off(0, id));
        assert!(!emitter.off(0, id));
        emitter.dispatch(&Ping::A);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn once_listeners_fire_a_single_time() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut emitter = Emitter::<Ping>::new();
        emitter.once(1, {
            let hits = hits.clone();
            move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
            }
        });
        emitter.dispatch(&Ping::B);
        emitter.dispatch(&Ping::B);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(emitter.listener_count(1), 0);
    }
}
