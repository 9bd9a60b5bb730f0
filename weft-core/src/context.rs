//! Per-connection, per-request extension storage.
//!
//! `rama-core`'s `Extensions` is a layered, diff-tracking typemap built for
//! a middleware stack; weft only needs the connection-scoped slice of that
//! idea (route handlers stash things like the matched path params, the peer
//! address, TLS info), so this is a plain `TypeId`-keyed map rather than the
//! full layered store.
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;

/// A type-keyed bag of values attached to a connection or request.
#[derive(Default)]
pub struct Extensions {
    map: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Extensions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<T: Send + Sync + 'static>(&mut self, value: T) -> Option<T> {
        self.map
            .insert(TypeId::of::<T>(), Box::new(value))
            .and_then(|prev| prev.downcast::<T>().ok())
            .map(|b| *b)
    }

    pub fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.map
            .get(&TypeId::of::<T>())
            .and_then(|v| v.downcast_ref::<T>())
    }

    pub fn get_mut<T: Send + Sync + 'static>(&mut self) -> Option<&mut T> {
        self.map
            .get_mut(&TypeId::of::<T>())
            .and_then(|v| v.downcast_mut::<T>())
    }

    pub fn remove<T: Send + Sync + 'static>(&mut self) -> Option<T> {
        self.map
            .remove(&TypeId::of::<T>())
            .and_then(|prev| prev.downcast::<T>().ok())
            .map(|b| *b)
    }

    pub fn contains<T: Send + Sync + 'static>(&self) -> bool {
        self.map.contains_key(&TypeId::of::<T>())
    }
}

impl fmt::Debug for Extensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extensions")
            .field("len", &self.map.len())
            .finish()
    }
}

/// Identifies a single accepted connection across its lifetime, used as the
/// `connection_id` field on the `tracing` spans wrapping every suspension
/// point (spec §5's concurrency model note).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_get_remove_roundtrip() {
        let mut ext = Extensions::new();
        assert!(ext.get::<u32>().is_none());
        ext.insert(7u32);
        assert_eq!(ext.get::<u32>(), Some(&7));
        assert_eq!(ext.remove::<u32>(), Some(7));
        assert!(ext.get::<u32>().is_none());
    }

    #[test]
    fn distinguishes_types() {
        let mut ext = Extensions::new();
        ext.insert(1u32);
        ext.insert("hello".to_string());
        assert_eq!(ext.get::<u32>(), Some(&1));
        assert_eq!(ext.get::<String>().map(String::as_str), Some("hello"));
    }
}
