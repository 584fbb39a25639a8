use crate::index::FlatIndex;
use crate::models::{Chunk, DocumentId, DocumentMetadata, GenerationMode};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

pub const DEFAULT_SESSION_CAPACITY: usize = 32;

/// Everything needed to answer questions about one ingested document.
#[derive(Debug)]
pub struct DocumentSession {
    pub id: DocumentId,
    pub index: FlatIndex,
    pub chunks: Vec<Chunk>,
    pub pages: Vec<String>,
    pub mode: GenerationMode,
    pub metadata: DocumentMetadata,
}

#[derive(Debug)]
struct Entry {
    session: Arc<DocumentSession>,
    last_used: AtomicU64,
}

/// Shared map of live sessions, evicting the least recently used one when full.
#[derive(Debug)]
pub struct SessionStore {
    entries: RwLock<HashMap<DocumentId, Entry>>,
    clock: AtomicU64,
    capacity: Option<usize>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_capacity(Some(DEFAULT_SESSION_CAPACITY))
    }
}

impl SessionStore {
    /// `None` keeps every session for the life of the process.
    pub fn with_capacity(capacity: Option<usize>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock: AtomicU64::new(0),
            capacity: capacity.map(|capacity| capacity.max(1)),
        }
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    /// Publishes a fully built session, returning the shared handle.
    pub fn insert(&self, session: DocumentSession) -> Arc<DocumentSession> {
        let session = Arc::new(session);
        let entry = Entry {
            session: Arc::clone(&session),
            last_used: AtomicU64::new(self.tick()),
        };

        let mut entries = self.entries.write();
        entries.insert(session.id, entry);

        if let Some(capacity) = self.capacity {
            while entries.len() > capacity {
                let oldest = entries
                    .iter()
                    .filter(|(id, _)| **id != session.id)
                    .min_by_key(|(_, entry)| entry.last_used.load(Ordering::Relaxed))
                    .map(|(id, _)| *id);
                match oldest {
                    Some(id) => {
                        entries.remove(&id);
                        debug!(document_id = %id, "evicted least recently used session");
                    }
                    None => break,
                }
            }
        }

        session
    }

    pub fn get(&self, id: &DocumentId) -> Option<Arc<DocumentSession>> {
        let entries = self.entries.read();
        let entry = entries.get(id)?;
        entry.last_used.store(self.tick(), Ordering::Relaxed);
        Some(Arc::clone(&entry.session))
    }

    pub fn remove(&self, id: &DocumentId) -> Option<Arc<DocumentSession>> {
        self.entries.write().remove(id).map(|entry| entry.session)
    }

    pub fn contains(&self, id: &DocumentId) -> bool {
        self.entries.read().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
