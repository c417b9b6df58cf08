use crate::math::Point;
use std::fmt;
use std::sync::Arc;

/// A collection of reconstructed vertices addressed by key.
pub trait VertexLookup: Send + Sync {
    fn position(&self, key: u16) -> Option<Point>;
}

impl VertexLookup for Vec<Point> {
    fn position(&self, key: u16) -> Option<Point> {
        self.get(usize::from(key)).copied()
    }
}

/// Handle to one vertex of a shared collection.
#[derive(Clone)]
pub struct VertexRef {
    source: Arc<dyn VertexLookup>,
    key: u16,
}

impl VertexRef {
    pub fn new(source: Arc<dyn VertexLookup>, key: u16) -> Self {
        Self { source, key }
    }

    pub fn key(&self) -> u16 {
        self.key
    }

    pub fn source(&self) -> &Arc<dyn VertexLookup> {
        &self.source
    }

    /// Resolves the vertex; `None` if the key is dangling.
    pub fn position(&self) -> Option<Point> {
        self.source.position(self.key)
    }
}

impl fmt::Debug for VertexRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VertexRef").field("key", &self.key).finish()
    }
}
