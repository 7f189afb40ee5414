use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Identifier of a media item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaId(pub u64);

impl fmt::Display for MediaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for MediaId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(MediaId)
    }
}

impl From<u64> for MediaId {
    fn from(id: u64) -> Self {
        MediaId(id)
    }
}

/// What the catalog knows about a media item.
///
/// There is no byte size here. Range math uses the size reported by storage
/// at request time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaDescriptor {
    pub id: MediaId,
    pub title: String,
    /// Path or key understood by the [`Storage`](crate::Storage) in use.
    #[serde(rename = "locator")]
    pub storage_locator: String,
    #[serde(default)]
    pub content_type: Option<String>,
    /// Premium items are only streamed to premium or admin callers.
    #[serde(default)]
    pub premium: bool,
}

impl MediaDescriptor {
    pub fn new(id: MediaId, title: impl Into<String>, storage_locator: impl Into<String>) -> Self {
        MediaDescriptor {
            id,
            title: title.into(),
            storage_locator: storage_locator.into(),
            content_type: None,
            premium: false,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_premium(mut self, premium: bool) -> Self {
        self.premium = premium;
        self
    }
}

/// Read access to media metadata.
#[async_trait]
pub trait MediaRepository: Send + Sync {
    async fn find_by_id(&self, id: MediaId) -> Option<MediaDescriptor>;
}

#[async_trait]
impl<T: MediaRepository + ?Sized> MediaRepository for Arc<T> {
    async fn find_by_id(&self, id: MediaId) -> Option<MediaDescriptor> {
        (**self).find_by_id(id).await
    }
}

/// A [`MediaRepository`] held in memory.
#[derive(Debug, Default)]
pub struct InMemoryMediaRepository {
    items: RwLock<HashMap<MediaId, MediaDescriptor>>,
}

impl InMemoryMediaRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the descriptor with the same id, returning the
    /// previous one.
    pub fn insert(&self, descriptor: MediaDescriptor) -> Option<MediaDescriptor> {
        self.items.write().insert(descriptor.id, descriptor)
    }

    pub fn remove(&self, id: MediaId) -> Option<MediaDescriptor> {
        self.items.write().remove(&id)
    }

    pub fn get(&self, id: MediaId) -> Option<MediaDescriptor> {
        self.items.read().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }
}

impl FromIterator<MediaDescriptor> for InMemoryMediaRepository {
    fn from_iter<I: IntoIterator<Item = MediaDescriptor>>(iter: I) -> Self {
        let items = iter.into_iter().map(|descriptor| (descriptor.id, descriptor)).collect();
        InMemoryMediaRepository { items: RwLock::new(items) }
    }
}

#[async_trait]
impl MediaRepository for InMemoryMediaRepository {
    async fn find_by_id(&self, id: MediaId) -> Option<MediaDescriptor> {
        self.get(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_find_by_id() {
        let repository = InMemoryMediaRepository::new();
        repository.insert(MediaDescriptor::new(MediaId(1), "Intro", "intro.mp3"));

        let found = repository.find_by_id(MediaId(1)).await.unwrap();
        assert_eq!("intro.mp3", found.storage_locator);
        assert!(repository.find_by_id(MediaId(2)).await.is_none());
    }

    #[tokio::test]
    async fn test_insert_replaces_and_remove() {
        let repository: InMemoryMediaRepository =
            [MediaDescriptor::new(MediaId(7), "Old", "old.mp3")].into_iter().collect();

        let previous = repository.insert(MediaDescriptor::new(MediaId(7), "New", "new.mp3"));
        assert_eq!(Some("Old".to_string()), previous.map(|d| d.title));
        assert_eq!(1, repository.len());

        repository.remove(MediaId(7));
        assert!(repository.is_empty());
    }

    #[tokio::test]
    async fn test_shared_repository() {
        let repository = Arc::new(InMemoryMediaRepository::new());
        repository.insert(MediaDescriptor::new(MediaId(3), "Shared", "shared.ogg").with_premium(true));

        let found = MediaRepository::find_by_id(&repository, MediaId(3)).await.unwrap();
        assert!(found.premium);
    }

    #[test]
    fn test_media_id_parsing() {
        assert_eq!(Ok(MediaId(42)), "42".parse());
        assert!("-1".parse::<MediaId>().is_err());
        assert_eq!("42", MediaId(42).to_string());
    }
}
