use std::collections::{HashMap, HashSet};
use std::fmt;

use super::entry::ResourceId;

/// Semantic category of change, optionally narrowed to one entity.
///
/// A kind-only tag (`Draft`) covers every entry filed under that kind; an id
/// tag (`Draft:123`) covers only entries filed under that exact tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag {
    kind: String,
    id: Option<String>,
}

impl Tag {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: None,
        }
    }

    pub fn with_id(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: Some(id.into()),
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.id {
            Some(id) => write!(f, "{}:{}", self.kind, id),
            None => f.write_str(&self.kind),
        }
    }
}

/// Many-to-many join between tags and the cache entries filed under them.
#[derive(Debug, Default)]
pub struct TagIndex {
    // kind -> (optional id -> entries)
    providers: HashMap<String, HashMap<Option<String>, HashSet<ResourceId>>>,
}

impl TagIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_provider(&mut self, tag: &Tag, id: ResourceId) {
        self.providers
            .entry(tag.kind.clone())
            .or_default()
            .entry(tag.id.clone())
            .or_default()
            .insert(id);
    }

    /// Remove and return every entry filed under `tag`.
    pub fn invalidate_tag(&mut self, tag: &Tag) -> HashSet<ResourceId> {
        match &tag.id {
            None => self
                .providers
                .remove(&tag.kind)
                .map(|by_id| by_id.into_values().flatten().collect())
                .unwrap_or_default(),
            Some(_) => {
                let Some(by_id) = self.providers.get_mut(&tag.kind) else {
                    return HashSet::new();
                };
                let ids = by_id.remove(&tag.id).unwrap_or_default();
                if by_id.is_empty() {
                    self.providers.remove(&tag.kind);
                }
                ids
            }
        }
    }

    /// Tags the entry is currently filed under.
    pub fn tags_for(&self, id: &ResourceId) -> Vec<Tag> {
        let mut tags: Vec<Tag> = self
            .providers
            .iter()
            .flat_map(|(kind, by_id)| {
                by_id
                    .iter()
                    .filter(|(_, ids)| ids.contains(id))
                    .map(move |(tag_id, _)| Tag {
                        kind: kind.clone(),
                        id: tag_id.clone(),
                    })
            })
            .collect();
        tags.sort();
        tags
    }

    /// Forget an evicted entry under every tag.
    pub fn remove_entry(&mut self, id: &ResourceId) {
        self.providers.retain(|_, by_id| {
            by_id.retain(|_, ids| {
                ids.remove(id);
                !ids.is_empty()
            });
            !by_id.is_empty()
        });
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn clear(&mut self) {
        self.providers.clear();
    }
}
