/// The loaded document set.
///
/// A `Snapshot` is immutable. `Corpus` holds the current one behind a lock and a
/// reload swaps in a new `Arc`, so readers always see either the old set or the new
/// set, never a mix.
use std::str::FromStr;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::error::AppError;
use crate::model::{Document, RepoRef};
use crate::tags::{self, Category};

#[derive(Debug, Default)]
pub struct Snapshot {
    /// `None` until the first successful load.
    pub repo: Option<RepoRef>,
    pub documents: Vec<Document>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFilter {
    All,
    Category(Category),
}

impl FromStr for DocumentFilter {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("all") {
            return Ok(DocumentFilter::All);
        }
        s.parse().map(DocumentFilter::Category)
    }
}

impl std::fmt::Display for DocumentFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentFilter::All => f.write_str("all"),
            DocumentFilter::Category(c) => write!(f, "{c}"),
        }
    }
}

impl Snapshot {
    pub fn new(repo: RepoRef, documents: Vec<Document>) -> Self {
        Self {
            repo: Some(repo),
            documents,
        }
    }

    /// Document names in listing order; the order cross-references are applied in.
    pub fn names(&self) -> Vec<&str> {
        self.documents.iter().map(|d| d.name.as_str()).collect()
    }

    /// Exact, case-sensitive lookup by file name.
    pub fn find(&self, name: &str) -> Result<&Document, AppError> {
        self.documents
            .iter()
            .find(|d| d.name == name)
            .ok_or_else(|| AppError::NotFound(name.to_string()))
    }

    pub fn filter(&self, filter: DocumentFilter) -> Vec<&Document> {
        self.documents
            .iter()
            .filter(|d| match filter {
                DocumentFilter::All => true,
                DocumentFilter::Category(c) => tags::classify(&d.content).contains(&c),
            })
            .collect()
    }
}

#[derive(Default)]
pub struct Corpus {
    current: RwLock<Arc<Snapshot>>,
}

impl Corpus {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&*self.current.read().await)
    }

    /// Install `next` and return the snapshot it replaced.
    pub async fn replace(&self, next: Snapshot) -> Arc<Snapshot> {
        let mut current = self.current.write().await;
        std::mem::replace(&mut *current, Arc::new(next))
    }
}
