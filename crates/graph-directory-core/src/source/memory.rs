//! In-memory [`PageSource`] for tests and offline demos.
//!
//! Pages a fixed record list the way the remote listing endpoint does:
//! evaluates the structured `$filter`, honours `$top` and `$select`,
//! reports `$count`, and hands out opaque continuation tokens. Tokens are
//! deterministic per (query, offset), so replaying one reproduces the same
//! page as long as the records are unchanged.
//!
//! Meant for tests and `gdir demo`. Each distinct query shape is kept in a
//! table of at most [`SHAPE_CAPACITY`] entries, least recently issued
//! first out; a token whose shape has been evicted is rejected with
//! [`TransportError::UnknownToken`], like an expired remote token.
//!
//! Failures can be injected with [`InMemorySource::set_offline`] and
//! [`InMemorySource::fail_after`].

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;

use crate::error::TransportError;
use crate::models::{ContinuationToken, Page, Record};
use crate::query::{Predicate, DEFAULT_PAGE_SIZE};

use super::{PageRequest, PageSource};

/// The query-shaping part of a request; everything except the offset.
#[derive(Debug, Clone, PartialEq, Eq)]
struct QueryShape {
    filter: Option<Predicate>,
    select: Vec<String>,
    top: usize,
    count: bool,
}

/// Distinct query shapes a source remembers at once.
pub const SHAPE_CAPACITY: usize = 256;

const TOKEN_PREFIX: &str = "memory:/users?q=";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Cursor {
    shape: u64,
    offset: usize,
}

impl Cursor {
    fn token(&self) -> ContinuationToken {
        ContinuationToken::new(format!(
            "{}{}&skip={}",
            TOKEN_PREFIX, self.shape, self.offset
        ))
    }

    fn parse(token: &str) -> Option<Self> {
        let (shape, offset) = token.strip_prefix(TOKEN_PREFIX)?.split_once("&skip=")?;
        Some(Self {
            shape: shape.parse().ok()?,
            offset: offset.parse().ok()?,
        })
    }
}

/// Query shapes keyed by a never-reused id, oldest at the front.
#[derive(Debug, Default)]
struct ShapeTable {
    next_id: u64,
    entries: VecDeque<(u64, QueryShape)>,
}

impl ShapeTable {
    /// Id for `shape`, registering it (and evicting the oldest entry when
    /// full) if it is new. A reused shape moves to the back.
    fn intern(&mut self, shape: QueryShape) -> u64 {
        if let Some(i) = self.entries.iter().position(|(_, s)| *s == shape) {
            if let Some(entry) = self.entries.remove(i) {
                let id = entry.0;
                self.entries.push_back(entry);
                return id;
            }
        }
        if self.entries.len() >= SHAPE_CAPACITY {
            self.entries.pop_front();
        }
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push_back((id, shape));
        id
    }

    fn get(&self, id: u64) -> Option<&QueryShape> {
        self.entries
            .iter()
            .find(|(entry_id, _)| *entry_id == id)
            .map(|(_, shape)| shape)
    }
}

/// In-memory directory listing.
pub struct InMemorySource {
    records: Vec<Record>,
    shapes: RwLock<ShapeTable>,
    fetches: AtomicUsize,
    fail_from: Mutex<Option<usize>>,
}

impl InMemorySource {
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            records,
            shapes: RwLock::new(ShapeTable::default()),
            fetches: AtomicUsize::new(0),
            fail_from: Mutex::new(None),
        }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Number of fetches attempted so far, failed ones included.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Make every subsequent fetch fail (or succeed again).
    pub fn set_offline(&self, offline: bool) {
        let mut fail_from = self.fail_from.lock().unwrap_or_else(|e| e.into_inner());
        *fail_from = offline.then(|| self.fetch_count());
    }

    /// Let `successes` more fetches through, then fail every one after.
    pub fn fail_after(&self, successes: usize) {
        let mut fail_from = self.fail_from.lock().unwrap_or_else(|e| e.into_inner());
        *fail_from = Some(self.fetch_count() + successes);
    }

    /// Resolve a request to its cursor and the shape it pages.
    fn resolve(&self, request: &PageRequest) -> Result<(Cursor, QueryShape), TransportError> {
        match request {
            PageRequest::Fresh(desc) => {
                let shape = QueryShape {
                    filter: desc.filter.clone(),
                    select: desc.select(),
                    top: desc.top().unwrap_or(DEFAULT_PAGE_SIZE).max(1),
                    count: desc.param("$count") == Some("true"),
                };
                let id = self
                    .shapes
                    .write()
                    .unwrap_or_else(|e| e.into_inner())
                    .intern(shape.clone());
                Ok((Cursor { shape: id, offset: 0 }, shape))
            }
            PageRequest::Replay { token, .. } => {
                let unknown = || TransportError::UnknownToken(token.to_string());
                let cursor = Cursor::parse(token.as_str()).ok_or_else(unknown)?;
                let shape = self
                    .shapes
                    .read()
                    .unwrap_or_else(|e| e.into_inner())
                    .get(cursor.shape)
                    .cloned()
                    .ok_or_else(unknown)?;
                Ok((cursor, shape))
            }
        }
    }
}

#[async_trait]
impl PageSource for InMemorySource {
    async fn fetch(&self, request: &PageRequest) -> Result<Page, TransportError> {
        let attempt = self.fetches.fetch_add(1, Ordering::SeqCst);
        let fail_from = *self.fail_from.lock().unwrap_or_else(|e| e.into_inner());
        if fail_from.is_some_and(|limit| attempt >= limit) {
            return Err(TransportError::Offline);
        }

        let (cursor, shape) = self.resolve(request)?;

        let matching: Vec<&Record> = self
            .records
            .iter()
            .filter(|r| shape.filter.as_ref().map_or(true, |p| p.matches(r)))
            .collect();

        let records = matching
            .iter()
            .skip(cursor.offset)
            .take(shape.top)
            .map(|r| {
                if shape.select.is_empty() {
                    (*r).clone()
                } else {
                    r.project(&shape.select)
                }
            })
            .collect();

        let next_offset = cursor.offset + shape.top;
        let next = (next_offset < matching.len()).then(|| {
            Cursor {
                shape: cursor.shape,
                offset: next_offset,
            }
            .token()
        });

        Ok(Page {
            records,
            next,
            total_count: shape.count.then_some(matching.len() as u64),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{FilterAttribute, QueryBuilder, QueryDefinition};

    fn people(n: usize) -> Vec<Record> {
        (0..n)
            .map(|i| Record {
                id: Some(format!("u{}", i)),
                display_name: Some(format!("Person {}", i)),
                department: Some(if i % 2 == 0 { "Even" } else { "Odd" }.to_string()),
                ..Default::default()
            })
            .collect()
    }

    #[tokio::test]
    async fn test_pages_until_exhausted() {
        let source = InMemorySource::new(people(5));
        let desc = QueryBuilder::new(2, vec!["id".into()]).build(&QueryDefinition::Unfiltered);

        let first = source.fetch(&PageRequest::Fresh(desc.clone())).await.unwrap();
        assert_eq!(first.records.len(), 2);
        assert_eq!(first.total_count, Some(5));
        assert_eq!(first.records[0].display_name, None, "projected to id");

        let mut token = first.next.unwrap();
        let mut seen = 2;
        loop {
            let page = source
                .fetch(&PageRequest::Replay {
                    token: token.clone(),
                    headers: desc.headers.clone(),
                })
                .await
                .unwrap();
            seen += page.records.len();
            match page.next {
                Some(t) => token = t,
                None => break,
            }
        }
        assert_eq!(seen, 5);
        assert_eq!(source.fetch_count(), 3);
    }

    #[tokio::test]
    async fn test_filter_and_replay_is_stable() {
        let source = InMemorySource::new(people(9));
        let def = QueryDefinition::filter([(FilterAttribute::Department, "Odd".to_string())]);
        let desc = QueryBuilder::new(3, vec!["id".into()]).build(&def);

        let first = source.fetch(&PageRequest::Fresh(desc.clone())).await.unwrap();
        assert_eq!(first.total_count, Some(4));
        let token = first.next.clone().unwrap();
        let replay = PageRequest::Replay {
            token,
            headers: Vec::new(),
        };
        let a = source.fetch(&replay).await.unwrap();
        let b = source.fetch(&replay).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.records.len(), 1);
        assert!(a.is_last());
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let source = InMemorySource::new(people(3));
        let desc = QueryBuilder::default().build(&QueryDefinition::Unfiltered);
        let request = PageRequest::Fresh(desc);

        source.fail_after(1);
        assert!(source.fetch(&request).await.is_ok());
        assert_eq!(source.fetch(&request).await, Err(TransportError::Offline));

        source.set_offline(false);
        assert!(source.fetch(&request).await.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_token() {
        let source = InMemorySource::new(people(3));
        let err = source
            .fetch(&PageRequest::Replay {
                token: ContinuationToken::new("bogus"),
                headers: Vec::new(),
            })
            .await
            .unwrap_err();
        assert_eq!(err, TransportError::UnknownToken("bogus".to_string()));
    }

    #[tokio::test]
    async fn test_shape_table_is_bounded() {
        let source = InMemorySource::new(people(20));
        let builder = QueryBuilder::new(2, vec!["id".into()]);
        let first = source
            .fetch(&PageRequest::Fresh(builder.build(&QueryDefinition::Unfiltered)))
            .await
            .unwrap();
        let stale = first.next.unwrap();

        for i in 0..SHAPE_CAPACITY {
            let def = QueryDefinition::search(&format!("p{}", i));
            source
                .fetch(&PageRequest::Fresh(builder.build(&def)))
                .await
                .unwrap();
        }
        assert_eq!(
            source.shapes.read().unwrap().entries.len(),
            SHAPE_CAPACITY
        );

        let err = source
            .fetch(&PageRequest::Replay {
                token: stale.clone(),
                headers: Vec::new(),
            })
            .await
            .unwrap_err();
        assert_eq!(err, TransportError::UnknownToken(stale.to_string()));
    }
}
