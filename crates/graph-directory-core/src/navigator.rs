//! Cursor navigation over a forward-only paged listing.
//!
//! The remote service only hands out "next" tokens. The [`Navigator`]
//! makes backward navigation possible by remembering, for every page it
//! has advanced past, the token that led to the following page:
//!
//! ```text
//!   page 1 ──history[1]──▶ page 2 ──history[2]──▶ page 3
//!     ▲                      ▲
//!     │ replay descriptor    │ replay history[1]
//!     └──── previous() ──────┴──── previous() from page 3
//! ```
//!
//! # States
//!
//! | State | Meaning |
//! |-------|---------|
//! | `Idle` | No query has been issued yet |
//! | `Loading` | A fetch is in flight |
//! | `Ready` | A page is displayed |
//! | `Error` | No page has loaded yet and the last reset failed |
//!
//! Every transition commits only after a successful fetch. A failed
//! `next()`, `previous()` or `reset()` leaves the displayed session exactly
//! as it was; only a navigator that has never shown a page lands in
//! `Error`.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{InvalidNavigation, TransportError};
use crate::models::{ContinuationToken, Page, Record};
use crate::query::{QueryBuilder, QueryDefinition, RequestDescriptor};
use crate::source::{PageRequest, PageSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NavState {
    Idle,
    Loading,
    Ready,
    Error,
}

/// Outcome of a navigation call that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    /// A new page is displayed.
    Moved,
    /// The precondition did not hold; nothing was fetched.
    Ignored(InvalidNavigation),
}

/// Pagination affordances for the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageInfo {
    pub index: usize,
    pub has_next: bool,
    pub has_previous: bool,
    pub total_count: Option<u64>,
    pub loading: bool,
}

/// One browsing sequence under a fixed query definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    definition: QueryDefinition,
    descriptor: RequestDescriptor,
    index: usize,
    records: Vec<Record>,
    next: Option<ContinuationToken>,
    total_count: Option<u64>,
    /// `history[n - 1]` is page `n`'s own next token.
    history: Vec<ContinuationToken>,
}

impl Session {
    fn new(definition: QueryDefinition, descriptor: RequestDescriptor) -> Self {
        Self {
            definition,
            descriptor,
            index: 1,
            records: Vec::new(),
            next: None,
            total_count: None,
            history: Vec::new(),
        }
    }

    pub fn definition(&self) -> &QueryDefinition {
        &self.definition
    }

    pub fn descriptor(&self) -> &RequestDescriptor {
        &self.descriptor
    }

    /// 1-based index of the displayed page.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn next_token(&self) -> Option<&ContinuationToken> {
        self.next.as_ref()
    }

    pub fn total_count(&self) -> Option<u64> {
        self.total_count
    }

    /// Remembered tokens, `history()[n - 1]` being page `n`'s next token.
    pub fn history(&self) -> &[ContinuationToken] {
        &self.history
    }

    fn show(&mut self, index: usize, page: Page) {
        self.index = index;
        self.records = page.records;
        self.next = page.next;
        if page.total_count.is_some() {
            self.total_count = page.total_count;
        }
    }

    /// Remember page `index`'s next token. Re-advancing past a page
    /// overwrites its slot with the token just seen.
    fn remember(&mut self, index: usize, token: ContinuationToken) {
        let slot = index - 1;
        if slot < self.history.len() {
            self.history[slot] = token;
        } else {
            self.history.push(token);
        }
    }

    /// The request that reproduces page `target`.
    fn replay_for(&self, target: usize) -> Option<PageRequest> {
        if target == 1 {
            return Some(PageRequest::Fresh(self.descriptor.clone()));
        }
        self.history.get(target - 2).map(|token| PageRequest::Replay {
            token: token.clone(),
            headers: self.descriptor.headers.clone(),
        })
    }
}

/// Drives a [`Session`] against a [`PageSource`].
///
/// All navigation takes `&mut self`, so one owner can never have two
/// fetches in flight for the same session.
pub struct Navigator<S> {
    source: S,
    builder: QueryBuilder,
    session: Session,
    state: NavState,
    /// Set once any page has been displayed.
    loaded: bool,
    last_error: Option<TransportError>,
}

impl<S: PageSource> Navigator<S> {
    pub fn new(source: S, builder: QueryBuilder) -> Self {
        let definition = QueryDefinition::Unfiltered;
        let descriptor = builder.build(&definition);
        Self {
            source,
            builder,
            session: Session::new(definition, descriptor),
            state: NavState::Idle,
            loaded: false,
            last_error: None,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn builder(&self) -> &QueryBuilder {
        &self.builder
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn state(&self) -> NavState {
        self.state
    }

    /// The most recent fetch failure, cleared by the next success.
    pub fn last_error(&self) -> Option<&TransportError> {
        self.last_error.as_ref()
    }

    pub fn page_info(&self) -> PageInfo {
        let ready = self.state == NavState::Ready;
        PageInfo {
            index: self.session.index,
            has_next: ready && self.session.next.is_some(),
            has_previous: ready && self.session.index > 1,
            total_count: self.session.total_count,
            loading: self.state == NavState::Loading,
        }
    }

    /// Start a new session for `definition` and load its first page.
    ///
    /// The new session (index 1, empty history) replaces the current one
    /// only once page 1 has arrived. On failure the previous page stays
    /// displayed and the navigator returns to `Ready`, or to `Error` when
    /// nothing was ever loaded.
    pub async fn reset(&mut self, definition: QueryDefinition) -> Result<(), TransportError> {
        let descriptor = self.builder.build(&definition);
        info!(query = ?definition, "starting new directory session");
        let mut session = Session::new(definition, descriptor.clone());
        self.state = NavState::Loading;

        match self.load(PageRequest::Fresh(descriptor), 1).await {
            Ok(page) => {
                session.show(1, page);
                self.session = session;
                self.state = NavState::Ready;
                self.loaded = true;
                self.last_error = None;
                Ok(())
            }
            Err(e) => {
                warn!(
                    page = self.session.index,
                    "failed to load first page of new query: {}", e
                );
                self.state = self.resting_state();
                self.last_error = Some(e.clone());
                Err(e)
            }
        }
    }

    /// Advance to the following page.
    pub async fn next(&mut self) -> Result<Navigation, TransportError> {
        self.settle();
        if self.state != NavState::Ready {
            return Ok(Navigation::Ignored(InvalidNavigation::NotReady));
        }
        let Some(token) = self.session.next.clone() else {
            return Ok(Navigation::Ignored(InvalidNavigation::NoNextPage));
        };

        let current = self.session.index;
        let request = PageRequest::Replay {
            token: token.clone(),
            headers: self.session.descriptor.headers.clone(),
        };
        self.navigate(request, current + 1, Some(token)).await
    }

    /// Go back one page by replaying the token that produced it.
    pub async fn previous(&mut self) -> Result<Navigation, TransportError> {
        self.settle();
        if self.state != NavState::Ready {
            return Ok(Navigation::Ignored(InvalidNavigation::NotReady));
        }
        if self.session.index <= 1 {
            return Ok(Navigation::Ignored(InvalidNavigation::AtFirstPage));
        }

        let target = self.session.index - 1;
        let Some(request) = self.session.replay_for(target) else {
            // Every page past the first was reached through a successful
            // next(), which recorded the token that led to it.
            return Ok(Navigation::Ignored(InvalidNavigation::NotReady));
        };
        self.navigate(request, target, None).await
    }

    /// Fetch `target` and commit it. `advanced_with` is the token being
    /// followed forward; it enters the history only once the page arrives.
    async fn navigate(
        &mut self,
        request: PageRequest,
        target: usize,
        advanced_with: Option<ContinuationToken>,
    ) -> Result<Navigation, TransportError> {
        self.state = NavState::Loading;
        let result = self.load(request, target).await;
        self.state = NavState::Ready;

        match result {
            Ok(page) => {
                if let Some(token) = advanced_with {
                    let current = self.session.index;
                    self.session.remember(current, token);
                }
                self.session.show(target, page);
                self.last_error = None;
                Ok(Navigation::Moved)
            }
            Err(e) => {
                warn!(
                    page = self.session.index,
                    target_page = target,
                    "navigation failed, staying on current page: {}",
                    e
                );
                self.last_error = Some(e.clone());
                Err(e)
            }
        }
    }

    async fn load(&self, request: PageRequest, target: usize) -> Result<Page, TransportError> {
        debug!(page = target, request = %request.describe(), "fetching page");
        self.source.fetch(&request).await
    }

    /// State to fall back to when a fetch does not complete.
    fn resting_state(&self) -> NavState {
        if self.loaded {
            NavState::Ready
        } else {
            NavState::Error
        }
    }

    /// Recover from a navigation future that was dropped mid-flight.
    fn settle(&mut self) {
        if self.state == NavState::Loading {
            debug!("previous fetch was abandoned before completing");
            self.state = self.resting_state();
        }
    }
}
