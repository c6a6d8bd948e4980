//! # Graph Directory
//!
//! Browse a Microsoft Graph user directory page by page: name search,
//! attribute filters with facet values, and previous/next navigation over
//! a service that only hands out "next" links.
//!
//! The engine lives in [`graph_directory_core`]; this crate adds the Graph
//! REST client, configuration, the `gdir` CLI and an HTTP surface.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────────────────────────┐   ┌─────────────┐
//! │ CLI / HTTP │──▶│ Directory                    │──▶│ PageSource  │
//! │ (gdir)     │   │ Navigator + Facets + Builder │   │ Graph / Mem │
//! └────────────┘   └──────────────────────────────┘   └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! export GRAPH_ACCESS_TOKEN=...       # pre-issued bearer token
//! gdir page --search "ada"            # first page of a name search
//! gdir page --filter department=Sales --page 2
//! gdir facets                         # distinct filter values
//! gdir serve                          # JSON API on 127.0.0.1:7341
//! gdir demo --page 3                  # offline, generated directory
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`graph`] | Graph REST page source |
//! | [`browse`] | `page` and `facets` commands |
//! | [`demo`] | Generated in-memory directory |
//! | [`server`] | Directory HTTP server |

pub mod browse;
pub mod config;
pub mod demo;
pub mod graph;
pub mod server;
