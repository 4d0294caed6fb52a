//! # mindmap-core
//!
//! A Rust library that turns a flat collection of parent-referencing records into a navigable,
//! partially expanded tree, and keeps that tree in sync with a remote record source.
//!
//! ## Overview
//!
//! mindmap-core is the state engine behind a mindmap view. Presentation code hands it a
//! [`query::RecordSource`] (the backing data service) and a [`config::MindmapConfig`], and reads
//! back an immutable [`graph::NodeGraph`] snapshot plus per-node expansion and highlight state.
//! Everything the view shows is derived from that state; nothing is patched in place.
//!
//! ### Key Features
//!
//! - **Cycle-safe hierarchy**: parent references that would close a cycle root the offending node
//!   instead of failing or looping
//! - **Stable identities**: nodes are keyed by record id, so expansion state survives every rebuild
//! - **Incremental loading**: breadth-first descendant fetching, capped at ten levels and guarded so
//!   only one walk runs at a time
//! - **Search path revelation**: filtered loads open the path to every match and highlight only the
//!   matches themselves
//! - **Debounced input**: search and hover requests are coalesced on tokio timers
//! - **Event streaming**: rebuild-then-notify events over a tokio channel
//!
//! ## Architecture
//!
//! Leaves first:
//!
//! - **[`properties`]**: [`properties::RecordId`], [`properties::Record`], color palette
//! - **[`query`]**: the [`query::Filter`] language and the async [`query::RecordSource`] trait
//! - **[`store`]**: [`store::RecordStore`], an in-memory record source
//! - **[`expansion`]**: [`expansion::ExpansionStore`] and the default-expand-by-depth pass
//! - **[`fetch`]**: [`fetch::DescendantFetcher`]
//! - **[`graph`]**: [`graph::GraphBuilder`] and the [`graph::NodeGraph`] it produces
//! - **[`search`]**: [`search::SearchHighlighter`]
//! - **[`engine`]**: [`engine::SyncEngine`], which orchestrates all of the above
//! - **[`event`]**: [`event::MindmapEvent`] notifications
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mindmap_core::{
//!     config::MindmapConfig,
//!     engine::{LoadParams, SyncEngine},
//!     store::RecordStore,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = RecordStore::from_json_file("project.task", "tasks.json")?;
//!     let engine = SyncEngine::new(store, MindmapConfig::for_model("project.task"))?;
//!
//!     engine.load(LoadParams::default()).await?;
//!
//!     let graph = engine.graph();
//!     for row in engine.visible_rows() {
//!         let node = graph.get(row.id).unwrap();
//!         println!("{}{}", "  ".repeat(row.depth - 1), node.name("display_name"));
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ### Field Widget Mode
//!
//! When the host only knows the first level of a hierarchy (a one-to-many field), it supplies
//! those records and lets the engine fetch the rest:
//!
//! ```rust,no_run
//! # use mindmap_core::{config::MindmapConfig, engine::SyncEngine, store::RecordStore};
//! # async fn example(engine: SyncEngine<RecordStore>, first_level: Vec<mindmap_core::properties::Record>) {
//! let ids: Vec<_> = first_level.iter().map(|r| r.id).collect();
//! engine.set_primary_records(first_level);
//! engine.fetch_descendants(&ids).await;
//! # }
//! ```
//!
//! Nodes whose parent lies outside the supplied slice are roots of that view.
//!
//! ## Features
//!
//! - **default**: the library
//! - **bin**: the `mindmap` command line tool (`clap`, `tracing-subscriber`)

pub mod config;
pub mod debounce;
pub mod engine;
pub mod error;
pub mod event;
pub mod expansion;
pub mod fetch;
pub mod graph;
pub mod properties;
pub mod query;
pub mod search;
pub mod store;
#[cfg(test)]
mod tests;

pub use error::*;
