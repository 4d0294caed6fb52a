//! # SyncEngine
//!
//! The [`SyncEngine`] owns every piece of mutable mindmap state and is the only thing presentation
//! code talks to. It pulls records through a [`RecordSource`], hands them to the
//! [`GraphBuilder`], and keeps the [`ExpansionStore`] and [`SearchHighlighter`] consistent with
//! the graph it exposes.
//!
//! ## Rebuild discipline
//!
//! Every state change that alters the record sets ends in a rebuild:
//!
//! 1. The builder produces a fresh [`NodeGraph`] from the primary and fetched record sets.
//! 2. The search pass (after a filtered load) or the one-time default-expand pass runs.
//! 3. The version counter is bumped and the graph `Arc` is swapped in.
//! 4. A [`MindmapEvent::GraphRebuilt`] is sent, if a listener is attached.
//!
//! Steps 1 to 3 happen under a single write lock, so readers either see the previous graph or the
//! new one. Locks are never held across an `.await`: source calls run unlocked and their results
//! are applied afterwards, with the last completed operation winning.
//!
//! ## Lifecycle
//!
//! [`BuildStatus::Idle`] until the first rebuild, [`BuildStatus::Loading`] while a load or a
//! descendant fetch is waiting on the source, [`BuildStatus::Built`] once a graph is available.
//!
//! ## Partial scopes
//!
//! A node whose parent is not among the loaded records is a root *for this view*. A field widget
//! that shows a one-to-many slice of a larger tree therefore renders its top-level items as roots
//! even though they have parents in the source.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;

use crate::{
    config::MindmapConfig,
    debounce::Debouncer,
    error::MindmapError,
    event::MindmapEvent,
    expansion::ExpansionStore,
    fetch::DescendantFetcher,
    graph::{GraphBuilder, NodeGraph, VisibleRow},
    properties::{Record, RecordId},
    query::{CardField, Filter, RecordSource},
    search::{expand_path_to_root, SearchHighlighter},
};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildStatus {
    /// Nothing has been built yet.
    #[default]
    Idle,
    /// Waiting on the record source.
    Loading,
    /// A graph is available for presentation.
    Built,
}

/// Parameters of a primary load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadParams {
    /// [`Filter::Any`] loads everything (up to the configured limit) and leaves search mode.
    pub filter: Filter,
    /// Overrides [`MindmapConfig::limit`] for unfiltered loads.
    pub limit: Option<usize>,
}

impl Default for LoadParams {
    fn default() -> Self {
        LoadParams {
            filter: Filter::Any,
            limit: None,
        }
    }
}

impl LoadParams {
    pub fn filtered(filter: Filter) -> Self {
        LoadParams {
            filter,
            limit: None,
        }
    }
}

#[derive(Debug, Default)]
struct EngineState {
    primary: Vec<Record>,
    extra: Vec<Record>,
    graph: Arc<NodeGraph>,
    expansion: ExpansionStore,
    search: SearchHighlighter,
    initial_load: bool,
    version: u64,
    status: BuildStatus,
}

impl EngineState {
    fn new() -> Self {
        EngineState {
            initial_load: true,
            ..Default::default()
        }
    }

    fn has_built(&self) -> bool {
        self.version > 0
    }
}

pub struct SyncEngine<S: RecordSource> {
    source: S,
    config: RwLock<MindmapConfig>,
    state: RwLock<EngineState>,
    fetcher: DescendantFetcher,
    extra_data: Mutex<BTreeMap<RecordId, Vec<CardField>>>,
    events: Option<UnboundedSender<MindmapEvent>>,
    search_debouncer: Debouncer<()>,
    hover_debouncer: Debouncer<RecordId>,
}

impl<S: RecordSource> SyncEngine<S> {
    pub fn new(source: S, config: MindmapConfig) -> Result<Self, MindmapError> {
        config.validate()?;
        tracing::info!(
            "Creating mindmap engine for '{}' (parent field '{}', default depth {})",
            config.model,
            config.parent_field,
            config.default_depth
        );
        Ok(SyncEngine {
            source,
            search_debouncer: Debouncer::new(config.search_debounce()),
            hover_debouncer: Debouncer::new(config.hover_debounce()),
            config: RwLock::new(config),
            state: RwLock::new(EngineState::new()),
            fetcher: DescendantFetcher::new(),
            extra_data: Mutex::new(BTreeMap::new()),
            events: None,
        })
    }

    /// Send [`MindmapEvent`]s to `tx` after each state change.
    pub fn with_events(mut self, tx: UnboundedSender<MindmapEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn config(&self) -> MindmapConfig {
        self.config.read().clone()
    }

    /// The last completed graph. Holding the snapshot never blocks a rebuild.
    pub fn graph(&self) -> Arc<NodeGraph> {
        self.state.read().graph.clone()
    }

    pub fn version(&self) -> u64 {
        self.state.read().version
    }

    pub fn status(&self) -> BuildStatus {
        self.state.read().status
    }

    pub fn is_fetching(&self) -> bool {
        self.fetcher.is_fetching()
    }

    pub fn primary_records(&self) -> Vec<Record> {
        self.state.read().primary.clone()
    }

    pub fn extra_records(&self) -> Vec<Record> {
        self.state.read().extra.clone()
    }

    fn emit(&self, event: MindmapEvent) {
        let Some(tx) = self.events.as_ref() else {
            return;
        };
        if let Err(e) = tx.send(event) {
            let err: MindmapError = e.into();
            tracing::warn!("Dropping mindmap event, listener is gone: {err}");
        }
    }

    /// Rebuild the graph from the current record sets and publish it.
    ///
    /// `search_matches` is the matched id set of a filtered load that just completed. Without it,
    /// an active search re-applies its stored matches; otherwise the one-time default-expand pass
    /// runs if it has not run yet.
    fn rebuild(
        &self,
        state: &mut EngineState,
        search_matches: Option<&BTreeSet<RecordId>>,
    ) -> MindmapEvent {
        let config = self.config.read();
        let graph = GraphBuilder::from_config(&config).build(
            &state.primary,
            &state.extra,
            &mut state.expansion,
        );
        if let Some(matched) = search_matches {
            state.search.apply_filter(&graph, &mut state.expansion, matched);
        } else if state.search.is_active() {
            state.search.reapply(&graph, &mut state.expansion);
        } else if state.initial_load {
            state.expansion.apply_default_depth(&graph, config.default_depth);
            state.initial_load = false;
        }
        state.version += 1;
        state.status = BuildStatus::Built;
        let event = MindmapEvent::GraphRebuilt {
            version: state.version,
            nodes: graph.len(),
            roots: graph.roots().len(),
        };
        state.graph = Arc::new(graph);
        tracing::debug!("Published graph version {}", state.version);
        event
    }

    fn begin_loading(&self) -> BuildStatus {
        let mut state = self.state.write();
        let previous = state.status;
        state.status = BuildStatus::Loading;
        previous
    }

    /// Primary load.
    ///
    /// A non-empty filter is first widened to its ancestor-inclusive id set so every match stays
    /// reachable. If that resolution fails, search mode is left and the load proceeds unfiltered.
    /// Failure of the primary query itself is returned and leaves the current graph in place.
    #[tracing::instrument(skip(self))]
    pub async fn load(&self, params: LoadParams) -> Result<(), MindmapError> {
        let config = self.config();
        let fields = config.load_fields();
        let previous = self.begin_loading();

        let mut matched = None;
        if !params.filter.is_empty() {
            match self
                .source
                .resolve_ancestors(&config.model, &params.filter, &config.parent_field)
                .await
            {
                Ok(resolved) => {
                    tracing::debug!(
                        "Filter matched {} records, {} with ancestors",
                        resolved.matched.len(),
                        resolved.all.len()
                    );
                    matched = Some(resolved);
                }
                Err(e) => {
                    tracing::warn!("Ancestor resolution failed, leaving search mode: {e}");
                }
            }
        }

        let records = match matched.as_ref() {
            Some(resolved) => {
                let ids: Vec<RecordId> = resolved.all.iter().copied().collect();
                self.source
                    .search_by_filter(&config.model, &Filter::IdIn(ids), &fields)
                    .await
            }
            None => {
                let limit = params.limit.unwrap_or(config.limit);
                self.source
                    .search_by_filter(&config.model, &Filter::Any, &fields)
                    .await
                    .map(|mut records| {
                        records.truncate(limit);
                        records
                    })
            }
        };
        let records = match records {
            Ok(records) => records,
            Err(e) => {
                tracing::error!("Primary load of '{}' failed: {e}", config.model);
                self.state.write().status = previous;
                return Err(e);
            }
        };

        let event = {
            let mut state = self.state.write();
            state.primary = records;
            match matched {
                Some(resolved) => self.rebuild(&mut state, Some(&resolved.matched)),
                None => {
                    state.search.deactivate();
                    self.rebuild(&mut state, None)
                }
            }
        };
        self.emit(event);
        Ok(())
    }

    /// Replace the primary record set with records the host already holds, then rebuild.
    pub fn set_primary_records(&self, records: Vec<Record>) {
        let event = {
            let mut state = self.state.write();
            state.primary = records;
            self.rebuild(&mut state, None)
        };
        self.emit(event);
    }

    /// Inject a record saved by a create or edit dialog. An existing primary copy is updated in
    /// place, otherwise the record is appended to the primary set.
    pub fn merge_saved_record(&self, record: Record) {
        let event = {
            let mut state = self.state.write();
            match state.primary.iter_mut().find(|r| r.id == record.id) {
                Some(existing) => existing.merge(&record),
                None => state.primary.push(record),
            }
            self.rebuild(&mut state, None)
        };
        self.emit(event);
    }

    /// Walk the descendants of `root_ids` into the fetched record set and rebuild.
    ///
    /// Empty `root_ids` clears the fetched set (rebuilding only if it was non-empty). Returns
    /// false when the call was dropped because another walk is in flight. Source errors are
    /// logged, and whatever was fetched before the failure is still applied.
    #[tracing::instrument(skip(self))]
    pub async fn fetch_descendants(&self, root_ids: &[RecordId]) -> bool {
        if root_ids.is_empty() {
            let event = {
                let mut state = self.state.write();
                if state.extra.is_empty() {
                    return true;
                }
                state.extra.clear();
                self.rebuild(&mut state, None)
            };
            self.emit(event);
            return true;
        }
        if self.fetcher.is_fetching() {
            tracing::debug!("Ignoring descendant fetch for {} roots", root_ids.len());
            return false;
        }

        let config = self.config();
        let previous = self.begin_loading();
        let Some(result) = self
            .fetcher
            .fetch(
                &self.source,
                &config.model,
                &config.parent_field,
                &config.descendant_fields(),
                root_ids,
            )
            .await
        else {
            self.state.write().status = previous;
            return false;
        };
        match result.error.as_ref() {
            Some(e) if e.is_source_error() => tracing::warn!(
                "Applying partial descendant set ({} records) after fetch error: {e}",
                result.records.len()
            ),
            Some(e) => tracing::error!(
                "Descendant walk stopped early ({} records kept): {e}",
                result.records.len()
            ),
            None => {}
        }

        let event = {
            let mut state = self.state.write();
            state.extra = result.records;
            self.rebuild(&mut state, None)
        };
        self.emit(event);
        true
    }

    /// Apply a new configuration. Rebuilds when a graph already exists.
    pub fn update_config(&self, config: MindmapConfig) -> Result<(), MindmapError> {
        config.validate()?;
        *self.config.write() = config;
        let event = {
            let mut state = self.state.write();
            if !state.has_built() {
                return Ok(());
            }
            self.rebuild(&mut state, None)
        };
        self.emit(event);
        Ok(())
    }

    pub fn is_expanded(&self, id: RecordId) -> bool {
        self.state.read().expansion.get(id)
    }

    pub fn expanded(&self) -> BTreeSet<RecordId> {
        self.state.read().expansion.expanded()
    }

    pub fn set_expanded(&self, id: RecordId, expanded: bool) {
        self.state.write().expansion.set(id, expanded);
        self.emit(MindmapEvent::ExpansionChanged(id, expanded));
    }

    /// Force-open `id`, e.g. after creating a child beneath it.
    pub fn expand(&self, id: RecordId) {
        self.set_expanded(id, true);
    }

    /// Open `id` and every ancestor above it in the current graph.
    pub fn reveal(&self, id: RecordId) {
        {
            let mut state = self.state.write();
            let state = &mut *state;
            expand_path_to_root(&state.graph, &mut state.expansion, id);
        }
        self.emit(MindmapEvent::ExpansionChanged(id, self.is_expanded(id)));
    }

    /// Flip `id` and return its new state.
    pub fn toggle(&self, id: RecordId) -> bool {
        let expanded = self.state.write().expansion.toggle(id);
        self.emit(MindmapEvent::ExpansionChanged(id, expanded));
        expanded
    }

    /// Pre-order rows of the tree as currently expanded.
    pub fn visible_rows(&self) -> Vec<VisibleRow> {
        let state = self.state.read();
        state.graph.visible_rows(&state.expansion)
    }

    pub fn is_searching(&self) -> bool {
        self.state.read().search.is_active()
    }

    pub fn highlights(&self) -> BTreeSet<RecordId> {
        self.state.read().search.highlights().clone()
    }

    pub fn is_highlighted(&self, id: RecordId) -> bool {
        self.state.read().search.is_highlighted(id)
    }

    /// Empty the highlight set. A no-op when it is already empty.
    pub fn clear_highlights(&self) {
        let cleared = self.state.write().search.clear_highlights();
        if cleared {
            self.emit(MindmapEvent::HighlightsCleared);
        }
    }

    /// Delete `id` at the source, then drop it locally and rebuild. Its children become roots
    /// unless something else in scope is their parent.
    ///
    /// Source failures are returned unchanged and leave local state untouched.
    #[tracing::instrument(skip(self))]
    pub async fn delete_record(&self, id: RecordId) -> Result<(), MindmapError> {
        let config = self.config();
        if !config.permissions().delete {
            tracing::warn!("Refusing to delete {id}: deletion is not permitted");
            return Err(MindmapError::PermissionDenied);
        }
        if let Err(e) = self.source.delete_by_id(&config.model, &[id]).await {
            tracing::error!("Failed to delete {id}: {e}");
            return Err(e);
        }

        self.extra_data.lock().remove(&id);
        let event = {
            let mut state = self.state.write();
            state.primary.retain(|r| r.id != id);
            state.extra.retain(|r| r.id != id);
            state.expansion.remove(id);
            self.rebuild(&mut state, None)
        };
        tracing::info!("Deleted record {id}");
        self.emit(MindmapEvent::RecordDeleted(id));
        self.emit(event);
        Ok(())
    }

    /// Cached hover data for `id`, if it has been loaded.
    pub fn extra_data(&self, id: RecordId) -> Option<Vec<CardField>> {
        self.extra_data.lock().get(&id).cloned()
    }

    /// Load hover card data for a node in the current graph, once per node.
    ///
    /// Returns `None` for ids not in the graph. A failed fetch caches an empty list, so it is not
    /// retried either.
    #[tracing::instrument(skip(self))]
    pub async fn load_node_extra_data(&self, id: RecordId) -> Option<Vec<CardField>> {
        if !self.graph().contains(id) {
            return None;
        }
        if let Some(cached) = self.extra_data(id) {
            return Some(cached);
        }
        let model = self.config.read().model.clone();
        let data = match self.source.fetch_card_data(&model, id).await {
            Ok(data) => data,
            Err(e) if e.is_source_error() => {
                tracing::warn!("Could not load card data for {id}: {e}");
                Vec::new()
            }
            Err(e) => {
                tracing::error!("Card data for {id} is unavailable: {e}");
                Vec::new()
            }
        };
        let data = self
            .extra_data
            .lock()
            .entry(id)
            .or_insert(data)
            .clone();
        self.emit(MindmapEvent::ExtraDataLoaded(id));
        Some(data)
    }
}

impl<S> SyncEngine<S>
where
    S: RecordSource + Send + 'static,
{
    /// Debounced filtered reload. Only the last call inside the search delay runs.
    pub fn search(self: &Arc<Self>, filter: Filter) {
        let engine = self.clone();
        self.search_debouncer.schedule((), async move {
            if let Err(e) = engine.load(LoadParams::filtered(filter)).await {
                tracing::error!("Search load failed: {e}");
            }
        });
    }

    /// Start the hover delay for `id`; card data loads if the pointer stays long enough.
    pub fn hover_enter(self: &Arc<Self>, id: RecordId) {
        let engine = self.clone();
        self.hover_debouncer.schedule(id, async move {
            engine.load_node_extra_data(id).await;
        });
    }

    /// Cancel a pending hover load for `id`.
    pub fn hover_leave(&self, id: RecordId) {
        self.hover_debouncer.cancel(&id);
    }
}

impl<S: RecordSource> Drop for SyncEngine<S> {
    fn drop(&mut self) {
        self.search_debouncer.cancel_all();
        self.hover_debouncer.cancel_all();
    }
}
