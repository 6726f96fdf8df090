//! TUI application state.

use crate::config::Config;
use crate::model::{EndpointDescriptor, PipeHandle};
use crate::roothub::RootHubs;
use crate::sink::CollectedRecord;

/// View mode for the TUI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewMode {
    /// Records in arrival order.
    #[default]
    Records,
    /// Registry contents of every root hub.
    Endpoints,
}

/// One registry entry, tagged with its root hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointRow {
    pub root_hub: u8,
    pub endpoint: EndpointDescriptor,
}

/// TUI application state.
pub struct App {
    /// Analyzed records in arrival order.
    pub records: Vec<CollectedRecord>,
    /// Registry snapshot taken after the replay.
    pub endpoints: Vec<EndpointRow>,
    /// Configuration.
    pub config: Config,
    /// Current view mode.
    pub view_mode: ViewMode,
    /// Currently selected item index.
    pub selected: usize,
    /// Show help overlay.
    pub show_help: bool,
    /// Scroll offset for the detail pane.
    pub detail_scroll: u16,
}

impl App {
    pub fn new(records: Vec<CollectedRecord>, hubs: &RootHubs, config: Config) -> Self {
        let endpoints = hubs
            .iter()
            .flat_map(|(root_hub, registry)| {
                registry
                    .snapshot()
                    .into_iter()
                    .map(move |endpoint| EndpointRow { root_hub, endpoint })
            })
            .collect();

        Self {
            records,
            endpoints,
            config,
            view_mode: ViewMode::Records,
            selected: 0,
            show_help: false,
            detail_scroll: 0,
        }
    }

    /// Number of rows in the current view.
    pub fn item_count(&self) -> usize {
        match self.view_mode {
            ViewMode::Records => self.records.len(),
            ViewMode::Endpoints => self.endpoints.len(),
        }
    }

    /// Move selection up/down.
    pub fn move_selection(&mut self, delta: i32) {
        let len = self.item_count();
        if len == 0 {
            return;
        }

        self.selected = if delta < 0 {
            self.selected.saturating_sub(delta.unsigned_abs() as usize)
        } else {
            (self.selected + delta as usize).min(len - 1)
        };
        self.detail_scroll = 0;
    }

    /// Jump to top.
    pub fn goto_top(&mut self) {
        self.selected = 0;
        self.detail_scroll = 0;
    }

    /// Jump to bottom.
    pub fn goto_bottom(&mut self) {
        self.selected = self.item_count().saturating_sub(1);
        self.detail_scroll = 0;
    }

    /// Switch between records and endpoints.
    pub fn toggle_view_mode(&mut self) {
        self.view_mode = match self.view_mode {
            ViewMode::Records => ViewMode::Endpoints,
            ViewMode::Endpoints => ViewMode::Records,
        };
        self.selected = 0;
        self.detail_scroll = 0;
    }

    pub fn scroll_details_up(&mut self) {
        self.detail_scroll = self.detail_scroll.saturating_sub(5);
    }

    pub fn scroll_details_down(&mut self) {
        self.detail_scroll = self.detail_scroll.saturating_add(5);
    }

    pub fn selected_record(&self) -> Option<&CollectedRecord> {
        match self.view_mode {
            ViewMode::Records => self.records.get(self.selected),
            ViewMode::Endpoints => None,
        }
    }

    pub fn selected_endpoint(&self) -> Option<&EndpointRow> {
        match self.view_mode {
            ViewMode::Endpoints => self.endpoints.get(self.selected),
            ViewMode::Records => None,
        }
    }

    /// Configured label for a pipe.
    pub fn pipe_label(&self, pipe: PipeHandle) -> Option<&str> {
        self.config.pipe_label(pipe)
    }

    /// Records that went through `pipe` on `root_hub`.
    pub fn records_for(&self, root_hub: u8, pipe: PipeHandle) -> usize {
        self.records
            .iter()
            .filter(|c| c.root_hub == root_hub && c.record.pipe == Some(pipe))
            .count()
    }

    /// Title line counts.
    pub fn summary_str(&self) -> String {
        let resolved = self
            .records
            .iter()
            .filter(|c| c.record.endpoint.is_some())
            .count();
        format!(
            "{} records, {} resolved, {} endpoints",
            self.records.len(),
            resolved,
            self.endpoints.len()
        )
    }
}
