//! Presentation layout model.
//!
//! Pane sizes for the explorer, editor, preview and terminal. Percent splits
//! stay within [30, 70] and the file tree width within [200, 500] pixels no
//! matter how far the pointer is dragged.

use serde::{Deserialize, Serialize};

pub const MIN_SPLIT_PERCENT: f64 = 30.0;
pub const MAX_SPLIT_PERCENT: f64 = 70.0;
pub const MIN_FILE_TREE_PX: u32 = 200;
pub const MAX_FILE_TREE_PX: u32 = 500;

pub fn clamp_percent(percent: f64) -> f64 {
    if percent.is_nan() {
        return MIN_SPLIT_PERCENT;
    }
    percent.clamp(MIN_SPLIT_PERCENT, MAX_SPLIT_PERCENT)
}

pub fn clamp_file_tree_width(px: i64) -> u32 {
    px.clamp(MIN_FILE_TREE_PX as i64, MAX_FILE_TREE_PX as i64) as u32
}

/// Prefix `http://` unless the URL already carries a scheme.
pub fn format_preview_url(url: &str) -> String {
    if url.is_empty() || url.starts_with("http") {
        url.to_string()
    } else {
        format!("http://{}", url)
    }
}

/// Two panes sharing one axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitPane {
    primary: f64,
}

impl SplitPane {
    pub fn new(primary: f64) -> Self {
        Self {
            primary: clamp_percent(primary),
        }
    }

    /// Share of the first pane, in percent.
    pub fn primary(&self) -> f64 {
        self.primary
    }

    pub fn secondary(&self) -> f64 {
        100.0 - self.primary
    }

    pub fn set(&mut self, percent: f64) {
        self.primary = clamp_percent(percent);
    }

    /// Apply a pointer drag of `delta_px` starting from `start` percent.
    pub fn drag(&mut self, start: f64, delta_px: f64, container_px: f64) {
        if container_px <= 0.0 {
            return;
        }
        self.set(start + delta_px / container_px * 100.0);
    }
}

/// Layout of the generator workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    /// Editor | preview widths
    pub editor: SplitPane,
    /// Preview | terminal heights
    pub preview: SplitPane,
    pub file_tree_width: u32,
    pub file_tree_visible: bool,
    pub full_screen: bool,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            editor: SplitPane::new(50.0),
            preview: SplitPane::new(60.0),
            file_tree_width: 256,
            file_tree_visible: true,
            full_screen: false,
        }
    }
}

impl Layout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resize_file_tree(&mut self, start_px: u32, delta_px: i64) {
        self.file_tree_width = clamp_file_tree_width(start_px as i64 + delta_px);
    }

    pub fn toggle_file_tree(&mut self) -> bool {
        self.file_tree_visible = !self.file_tree_visible;
        self.file_tree_visible
    }

    pub fn toggle_full_screen(&mut self) -> bool {
        self.full_screen = !self.full_screen;
        self.full_screen
    }
}
