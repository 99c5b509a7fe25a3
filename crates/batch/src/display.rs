//! What the dropzone should show, resolved once per render.

use crate::coordinator::UploadSnapshot;

/// Inputs of a dropzone render.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DropzoneView {
    /// Externally forced loading state.
    pub is_loading: bool,
    /// Progress shown with the external loading state.
    pub loading_progress: Option<u8>,
    pub is_uploading: bool,
    pub upload_progress: u8,
    pub is_drag_active: bool,
    /// URL of the file currently held by the field.
    pub value: Option<String>,
}

impl DropzoneView {
    /// Builds a view from coordinator and drag state.
    pub fn new(snapshot: UploadSnapshot, drag: &DragState, value: Option<String>) -> Self {
        Self {
            is_loading: false,
            loading_progress: None,
            is_uploading: snapshot.is_uploading,
            upload_progress: snapshot.aggregate_progress,
            is_drag_active: drag.is_active(),
            value,
        }
    }

    /// Forces the loading state, optionally with its own progress.
    pub fn with_loading(mut self, progress: Option<u8>) -> Self {
        self.is_loading = true;
        self.loading_progress = progress;
        self
    }
}

/// Display mode of the dropzone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayMode {
    /// Upload prompt.
    Empty,
    /// Preview of the held file with a replace banner.
    HasValue(String),
    /// Drop target highlight.
    Dragging,
    /// Spinner, with a percentage when one is known.
    Uploading { progress: Option<u8> },
}

impl DisplayMode {
    /// Resolves the mode. Uploading wins over dragging, which wins over a
    /// held value.
    pub fn resolve(view: &DropzoneView) -> Self {
        if view.is_uploading {
            return DisplayMode::Uploading {
                progress: Some(view.upload_progress),
            };
        }
        if view.is_loading {
            return DisplayMode::Uploading {
                progress: view.loading_progress,
            };
        }
        if view.is_drag_active {
            return DisplayMode::Dragging;
        }
        match &view.value {
            Some(url) if !url.is_empty() => DisplayMode::HasValue(url.clone()),
            _ => DisplayMode::Empty,
        }
    }

    /// Whether clicking the zone itself opens the file picker.
    ///
    /// With a held value only the replace banner opens it.
    pub fn opens_picker_on_click(&self) -> bool {
        matches!(self, DisplayMode::Empty | DisplayMode::Dragging)
    }
}

/// Tracks drag-over state across nested enter/leave events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DragState {
    depth: u32,
}

impl DragState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&mut self) {
        self.depth = self.depth.saturating_add(1);
    }

    pub fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Files were dropped; the drag is over regardless of depth.
    pub fn drop_files(&mut self) {
        self.depth = 0;
    }

    pub fn is_active(&self) -> bool {
        self.depth > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view() -> DropzoneView {
        DropzoneView::default()
    }

    #[test]
    fn empty_by_default() {
        let mode = DisplayMode::resolve(&view());
        assert_eq!(mode, DisplayMode::Empty);
        assert!(mode.opens_picker_on_click());
    }

    #[test]
    fn empty_value_is_empty() {
        let v = DropzoneView {
            value: Some(String::new()),
            ..view()
        };
        assert_eq!(DisplayMode::resolve(&v), DisplayMode::Empty);
    }

    #[test]
    fn value_shows_preview_without_click() {
        let v = DropzoneView {
            value: Some("https://cdn/logo.png".into()),
            ..view()
        };
        let mode = DisplayMode::resolve(&v);
        assert_eq!(mode, DisplayMode::HasValue("https://cdn/logo.png".into()));
        assert!(!mode.opens_picker_on_click());
    }

    #[test]
    fn dragging_wins_over_value() {
        let v = DropzoneView {
            is_drag_active: true,
            value: Some("https://cdn/logo.png".into()),
            ..view()
        };
        assert_eq!(DisplayMode::resolve(&v), DisplayMode::Dragging);
    }

    #[test]
    fn uploading_wins_over_everything() {
        let v = DropzoneView {
            is_uploading: true,
            upload_progress: 42,
            is_loading: true,
            loading_progress: Some(7),
            is_drag_active: true,
            value: Some("https://cdn/logo.png".into()),
        };
        let mode = DisplayMode::resolve(&v);
        assert_eq!(mode, DisplayMode::Uploading { progress: Some(42) });
        assert!(!mode.opens_picker_on_click());
    }

    #[test]
    fn external_loading_uses_its_own_progress() {
        let v = view().with_loading(None);
        assert_eq!(
            DisplayMode::resolve(&v),
            DisplayMode::Uploading { progress: None }
        );
        let v = view().with_loading(Some(80));
        assert_eq!(
            DisplayMode::resolve(&v),
            DisplayMode::Uploading { progress: Some(80) }
        );
    }

    #[test]
    fn view_from_snapshot() {
        let mut drag = DragState::new();
        drag.enter();
        let v = DropzoneView::new(
            UploadSnapshot {
                is_uploading: false,
                aggregate_progress: 0,
            },
            &drag,
            None,
        );
        assert_eq!(DisplayMode::resolve(&v), DisplayMode::Dragging);
    }

    #[test]
    fn drag_depth_tracks_nested_elements() {
        let mut drag = DragState::new();
        drag.enter();
        drag.enter();
        drag.leave();
        assert!(drag.is_active());
        drag.leave();
        assert!(!drag.is_active());
        drag.leave();
        assert!(!drag.is_active());
    }

    #[test]
    fn drop_resets_drag() {
        let mut drag = DragState::new();
        drag.enter();
        drag.enter();
        drag.drop_files();
        assert!(!drag.is_active());
    }
}
