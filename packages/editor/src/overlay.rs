//! # Overlays
//!
//! Dialogs and popups opened over the editor. The manager is owned by the
//! [`Editor`](crate::Editor) and torn down with it; after [`destroy`] every
//! call that would open something fails with [`EditorError::Destroyed`].
//!
//! Popups are anchored to node ids, never to positions, and are located in
//! the current document only when asked.
//!
//! [`destroy`]: OverlayManager::destroy

use crate::errors::EditorError;
use crate::plugins::footnotes::FootnoteDeletion;
use manuscript_model::Node;
use std::collections::BTreeMap;

/// Modal dialog awaiting confirmation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dialog {
    FootnoteDeletion(FootnoteDeletion),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PopupId(u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Popup {
    pub anchor_node_id: String,
    pub content: String,
}

#[derive(Debug, Default)]
pub struct OverlayManager {
    dialog: Option<Dialog>,
    popups: BTreeMap<PopupId, Popup>,
    next_popup: u64,
    destroyed: bool,
}

impl OverlayManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a dialog, replacing any dialog already open
    pub fn open_dialog(&mut self, dialog: Dialog) -> Result<(), EditorError> {
        self.ensure_alive()?;
        if let Some(previous) = self.dialog.replace(dialog) {
            tracing::debug!(dialog = ?previous, "Replaced open dialog");
        }
        Ok(())
    }

    pub fn dialog(&self) -> Option<&Dialog> {
        self.dialog.as_ref()
    }

    /// Close the dialog and hand it to the caller for confirmation
    pub fn take_dialog(&mut self) -> Option<Dialog> {
        self.dialog.take()
    }

    pub fn cancel_dialog(&mut self) {
        match self.dialog.take() {
            Some(Dialog::FootnoteDeletion(deletion)) => deletion.cancel(),
            None => {}
        }
    }

    pub fn show_popup(&mut self, anchor_node_id: impl Into<String>, content: impl Into<String>) -> Result<PopupId, EditorError> {
        self.ensure_alive()?;
        let id = PopupId(self.next_popup);
        self.next_popup += 1;
        self.popups.insert(
            id,
            Popup {
                anchor_node_id: anchor_node_id.into(),
                content: content.into(),
            },
        );
        Ok(id)
    }

    pub fn hide_popup(&mut self, id: PopupId) -> Option<Popup> {
        self.popups.remove(&id)
    }

    pub fn popup(&self, id: PopupId) -> Option<&Popup> {
        self.popups.get(&id)
    }

    /// Current position of a popup's anchor; `None` once the anchor is gone
    pub fn popup_position(&self, id: PopupId, doc: &Node) -> Option<usize> {
        let popup = self.popups.get(&id)?;
        doc.find_by_id(&popup.anchor_node_id).map(|(_, pos)| pos)
    }

    /// Drop popups whose anchor no longer exists in `doc`
    pub fn prune(&mut self, doc: &Node) {
        self.popups
            .retain(|_, popup| doc.find_by_id(&popup.anchor_node_id).is_some());
    }

    pub fn popup_count(&self) -> usize {
        self.popups.len()
    }

    /// Close everything and refuse new overlays
    pub fn destroy(&mut self) {
        self.dialog = None;
        self.popups.clear();
        self.destroyed = true;
        tracing::debug!("Overlay manager destroyed");
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    fn ensure_alive(&self) -> Result<(), EditorError> {
        if self.destroyed {
            Err(EditorError::Destroyed)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use manuscript_model::builders::*;

    #[test]
    fn test_dialog_lifecycle() {
        let mut overlays = OverlayManager::new();
        overlays
            .open_dialog(Dialog::FootnoteDeletion(FootnoteDeletion::request("f1")))
            .unwrap();
        assert!(overlays.dialog().is_some());
        overlays.cancel_dialog();
        assert!(overlays.dialog().is_none());
    }

    #[test]
    fn test_popups_follow_their_anchor() {
        let mut overlays = OverlayManager::new();
        let id = overlays.show_popup("f1", "Delete?").unwrap();
        let doc = manuscript(vec![paragraph(vec![text("ab")]), footnotes_element("fe", vec![footnote("f1", "x")])]);
        assert_eq!(overlays.popup_position(id, &doc), Some(5));

        let without = manuscript(vec![paragraph(vec![text("ab")])]);
        overlays.prune(&without);
        assert_eq!(overlays.popup_count(), 0);
    }

    #[test]
    fn test_destroyed_manager_refuses_overlays() {
        let mut overlays = OverlayManager::new();
        overlays.show_popup("a", "b").unwrap();
        overlays.destroy();
        assert_eq!(overlays.popup_count(), 0);
        assert!(matches!(overlays.show_popup("a", "b"), Err(EditorError::Destroyed)));
        assert!(matches!(
            overlays.open_dialog(Dialog::FootnoteDeletion(FootnoteDeletion::request("f1"))),
            Err(EditorError::Destroyed)
        ));
    }
}
