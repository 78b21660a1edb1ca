//! Typing-indicator state, local and remote.
//!
//! Local emission is edge-triggered: one `typing:true` per composing burst,
//! de-duplicated against a local flag, with a debounce timer (armed by the
//! controller) emitting `typing:false` after 1500 ms of silence. Remote
//! entries are added on `typing:true` and removed only on an explicit
//! `typing:false`. There is no timer-based expiry; a peer that never sends
//! the stop signal stays in the set until the link closes, at which point
//! the controller clears the whole set as stale.

use std::collections::HashSet;

use crate::frame::OutboundFrame;

#[derive(Debug)]
pub struct TypingCoordinator {
    viewer_id: String,
    announced: bool,
    remote: HashSet<String>,
}

impl TypingCoordinator {
    pub fn new(viewer_id: impl Into<String>) -> Self {
        Self {
            viewer_id: viewer_id.into(),
            announced: false,
            remote: HashSet::new(),
        }
    }

    /// Called on every compose-box change. Emits `typing:true` once per
    /// burst; the caller re-arms the debounce timer whenever the text is
    /// non-empty.
    pub fn on_compose_change(&mut self, text: &str) -> Option<OutboundFrame> {
        if text.trim().is_empty() || self.announced {
            return None;
        }
        self.announced = true;
        Some(OutboundFrame::Typing {
            user_id: self.viewer_id.clone(),
            typing: true,
        })
    }

    /// Debounce expiry, blur, or successful send: emit `typing:false` if a
    /// start was announced.
    pub fn on_stop(&mut self) -> Option<OutboundFrame> {
        if !self.announced {
            return None;
        }
        self.announced = false;
        Some(OutboundFrame::Typing {
            user_id: self.viewer_id.clone(),
            typing: false,
        })
    }

    pub fn is_announced(&self) -> bool {
        self.announced
    }

    /// Track a remote typing signal. The viewer's own id is always excluded,
    /// even if the server echoes it back.
    pub fn apply_remote(&mut self, user_id: &str, typing: bool) {
        if user_id == self.viewer_id {
            return;
        }
        if typing {
            self.remote.insert(user_id.to_owned());
        } else {
            self.remote.remove(user_id);
        }
    }

    pub fn remote_typists(&self) -> Vec<String> {
        let mut typists: Vec<String> = self.remote.iter().cloned().collect();
        typists.sort();
        typists
    }

    pub fn clear_remote(&mut self) {
        self.remote.clear();
    }
}
