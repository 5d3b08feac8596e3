/*!
    Transport control shared with a second thread.

    The decode-driving thread owns the [`PlayerContext`](crate::PlayerContext).
    A control thread holds a [`ControlHandle`] and may pause, resume or
    request a seek at any time. None of these preempt an in-flight call:
    the driving thread picks them up at the start of its next read or
    decode call.
*/

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::config::SeekOptions;

/**
    A seek posted by the control thread, applied by the driving thread.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SeekRequest {
    pub target_ms: i64,
    pub options: SeekOptions,
}

#[derive(Debug, Default)]
struct ControlState {
    paused: AtomicBool,
    pending_seek: Mutex<Option<SeekRequest>>,
}

/**
    Cloneable, thread-safe transport control for one context.
*/
#[derive(Clone, Debug, Default)]
pub struct ControlHandle {
    state: Arc<ControlState>,
}

impl ControlHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /**
        Stop `read_packet` from advancing the packet cursor.
    */
    pub fn pause_read_packet(&self) {
        self.state.paused.store(true, Ordering::Release);
    }

    pub fn resume_read_packet(&self) {
        self.state.paused.store(false, Ordering::Release);
    }

    pub fn is_paused(&self) -> bool {
        self.state.paused.load(Ordering::Acquire)
    }

    /**
        Ask for a seek with default options. A later request replaces an
        earlier one that has not been applied yet.
    */
    pub fn request_seek(&self, target_ms: i64) {
        self.request_seek_with(target_ms, SeekOptions::default());
    }

    pub fn request_seek_with(&self, target_ms: i64, options: SeekOptions) {
        *self.state.pending_seek.lock() = Some(SeekRequest { target_ms, options });
    }

    pub fn has_pending_seek(&self) -> bool {
        self.state.pending_seek.lock().is_some()
    }

    pub(crate) fn take_seek_request(&self) -> Option<SeekRequest> {
        self.state.pending_seek.lock().take()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn pause_is_visible_across_clones() {
        let handle = ControlHandle::new();
        let remote = handle.clone();
        remote.pause_read_packet();
        assert!(handle.is_paused());
        remote.resume_read_packet();
        assert!(!handle.is_paused());
    }

    #[test]
    fn latest_seek_request_wins() {
        let handle = ControlHandle::new();
        let remote = handle.clone();
        thread::spawn(move || {
            remote.request_seek(1000);
            remote.request_seek_with(2000, SeekOptions::new().skip_audio(true));
        })
        .join()
        .unwrap();

        assert!(handle.has_pending_seek());
        let request = handle.take_seek_request().unwrap();
        assert_eq!(request.target_ms, 2000);
        assert!(request.options.skip_audio);
        assert!(handle.take_seek_request().is_none());
    }
}
