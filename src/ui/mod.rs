//! View-state controllers driven by the presentation layer.

pub mod detail;
pub mod list;

use parking_lot::Mutex;

/// Runs `release` on the guarded state when dropped, including when the
/// owning future is dropped mid-await.
struct Release<'a, S> {
    state: &'a Mutex<S>,
    release: fn(&mut S),
}

impl<'a, S> Release<'a, S> {
    fn new(state: &'a Mutex<S>, release: fn(&mut S)) -> Self {
        Self { state, release }
    }
}

impl<S> Drop for Release<'_, S> {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        (self.release)(&mut state);
    }
}
