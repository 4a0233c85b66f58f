use std::sync::{Arc, Mutex};

/// Records the order in which tasks actually ran.
///
/// Clone it into each submitted closure and call [`Recorder::record`] from
/// inside the work.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    seen: Arc<Mutex<Vec<u64>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, tag: u64) {
        self.seen.lock().unwrap().push(tag);
    }

    pub fn seen(&self) -> Vec<u64> {
        self.seen.lock().unwrap().clone()
    }
}
