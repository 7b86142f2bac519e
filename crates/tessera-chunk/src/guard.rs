use std::sync::atomic::{AtomicU64, Ordering};

/// Tracks which build number the installed mesh of one section reflects.
///
/// Stores `build + 1` so that zero means "nothing installed yet".
#[derive(Debug, Default)]
pub struct BuildGuard {
    installed: AtomicU64,
}

impl BuildGuard {
    pub const fn new() -> Self {
        Self {
            installed: AtomicU64::new(0),
        }
    }

    /// Accepts `build` only if it is strictly newer than what is installed, and records it
    /// in the same atomic step.
    #[inline]
    pub fn try_accept(&self, build: u64) -> bool {
        let candidate = build.saturating_add(1);
        let prev = self.installed.fetch_max(candidate, Ordering::AcqRel);
        prev < candidate
    }

    #[inline]
    pub fn installed(&self) -> Option<u64> {
        match self.installed.load(Ordering::Acquire) {
            0 => None,
            n => Some(n - 1),
        }
    }
}
