//! Single-flight guard for installs

use std::sync::atomic::{AtomicBool, Ordering};

/// Holds the in-flight flag for the duration of one install
///
/// The flag is cleared on drop, so an install that fails or panics part-way
/// still releases it.
pub(crate) struct InstallGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> InstallGuard<'a> {
    /// Claim the flag, or `None` if another install holds it
    pub(crate) fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for InstallGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_fails_until_drop() {
        let flag = AtomicBool::new(false);

        let first = InstallGuard::acquire(&flag).unwrap();
        assert!(InstallGuard::acquire(&flag).is_none());
        assert!(flag.load(Ordering::Acquire));

        drop(first);
        assert!(!flag.load(Ordering::Acquire));
        assert!(InstallGuard::acquire(&flag).is_some());
    }
}
