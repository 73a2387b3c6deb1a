//! Schema versioning
//!
//! A build starts from the version of the snapshot it replays (0 for a fresh
//! versioned schema, 1 for an unversioned one). The first change a build
//! makes bumps it once; every later change in the same build shares that
//! version. Changes found while replaying the snapshot never bump.

use std::fmt;

/// Lazy version counter for one build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionTracker {
    /// Current schema version
    version: u32,
    /// Whether changes advance the version at all
    versioned: bool,
    /// A change has been seen in this build
    changed: bool,
    /// The previous snapshot is being replayed
    initializing: bool,
}

impl VersionTracker {
    /// Tracker for a schema with no previous snapshot
    pub fn new(versioned: bool) -> Self {
        Self::resume(if versioned { 0 } else { 1 }, versioned)
    }

    /// Tracker continuing from a snapshot taken at `version`
    pub fn resume(version: u32, versioned: bool) -> Self {
        Self {
            version,
            versioned,
            changed: false,
            initializing: true,
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn is_versioned(&self) -> bool {
        self.versioned
    }

    /// Whether this build changed anything
    pub fn changed(&self) -> bool {
        self.changed
    }

    pub fn is_initializing(&self) -> bool {
        self.initializing
    }

    /// Ends the snapshot replay; from here on changes count.
    pub fn finish_initializing(&mut self) {
        self.initializing = false;
    }

    /// Records a change. Returns `true` when this call advanced the version.
    pub fn maybe_bump(&mut self) -> bool {
        if self.changed || self.initializing {
            return false;
        }
        self.changed = true;
        if self.versioned {
            self.version += 1;
            return true;
        }
        false
    }
}

impl fmt::Display for VersionTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_versions() {
        assert_eq!(VersionTracker::new(true).version(), 0);
        assert_eq!(VersionTracker::new(false).version(), 1);
    }

    #[test]
    fn test_bumps_once_per_build() {
        let mut tracker = VersionTracker::resume(4, true);
        tracker.finish_initializing();
        assert!(tracker.maybe_bump());
        assert!(!tracker.maybe_bump());
        assert!(!tracker.maybe_bump());
        assert_eq!(tracker.version(), 5);
        assert!(tracker.changed());
    }

    #[test]
    fn test_replay_never_bumps() {
        let mut tracker = VersionTracker::resume(2, true);
        assert!(!tracker.maybe_bump());
        assert_eq!(tracker.version(), 2);
        assert!(!tracker.changed());
    }

    #[test]
    fn test_unversioned_tracks_changes_only() {
        let mut tracker = VersionTracker::new(false);
        tracker.finish_initializing();
        assert!(!tracker.maybe_bump());
        assert!(tracker.changed());
        assert_eq!(tracker.version(), 1);
        assert_eq!(tracker.to_string(), "v1");
    }
}
