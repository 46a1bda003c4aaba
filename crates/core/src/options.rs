//! Parsing options shared by every entry point.

use tracing::Dispatch;

/// Default capacity of the decoded-object cache.
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

/// How a document is opened.
#[derive(Debug, Clone)]
pub struct ParsingOptions {
    /// Repair broken cross-reference data instead of failing.
    pub lenient: bool,
    /// Cap on cached decoded objects; `None` keeps everything.
    pub object_cache_capacity: Option<usize>,
    /// In lenient mode, scan for `N G obj` headers when an identifier is
    /// missing from the index.
    pub scan_missing_objects: bool,
    /// Subscriber receiving this document's log events. When unset the
    /// caller's default subscriber is used.
    pub dispatch: Option<Dispatch>,
}

impl Default for ParsingOptions {
    fn default() -> Self {
        Self {
            lenient: true,
            object_cache_capacity: Some(DEFAULT_CACHE_CAPACITY),
            scan_missing_objects: true,
            dispatch: None,
        }
    }
}

impl ParsingOptions {
    /// Fail on the first structural problem.
    pub fn strict() -> Self {
        Self {
            lenient: false,
            scan_missing_objects: false,
            ..Self::default()
        }
    }

    pub fn with_lenient(mut self, lenient: bool) -> Self {
        self.lenient = lenient;
        self
    }

    pub fn with_object_cache_capacity(mut self, capacity: Option<usize>) -> Self {
        self.object_cache_capacity = capacity;
        self
    }

    pub fn with_scan_missing_objects(mut self, scan: bool) -> Self {
        self.scan_missing_objects = scan;
        self
    }

    pub fn with_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = Some(dispatch);
        self
    }

    /// Run `f` with this document's subscriber installed.
    pub fn scoped<R>(&self, f: impl FnOnce() -> R) -> R {
        match &self.dispatch {
            Some(dispatch) => tracing::dispatcher::with_default(dispatch, f),
            None => f(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_lenient() {
        let options = ParsingOptions::default();
        assert!(options.lenient);
        assert_eq!(options.object_cache_capacity, Some(DEFAULT_CACHE_CAPACITY));
        assert!(!ParsingOptions::strict().lenient);
    }

    #[test]
    fn scoped_without_dispatch_runs_inline() {
        let options = ParsingOptions::default().with_object_cache_capacity(None);
        assert_eq!(options.scoped(|| 41 + 1), 42);
        assert_eq!(options.object_cache_capacity, None);
    }
}
