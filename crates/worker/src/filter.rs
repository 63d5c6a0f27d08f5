//! Cacheable-response admission filter.
//!
//! Decides whether a response status may be persisted into a namespace.
//! Keeping error statuses out prevents a transient 404 or 500 from
//! poisoning the cache until eviction.

/// Per-namespace status allow-list.
///
/// Status 0 denotes an opaque cross-origin response recorded by a browser
/// peer; it is admissible where listed even though its body cannot be
/// inspected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheableFilter {
    allowed_statuses: Vec<u16>,
}

impl CacheableFilter {
    pub fn new(allowed_statuses: Vec<u16>) -> Self {
        Self { allowed_statuses }
    }

    /// Whether a response with this status may be written.
    pub fn admits(&self, status: u16) -> bool {
        self.allowed_statuses.contains(&status)
    }
}

impl Default for CacheableFilter {
    /// The platform default: opaque (0) and 200 only.
    fn default() -> Self {
        Self { allowed_statuses: vec![0, 200] }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_admits_ok_and_opaque() {
        let filter = CacheableFilter::default();
        assert!(filter.admits(200));
        assert!(filter.admits(0));
    }

    #[test]
    fn test_default_rejects_errors() {
        let filter = CacheableFilter::default();
        assert!(!filter.admits(404));
        assert!(!filter.admits(500));
        assert!(!filter.admits(301));
    }

    #[test]
    fn test_custom_allow_list() {
        let filter = CacheableFilter::new(vec![200, 204]);
        assert!(filter.admits(204));
        assert!(!filter.admits(0));
    }
}
