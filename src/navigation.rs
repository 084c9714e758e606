//! Navigation side effect
//!
//! Invoked with the access-denied URL when a session lacks the required
//! roles. In a browser this is a full-page redirect; elsewhere it can open a
//! browser, log, or record the request.

use std::sync::{Arc, Mutex, PoisonError};

/// Navigates to a URL
pub trait Navigator: Send + Sync {
    /// Navigate to `url`
    fn navigate(&self, url: &str);
}

impl<T: Navigator + ?Sized> Navigator for Arc<T> {
    fn navigate(&self, url: &str) {
        (**self).navigate(url);
    }
}

/// Type alias for a shared navigator
pub type SharedNavigator = Arc<dyn Navigator>;

/// Navigator that only emits a tracing event; the default collaborator
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNavigator;

impl Navigator for TracingNavigator {
    fn navigate(&self, url: &str) {
        tracing::info!(url = %url, "Navigation requested");
    }
}

/// Wrapper to convert a closure into a [`Navigator`]
///
/// # Example
///
/// ```
/// use keycloak_auth::navigation::{FnNavigator, Navigator};
///
/// let navigator = FnNavigator::new(|url: &str| println!("redirect to {url}"));
/// navigator.navigate("https://example.com/access-denied/");
/// ```
pub struct FnNavigator<F>
where
    F: Fn(&str) + Send + Sync,
{
    func: F,
}

impl<F> FnNavigator<F>
where
    F: Fn(&str) + Send + Sync,
{
    /// Create a new function-based navigator
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> Navigator for FnNavigator<F>
where
    F: Fn(&str) + Send + Sync,
{
    fn navigate(&self, url: &str) {
        (self.func)(url);
    }
}

/// Navigator that records every requested URL
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    urls: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    /// Create an empty recorder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// URLs navigated to so far, oldest first
    #[must_use]
    pub fn urls(&self) -> Vec<String> {
        self.urls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, url: &str) {
        self.urls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(url.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_recording_navigator() {
        let navigator = RecordingNavigator::new();
        navigator.navigate("https://a");
        navigator.navigate("https://b");
        assert_eq!(navigator.urls(), vec!["https://a", "https://b"]);
    }

    #[test]
    fn test_fn_navigator_through_arc() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let navigator: SharedNavigator = Arc::new(FnNavigator::new(move |_url: &str| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        navigator.navigate("https://example.com");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
