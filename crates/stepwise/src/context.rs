//! Per-test execution context.
//!
//! Everything a chain reads or writes during one test lives here: the host
//! driver, the alias store, the abort flag and the default retry policy.
//! A new context is built for every test case so aliases and failures never
//! leak into sibling tests.

use crate::alias::AliasStore;
use crate::driver::Driver;
use crate::retry::{AbortFlag, RetryPolicy};

/// State shared by the steps of one test
pub struct ExecutionContext<'d> {
    driver: &'d mut dyn Driver,
    aliases: AliasStore,
    abort: AbortFlag,
    policy: RetryPolicy,
    base_url: Option<String>,
}

impl std::fmt::Debug for ExecutionContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("aliases", &self.aliases)
            .field("aborted", &self.abort.is_aborted())
            .field("policy", &self.policy)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl<'d> ExecutionContext<'d> {
    /// Create a context over `driver` with an empty alias store
    pub fn new(driver: &'d mut dyn Driver) -> Self {
        Self {
            driver,
            aliases: AliasStore::new(),
            abort: AbortFlag::new(),
            policy: RetryPolicy::default(),
            base_url: None,
        }
    }

    /// Set the default retry policy
    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the base URL for relative `visit` targets
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Share an externally owned abort flag
    #[must_use]
    pub fn with_abort_flag(mut self, abort: AbortFlag) -> Self {
        self.abort = abort;
        self
    }

    /// Host driver
    pub fn driver(&mut self) -> &mut dyn Driver {
        &mut *self.driver
    }

    /// Alias store
    #[must_use]
    pub fn aliases(&self) -> &AliasStore {
        &self.aliases
    }

    /// Mutable alias store
    pub fn aliases_mut(&mut self) -> &mut AliasStore {
        &mut self.aliases
    }

    /// Chain abort flag
    #[must_use]
    pub fn abort_flag(&self) -> &AbortFlag {
        &self.abort
    }

    /// Default retry policy
    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Base URL
    #[must_use]
    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    /// Resolve `url` against the base URL unless it is already absolute
    #[must_use]
    pub fn resolve_url(&self, url: &str) -> String {
        match &self.base_url {
            Some(base) if !url.contains("://") => {
                format!("{}/{}", base.trim_end_matches('/'), url.trim_start_matches('/'))
            }
            _ => url.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Document;
    use crate::driver::MockDriver;

    #[test]
    fn test_resolve_url() {
        let mut driver = MockDriver::new(Document::new());
        let ctx = ExecutionContext::new(&mut driver).with_base_url("http://localhost:4200/");
        assert_eq!(ctx.resolve_url("/"), "http://localhost:4200/");
        assert_eq!(ctx.resolve_url("pages/forms"), "http://localhost:4200/pages/forms");
        assert_eq!(ctx.resolve_url("https://example.com/x"), "https://example.com/x");
    }

    #[test]
    fn test_without_base_url_keeps_path() {
        let mut driver = MockDriver::new(Document::new());
        let ctx = ExecutionContext::new(&mut driver);
        assert_eq!(ctx.resolve_url("/login"), "/login");
        assert!(ctx.base_url().is_none());
    }

    #[test]
    fn test_fresh_context_state() {
        let mut driver = MockDriver::new(Document::new());
        let ctx = ExecutionContext::new(&mut driver);
        assert!(ctx.aliases().is_empty());
        assert!(!ctx.abort_flag().is_aborted());
        assert_eq!(*ctx.policy(), RetryPolicy::default());
    }

    #[test]
    fn test_shared_abort_flag() {
        let mut driver = MockDriver::new(Document::new());
        let flag = AbortFlag::new();
        let ctx = ExecutionContext::new(&mut driver).with_abort_flag(flag.clone());
        flag.abort();
        assert!(ctx.abort_flag().is_aborted());
    }
}
