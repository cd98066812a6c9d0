//! Stepwise: retrying command chains for browser-style end-to-end tests
//!
//! A test is a chain of commands: navigate, locate elements, act on them and
//! assert on what they show. The page changes asynchronously relative to the
//! commands, so every locate, actionability check and assertion is polled
//! against fresh document snapshots until it holds or its budget runs out.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    STEPWISE Architecture                        │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐    ┌────────────┐    ┌────────────┐            │
//! │   │ Spec file  │    │ Chain      │    │ Driver     │            │
//! │   │ (YAML) or  │───►│ Executor   │───►│ (fixture   │            │
//! │   │ Chain API  │    │            │    │  or host)  │            │
//! │   └────────────┘    └─────┬──────┘    └────────────┘            │
//! │          ┌────────────────┼────────────────┐                    │
//! │          ▼                ▼                ▼                    │
//! │   ┌────────────┐   ┌────────────┐   ┌────────────┐              │
//! │   │ Locator    │   │ Retry      │   │ Assertion  │              │
//! │   │ Resolver   │   │ Scheduler  │   │ Engine     │              │
//! │   └────────────┘   └────────────┘   └────────────┘              │
//! │                   Alias Store (per test)                        │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use stepwise::prelude::*;
//!
//! let runtime = tokio::runtime::Builder::new_current_thread()
//!     .enable_time()
//!     .build()
//!     .unwrap();
//! runtime.block_on(async {
//!     let mut doc = Document::new();
//!     let root = doc.root();
//!     let form = doc.append(root, Element::new("form"));
//!     doc.append(form, Element::new("button").with_text("Sign in"));
//!
//!     let mut driver = MockDriver::new(doc);
//!     let mut ctx = ExecutionContext::new(&mut driver);
//!     let steps = Chain::new()
//!         .get("form")
//!         .find("button")
//!         .should("contain", &["Sign in".into()])
//!         .build()
//!         .unwrap();
//!     let outcome = execute(&mut ctx, &steps).await.unwrap();
//!     assert_eq!(outcome.steps_run, 3);
//! });
//! ```

#![warn(missing_docs)]

mod alias;
mod assertion;
mod chain;
mod command;
mod config;
mod context;
mod dom;
mod driver;
#[cfg(feature = "fixture")]
mod fixture;
mod harness;
mod locator;
mod report;
mod result;
mod retry;
mod selector;
mod specfile;
mod subject;

pub use alias::AliasStore;
pub use assertion::{evaluate, Expectation, Mismatch, TextPattern};
pub use chain::{execute, Chain, ChainError, ChainOutcome};
pub use command::{Command, Extract, Step};
pub use config::{RunConfig, DEFAULT_BASE_URL, DEFAULT_SPEC_PATTERN};
pub use context::ExecutionContext;
pub use dom::{Document, Element, ElementState, NodeId};
pub use driver::{Action, ActionOptions, Driver, DriverConfig, DriverFactory, MockDriver};
#[cfg(feature = "fixture")]
pub use fixture::{
    page_path, DispatchRecord, Effect, FixtureDriver, FixtureDriverFactory, FixtureSite, Mutation,
    NodeFixture, PageFixture, Trigger,
};
pub use harness::{
    FailureMode, StepFailure, SuiteResults, TestCase, TestHarness, TestResult, TestStatus,
    TestSuite,
};
pub use locator::{
    actionability, capture_all, normalize_whitespace, resolve, resolve_nodes, traverse,
    ElementHandle, Traversal,
};
pub use report::{RunReport, Totals};
pub use result::{StepwiseError, StepwiseResult};
pub use retry::{
    retry, AbortFlag, Attempt, Backoff, RetryError, RetryLoop, RetryOutcome, RetryPolicy,
    DEFAULT_COMMAND_TIMEOUT_MS, DEFAULT_POLL_INTERVAL_MS,
};
pub use selector::{
    AttrCondition, AttrOp, Combinator, Compound, CssSelector, PseudoState, Selector,
    TEST_ID_ATTRIBUTE,
};
pub use specfile::{SpecFile, StepSpec, TestSpec};
pub use subject::Subject;

/// Prelude for convenient imports
pub mod prelude {
    pub use super::alias::*;
    pub use super::assertion::*;
    pub use super::chain::*;
    pub use super::command::*;
    pub use super::config::*;
    pub use super::context::*;
    pub use super::dom::*;
    pub use super::driver::*;
    #[cfg(feature = "fixture")]
    pub use super::fixture::*;
    pub use super::harness::*;
    pub use super::locator::*;
    pub use super::report::*;
    pub use super::result::*;
    pub use super::retry::{
        retry, AbortFlag, Attempt, Backoff, RetryError, RetryLoop, RetryOutcome, RetryPolicy,
        DEFAULT_COMMAND_TIMEOUT_MS, DEFAULT_POLL_INTERVAL_MS,
    };
    pub use super::selector::*;
    pub use super::specfile::*;
    pub use super::subject::*;
}
