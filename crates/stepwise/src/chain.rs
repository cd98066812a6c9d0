//! Command chains: a fluent builder and the sequential executor.
//!
//! # Execution model
//!
//! ```text
//!  visit ──► get ──► find ──► should ──► click ──► parents ──► should
//!             └──── lineage ───┘                    │
//!                replayed on every poll             └─ anchored on the
//!                against a fresh snapshot              clicked element
//! ```
//!
//! Queries never hand a stale handle to the next step. The executor keeps an
//! anchor subject (chain start, an alias, or the target of the last action)
//! plus the query lineage since that anchor, and re-runs the lineage against a
//! new document snapshot on every poll. Steps run strictly in order; the first
//! terminal failure sets the chain's abort flag and the remaining steps are
//! skipped.

use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

use crate::assertion::{evaluate, Expectation};
use crate::command::{Command, Extract, Step};
use crate::context::ExecutionContext;
use crate::dom::{Document, NodeId};
use crate::driver::{Action, ActionOptions};
use crate::locator::{actionability, capture_all, resolve_nodes, traverse, Traversal};
use crate::result::{StepwiseError, StepwiseResult};
use crate::retry::{RetryError, RetryLoop, RetryPolicy};
use crate::selector::{CssSelector, Selector};
use crate::subject::Subject;

/// Fluent chain builder.
///
/// Parse errors are deferred to [`Chain::build`] so a chain reads as one
/// expression:
///
/// ```
/// use stepwise::Chain;
///
/// let steps = Chain::new()
///     .visit("/")
///     .get("#inputEmail3")
///     .parents(Some("form"))
///     .find("button")
///     .should("contain", &["Sign in".into()])
///     .build()
///     .unwrap();
/// assert_eq!(steps.len(), 5);
/// ```
#[derive(Debug, Default)]
pub struct Chain {
    steps: Vec<Step>,
    error: Option<StepwiseError>,
}

impl Chain {
    /// Start an empty chain
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a prepared step
    #[must_use]
    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    fn command(self, command: Command) -> Self {
        self.step(Step::new(command))
    }

    fn parsed(mut self, command: StepwiseResult<Command>) -> Self {
        match command {
            Ok(command) => self.command(command),
            Err(e) => {
                self.error.get_or_insert(e);
                self
            }
        }
    }

    fn optional_css(filter: Option<&str>) -> StepwiseResult<Option<CssSelector>> {
        filter.map(CssSelector::parse).transpose()
    }

    /// Navigate to `url`
    #[must_use]
    pub fn visit(self, url: impl Into<String>) -> Self {
        self.command(Command::Visit(url.into()))
    }

    /// Global query
    #[must_use]
    pub fn get(self, selector: &str) -> Self {
        self.parsed(Selector::css(selector).map(Command::Get))
    }

    /// Global query for `[data-cy="id"]`
    #[must_use]
    pub fn get_by_test_id(self, id: impl Into<String>) -> Self {
        self.command(Command::Get(Selector::test_id(id)))
    }

    /// Query within the current elements
    #[must_use]
    pub fn find(self, selector: &str) -> Self {
        self.parsed(CssSelector::parse(selector).map(Command::Find))
    }

    /// Element containing `text`
    #[must_use]
    pub fn contains(self, text: impl Into<String>) -> Self {
        self.command(Command::Contains {
            css: None,
            text: text.into(),
        })
    }

    /// Element matching `selector` containing `text`
    #[must_use]
    pub fn contains_in(self, selector: &str, text: impl Into<String>) -> Self {
        let text = text.into();
        self.parsed(CssSelector::parse(selector).map(|css| Command::Contains {
            css: Some(css),
            text,
        }))
    }

    /// Ancestors, optionally filtered
    #[must_use]
    pub fn parents(self, filter: Option<&str>) -> Self {
        self.parsed(Self::optional_css(filter).map(|f| Command::Traverse(Traversal::Parents(f))))
    }

    /// Direct parent
    #[must_use]
    pub fn parent(self) -> Self {
        self.command(Command::Traverse(Traversal::Parent))
    }

    /// Direct children, optionally filtered
    #[must_use]
    pub fn children(self, filter: Option<&str>) -> Self {
        self.parsed(Self::optional_css(filter).map(|f| Command::Traverse(Traversal::Children(f))))
    }

    /// First element
    #[must_use]
    pub fn first(self) -> Self {
        self.command(Command::Traverse(Traversal::First))
    }

    /// Last element
    #[must_use]
    pub fn last(self) -> Self {
        self.command(Command::Traverse(Traversal::Last))
    }

    /// Element at `index`
    #[must_use]
    pub fn eq(self, index: i64) -> Self {
        self.command(Command::Traverse(Traversal::Eq(index)))
    }

    /// Read a value
    #[must_use]
    pub fn its(self, extract: Extract) -> Self {
        self.command(Command::Its(extract))
    }

    /// Continue from alias `name`
    #[must_use]
    pub fn alias(self, name: impl Into<String>) -> Self {
        self.command(Command::Alias(name.into()))
    }

    /// Interact with the current elements
    #[must_use]
    pub fn act(self, action: Action, options: ActionOptions) -> Self {
        self.command(Command::Act { action, options })
    }

    /// Click
    #[must_use]
    pub fn click(self) -> Self {
        self.act(Action::Click, ActionOptions::default())
    }

    /// Double click
    #[must_use]
    pub fn dblclick(self) -> Self {
        self.act(Action::DoubleClick, ActionOptions::default())
    }

    /// Type `text`
    #[must_use]
    pub fn type_text(self, text: impl Into<String>) -> Self {
        self.act(Action::Type { text: text.into() }, ActionOptions::default())
    }

    /// Clear a field
    #[must_use]
    pub fn clear(self) -> Self {
        self.act(Action::Clear, ActionOptions::default())
    }

    /// Check
    #[must_use]
    pub fn check(self) -> Self {
        self.act(Action::Check, ActionOptions::default())
    }

    /// Uncheck
    #[must_use]
    pub fn uncheck(self) -> Self {
        self.act(Action::Uncheck, ActionOptions::default())
    }

    /// Assert with a Chai-style chainer
    #[must_use]
    pub fn should(self, chainer: &str, args: &[serde_json::Value]) -> Self {
        self.parsed(Expectation::from_chainer(chainer, args).map(Command::Should))
    }

    /// Assert with a prepared expectation
    #[must_use]
    pub fn should_be(self, expectation: Expectation) -> Self {
        self.command(Command::Should(expectation))
    }

    /// Pause
    #[must_use]
    pub fn wait(self, pause: Duration) -> Self {
        self.command(Command::Wait(pause))
    }

    /// Store the previous step's subject as `name`
    #[must_use]
    pub fn as_alias(mut self, name: impl Into<String>) -> Self {
        match self.steps.last_mut() {
            Some(step) => step.alias = Some(name.into()),
            None => {
                self.error
                    .get_or_insert_with(|| StepwiseError::spec_parse("`as` must follow a command"));
            }
        }
        self
    }

    /// Override the previous step's retry policy
    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        match self.steps.last_mut() {
            Some(step) => step.policy = Some(policy),
            None => {
                self.error.get_or_insert_with(|| {
                    StepwiseError::spec_parse("a retry policy must follow a command")
                });
            }
        }
        self
    }

    /// Override the previous step's timeout, keeping the default interval
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        let policy = self
            .steps
            .last()
            .and_then(|s| s.policy)
            .unwrap_or_default()
            .with_timeout(timeout);
        self.with_policy(policy)
    }

    /// Finish the chain
    ///
    /// # Errors
    ///
    /// Returns the first selector, expectation or ordering error recorded
    /// while building.
    pub fn build(self) -> StepwiseResult<Vec<Step>> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.steps),
        }
    }
}

/// Result of a chain that ran to completion
#[derive(Debug, Clone, PartialEq)]
pub struct ChainOutcome {
    /// Subject produced by the last step
    pub subject: Subject,
    /// Steps executed
    pub steps_run: usize,
    /// Wall time of the whole chain
    pub elapsed: Duration,
}

/// A chain stopped at a terminal step failure
#[derive(Debug, Error)]
#[error("step {step_index} `{command}` failed: {source}")]
pub struct ChainError {
    /// Index of the failing step
    pub step_index: usize,
    /// Failing command as written
    pub command: String,
    /// Terminal error
    #[source]
    pub source: StepwiseError,
    /// Steps that never ran
    pub skipped: usize,
}

#[derive(Debug, Clone, Default)]
enum Origin {
    #[default]
    Start,
    Alias(String),
    Acted(String),
}

#[derive(Debug, Default)]
struct Cursor {
    anchor: Subject,
    origin: Origin,
    lineage: Vec<Command>,
    subject: Subject,
}

impl Cursor {
    fn restart(&mut self, anchor: Subject, origin: Origin) {
        self.subject = anchor.clone();
        self.anchor = anchor;
        self.origin = origin;
        self.lineage.clear();
    }

    fn describe(&self) -> String {
        let mut parts: Vec<String> = match &self.origin {
            Origin::Start => Vec::new(),
            Origin::Alias(label) | Origin::Acted(label) => vec![label.clone()],
        };
        parts.extend(self.lineage.iter().map(ToString::to_string));
        if parts.is_empty() {
            "the subject".to_string()
        } else {
            parts.join(".")
        }
    }

    async fn replay(&self, ctx: &mut ExecutionContext<'_>) -> StepwiseResult<Subject> {
        let doc = ctx.driver().snapshot().await?;
        tracing::trace!(nodes = doc.len(), "snapshot taken");
        replay(&doc, &self.anchor, &self.lineage)
    }
}

fn replay(doc: &Document, anchor: &Subject, lineage: &[Command]) -> StepwiseResult<Subject> {
    let mut current = match anchor {
        Subject::Elements(els) => {
            let live: Vec<NodeId> = els
                .iter()
                .map(|e| e.node)
                .filter(|id| doc.is_attached(*id))
                .collect();
            Subject::Elements(capture_all(doc, &live))
        }
        other => other.clone(),
    };
    for command in lineage {
        current = apply_query(doc, &current, command)?;
    }
    Ok(current)
}

fn element_nodes(command: &Command, subject: &Subject) -> StepwiseResult<Vec<NodeId>> {
    match subject {
        Subject::Elements(_) => Ok(subject.nodes()),
        other => Err(StepwiseError::InvalidSubject {
            command: command.to_string(),
            found: other.kind().to_string(),
        }),
    }
}

fn apply_query(doc: &Document, current: &Subject, command: &Command) -> StepwiseResult<Subject> {
    let nodes = match command {
        Command::Get(selector) => resolve_nodes(doc, selector, None),
        Command::Find(css) => {
            let scope = element_nodes(command, current)?;
            resolve_nodes(doc, &Selector::Css(css.clone()), Some(&scope))
        }
        Command::Contains { css, text } => {
            let selector = Selector::Contains {
                css: css.clone(),
                text: text.clone(),
            };
            if matches!(current, Subject::None) {
                resolve_nodes(doc, &selector, None)
            } else {
                let scope = element_nodes(command, current)?;
                resolve_nodes(doc, &selector, Some(&scope))
            }
        }
        Command::Traverse(traversal) => traverse(doc, &element_nodes(command, current)?, traversal),
        Command::Its(extract) => return extract_value(command, current, extract),
        other => {
            return Err(StepwiseError::InvalidSubject {
                command: other.to_string(),
                found: "a query position".to_string(),
            })
        }
    };
    Ok(Subject::Elements(capture_all(doc, &nodes)))
}

fn extract_value(command: &Command, current: &Subject, extract: &Extract) -> StepwiseResult<Subject> {
    let Subject::Elements(els) = current else {
        return Err(StepwiseError::InvalidSubject {
            command: command.to_string(),
            found: current.kind().to_string(),
        });
    };
    let Some(first) = els.first() else {
        return Ok(match extract {
            Extract::Length => Subject::Value(0.into()),
            _ => Subject::Elements(Vec::new()),
        });
    };
    Ok(match extract {
        Extract::Length => Subject::Value(els.len().into()),
        Extract::Text => Subject::Value(current.text().unwrap_or_default().into()),
        Extract::Attribute(name) => Subject::Attribute {
            name: name.clone(),
            value: first.attr(name).map(str::to_string),
        },
        Extract::Property(name) => {
            Subject::Value(first.property(name).unwrap_or(serde_json::Value::Null))
        }
        Extract::Value => Subject::Value(first.form_value().unwrap_or_default().into()),
    })
}

fn has_result(subject: &Subject) -> bool {
    match subject {
        Subject::Elements(els) => !els.is_empty(),
        _ => true,
    }
}

fn loop_error(
    err: RetryError,
    policy: &RetryPolicy,
    selector: String,
    expectation: &str,
    step_index: usize,
) -> StepwiseError {
    match err {
        RetryError::Timeout {
            attempts,
            last_observed,
            ..
        } => StepwiseError::Timeout {
            ms: policy.timeout_ms(),
            attempts,
            selector,
            expectation: expectation.to_string(),
            last_observed,
        },
        RetryError::Aborted { .. } => StepwiseError::ChainAborted { step_index },
    }
}

/// Run `steps` in order against the context.
///
/// # Errors
///
/// Returns a [`ChainError`] for the first step that fails terminally. The
/// context's abort flag is set and later steps never run.
pub async fn execute(
    ctx: &mut ExecutionContext<'_>,
    steps: &[Step],
) -> Result<ChainOutcome, ChainError> {
    let started = Instant::now();
    let mut cursor = Cursor::default();
    for (index, step) in steps.iter().enumerate() {
        let fail = |source: StepwiseError| ChainError {
            step_index: index,
            command: step.command.to_string(),
            source,
            skipped: steps.len() - index - 1,
        };
        if ctx.abort_flag().is_aborted() {
            return Err(fail(StepwiseError::ChainAborted { step_index: index }));
        }
        let next = steps.get(index + 1).map(|s| &s.command);
        tracing::debug!(step = index, command = %step.command, "step started");
        if let Err(source) = run_step(ctx, &mut cursor, step, next, index).await {
            ctx.abort_flag().abort();
            tracing::debug!(
                step = index,
                error = %source,
                skipped = steps.len() - index - 1,
                "chain failed"
            );
            return Err(fail(source));
        }
        if let Some(name) = &step.alias {
            ctx.aliases_mut().store(name, cursor.subject.clone());
        }
    }
    Ok(ChainOutcome {
        subject: cursor.subject,
        steps_run: steps.len(),
        elapsed: started.elapsed(),
    })
}

async fn run_step(
    ctx: &mut ExecutionContext<'_>,
    cursor: &mut Cursor,
    step: &Step,
    next: Option<&Command>,
    index: usize,
) -> StepwiseResult<()> {
    let policy = step.policy.unwrap_or(*ctx.policy());
    match &step.command {
        Command::Visit(url) => {
            let url = ctx.resolve_url(url);
            ctx.driver().visit(&url).await?;
            cursor.restart(Subject::None, Origin::Start);
            Ok(())
        }
        Command::Alias(name) => {
            let subject = ctx.aliases().fetch(name)?;
            let label = format!("@{}", name.trim_start_matches('@'));
            cursor.restart(subject, Origin::Alias(label));
            Ok(())
        }
        Command::Wait(pause) => {
            tokio::time::sleep(*pause).await;
            Ok(())
        }
        Command::Should(expectation) => {
            settle_assertion(ctx, cursor, expectation, &policy, index).await
        }
        Command::Act { action, options } => {
            settle_action(ctx, cursor, &step.command, action, *options, &policy, index).await
        }
        query => {
            let starts_over = match query {
                Command::Get(_) => true,
                Command::Contains { .. } => {
                    cursor.lineage.is_empty() && !matches!(cursor.origin, Origin::Alias(_))
                }
                _ => false,
            };
            if starts_over {
                cursor.restart(Subject::None, Origin::Start);
            }
            cursor.lineage.push(query.clone());
            let absence_next = matches!(next, Some(Command::Should(e)) if e.is_absence());
            settle_query(ctx, cursor, &policy, absence_next, index).await
        }
    }
}

async fn settle_query(
    ctx: &mut ExecutionContext<'_>,
    cursor: &mut Cursor,
    policy: &RetryPolicy,
    absence_next: bool,
    index: usize,
) -> StepwiseResult<()> {
    let mut looper = RetryLoop::start(*policy, ctx.abort_flag())
        .map_err(|e| loop_error(e, policy, cursor.describe(), "exist", index))?;
    loop {
        let subject = cursor.replay(ctx).await?;
        if absence_next || has_result(&subject) {
            tracing::debug!(
                step = index,
                attempts = looper.attempts() + 1,
                subject = %subject,
                "query settled"
            );
            cursor.subject = subject;
            return Ok(());
        }
        let observed = StepwiseError::ResolutionEmpty {
            selector: cursor.describe(),
        }
        .to_string();
        looper
            .wait(observed)
            .await
            .map_err(|e| loop_error(e, policy, cursor.describe(), "exist", index))?;
    }
}

async fn settle_assertion(
    ctx: &mut ExecutionContext<'_>,
    cursor: &mut Cursor,
    expectation: &Expectation,
    policy: &RetryPolicy,
    index: usize,
) -> StepwiseResult<()> {
    let mut looper = RetryLoop::start(*policy, ctx.abort_flag())
        .map_err(|e| loop_error(e, policy, cursor.describe(), "pass", index))?;
    loop {
        let subject = cursor.replay(ctx).await?;
        let mismatch = match evaluate(&subject, expectation) {
            Ok(()) => {
                tracing::debug!(
                    step = index,
                    attempts = looper.attempts() + 1,
                    expectation = %expectation,
                    "assertion passed"
                );
                cursor.subject = subject;
                return Ok(());
            }
            Err(mismatch) => mismatch,
        };
        if let Err(e) = looper.wait(mismatch.to_string()).await {
            return Err(match e {
                RetryError::Timeout { .. } => StepwiseError::AssertionError {
                    selector: cursor.describe(),
                    expectation: expectation.to_string(),
                    expected: mismatch.expected,
                    actual: mismatch.actual,
                    ms: policy.timeout_ms(),
                },
                RetryError::Aborted { .. } => StepwiseError::ChainAborted { step_index: index },
            });
        }
    }
}

async fn settle_action(
    ctx: &mut ExecutionContext<'_>,
    cursor: &mut Cursor,
    command: &Command,
    action: &Action,
    options: ActionOptions,
    policy: &RetryPolicy,
    index: usize,
) -> StepwiseResult<()> {
    if options.force {
        tracing::warn!(
            action = action.name(),
            selector = %cursor.describe(),
            "forced interaction skips visibility and covering checks"
        );
    }
    let mut looper = RetryLoop::start(*policy, ctx.abort_flag())
        .map_err(|e| loop_error(e, policy, cursor.describe(), "be actionable", index))?;
    let targets = loop {
        let doc = ctx.driver().snapshot().await?;
        let subject = replay(&doc, &cursor.anchor, &cursor.lineage)?;
        let nodes = element_nodes(command, &subject)?;
        let observed = if nodes.is_empty() {
            StepwiseError::ResolutionEmpty {
                selector: cursor.describe(),
            }
            .to_string()
        } else if nodes.len() > 1 && !options.multiple && !action.applies_to_all() {
            return Err(StepwiseError::InvalidSubject {
                command: command.to_string(),
                found: format!(
                    "{} elements; set `multiple` to act on all of them",
                    nodes.len()
                ),
            });
        } else if let Some(reason) = nodes
            .iter()
            .find_map(|node| actionability(&doc, *node, options.force))
        {
            reason
        } else {
            cursor.subject = subject;
            break nodes;
        };
        looper
            .wait(observed)
            .await
            .map_err(|e| loop_error(e, policy, cursor.describe(), "be actionable", index))?;
    };
    for node in &targets {
        ctx.driver().dispatch(*node, action).await?;
    }
    tracing::debug!(
        step = index,
        action = action.name(),
        targets = targets.len(),
        attempts = looper.attempts() + 1,
        "action dispatched"
    );
    let label = format!("{}.{command}", cursor.describe());
    let acted = cursor.subject.clone();
    cursor.restart(acted, Origin::Acted(label));
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::dom::Element;
    use crate::driver::MockDriver;
    use serde_json::json;

    fn login_page() -> Document {
        let mut doc = Document::new();
        let root = doc.root();
        let nav = doc.append(root, Element::new("nav"));
        doc.append(nav, Element::new("a").with_text("Forms"));
        let form = doc.append(root, Element::new("form"));
        doc.append(form, Element::new("label").with_attr("for", "inputEmail3").with_text("Email"));
        doc.append(form, Element::new("input").with_id("inputEmail3"));
        doc.append(form, Element::new("nb-checkbox").with_text("Remember me"));
        doc.append(form, Element::new("button").with_attr("status", "warning").with_text("Sign in"));
        doc.append(form, Element::new("button").with_text("Cancel"));
        doc
    }

    fn fast() -> RetryPolicy {
        RetryPolicy::from_millis(200, 50)
    }

    mod builder_tests {
        use super::*;

        #[test]
        fn test_builder_defers_parse_errors() {
            let err = Chain::new().get("[").click().build().unwrap_err();
            assert!(matches!(err, StepwiseError::InvalidSelector { .. }));
            let err = Chain::new().should("be.shiny", &[]).build().unwrap_err();
            assert!(matches!(err, StepwiseError::InvalidExpectation { .. }));
        }

        #[test]
        fn test_as_alias_needs_a_step() {
            assert!(Chain::new().as_alias("x").build().is_err());
            let steps = Chain::new().get("form").as_alias("form").build().unwrap();
            assert_eq!(steps[0].alias.as_deref(), Some("form"));
        }

        #[test]
        fn test_with_timeout_overrides_last_step() {
            let steps = Chain::new()
                .get("form")
                .with_timeout(Duration::from_millis(10))
                .build()
                .unwrap();
            let policy = steps[0].policy.unwrap();
            assert_eq!(policy.timeout, Duration::from_millis(10));
            assert_eq!(policy.interval, RetryPolicy::default().interval);
        }
    }

    mod execute_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_query_traverse_assert() {
            let mut driver = MockDriver::new(login_page());
            let mut ctx = ExecutionContext::new(&mut driver).with_policy(fast());
            let steps = Chain::new()
                .visit("/")
                .get("#inputEmail3")
                .parents(Some("form"))
                .find("button")
                .should("contain", &[json!("Sign in")])
                .build()
                .unwrap();
            let outcome = execute(&mut ctx, &steps).await.unwrap();
            assert_eq!(outcome.steps_run, 5);
            assert_eq!(outcome.subject.elements().unwrap().len(), 2);
            assert_eq!(outcome.elapsed, Duration::ZERO);
        }

        #[tokio::test(start_paused = true)]
        async fn test_global_contains_after_visit() {
            let mut driver = MockDriver::new(login_page());
            let mut ctx = ExecutionContext::new(&mut driver).with_policy(fast());
            let steps = Chain::new()
                .contains("Forms")
                .click()
                .contains("Remember me")
                .should("have.text", &[json!("Remember me")])
                .build()
                .unwrap();
            let outcome = execute(&mut ctx, &steps).await.unwrap();
            let els = outcome.subject.elements().unwrap();
            assert_eq!(els[0].tag, "nb-checkbox");
            drop(ctx);
            assert_eq!(driver.calls("dispatch:click"), 1);
        }

        #[tokio::test(start_paused = true)]
        async fn test_assertion_error_carries_expected_and_actual() {
            let mut driver = MockDriver::new(login_page());
            let mut ctx = ExecutionContext::new(&mut driver).with_policy(fast());
            let steps = Chain::new()
                .get("[for=\"inputEmail3\"]")
                .should("have.text", &[json!("Email address")])
                .build()
                .unwrap();
            let err = execute(&mut ctx, &steps).await.unwrap_err();
            assert_eq!(err.step_index, 1);
            match err.source {
                StepwiseError::AssertionError {
                    expected,
                    actual,
                    selector,
                    ms,
                    ..
                } => {
                    assert_eq!(expected, "\"Email address\"");
                    assert_eq!(actual, "\"Email\"");
                    assert!(selector.contains("inputEmail3"));
                    assert_eq!(ms, 200);
                }
                other => panic!("expected AssertionError, got {other:?}"),
            }
        }

        #[tokio::test(start_paused = true)]
        async fn test_missing_element_times_out() {
            let mut driver = MockDriver::new(login_page());
            let mut ctx = ExecutionContext::new(&mut driver).with_policy(fast());
            let steps = Chain::new().get("table").build().unwrap();
            let start = Instant::now();
            let err = execute(&mut ctx, &steps).await.unwrap_err();
            assert!(start.elapsed() >= Duration::from_millis(200));
            match err.source {
                StepwiseError::Timeout {
                    selector,
                    last_observed,
                    ..
                } => {
                    assert_eq!(selector, "get(table)");
                    assert!(last_observed.contains("No elements matched"));
                }
                other => panic!("expected Timeout, got {other:?}"),
            }
        }

        #[tokio::test(start_paused = true)]
        async fn test_absence_assertion_owns_the_retry() {
            let mut driver = MockDriver::new(login_page());
            let mut ctx = ExecutionContext::new(&mut driver).with_policy(fast());
            let steps = Chain::new()
                .get(".spinner")
                .should("not.exist", &[])
                .build()
                .unwrap();
            let outcome = execute(&mut ctx, &steps).await.unwrap();
            assert_eq!(outcome.elapsed, Duration::ZERO);
        }

        #[tokio::test(start_paused = true)]
        async fn test_short_circuit_skips_remaining_steps() {
            let mut driver = MockDriver::new(login_page());
            let mut ctx = ExecutionContext::new(&mut driver).with_policy(fast());
            let steps = Chain::new()
                .get("form")
                .get("#does-not-exist")
                .click()
                .get("button")
                .click()
                .build()
                .unwrap();
            let err = execute(&mut ctx, &steps).await.unwrap_err();
            assert_eq!(err.step_index, 1);
            assert_eq!(err.skipped, 3);
            assert!(ctx.abort_flag().is_aborted());
            drop(ctx);
            assert_eq!(driver.calls("dispatch"), 0);
        }

        #[tokio::test(start_paused = true)]
        async fn test_aborted_context_runs_nothing() {
            let mut driver = MockDriver::new(login_page());
            let mut ctx = ExecutionContext::new(&mut driver);
            ctx.abort_flag().abort();
            let steps = Chain::new().get("form").build().unwrap();
            let err = execute(&mut ctx, &steps).await.unwrap_err();
            assert!(matches!(err.source, StepwiseError::ChainAborted { step_index: 0 }));
            drop(ctx);
            assert_eq!(driver.calls("snapshot"), 0);
        }

        #[tokio::test(start_paused = true)]
        async fn test_alias_round_trip_through_chain() {
            let mut driver = MockDriver::new(login_page());
            let mut ctx = ExecutionContext::new(&mut driver).with_policy(fast());
            let steps = Chain::new()
                .get("form")
                .as_alias("form")
                .get("nav")
                .alias("@form")
                .find("[status=warning]")
                .should("contain", &[json!("Sign in")])
                .build()
                .unwrap();
            execute(&mut ctx, &steps).await.unwrap();
            assert!(ctx.aliases().contains("form"));
        }

        #[tokio::test(start_paused = true)]
        async fn test_unknown_alias_is_terminal() {
            let mut driver = MockDriver::new(login_page());
            let mut ctx = ExecutionContext::new(&mut driver).with_policy(fast());
            let steps = Chain::new().alias("@nope").click().build().unwrap();
            let err = execute(&mut ctx, &steps).await.unwrap_err();
            assert!(matches!(err.source, StepwiseError::UnknownAlias { .. }));
            assert_eq!(err.skipped, 1);
        }

        #[tokio::test(start_paused = true)]
        async fn test_click_on_many_requires_multiple() {
            let mut driver = MockDriver::new(login_page());
            let mut ctx = ExecutionContext::new(&mut driver).with_policy(fast());
            let steps = Chain::new().get("button").click().build().unwrap();
            let err = execute(&mut ctx, &steps).await.unwrap_err();
            assert!(matches!(err.source, StepwiseError::InvalidSubject { .. }));
            drop(ctx);

            let steps = Chain::new()
                .get("button")
                .act(Action::Click, ActionOptions::default().with_multiple(true))
                .build()
                .unwrap();
            let mut ctx = ExecutionContext::new(&mut driver).with_policy(fast());
            execute(&mut ctx, &steps).await.unwrap();
            drop(ctx);
            assert_eq!(driver.calls("dispatch:click"), 2);
        }

        #[tokio::test(start_paused = true)]
        async fn test_its_reads_values() {
            let mut driver = MockDriver::new(login_page());
            let mut ctx = ExecutionContext::new(&mut driver).with_policy(fast());
            let steps = Chain::new()
                .get("button")
                .its(Extract::Length)
                .should("eq", &[json!(2)])
                .get("[status]")
                .its(Extract::Attribute("status".into()))
                .should("eq", &[json!("warning")])
                .build()
                .unwrap();
            let outcome = execute(&mut ctx, &steps).await.unwrap();
            assert_eq!(
                outcome.subject,
                Subject::Attribute {
                    name: "status".into(),
                    value: Some("warning".into())
                }
            );
        }

        #[tokio::test(start_paused = true)]
        async fn test_find_on_value_is_invalid() {
            let mut driver = MockDriver::new(login_page());
            let mut ctx = ExecutionContext::new(&mut driver).with_policy(fast());
            let steps = Chain::new()
                .get("button")
                .its(Extract::Length)
                .find("span")
                .build()
                .unwrap();
            let err = execute(&mut ctx, &steps).await.unwrap_err();
            assert_eq!(err.step_index, 2);
            assert!(matches!(err.source, StepwiseError::InvalidSubject { .. }));
        }

        #[tokio::test(start_paused = true)]
        async fn test_driver_error_is_terminal() {
            let mut driver = MockDriver::new(login_page());
            driver.fail_dispatch = Some("element detached".into());
            let mut ctx = ExecutionContext::new(&mut driver).with_policy(fast());
            let steps = Chain::new().contains("Forms").click().build().unwrap();
            let err = execute(&mut ctx, &steps).await.unwrap_err();
            assert!(matches!(err.source, StepwiseError::Driver { .. }));
        }

        #[tokio::test(start_paused = true)]
        async fn test_visit_resolves_base_url() {
            let mut driver = MockDriver::new(login_page());
            let mut ctx = ExecutionContext::new(&mut driver).with_base_url("http://localhost:4200");
            let steps = Chain::new().visit("/pages").build().unwrap();
            execute(&mut ctx, &steps).await.unwrap();
            drop(ctx);
            assert_eq!(driver.current_url.as_deref(), Some("http://localhost:4200/pages"));
        }
    }
}
