//! Timing behaviour of chains against the fixture host, on a paused clock.

#![allow(clippy::unwrap_used, clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use stepwise::prelude::*;
use tokio::time::Instant;

const SITE: &str = include_str!("../../../demos/site.yaml");

const LAYOUTS: &str = "/pages/forms/layouts";

fn driver() -> FixtureDriver {
    let site = FixtureSite::from_yaml(SITE).unwrap();
    FixtureDriver::new(Arc::new(site), DriverConfig::default())
}

mod retry_window {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_late_element_is_found_when_it_appears() {
        let mut driver = driver();
        let mut ctx = ExecutionContext::new(&mut driver).with_policy(RetryPolicy::from_millis(4000, 50));
        let steps = Chain::new()
            .visit(LAYOUTS)
            .get("nb-toast")
            .should("contain", &[json!("Welcome back")])
            .build()
            .unwrap();
        let outcome = execute(&mut ctx, &steps).await.unwrap();
        assert!(outcome.elapsed >= Duration::from_millis(700));
        assert!(outcome.elapsed < Duration::from_millis(750));
    }

    #[tokio::test(start_paused = true)]
    async fn test_perpetual_failure_times_out_within_one_interval() {
        let mut driver = driver();
        let mut ctx =
            ExecutionContext::new(&mut driver).with_policy(RetryPolicy::from_millis(1000, 100));
        let steps = Chain::new().visit(LAYOUTS).get("#never").build().unwrap();
        let started = Instant::now();
        let err = execute(&mut ctx, &steps).await.unwrap_err();
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(1000), "{elapsed:?}");
        assert!(elapsed <= Duration::from_millis(1100), "{elapsed:?}");
        match err.source {
            StepwiseError::Timeout {
                ms,
                selector,
                attempts,
                ..
            } => {
                assert_eq!(ms, 1000);
                assert!(selector.contains("#never"));
                assert!(attempts >= 10);
            }
            other => panic!("expected Timeout, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_absence_waits_for_removal() {
        let mut driver = driver();
        let mut ctx = ExecutionContext::new(&mut driver);
        let steps = Chain::new()
            .visit(LAYOUTS)
            .wait(Duration::from_millis(800))
            .get("#welcome-toast")
            .should("not.exist", &[])
            .build()
            .unwrap();
        let outcome = execute(&mut ctx, &steps).await.unwrap();
        assert!(outcome.elapsed >= Duration::from_millis(2500));
        assert!(outcome.elapsed < Duration::from_millis(2550));
    }
}

mod actionability {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_click_happens_at_first_poll_after_enable() {
        let mut driver = driver();
        let mut ctx = ExecutionContext::new(&mut driver);
        let steps = Chain::new()
            .visit(LAYOUTS)
            .get_by_test_id("submit")
            .click()
            .with_policy(RetryPolicy::from_millis(4000, 100))
            .build()
            .unwrap();
        execute(&mut ctx, &steps).await.unwrap();
        drop(ctx);
        let log = driver.log();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].action, Action::Click);
        assert_eq!(log[0].at, Duration::from_millis(1200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_button_times_out_before_enable() {
        let mut driver = driver();
        let mut ctx = ExecutionContext::new(&mut driver);
        let steps = Chain::new()
            .visit(LAYOUTS)
            .get_by_test_id("submit")
            .click()
            .with_policy(RetryPolicy::from_millis(500, 100))
            .build()
            .unwrap();
        let err = execute(&mut ctx, &steps).await.unwrap_err();
        assert_eq!(err.step_index, 2);
        let message = err.source.to_string();
        assert!(message.contains("disabled"), "{message}");
        drop(ctx);
        assert!(driver.log().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_hidden_link_is_clicked_once_revealed() {
        let mut driver = driver();
        let mut ctx = ExecutionContext::new(&mut driver);
        let steps = Chain::new()
            .visit("/")
            .contains("Forms")
            .click()
            .contains("Form Layouts")
            .click()
            .build()
            .unwrap();
        execute(&mut ctx, &steps).await.unwrap();
        assert_eq!(ctx.driver().current_url(), Some(LAYOUTS));
    }
}

mod chain_semantics {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_alias_round_trip() {
        let mut driver = driver();
        let mut ctx = ExecutionContext::new(&mut driver);
        let steps = Chain::new()
            .visit(LAYOUTS)
            .contains_in("nb-card", "Using the Grid")
            .as_alias("usingTheGrid")
            .alias("usingTheGrid")
            .find("[for=\"inputEmail1\"]")
            .should("have.text", &[json!("Email")])
            .alias("@usingTheGrid")
            .find("[for=\"inputPassword2\"]")
            .should("have.text", &[json!("Password")])
            .build()
            .unwrap();
        execute(&mut ctx, &steps).await.unwrap();
        let stored = ctx.aliases().fetch("usingTheGrid").unwrap();
        assert_eq!(stored.elements().unwrap()[0].tag, "nb-card");
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_alias_fails_immediately() {
        let mut driver = driver();
        let mut ctx = ExecutionContext::new(&mut driver);
        let steps = Chain::new().visit(LAYOUTS).alias("nope").build().unwrap();
        let started = Instant::now();
        let err = execute(&mut ctx, &steps).await.unwrap_err();
        assert!(matches!(err.source, StepwiseError::UnknownAlias { .. }));
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_short_circuits_remaining_steps() {
        let mut driver = driver();
        let mut ctx =
            ExecutionContext::new(&mut driver).with_policy(RetryPolicy::from_millis(300, 50));
        let steps = Chain::new()
            .get("form")
            .get("#missing")
            .click()
            .type_text("never typed")
            .should("exist", &[])
            .build()
            .unwrap();
        let steps = [Chain::new().visit(LAYOUTS).build().unwrap(), steps].concat();
        let err = execute(&mut ctx, &steps).await.unwrap_err();
        assert_eq!(err.step_index, 2);
        assert_eq!(err.skipped, 3);
        assert!(ctx.abort_flag().is_aborted());
        drop(ctx);
        assert!(driver.log().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_assertion_error_reports_expected_and_actual() {
        let mut driver = driver();
        let mut ctx =
            ExecutionContext::new(&mut driver).with_policy(RetryPolicy::from_millis(500, 50));
        let steps = Chain::new()
            .visit(LAYOUTS)
            .get("[for=\"inputEmail1\"]")
            .should("have.text", &[json!("Email address")])
            .build()
            .unwrap();
        let err = execute(&mut ctx, &steps).await.unwrap_err();
        match err.source {
            StepwiseError::AssertionError {
                expected, actual, ms, ..
            } => {
                assert_eq!(expected, "\"Email address\"");
                assert_eq!(actual, "\"Email\"");
                assert_eq!(ms, 500);
            }
            other => panic!("expected AssertionError, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_typing_and_checking() {
        let mut driver = driver();
        let mut ctx = ExecutionContext::new(&mut driver);
        let steps = Chain::new()
            .visit(LAYOUTS)
            .get("#inputEmail1")
            .type_text("test@test.com")
            .should("have.value", &[json!("test@test.com")])
            .contains_in("nb-card", "Using the Grid")
            .find("[type=\"radio\"]")
            .first()
            .check()
            .should("be.checked", &[])
            .build()
            .unwrap();
        execute(&mut ctx, &steps).await.unwrap();
    }
}
