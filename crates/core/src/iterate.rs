//! Fixed-budget refine/evaluate loop.
//!
//! Each pass re-applies the refinement (overwriting the previous artifact) and
//! scores the result. The first passing report ends the loop; otherwise the
//! last report is returned. Earlier reports are not kept.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::{
    error::{ReelError, Result},
    rate::RatingReport,
};

/// Produces a fresh artifact for pass `iteration` (1-based).
pub trait Refine {
    async fn refine(&mut self, iteration: u32) -> Result<PathBuf>;
}

/// Scores an artifact.
pub trait Evaluate {
    async fn evaluate(&mut self, artifact: &Path) -> Result<RatingReport>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IterationPolicy {
    pub max_iterations: u32,
    pub min_score: f64,
}

impl Default for IterationPolicy {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            min_score: 8.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IterationOutcome {
    pub report: RatingReport,
    pub iterations: u32,
    pub passed: bool,
    pub artifact: PathBuf,
}

pub async fn iterate<R: Refine, E: Evaluate>(
    refiner: &mut R,
    evaluator: &mut E,
    policy: IterationPolicy,
) -> Result<IterationOutcome> {
    if policy.max_iterations == 0 {
        return Err(ReelError::InvalidInput {
            reason: "max iterations must be at least 1".to_string(),
        });
    }

    let mut last = None;
    for iteration in 1..=policy.max_iterations {
        info!("Iteration {}/{}", iteration, policy.max_iterations);
        let artifact = refiner.refine(iteration).await?;
        let report = evaluator.evaluate(&artifact).await?;
        info!(
            "Iteration {} scored {}/10 (pass: {}, {} issues)",
            iteration,
            report.overall_score,
            report.passed,
            report.issues.len()
        );

        if report.meets(policy.min_score) {
            return Ok(IterationOutcome {
                report,
                iterations: iteration,
                passed: true,
                artifact,
            });
        }
        last = Some((report, artifact));
    }

    let (report, artifact) = last.ok_or_else(|| ReelError::InvalidInput {
        reason: "iteration produced no report".to_string(),
    })?;
    warn!(
        "Stopped after {} iterations without meeting {}/10",
        policy.max_iterations, policy.min_score
    );
    Ok(IterationOutcome {
        report,
        iterations: policy.max_iterations,
        passed: false,
        artifact,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, VecDeque};

    use super::*;

    struct CountingRefiner {
        calls: u32,
    }

    impl Refine for CountingRefiner {
        async fn refine(&mut self, iteration: u32) -> Result<PathBuf> {
            self.calls += 1;
            Ok(PathBuf::from(format!("final_{}.mp4", iteration)))
        }
    }

    struct ScriptedEvaluator {
        reports: VecDeque<RatingReport>,
        seen: Vec<PathBuf>,
    }

    impl Evaluate for ScriptedEvaluator {
        async fn evaluate(&mut self, artifact: &Path) -> Result<RatingReport> {
            self.seen.push(artifact.to_path_buf());
            self.reports.pop_front().ok_or(ReelError::MalformedReport {
                evaluator: "rating",
                reason: "no scripted report left".to_string(),
            })
        }
    }

    fn report(score: f64, passed: bool, issues: &[&str]) -> RatingReport {
        RatingReport {
            overall_score: score,
            passed,
            scores: BTreeMap::new(),
            issues: issues.iter().map(|s| s.to_string()).collect(),
            suggestions: Vec::new(),
        }
    }

    fn evaluator(reports: Vec<RatingReport>) -> ScriptedEvaluator {
        ScriptedEvaluator {
            reports: reports.into(),
            seen: Vec::new(),
        }
    }

    #[tokio::test]
    async fn stops_on_first_passing_report() {
        let mut refiner = CountingRefiner { calls: 0 };
        let mut evaluator = evaluator(vec![
            report(6.0, false, &["segment 1 is washed out"]),
            report(9.0, true, &[]),
            report(10.0, true, &[]),
        ]);

        let outcome = iterate(&mut refiner, &mut evaluator, IterationPolicy::default())
            .await
            .unwrap();

        assert!(outcome.passed);
        assert_eq!(outcome.iterations, 2);
        assert_eq!(outcome.report.overall_score, 9.0);
        assert_eq!(outcome.artifact, PathBuf::from("final_2.mp4"));
        assert_eq!(refiner.calls, 2);
    }

    #[tokio::test]
    async fn exhausted_budget_returns_the_last_report() {
        let mut refiner = CountingRefiner { calls: 0 };
        let mut evaluator = evaluator(vec![
            report(7.0, false, &[]),
            report(9.0, false, &[]),
            report(5.0, false, &["third"]),
        ]);

        let outcome = iterate(&mut refiner, &mut evaluator, IterationPolicy::default())
            .await
            .unwrap();

        assert!(!outcome.passed);
        assert_eq!(outcome.iterations, 3);
        assert_eq!(refiner.calls, 3);
        assert_eq!(outcome.report, report(5.0, false, &["third"]));
        assert_eq!(evaluator.seen.len(), 3);
    }

    #[tokio::test]
    async fn issues_block_success_even_with_a_high_score() {
        let mut refiner = CountingRefiner { calls: 0 };
        let mut evaluator = evaluator(vec![report(10.0, true, &["text cut off"])]);
        let policy = IterationPolicy {
            max_iterations: 1,
            min_score: 8.0,
        };

        let outcome = iterate(&mut refiner, &mut evaluator, policy).await.unwrap();
        assert!(!outcome.passed);
    }

    #[tokio::test]
    async fn evaluator_failure_ends_the_loop() {
        let mut refiner = CountingRefiner { calls: 0 };
        let mut evaluator = evaluator(Vec::new());

        let err = iterate(&mut refiner, &mut evaluator, IterationPolicy::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ReelError::MalformedReport { .. }));
        assert_eq!(refiner.calls, 1);
    }

    #[tokio::test]
    async fn zero_budget_is_rejected() {
        let mut refiner = CountingRefiner { calls: 0 };
        let mut evaluator = evaluator(Vec::new());
        let policy = IterationPolicy {
            max_iterations: 0,
            min_score: 8.0,
        };
        assert!(iterate(&mut refiner, &mut evaluator, policy).await.is_err());
        assert_eq!(refiner.calls, 0);
    }
}
