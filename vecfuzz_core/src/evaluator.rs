use crate::coverage::{BreakpointScript, HitReport};
use crate::params::ParamVector;
use crate::pipeline::{Pipeline, PipelineError};
use crate::runner::{RunError, TargetRunner};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EvaluationError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error(transparent)]
    Run(#[from] RunError),
}

/// Result of scoring one parameter vector.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub input: Vec<u8>,
    pub hits: HitReport,
}

/// Turns a parameter vector into a coverage score for one seed and one target.
///
/// This is the objective an external optimizer calls repeatedly: mutate the
/// seed, run the target under the breakpoint script, reduce the report.
pub struct Evaluator<R: TargetRunner> {
    pipeline: Pipeline,
    seed: Vec<u8>,
    script: BreakpointScript,
    runner: R,
}

impl<R: TargetRunner> Evaluator<R> {
    pub fn new(pipeline: Pipeline, seed: Vec<u8>, script: BreakpointScript, runner: R) -> Self {
        Self {
            pipeline,
            seed,
            script,
            runner,
        }
    }

    pub fn dimension(&self) -> usize {
        self.pipeline.dimension()
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn evaluate(&mut self, vector: &ParamVector) -> Result<Evaluation, EvaluationError> {
        let input = self.pipeline.apply(&self.seed, vector)?;
        let report = self.runner.run(&input, self.script.as_str())?;
        let hits = HitReport::parse(&report);
        tracing::info!(
            digest = %format!("{:x}", md5::compute(&input)),
            len = input.len(),
            unique = hits.unique_hits,
            total = hits.total_hits,
            "Evaluated input"
        );
        Ok(Evaluation { input, hits })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coverage::EdgeSet;

    /// Reports one breakpoint hit per input byte.
    struct CountingRunner {
        runs: Vec<Vec<u8>>,
        scripts: Vec<String>,
    }

    impl TargetRunner for CountingRunner {
        fn run(&mut self, input: &[u8], script: &str) -> Result<String, RunError> {
            self.runs.push(input.to_vec());
            self.scripts.push(script.to_string());
            Ok(format!(
                "Num Type\n1 breakpoint\n\tbreakpoint already hit {} times\n[exit]",
                input.len()
            ))
        }
    }

    fn evaluator() -> Evaluator<CountingRunner> {
        let pipeline = Pipeline::from_keys(&["bit-flip", "repeat"]).unwrap();
        let script = BreakpointScript::render(&EdgeSet::from_addresses([0x10]), 3);
        let runner = CountingRunner {
            runs: Vec::new(),
            scripts: Vec::new(),
        };
        Evaluator::new(pipeline, b"AB".to_vec(), script, runner)
    }

    #[test]
    fn evaluates_mutated_input() {
        let mut evaluator = evaluator();
        assert_eq!(evaluator.dimension(), 3);
        let result = evaluator.evaluate(&ParamVector::zeros(3)).unwrap();
        assert_eq!(result.input, b"@B");
        assert_eq!(result.hits.unique_hits, 1.0);
        assert_eq!(result.hits.total_hits, 2.0);
        assert_eq!(evaluator.runner.runs, vec![b"@B".to_vec()]);
        assert!(evaluator.runner.scripts[0].starts_with("break *0x10\n"));
    }

    #[test]
    fn wrong_dimension_never_reaches_the_runner() {
        let mut evaluator = evaluator();
        let err = evaluator.evaluate(&ParamVector::zeros(2)).unwrap_err();
        assert!(matches!(
            err,
            EvaluationError::Pipeline(PipelineError::DimensionMismatch { .. })
        ));
        assert!(evaluator.runner.runs.is_empty());
    }
}
