use crate::catalogue;
use crate::mutator::Mutator;
use crate::params::ParamVector;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum PipelineError {
    #[error("Parameter vector has {actual} coordinates but the pipeline needs {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("Coordinate {index} is {value}, outside [0, 1]")]
    CoordinateOutOfRange { index: usize, value: f64 },
    #[error("Unknown mutator '{0}'")]
    UnknownMutator(String),
}

/// An ordered chain of mutators sharing one parameter vector.
///
/// The vector is cut into contiguous windows, one per mutator and exactly as
/// wide as its declared dimension. The seed is folded through the chain left
/// to right, each mutator seeing the previous one's output.
pub struct Pipeline {
    mutators: Vec<Box<dyn Mutator>>,
    dimension: usize,
}

impl Pipeline {
    pub fn new(mutators: Vec<Box<dyn Mutator>>) -> Self {
        let dimension = mutators.iter().map(|m| m.dimension()).sum();
        let pipeline = Self {
            mutators,
            dimension,
        };
        tracing::debug!(name = %pipeline.name(), dimension, "Built pipeline");
        pipeline
    }

    /// Builds a pipeline from catalogue keys, in order.
    pub fn from_keys<S: AsRef<str>>(keys: &[S]) -> Result<Self, PipelineError> {
        let mutators = keys
            .iter()
            .map(|key| {
                let key = key.as_ref();
                catalogue::by_key(key).ok_or_else(|| PipelineError::UnknownMutator(key.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(mutators))
    }

    /// Total number of coordinates a parameter vector for this pipeline must have.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Member names joined in order, for logs.
    pub fn name(&self) -> String {
        self.mutators
            .iter()
            .map(|m| m.name())
            .collect::<Vec<_>>()
            .join(" -> ")
    }

    pub fn len(&self) -> usize {
        self.mutators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mutators.is_empty()
    }

    /// Folds `seed` through every mutator.
    ///
    /// Fails with [`PipelineError::DimensionMismatch`] before any mutator runs if
    /// the vector length differs from [`Pipeline::dimension`]. The seed is never
    /// modified; the result is a fresh buffer.
    pub fn apply(&self, seed: &[u8], vector: &ParamVector) -> Result<Vec<u8>, PipelineError> {
        if vector.len() != self.dimension {
            return Err(PipelineError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }

        let mut current = seed.to_vec();
        let mut offset = 0;
        for mutator in &self.mutators {
            let width = mutator.dimension();
            current = mutator.mutate(&current, vector.window(offset..offset + width));
            offset += width;
        }
        Ok(current)
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name())
            .field("dimension", &self.dimension)
            .finish()
    }
}
