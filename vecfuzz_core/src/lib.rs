pub mod catalogue;
pub mod config;
pub mod coverage;
pub mod evaluator;
pub mod format;
pub mod json_node;
pub mod mutator;
pub mod params;
pub mod pipeline;
pub mod runner;

pub use catalogue::CatalogueEntry;
pub use config::VecfuzzConfig;
pub use coverage::{
    BreakpointScript, CacheError, Disassembler, DisassemblyError, EdgeCache, EdgeSet, HitReport,
    ObjdumpDisassembler,
};
pub use evaluator::{Evaluation, EvaluationError, Evaluator};
pub use format::FormatFamily;
pub use mutator::{Mutator, SIZE_BUDGET};
pub use params::{ParamVector, Params};
pub use pipeline::{Pipeline, PipelineError};
pub use runner::{GdbRunner, RunError, TargetRunner};
