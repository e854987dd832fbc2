//! Static coverage instrumentation: jump edges from a disassembly, a gdb
//! script breaking on each of them, and the reduction of gdb's hit report.

pub mod cache;
pub mod disasm;
pub mod report;
pub mod script;

pub use cache::{CacheError, EdgeCache};
pub use disasm::{Disassembler, DisassemblyError, EdgeSet, ObjdumpDisassembler};
pub use report::HitReport;
pub use script::{BreakpointScript, DEFAULT_CONTINUE_CEILING};
