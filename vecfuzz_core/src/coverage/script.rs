use super::EdgeSet;
use std::fmt::Write as _;

/// Default number of times a breakpoint auto-continues before gdb stops honouring it.
pub const DEFAULT_CONTINUE_CEILING: u64 = 1_000_000;

/// A gdb command file that sets a breakpoint on every edge and keeps the target running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakpointScript(String);

impl BreakpointScript {
    /// One `break *0x<addr>` per edge, then a `commands` block for breakpoints
    /// `1-$bpnum` that is silent and continues up to `ceiling` times.
    pub fn render(edges: &EdgeSet, ceiling: u64) -> Self {
        let mut script = String::new();
        for address in edges.iter() {
            let _ = writeln!(script, "break *0x{address:x}");
        }
        let _ = write!(
            script,
            "\ncommands 1-$bpnum\nsilent\ncontinue {ceiling}\nend\n"
        );
        Self(script)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for BreakpointScript {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_breakpoints_then_command_block() {
        let edges = EdgeSet::from_addresses([0x1144, 0x113f]);
        let script = BreakpointScript::render(&edges, DEFAULT_CONTINUE_CEILING);
        assert_eq!(
            script.as_str(),
            "break *0x113f\nbreak *0x1144\n\ncommands 1-$bpnum\nsilent\ncontinue 1000000\nend\n"
        );
    }

    #[test]
    fn empty_edge_set_keeps_command_block() {
        let script = BreakpointScript::render(&EdgeSet::default(), 5);
        assert_eq!(script.to_string(), "\ncommands 1-$bpnum\nsilent\ncontinue 5\nend\n");
    }
}
