use std::collections::BTreeSet;
use std::path::Path;
use std::process::Command;
use thiserror::Error;

/// Jump mnemonics whose targets and fallthroughs are observed. Calls and returns are not included.
const BRANCH_MNEMONICS: &[&str] = &[
    "jbe", "jnbe", "jz", "jpe", "jne", "jp", "jb", "jae", "je", "jrcxz", "jnae", "jnb", "jo",
    "jcxz", "ja", "jna", "jns", "jnc", "jng", "jnge", "js", "jnl", "jno", "jg", "jnle", "jpo",
    "jl", "jnp", "jecxz", "jc", "jle", "jge", "jnz", "jmp", "jmpq",
];

/// Instruction prefixes objdump prints in front of a mnemonic.
const PREFIXES: &[&str] = &["bnd", "notrack", "rep", "repz", "repnz", "lock", "data16", "addr32"];

#[derive(Error, Debug)]
pub enum DisassemblyError {
    #[error("Failed to spawn disassembler '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Disassembler exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
    #[error("Disassembly I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Produces a textual disassembly listing for a binary.
pub trait Disassembler {
    fn disassemble(&self, binary: &Path) -> Result<String, DisassemblyError>;
}

/// Runs `<program> -d <binary>` and captures its standard output.
#[derive(Debug, Clone)]
pub struct ObjdumpDisassembler {
    program: String,
}

impl ObjdumpDisassembler {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for ObjdumpDisassembler {
    fn default() -> Self {
        Self::new("objdump")
    }
}

impl Disassembler for ObjdumpDisassembler {
    fn disassemble(&self, binary: &Path) -> Result<String, DisassemblyError> {
        tracing::debug!(program = %self.program, binary = %binary.display(), "Disassembling");
        let output = Command::new(&self.program)
            .arg("-d")
            .arg(binary)
            .output()
            .map_err(|source| DisassemblyError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        if !output.status.success() {
            return Err(DisassemblyError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// One decoded `address: bytes<TAB>instruction` listing line.
#[derive(Debug, PartialEq, Eq)]
struct Instruction<'a> {
    address: u64,
    mnemonic: &'a str,
    operands: &'a str,
}

/// Splits an instruction line into address, mnemonic and operand text.
///
/// Headers, labels, blank lines and byte continuation lines (an address and
/// raw bytes with no instruction column) yield `None`.
fn parse_instruction(line: &str) -> Option<Instruction<'_>> {
    let (address, rest) = line.split_once(':')?;
    let address = u64::from_str_radix(address.trim(), 16).ok()?;
    let mut columns = rest.split('\t');
    columns.next()?;
    columns.next()?;
    let text = columns.next()?.trim();
    let mut tokens = text.split_whitespace();
    let mut mnemonic = tokens.next()?;
    while PREFIXES.contains(&mnemonic) {
        mnemonic = tokens.next()?;
    }
    let operands = text
        .split_once(mnemonic)
        .map(|(_, after)| after.trim())
        .unwrap_or("");
    Some(Instruction {
        address,
        mnemonic,
        operands,
    })
}

enum Target {
    Direct(u64),
    /// Register or memory operand, or no `<symbol>` annotation to anchor the target.
    Unresolved,
    Malformed,
}

/// Reads the destination of a direct jump, e.g. `401136 <main+0x1d>`.
fn jump_target(operands: &str) -> Target {
    if operands.starts_with('*') || !operands.contains('<') {
        return Target::Unresolved;
    }
    let Some(token) = operands.split_whitespace().next() else {
        return Target::Malformed;
    };
    match u64::from_str_radix(token.trim_start_matches("0x"), 16) {
        Ok(address) => Target::Direct(address),
        Err(_) => Target::Malformed,
    }
}

/// Ordered, deduplicated addresses of the control-flow edges worth a breakpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EdgeSet {
    addresses: BTreeSet<u64>,
}

impl EdgeSet {
    /// Collects the target and the fallthrough address of every jump in `listing`.
    ///
    /// The fallthrough is the address of the next instruction line. A jump on
    /// the last instruction line has no fallthrough. Only jumps annotated with
    /// a `<symbol+offset>` target count: indirect and unannotated jumps are
    /// ignored, and annotated jumps whose target cannot be read are skipped
    /// and counted as malformed.
    pub fn extract(listing: &str) -> EdgeSet {
        let instructions: Vec<Instruction<'_>> =
            listing.lines().filter_map(parse_instruction).collect();

        let mut addresses = BTreeSet::new();
        let mut branches = 0usize;
        let mut malformed = 0usize;
        for (i, instruction) in instructions.iter().enumerate() {
            if !BRANCH_MNEMONICS.contains(&instruction.mnemonic) {
                continue;
            }
            match jump_target(instruction.operands) {
                Target::Direct(address) => {
                    addresses.insert(address);
                }
                Target::Unresolved => continue,
                Target::Malformed => {
                    tracing::debug!(
                        address = instruction.address,
                        operands = instruction.operands,
                        "Skipping branch with unreadable target"
                    );
                    malformed += 1;
                    continue;
                }
            }
            branches += 1;
            if let Some(next) = instructions.get(i + 1) {
                addresses.insert(next.address);
            }
        }

        let edges = EdgeSet { addresses };
        tracing::info!(
            instructions = instructions.len(),
            branches,
            edges = edges.len(),
            malformed,
            "Extracted edge addresses"
        );
        if edges.is_empty() {
            tracing::warn!("No branch instructions found; the binary may be stripped or trivial");
        }
        edges
    }

    /// Reads a saved listing, e.g. the output of an earlier `objdump -d`.
    pub fn from_listing_file(path: &Path) -> Result<EdgeSet, DisassemblyError> {
        let listing = std::fs::read_to_string(path)?;
        Ok(Self::extract(&listing))
    }

    pub fn from_addresses(addresses: impl IntoIterator<Item = u64>) -> Self {
        Self {
            addresses: addresses.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    /// Addresses in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        self.addresses.iter().copied()
    }

    pub fn contains(&self, address: u64) -> bool {
        self.addresses.contains(&address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = "
/tmp/a.out:     file format elf64-x86-64


Disassembly of section .text:

0000000000001139 <main>:
    1139:\t55                   \tpush   %rbp
    113a:\t48 89 e5             \tmov    %rsp,%rbp
    113d:\t74 05                \tje     1144 <main+0xb>
    113f:\tb8 01 00 00 00       \tmov    $0x1,%eax
    1144:\teb 02                \tjmp    1148 <main+0xf>
    1146:\t31 c0                \txor    %eax,%eax
    1148:\te8 00 00 00 00       \tcall   114d <main+0x14>
    114d:\tc3                   \tret
";

    fn addrs(edges: &EdgeSet) -> Vec<u64> {
        edges.iter().collect()
    }

    #[test]
    fn single_jump_yields_target_and_fallthrough() {
        let listing = "  a:\t74 10\tjne    b0 <f+0x10>\n  c:\t90\tnop\n";
        assert_eq!(addrs(&EdgeSet::extract(listing)), vec![0xc, 0xb0]);
    }

    #[test]
    fn extracts_sorted_deduplicated_edges() {
        let edges = EdgeSet::extract(LISTING);
        // je -> 1144 / 113f, jmp -> 1148 / 1146; call and ret ignored
        assert_eq!(addrs(&edges), vec![0x113f, 0x1144, 0x1146, 0x1148]);
    }

    #[test]
    fn branch_on_last_line_has_no_fallthrough() {
        let listing = "  10:\t90\tnop\n  11:\t75 f0\tjne    3 <f+0x3>\n";
        assert_eq!(addrs(&EdgeSet::extract(listing)), vec![0x3]);
    }

    #[test]
    fn indirect_and_unannotated_jumps_are_ignored() {
        let listing = "\
  20:\tff e0\tjmp    *%rax
  22:\t90\tnop
  23:\t0f 84 00 00 00 00\tje     29
  29:\tc3\tret
";
        assert!(EdgeSet::extract(listing).is_empty());
    }

    #[test]
    fn older_binutils_jmpq_is_a_branch() {
        let listing = "  50:\te9 00 00 00 00\tjmpq   60 <h+0x10>\n  55:\t90\tnop\n";
        assert_eq!(addrs(&EdgeSet::extract(listing)), vec![0x55, 0x60]);
    }

    #[test]
    fn malformed_targets_are_skipped() {
        let listing = "  30:\t74 00\tje     zz <f+0x1>\n  32:\t90\tnop\n";
        assert!(EdgeSet::extract(listing).is_empty());
    }

    #[test]
    fn prefixes_and_continuation_lines() {
        let listing = "\
  40:\tf2 eb 02\tbnd jmp 46 <g+0x6>
  43:\t48 b8 00 00 00 00 00 \tmovabs $0x0,%rax
  4a:\t00 00 00
  4d:\tc3\tret
";
        assert_eq!(addrs(&EdgeSet::extract(listing)), vec![0x43, 0x46]);
    }

    #[test]
    fn listing_without_branches_is_empty() {
        let edges = EdgeSet::extract("  1:\t90\tnop\n  2:\tc3\tret\n");
        assert!(edges.is_empty());
        assert_eq!(edges.len(), 0);
    }

    #[test]
    fn missing_disassembler_reports_spawn_error() {
        let disassembler = ObjdumpDisassembler::new("vecfuzz-no-such-objdump");
        match disassembler.disassemble(Path::new("/bin/true")) {
            Err(DisassemblyError::Spawn { program, .. }) => {
                assert_eq!(program, "vecfuzz-no-such-objdump")
            }
            other => panic!("Expected Spawn error, got {other:?}"),
        }
    }
}
