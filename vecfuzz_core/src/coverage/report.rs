use serde::Serialize;

const HIT_MARKER: &str = "\tbreakpoint already hit";

/// Coverage signal reduced from gdb's `info breakpoints` output.
#[derive(Serialize, Debug, Clone, Copy, Default, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct HitReport {
    /// Breakpoints hit at least once.
    pub unique_hits: f64,
    /// Sum of all per-breakpoint hit counters.
    pub total_hits: f64,
}

impl HitReport {
    /// Reduces a report in one pass.
    ///
    /// The first and last lines are framing and are skipped. Every remaining
    /// line starting with a tab and `breakpoint already hit N time(s)` counts
    /// once towards `unique_hits` and `N` towards `total_hits`. A hit line
    /// whose count does not parse still counts as a unique hit.
    pub fn parse(report: &str) -> HitReport {
        let lines: Vec<&str> = report.split('\n').collect();
        let body = if lines.len() > 2 {
            &lines[1..lines.len() - 1]
        } else {
            &[][..]
        };

        let mut hits = HitReport::default();
        for line in body.iter().filter(|line| line.starts_with(HIT_MARKER)) {
            hits.unique_hits += 1.0;
            match line.split(' ').nth(3).map(str::parse::<u64>) {
                Some(Ok(count)) => hits.total_hits += count as f64,
                _ => tracing::debug!(line, "Unreadable hit count"),
            }
        }
        hits
    }
}

impl std::fmt::Display for HitReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unique={} total={}", self.unique_hits, self.total_hits)
    }
}
