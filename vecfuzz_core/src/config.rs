use crate::catalogue;
use crate::coverage::DEFAULT_CONTINUE_CEILING;
use crate::format::FormatFamily;
use crate::pipeline::{Pipeline, PipelineError};
use crate::runner::GdbRunner;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct PipelineSettings {
    /// Catalogue keys, in application order.
    #[serde(default)]
    pub mutators: Vec<String>,
    /// Every strategy of one family, used when `mutators` is empty.
    #[serde(default)]
    pub family: Option<FormatFamily>,
}

impl PipelineSettings {
    /// Builds the configured pipeline.
    ///
    /// Explicit keys win over a family. With neither, the family is detected from `seed`.
    pub fn build(&self, seed: &[u8]) -> Result<Pipeline, PipelineError> {
        if !self.mutators.is_empty() {
            return Pipeline::from_keys(self.mutators.as_slice());
        }
        let family = self
            .family
            .unwrap_or_else(|| crate::format::detect(seed));
        tracing::debug!(%family, "Using every strategy of family");
        let mutators = catalogue::for_family(family)
            .into_iter()
            .map(|entry| entry.build())
            .collect();
        Ok(Pipeline::new(mutators))
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct CoverageSettings {
    #[serde(default = "default_disassembler")]
    pub disassembler: String,
    #[serde(default = "default_debugger")]
    pub debugger: String,
    #[serde(default = "default_continue_ceiling")]
    pub continue_ceiling: u64,
    #[serde(default)]
    pub cache_path: Option<PathBuf>,
}

fn default_disassembler() -> String {
    "objdump".to_string()
}

fn default_debugger() -> String {
    "gdb".to_string()
}

fn default_continue_ceiling() -> u64 {
    DEFAULT_CONTINUE_CEILING
}

impl Default for CoverageSettings {
    fn default() -> Self {
        Self {
            disassembler: default_disassembler(),
            debugger: default_debugger(),
            continue_ceiling: default_continue_ceiling(),
            cache_path: None,
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct RunnerSettings {
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Target arguments; `{}` is replaced by the input file path.
    #[serde(default = "default_input_arg")]
    pub input_arg: String,
}

fn default_timeout_ms() -> u64 {
    2000
}

fn default_input_arg() -> String {
    "{}".to_string()
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            input_arg: default_input_arg(),
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct VecfuzzConfig {
    #[serde(default)]
    pub pipeline: PipelineSettings,
    #[serde(default)]
    pub coverage: CoverageSettings,
    #[serde(default)]
    pub runner: RunnerSettings,
}

impl VecfuzzConfig {
    pub fn load_from_file(path: &Path) -> Result<Self, anyhow::Error> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file at {:?}: {}", path, e))?;

        let config: VecfuzzConfig = toml::from_str(&content).map_err(|e| {
            anyhow::anyhow!("Failed to parse TOML from config file {:?}: {}", path, e)
        })?;

        Ok(config)
    }

    /// A gdb runner for `target` with the debugger, argument template and timeout configured here.
    pub fn runner_for(&self, target: impl Into<PathBuf>) -> GdbRunner {
        GdbRunner::new(target)
            .with_debugger(self.coverage.debugger.clone())
            .with_input_arg(self.runner.input_arg.clone())
            .with_timeout(Duration::from_millis(self.runner.timeout_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn empty_file_gives_defaults() {
        let config: VecfuzzConfig = toml::from_str("").unwrap();
        assert_eq!(config, VecfuzzConfig::default());
        assert_eq!(config.coverage.continue_ceiling, 1_000_000);
        assert_eq!(config.coverage.disassembler, "objdump");
        assert_eq!(config.runner.timeout_ms, 2000);
        assert_eq!(config.runner.input_arg, "{}");
    }

    #[test]
    fn loads_kebab_case_sections() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[pipeline]
mutators = ["bit-flip", "repeat"]

[coverage]
debugger = "/usr/bin/gdb-multiarch"
continue-ceiling = 50
cache-path = "/tmp/edges.bin"

[runner]
timeout-ms = 250
input-arg = "--in {{}}"
"#
        )
        .unwrap();
        let config = VecfuzzConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.pipeline.mutators, vec!["bit-flip", "repeat"]);
        assert_eq!(config.coverage.debugger, "/usr/bin/gdb-multiarch");
        assert_eq!(config.coverage.continue_ceiling, 50);
        assert_eq!(config.coverage.cache_path, Some(PathBuf::from("/tmp/edges.bin")));
        assert_eq!(config.runner.timeout_ms, 250);
        assert_eq!(config.runner.input_arg, "--in {}");
        assert_eq!(config.pipeline.build(b"").unwrap().dimension(), 3);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(toml::from_str::<VecfuzzConfig>("[runner]\ntimeout = 5\n").is_err());
        let missing = VecfuzzConfig::load_from_file(Path::new("/no/such/vecfuzz.toml"));
        assert!(missing.is_err());
    }

    #[test]
    fn pipeline_falls_back_to_family() {
        let by_family: VecfuzzConfig = toml::from_str("[pipeline]\nfamily = \"csv\"\n").unwrap();
        let pipeline = by_family.pipeline.build(b"").unwrap();
        assert_eq!(pipeline.len(), 7);

        let detected = PipelineSettings::default().build(br#"{"a": 1}"#).unwrap();
        assert_eq!(detected.len(), 7);
        assert!(detected.name().contains("json"));
    }

    #[test]
    fn unknown_mutator_key_fails_build() {
        let settings = PipelineSettings {
            mutators: vec!["nope".to_string()],
            family: None,
        };
        assert!(matches!(
            settings.build(b""),
            Err(PipelineError::UnknownMutator(_))
        ));
    }
}
