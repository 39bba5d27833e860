//! TOML configuration for the `procwarden` binary.
//!
//! ```toml
//! [supervisor]
//! shared_dir = "/var/run/procwarden"
//! poll_interval_ms = 500
//! termination_timeout_ms = 60000
//!
//! [[process]]
//! key = "web"
//! slot = 1
//! program = "/usr/bin/java"
//! options = ["-Xmx256m"]
//! classpath = ["lib/web.jar"]
//! entry_point = "com.acme.Web"
//!
//! [process.arguments]
//! port = "8080"
//! ```

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::models::{CommandDescriptor, ProcessIdentity};
use crate::supervisor::{
    SupervisorContext, DEFAULT_OWN_SLOT, DEFAULT_POLL_INTERVAL, DEFAULT_TERMINATION_TIMEOUT,
};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WardenConfig {
    #[serde(default)]
    pub supervisor: SupervisorSection,
    #[serde(default, rename = "process")]
    pub processes: Vec<ProcessSection>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SupervisorSection {
    /// Base directory for signal slots; a private temp dir when omitted
    pub shared_dir: Option<PathBuf>,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_termination_timeout_ms")]
    pub termination_timeout_ms: u64,
    #[serde(default = "default_own_slot")]
    pub own_slot: u32,
    /// Set to false to run without a signal slot for the supervisor itself
    #[serde(default = "default_true")]
    pub own_channel: bool,
}

impl Default for SupervisorSection {
    fn default() -> Self {
        Self {
            shared_dir: None,
            poll_interval_ms: default_poll_interval_ms(),
            termination_timeout_ms: default_termination_timeout_ms(),
            own_slot: default_own_slot(),
            own_channel: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProcessSection {
    pub key: String,
    pub slot: u32,
    pub program: PathBuf,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub classpath: Vec<PathBuf>,
    pub entry_point: Option<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    pub work_dir: Option<PathBuf>,
    #[serde(default)]
    pub arguments: BTreeMap<String, String>,
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL.as_millis() as u64
}

fn default_termination_timeout_ms() -> u64 {
    DEFAULT_TERMINATION_TIMEOUT.as_millis() as u64
}

fn default_own_slot() -> u32 {
    DEFAULT_OWN_SLOT
}

fn default_true() -> bool {
    true
}

impl WardenConfig {
    /// Read, parse and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = Self::parse(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: WardenConfig =
            toml::from_str(content).context("Failed to parse TOML configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.supervisor.poll_interval_ms == 0 {
            bail!("supervisor.poll_interval_ms must be greater than zero");
        }

        let own_slot = self.own_slot();
        let mut keys = HashSet::new();
        let mut slots = HashSet::new();
        for process in &self.processes {
            if process.key.trim().is_empty() {
                bail!("Process key must not be empty");
            }
            if process.program.as_os_str().is_empty() {
                bail!("Process '{}' has an empty program", process.key);
            }
            if !keys.insert(process.key.as_str()) {
                bail!("Duplicate process key '{}'", process.key);
            }
            if !slots.insert(process.slot) {
                bail!(
                    "Slot {} of process '{}' is already taken",
                    process.slot,
                    process.key
                );
            }
            if own_slot == Some(process.slot) {
                bail!(
                    "Slot {} of process '{}' collides with the supervisor's own slot",
                    process.slot,
                    process.key
                );
            }
        }
        Ok(())
    }

    pub fn own_slot(&self) -> Option<u32> {
        self.supervisor
            .own_channel
            .then_some(self.supervisor.own_slot)
    }

    /// Build the supervisor context; without `shared_dir` a private temp dir is used.
    pub fn context(&self) -> Result<SupervisorContext> {
        let context = match &self.supervisor.shared_dir {
            Some(dir) => {
                fs::create_dir_all(dir).with_context(|| {
                    format!("Failed to create shared directory: {}", dir.display())
                })?;
                SupervisorContext::new(dir)
            }
            None => SupervisorContext::temporary()
                .context("Failed to create temporary shared directory")?,
        };
        Ok(context
            .with_poll_interval(Duration::from_millis(self.supervisor.poll_interval_ms))
            .with_termination_timeout(Duration::from_millis(
                self.supervisor.termination_timeout_ms,
            ))
            .with_own_slot(self.own_slot()))
    }

    /// Command descriptors in declaration order.
    pub fn commands(&self) -> Vec<CommandDescriptor> {
        self.processes.iter().map(ProcessSection::command).collect()
    }
}

impl ProcessSection {
    pub fn identity(&self) -> ProcessIdentity {
        ProcessIdentity::new(self.key.clone(), self.slot)
    }

    pub fn command(&self) -> CommandDescriptor {
        let mut command = CommandDescriptor::new(self.identity(), self.program.clone());
        command.options = self.options.clone();
        command.classpath = self.classpath.clone();
        command.entry_point = self.entry_point.clone();
        command.env = self.env.clone();
        command.work_dir = self.work_dir.clone();
        command.arguments = self.arguments.clone();
        command
    }
}
