//! Description of a process to launch.

use std::collections::BTreeMap;
use std::path::PathBuf;

use super::identity::ProcessIdentity;

/// Everything the launcher needs to build an OS invocation.
///
/// Immutable once handed to the supervisor; builder-style `with_*` methods are
/// only meant for assembling one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandDescriptor {
    pub identity: ProcessIdentity,
    /// Runtime binary to execute
    pub program: PathBuf,
    /// Options placed right after the program
    pub options: Vec<String>,
    /// Resource list, joined into a single `-cp` argument when non-empty
    pub classpath: Vec<PathBuf>,
    /// Entry point placed after the classpath (main class, script, ...)
    pub entry_point: Option<String>,
    pub env: BTreeMap<String, String>,
    pub work_dir: Option<PathBuf>,
    /// Free-form arguments written to the generated properties file
    pub arguments: BTreeMap<String, String>,
}

impl CommandDescriptor {
    pub fn new(identity: ProcessIdentity, program: impl Into<PathBuf>) -> Self {
        Self {
            identity,
            program: program.into(),
            options: Vec::new(),
            classpath: Vec::new(),
            entry_point: None,
            env: BTreeMap::new(),
            work_dir: None,
            arguments: BTreeMap::new(),
        }
    }

    pub fn with_option(mut self, option: impl Into<String>) -> Self {
        self.options.push(option.into());
        self
    }

    pub fn with_classpath_entry(mut self, entry: impl Into<PathBuf>) -> Self {
        self.classpath.push(entry.into());
        self
    }

    pub fn with_entry_point(mut self, entry_point: impl Into<String>) -> Self {
        self.entry_point = Some(entry_point.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(dir.into());
        self
    }

    pub fn with_argument(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.arguments.insert(key.into(), value.into());
        self
    }
}
