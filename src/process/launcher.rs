//! Turning a `CommandDescriptor` into a running, drained child

use std::ffi::OsString;
use std::fs::File;
use std::io::{self, Write};
use std::os::fd::OwnedFd;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use nix::fcntl::{fcntl, FcntlArg, FdFlag};
use tracing::{error, info, warn};

use crate::models::CommandDescriptor;
use crate::signals::SignalChannels;
use crate::supervisor::SupervisorContext;

use super::drain::OutputDrain;
use super::error::LaunchError;
use super::handle::{ProcessHandle, UnixProcess};
use super::managed::ManagedProcess;

pub const PROPERTY_PROCESS_KEY: &str = "process.key";
pub const PROPERTY_PROCESS_INDEX: &str = "process.index";
pub const PROPERTY_TERMINATION_TIMEOUT: &str = "process.terminationTimeout";
pub const PROPERTY_SHARED_PATH: &str = "process.sharedDir";

/// Spawns processes for the supervisor.
pub trait Launcher: Send + Sync {
    fn launch(&self, command: &CommandDescriptor) -> Result<ManagedProcess, LaunchError>;

    /// Release everything the launcher allocated. Failures are logged.
    fn close(&self);
}

/// Fully resolved OS invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub work_dir: Option<PathBuf>,
    pub env: Vec<(String, String)>,
}

impl Invocation {
    /// Command line for logs, shell-escaped.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_os_str())
            .chain(self.args.iter().map(|a| a.as_os_str()))
            .map(|part| shell_escape::escape(part.to_string_lossy()).into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        if let Some(dir) = &self.work_dir {
            command.current_dir(dir);
        }
        command.envs(self.env.iter().map(|(k, v)| (k, v)));
        command
    }
}

/// Build the invocation for `command`.
///
/// Order: program, options, `-cp <classpath>` (when non-empty), entry point,
/// properties file. `TMPDIR` points at the shared directory unless the
/// descriptor overrides it.
pub fn build_invocation(
    command: &CommandDescriptor,
    properties_file: &Path,
    shared_dir: &Path,
) -> Result<Invocation, LaunchError> {
    let mut args: Vec<OsString> = command.options.iter().map(OsString::from).collect();

    if !command.classpath.is_empty() {
        let classpath =
            std::env::join_paths(&command.classpath).map_err(|e| LaunchError::Classpath {
                identity: command.identity.clone(),
                reason: e.to_string(),
            })?;
        args.push("-cp".into());
        args.push(classpath);
    }
    if let Some(entry_point) = &command.entry_point {
        args.push(entry_point.into());
    }
    args.push(properties_file.as_os_str().to_os_string());

    let mut env = vec![("TMPDIR".to_string(), shared_dir.display().to_string())];
    env.extend(command.env.iter().map(|(k, v)| (k.clone(), v.clone())));

    Ok(Invocation {
        program: command.program.clone(),
        args,
        work_dir: command.work_dir.clone(),
        env,
    })
}

/// Launches real OS processes with merged, drained output.
pub struct ProcessLauncher {
    shared_dir: PathBuf,
    termination_timeout: Duration,
    channels: Arc<dyn SignalChannels>,
    properties_files: Mutex<Vec<PathBuf>>,
}

impl ProcessLauncher {
    pub fn new(context: &SupervisorContext, channels: Arc<dyn SignalChannels>) -> Self {
        Self {
            shared_dir: context.shared_dir().to_path_buf(),
            termination_timeout: context.termination_timeout(),
            channels,
            properties_files: Mutex::new(Vec::new()),
        }
    }

    /// Write the temporary properties file handed to the child.
    ///
    /// Free-form arguments come first; the reserved keys always carry the
    /// supervisor's values.
    pub fn write_properties(&self, command: &CommandDescriptor) -> io::Result<PathBuf> {
        let identity = &command.identity;
        let mut file = tempfile::Builder::new()
            .prefix("process-")
            .suffix(".properties")
            .tempfile_in(&self.shared_dir)?;

        writeln!(
            file,
            "# Temporary properties file for command [{}]",
            identity.key()
        )?;
        for (key, value) in &command.arguments {
            if is_reserved(key) {
                warn!(process = %identity, key, "ignoring reserved property in arguments");
                continue;
            }
            writeln!(file, "{}={}", key, escape_value(value))?;
        }
        writeln!(file, "{PROPERTY_PROCESS_KEY}={}", escape_value(identity.key()))?;
        writeln!(file, "{PROPERTY_PROCESS_INDEX}={}", identity.slot())?;
        writeln!(
            file,
            "{PROPERTY_TERMINATION_TIMEOUT}={}",
            self.termination_timeout.as_millis()
        )?;
        writeln!(
            file,
            "{PROPERTY_SHARED_PATH}={}",
            escape_value(&self.shared_dir.display().to_string())
        )?;
        file.flush()?;

        let (_, path) = file.keep().map_err(|e| e.error)?;
        self.properties_files
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(path.clone());
        Ok(path)
    }

    fn spawn(&self, command: &CommandDescriptor) -> Result<ManagedProcess, LaunchError> {
        let identity = &command.identity;

        let channel = self
            .channels
            .create_after_clean(identity.slot())
            .map_err(|source| LaunchError::SignalChannel {
                identity: identity.clone(),
                source,
            })?;

        let properties_file =
            self.write_properties(command)
                .map_err(|source| LaunchError::PropertiesFile {
                    identity: identity.clone(),
                    dir: self.shared_dir.clone(),
                    source,
                })?;

        let invocation = build_invocation(command, &properties_file, &self.shared_dir)?;
        info!(
            "Launch process[{}]: {}",
            identity.key(),
            invocation.command_line()
        );

        let pipe_error = |source| LaunchError::OutputPipe {
            identity: identity.clone(),
            source,
        };
        let (reader, writer) = output_pipe().map_err(pipe_error)?;
        let stderr_writer = writer.try_clone().map_err(pipe_error)?;

        let mut os_command = invocation.to_command();
        os_command
            .stdin(Stdio::null())
            .stdout(Stdio::from(writer))
            .stderr(Stdio::from(stderr_writer));

        let child = os_command.spawn().map_err(|source| LaunchError::Spawn {
            identity: identity.clone(),
            program: invocation.program.clone(),
            source,
        })?;
        // The command holds our copies of the write end; EOF only arrives once
        // they are gone.
        drop(os_command);

        let handle = UnixProcess::new(child);
        let drain = match OutputDrain::spawn(identity.key(), File::from(reader)) {
            Ok(drain) => drain,
            Err(source) => {
                if let Err(e) = handle.send_termination_signal() {
                    warn!(process = %identity, error = %e, "failed to kill partially started process");
                }
                // Reap it so no zombie is left behind
                if let Err(e) = handle.wait_for_exit() {
                    warn!(process = %identity, error = %e, "failed to reap partially started process");
                }
                return Err(LaunchError::OutputDrain {
                    identity: identity.clone(),
                    source,
                });
            }
        };

        Ok(ManagedProcess::new(
            identity.clone(),
            Box::new(handle),
            channel,
            Some(drain),
        ))
    }
}

impl Launcher for ProcessLauncher {
    fn launch(&self, command: &CommandDescriptor) -> Result<ManagedProcess, LaunchError> {
        self.spawn(command).inspect_err(|e| {
            error!(process = %command.identity, error = %e, "Fail to launch");
            // A slot that could not be allocated has nothing to lower
            if !matches!(e, LaunchError::SignalChannel { .. }) {
                if let Err(e) = self.channels.reset(command.identity.slot()) {
                    warn!(process = %command.identity, error = %e, "failed to reset signal slot");
                }
            }
        })
    }

    fn close(&self) {
        let files = std::mem::take(
            &mut *self
                .properties_files
                .lock()
                .unwrap_or_else(|e| e.into_inner()),
        );
        for path in files {
            if let Err(e) = std::fs::remove_file(&path) {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %e, "failed to remove properties file");
                }
            }
        }
        if let Err(e) = self.channels.close() {
            warn!(error = %e, "failed to release signal channels");
        }
    }
}

/// Pipe whose ends are not inherited by unrelated children.
fn output_pipe() -> io::Result<(OwnedFd, OwnedFd)> {
    let (reader, writer) = nix::unistd::pipe()?;
    for fd in [&reader, &writer] {
        fcntl(fd, FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC))?;
    }
    Ok((reader, writer))
}

fn is_reserved(key: &str) -> bool {
    matches!(
        key,
        PROPERTY_PROCESS_KEY
            | PROPERTY_PROCESS_INDEX
            | PROPERTY_TERMINATION_TIMEOUT
            | PROPERTY_SHARED_PATH
    )
}

fn escape_value(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
}
