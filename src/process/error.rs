use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::models::ProcessIdentity;

/// Why a launch did not produce a running child.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("Failed to allocate signal slot for {identity}")]
    SignalChannel {
        identity: ProcessIdentity,
        #[source]
        source: io::Error,
    },

    #[error("Cannot write temporary settings for {identity} to {}", .dir.display())]
    PropertiesFile {
        identity: ProcessIdentity,
        dir: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid classpath for {identity}: {reason}")]
    Classpath {
        identity: ProcessIdentity,
        reason: String,
    },

    #[error("Failed to create output pipe for {identity}")]
    OutputPipe {
        identity: ProcessIdentity,
        #[source]
        source: io::Error,
    },

    #[error("Failed to spawn {identity} ({})", .program.display())]
    Spawn {
        identity: ProcessIdentity,
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to start output drain for {identity}")]
    OutputDrain {
        identity: ProcessIdentity,
        #[source]
        source: io::Error,
    },
}

impl LaunchError {
    pub fn identity(&self) -> &ProcessIdentity {
        match self {
            LaunchError::SignalChannel { identity, .. }
            | LaunchError::PropertiesFile { identity, .. }
            | LaunchError::Classpath { identity, .. }
            | LaunchError::OutputPipe { identity, .. }
            | LaunchError::Spawn { identity, .. }
            | LaunchError::OutputDrain { identity, .. } => identity,
        }
    }
}
