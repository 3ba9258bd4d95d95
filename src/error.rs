//! Error type for the Launchpad core.
//!
//! Protocol noise is never an error here: malformed or unexpected frames are
//! dropped by the handshake. These variants cover the boundaries only.

use thiserror::Error;

use crate::combination::InstanceId;

#[derive(Error, Debug)]
pub enum SurfaceError {
    #[error("MIDI transport: {0}")]
    Transport(String),

    #[error("unknown surface instance {0}")]
    UnknownInstance(InstanceId),

    #[error("surface instance {0} is already registered")]
    DuplicateInstance(InstanceId),

    #[error("invalid response table: {0}")]
    ResponseTable(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SurfaceError>;
