//! Kernel and subsystem object kinds

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of object a native handle refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Process,
    Thread,
    Token,
    Job,
    Service,
    Section,
    Event,
    Semaphore,
    Mutex,
    File,
    RegistryKey,
    /// ToolHelp snapshot; not a securable object
    Snapshot,
}

impl ObjectKind {
    pub const ALL: [ObjectKind; 12] = [
        ObjectKind::Process,
        ObjectKind::Thread,
        ObjectKind::Token,
        ObjectKind::Job,
        ObjectKind::Service,
        ObjectKind::Section,
        ObjectKind::Event,
        ObjectKind::Semaphore,
        ObjectKind::Mutex,
        ObjectKind::File,
        ObjectKind::RegistryKey,
        ObjectKind::Snapshot,
    ];

    /// Objects that can be waited on with a timeout
    pub fn is_waitable(&self) -> bool {
        matches!(
            self,
            ObjectKind::Process
                | ObjectKind::Thread
                | ObjectKind::Job
                | ObjectKind::Event
                | ObjectKind::Semaphore
                | ObjectKind::Mutex
                | ObjectKind::File
        )
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ObjectKind::Process => "process",
            ObjectKind::Thread => "thread",
            ObjectKind::Token => "token",
            ObjectKind::Job => "job",
            ObjectKind::Service => "service",
            ObjectKind::Section => "section",
            ObjectKind::Event => "event",
            ObjectKind::Semaphore => "semaphore",
            ObjectKind::Mutex => "mutex",
            ObjectKind::File => "file",
            ObjectKind::RegistryKey => "registry key",
            ObjectKind::Snapshot => "snapshot",
        };
        f.write_str(s)
    }
}
