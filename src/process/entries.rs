//! Fixed-layout records produced by system snapshots

use crate::core::types::{NativeResult, ProcessId, ThreadId};
use serde::Serialize;

/// One process from a process snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessEntry {
    pub pid: ProcessId,
    pub parent_pid: ProcessId,
    pub thread_count: u32,
    pub base_priority: i32,
    pub name: String,
}

impl ProcessEntry {
    /// Case-insensitive comparison against the image name
    pub fn name_matches(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// One thread from a thread snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThreadEntry {
    pub tid: ThreadId,
    pub owner_pid: ProcessId,
    pub base_priority: i32,
}

/// One loaded module from a module snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleEntry {
    pub pid: ProcessId,
    pub name: String,
    pub path: String,
    pub base_address: usize,
    pub size: u32,
}

impl ModuleEntry {
    pub fn name_matches(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    pub fn contains_address(&self, address: usize) -> bool {
        address >= self.base_address && address - self.base_address < self.size as usize
    }
}

/// Drain a process sequence, keeping entries whose name matches.
///
/// The first failed step aborts the search.
pub fn filter_by_name<I>(entries: I, name: &str) -> NativeResult<Vec<ProcessEntry>>
where
    I: IntoIterator<Item = NativeResult<ProcessEntry>>,
{
    let mut matches = Vec::new();
    for entry in entries {
        let entry = entry?;
        if entry.name_matches(name) {
            matches.push(entry);
        }
    }
    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::NativeError;

    fn process(pid: u32, name: &str) -> ProcessEntry {
        ProcessEntry {
            pid,
            parent_pid: 0,
            thread_count: 1,
            base_priority: 8,
            name: name.to_string(),
        }
    }

    #[test]
    fn test_name_matches_ignores_case() {
        let entry = process(4, "System");
        assert!(entry.name_matches("system"));
        assert!(entry.name_matches("SYSTEM"));
        assert!(!entry.name_matches("sys"));
    }

    #[test]
    fn test_filter_by_name() {
        let entries = vec![
            Ok(process(4, "System")),
            Ok(process(812, "svchost.exe")),
            Ok(process(990, "SvcHost.exe")),
        ];
        let found = filter_by_name(entries, "svchost.exe").unwrap();
        let pids: Vec<u32> = found.iter().map(|e| e.pid).collect();
        assert_eq!(pids, vec![812, 990]);
    }

    #[test]
    fn test_filter_by_name_stops_on_error() {
        let entries = vec![Ok(process(4, "System")), Err(NativeError::EnumerationAborted)];
        assert!(filter_by_name(entries, "System").is_err());
    }

    #[test]
    fn test_module_contains_address() {
        let module = ModuleEntry {
            pid: 100,
            name: "ntdll.dll".to_string(),
            path: "C:\\Windows\\System32\\ntdll.dll".to_string(),
            base_address: 0x7FF0_0000,
            size: 0x1000,
        };
        assert!(module.contains_address(0x7FF0_0000));
        assert!(module.contains_address(0x7FF0_0FFF));
        assert!(!module.contains_address(0x7FF0_1000));
        assert!(!module.contains_address(0x10));
        assert!(module.name_matches("NTDLL.DLL"));
    }

    #[test]
    fn test_entry_serializes() {
        let json = serde_json::to_value(process(4, "System")).unwrap();
        assert_eq!(json["pid"], 4);
        assert_eq!(json["name"], "System");
    }
}
