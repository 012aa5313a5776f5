//! "List all processes and their token privileges"
//!
//! Walks a process snapshot, then opens each process and its token in
//! parallel. A process that cannot be inspected still appears in the
//! report, carrying the error instead of privileges.

use super::entries::{ProcessEntry, ThreadEntry};
use super::privileges::{privilege_name, PrivilegeSession, SkippedPrivilege, Token};
use super::toolhelp;
use crate::config::Config;
use crate::core::types::{
    ErrorKind, NativeError, NativeResult, ObjectKind, PrivilegeState, ProcessId,
};
use crate::security::access::{process_rights, token_rights, AccessDescriptor};
use crate::windows::bindings::kernel32::open_process;
use crate::windows::query::{GrowingBufferQuery, TokenInfo, TokenInfoClass};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Serialize)]
pub struct PrivilegeReport {
    pub name: String,
    pub state: PrivilegeState,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessReport {
    pub pid: ProcessId,
    pub parent_pid: ProcessId,
    pub name: String,
    pub thread_count: u32,
    pub elevated: Option<bool>,
    pub privileges: Vec<PrivilegeReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threads: Option<Vec<ThreadEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InspectionReport {
    pub granted: Vec<String>,
    pub skipped: Vec<SkippedPrivilege>,
    pub processes: Vec<ProcessReport>,
    pub failures: usize,
}

struct TokenSummary {
    elevated: Option<bool>,
    privileges: Vec<PrivilegeReport>,
}

fn read_token(pid: ProcessId, query: &GrowingBufferQuery) -> NativeResult<TokenSummary> {
    let process_access =
        AccessDescriptor::validate(process_rights::QUERY_LIMITED_INFORMATION, ObjectKind::Process)?;
    let token_access = AccessDescriptor::validate(token_rights::QUERY, ObjectKind::Token)?;

    let process = open_process(pid, &process_access)?;
    let token = Token::open_for_process(&process, &token_access)?;

    let privileges = token
        .privileges(query)?
        .into_iter()
        .map(|entry| {
            Ok(PrivilegeReport {
                name: privilege_name(entry.luid, query)?,
                state: entry.state(),
            })
        })
        .collect::<NativeResult<Vec<_>>>()?;
    let elevated = elevation(token.query(TokenInfoClass::Elevation, query)?)?;

    Ok(TokenSummary {
        elevated: Some(elevated),
        privileges,
    })
}

fn elevation(info: TokenInfo) -> NativeResult<bool> {
    match info {
        TokenInfo::Elevated(elevated) => Ok(elevated),
        other => Err(NativeError::MalformedPayload {
            class: "TokenElevation",
            reason: format!("decoded as {:?}", other),
        }),
    }
}

fn inspect_one(
    entry: &ProcessEntry,
    query: &GrowingBufferQuery,
    threads: Option<&HashMap<ProcessId, Vec<ThreadEntry>>>,
) -> ProcessReport {
    let mut report = ProcessReport {
        pid: entry.pid,
        parent_pid: entry.parent_pid,
        name: entry.name.clone(),
        thread_count: entry.thread_count,
        elevated: None,
        privileges: Vec::new(),
        threads: threads.map(|all| all.get(&entry.pid).cloned().unwrap_or_default()),
        error: None,
        error_kind: None,
    };

    match read_token(entry.pid, query) {
        Ok(summary) => {
            report.elevated = summary.elevated;
            report.privileges = summary.privileges;
        }
        Err(e) => {
            debug!(pid = entry.pid, error = %e, "process not inspectable");
            report.error_kind = Some(e.kind());
            report.error = Some(e.to_string());
        }
    }
    report
}

fn collect_threads() -> NativeResult<HashMap<ProcessId, Vec<ThreadEntry>>> {
    let mut by_owner: HashMap<ProcessId, Vec<ThreadEntry>> = HashMap::new();
    for thread in toolhelp::threads(None)? {
        let thread = thread?;
        by_owner.entry(thread.owner_pid).or_default().push(thread);
    }
    Ok(by_owner)
}

/// Inspect every process with the configured privileges enabled
pub fn inspect_processes(config: &Config) -> NativeResult<InspectionReport> {
    let query = GrowingBufferQuery::from_config(&config.query);
    let own_access = AccessDescriptor::validate(
        token_rights::QUERY | token_rights::ADJUST_PRIVILEGES,
        ObjectKind::Token,
    )?;
    let own_token = Token::open_current(&own_access)?;
    let names: Vec<&str> = config.privileges.request.iter().map(String::as_str).collect();

    let inspect = |session: &mut PrivilegeSession<Token>| -> NativeResult<InspectionReport> {
        for skipped in session.skipped() {
            warn!(privilege = %skipped.name, kind = %skipped.kind, "privilege not available");
        }

        let mut entries = toolhelp::processes()?.collect::<NativeResult<Vec<_>>>()?;
        if let Some(max) = config.enumeration.max_processes {
            entries.truncate(max);
        }
        let threads = if config.enumeration.include_threads {
            Some(collect_threads()?)
        } else {
            None
        };

        let processes: Vec<ProcessReport> = entries
            .par_iter()
            .map(|entry| inspect_one(entry, &query, threads.as_ref()))
            .collect();
        let failures = processes.iter().filter(|p| p.error.is_some()).count();
        info!(processes = processes.len(), failures, "inspection complete");

        Ok(InspectionReport {
            granted: session.grants().iter().map(|g| g.name.clone()).collect(),
            skipped: session.skipped().to_vec(),
            processes,
            failures,
        })
    };
    let (result, release) = PrivilegeSession::scoped(own_token, &names, inspect);

    for (name, code) in &release.failed {
        warn!(privilege = %name, %code, "privilege left enabled");
    }
    result
}
