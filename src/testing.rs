//! In-process fakes for the process runner and blob store

use crate::process::{ProcessError, ProcessOutput, ProcessRunner};
use crate::storage::{BlobStore, ContainerProperties, StorageError};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{TimeZone, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

type Script = dyn Fn(&str, &[String]) -> Result<ProcessOutput, ProcessError> + Send + Sync;

/// Process runner answering from a closure and recording every call
pub struct FakeRunner {
    script: Box<Script>,
    calls: Mutex<Vec<(String, Vec<String>)>>,
}

impl FakeRunner {
    pub fn new<F>(script: F) -> Self
    where
        F: Fn(&str, &[String]) -> Result<ProcessOutput, ProcessError> + Send + Sync + 'static,
    {
        Self {
            script: Box::new(script),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, program: &str) -> usize {
        self.calls().iter().filter(|(p, _)| p == program).count()
    }
}

#[async_trait]
impl ProcessRunner for FakeRunner {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        _timeout: Duration,
    ) -> Result<ProcessOutput, ProcessError> {
        self.calls
            .lock()
            .unwrap()
            .push((program.to_string(), args.to_vec()));
        (self.script)(program, args)
    }
}

pub fn exit_ok(stdout: &str) -> Result<ProcessOutput, ProcessError> {
    Ok(ProcessOutput {
        code: Some(0),
        stdout: stdout.to_string(),
        stderr: String::new(),
    })
}

pub fn exit_fail(code: i32, stderr: &str) -> Result<ProcessOutput, ProcessError> {
    Ok(ProcessOutput {
        code: Some(code),
        stdout: String::new(),
        stderr: stderr.to_string(),
    })
}

pub fn timed_out(program: &str) -> Result<ProcessOutput, ProcessError> {
    Err(ProcessError::Timeout {
        program: program.to_string(),
        timeout: Duration::from_secs(30),
    })
}

/// Value following `flag` in an argument list
pub fn arg_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

/// Blob store keeping objects in memory
pub struct MemoryBlobStore {
    account: String,
    blobs: Mutex<HashMap<(String, String), Vec<u8>>>,
    fail_writes: AtomicBool,
    deny_access: AtomicBool,
}

impl MemoryBlobStore {
    pub fn new(account: &str) -> Self {
        Self {
            account: account.to_string(),
            blobs: Mutex::new(HashMap::new()),
            fail_writes: AtomicBool::new(false),
            deny_access: AtomicBool::new(false),
        }
    }

    /// Make every write fail as if the backend were down
    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    /// Make every call fail as if the credentials were rejected
    pub fn deny_access(&self) {
        self.deny_access.store(true, Ordering::SeqCst);
    }

    pub fn blob(&self, container: &str, name: &str) -> Option<Vec<u8>> {
        self.blobs
            .lock()
            .unwrap()
            .get(&(container.to_string(), name.to_string()))
            .cloned()
    }

    pub fn blob_count(&self) -> usize {
        self.blobs.lock().unwrap().len()
    }

    fn check_access(&self) -> Result<(), StorageError> {
        if self.deny_access.load(Ordering::SeqCst) {
            return Err(StorageError::Unauthorized {
                status: 403,
                detail: "signature mismatch".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    fn account_name(&self) -> &str {
        &self.account
    }

    fn blob_url(&self, container: &str, blob: &str) -> String {
        format!(
            "https://{}.blob.core.windows.net/{}/{}",
            self.account, container, blob
        )
    }

    async fn put_blob(
        &self,
        container: &str,
        blob: &str,
        _content_type: &str,
        data: Bytes,
    ) -> Result<(), StorageError> {
        self.check_access()?;
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Unreachable("connection refused".into()));
        }
        self.blobs
            .lock()
            .unwrap()
            .insert((container.to_string(), blob.to_string()), data.to_vec());
        Ok(())
    }

    async fn container_properties(
        &self,
        _container: &str,
    ) -> Result<ContainerProperties, StorageError> {
        self.check_access()?;
        Ok(ContainerProperties {
            last_modified: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        })
    }
}
