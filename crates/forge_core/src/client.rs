use crate::codec::request_to_wire;
use crate::config::ClientConfig;
use crate::protocol::{ErrorCode, VerificationResult};
use crate::spec::VerificationRequest;
use serde_json::Value;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};
use wait_timeout::ChildExt;

/// Characters of the request kept in a timeout error.
const INPUT_PREVIEW_CHARS: usize = 200;

/// Every way a verification round trip can fail to produce a result.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Verification engine not found at {path}. {hint}")]
    ExecutableNotFound { path: PathBuf, hint: String },

    #[error("Failed to start verification engine {executable}: {source}")]
    Spawn {
        executable: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("I/O error talking to verification engine: {0}")]
    Io(#[from] io::Error),

    #[error("Verification timed out after {timeout:?} (pid {pid}); input: {input}")]
    Timeout {
        timeout: Duration,
        input: String,
        pid: u32,
    },

    #[error("Verification engine exited with {} and no parseable output: {stderr}", describe_exit(*exit_code))]
    Execution { exit_code: Option<i32>, stderr: String },

    #[error("Verification engine returned invalid JSON: {error}")]
    MalformedResponse { raw: String, error: String },

    #[error("Verification engine response does not match the result schema: {error}")]
    SchemaMismatch { raw: String, error: String },
}

fn describe_exit(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("code {code}"),
        None => "a signal".to_string(),
    }
}

impl BridgeError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            BridgeError::Timeout { .. } => ErrorCode::TimeoutError,
            BridgeError::MalformedResponse { .. } => ErrorCode::ParseError,
            BridgeError::ExecutableNotFound { .. }
            | BridgeError::Spawn { .. }
            | BridgeError::Io(_)
            | BridgeError::Execution { .. }
            | BridgeError::SchemaMismatch { .. } => ErrorCode::InternalError,
        }
    }

    fn summary(&self) -> &'static str {
        match self {
            BridgeError::ExecutableNotFound { .. } => "Verification engine not found",
            BridgeError::Spawn { .. } => "Verification engine could not be started",
            BridgeError::Io(_) => "I/O failure during verification",
            BridgeError::Timeout { .. } => "Verification timed out",
            BridgeError::Execution { .. } => "Verification engine crashed",
            BridgeError::MalformedResponse { .. } => "Verification engine returned invalid JSON",
            BridgeError::SchemaMismatch { .. } => "Verification engine returned an unexpected response",
        }
    }

    /// Folds the error into the structured result callers receive from `verify`.
    pub fn into_result(self) -> VerificationResult {
        VerificationResult::failure(self.error_code(), self.summary(), self.to_string())
    }
}

/// Talks to an external verification engine over stdin/stdout, one process
/// per request. Requests are never retried.
#[derive(Debug, Clone)]
pub struct VerificationClient {
    config: ClientConfig,
}

impl VerificationClient {
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Fails early when the configured executable is a path that does not exist.
    /// Bare program names are left to `PATH` lookup at spawn time.
    pub fn check_executable(&self) -> Result<(), BridgeError> {
        let path = &self.config.executable;
        if path.components().count() > 1 && !path.is_file() {
            return Err(self.not_found());
        }
        Ok(())
    }

    fn not_found(&self) -> BridgeError {
        BridgeError::ExecutableNotFound {
            path: self.config.executable.clone(),
            hint: self
                .config
                .build_hint
                .clone()
                .unwrap_or_else(|| "Check the configured executable path.".to_string()),
        }
    }

    /// Always returns a result; transport failures carry their error code.
    pub fn verify(&self, request: &VerificationRequest) -> VerificationResult {
        self.run(request).unwrap_or_else(BridgeError::into_result)
    }

    pub fn run(&self, request: &VerificationRequest) -> Result<VerificationResult, BridgeError> {
        self.check_executable()?;
        let payload = request_to_wire(request);
        let timeout = Duration::from_millis(request.config().timeout_ms);
        self.run_raw(&payload, timeout)
    }

    pub fn verify_raw(&self, payload: &str, timeout: Duration) -> VerificationResult {
        self.run_raw(payload, timeout)
            .unwrap_or_else(BridgeError::into_result)
    }

    /// Sends an already-encoded payload and waits at most `timeout` for the answer.
    pub fn run_raw(&self, payload: &str, timeout: Duration) -> Result<VerificationResult, BridgeError> {
        let mut command = Command::new(&self.config.executable);
        command
            .args(&self.config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &self.config.working_dir {
            command.current_dir(dir);
        }

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            // Own process group, so a timeout can take down everything the engine started.
            command.process_group(0);
        }

        let deadline = Instant::now() + timeout;
        let mut child = command.spawn().map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                self.not_found()
            } else {
                BridgeError::Spawn {
                    executable: self.config.executable.clone(),
                    source,
                }
            }
        })?;
        let pid = child.id();
        info!(pid, executable = %self.config.executable.display(), "verification engine started");

        let (tx, rx) = mpsc::channel();
        let mut pending = 0;
        if let Some(stdout) = child.stdout.take() {
            spawn_reader(stdout, Pipe::Stdout, tx.clone());
            pending += 1;
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_reader(stderr, Pipe::Stderr, tx.clone());
            pending += 1;
        }
        if let Some(mut stdin) = child.stdin.take() {
            let bytes = payload.as_bytes().to_vec();
            let tx = tx.clone();
            // Dropping stdin at the end of the thread closes the pipe.
            thread::spawn(move || {
                let result = match stdin.write_all(&bytes) {
                    Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
                    other => other,
                };
                let _ = tx.send(PipeEvent::Written(result));
            });
            pending += 1;
        }
        drop(tx);

        let status = match child.wait_timeout(timeout) {
            Ok(Some(status)) => status,
            Ok(None) => {
                terminate(&mut child);
                return Err(self.timed_out(payload, timeout, pid));
            }
            Err(e) => {
                terminate(&mut child);
                return Err(BridgeError::Io(e));
            }
        };

        // The engine has exited, but anything it spawned may still hold the pipes open.
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        while pending > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let event = match rx.recv_timeout(remaining) {
                Ok(event) => event,
                Err(RecvTimeoutError::Timeout) => {
                    terminate(&mut child);
                    return Err(self.timed_out(payload, timeout, pid));
                }
                Err(RecvTimeoutError::Disconnected) => {
                    terminate(&mut child);
                    return Err(io::Error::other("verification I/O thread panicked").into());
                }
            };
            pending -= 1;
            let collected = match event {
                PipeEvent::Written(result) => result,
                PipeEvent::Read(Pipe::Stdout, bytes) => bytes.map(|bytes| stdout = bytes),
                PipeEvent::Read(Pipe::Stderr, bytes) => bytes.map(|bytes| stderr = bytes),
            };
            if let Err(e) = collected {
                terminate(&mut child);
                return Err(BridgeError::Io(e));
            }
        }
        // Stragglers that let go of the pipes are not allowed to outlive the request.
        terminate(&mut child);

        let stdout = String::from_utf8_lossy(&stdout).into_owned();
        let stderr = String::from_utf8_lossy(&stderr).into_owned();

        if self.config.log_io {
            debug!(pid, input = payload, "verification request");
            debug!(pid, stdout = %stdout, stderr = %stderr, exit_code = ?status.code(), "verification response");
        }

        self.interpret(status, &stdout, stderr)
    }

    fn timed_out(&self, payload: &str, timeout: Duration, pid: u32) -> BridgeError {
        warn!(pid, ?timeout, "verification engine timed out and was killed");
        BridgeError::Timeout {
            timeout,
            input: payload.chars().take(INPUT_PREVIEW_CHARS).collect(),
            pid,
        }
    }

    fn interpret(
        &self,
        status: ExitStatus,
        stdout: &str,
        stderr: String,
    ) -> Result<VerificationResult, BridgeError> {
        let parsed = parse_response(stdout.trim());
        if status.success() {
            return parsed;
        }
        match parsed {
            Ok(result) => {
                warn!(exit_code = ?status.code(), "verification engine exited non-zero but answered");
                Ok(result)
            }
            Err(_) => Err(BridgeError::Execution {
                exit_code: status.code(),
                stderr,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Pipe {
    Stdout,
    Stderr,
}

enum PipeEvent {
    Written(io::Result<()>),
    Read(Pipe, io::Result<Vec<u8>>),
}

fn spawn_reader<R: Read + Send + 'static>(mut source: R, pipe: Pipe, tx: Sender<PipeEvent>) {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let result = source.read_to_end(&mut buf).map(|_| buf);
        let _ = tx.send(PipeEvent::Read(pipe, result));
    });
}

/// Kills the engine's whole process group, then reaps the engine itself.
fn terminate(child: &mut Child) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;
        if let Ok(pgid) = i32::try_from(child.id()) {
            // ESRCH just means nothing in the group is left.
            let _ = killpg(Pid::from_raw(pgid), Signal::SIGKILL);
        }
    }
    let _ = child.kill();
    let _ = child.wait();
}

fn parse_response(raw: &str) -> Result<VerificationResult, BridgeError> {
    let value: Value = serde_json::from_str(raw).map_err(|e| BridgeError::MalformedResponse {
        raw: raw.to_string(),
        error: e.to_string(),
    })?;
    let result: VerificationResult =
        serde_json::from_value(value).map_err(|e| BridgeError::SchemaMismatch {
            raw: raw.to_string(),
            error: e.to_string(),
        })?;
    if !result.is_well_formed() {
        return Err(BridgeError::SchemaMismatch {
            raw: raw.to_string(),
            error: "response mixes success and error fields".to_string(),
        });
    }
    Ok(result)
}
