use std::collections::VecDeque;
use std::io::{BufRead, BufReader, ErrorKind as IoErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command as ProcessCommand, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::backends::wire::{self, ErrorKind, Request, Response};
use crate::engine::{Engine, EngineError};
use crate::model::{Command, Model, Outcome, SolveOptions};
use crate::reporter::{NullReporter, Reporter};

/// Default bridge program looked up on `PATH`.
pub const DEFAULT_BRIDGE_PROGRAM: &str = "modelrun-alloy-bridge";

const STDERR_TAIL_LINES: usize = 20;
const STDERR_SETTLE: Duration = Duration::from_millis(50);
const EXIT_GRACE: Duration = Duration::from_millis(200);

/// How to launch the engine bridge process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    pub program: String,
    pub args: Vec<String>,
}

impl BridgeConfig {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BRIDGE_PROGRAM)
    }
}

/// Engine backed by a long-lived bridge process.
///
/// The process is started lazily on the first `parse`. A timed-out or
/// misbehaving process is killed; the next `solve` starts a fresh one and
/// reloads the model before continuing.
pub struct BridgeEngine {
    config: BridgeConfig,
    session: Option<Session>,
    loaded: Option<PathBuf>,
}

impl BridgeEngine {
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            config,
            session: None,
            loaded: None,
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    fn session(&mut self) -> Result<&mut Session, EngineError> {
        if self.session.is_none() {
            self.session = Some(Session::spawn(&self.config)?);
            self.loaded = None;
        }
        self.session
            .as_mut()
            .ok_or_else(|| EngineError::Protocol("engine session unavailable".into()))
    }

    fn shutdown(&mut self) {
        if self.session.take().is_some() {
            debug!(program = %self.config.program, "engine session discarded");
        }
        self.loaded = None;
    }

    fn load(
        &mut self,
        path: &Path,
        reporter: &mut dyn Reporter,
    ) -> Result<Vec<Command>, EngineError> {
        let path_text = path.to_string_lossy();
        let result = self.session()?.request(
            &Request::Parse { path: &path_text },
            None,
            reporter,
        );
        match result {
            Ok(Response::Parsed { commands }) => {
                self.loaded = Some(path.to_path_buf());
                Ok(commands.into_iter().map(Command::from).collect())
            }
            Ok(Response::Error {
                kind: ErrorKind::Parse,
                message,
            }) => Err(EngineError::Parse(message)),
            Ok(Response::Error {
                kind: ErrorKind::Fault,
                message,
            }) => Err(EngineError::Fault(message)),
            Ok(other) => {
                self.shutdown();
                Err(EngineError::Protocol(format!(
                    "unexpected `{}` response to parse",
                    other.name()
                )))
            }
            Err(err) => {
                self.shutdown();
                Err(err)
            }
        }
    }

    fn ensure_loaded(&mut self, model: &Model) -> Result<(), EngineError> {
        if self.session.is_some() && self.loaded.as_deref() == Some(model.path()) {
            return Ok(());
        }
        debug!(model = %model.path().display(), "reloading model into a fresh engine session");
        let commands = self
            .load(model.path(), &mut NullReporter)
            .map_err(|err| match err {
                EngineError::Parse(message) => {
                    EngineError::Fault(format!("model no longer parses: {message}"))
                }
                other => other,
            })?;
        if commands.len() != model.commands().len() {
            self.shutdown();
            return Err(EngineError::Protocol(format!(
                "reloaded model declares {} commands, expected {}",
                commands.len(),
                model.commands().len()
            )));
        }
        Ok(())
    }
}

impl Engine for BridgeEngine {
    fn parse(&mut self, path: &Path, reporter: &mut dyn Reporter) -> Result<Model, EngineError> {
        let commands = self.load(path, reporter)?;
        Ok(Model::new(path, commands))
    }

    fn solve(
        &mut self,
        model: &Model,
        command: &Command,
        options: &SolveOptions,
        reporter: &mut dyn Reporter,
    ) -> Result<Outcome, EngineError> {
        self.ensure_loaded(model)?;
        let request = Request::Solve {
            command: command.ordinal,
            solver: &options.solver,
        };
        let result = self.session()?.request(&request, options.timeout, reporter);
        match result {
            Ok(Response::Solved {
                satisfiable: true,
                instance,
            }) => Ok(Outcome::sat(command, instance.unwrap_or_default())),
            Ok(Response::Solved {
                satisfiable: false,
                instance,
            }) => {
                if instance.is_some() {
                    debug!(
                        command = %command.label,
                        "ignoring instance attached to unsatisfiable outcome"
                    );
                }
                Ok(Outcome::unsat(command))
            }
            Ok(Response::Error { message, .. }) => Err(EngineError::Fault(message)),
            Ok(other) => {
                self.shutdown();
                Err(EngineError::Protocol(format!(
                    "unexpected `{}` response to solve",
                    other.name()
                )))
            }
            Err(err) => {
                if matches!(err, EngineError::Timeout(_)) {
                    warn!(command = %command.label, "solve timed out; restarting engine");
                }
                self.shutdown();
                Err(err)
            }
        }
    }
}

struct Session {
    program: String,
    child: Child,
    stdin: ChildStdin,
    lines: Receiver<std::io::Result<String>>,
    stderr_tail: Arc<Mutex<VecDeque<String>>>,
}

impl Session {
    fn spawn(config: &BridgeConfig) -> Result<Self, EngineError> {
        let mut child = ProcessCommand::new(&config.program)
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| EngineError::Spawn {
                program: config.program.clone(),
                source,
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| EngineError::Protocol("failed to capture engine stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EngineError::Protocol("failed to capture engine stdout".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| EngineError::Protocol("failed to capture engine stderr".into()))?;

        // Reading happens off-thread so a blocking read can be bounded by
        // `recv_timeout`.
        let (tx, lines) = mpsc::channel();
        thread::Builder::new()
            .name("engine-stdout".into())
            .spawn(move || {
                for line in BufReader::new(stdout).lines() {
                    let failed = line.is_err();
                    if tx.send(line).is_err() || failed {
                        break;
                    }
                }
            })?;

        let stderr_tail = Arc::new(Mutex::new(VecDeque::with_capacity(STDERR_TAIL_LINES)));
        let tail = Arc::clone(&stderr_tail);
        thread::Builder::new()
            .name("engine-stderr".into())
            .spawn(move || {
                for line in BufReader::new(stderr).lines().map_while(Result::ok) {
                    debug!("engine stderr: {line}");
                    if let Ok(mut tail) = tail.lock() {
                        if tail.len() == STDERR_TAIL_LINES {
                            tail.pop_front();
                        }
                        tail.push_back(line);
                    }
                }
            })?;

        info!(program = %config.program, pid = child.id(), "engine session started");
        Ok(Self {
            program: config.program.clone(),
            child,
            stdin,
            lines,
            stderr_tail,
        })
    }

    fn request(
        &mut self,
        request: &Request<'_>,
        timeout: Option<Duration>,
        reporter: &mut dyn Reporter,
    ) -> Result<Response, EngineError> {
        let line = wire::encode_request(request)
            .map_err(|e| EngineError::Protocol(format!("cannot encode request: {e}")))?;
        debug!(request = %line, "engine request");
        if let Err(err) = writeln!(self.stdin, "{line}").and_then(|()| self.stdin.flush()) {
            return Err(if err.kind() == IoErrorKind::BrokenPipe {
                self.closed()
            } else {
                EngineError::Io(err)
            });
        }

        let deadline =
            timeout.and_then(|limit| Instant::now().checked_add(limit).map(|at| (limit, at)));
        loop {
            let next = match deadline {
                Some((limit, at)) => {
                    let remaining = at.saturating_duration_since(Instant::now());
                    match self.lines.recv_timeout(remaining) {
                        Ok(line) => line,
                        Err(RecvTimeoutError::Timeout) => return Err(EngineError::Timeout(limit)),
                        Err(RecvTimeoutError::Disconnected) => return Err(self.closed()),
                    }
                }
                None => match self.lines.recv() {
                    Ok(line) => line,
                    Err(_) => return Err(self.closed()),
                },
            };
            let line = next?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            debug!(response = %trimmed, "engine response");
            let response = wire::decode_response(trimmed).map_err(|e| {
                EngineError::Protocol(format!(
                    "unreadable engine response `{trimmed}`: {e}{}",
                    self.stderr_context()
                ))
            })?;
            match response {
                Response::Warning { message } => reporter.on_warning(&message),
                terminal => return Ok(terminal),
            }
        }
    }

    fn closed(&self) -> EngineError {
        // Let the stderr reader drain what the dying process printed.
        thread::sleep(STDERR_SETTLE);
        EngineError::Protocol(format!(
            "engine `{}` closed its output{}",
            self.program,
            self.stderr_context()
        ))
    }

    fn stderr_context(&self) -> String {
        let tail = self
            .stderr_tail
            .lock()
            .map(|tail| tail.iter().cloned().collect::<Vec<_>>())
            .unwrap_or_default();
        if tail.is_empty() {
            String::new()
        } else {
            format!("; stderr: {}", tail.join(" | "))
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Ok(line) = wire::encode_request(&Request::Exit) {
            let _ = writeln!(self.stdin, "{line}");
            let _ = self.stdin.flush();
        }
        let deadline = Instant::now() + EXIT_GRACE;
        while Instant::now() < deadline {
            match self.child.try_wait() {
                Ok(Some(_)) => return,
                Ok(None) => thread::sleep(Duration::from_millis(10)),
                Err(_) => break,
            }
        }
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
