use std::io::{ErrorKind, Read};
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub argv: Vec<String>,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("refusing to run an empty argument vector")]
    EmptyArgv,
    #[error("binary `{binary}` was not found")]
    MissingBinary { binary: String },
    #[error("failed to run `{command}`: {source}")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{command}` timed out after {timeout_ms}ms")]
    Timeout { command: String, timeout_ms: u64 },
    #[error("`{command}` exited with code {exit_code}: {stderr}")]
    NonZeroExit {
        command: String,
        exit_code: i32,
        stderr: String,
    },
}

pub trait CommandRunner {
    fn run(&self, argv: &[String], timeout: Duration) -> Result<CommandOutput, ProcessError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, argv: &[String], timeout: Duration) -> Result<CommandOutput, ProcessError> {
        run_bounded(argv, timeout)
    }
}

pub fn command_form(argv: &[String]) -> String {
    argv.join(" ")
}

const DRAIN_GRACE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

type Chunk = (Stream, Vec<u8>);

#[derive(Default)]
struct Captured {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

fn spawn_reader<R: Read + Send + 'static>(mut source: R, stream: Stream, tx: Sender<Chunk>) {
    thread::spawn(move || {
        let mut buf = [0u8; 4096];
        loop {
            match source.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if tx.send((stream, buf[..n].to_vec())).is_err() {
                        break;
                    }
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(_) => break,
            }
        }
    });
}

fn drain_until(rx: &Receiver<Chunk>, deadline: Instant) -> Captured {
    let mut captured = Captured::default();
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(remaining) {
            Ok((Stream::Stdout, bytes)) => captured.stdout.extend(bytes),
            Ok((Stream::Stderr, bytes)) => captured.stderr.extend(bytes),
            Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                tracing::debug!("output pipes still open at deadline; not waiting further");
                break;
            }
        }
    }
    captured
}

fn kill_group(child: &mut Child) {
    // the child leads its own process group, so this reaches every descendant it spawned
    let pgid = child.id() as libc::pid_t;
    let killed = unsafe { libc::killpg(pgid, libc::SIGKILL) } == 0;
    if !killed {
        let _ = child.kill();
    }
    let _ = child.wait();
}

/// Runs `argv` directly (never through a shell) in its own process group. The whole group is
/// killed once `timeout` elapses, and the call never waits on output past the deadline.
pub fn run_bounded(argv: &[String], timeout: Duration) -> Result<CommandOutput, ProcessError> {
    let Some((binary, args)) = argv.split_first() else {
        return Err(ProcessError::EmptyArgv);
    };
    let command_text = command_form(argv);

    let mut command = Command::new(binary);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .process_group(0);

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Err(ProcessError::MissingBinary {
                binary: binary.clone(),
            })
        }
        Err(source) => {
            return Err(ProcessError::Io {
                command: command_text,
                source,
            })
        }
    };

    let (tx, rx) = mpsc::channel();
    match (child.stdout.take(), child.stderr.take()) {
        (Some(stdout), Some(stderr)) => {
            spawn_reader(stdout, Stream::Stdout, tx.clone());
            spawn_reader(stderr, Stream::Stderr, tx);
        }
        _ => {
            kill_group(&mut child);
            return Err(ProcessError::Io {
                command: command_text,
                source: std::io::Error::other("missing output pipes"),
            });
        }
    }

    let deadline = Instant::now() + timeout;
    let exit_status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if Instant::now() >= deadline {
                    kill_group(&mut child);
                    drain_until(&rx, Instant::now() + DRAIN_GRACE);
                    return Err(ProcessError::Timeout {
                        command: command_text,
                        timeout_ms: timeout.as_millis() as u64,
                    });
                }
                thread::sleep(Duration::from_millis(10));
            }
            Err(source) => {
                kill_group(&mut child);
                return Err(ProcessError::Io {
                    command: command_text,
                    source,
                });
            }
        }
    };

    let captured = drain_until(&rx, deadline.max(Instant::now() + DRAIN_GRACE));
    let stdout = String::from_utf8_lossy(&captured.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&captured.stderr).into_owned();

    if !exit_status.success() {
        return Err(ProcessError::NonZeroExit {
            command: command_text,
            exit_code: exit_status.code().unwrap_or(-1),
            stderr: stderr.trim().to_string(),
        });
    }

    Ok(CommandOutput {
        argv: argv.to_vec(),
        exit_code: exit_status.code(),
        stdout,
        stderr,
    })
}
