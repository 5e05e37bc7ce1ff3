use anyhow::{anyhow, Context, Result};
use cfg_synth::{Image, Language, PerKind, Program, Status, Symbol, Value};
use serde::{Deserialize, Serialize};
use subprocess::{ExitStatus, Popen, PopenConfig, Redirection};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::{fs, io, time::Duration};

/// How long a worker that already closed its stdout gets to exit.
const REAP_GRACE: Duration = Duration::from_secs(1);

/// What the parent hands a worker: the depth budget and a snapshot of the
/// program, bound AST included.
#[derive(Debug, Serialize, Deserialize)]
pub struct Job<S> {
    pub max_depth: usize,
    pub image: Image<S>,
}

/// The command line that starts a worker; the job path is appended.
#[derive(Clone, Debug)]
pub struct Worker {
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl Worker {
    pub fn new<P, I, A>(program: P, args: I) -> Self
    where
        P: Into<PathBuf>,
        I: IntoIterator<Item = A>,
        A: Into<OsString>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Re-invoke the running binary as `<exe> worker <job>`.
    pub fn current_exe() -> Result<Self> {
        let exe = std::env::current_exe().context("Unable to locate the running executable.")?;
        Ok(Self::new(exe, ["worker"]))
    }

    fn argv(&self, job: &Path) -> Vec<OsString> {
        let mut argv = Vec::with_capacity(self.args.len() + 2);
        argv.push(self.program.clone().into_os_string());
        argv.extend(self.args.iter().cloned());
        argv.push(job.as_os_str().to_owned());
        argv
    }
}

/// A running worker. Dropping a `Popen` waits for the child, so a worker
/// still alive when the guard drops is killed first.
struct Reaper(Popen);

impl Drop for Reaper {
    fn drop(&mut self) {
        if self.0.poll().is_none() {
            let _ = self.0.kill();
            let _ = self.0.wait_timeout(REAP_GRACE);
        }
        self.0.detach();
    }
}

/// Validate a timeout in seconds: finite and strictly positive.
pub fn time_limit(timeout: f64) -> Result<Duration> {
    if !timeout.is_finite() || timeout <= 0.0 {
        return Err(anyhow!("Timeout must be a positive number of seconds, got {}.", timeout));
    }
    Duration::try_from_secs_f64(timeout).map_err(|e| anyhow!("Bad timeout {}: {}", timeout, e))
}

/// run a program's bound AST for a bounded number of seconds
///
/// # Arguments
/// - `program`: slots and candidate AST; the AST is read from `program.block`
/// - `worker`: how to start the process that interprets the job
/// - `timeout`: seconds before the worker is killed
/// - `max_depth`: recursion budget of the interpreter inside the worker
///
/// # Notes
/// The worker reports output values as TOML on stdout; stderr is captured
/// and only surfaces in debug logs. Outputs are copied back only when the
/// worker exits cleanly within the time limit. No worker outlives this call.
///
/// # Returns
/// `Status::Finished` if the outputs were updated, `Status::Stopped` if the
/// worker timed out, failed or printed something unparseable. The same
/// status is stored in `program.status`; it is `Stopped` when an error is
/// returned.
pub fn run_for_time<S: Symbol>(
    program: &mut Program<S>,
    worker: &Worker,
    timeout: f64,
    max_depth: usize,
) -> Result<Status> {
    let limit = time_limit(timeout)?;
    program.status = Status::Running;
    match supervise(program, worker, limit, max_depth) {
        Ok(status) => {
            program.status = status;
            Ok(status)
        }
        Err(e) => {
            program.status = Status::Stopped;
            Err(e)
        }
    }
}

fn supervise<S: Symbol>(
    program: &mut Program<S>,
    worker: &Worker,
    limit: Duration,
    max_depth: usize,
) -> Result<Status> {
    let job = Job {
        max_depth,
        image: program.image(),
    };

    // We dump the job to a temporary file
    let file = NamedTempFile::new()?;
    fs::write(&file, toml::to_string(&job)?)?;

    let argv = worker.argv(file.path());
    let mut p = Reaper(
        Popen::create(
            &argv[..],
            PopenConfig {
                stdout: Redirection::Pipe,
                stderr: Redirection::Pipe,
                ..Default::default()
            },
        )
        .with_context(|| format!("Unable to start worker {}.", worker.program.display()))?,
    );

    let read = p.0.communicate_start(None).limit_time(limit).read_string();

    let status = match read {
        Ok((stdout, stderr)) => match p.0.wait_timeout(REAP_GRACE)? {
            Some(ExitStatus::Exited(0)) => {
                let outputs = stdout
                    .as_deref()
                    .ok_or_else(|| anyhow!("Worker stdout was not captured."))
                    .and_then(|out| Ok(toml::from_str::<PerKind<Vec<Value>>>(out)?));
                match outputs.and_then(|o| Ok(program.load_outputs(&o)?)) {
                    Ok(()) => Status::Finished,
                    Err(e) => {
                        warn!(error = %e, "worker produced unusable output");
                        Status::Stopped
                    }
                }
            }
            Some(exit) => {
                debug!(?exit, stderr = stderr.as_deref().unwrap_or(""), "worker failed");
                Status::Stopped
            }
            None => {
                debug!("worker closed its output but did not exit");
                Status::Stopped
            }
        },
        Err(err) => {
            if err.error.kind() == io::ErrorKind::TimedOut {
                debug!(timeout = limit.as_secs_f64(), "worker timed out");
            } else {
                warn!(error = %err.error, "lost contact with worker");
            }
            Status::Stopped
        }
    };

    // the reaper kills anything still running
    Ok(status)
}

/// Worker side: interpret the job at `path` and render the output slots.
///
/// Interpreter errors, depth exhaustion included, propagate so the worker
/// exits non-zero and the parent records the run as stopped.
pub fn serve<L: Language>(language: &L, path: &Path) -> Result<String> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Unable to read job {}.", path.display()))?;
    let job: Job<L::Sym> = toml::from_str(&text)?;
    let mut program = Program::from_image(job.image)?;
    if let Some(block) = program.block.take() {
        let mut rng = rand::rng();
        language.interpret(&block, &mut program, &mut rng, job.max_depth)?;
        program.block = Some(block);
    }
    program.status = Status::Finished;
    Ok(toml::to_string(&program.output_values())?)
}
