use std::future::Future;
use std::path::Path;
use std::process::Stdio;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;

use crate::err::Error;

/// Face comparison between a stored reference photo and a freshly submitted one.
pub trait FaceVerifier: Send + Sync + 'static {
    /// Loads whatever the comparison needs before the first request arrives.
    fn preload(&self) -> impl Future<Output = anyhow::Result<()>> + Send;

    fn verify(
        &self,
        reference: &Path,
        candidate: &Path,
    ) -> impl Future<Output = Result<bool, Error>> + Send;
}

pub fn verification_failed<S: std::fmt::Display>(reason: S) -> Error {
    Error::VerificationFailed {
        detail: format!("Face verification failed: {}", reason),
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Verdict {
    pub verified: bool,
    #[serde(default)]
    pub distance: Option<f64>,
    #[serde(default)]
    pub threshold: Option<f64>,
}

/// Talks to a long-lived comparison worker that keeps the face model in memory.
///
/// The worker is started as `<program> --model <model> --enforce-detection false` and speaks
/// JSON lines. It prints `{"ready": true}` once the model is loaded, then answers every
/// `{"reference": "...", "candidate": "..."}` request with one line: either
/// `{"verified": bool, "distance": f64, "threshold": f64}` or `{"error": "..."}`.
/// Faces that are not cleanly detected are compared anyway instead of failing the request.
#[derive(Debug)]
pub struct CommandVerifier {
    program: String,
    model: String,
    worker: Mutex<Option<Worker>>,
}

#[derive(Debug)]
struct Worker {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
}

#[derive(Debug, Deserialize)]
struct Ready {
    ready: bool,
}

#[derive(Debug, Serialize)]
struct Comparison<'a> {
    reference: &'a Path,
    candidate: &'a Path,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Reply {
    Verdict(Verdict),
    Failure { error: String },
}

impl CommandVerifier {
    pub fn new<P: Into<String>, M: Into<String>>(program: P, model: M) -> Self {
        Self {
            program: program.into(),
            model: model.into(),
            worker: Mutex::new(None),
        }
    }

    pub fn worker_args(&self) -> Vec<String> {
        vec![
            "--model".into(),
            self.model.clone(),
            "--enforce-detection".into(),
            "false".into(),
        ]
    }

    async fn spawn(&self) -> anyhow::Result<Worker> {
        let mut child = Command::new(&self.program)
            .args(self.worker_args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Could not start face comparison worker {}", self.program))?;
        let stdin = child.stdin.take().context("Comparison worker has no stdin")?;
        let stdout = child.stdout.take().context("Comparison worker has no stdout")?;
        let mut stdout = BufReader::new(stdout).lines();

        let line = stdout.next_line().await?.with_context(|| {
            format!("Comparison worker exited before loading model {}", self.model)
        })?;
        let ready: Ready = serde_json::from_str(&line)
            .with_context(|| format!("Unexpected greeting from comparison worker: {}", line))?;
        if !ready.ready {
            anyhow::bail!("Comparison worker could not load model {}", self.model);
        }
        log::info!("Face model {} loaded by {}", self.model, self.program);
        Ok(Worker {
            child,
            stdin,
            stdout,
        })
    }
}

impl Worker {
    async fn compare(&mut self, reference: &Path, candidate: &Path) -> std::io::Result<Reply> {
        let mut request = serde_json::to_vec(&Comparison {
            reference,
            candidate,
        })?;
        request.push(b'\n');
        self.stdin.write_all(&request).await?;
        self.stdin.flush().await?;

        match self.stdout.next_line().await? {
            Some(line) => Ok(serde_json::from_str(&line)?),
            None => {
                let status = self.child.wait().await?;
                Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!("comparison worker exited with {}", status),
                ))
            }
        }
    }
}

impl FaceVerifier for CommandVerifier {
    async fn preload(&self) -> anyhow::Result<()> {
        let mut worker = self.worker.lock().await;
        if worker.is_none() {
            log::info!("Preloading face model {} via {}", self.model, self.program);
            *worker = Some(self.spawn().await?);
        }
        Ok(())
    }

    async fn verify(&self, reference: &Path, candidate: &Path) -> Result<bool, Error> {
        let mut worker = self.worker.lock().await;
        if worker.is_none() {
            log::warn!("Comparison worker is not running, starting a new one");
            *worker = Some(self.spawn().await.map_err(verification_failed)?);
        }
        let running = worker
            .as_mut()
            .ok_or_else(|| verification_failed("comparison worker unavailable"))?;

        let reply = match running.compare(reference, candidate).await {
            Ok(reply) => reply,
            Err(err) => {
                log::error!("Comparison worker failed: {}", err);
                *worker = None;
                return Err(verification_failed(err));
            }
        };
        let verdict = match reply {
            Reply::Verdict(verdict) => verdict,
            Reply::Failure { error } => return Err(verification_failed(error)),
        };
        log::debug!(
            "Compared {} against {}: verified={} distance={:?} threshold={:?}",
            candidate.display(),
            reference.display(),
            verdict.verified,
            verdict.distance,
            verdict.threshold
        );
        Ok(verdict.verified)
    }
}
