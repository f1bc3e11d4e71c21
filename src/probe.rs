//! Reachability probe for validated domains.
//!
//! Runs `ping -c 1 <domain>` with the normalized domain as its own argv
//! element. No shell is involved, and the child is killed and reaped if it
//! outlives the timeout.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

use crate::domain::NormalizedDomain;
use crate::error::Error;

pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

const PING_PROGRAM: &str = "ping";

/// Runs the diagnostic command against a domain.
#[derive(Debug, Clone)]
pub struct Prober {
    program: String,
    timeout: Duration,
}

impl Default for Prober {
    fn default() -> Self {
        Self {
            program: PING_PROGRAM.to_string(),
            timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }
}

impl Prober {
    /// A prober running `program` instead of `ping`.
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    /// Use a different wall-clock limit.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the command line: `<program> -c 1 <domain>`.
    pub fn command(&self, domain: &NormalizedDomain) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-c")
            .arg("1")
            .arg(domain.as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    /// Normalize `input` and probe it, returning the command's stdout.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidDomain`] if the input fails normalization; nothing
    ///   is spawned in that case
    /// - [`Error::ProbeTimeout`] if the command outlives the timeout
    /// - [`Error::Probe`] if it cannot be spawned or exits unsuccessfully
    pub async fn probe(&self, input: &str) -> Result<String, Error> {
        let domain = NormalizedDomain::parse(input)?;
        self.probe_domain(&domain).await
    }

    /// Probe an already normalized domain.
    pub async fn probe_domain(&self, domain: &NormalizedDomain) -> Result<String, Error> {
        let mut child = self.command(domain).spawn().map_err(|e| {
            tracing::error!(domain = %domain, program = %self.program, error = %e, "failed to spawn probe");
            Error::probe_failed(domain.as_str(), format!("failed to spawn: {e}"))
        })?;

        let mut stdout_pipe = child.stdout.take();
        let mut stderr_pipe = child.stderr.take();

        let result = tokio::time::timeout(self.timeout, async {
            let mut stdout = Vec::new();
            let mut stderr = Vec::new();
            tokio::try_join!(
                read_pipe(stdout_pipe.as_mut(), &mut stdout),
                read_pipe(stderr_pipe.as_mut(), &mut stderr),
            )?;
            let status = child.wait().await?;
            Ok::<_, std::io::Error>((status, stdout, stderr))
        })
        .await;

        match result {
            Ok(Ok((status, stdout, stderr))) => {
                if !status.success() {
                    tracing::warn!(
                        domain = %domain,
                        exit_code = ?status.code(),
                        stderr = %String::from_utf8_lossy(&stderr).trim(),
                        "probe failed"
                    );
                    return Err(Error::probe_failed(
                        domain.as_str(),
                        format!("exited with {status}"),
                    ));
                }
                Ok(String::from_utf8_lossy(&stdout).into_owned())
            }
            Ok(Err(e)) => {
                tracing::error!(domain = %domain, error = %e, "I/O error while probing");
                let _ = child.kill().await;
                Err(Error::probe_failed(domain.as_str(), e.to_string()))
            }
            Err(_) => {
                // kill() also waits, so the child is reaped
                let _ = child.kill().await;
                tracing::warn!(domain = %domain, timeout = ?self.timeout, "probe timed out");
                Err(Error::ProbeTimeout {
                    domain: domain.to_string(),
                    timeout: self.timeout,
                })
            }
        }
    }
}

async fn read_pipe<R: AsyncRead + Unpin>(pipe: Option<&mut R>, buf: &mut Vec<u8>) -> std::io::Result<()> {
    if let Some(pipe) = pipe {
        pipe.read_to_end(buf).await?;
    }
    Ok(())
}
