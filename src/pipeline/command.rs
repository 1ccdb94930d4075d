//! External compiler subprocess - pipes a script through a command

use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Default compile command: ES2015 down to ES5 with babel
pub const DEFAULT_COMPILER: &[&str] = &["babel", "--presets", "es2015", "--no-babelrc"];

/// Client for running a source-to-source compiler as a subprocess
#[derive(Debug, Clone)]
pub struct CommandCompiler {
    /// Program followed by its arguments
    command: Vec<String>,

    /// Timeout for one invocation in seconds
    timeout_secs: u64,
}

impl CommandCompiler {
    /// Create a new compiler client
    ///
    /// # Arguments
    /// * `command` - Program and arguments, e.g. `["babel", "--presets", "es2015"]`
    /// * `timeout_secs` - Timeout for a single invocation in seconds
    pub fn new(command: Vec<String>, timeout_secs: u64) -> Self {
        Self {
            command,
            timeout_secs,
        }
    }

    pub fn command(&self) -> &[String] {
        &self.command
    }

    /// Compile one source text
    ///
    /// The source is written to the command's stdin and its stdout is the
    /// compiled result.
    ///
    /// # Errors
    /// Returns a message if:
    /// - The command is empty or cannot be spawned
    /// - The command exits with a non-zero status
    /// - The output is not valid UTF-8
    /// - The command times out
    pub async fn compile(&self, source: &str) -> Result<String, String> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| "empty compiler command".to_string())?;

        debug!("Spawning {} with {} bytes of input", program, source.len());

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| format!("Failed to execute {}: {}", program, e))?;

        // Feed stdin from its own task so a child filling its stdout pipe
        // cannot deadlock against us
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| format!("{} has no stdin", program))?;
        let input = source.as_bytes().to_vec();
        let feeder = tokio::spawn(async move {
            let result = stdin.write_all(&input).await;
            drop(stdin);
            result
        });

        let output = timeout(Duration::from_secs(self.timeout_secs), child.wait_with_output())
            .await
            .map_err(|_| format!("{} timed out after {} seconds", program, self.timeout_secs))?
            .map_err(|e| format!("Failed to wait for {}: {}", program, e))?;

        if let Ok(Err(e)) = feeder.await {
            warn!("Could not write all input to {}: {}", program, e);
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let exit_code = output.status.code().unwrap_or(-1);
            return Err(format!(
                "{} exited with code {}: {}",
                program,
                exit_code,
                stderr.trim()
            ));
        }

        String::from_utf8(output.stdout)
            .map_err(|e| format!("Failed to decode {} output: {}", program, e))
    }
}

impl Default for CommandCompiler {
    fn default() -> Self {
        Self::new(DEFAULT_COMPILER.iter().map(|s| s.to_string()).collect(), 120)
    }
}
