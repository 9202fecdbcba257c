use super::wire::{parse_line, AgentLine, AgentOutput, AgentRequest, ParsedLine};
use super::ProgressSender;
use crate::config::CommandSpec;
use crate::error::{ConfigError, ProviderError};
use crate::session::Context;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::time::timeout as tokio_timeout;
use tracing::debug;

/// Spawns one agent process per call and speaks the JSON-lines protocol with it.
///
/// The child is killed when the call's future is dropped, so cancelling a
/// phase never leaves an agent running in the background.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    binary: PathBuf,
    args: Vec<String>,
    env: HashMap<String, String>,
    working_dir: Option<PathBuf>,
    timeout: Option<Duration>,
    instructions: String,
}

impl CommandRunner {
    pub fn from_spec(spec: &CommandSpec, default_prompt: &str) -> Result<Self, ConfigError> {
        let instructions = match &spec.prompt_file {
            Some(path) => std::fs::read_to_string(path).map_err(|e| ConfigError::PromptFile {
                path: path.clone(),
                source: e,
            })?,
            None => default_prompt.to_string(),
        };

        Ok(Self {
            binary: spec.binary.clone(),
            args: spec.args.clone(),
            env: spec.env.clone(),
            working_dir: spec.working_dir.clone(),
            timeout: spec.timeout_sec.map(Duration::from_secs),
            instructions,
        })
    }

    pub async fn invoke(
        &self,
        task: &str,
        context: &Context,
        input: Value,
        progress: Option<&ProgressSender>,
    ) -> Result<AgentOutput, ProviderError> {
        let request = AgentRequest {
            task,
            instructions: &self.instructions,
            context,
            input,
        };

        match self.timeout {
            Some(limit) => tokio_timeout(limit, self.run(&request, progress))
                .await
                .map_err(|_| ProviderError::Timeout(limit))?,
            None => self.run(&request, progress).await,
        }
    }

    async fn run(
        &self,
        request: &AgentRequest<'_>,
        progress: Option<&ProgressSender>,
    ) -> Result<AgentOutput, ProviderError> {
        let payload =
            serde_json::to_vec(request).map_err(|e| ProviderError::Protocol(e.to_string()))?;

        // Plain command names go through PATH lookup
        let binary_str = self.binary.to_string_lossy();
        let mut cmd = if binary_str.contains('/') || binary_str.contains('\\') {
            Command::new(&self.binary)
        } else {
            Command::new(binary_str.as_ref())
        };

        cmd.args(&self.args)
            .envs(&self.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        debug!("Spawning {} for task {}", binary_str, request.task);
        let mut child = cmd.spawn()?;

        // Written concurrently with reading stdout so large requests cannot
        // deadlock against an agent that echoes while it reads
        let stdin_task = child.stdin.take().map(|mut stdin| {
            tokio::spawn(async move {
                let written = stdin.write_all(&payload).await;
                drop(stdin);
                written
            })
        });

        let stderr_task = child.stderr.take().map(|mut stderr| {
            tokio::spawn(async move {
                let mut buf = String::new();
                let _ = stderr.read_to_string(&mut buf).await;
                buf
            })
        });

        let mut result: Option<Value> = None;
        let mut agent_error: Option<String> = None;
        let mut raw = String::new();

        if let Some(stdout) = child.stdout.take() {
            let mut lines = BufReader::new(stdout).lines();
            while let Some(line) = lines.next_line().await? {
                match parse_line(&line) {
                    ParsedLine::Message(AgentLine::Progress { message }) => match progress {
                        Some(progress) => progress.send(message),
                        None => debug!("{}: {}", request.task, message),
                    },
                    ParsedLine::Message(AgentLine::Result { data }) => result = Some(data),
                    ParsedLine::Message(AgentLine::Error { message }) => {
                        agent_error = Some(message)
                    }
                    ParsedLine::Raw(text) => {
                        raw.push_str(&text);
                        raw.push('\n');
                    }
                }
            }
        }

        let status = child.wait().await?;

        if let Some(task) = stdin_task {
            match task.await {
                // An agent that ignores its input may exit before reading it
                Ok(Err(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                    debug!("{} closed stdin early", binary_str);
                }
                Ok(Err(e)) => return Err(ProviderError::Io(e)),
                Ok(Ok(())) | Err(_) => {}
            }
        }

        let stderr = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        if !status.success() {
            return Err(ProviderError::NonZeroExit {
                code: status.code().unwrap_or(-1),
                stderr: stderr.trim().to_string(),
            });
        }

        if let Some(message) = agent_error {
            return Err(ProviderError::Failed(message));
        }

        Ok(match result {
            Some(data) => AgentOutput::Structured(data),
            None => AgentOutput::Raw(raw),
        })
    }
}
