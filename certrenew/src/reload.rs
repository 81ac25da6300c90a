use anyhow::{bail, Context, Result};
use enum_dispatch::enum_dispatch;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::info;

#[enum_dispatch]
pub(crate) trait Reload {
    /// Ask the running server to re-read its certificates.
    ///
    /// Fails if the reload command cannot be spawned or exits non-zero.
    async fn reload(&self) -> Result<()>;
}

/// How the web server gets reloaded after renewal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[enum_dispatch(Reload)]
#[serde(rename_all = "lowercase")]
pub enum Reloader {
    /// Run the reload command inside a docker container.
    Docker(DockerReload),
    /// Run a shell command on the host.
    Hook(HookReload),
}

impl Reloader {
    /// Reload nginx running in `container`.
    pub fn docker(container: impl Into<String>) -> Self {
        Self::Docker(DockerReload {
            container: container.into(),
            command: default_reload_command(),
        })
    }

    /// Reload by running `command` through `/bin/sh -c`.
    pub fn hook(command: impl Into<String>) -> Self {
        Self::Hook(HookReload {
            command: command.into(),
        })
    }

    /// Ask the running server to re-read its certificates.
    ///
    /// ```
    /// # #[tokio::main]
    /// # async fn main() -> anyhow::Result<()> {
    /// certrenew::Reloader::hook("true").reload().await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn reload(&self) -> Result<()> {
        Reload::reload(self).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DockerReload {
    /// Name of the container running the server
    pub container: String,
    /// Command executed in the container
    #[serde(default = "default_reload_command")]
    pub command: Vec<String>,
}

fn default_reload_command() -> Vec<String> {
    ["nginx", "-s", "reload"].map(String::from).to_vec()
}

impl DockerReload {
    /// Arguments passed to the `docker` binary.
    pub fn docker_args(&self) -> Vec<String> {
        let mut args = vec!["exec".to_string(), self.container.clone()];
        args.extend(self.command.iter().cloned());
        args
    }
}

impl Reload for DockerReload {
    async fn reload(&self) -> Result<()> {
        info!("reloading container {}", self.container);
        let args = self.docker_args();
        let mut command = Command::new("docker");
        command.args(&args);
        run(command, &format!("docker {}", args.join(" "))).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookReload {
    /// Shell command to run
    pub command: String,
}

impl Reload for HookReload {
    async fn reload(&self) -> Result<()> {
        info!("running reload hook");
        let mut command = Command::new("/bin/sh");
        command.arg("-c").arg(&self.command);
        run(command, &self.command).await
    }
}

async fn run(mut command: Command, display: &str) -> Result<()> {
    let status = command
        .status()
        .await
        .with_context(|| format!("failed to run `{display}`"))?;
    if !status.success() {
        bail!("`{display}` failed with status: {status}");
    }
    Ok(())
}
