use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::traits::DocumentRenderer;

const RENDER_TIMEOUT: Duration = Duration::from_secs(60);

/// Renders HTML through the `wkhtmltopdf` binary, reading the page from stdin.
pub struct WkhtmlRenderer {
    bin: String,
}

impl WkhtmlRenderer {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }
}

#[async_trait]
impl DocumentRenderer for WkhtmlRenderer {
    async fn render_pdf(&self, html: &str, output: &Path) -> Result<()> {
        let mut child = Command::new(&self.bin)
            .args(["--quiet", "--encoding", "utf-8", "-"])
            .arg(output)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to start {}", self.bin))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(html.as_bytes()).await?;
            stdin.shutdown().await?;
        }

        let result = tokio::time::timeout(RENDER_TIMEOUT, child.wait_with_output())
            .await
            .context("wkhtmltopdf timed out")??;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            bail!("wkhtmltopdf exited with {}: {}", result.status, stderr.trim());
        }
        if !tokio::fs::try_exists(output).await.unwrap_or(false) {
            bail!("wkhtmltopdf produced no file at {}", output.display());
        }
        debug!(path = %output.display(), "PDF rendered");
        Ok(())
    }
}
