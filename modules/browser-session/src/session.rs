use std::path::PathBuf;
use std::time::Duration;

use chromiumoxide::Browser;
use futures::StreamExt;
use serde::Deserialize;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{BrowserSessionError, Result};
use crate::page::CdpPage;
use crate::profiles;

/// Number of consecutive ports probed when looking for a free debugging port.
const PORT_SCAN_SPAN: u16 = 10;

/// Flags that keep a profile-bound Chrome quiet and stable under automation.
const CHROME_FLAGS: &[&str] = &[
    "--no-first-run",
    "--no-default-browser-check",
    "--no-sandbox",
    "--disable-dev-shm-usage",
    "--disable-gpu",
    "--disable-extensions",
    "--disable-sync",
    "--disable-background-networking",
    "--disable-background-timer-throttling",
    "--disable-backgrounding-occluded-windows",
    "--disable-renderer-backgrounding",
    "--disable-client-side-phishing-detection",
    "--disable-default-apps",
    "--disable-hang-monitor",
    "--disable-popup-blocking",
    "--disable-prompt-on-repost",
    "--disable-translate",
    "--no-pings",
    "--new-window",
];

#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub chrome_bin: String,
    pub user_data_dir: PathBuf,
    pub profile_dir: String,
    pub start_port: u16,
    pub headless: bool,
    pub verify_attempts: u32,
    pub verify_interval: Duration,
    pub nav_timeout: Duration,
    pub settle: Duration,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            chrome_bin: "google-chrome-stable".to_string(),
            user_data_dir: profiles::default_user_data_dir().unwrap_or_default(),
            profile_dir: "Profile 1".to_string(),
            start_port: 9224,
            headless: false,
            verify_attempts: 8,
            verify_interval: Duration::from_millis(1500),
            nav_timeout: Duration::from_secs(30),
            settle: Duration::from_secs(2),
        }
    }
}

/// First port in `start..start + PORT_SCAN_SPAN` nothing is listening on.
pub fn find_available_port(start: u16) -> Result<u16> {
    let end = start.saturating_add(PORT_SCAN_SPAN);
    (start..end)
        .find(|port| std::net::TcpListener::bind(("127.0.0.1", *port)).is_ok())
        .ok_or(BrowserSessionError::NoFreePort { start, end })
}

#[derive(Debug, Deserialize)]
struct VersionInfo {
    #[serde(rename = "webSocketDebuggerUrl")]
    web_socket_debugger_url: String,
}

/// Poll `{endpoint}/json/version` until Chrome answers, returning its
/// browser-level websocket URL.
pub async fn verify_debugger(endpoint: &str, attempts: u32, interval: Duration) -> Result<String> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(3))
        .build()
        .map_err(|e| BrowserSessionError::Launch(e.to_string()))?;
    let url = format!("{}/json/version", endpoint.trim_end_matches('/'));

    for attempt in 1..=attempts.max(1) {
        match client.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => match resp.json::<VersionInfo>().await {
                Ok(info) => {
                    info!(endpoint, attempt, "Chrome debugging endpoint reachable");
                    return Ok(info.web_socket_debugger_url);
                }
                Err(e) => debug!(attempt, error = %e, "Unexpected /json/version payload"),
            },
            Ok(resp) => debug!(attempt, status = %resp.status(), "Debugger not ready"),
            Err(e) => debug!(attempt, error = %e, "Debugger not reachable yet"),
        }
        if attempt < attempts {
            tokio::time::sleep(interval).await;
        }
    }

    Err(BrowserSessionError::DebuggerUnreachable {
        endpoint: endpoint.to_string(),
        attempts,
    })
}

/// A Chrome instance bound to one signed-in profile.
///
/// Launched sessions own the child process and the temp profile copy;
/// attached sessions own neither. `shutdown` releases everything owned.
pub struct ProfileSession {
    browser: Browser,
    handler: JoinHandle<()>,
    child: Option<Child>,
    profile_copy: Option<tempfile::TempDir>,
    nav_timeout: Duration,
    settle: Duration,
}

impl ProfileSession {
    /// Launch Chrome on a temp copy of `opts.profile_dir` and connect over CDP.
    pub async fn launch(opts: &LaunchOptions) -> Result<Self> {
        let port = find_available_port(opts.start_port)?;

        let copy = tempfile::Builder::new()
            .prefix("salesflow-chrome-")
            .tempdir()?;
        let copied = profiles::copy_profile(&opts.user_data_dir, &opts.profile_dir, copy.path())?;
        info!(
            profile = %opts.profile_dir,
            files = copied,
            dir = %copy.path().display(),
            "Prepared profile copy"
        );

        let mut cmd = Command::new(&opts.chrome_bin);
        cmd.arg(format!("--remote-debugging-port={port}"))
            .arg(format!("--user-data-dir={}", copy.path().display()))
            .arg(format!("--profile-directory={}", opts.profile_dir))
            .args(CHROME_FLAGS)
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true);
        if opts.headless {
            cmd.arg("--headless=new");
        }
        let mut child = cmd
            .spawn()
            .map_err(|e| BrowserSessionError::Launch(format!("{}: {e}", opts.chrome_bin)))?;
        info!(port, pid = child.id(), "Chrome started");

        let endpoint = format!("http://127.0.0.1:{port}");
        let ws_url =
            match verify_debugger(&endpoint, opts.verify_attempts, opts.verify_interval).await {
                Ok(url) => url,
                Err(e) => {
                    let _ = child.kill().await;
                    return Err(e);
                }
            };

        let mut session = Self::connect(&ws_url, opts.nav_timeout, opts.settle).await?;
        session.child = Some(child);
        session.profile_copy = Some(copy);
        Ok(session)
    }

    /// Resolve the profile signed in as `email`, then launch it.
    pub async fn launch_for_email(email: &str, opts: &LaunchOptions) -> Result<Self> {
        let profile = profiles::find_profile_by_email(&opts.user_data_dir, email)?;
        info!(email, profile = %profile.directory, "Resolved Chrome profile");
        let opts = LaunchOptions {
            profile_dir: profile.directory,
            ..opts.clone()
        };
        Self::launch(&opts).await
    }

    /// Attach to a Chrome that is already running with remote debugging.
    /// Accepts either `http://host:port` or a `ws://` browser URL.
    pub async fn attach(debug_url: &str, opts: &LaunchOptions) -> Result<Self> {
        let ws_url = if debug_url.starts_with("ws://") || debug_url.starts_with("wss://") {
            debug_url.to_string()
        } else {
            verify_debugger(debug_url, opts.verify_attempts, opts.verify_interval).await?
        };
        Self::connect(&ws_url, opts.nav_timeout, opts.settle).await
    }

    async fn connect(ws_url: &str, nav_timeout: Duration, settle: Duration) -> Result<Self> {
        let (browser, mut handler) = Browser::connect(ws_url).await?;
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });
        Ok(Self {
            browser,
            handler,
            child: None,
            profile_copy: None,
            nav_timeout,
            settle,
        })
    }

    pub async fn new_page(&self) -> Result<CdpPage> {
        let page = self.browser.new_page("about:blank").await?;
        Ok(CdpPage::new(page, self.nav_timeout, self.settle))
    }

    /// Close the browser and release the process and temp profile.
    /// Teardown problems are logged, never returned.
    pub async fn shutdown(mut self) {
        if self.child.is_some() {
            if let Err(e) = self.browser.close().await {
                debug!(error = %e, "Browser.close failed");
            }
        }
        self.handler.abort();

        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill().await {
                warn!(error = %e, "Failed to kill Chrome");
            }
        }
        if let Some(copy) = self.profile_copy.take() {
            let path = copy.path().display().to_string();
            if let Err(e) = copy.close() {
                warn!(dir = %path, error = %e, "Failed to remove profile copy");
            }
        }
        info!("Browser session closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn skips_ports_already_bound() {
        let held = std::net::TcpListener::bind(("127.0.0.1", 0)).unwrap();
        let taken = held.local_addr().unwrap().port();
        let port = find_available_port(taken).unwrap();
        assert_ne!(port, taken);
        assert!(port > taken && port < taken + PORT_SCAN_SPAN);
    }

    #[tokio::test]
    async fn verify_returns_websocket_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/json/version"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "Browser": "Chrome/126.0",
                "webSocketDebuggerUrl": "ws://127.0.0.1:9224/devtools/browser/abc"
            })))
            .mount(&server)
            .await;

        let ws = verify_debugger(&server.uri(), 2, Duration::ZERO).await.unwrap();
        assert_eq!(ws, "ws://127.0.0.1:9224/devtools/browser/abc");
    }

    #[tokio::test]
    async fn verify_gives_up_after_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let err = verify_debugger(&server.uri(), 3, Duration::ZERO).await.unwrap_err();
        assert!(matches!(
            err,
            BrowserSessionError::DebuggerUnreachable { attempts: 3, .. }
        ));
    }
}
