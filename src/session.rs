//! Browser session lifecycle
//!
//! A `Session` owns one Chrome process end to end: launch with automation
//! flags suppressed, an attached default page, and teardown that reaps the
//! process and its temporary profile directory. Close is idempotent and
//! every launch failure path cleans up after itself, so a failed launch
//! never leaks a Chrome process.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::cdp::{find_chrome, launch_chrome, Connection, Transport};
use crate::error::Result;
use crate::page::Page;
use crate::proxy::{parse_proxy, ProxyDescriptor};

static SESSION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Launch configuration for a browser session.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    /// Run without a visible window
    pub headless: bool,
    /// Proxy URL (`scheme://[user:pass@]host:port`). Malformed values are
    /// logged and ignored rather than failing the launch.
    pub proxy_url: Option<String>,
    /// Explicit Chrome binary path; otherwise well-known locations are
    /// probed
    pub chrome_path: Option<String>,
    pub viewport_width: u32,
    pub viewport_height: u32,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            headless: true,
            proxy_url: None,
            chrome_path: None,
            viewport_width: 1920,
            viewport_height: 1080,
        }
    }
}

impl LaunchOptions {
    pub fn headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn proxy_url(mut self, url: impl Into<String>) -> Self {
        self.proxy_url = Some(url.into());
        self
    }

    pub fn chrome_path(mut self, path: impl Into<String>) -> Self {
        self.chrome_path = Some(path.into());
        self
    }

    pub fn viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport_width = width;
        self.viewport_height = height;
        self
    }

    fn launch_args(&self, user_data_dir: &Path, proxy: &Option<ProxyDescriptor>) -> Vec<String> {
        let mut args = vec![
            format!("--user-data-dir={}", user_data_dir.display()),
            format!(
                "--window-size={},{}",
                self.viewport_width, self.viewport_height
            ),
            // Hide the plainest automation signals.
            "--disable-blink-features=AutomationControlled".to_string(),
            "--no-first-run".to_string(),
            "--no-default-browser-check".to_string(),
            "--disable-background-networking".to_string(),
            "--disable-sync".to_string(),
            "--disable-translate".to_string(),
            "--disable-popup-blocking".to_string(),
            "--disable-infobars".to_string(),
            "--no-sandbox".to_string(),
            "--disable-dev-shm-usage".to_string(),
            "--disable-gpu".to_string(),
            "--mute-audio".to_string(),
        ];
        if self.headless {
            args.push("--headless=new".to_string());
        }
        if let Some(proxy) = proxy {
            args.push(format!("--proxy-server={}", proxy.server));
        }
        args
    }
}

/// An isolated browser session with one attached page.
pub struct Session {
    connection: Connection,
    page: Page,
    target_id: String,
    proxy: Option<ProxyDescriptor>,
    user_data_dir: PathBuf,
    closed: bool,
}

impl Session {
    /// Launch Chrome with default options
    pub async fn launch() -> Result<Self> {
        Self::launch_with(LaunchOptions::default()).await
    }

    /// Launch Chrome, connect over CDP and attach to a fresh page target.
    pub async fn launch_with(options: LaunchOptions) -> Result<Self> {
        let proxy = options.proxy_url.as_deref().and_then(parse_proxy);

        let id = SESSION_COUNTER.fetch_add(1, Ordering::Relaxed);
        let user_data_dir = std::env::temp_dir().join(format!(
            "skulk-profile-{}-{}",
            std::process::id(),
            id
        ));
        std::fs::create_dir_all(&user_data_dir)?;

        let chrome = match &options.chrome_path {
            Some(path) => PathBuf::from(path),
            None => find_chrome()?,
        };
        tracing::info!(chrome = %chrome.display(), headless = options.headless, "Launching browser");

        let args = options.launch_args(&user_data_dir, &proxy);
        let (child, ws_url) = match launch_chrome(&chrome, &args) {
            Ok(launched) => launched,
            Err(e) => {
                let _ = std::fs::remove_dir_all(&user_data_dir);
                return Err(e);
            }
        };
        // connect() reaps the child itself when the handshake fails.
        let transport = match Transport::connect(child, &ws_url) {
            Ok(transport) => transport,
            Err(e) => {
                let _ = std::fs::remove_dir_all(&user_data_dir);
                return Err(e);
            }
        };

        let connection = Connection::new(transport);
        match Self::attach_page(&connection).await {
            Ok((page, target_id)) => {
                tracing::info!(target_id, "Session ready");
                Ok(Self {
                    connection,
                    page,
                    target_id,
                    proxy,
                    user_data_dir,
                    closed: false,
                })
            }
            Err(e) => {
                let _ = connection.close().await;
                let _ = std::fs::remove_dir_all(&user_data_dir);
                Err(e)
            }
        }
    }

    async fn attach_page(connection: &Connection) -> Result<(Page, String)> {
        let version = connection.version().await?;
        tracing::info!(product = %version.product, "Connected to browser");

        let target_id = connection.create_target("about:blank").await?;
        let session = connection.attach_to_target(&target_id).await?;
        session.page_enable().await?;
        Ok((Page::new(session), target_id))
    }

    /// The session's page
    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Proxy in effect for this session, if any
    pub fn proxy(&self) -> Option<&ProxyDescriptor> {
        self.proxy.as_ref()
    }

    /// Shut the browser down and remove the temporary profile. Calling
    /// close again is a no-op.
    pub async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        if let Err(e) = self.connection.close_target(&self.target_id).await {
            tracing::debug!(error = %e, "Target already gone during close");
        }
        let result = self.connection.close().await;

        if let Err(e) = std::fs::remove_dir_all(&self.user_data_dir) {
            tracing::debug!(error = %e, "Could not remove profile directory");
        }
        result
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // The transport kills the process on its own drop; the profile
        // directory is the only thing left to reclaim here.
        if !self.closed {
            let _ = std::fs::remove_dir_all(&self.user_data_dir);
        }
    }
}
