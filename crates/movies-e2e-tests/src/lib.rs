use std::time::Duration;

use anyhow::{Result, anyhow};
use movies_app::state::AppState;
use movies_server::config::{Parser, ServerConfig};
use movies_types::claim::{ApiClaim, Role};
use rand::Rng as _;
use reqwest::{
    Url,
    header::{AUTHORIZATION, HeaderMap, HeaderValue},
};
use tempfile::TempDir;
use tokio::sync::oneshot;
use tracing::{debug, error};
use uuid::Uuid;

fn random_port() -> Result<u16> {
    let mut rng = rand::rng();

    let mut retries = 3;
    while retries > 0 {
        let port: u16 = rng.random_range(3030..4030);
        let addr: std::net::SocketAddr = format!("127.0.0.1:{}", port).parse()?;
        match std::net::TcpStream::connect_timeout(&addr, std::time::Duration::from_millis(100)) {
            Err(e) if e.kind() == std::io::ErrorKind::ConnectionRefused => return Ok(port),
            Err(_) => retries -= 1,
            Ok(_) => retries -= 1,
        }
    }

    Err(anyhow!("Could not find a free port"))
}

pub struct ConfigGuard {
    #[allow(dead_code)]
    data_dir: TempDir,
}

pub fn test_config(test_name: &str) -> Result<(ServerConfig, ConfigGuard)> {
    let tmp_data_dir = TempDir::with_prefix(format!("{}_", test_name))?;
    let data_dir = tmp_data_dir.path().to_string_lossy().to_string();
    let port = random_port()?.to_string();
    let args = &[
        "movies-e2e-tests",
        "--data-dir",
        &data_dir,
        "--port",
        &port,
        "--token-validity",
        "10m",
    ];
    let config = ServerConfig::try_parse_from(args)?;
    Ok((
        config,
        ConfigGuard {
            data_dir: tmp_data_dir,
        },
    ))
}

#[derive(Debug, Clone, Copy)]
pub enum TestUser {
    Admin,
    TrustedMember,
    /// Authenticated user without any role
    Member,
}

impl TestUser {
    fn roles(&self) -> Vec<Role> {
        match self {
            TestUser::Admin => vec![Role::Admin],
            TestUser::TrustedMember => vec![Role::TrustedMember],
            TestUser::Member => vec![],
        }
    }
}

/// Running server, stopped when dropped
pub struct TestServer {
    base_url: Url,
    state: AppState,
    shutdown: Option<oneshot::Sender<()>>,
    _config_guard: ConfigGuard,
}

impl TestServer {
    pub fn url(&self, path: &str) -> Url {
        let mut url = self.base_url.clone();
        url.set_path(path);
        url
    }

    pub fn anonymous(&self) -> reqwest::Client {
        reqwest::Client::new()
    }

    /// Client sending bearer token of new random user with roles of `user`
    pub fn client(&self, user: TestUser) -> Result<(reqwest::Client, Uuid)> {
        let user_id = Uuid::new_v4();
        let token = self
            .state
            .tokens()
            .issue(ApiClaim::new_expired(user_id.to_string(), user.roles()))?;
        Ok((client_with_token(&token)?, user_id))
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

pub fn client_with_token(token: &str) -> Result<reqwest::Client> {
    let mut auth = HeaderValue::from_str(&format!("Bearer {token}"))?;
    auth.set_sensitive(true);
    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, auth);
    let client = reqwest::Client::builder().default_headers(headers).build()?;
    Ok(client)
}

pub async fn launch_server(test_name: &str) -> Result<TestServer> {
    let (args, config_guard) = test_config(test_name)?;
    let base_url: Url = format!("http://127.0.0.1:{}", args.port).parse()?;
    let state = movies_server::build_state(&args).await?;

    let (shutdown, shutdown_signal) = oneshot::channel::<()>();
    let server_state = state.clone();
    tokio::spawn(async move {
        let signal = async move {
            shutdown_signal.await.ok();
        };
        if let Err(e) = movies_server::run_graceful_with_state(args, server_state, signal).await {
            error!("Test server failed: {e}");
        }
    });

    let server = TestServer {
        base_url,
        state,
        shutdown: Some(shutdown),
        _config_guard: config_guard,
    };
    wait_for_health(&server).await?;
    Ok(server)
}

async fn wait_for_health(server: &TestServer) -> Result<()> {
    let client = server.anonymous();
    let url = server.url("/health");
    for _ in 0..50 {
        match client.get(url.clone()).send().await {
            Ok(response) if response.status().is_success() => return Ok(()),
            Ok(response) => debug!("Server not ready yet: {}", response.status()),
            Err(e) => debug!("Server not ready yet: {e}"),
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    Err(anyhow!("Server did not start"))
}
