use std::sync::Arc;

use reqwest::StatusCode;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::{
    error::{ClipstitchError, Result},
    transport::HttpSend,
    types::{ClipSource, DateWindow},
};

const DEFAULT_AUTH_BASE_URL: &str = "https://id.twitch.tv";
const DEFAULT_API_BASE_URL: &str = "https://api.twitch.tv/helix";

#[derive(Debug, Clone)]
pub struct TwitchConfig {
    pub client_id: String,
    pub client_secret: String,
    pub auth_base_url: String,
    pub api_base_url: String,
}

impl TwitchConfig {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            auth_base_url: DEFAULT_AUTH_BASE_URL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AccessToken {
    access_token: String,
}

/// Holds the current app access token. All reads go through [`bearer`]
/// and all writes through [`replace`]; nothing else touches the value,
/// so concurrent API calls and a refresh can interleave safely.
///
/// [`bearer`]: TokenStore::bearer
/// [`replace`]: TokenStore::replace
#[derive(Debug)]
struct TokenStore {
    token: RwLock<String>,
}

impl TokenStore {
    fn new(initial: String) -> Self {
        Self {
            token: RwLock::new(initial),
        }
    }

    async fn bearer(&self) -> String {
        format!("Bearer {}", self.token.read().await)
    }

    async fn replace(&self, value: String) {
        *self.token.write().await = value;
    }
}

/// Client for the upstream metadata service: resolves a login to a
/// broadcaster id and lists a broadcaster's clips for a date window.
pub struct TwitchService {
    config: TwitchConfig,
    client: reqwest::Client,
    transport: Arc<dyn HttpSend>,
    tokens: TokenStore,
}

impl std::fmt::Debug for TwitchService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwitchService")
            .field("config", &self.config)
            .field("client", &self.client)
            .field("tokens", &self.tokens)
            .finish_non_exhaustive()
    }
}

impl TwitchService {
    /// Obtains an app access token and returns a ready client.
    pub async fn connect(config: TwitchConfig) -> Result<Self> {
        let client = reqwest::Client::new();
        let transport: Arc<dyn HttpSend> = Arc::new(client.clone());
        Self::connect_with_transport(config, client, transport).await
    }

    /// Same as [`connect`], with the sending capability swapped out.
    /// Request construction stays on the plain client.
    ///
    /// [`connect`]: TwitchService::connect
    pub async fn connect_with_transport(
        config: TwitchConfig,
        client: reqwest::Client,
        transport: Arc<dyn HttpSend>,
    ) -> Result<Self> {
        let token = request_token(&config, &client).await?;
        Ok(Self {
            config,
            client,
            transport,
            tokens: TokenStore::new(token),
        })
    }

    /// Resolves a user login to a broadcaster id.
    pub async fn resolve_user(&self, login: &str) -> Result<String> {
        #[derive(Deserialize)]
        struct User {
            id: String,
        }
        #[derive(Deserialize)]
        struct UsersResponse {
            data: Vec<User>,
        }

        let url = self.api_url("users");
        let response = self.get_authorized(&url, &[("login", login)]).await?;
        let response = check_status(response).await?;
        let users: UsersResponse = response.json().await?;

        users
            .data
            .into_iter()
            .next()
            .map(|user| user.id)
            .ok_or_else(|| ClipstitchError::UserNotFound {
                login: login.to_string(),
            })
    }

    /// Lists up to `max_count` clips for a broadcaster within the
    /// window, already converted to direct download sources. Records
    /// whose thumbnail does not yield a direct URL are skipped and
    /// logged, not treated as fatal.
    pub async fn list_clips(
        &self,
        broadcaster_id: &str,
        window: DateWindow,
        max_count: u32,
    ) -> Result<Vec<ClipSource>> {
        #[derive(Deserialize)]
        struct ClipRecord {
            thumbnail_url: String,
        }
        #[derive(Deserialize)]
        struct ClipsResponse {
            data: Vec<ClipRecord>,
        }

        let url = self.api_url("clips");
        let started_at = window.started_at();
        let ended_at = window.ended_at();
        let first = max_count.to_string();
        let query = [
            ("broadcaster_id", broadcaster_id),
            ("started_at", started_at.as_str()),
            ("ended_at", ended_at.as_str()),
            ("first", first.as_str()),
        ];

        let response = self.get_authorized(&url, &query).await?;
        let response = check_status(response).await?;
        let clips: ClipsResponse = response.json().await?;

        let mut sources = Vec::with_capacity(clips.data.len());
        for record in clips.data {
            let Some(direct) = direct_source_url(&record.thumbnail_url) else {
                warn!(
                    thumbnail_url = %record.thumbnail_url,
                    "no preview marker in thumbnail url, skipping clip"
                );
                continue;
            };
            match ClipSource::new(direct) {
                Ok(source) => sources.push(source),
                Err(error) => {
                    warn!(%error, "skipping clip");
                }
            }
        }
        Ok(sources)
    }

    /// Sends a GET with the current bearer token; a 401 answer triggers
    /// one token refresh and one retry with the fresh credential.
    async fn get_authorized(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<reqwest::Response> {
        let request = self.build_get(url, query).await?;
        let response = self.transport.send(request).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        debug!("access token rejected, refreshing");
        self.refresh_token().await?;
        let retry = self.build_get(url, query).await?;
        Ok(self.transport.send(retry).await?)
    }

    async fn build_get(&self, url: &str, query: &[(&str, &str)]) -> Result<reqwest::Request> {
        let request = self
            .client
            .get(url)
            .query(query)
            .header("Authorization", self.tokens.bearer().await)
            .header("Client-Id", &self.config.client_id)
            .build()?;
        Ok(request)
    }

    async fn refresh_token(&self) -> Result<()> {
        let fresh = request_token(&self.config, &self.client).await?;
        self.tokens.replace(fresh).await;
        Ok(())
    }

    fn api_url(&self, endpoint: &str) -> String {
        format!("{}/{endpoint}", self.config.api_base_url.trim_end_matches('/'))
    }
}

async fn request_token(config: &TwitchConfig, client: &reqwest::Client) -> Result<String> {
    let url = format!(
        "{}/oauth2/token",
        config.auth_base_url.trim_end_matches('/')
    );
    let params = [
        ("client_id", config.client_id.as_str()),
        ("client_secret", config.client_secret.as_str()),
        ("grant_type", "client_credentials"),
    ];

    let response = client.post(&url).form(&params).send().await?;
    let status = response.status();
    if !status.is_success() {
        let detail = response
            .text()
            .await
            .unwrap_or_else(|_| "unable to read response body".to_string());
        return Err(ClipstitchError::AuthFailed {
            status: status.as_u16(),
            detail,
        });
    }

    let token: AccessToken = response.json().await?;
    Ok(token.access_token)
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let detail = response
        .text()
        .await
        .unwrap_or_else(|_| "unable to read response body".to_string());
    Err(ClipstitchError::ApiFailed {
        status: status.as_u16(),
        detail,
    })
}

/// A clip's direct mp4 lives at the thumbnail location minus its
/// `-preview-<dimensions>` suffix.
fn direct_source_url(thumbnail_url: &str) -> Option<String> {
    let cut = thumbnail_url.rfind("-preview")?;
    Some(format!("{}.mp4", &thumbnail_url[..cut]))
}
