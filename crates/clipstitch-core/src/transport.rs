use async_trait::async_trait;

/// The one capability the metadata client needs from HTTP: send a
/// request, get a response. Retry policies compose on top of it and
/// tests substitute it without standing up a real client stack.
#[async_trait]
pub trait HttpSend: Send + Sync {
    async fn send(&self, request: reqwest::Request) -> reqwest::Result<reqwest::Response>;
}

#[async_trait]
impl HttpSend for reqwest::Client {
    async fn send(&self, request: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        self.execute(request).await
    }
}
