use async_trait::async_trait;
use reqwest::{Request, Response};
use std::sync::Arc;

/// Executes HTTP requests for the remote session source. Swappable so tests
/// and callers can add auth headers, retries or canned responses.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}

#[async_trait]
impl<C: HttpClient + ?Sized> HttpClient for Arc<C> {
    async fn execute(&self, req: Request) -> reqwest::Result<Response> {
        (**self).execute(req).await
    }
}
