#![allow(dead_code)]

use axum::extract::ConnectInfo;
use axum_test::TestServer;
use linkgate::application::services::{LinkService, RateLimitPolicy, RateLimiter};
use linkgate::domain::click_aggregator::ClickAggregator;
use linkgate::infrastructure::cache::NullCache;
use linkgate::infrastructure::counter::InMemoryCounterStore;
use linkgate::infrastructure::persistence::InMemoryLinkRepository;
use linkgate::routes::build_router;
use linkgate::state::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower::Layer;

pub const BASE_URL: &str = "http://sho.rt";

/// Application state over in-memory backends, plus handles to inspect them.
pub struct TestApp {
    pub state: AppState,
    pub links: Arc<InMemoryLinkRepository>,
    pub clicks: Arc<ClickAggregator>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_limits(
            RateLimitPolicy::create_default(),
            RateLimitPolicy::redirect_default(),
        )
    }

    pub fn with_limits(create: RateLimitPolicy, redirect: RateLimitPolicy) -> Self {
        Self::build(create, redirect, 1000)
    }

    pub fn with_click_capacity(capacity: usize) -> Self {
        Self::build(
            RateLimitPolicy::create_default(),
            RateLimitPolicy::redirect_default(),
            capacity,
        )
    }

    fn build(create: RateLimitPolicy, redirect: RateLimitPolicy, click_capacity: usize) -> Self {
        let links = Arc::new(InMemoryLinkRepository::new());
        let clicks = Arc::new(ClickAggregator::new(links.clone(), click_capacity, 100));
        let link_service = Arc::new(LinkService::new(
            links.clone(),
            Arc::new(NullCache::new()),
            clicks.clone(),
        ));
        let limiter = Arc::new(RateLimiter::new(
            Arc::new(InMemoryCounterStore::new()),
            Duration::from_millis(100),
        ));

        let state = AppState::new(link_service, clicks.clone(), limiter, BASE_URL)
            .with_rate_limits(create, redirect);

        Self {
            state,
            links,
            clicks,
        }
    }

    pub fn behind_proxy(mut self) -> Self {
        self.state = self.state.with_behind_proxy(true);
        self
    }

    pub fn server(&self) -> TestServer {
        let app = build_router(self.state.clone()).layer(MockConnectInfoLayer);
        TestServer::new(app).unwrap()
    }

    /// Creates a link directly through the service, bypassing validation.
    pub async fn create_link(
        &self,
        url: &str,
        expires_at: Option<chrono::DateTime<chrono::Utc>>,
    ) -> String {
        self.state
            .link_service
            .create_short_link(url.to_string(), expires_at)
            .await
            .unwrap()
            .code
    }
}

#[derive(Clone)]
pub struct MockConnectInfoLayer;

impl<S> Layer<S> for MockConnectInfoLayer {
    type Service = MockConnectInfoService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MockConnectInfoService { inner }
    }
}

#[derive(Clone)]
pub struct MockConnectInfoService<S> {
    inner: S,
}

impl<S, B> tower::Service<axum::http::Request<B>> for MockConnectInfoService<S>
where
    S: tower::Service<axum::http::Request<B>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    B: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: axum::http::Request<B>) -> Self::Future {
        let addr: SocketAddr = "127.0.0.1:12345".parse().unwrap();
        req.extensions_mut().insert(ConnectInfo(addr));
        self.inner.call(req)
    }
}
