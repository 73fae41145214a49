use axum::handler::Handler;
use axum::http::{header, HeaderValue};
use axum::routing::get;
use axum::Router;
use tokio::net::{TcpListener, ToSocketAddrs};
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::rest;
use crate::RelayState;

pub use axum;

/// Headers browsers may send to the endpoint.
pub const CORS_ALLOW_HEADERS: &str = "authorization, x-client-info, apikey, content-type";

pub struct RelayApp {
    pub state: RelayState,
    pub router: Router<()>,
}

impl Clone for RelayApp {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            router: self.router.clone(),
        }
    }
}

impl RelayApp {
    pub fn new(state: RelayState) -> Self {
        Self {
            state,
            router: Router::new(),
        }
    }

    pub fn use_router(mut self, path: &str, router: Router<()>) -> Self {
        self.router = match path.trim_end_matches('/') {
            "" => self.router.merge(router),
            path => self.router.nest(path, router),
        };
        self
    }

    pub fn use_get<H, T>(self, path: &str, handler: H) -> Self
    where
        H: Handler<T, ()> + Clone + Send + 'static,
        T: 'static,
    {
        let router = Router::new().route("/", get(handler));
        self.use_router(path, router)
    }

    /// Mount the process-jobs endpoint at `path`.
    pub fn process_jobs(self, path: &str) -> Self {
        let router = rest::router(self.state.clone());
        self.use_router(path, router)
    }

    /// The finished router with request-id, tracing and CORS layers applied.
    pub fn into_router(self) -> Router<()> {
        self.router.layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(SetResponseHeaderLayer::overriding(
                    header::ACCESS_CONTROL_ALLOW_ORIGIN,
                    HeaderValue::from_static("*"),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    header::ACCESS_CONTROL_ALLOW_HEADERS,
                    HeaderValue::from_static(CORS_ALLOW_HEADERS),
                )),
        )
    }

    /// Serve until ctrl-c.
    pub async fn listen<A>(self, addr: A) -> anyhow::Result<()>
    where
        A: ToSocketAddrs,
    {
        let listener = TcpListener::bind(addr).await?;
        info!(addr = %listener.local_addr()?, "relay listening");

        axum::serve(listener, self.into_router())
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
                info!("shutdown signal received");
            })
            .await?;
        Ok(())
    }
}

/// Start an app with the process-jobs state; mount routes with the
/// `use_*` / [`RelayApp::process_jobs`] builders.
pub fn relay(state: RelayState) -> RelayApp {
    RelayApp::new(state)
}
