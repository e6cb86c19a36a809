// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Control server lifecycle

use crate::auth::auth_middleware;
use crate::config::ServerConfig;
use crate::error::{ApiError, ControlServerError};
use crate::exec::ExecutionManager;
use crate::handlers;
use crate::state::AppState;
use axum::{
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use brokk_ctl_keys::KeyManager;
use brokk_instances::InstanceRecord;
use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::info;

enum Lifecycle {
    Created,
    Started(Running),
    Stopped,
}

struct Running {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<std::io::Result<()>>,
}

/// Authenticated HTTP control endpoint of one instance.
///
/// `Created -> Started -> Stopped`; a server cannot be restarted.
pub struct ControlServer {
    config: ServerConfig,
    state: AppState,
    lifecycle: Mutex<Lifecycle>,
}

impl ControlServer {
    pub fn new(config: ServerConfig, instance: InstanceRecord, keys: Arc<KeyManager>) -> Self {
        Self {
            config,
            state: AppState::new(instance, keys),
            lifecycle: Mutex::new(Lifecycle::Created),
        }
    }

    /// Enable the `/v1/exec` routes
    pub fn with_exec_manager(mut self, exec: Arc<dyn ExecutionManager>) -> Self {
        self.state.exec = Some(exec);
        self
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Build the Axum application with routes and middleware
    pub fn build_app(state: AppState) -> Router {
        let middleware_stack = ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(CatchPanicLayer::custom(handle_panic));

        let api_routes = Router::new()
            .route("/ctl-info", get(handlers::ctl_info::ctl_info))
            .route("/health/ready", get(handlers::health::ready))
            .route("/exec/start", post(handlers::exec::start))
            .route("/exec/:session_id/stop", post(handlers::exec::stop));

        Router::new()
            .nest("/v1", api_routes)
            .fallback(not_found)
            .layer(from_fn_with_state(state.clone(), auth_middleware))
            .with_state(state)
            .layer(middleware_stack)
    }

    /// Bind the listener and start serving in the background.
    ///
    /// Returns the bound address. Only loopback addresses are accepted. The
    /// control key is loaded (or created) before binding so that a broken key
    /// file fails startup.
    pub async fn start(&self) -> Result<SocketAddr, ControlServerError> {
        let mut lifecycle = self.lifecycle.lock().await;
        match *lifecycle {
            Lifecycle::Created => {}
            Lifecycle::Started(_) => return Err(ControlServerError::AlreadyStarted),
            Lifecycle::Stopped => return Err(ControlServerError::Stopped),
        }

        let addr = self.config.bind_addr;
        if !addr.ip().is_loopback() {
            return Err(ControlServerError::NonLoopback(addr));
        }

        self.state.keys.load_or_create_key()?;

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|source| ControlServerError::Bind { addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ControlServerError::Bind { addr, source })?;
        let _ = self.state.bound_addr.set(local_addr);

        let (shutdown, shutdown_rx) = oneshot::channel::<()>();
        let app = Self::build_app(self.state.clone());
        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        info!(
            instance_id = %self.state.instance.instance_id,
            addr = %local_addr,
            "control server started"
        );
        *lifecycle = Lifecycle::Started(Running { shutdown, task });
        Ok(local_addr)
    }

    /// Stop serving, waiting up to `grace` for in-flight requests.
    ///
    /// Safe to call before `start` and more than once.
    pub async fn stop(&self, grace: Duration) {
        let mut lifecycle = self.lifecycle.lock().await;
        let previous = std::mem::replace(&mut *lifecycle, Lifecycle::Stopped);

        let Lifecycle::Started(Running { shutdown, mut task }) = previous else {
            return;
        };

        let _ = shutdown.send(());
        match tokio::time::timeout(grace, &mut task).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => tracing::warn!(error = %e, "control server exited with error"),
            Ok(Err(e)) => tracing::warn!(error = %e, "control server task failed"),
            Err(_) => {
                tracing::warn!(?grace, "graceful shutdown timed out, aborting");
                task.abort();
            }
        }
        info!(instance_id = %self.state.instance.instance_id, "control server stopped");
    }

    /// Stop with the configured grace period
    pub async fn shutdown(&self) {
        self.stop(self.config.shutdown_grace).await;
    }

    /// Bound address, available after `start`
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.state.bound_addr.get().copied()
    }

    pub fn port(&self) -> Option<u16> {
        self.local_addr().map(|addr| addr.port())
    }
}

async fn not_found() -> ApiError {
    ApiError::NotFound
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };
    ApiError::Internal(format!("handler panicked: {detail}")).into_response()
}
