//! HTTP surface of the stub emulator
//!
//! Mirrors the control protocol of the real emulator (`GET /`,
//! `POST /reset`, `POST /shutdown`) plus a tiny entity API over
//! [`EntityStore`].

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Notify;

use crate::error::{StubError, StubResult};
use crate::store::EntityStore;
use shared::{component_debug, component_info, ComponentId};

#[derive(Clone)]
pub struct StubServer {
    project: String,
    store: EntityStore,
    shutdown: Arc<Notify>,
}

impl StubServer {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            store: EntityStore::new(),
            shutdown: Arc::new(Notify::new()),
        }
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    /// Build the Axum router with all routes
    pub fn build_router(&self) -> Router {
        Router::new()
            // Control protocol
            .route("/", get(health_check))
            .route("/reset", post(reset_handler))
            .route("/shutdown", post(shutdown_handler))
            // Entities
            .route("/entities", get(count_handler))
            .route("/entities/:kind/:name", get(get_entity_handler).put(put_entity_handler))
            .with_state(self.clone())
    }

    /// Serve until `POST /shutdown` arrives or `signal` resolves
    pub async fn serve<S>(self, listener: TcpListener, signal: S) -> StubResult<()>
    where
        S: Future<Output = ()> + Send + 'static,
    {
        let shutdown = self.shutdown.clone();
        let router = self.build_router();

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                tokio::select! {
                    _ = shutdown.notified() => {
                        component_info!(ComponentId::StubEmulator, "🛑 Shutdown requested over HTTP");
                    }
                    _ = signal => {}
                }
            })
            .await
            .map_err(StubError::Serve)
    }
}

async fn health_check() -> &'static str {
    "Ok"
}

async fn reset_handler(State(server): State<StubServer>) -> impl IntoResponse {
    let removed = server.store.clear();
    component_debug!(ComponentId::StubEmulator, "🧹 Reset removed {} entities", removed);
    "Resetting...done!"
}

async fn shutdown_handler(State(server): State<StubServer>) -> impl IntoResponse {
    server.shutdown.notify_one();
    "Shutting down"
}

async fn count_handler(State(server): State<StubServer>) -> Json<Value> {
    Json(json!({ "project": server.project, "count": server.store.len() }))
}

async fn get_entity_handler(
    Path((kind, name)): Path<(String, String)>,
    State(server): State<StubServer>,
) -> impl IntoResponse {
    match server.store.get(&kind, &name) {
        Some(value) => (StatusCode::OK, Json(value)).into_response(),
        None => (StatusCode::NOT_FOUND, "Entity not found").into_response(),
    }
}

async fn put_entity_handler(
    Path((kind, name)): Path<(String, String)>,
    State(server): State<StubServer>,
    Json(value): Json<Value>,
) -> StatusCode {
    match server.store.put(&kind, &name, value) {
        Some(_) => StatusCode::OK,
        None => StatusCode::CREATED,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use tokio::sync::oneshot;
    use tokio::task::JoinHandle;

    async fn start() -> (StubServer, SocketAddr, oneshot::Sender<()>, JoinHandle<StubResult<()>>) {
        let server = StubServer::new("test");
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(server.clone().serve(listener, async move {
            let _ = stop_rx.await;
        }));
        (server, addr, stop_tx, task)
    }

    #[tokio::test]
    async fn test_health_and_reset() {
        let (server, addr, stop, task) = start().await;
        let client = reqwest::Client::builder().no_proxy().build().unwrap();

        let health = client.get(format!("http://{addr}/")).send().await.unwrap();
        assert_eq!(health.status(), 200);
        assert_eq!(health.text().await.unwrap(), "Ok");

        let put = client
            .put(format!("http://{addr}/entities/Task/t1"))
            .json(&json!({"done": false}))
            .send()
            .await
            .unwrap();
        assert_eq!(put.status(), StatusCode::CREATED.as_u16());
        assert_eq!(server.store().len(), 1);

        let reset = client.post(format!("http://{addr}/reset")).send().await.unwrap();
        assert_eq!(reset.status(), 200);
        assert!(server.store().is_empty());

        let missing = client.get(format!("http://{addr}/entities/Task/t1")).send().await.unwrap();
        assert_eq!(missing.status(), 404);

        let _ = stop.send(());
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_request_stops_server() {
        let (_server, addr, _stop, task) = start().await;
        let client = reqwest::Client::builder().no_proxy().build().unwrap();

        let response = client.post(format!("http://{addr}/shutdown")).send().await.unwrap();
        assert_eq!(response.status(), 200);

        tokio::time::timeout(std::time::Duration::from_secs(5), task)
            .await
            .expect("server should stop after /shutdown")
            .unwrap()
            .unwrap();
    }
}
