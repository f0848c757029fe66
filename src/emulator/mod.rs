//! Local emulator of the saved-search REST API
//!
//! Serves login, server info, saved searches, dispatch, history and search
//! jobs from memory, so the SDK can be exercised without a real service.
//! Jobs report done once the configured latency has passed.

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::{default_content, EmulatorError, EmulatorState, StoredJob, StoredSearch};

use crate::config::{ConnectionSettings, EmulatorSettings};
use crate::error::Result;
use std::future::Future;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Serve the emulator on an already bound listener until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, settings: EmulatorSettings, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_router(EmulatorState::new(settings));
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

/// A running emulator; shuts down when dropped
pub struct EmulatorHandle {
    addr: SocketAddr,
    username: String,
    password: String,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl EmulatorHandle {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Connection settings that log in to this emulator
    pub fn connection_settings(&self) -> ConnectionSettings {
        ConnectionSettings {
            scheme: "http".to_string(),
            host: self.addr.ip().to_string(),
            port: self.addr.port(),
            username: self.username.clone(),
            password: self.password.clone(),
            ..Default::default()
        }
    }

    /// Stop serving and wait for the server task to finish
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Emulator task ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for EmulatorHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// Start an emulator in the background
///
/// Port 0 in the settings binds an ephemeral port; see [`EmulatorHandle::addr`].
pub async fn spawn(settings: EmulatorSettings) -> Result<EmulatorHandle> {
    let listener = TcpListener::bind((settings.bind_address.as_str(), settings.port)).await?;
    let addr = listener.local_addr()?;
    let (tx, rx) = oneshot::channel();

    let username = settings.username.clone();
    let password = settings.password.clone();

    let task = tokio::spawn(async move {
        let shutdown = async {
            let _ = rx.await;
        };
        if let Err(e) = serve(listener, settings, shutdown).await {
            warn!("Emulator stopped with error: {}", e);
        }
    });
    info!("Emulator listening on http://{}", addr);

    Ok(EmulatorHandle {
        addr,
        username,
        password,
        shutdown: Some(tx),
        task: Some(task),
    })
}
