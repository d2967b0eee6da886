//! Daemon - wires the control plane together
//!
//! Builds the queue, dispatcher, client registry, and supervisor from an
//! injected configuration and collaborator set, then runs until
//! interrupted. The supervisor owns every long-running loop; ctrl-c
//! cancels the root token and shutdown propagates to all of them.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

use crate::clients::ClientRegistry;
use crate::collaborators::{AutomationBridge, InferenceEngine, MediaOutput};
use crate::config::Config;
use crate::dispatch::{run_poller, AutomationHandler, Dispatcher, MusicHandler};
use crate::proto::{encode_response, Status};
use crate::queue::TaskQueue;
use crate::supervisor::{FnService, Role, Supervisor};
use crate::task::TaskKind;
use crate::transport::{connect_with_retry, TcpServer, UdpServer};
use crate::{Error, Result};

/// The Harken daemon
pub struct Daemon {
    config: Config,
    role: Role,
    engine: Arc<dyn InferenceEngine>,
    bridge: Arc<dyn AutomationBridge>,
    media: Arc<dyn MediaOutput>,
    clients: Arc<ClientRegistry>,
    queue: Arc<TaskQueue>,
}

impl Daemon {
    /// Create a daemon from configuration and collaborators
    #[must_use]
    pub fn new(
        config: Config,
        role: Role,
        engine: Arc<dyn InferenceEngine>,
        bridge: Arc<dyn AutomationBridge>,
        media: Arc<dyn MediaOutput>,
    ) -> Self {
        Self {
            config,
            role,
            engine,
            bridge,
            media,
            clients: Arc::new(ClientRegistry::new()),
            queue: Arc::new(TaskQueue::new()),
        }
    }

    /// The client registry, for registering edge nodes
    #[must_use]
    pub fn clients(&self) -> Arc<ClientRegistry> {
        Arc::clone(&self.clients)
    }

    /// The task queue, for enqueue sources outside the transport
    /// (e.g. terminal input)
    #[must_use]
    pub fn queue(&self) -> Arc<TaskQueue> {
        Arc::clone(&self.queue)
    }

    /// Build the dispatch table from the configured feature flags
    fn build_dispatcher(&self) -> Dispatcher {
        let mut dispatcher = Dispatcher::new();

        if self.config.use_home_assistant {
            let automation: Arc<dyn crate::dispatch::TaskHandler> =
                Arc::new(AutomationHandler::new(Arc::clone(&self.bridge)));
            dispatcher.register(TaskKind::ControlLight, Arc::clone(&automation));
            dispatcher.register(TaskKind::ControlHeating, automation);
        }

        if self.config.use_airplay {
            let music = Arc::new(MusicHandler::new(
                Arc::clone(&self.media),
                Arc::clone(&self.clients),
            ));
            dispatcher.register(TaskKind::PlayMusic, music);
        }

        dispatcher
    }

    /// Run the daemon until interrupted
    ///
    /// # Errors
    ///
    /// Returns error if startup fails; after startup, service failures are
    /// recovered by the supervisor and never abort the process.
    pub async fn run(self) -> Result<()> {
        tracing::info!(role = ?self.role, "daemon running");

        let root = CancellationToken::new();
        let ctrl_c_token = root.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("shutdown requested");
                ctrl_c_token.cancel();
            }
        });

        let dispatcher = Arc::new(self.build_dispatcher());
        let poller = tokio::spawn(run_poller(
            Arc::clone(&self.queue),
            dispatcher,
            self.config.dispatch.poll_interval(),
            root.child_token(),
        ));

        let mut supervisor = Supervisor::new(self.config.supervisor.poll_interval(), root.child_token());
        match self.role {
            Role::Server => self.register_server_services(&mut supervisor).await?,
            Role::Client => self.register_client_services(&mut supervisor),
        }
        supervisor.start_monitoring();

        root.cancelled().await;

        supervisor.stop_monitoring().await;
        let _ = poller.await;
        tracing::info!("daemon stopped");
        Ok(())
    }

    /// Server role: transport listener, automation bridge, and the status
    /// web listener when configured
    async fn register_server_services(&self, supervisor: &mut Supervisor) -> Result<()> {
        let listen_addr: SocketAddr = format!("0.0.0.0:{}", self.config.main_server_port)
            .parse()
            .map_err(|e| Error::Config(format!("invalid listen address: {e}")))?;
        let max_sessions = self.config.transport.max_sessions;

        // Bind at startup so a taken port is fatal immediately; restarts
        // after a crash rebind inside the service body.
        let initial = TcpServer::bind(
            listen_addr,
            Arc::clone(&self.engine),
            Arc::clone(&self.queue),
            max_sessions,
        )
        .await?;
        let slot = Arc::new(tokio::sync::Mutex::new(Some(initial)));
        let engine = Arc::clone(&self.engine);
        let queue = Arc::clone(&self.queue);
        supervisor.register(
            Arc::new(FnService::new("transport-listener", move |token| {
                let slot = Arc::clone(&slot);
                let engine = Arc::clone(&engine);
                let queue = Arc::clone(&queue);
                async move {
                    let server = match slot.lock().await.take() {
                        Some(server) => server,
                        None => TcpServer::bind(listen_addr, engine, queue, max_sessions).await?,
                    };
                    server.serve(token).await
                }
            })),
            true,
        );

        let bridge = Arc::clone(&self.bridge);
        supervisor.register(
            Arc::new(FnService::new("automation-bridge", move |token| {
                bridge_keepalive(Arc::clone(&bridge), token)
            })),
            self.config.use_home_assistant,
        );

        let web_port = self.config.web_server_port;
        supervisor.register(
            Arc::new(FnService::new("web-listener", move |token| {
                serve_status(web_port, token)
            })),
            self.config.use_web_server,
        );

        Ok(())
    }

    /// Client role: wireless comm and the outbound session link
    fn register_client_services(&self, supervisor: &mut Supervisor) {
        let datagram_addr: SocketAddr = ([0, 0, 0, 0], self.config.main_server_port).into();
        let engine = Arc::clone(&self.engine);
        let queue = Arc::clone(&self.queue);
        supervisor.register(
            Arc::new(FnService::new("wireless-comm", move |token| {
                let engine = Arc::clone(&engine);
                let queue = Arc::clone(&queue);
                async move {
                    let server = UdpServer::bind(datagram_addr, engine, queue).await?;
                    server.serve(token).await
                }
            })),
            self.config.use_bluetooth,
        );

        let server_addr = format!(
            "{}:{}",
            self.config.client_server_ip, self.config.main_server_port
        );
        let backoff = self.config.transport.retry_backoff();
        supervisor.register(
            Arc::new(FnService::new("outbound-session", move |token| {
                outbound_session(server_addr.clone(), backoff, token)
            })),
            true,
        );
    }
}

/// Connect to the automation bridge and hold it until shutdown
async fn bridge_keepalive(
    bridge: Arc<dyn AutomationBridge>,
    token: CancellationToken,
) -> Result<()> {
    bridge.connect().await?;
    tracing::info!("automation bridge connected");
    token.cancelled().await;
    Ok(())
}

/// Establish and hold the edge node's link to its server
async fn outbound_session(
    addr: String,
    backoff: std::time::Duration,
    token: CancellationToken,
) -> Result<()> {
    let Some(stream) = connect_with_retry(&addr, backoff, &token).await else {
        return Ok(());
    };
    hold_link(stream, token).await
}

/// Keep the outbound link open until shutdown or the server drops it
///
/// A dropped link is reported as an error so the supervisor reconnects on
/// its next tick.
async fn hold_link(mut stream: TcpStream, token: CancellationToken) -> Result<()> {
    let mut buf = [0_u8; 256];
    loop {
        tokio::select! {
            () = token.cancelled() => return Ok(()),
            read = stream.read(&mut buf) => match read {
                Ok(0) => return Err(Error::Transport("session link closed by server".to_string())),
                Ok(_) => {}
                Err(e) => return Err(Error::Transport(format!("session link failed: {e}"))),
            },
        }
    }
}

/// Minimal status responder on the web port
///
/// Answers every connection with a single `200 OK` frame carrying the
/// daemon identity, then closes.
async fn serve_status(port: u16, token: CancellationToken) -> Result<()> {
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Transport(format!("bind {addr}: {e}")))?;
    tracing::info!(addr = %addr, "web listener running");

    let body = serde_json::to_vec(&serde_json::json!({
        "status": "ok",
        "name": "harken",
        "version": env!("CARGO_PKG_VERSION"),
    }))?;

    loop {
        let (mut stream, _) = tokio::select! {
            () = token.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok(pair) => pair,
                Err(e) => {
                    tracing::warn!(error = %e, "web accept failed");
                    continue;
                }
            },
        };

        let response = encode_response(Status::Ok, &body);
        if let Err(e) = stream.write_all(&response).await {
            tracing::warn!(error = %e, "status write failed");
        }
        let _ = stream.shutdown().await;
    }

    Ok(())
}
