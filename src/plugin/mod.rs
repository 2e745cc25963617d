//! Terraform plugin protocol server.
//!
//! Terraform launches the provider binary with a magic cookie and the
//! protocol versions it speaks. The plugin binds a loopback TCP listener,
//! prints the go-plugin handshake line on stdout and then serves the
//! `tfplugin6.Provider`, `plugin.GRPCController` and `grpc.health.v1`
//! services until the controller asks it to shut down.

mod convert;
pub mod dynamic;
mod handshake;
pub mod proto;
mod service;
mod tls;

use std::io::{self, Write};
use std::net::{Ipv4Addr, SocketAddr};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Notify, mpsc};
use tokio_rustls::TlsAcceptor;
use tokio_rustls::server::TlsStream;
use tokio_stream::wrappers::ReceiverStream;
use tonic::transport::Server;
use tonic::transport::server::Connected;
use tonic_health::ServingStatus;
use tracing::{debug, info, warn};

use crate::provider::FluenceProvider;
use proto::controller::grpc_controller_server::GrpcControllerServer;
use proto::tfplugin6::provider_server::ProviderServer;

pub use handshake::{CORE_PROTOCOL_VERSION, MAGIC_COOKIE_KEY, MAGIC_COOKIE_VALUE, PROTOCOL_VERSION};
pub use service::{PluginController, ProviderService};

/// Service name Terraform's health check asks about.
const HEALTH_SERVICE: &str = "plugin";

/// Launch settings Terraform passes to the plugin through its environment.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PluginEnv {
    /// Value of `TF_PLUGIN_MAGIC_COOKIE`.
    pub magic_cookie: Option<String>,
    /// Versions listed in `PLUGIN_PROTOCOL_VERSIONS`.
    pub protocol_versions: Vec<u32>,
    /// PEM client certificate from `PLUGIN_CLIENT_CERT`; enables TLS.
    pub client_cert: Option<String>,
    /// Lowest port from `PLUGIN_MIN_PORT`.
    pub min_port: Option<u16>,
    /// Highest port from `PLUGIN_MAX_PORT`.
    pub max_port: Option<u16>,
}

/// Errors that stop the plugin before or while serving.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ServerError {
    /// The binary was started without Terraform's magic cookie.
    #[error(
        "This binary is a plugin. These are not meant to be executed directly.\n\
         Please execute the program that consumes these plugins, which will\n\
         load any plugins automatically"
    )]
    NotLaunchedByClient,
    /// The client does not speak protocol version 6.
    #[error("Incompatible API version with plugin. Plugin version: 6, Client versions: {0}")]
    IncompatibleVersion(String),
    /// No port in the configured range could be bound.
    #[error("no port available between {min} and {max}")]
    NoPortAvailable {
        /// Lowest port tried.
        min: u16,
        /// Highest port tried.
        max: u16,
    },
    /// Binding the listener or writing the handshake failed.
    #[error("plugin I/O failed: {0}")]
    Io(String),
    /// The TLS identity or configuration could not be built.
    #[error("plugin TLS setup failed: {0}")]
    Tls(String),
    /// The gRPC server stopped with an error.
    #[error("gRPC transport failed: {0}")]
    Transport(String),
}

impl From<io::Error> for ServerError {
    fn from(err: io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Connection accepted by the plugin listener, with or without TLS.
enum PluginStream {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl AsyncRead for PluginStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            Self::Tls(stream) => Pin::new(stream.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for PluginStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            Self::Tls(stream) => Pin::new(stream.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_flush(cx),
            Self::Tls(stream) => Pin::new(stream.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            Self::Tls(stream) => Pin::new(stream.as_mut()).poll_shutdown(cx),
        }
    }
}

impl Connected for PluginStream {
    type ConnectInfo = Option<SocketAddr>;

    fn connect_info(&self) -> Self::ConnectInfo {
        match self {
            Self::Plain(stream) => stream.peer_addr().ok(),
            Self::Tls(stream) => stream.get_ref().0.peer_addr().ok(),
        }
    }
}

async fn bind(env: &PluginEnv) -> Result<TcpListener, ServerError> {
    let (Some(min), Some(max)) = (env.min_port, env.max_port) else {
        return Ok(TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await?);
    };
    for port in min..=max {
        match TcpListener::bind((Ipv4Addr::LOCALHOST, port)).await {
            Ok(listener) => return Ok(listener),
            Err(err) => debug!(port, error = %err, "port unavailable"),
        }
    }
    Err(ServerError::NoPortAvailable { min, max })
}

fn incoming(
    listener: TcpListener,
    acceptor: Option<TlsAcceptor>,
) -> ReceiverStream<io::Result<PluginStream>> {
    let (tx, rx) = mpsc::channel(16);
    tokio::spawn(async move {
        loop {
            let accepted = tokio::select! {
                () = tx.closed() => break,
                accepted = listener.accept() => accepted,
            };
            let (stream, peer) = match accepted {
                Ok(accepted) => accepted,
                Err(err) => {
                    warn!(error = %err, "failed to accept plugin connection");
                    continue;
                }
            };
            debug!(%peer, "accepted plugin connection");

            let Some(acceptor) = acceptor.clone() else {
                if tx.send(Ok(PluginStream::Plain(stream))).await.is_err() {
                    break;
                }
                continue;
            };
            let tx = tx.clone();
            tokio::spawn(async move {
                match acceptor.accept(stream).await {
                    Ok(tls) => {
                        if tx.send(Ok(PluginStream::Tls(Box::new(tls)))).await.is_err() {
                            debug!(%peer, "server stopped before TLS handshake finished");
                        }
                    }
                    Err(err) => warn!(%peer, error = %err, "TLS handshake failed"),
                }
            });
        }
    });
    ReceiverStream::new(rx)
}

/// Serves `provider` to the Terraform process that launched the binary.
///
/// The handshake line is written to `out` once the listener is bound.
/// Returns after `GRPCController.Shutdown` is called.
///
/// # Errors
///
/// Returns [`ServerError`] when the launch environment is not Terraform's,
/// when the listener or TLS identity cannot be set up, or when the gRPC
/// server fails.
pub async fn serve(
    provider: FluenceProvider,
    env: &PluginEnv,
    mut out: impl Write,
) -> Result<(), ServerError> {
    handshake::negotiate(env)?;

    let listener = bind(env).await?;
    let addr = listener.local_addr()?;
    let (acceptor, certificate) = match env.client_cert.as_deref() {
        Some(pem) => {
            let identity = tls::generate_identity()?;
            let config = tls::server_config(&identity, pem)?;
            (
                Some(TlsAcceptor::from(Arc::new(config))),
                Some(identity.certificate),
            )
        }
        None => (None, None),
    };

    let (mut health, health_service) = tonic_health::server::health_reporter();
    health
        .set_service_status(HEALTH_SERVICE, ServingStatus::Serving)
        .await;

    let shutdown = Arc::new(Notify::new());
    let router = Server::builder()
        .add_service(health_service)
        .add_service(GrpcControllerServer::new(PluginController::new(
            Arc::clone(&shutdown),
        )))
        .add_service(ProviderServer::new(ProviderService::new(provider)));

    writeln!(out, "{}", handshake::handshake_line(addr, certificate.as_ref()))?;
    out.flush()?;
    info!(%addr, tls = acceptor.is_some(), "serving Terraform plugin protocol");

    router
        .serve_with_incoming_shutdown(incoming(listener, acceptor), async move {
            shutdown.notified().await;
        })
        .await
        .map_err(|err| ServerError::Transport(err.to_string()))?;

    info!("plugin server stopped");
    Ok(())
}
