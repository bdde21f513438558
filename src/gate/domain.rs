//! Dominio de la compuerta de ingesta (Ingestion Gate).
//!
//! Todo pedido recorre las etapas en orden fijo y puede ser rechazado en cualquiera:
//!
//! ```text
//! Live → AuthChecked → PathChecked → MethodChecked → ContentTypeChecked
//!      → BodyRead → JsonParsed → Dispatched → Responded(200)
//! ```
//!
//! Los rechazos terminan el pedido con un código HTTP y cuerpo vacío.


use std::collections::HashSet;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use axum::http::StatusCode;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use crate::context::domain::AppContext;
use crate::metric::domain::MetricEmitter;


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateStage {
    Live,
    AuthChecked,
    PathChecked,
    MethodChecked,
    ContentTypeChecked,
    BodyRead,
    JsonParsed,
    Dispatched,
}


/// Motivo de rechazo de un pedido; cada uno corresponde a un código HTTP.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("server is shutting down")]
    Gone,
    #[error("client not authorized")]
    Forbidden,
    #[error("invalid path")]
    NotFound,
    #[error("invalid method")]
    InvalidMethod,
    #[error("invalid content type")]
    InvalidContentType,
    #[error("inaccessible request body")]
    UnreadableBody,
    #[error("invalid request body")]
    InvalidBody,
}


impl Rejection {
    pub fn status(&self) -> StatusCode {
        match self {
            Rejection::Gone => StatusCode::GONE,
            Rejection::Forbidden => StatusCode::FORBIDDEN,
            Rejection::NotFound => StatusCode::NOT_FOUND,
            Rejection::InvalidMethod
            | Rejection::InvalidContentType
            | Rejection::UnreadableBody
            | Rejection::InvalidBody => StatusCode::BAD_REQUEST,
        }
    }
}


/// Fallo fatal al iniciar el listener de ingesta.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to bind monitor listener on {addr}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
}


/// Datos del pedido que necesita el oráculo de autorización.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestMeta {
    pub remote_addr: Option<SocketAddr>,
}


/// Oráculo de autorización (protocolo de accesorios externo).
///
/// Se consulta desde varios pedidos concurrentes.
pub trait Authorizer: Send + Sync {
    fn is_authorized(&self, meta: &RequestMeta) -> bool;
}


/// Autoriza solo pedidos cuyo par remoto es un controlador emparejado.
#[derive(Debug, Clone, Default)]
pub struct PairedControllers {
    addresses: HashSet<IpAddr>,
}


impl PairedControllers {
    pub fn new(addresses: impl IntoIterator<Item = IpAddr>) -> Self {
        Self { addresses: addresses.into_iter().collect() }
    }
}


impl Authorizer for PairedControllers {
    fn is_authorized(&self, meta: &RequestMeta) -> bool {
        meta.remote_addr
            .map(|addr| self.addresses.contains(&addr.ip()))
            .unwrap_or(false)
    }
}


/// Estado compartido por todos los pedidos que atraviesan la compuerta.
///
/// `live` se cancela al iniciar el apagado; `tracker` cuenta los pedidos en curso.
#[derive(Clone)]
pub struct Gate {
    pub ctx: AppContext,
    pub emitter: MetricEmitter,
    pub authorizer: Arc<dyn Authorizer>,
    pub live: CancellationToken,
    pub tracker: TaskTracker,
}


/// Servidor de ingesta en ejecución.
#[derive(Debug)]
pub struct IngestServer {
    pub local_addr: SocketAddr,
    pub live: CancellationToken,
    pub tracker: TaskTracker,
}
