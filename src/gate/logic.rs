use std::net::SocketAddr;
use std::sync::Arc;
use axum::body::{to_bytes, Bytes};
use axum::extract::{ConnectInfo, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};
use crate::config::ingest::{JSON_CONTENT_TYPE, MAX_BODY_BYTES, OK_BODY};
use crate::context::domain::AppContext;
use crate::gate::domain::{Authorizer, Gate, GateStage, IngestServer, Rejection, RequestMeta, StartupError};
use crate::metric::domain::MetricEmitter;
use crate::payload::domain::Payload;
use crate::payload::logic::dispatch;


/// Recorre las etapas de la compuerta para un pedido.
///
/// # Orden de verificación
/// 1. `Live`: apagado en curso → 410, sin más verificaciones.
/// 2. `AuthChecked`: autorización requerida y rechazada por el oráculo → 403.
/// 3. `PathChecked`: ruta distinta a la configurada → 404.
/// 4. `MethodChecked`: método distinto de `PUT` → 400.
/// 5. `ContentTypeChecked`: `Content-type` distinto de `application/json` → 400.
/// 6. `BodyRead`: cuerpo ilegible o mayor a `MAX_BODY_BYTES` → 400.
/// 7. `JsonParsed`: cuerpo que no es un mapa plano texto → texto → 400.
/// 8. `Dispatched`: cada entrada pasa por clasificación y emisión.
///
/// # Retorno
/// El cuerpo de la respuesta 200: `"Ok"`, o el cuerpo recibido en modo debug.
pub async fn admit(gate: &Gate, request: Request) -> Result<String, Rejection> {

    let (parts, body) = request.into_parts();
    let meta = RequestMeta {
        remote_addr: parts.extensions.get::<ConnectInfo<SocketAddr>>().map(|info| info.0),
    };
    let system = &gate.ctx.system;

    let mut body = Some(body);
    let mut bytes = Bytes::new();
    let mut payload = Payload::default();
    let mut stage = GateStage::Live;

    loop {
        stage = match stage {
            GateStage::Live => {
                if gate.live.is_cancelled() {
                    return Err(Rejection::Gone);
                }
                if system.debug {
                    info!("Info: procesando pedido de monitoreo de {:?}", meta.remote_addr);
                }
                GateStage::AuthChecked
            }

            GateStage::AuthChecked => {
                if system.authorization_required && !gate.authorizer.is_authorized(&meta) {
                    warn!("Warning: cliente no autorizado {:?}", meta.remote_addr);
                    return Err(Rejection::Forbidden);
                }
                GateStage::PathChecked
            }

            GateStage::PathChecked => {
                if parts.uri.path() != system.monitor_path {
                    warn!("Warning: ruta inválida {}", parts.uri.path());
                    return Err(Rejection::NotFound);
                }
                GateStage::MethodChecked
            }

            GateStage::MethodChecked => {
                if parts.method != Method::PUT {
                    warn!("Warning: método inválido {}", parts.method);
                    return Err(Rejection::InvalidMethod);
                }
                GateStage::ContentTypeChecked
            }

            GateStage::ContentTypeChecked => {
                let content_type = parts.headers
                    .get(CONTENT_TYPE)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or_default();
                if content_type != JSON_CONTENT_TYPE {
                    warn!("Warning: content type inválido '{}'", content_type);
                    return Err(Rejection::InvalidContentType);
                }
                GateStage::BodyRead
            }

            GateStage::BodyRead => {
                let Some(body) = body.take() else {
                    return Err(Rejection::UnreadableBody);
                };
                bytes = to_bytes(body, MAX_BODY_BYTES).await.map_err(|e| {
                    warn!("Warning: cuerpo del pedido inaccesible ({})", e);
                    Rejection::UnreadableBody
                })?;
                GateStage::JsonParsed
            }

            GateStage::JsonParsed => {
                payload = serde_json::from_slice(&bytes).map_err(|e| {
                    warn!("Warning: cuerpo del pedido inválido ({})", e);
                    Rejection::InvalidBody
                })?;
                GateStage::Dispatched
            }

            GateStage::Dispatched => {
                let summary = dispatch(&gate.ctx.rules, &gate.emitter, &payload);
                if summary.skipped > 0 {
                    info!("Info: {} entradas emitidas, {} omitidas", summary.emitted, summary.skipped);
                }
                return Ok(if system.debug {
                    String::from_utf8_lossy(&bytes).into_owned()
                } else {
                    OK_BODY.to_string()
                });
            }
        };
    }
}


async fn monitor(State(gate): State<Gate>, request: Request) -> Response {
    let _in_flight = gate.tracker.token();
    match admit(&gate, request).await {
        Ok(body) => (StatusCode::OK, body).into_response(),
        Err(rejection) => rejection.status().into_response(),
    }
}


/// Todas las rutas y métodos llegan a la compuerta; ella decide 404/400.
pub fn build_router(gate: Gate) -> Router {
    Router::new()
        .fallback(monitor)
        .with_state(gate)
}


impl IngestServer {

    /// Abre el listener y lanza la tarea del servidor HTTP.
    ///
    /// # Errores
    /// * `StartupError::Bind` si la dirección no se puede abrir. En ese caso no queda
    ///   ninguna tarea en ejecución.
    pub async fn start(ctx: AppContext,
                       emitter: MetricEmitter,
                       authorizer: Arc<dyn Authorizer>) -> Result<Self, StartupError> {

        let addr = ctx.system.monitor_address;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| StartupError::Bind { addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| StartupError::Bind { addr, source })?;

        info!("Info: iniciando servidor de monitoreo http://{}{}", local_addr, ctx.system.monitor_path);

        let live = CancellationToken::new();
        let tracker = TaskTracker::new();
        let gate = Gate {
            ctx,
            emitter,
            authorizer,
            live: live.clone(),
            tracker: tracker.clone(),
        };
        let app = build_router(gate).into_make_service_with_connect_info::<SocketAddr>();

        let shutdown = live.clone();
        tracker.spawn(async move {
            let server = axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.cancelled().await });
            if let Err(e) = server.await {
                error!("Error: servidor de monitoreo finalizado con error {}", e);
            }
        });

        Ok(Self { local_addr, live, tracker })
    }

    /// Marca el servidor como no vivo y espera a que terminen el listener y
    /// todos los pedidos en curso.
    pub async fn stop(&self) {
        info!("Info: deteniendo servidor de monitoreo http://{}", self.local_addr);
        self.live.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        info!("Info: servidor de monitoreo detenido");
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::net::{IpAddr, Ipv4Addr};
    use axum::body::Body;
    use crate::gate::domain::PairedControllers;
    use crate::metric::domain::{MeasurementNames, TAG_CHARACTERISTIC, TAG_ROOM};
    use crate::sink::domain::MemorySink;
    use crate::system::domain::System;

    fn context(vars: &[(&str, &str)]) -> AppContext {
        let mut all: HashMap<String, String> = HashMap::from([
            ("MONITOR_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
            ("AUTHORIZATION_REQUIRED".to_string(), "false".to_string()),
        ]);
        all.extend(vars.iter().map(|(k, v)| (k.to_string(), v.to_string())));
        AppContext::new(System::from_lookup(|name| all.get(name).cloned()).unwrap())
    }

    fn gate(ctx: AppContext, authorizer: PairedControllers) -> (Gate, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::default());
        let emitter = MetricEmitter::new("Monitor", MeasurementNames::default(), sink.clone());
        let gate = Gate {
            ctx,
            emitter,
            authorizer: Arc::new(authorizer),
            live: CancellationToken::new(),
            tracker: TaskTracker::new(),
        };
        (gate, sink)
    }

    fn request(method: Method, path: &str, content_type: Option<&str>, body: &str) -> Request {
        let mut builder = axum::http::Request::builder().method(method).uri(path);
        if let Some(content_type) = content_type {
            builder = builder.header(CONTENT_TYPE, content_type);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn put(body: &str) -> Request {
        request(Method::PUT, "/monitor", Some("application/json"), body)
    }

    #[tokio::test]
    async fn accepts_payload_and_skips_bad_entries() {
        let (gate, sink) = gate(context(&[]), PairedControllers::default());
        let result = admit(&gate, put(r#"{"Temp_Room_Sensor": "12,3 °C", "Bad Key": "???"}"#)).await;

        assert_eq!(result, Ok("Ok".to_string()));
        let metrics = sink.metrics();
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].measurement, "homekit_temperature");
        assert_eq!(metrics[0].tags[TAG_ROOM], "Room");
        assert_eq!(metrics[0].tags[TAG_CHARACTERISTIC], "Sensor");
    }

    #[tokio::test]
    async fn debug_mode_echoes_the_body() {
        let (gate, _) = gate(context(&[("DEBUG", "true")]), PairedControllers::default());
        let body = r#"{"Switch_Hall": "Yes"}"#;
        assert_eq!(admit(&gate, put(body)).await, Ok(body.to_string()));
    }

    #[tokio::test]
    async fn shutdown_rejects_before_any_other_check() {
        let (gate, sink) = gate(context(&[("AUTHORIZATION_REQUIRED", "true")]), PairedControllers::default());
        gate.live.cancel();
        let result = admit(&gate, request(Method::GET, "/elsewhere", None, "")).await;
        assert_eq!(result, Err(Rejection::Gone));
        assert_eq!(admit(&gate, put(r#"{"Switch_Hall": "Yes"}"#)).await, Err(Rejection::Gone));
        assert!(sink.metrics().is_empty());
    }

    #[tokio::test]
    async fn authorization_precedes_path_check() {
        let (gate, _) = gate(context(&[("AUTHORIZATION_REQUIRED", "true")]), PairedControllers::default());
        let result = admit(&gate, request(Method::GET, "/elsewhere", None, "")).await;
        assert_eq!(result, Err(Rejection::Forbidden));
    }

    #[tokio::test]
    async fn paired_controller_is_authorized() {
        let controller = IpAddr::V4(Ipv4Addr::LOCALHOST);
        let (gate, _) = gate(
            context(&[("AUTHORIZATION_REQUIRED", "true")]),
            PairedControllers::new([controller]),
        );
        let mut req = put(r#"{"Switch_Hall": "No"}"#);
        req.extensions_mut().insert(ConnectInfo(SocketAddr::new(controller, 50000)));
        assert_eq!(admit(&gate, req).await, Ok("Ok".to_string()));
    }

    #[tokio::test]
    async fn path_method_and_content_type_are_checked_in_order() {
        let (gate, _) = gate(context(&[]), PairedControllers::default());

        let result = admit(&gate, request(Method::POST, "/other", Some("text/plain"), "{}")).await;
        assert_eq!(result, Err(Rejection::NotFound));

        let result = admit(&gate, request(Method::POST, "/monitor", Some("text/plain"), "not json")).await;
        assert_eq!(result, Err(Rejection::InvalidMethod));

        let result = admit(&gate, request(Method::PUT, "/monitor", Some("application/json; charset=utf-8"), "not json")).await;
        assert_eq!(result, Err(Rejection::InvalidContentType));

        let result = admit(&gate, request(Method::PUT, "/monitor", None, "{}")).await;
        assert_eq!(result, Err(Rejection::InvalidContentType));
    }

    #[tokio::test]
    async fn method_and_content_type_reject_before_reading_the_body() {
        let (gate, _) = gate(context(&[]), PairedControllers::default());
        let unreadable = "x".repeat(MAX_BODY_BYTES + 1);

        let result = admit(&gate, request(Method::POST, "/monitor", Some("application/json"), &unreadable)).await;
        assert_eq!(result, Err(Rejection::InvalidMethod));

        let result = admit(&gate, request(Method::PUT, "/monitor", Some("text/plain"), &unreadable)).await;
        assert_eq!(result, Err(Rejection::InvalidContentType));

        let result = admit(&gate, put(&unreadable)).await;
        assert_eq!(result, Err(Rejection::UnreadableBody));
    }

    #[tokio::test]
    async fn oversized_body_is_unreadable() {
        let (gate, _) = gate(context(&[]), PairedControllers::default());
        let huge = format!(r#"{{"Key": "{}"}}"#, "x".repeat(MAX_BODY_BYTES));
        assert_eq!(admit(&gate, put(&huge)).await, Err(Rejection::UnreadableBody));
    }

    #[tokio::test]
    async fn only_flat_string_maps_are_accepted() {
        let (gate, sink) = gate(context(&[]), PairedControllers::default());
        for body in [r#"{"Key": 12}"#, r#"{"Key": {"nested": "x"}}"#, r#"["Yes"]"#, "not json"] {
            assert_eq!(admit(&gate, put(body)).await, Err(Rejection::InvalidBody));
        }
        assert!(sink.metrics().is_empty());
    }

    #[test]
    fn rejection_status_codes() {
        assert_eq!(Rejection::Gone.status(), StatusCode::GONE);
        assert_eq!(Rejection::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(Rejection::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(Rejection::InvalidMethod.status(), StatusCode::BAD_REQUEST);
        assert_eq!(Rejection::InvalidBody.status(), StatusCode::BAD_REQUEST);
    }

    async fn start_server(vars: &[(&str, &str)]) -> (IngestServer, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::default());
        let emitter = MetricEmitter::new("Monitor", MeasurementNames::default(), sink.clone());
        let server = IngestServer::start(context(vars), emitter, Arc::new(PairedControllers::default()))
            .await
            .unwrap();
        (server, sink)
    }

    #[tokio::test]
    async fn server_round_trip_over_http() {
        let (server, sink) = start_server(&[]).await;
        let url = format!("http://{}/monitor", server.local_addr);
        let client = reqwest::Client::new();

        let response = client.put(&url)
            .header("Content-type", "application/json")
            .body(r#"{"Temp_Room_Sensor": "12,3 °C", "Bad Key": "???"}"#)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        assert_eq!(response.text().await.unwrap(), "Ok");
        assert_eq!(sink.metrics().len(), 1);

        let response = client.get(&url).send().await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
        assert!(response.text().await.unwrap().is_empty());

        let response = client.get(format!("http://{}/missing", server.local_addr)).send().await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);

        server.stop().await;
        assert!(server.tracker.is_empty());
        assert!(client.put(&url).send().await.is_err());
    }

    #[tokio::test]
    async fn remote_peer_reaches_the_authorizer() {
        let (server, _) = start_server(&[("AUTHORIZATION_REQUIRED", "true")]).await;
        let response = reqwest::Client::new()
            .put(format!("http://{}/monitor", server.local_addr))
            .header("Content-type", "application/json")
            .body("{}")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::FORBIDDEN);
        server.stop().await;
    }

    #[tokio::test]
    async fn bind_failure_is_a_startup_error() {
        let (server, _) = start_server(&[]).await;
        let taken = server.local_addr.to_string();
        let sink = Arc::new(MemorySink::default());
        let result = IngestServer::start(
            context(&[("MONITOR_ADDRESS", taken.as_str())]),
            MetricEmitter::new("Monitor", MeasurementNames::default(), sink),
            Arc::new(PairedControllers::default()),
        ).await;
        assert!(matches!(result, Err(StartupError::Bind { .. })));
        server.stop().await;
    }
}
