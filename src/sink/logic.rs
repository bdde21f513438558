//! Tarea de envío de métricas.
//!
//! Acumula las métricas recibidas por el canal y las vuelca en lotes, ya sea
//! por tamaño (`BATCH_SIZE`) o por tiempo (`FLUSH_INTERVAL`). Cada lote se envía
//! como line protocol a `SINK_URL`; sin URL configurada, las líneas se loguean.
//! Un lote que falla se descarta: no hay reintentos.


use reqwest::header::CONTENT_TYPE;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, instrument};
use crate::config::sink::{FLUSH_INTERVAL, HTTP_TIMEOUT};
use crate::metric::domain::Metric;
use crate::sink::domain::{MetricBuffer, SinkError};
use crate::system::domain::System;


/// Destino final de los lotes.
#[derive(Debug, Clone)]
pub enum Forwarder {
    Http { client: reqwest::Client, url: String },
    Log,
}


impl Forwarder {
    pub fn from_system(system: &System) -> Result<Self, SinkError> {
        match &system.sink_url {
            Some(url) => {
                let client = reqwest::Client::builder()
                    .timeout(HTTP_TIMEOUT)
                    .build()
                    .map_err(SinkError::Client)?;
                Ok(Forwarder::Http { client, url: url.clone() })
            }
            None => Ok(Forwarder::Log),
        }
    }

    pub async fn forward(&self, lines: Vec<String>) -> Result<(), SinkError> {
        match self {
            Forwarder::Http { client, url } => {
                client.post(url)
                    .header(CONTENT_TYPE, "text/plain; charset=utf-8")
                    .body(lines.join("\n"))
                    .send()
                    .await
                    .and_then(|response| response.error_for_status())
                    .map_err(|source| SinkError::Forward { url: url.clone(), source })?;
                Ok(())
            }
            Forwarder::Log => {
                for line in lines {
                    info!("Info: métrica {}", line);
                }
                Ok(())
            }
        }
    }
}


async fn flush(buffer: &mut MetricBuffer, forwarder: &Forwarder) {
    if buffer.is_empty() {
        return;
    }
    debug!("Debug: volcando lote de {} métricas", buffer.len());
    if let Err(e) = forwarder.forward(buffer.drain_lines()).await {
        error!("Error: no se pudo enviar el lote de métricas. {e}");
    }
}


/// Ejecuta el bucle de acumulación y volcado.
///
/// Termina cuando todos los emisores del canal se cerraron, volcando antes lo pendiente.
#[instrument(name = "run_sink_task", skip(rx, forwarder))]
pub async fn sink_task(mut rx: mpsc::Receiver<Metric>,
                       forwarder: Forwarder) {

    info!("Info: sink task creada");

    let mut buffer = MetricBuffer::new();
    let mut ticker = interval(FLUSH_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            msg = rx.recv() => {
                match msg {
                    Some(metric) => {
                        buffer.push(metric);
                        if buffer.is_full() {
                            flush(&mut buffer, &forwarder).await;
                        }
                    }
                    None => {
                        flush(&mut buffer, &forwarder).await;
                        break;
                    }
                }
            }
            _ = ticker.tick() => {
                flush(&mut buffer, &forwarder).await;
            }
        }
    }

    info!("Info: sink task finalizada");
}


pub fn start_sink(rx_from_emitter: mpsc::Receiver<Metric>,
                  forwarder: Forwarder) -> JoinHandle<()> {

    info!("Info: iniciando tarea sink");
    tokio::spawn(async move {
        sink_task(rx_from_emitter, forwarder).await;
    })
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use axum::{extract::State, routing::post, Router};
    use tokio::net::TcpListener;
    use crate::classify::domain::ClassifiedValue;
    use crate::metric::domain::{MeasurementNames, MetricSink};
    use crate::metric::logic::build_metric;
    use crate::payload::domain::DecomposedKey;
    use crate::sink::domain::ChannelSink;

    type Received = Arc<Mutex<Vec<String>>>;

    async fn spawn_receiver() -> (String, Received) {
        let received: Received = Arc::default();
        let app = Router::new()
            .route("/write", post(|State(received): State<Received>, body: String| async move {
                received.lock().unwrap().push(body);
            }))
            .with_state(received.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/write", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (url, received)
    }

    fn metric(lux: f64) -> Metric {
        let key = DecomposedKey {
            name: "Sensor".to_string(),
            room: "Hall".to_string(),
            characteristic: "generic".to_string(),
        };
        build_metric("Monitor", &MeasurementNames::default(), &key, &ClassifiedValue::LightLevel { lux })
    }

    #[tokio::test]
    async fn pending_metrics_are_flushed_when_channel_closes() {
        let (url, received) = spawn_receiver().await;
        let forwarder = Forwarder::Http { client: reqwest::Client::new(), url };
        let (tx, rx) = mpsc::channel(10);
        let handle = start_sink(rx, forwarder);

        let sink = ChannelSink::new(tx);
        sink.record(metric(1.0));
        sink.record(metric(2.5));
        drop(sink);
        handle.await.unwrap();

        let bodies = received.lock().unwrap().clone();
        let lines: Vec<&str> = bodies.iter().flat_map(|body| body.lines()).collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("homekit_lightlevel,"));
        assert!(lines[0].contains(" lux=1 "));
        assert!(lines[1].contains(" lux=2.5 "));
    }

    #[tokio::test]
    async fn forward_failure_is_reported() {
        let forwarder = Forwarder::Http {
            client: reqwest::Client::new(),
            url: "http://127.0.0.1:9/write".to_string(),
        };
        let result = forwarder.forward(vec![metric(1.0).to_line_protocol().unwrap()]).await;
        assert!(matches!(result, Err(SinkError::Forward { .. })));
    }

    #[test]
    fn full_channel_drops_instead_of_blocking() {
        let (tx, mut rx) = mpsc::channel(1);
        let sink = ChannelSink::new(tx);
        sink.record(metric(1.0));
        sink.record(metric(2.0));
        assert_eq!(rx.try_recv().unwrap().fields.len(), 1);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn missing_url_logs_only() {
        let system = System::from_lookup(|_| None).unwrap();
        assert!(matches!(Forwarder::from_system(&system), Ok(Forwarder::Log)));
    }
}
