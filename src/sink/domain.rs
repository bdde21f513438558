//! Estructuras de dominio para el envío de métricas.
//!
//! El motor solo ve el trait `MetricSink`. La implementación incluida desacopla
//! la ingesta del envío usando un canal MPSC acotado: las tareas de ingesta nunca
//! esperan por la red, y la tarea del sink decide cuándo volcar.


use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::warn;
use thiserror::Error;
use crate::config::sink::BATCH_SIZE;
use crate::metric::domain::{Metric, MetricSink};


#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to build HTTP client")]
    Client(#[source] reqwest::Error),

    #[error("failed to forward metrics to {url}")]
    Forward {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}


/// Sink que deposita cada métrica en el canal de la tarea de envío.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<Metric>,
}


impl ChannelSink {
    pub fn new(tx: mpsc::Sender<Metric>) -> Self {
        Self { tx }
    }
}


impl MetricSink for ChannelSink {
    fn record(&self, metric: Metric) {
        match self.tx.try_send(metric) {
            Ok(()) => {}
            Err(TrySendError::Full(metric)) => {
                warn!("Warning: canal de métricas lleno, descartando {}", metric.measurement);
            }
            Err(TrySendError::Closed(metric)) => {
                warn!("Warning: canal de métricas cerrado, descartando {}", metric.measurement);
            }
        }
    }
}


/// Buffer de acumulación de métricas previo al volcado por lotes.
///
/// Reserva `BATCH_SIZE` al crearse y reutiliza la memoria entre ciclos.
#[derive(Debug)]
pub struct MetricBuffer {
    metrics: Vec<Metric>,
}


impl MetricBuffer {
    pub fn new() -> Self {
        Self { metrics: Vec::with_capacity(BATCH_SIZE) }
    }

    pub fn push(&mut self, metric: Metric) {
        self.metrics.push(metric);
    }

    pub fn is_full(&self) -> bool {
        self.metrics.len() >= BATCH_SIZE
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    /// Devuelve el lote en line protocol (una línea por métrica) y vacía el buffer.
    ///
    /// Una métrica sin campos representables se descarta sola; el resto del lote sigue.
    pub fn drain_lines(&mut self) -> Vec<String> {
        self.metrics
            .drain(..)
            .filter_map(|metric| {
                let line = metric.to_line_protocol();
                if line.is_none() {
                    warn!("Warning: métrica {} sin campos representables, descartada", metric.measurement);
                }
                line
            })
            .collect()
    }
}


/// Sink en memoria para pruebas.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemorySink {
    metrics: std::sync::Mutex<Vec<Metric>>,
}


#[cfg(test)]
impl MemorySink {
    pub fn metrics(&self) -> Vec<Metric> {
        self.metrics.lock().unwrap().clone()
    }
}


#[cfg(test)]
impl MetricSink for MemorySink {
    fn record(&self, metric: Metric) {
        self.metrics.lock().unwrap().push(metric);
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::domain::ClassifiedValue;
    use crate::metric::domain::MeasurementNames;
    use crate::metric::logic::build_metric;
    use crate::payload::domain::DecomposedKey;

    fn light(name: &str, lux: f64) -> Metric {
        let key = DecomposedKey {
            name: name.to_string(),
            room: "Hall".to_string(),
            characteristic: "generic".to_string(),
        };
        build_metric("Monitor", &MeasurementNames::default(), &key, &ClassifiedValue::LightLevel { lux })
    }

    #[test]
    fn unrepresentable_metric_does_not_spoil_the_batch() {
        let mut buffer = MetricBuffer::new();
        buffer.push(light("Good", 1.0));
        buffer.push(light("Bad", f64::NAN));
        buffer.push(light("Forged\nx_y_z,homekit_room=Evil lux=0", 2.0));

        let lines = buffer.drain_lines();
        assert!(buffer.is_empty());
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("homekit_name=Good"));
        assert!(lines[1].contains("homekit_name=Forgedx_y_z\\,homekit_room\\=Evil\\ lux\\=0"));
        assert_eq!(lines.join("\n").lines().count(), 2);
    }
}
