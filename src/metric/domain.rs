//! Dominio de Métricas.
//!
//! Una métrica es el registro (medición, tags, campos) que se entrega al sink
//! externo por cada entrada clasificada con éxito. Una vez entregada, el motor
//! no vuelve a tocarla.


use std::collections::BTreeMap;
use std::sync::Arc;
use chrono::{DateTime, Utc};
use crate::system::domain::System;


pub const TAG_MONITOR: &str = "homekit_monitor";
pub const TAG_NAME: &str = "homekit_name";
pub const TAG_ROOM: &str = "homekit_room";
pub const TAG_CHARACTERISTIC: &str = "homekit_characteristic";


/// Valor de un campo de métrica.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    Float(f64),
    Integer(i64),
    Boolean(bool),
}


/// Registro de una medición etiquetada.
///
/// Los tags siempre contienen las cuatro claves `homekit_*`.
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    pub measurement: String,
    pub tags: BTreeMap<String, String>,
    pub fields: BTreeMap<String, FieldValue>,
    pub timestamp: DateTime<Utc>,
}


/// Nombres de medición por variante clasificada.
///
/// Las mediciones de luz tuvieron nombres distintos entre versiones
/// (`homekit_lightlevel` / `homekit_light_level`), por eso son configurables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeasurementNames {
    pub temperature: String,
    pub light_level: String,
    pub light_hue: String,
    pub state: String,
}


impl Default for MeasurementNames {
    fn default() -> Self {
        Self {
            temperature: "homekit_temperature".to_string(),
            light_level: "homekit_lightlevel".to_string(),
            light_hue: "homekit_lighthue".to_string(),
            state: "homekit_state".to_string(),
        }
    }
}


impl MeasurementNames {
    pub fn from_system(system: &System) -> Self {
        Self {
            light_level: system.light_level_measurement.clone(),
            light_hue: system.light_hue_measurement.clone(),
            ..Self::default()
        }
    }
}


/// Destino externo de las métricas (registro de solo escritura).
///
/// Se llama desde varias tareas de ingesta en paralelo, por lo que debe ser
/// `Send + Sync` y no bloquear al llamador.
pub trait MetricSink: Send + Sync {
    fn record(&self, metric: Metric);
}


/// Construye y entrega las métricas de un monitor.
///
/// No guarda estado propio entre llamadas: cada emisión es independiente.
#[derive(Clone)]
pub struct MetricEmitter {
    pub monitor: String,
    pub names: MeasurementNames,
    pub sink: Arc<dyn MetricSink>,
}
