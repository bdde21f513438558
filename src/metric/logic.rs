use std::collections::BTreeMap;
use std::sync::Arc;
use chrono::Utc;
use crate::classify::domain::ClassifiedValue;
use crate::metric::domain::{FieldValue, MeasurementNames, Metric, MetricEmitter, MetricSink,
                            TAG_CHARACTERISTIC, TAG_MONITOR, TAG_NAME, TAG_ROOM};
use crate::payload::domain::DecomposedKey;


impl MetricEmitter {
    pub fn new(monitor: impl Into<String>,
               names: MeasurementNames,
               sink: Arc<dyn MetricSink>) -> Self {
        Self { monitor: monitor.into(), names, sink }
    }

    /// Construye la métrica de un valor clasificado y la entrega al sink (una llamada por entrada).
    pub fn emit(&self, key: &DecomposedKey, value: &ClassifiedValue) {
        self.sink.record(build_metric(&self.monitor, &self.names, key, value));
    }
}


/// Selecciona medición y campos según la variante y agrega los cuatro tags fijos.
///
/// | Variante    | Medición              | Campos                 |
/// |-------------|-----------------------|------------------------|
/// | Temperature | `names.temperature`   | `celsius`, `fahrenheit`|
/// | LightLevel  | `names.light_level`   | `lux`                  |
/// | Hue         | `names.light_hue`     | `hue`                  |
/// | State       | `names.state`         | `active`, `percent`    |
pub fn build_metric(monitor: &str,
                    names: &MeasurementNames,
                    key: &DecomposedKey,
                    value: &ClassifiedValue) -> Metric {

    let tags = BTreeMap::from([
        (TAG_MONITOR.to_string(), monitor.to_string()),
        (TAG_NAME.to_string(), key.name.clone()),
        (TAG_ROOM.to_string(), key.room.clone()),
        (TAG_CHARACTERISTIC.to_string(), key.characteristic.clone()),
    ]);

    let (measurement, fields) = match *value {
        ClassifiedValue::Temperature { celsius, fahrenheit } => (
            &names.temperature,
            vec![
                ("celsius", FieldValue::Float(celsius)),
                ("fahrenheit", FieldValue::Float(fahrenheit)),
            ],
        ),
        ClassifiedValue::LightLevel { lux } => (
            &names.light_level,
            vec![("lux", FieldValue::Float(lux))],
        ),
        ClassifiedValue::Hue { degrees } => (
            &names.light_hue,
            vec![("hue", FieldValue::Integer(i64::from(degrees)))],
        ),
        ClassifiedValue::State { active, percent } => (
            &names.state,
            vec![
                ("active", FieldValue::Boolean(active)),
                ("percent", FieldValue::Integer(i64::from(percent))),
            ],
        ),
    };

    Metric {
        measurement: measurement.clone(),
        tags,
        fields: fields.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
        timestamp: Utc::now(),
    }
}


impl FieldValue {
    /// Formato de campo del line protocol: enteros con sufijo `i`.
    ///
    /// `NaN` e infinitos no tienen representación y devuelven `None`.
    pub fn to_line_protocol(&self) -> Option<String> {
        match self {
            FieldValue::Float(v) if !v.is_finite() => None,
            FieldValue::Float(v) => Some(format!("{}", v)),
            FieldValue::Integer(v) => Some(format!("{}i", v)),
            FieldValue::Boolean(v) => Some(v.to_string()),
        }
    }
}


impl Metric {
    /// Serializa la métrica como una línea del line protocol de InfluxDB:
    /// `medición,tag=v,... campo=v,... timestamp_ns`
    ///
    /// Los tags con valor vacío se omiten y los campos no finitos se descartan.
    /// Devuelve `None` si no queda ningún campo.
    pub fn to_line_protocol(&self) -> Option<String> {
        let fields: Vec<String> = self.fields
            .iter()
            .filter_map(|(key, value)| {
                let value = value.to_line_protocol()?;
                Some(format!("{}={}", escape_key(key), value))
            })
            .collect();
        if fields.is_empty() {
            return None;
        }

        let mut line = escape_measurement(&self.measurement);

        for (key, value) in &self.tags {
            let value = escape_key(value);
            if value.is_empty() {
                continue;
            }
            line.push(',');
            line.push_str(&escape_key(key));
            line.push('=');
            line.push_str(&value);
        }

        line.push(' ');
        line.push_str(&fields.join(","));

        if let Some(nanos) = self.timestamp.timestamp_nanos_opt() {
            line.push(' ');
            line.push_str(&nanos.to_string());
        }
        Some(line)
    }
}


/// Quita `\n`/`\r` y escapa `\\`. Debe aplicarse antes de los demás escapes.
fn sanitize(s: &str) -> String {
    s.chars()
        .filter(|c| *c != '\n' && *c != '\r')
        .collect::<String>()
        .replace('\\', "\\\\")
}


fn escape_measurement(s: &str) -> String {
    sanitize(s)
        .replace(',', "\\,")
        .replace(' ', "\\ ")
}


/// Tags y claves de campo: comas, igual y espacios se escapan.
fn escape_key(s: &str) -> String {
    sanitize(s)
        .replace(',', "\\,")
        .replace('=', "\\=")
        .replace(' ', "\\ ")
}
