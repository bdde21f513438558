//! Procesamiento de payloads de ingesta.
//!
//! Cada entrada se procesa de forma independiente: clave → dimensiones,
//! valor → medición tipada, y luego emisión. Una entrada inválida se loguea y se
//! omite sin afectar al resto del lote.


use tracing::{debug, warn};
use crate::classify::domain::SuffixTable;
use crate::classify::logic::classify;
use crate::metric::domain::MetricEmitter;
use crate::payload::domain::{DecomposedKey, DecompositionError, DispatchSummary, Payload,
                             DEFAULT_CHARACTERISTIC, DEFAULT_ROOM};


/// Separa una clave en (nombre, habitación, característica).
///
/// Se divide en `_` como máximo en 3 segmentos; el tercero puede contener más `_`.
/// Los segmentos ausentes toman `"undefined"` y `"generic"`.
pub fn decompose(key: &str) -> Result<DecomposedKey, DecompositionError> {
    if key.is_empty() {
        return Err(DecompositionError::EmptyKey);
    }

    let mut parts = key.splitn(3, '_');
    let name = parts.next().unwrap_or_default();
    let room = parts.next().unwrap_or(DEFAULT_ROOM);
    let characteristic = parts.next().unwrap_or(DEFAULT_CHARACTERISTIC);

    Ok(DecomposedKey {
        name: name.to_string(),
        room: room.to_string(),
        characteristic: characteristic.to_string(),
    })
}


/// Despacha todas las entradas del payload hacia clasificación y emisión.
///
/// # Retorno
/// Cantidad de métricas emitidas y de entradas omitidas. Las omisiones nunca
/// interrumpen el procesamiento del resto.
pub fn dispatch(table: &SuffixTable,
                emitter: &MetricEmitter,
                payload: &Payload) -> DispatchSummary {

    let mut summary = DispatchSummary::default();

    for (key, value) in payload.iter() {
        let decomposed = match decompose(key) {
            Ok(decomposed) => decomposed,
            Err(e) => {
                warn!("Warning: clave inválida '{}' = '{}' ({})", key, value, e);
                summary.skipped += 1;
                continue;
            }
        };

        match classify(table, value) {
            Ok(classified) => {
                debug!("Debug: {} = {:?}", key, classified);
                emitter.emit(&decomposed, &classified);
                summary.emitted += 1;
            }
            Err(e) if e.is_parse_error() => {
                warn!("Warning: no se pudo interpretar '{}' = '{}' ({})", key, value, e);
                summary.skipped += 1;
            }
            Err(e) => {
                warn!("Warning: entrada no reconocida '{}' = '{}' ({})", key, value, e);
                summary.skipped += 1;
            }
        }
    }

    summary
}
