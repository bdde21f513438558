//! Dominio del Payload de ingesta.
//!
//! Un payload es el cuerpo JSON decodificado de un pedido: un mapa plano
//! de texto a texto. Vive solo mientras dura el procesamiento del pedido.


use std::collections::HashMap;
use serde::Deserialize;
use thiserror::Error;


pub const DEFAULT_ROOM: &str = "undefined";
pub const DEFAULT_CHARACTERISTIC: &str = "generic";


/// Cuerpo decodificado de un pedido de monitoreo.
///
/// Cualquier valor que no sea texto (números, objetos anidados) hace fallar la decodificación.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Payload(pub HashMap<String, String>);


impl Payload {
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}


/// Dimensiones semánticas derivadas de la clave `<nombre>_<habitación>_<característica>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecomposedKey {
    pub name: String,
    pub room: String,
    pub characteristic: String,
}


#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecompositionError {
    #[error("empty data key")]
    EmptyKey,
}


/// Resultado del procesamiento de un payload completo.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub emitted: usize,
    pub skipped: usize,
}
