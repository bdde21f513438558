//! Definición del Contexto de Aplicación (Shared State).
//!
//! Este módulo implementa el patrón de **Estado Compartido** para aplicaciones asíncronas.
//! El `AppContext` agrupa los recursos de solo lectura que deben ser accesibles por
//! múltiples tareas concurrentes (Configuración, Tabla de sufijos, Nombres de medición).
//! Todo se construye una vez al inicio y nunca se modifica, por lo que se lee sin locks.


use std::sync::Arc;
use crate::classify::domain::SuffixTable;
use crate::metric::domain::MeasurementNames;
use crate::system::domain::System;


#[derive(Clone, Debug)]
pub struct AppContext {
    pub system: Arc<System>,
    pub rules: Arc<SuffixTable>,
    pub names: Arc<MeasurementNames>,
}


impl AppContext {
    pub fn new(system: System) -> Self {
        let rules = Arc::new(SuffixTable::from_system(&system));
        let names = Arc::new(MeasurementNames::from_system(&system));
        Self { system: Arc::new(system), rules, names }
    }
}
