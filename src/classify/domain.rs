//! Dominio de Clasificación de Valores.
//!
//! Define la tabla ordenada de sufijos/palabras reconocidas y los tipos resultantes
//! de clasificar un valor de texto enviado por el hub.
//!
//! # Precedencia
//! La tabla se recorre siempre en el orden fijo Celsius, Fahrenheit, Lux, Hue,
//! Active, Inactive. El primer tipo con un token coincidente gana, aunque otro tipo
//! posterior también pudiera coincidir (ej. `"°"` de Hue frente a `" °C"`).


use std::num::{ParseFloatError, ParseIntError};
use thiserror::Error;
use crate::classify::logic::{build_active, build_celsius, build_fahrenheit, build_hue, build_inactive, build_lux};
use crate::system::domain::System;


/// Tipos de medición reconocibles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Celsius,
    Fahrenheit,
    Lux,
    Hue,
    Active,
    Inactive,
}


/// Forma de comparar un token contra el valor crudo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// El valor (sin espacios externos) termina en el token; el resto se interpreta.
    Suffix,
    /// El valor crudo es exactamente el token.
    Exact,
}


impl Kind {
    pub const PRECEDENCE: [Kind; 6] = [
        Kind::Celsius,
        Kind::Fahrenheit,
        Kind::Lux,
        Kind::Hue,
        Kind::Active,
        Kind::Inactive,
    ];

    pub fn match_mode(self) -> MatchMode {
        match self {
            Kind::Active | Kind::Inactive => MatchMode::Exact,
            _ => MatchMode::Suffix,
        }
    }

    fn builder(self) -> Builder {
        match self {
            Kind::Celsius => build_celsius,
            Kind::Fahrenheit => build_fahrenheit,
            Kind::Lux => build_lux,
            Kind::Hue => build_hue,
            Kind::Active => build_active,
            Kind::Inactive => build_inactive,
        }
    }
}


/// Interpreta el resto del valor (ya sin el token) y construye el valor clasificado.
pub type Builder = fn(&str) -> Result<ClassifiedValue, ClassificationError>;


/// Grupo de tokens sinónimos para un tipo de medición, junto a su constructor.
#[derive(Debug, Clone)]
pub struct SuffixRule {
    pub kind: Kind,
    pub tokens: Vec<String>,
    pub build: Builder,
}


impl SuffixRule {
    pub fn new(kind: Kind, tokens: Vec<String>) -> Self {
        Self { kind, tokens, build: kind.builder() }
    }
}


/// Tabla de reglas, inmutable luego de construida y compartida entre pedidos concurrentes.
#[derive(Debug, Clone)]
pub struct SuffixTable {
    rules: Vec<SuffixRule>,
}


impl SuffixTable {

    /// Construye la tabla a partir de los tokens de cada tipo.
    ///
    /// Las reglas quedan siempre en el orden de `Kind::PRECEDENCE`, sin importar
    /// el orden en que se entreguen; dentro de cada tipo se respeta el orden dado.
    pub fn new<I>(groups: I) -> Self
    where
        I: IntoIterator<Item = (Kind, Vec<String>)>,
    {
        let mut groups: Vec<(Kind, Vec<String>)> = groups.into_iter().collect();
        let rules = Kind::PRECEDENCE
            .iter()
            .map(|kind| {
                let tokens = groups
                    .iter_mut()
                    .filter(|(k, _)| k == kind)
                    .flat_map(|(_, tokens)| std::mem::take(tokens))
                    .filter(|token| !token.is_empty())
                    .collect();
                SuffixRule::new(*kind, tokens)
            })
            .collect();
        Self { rules }
    }

    pub fn from_system(system: &System) -> Self {
        Self::new([
            (Kind::Celsius, system.celsius_suffixes.clone()),
            (Kind::Fahrenheit, system.fahrenheit_suffixes.clone()),
            (Kind::Lux, system.lux_suffixes.clone()),
            (Kind::Hue, system.hue_suffixes.clone()),
            (Kind::Active, system.active_state_values.clone()),
            (Kind::Inactive, system.inactive_state_values.clone()),
        ])
    }

    pub fn rules(&self) -> &[SuffixRule] {
        &self.rules
    }
}


/// Medición tipada obtenida de un valor de texto.
#[derive(Debug, Clone, PartialEq)]
pub enum ClassifiedValue {
    /// Ambas unidades siempre presentes, sin importar la unidad de entrada.
    Temperature { celsius: f64, fahrenheit: f64 },
    LightLevel { lux: f64 },
    Hue { degrees: i32 },
    /// `percent` es 100 si está activo, 0 si no.
    State { active: bool, percent: i32 },
}


/// Motivo por el cual un valor no pudo clasificarse.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClassificationError {
    #[error("unrecognized value type")]
    NoMatch,

    #[error("failed to parse decimal value '{text}'")]
    Float {
        text: String,
        #[source]
        source: ParseFloatError,
    },

    #[error("failed to parse integer value '{text}'")]
    Integer {
        text: String,
        #[source]
        source: ParseIntError,
    },
}


impl ClassificationError {
    /// `true` si un token coincidió pero el número no pudo interpretarse.
    pub fn is_parse_error(&self) -> bool {
        !matches!(self, ClassificationError::NoMatch)
    }
}
