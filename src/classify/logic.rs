use crate::classify::domain::{ClassificationError, ClassifiedValue, MatchMode, SuffixTable};


/// Clasifica un valor crudo recorriendo la tabla en su orden de precedencia.
///
/// # Flujo
/// 1. Para cada regla (Celsius, Fahrenheit, Lux, Hue, Active, Inactive):
///    - Tipos de unidad: el valor sin espacios externos debe terminar en el token.
///    - Tipos de estado: el valor crudo debe ser idéntico al token.
/// 2. La primera coincidencia gana; el token se quita y el resto lo interpreta el constructor.
/// 3. Sin coincidencias se devuelve `ClassificationError::NoMatch`.
pub fn classify(table: &SuffixTable, raw: &str) -> Result<ClassifiedValue, ClassificationError> {

    let trimmed = raw.trim();

    for rule in table.rules() {
        for token in &rule.tokens {
            let rest = match rule.kind.match_mode() {
                MatchMode::Suffix => trimmed.strip_suffix(token.as_str()),
                MatchMode::Exact => (raw == token.as_str()).then_some(""),
            };
            if let Some(rest) = rest {
                return (rule.build)(rest);
            }
        }
    }

    Err(ClassificationError::NoMatch)
}


/// Interpreta un decimal aceptando coma como separador.
///
/// Toda coma se reemplaza por punto antes de interpretar; no hay soporte para
/// separadores de miles.
pub fn parse_float(text: &str) -> Result<f64, ClassificationError> {
    let normalized = text.replace(',', ".");
    normalized.parse::<f64>().map_err(|source| ClassificationError::Float {
        text: text.to_string(),
        source,
    })
}


pub fn parse_int(text: &str) -> Result<i32, ClassificationError> {
    text.parse::<i32>().map_err(|source| ClassificationError::Integer {
        text: text.to_string(),
        source,
    })
}


pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    celsius * 1.8 + 32.0
}


pub fn fahrenheit_to_celsius(fahrenheit: f64) -> f64 {
    (fahrenheit - 32.0) / 1.8
}


pub fn build_celsius(rest: &str) -> Result<ClassifiedValue, ClassificationError> {
    let celsius = parse_float(rest)?;
    Ok(ClassifiedValue::Temperature {
        celsius,
        fahrenheit: celsius_to_fahrenheit(celsius),
    })
}


pub fn build_fahrenheit(rest: &str) -> Result<ClassifiedValue, ClassificationError> {
    let fahrenheit = parse_float(rest)?;
    Ok(ClassifiedValue::Temperature {
        celsius: fahrenheit_to_celsius(fahrenheit),
        fahrenheit,
    })
}


pub fn build_lux(rest: &str) -> Result<ClassifiedValue, ClassificationError> {
    Ok(ClassifiedValue::LightLevel { lux: parse_float(rest)? })
}


pub fn build_hue(rest: &str) -> Result<ClassifiedValue, ClassificationError> {
    Ok(ClassifiedValue::Hue { degrees: parse_int(rest)? })
}


pub fn build_active(_: &str) -> Result<ClassifiedValue, ClassificationError> {
    Ok(ClassifiedValue::State { active: true, percent: 100 })
}


pub fn build_inactive(_: &str) -> Result<ClassifiedValue, ClassificationError> {
    Ok(ClassifiedValue::State { active: false, percent: 0 })
}
