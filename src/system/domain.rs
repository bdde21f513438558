//! Módulo de configuración central y gestión del entorno de ejecución.
//!
//! Este módulo actúa como la fuente única de verdad para la configuración del servicio.
//! Se encarga de leer las variables de entorno, establecer valores por defecto seguros
//! y proveer las estructuras necesarias para iniciar los subsistemas (Ingesta HTTP,
//! Pulso periódico, Sink de métricas, Logging).
//!
//! # Funcionalidades Principales
//! * **Carga de Configuración:** Lee de `.env` en desarrollo y variables de sistema en producción.
//! * **Observabilidad:** Configura `tracing_subscriber` para logs estructurados o legibles.
//! * **Reglas de Clasificación:** Listas ordenadas de sufijos y palabras de estado.
//!
//! La configuración es inmutable una vez construida y se comparte vía `Arc`.


use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use thiserror::Error;
use tracing_subscriber::{fmt, EnvFilter};


/// Errores al interpretar la configuración del entorno.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} debe ser {expected} (valor: {value})")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },

    #[error("{name} debe ser una lista JSON de textos")]
    TokenList {
        name: &'static str,
        #[source]
        source: serde_json::Error,
    },
}


/// Representa la configuración global del servicio y el estado del entorno.
///
/// Centraliza todas las variables de entorno necesarias para iniciar los servicios.
#[derive(Debug, Clone)]
pub struct System {
    /// Entorno de ejecución actual (`development`, `staging`, `production`).
    /// Afecta el formato de logs y la carga de archivos `.env`.
    pub environment: String,

    /// Nivel de detalle de los logs (ej. `info`, `debug`, `warn`).
    /// Se autoconfigura según el `environment` si no se especifica.
    pub rust_log: String,

    /// Dirección (host:puerto) donde escucha el endpoint de ingesta.
    /// Por defecto: `0.0.0.0:8001`.
    pub monitor_address: SocketAddr,

    /// Ruta que recibe los pedidos de monitoreo.
    /// Por defecto: `/monitor`.
    pub monitor_path: String,

    /// Solo aceptar pedidos de clientes autorizados.
    /// Por defecto: `true`.
    pub authorization_required: bool,

    /// IPs de los controladores emparejados que el oráculo incluido considera autorizados.
    pub paired_controllers: Vec<IpAddr>,

    /// Nombre del accesorio de monitoreo; se publica como tag `homekit_monitor`.
    pub monitor_accessory_name: String,

    pub celsius_suffixes: Vec<String>,
    pub fahrenheit_suffixes: Vec<String>,
    pub lux_suffixes: Vec<String>,
    pub hue_suffixes: Vec<String>,
    pub active_state_values: Vec<String>,
    pub inactive_state_values: Vec<String>,

    /// Nombre de la medición de nivel de luz (`homekit_lightlevel` por defecto).
    pub light_level_measurement: String,

    /// Nombre de la medición de tono de luz (`homekit_lighthue` por defecto).
    pub light_hue_measurement: String,

    /// Intervalo en segundos entre pulsos del accesorio.
    /// Por defecto: `10` segundos.
    pub gather_interval_secs: u64,

    /// Endpoint HTTP que acepta line protocol de InfluxDB. Sin valor, las métricas solo se loguean.
    pub sink_url: Option<String>,

    /// Logs detallados por pedido y eco del cuerpo recibido.
    pub debug: bool,
}


impl System {

    /// Carga la configuración desde las variables de entorno.
    ///
    /// # Comportamiento
    /// * Si `ENVIRONMENT` es "development", intenta cargar un archivo `.env`.
    /// * Establece valores por defecto para todas las variables ausentes.
    ///
    /// # Errores
    /// * `ConfigError::Invalid` si un valor numérico, booleano o de dirección no se puede interpretar.
    /// * `ConfigError::TokenList` si una lista de sufijos no es un arreglo JSON de textos.
    pub fn new() -> Result<Self, ConfigError> {

        let environment = env::var("ENVIRONMENT")
            .unwrap_or_else(|_| "development".into());

        if environment == "development" {
            dotenv::dotenv().ok();
        }

        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Construye la configuración a partir de una función de búsqueda arbitraria.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = lookup("ENVIRONMENT")
            .unwrap_or_else(|| "development".into());

        let rust_log = lookup("RUST_LOG")
            .unwrap_or_else(|| {
                match environment.as_str() {
                    "development" => "debug".to_string(),
                    "staging" => "info".to_string(),
                    _ => "warn".to_string(),
                }
            });

        let paired_controllers = token_list(&lookup, "PAIRED_CONTROLLERS", &[])?
            .into_iter()
            .map(|ip| {
                ip.parse::<IpAddr>().map_err(|_| ConfigError::Invalid {
                    name: "PAIRED_CONTROLLERS",
                    expected: "una lista de direcciones IP",
                    value: ip.clone(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(System {
            monitor_address: parse_var(&lookup, "MONITOR_ADDRESS", "0.0.0.0:8001", "una dirección host:puerto")?,
            monitor_path: lookup("MONITOR_PATH").unwrap_or_else(|| "/monitor".to_string()),
            authorization_required: parse_var(&lookup, "AUTHORIZATION_REQUIRED", "true", "un booleano")?,
            paired_controllers,
            monitor_accessory_name: lookup("MONITOR_ACCESSORY_NAME").unwrap_or_else(|| "Monitor".to_string()),
            celsius_suffixes: token_list(&lookup, "CELSIUS_SUFFIXES", &[" °C"])?,
            fahrenheit_suffixes: token_list(&lookup, "FAHRENHEIT_SUFFIXES", &[" °F"])?,
            lux_suffixes: token_list(&lookup, "LUX_SUFFIXES", &[" lx"])?,
            hue_suffixes: token_list(&lookup, "HUE_SUFFIXES", &["°"])?,
            active_state_values: token_list(&lookup, "ACTIVE_STATE_VALUES", &["Yes", "Ja"])?,
            inactive_state_values: token_list(&lookup, "INACTIVE_STATE_VALUES", &["No", "Nein"])?,
            light_level_measurement: lookup("LIGHT_LEVEL_MEASUREMENT")
                .unwrap_or_else(|| "homekit_lightlevel".to_string()),
            light_hue_measurement: lookup("LIGHT_HUE_MEASUREMENT")
                .unwrap_or_else(|| "homekit_lighthue".to_string()),
            gather_interval_secs: parse_var(&lookup, "GATHER_INTERVAL_SECS", "10", "un número")?,
            sink_url: lookup("SINK_URL").filter(|url| !url.trim().is_empty()),
            debug: parse_var(&lookup, "DEBUG", "false", "un booleano")?,
            rust_log,
            environment,
        })
    }
}


fn parse_var<F, T>(lookup: &F,
                   name: &'static str,
                   default: &str,
                   expected: &'static str) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    let value = lookup(name).unwrap_or_else(|| default.to_string());
    value.trim().parse().map_err(|_| ConfigError::Invalid { name, expected, value })
}


/// Las listas se leen como arreglos JSON para conservar espacios iniciales (ej. `" °C"`).
fn token_list<F>(lookup: &F,
                 name: &'static str,
                 default: &[&str]) -> Result<Vec<String>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(raw) => serde_json::from_str(&raw)
            .map_err(|source| ConfigError::TokenList { name, source }),
        None => Ok(default.iter().map(|token| token.to_string()).collect()),
    }
}


/// Inicializa el sistema de trazabilidad y logs (Tracing).
///
/// Configura el formato de salida basándose en el entorno:
/// * **Production**: Salida JSON (para logs estructurados en la nube).
/// * **Development/Otros**: Salida "Pretty" (colores y formato legible).
///
/// # Argumentos
/// * `system`: Referencia a la configuración cargada para leer el nivel de log (`rust_log`).
pub fn init_tracing(system: &System) {

    let filter = EnvFilter::try_new(&system.rust_log)
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = fmt().with_env_filter(filter).with_target(false);

    if system.environment == "production" {
        builder.json().init();
    } else {
        builder.pretty().init();
    }
}
