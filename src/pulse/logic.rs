//! Lógica del pulso periódico del accesorio de monitoreo.
//!
//! En cada período el switch del accesorio se enciende y se apaga tras una breve
//! espera. La automatización del hub reacciona a ese pulso enviando un payload
//! nuevo al endpoint de ingesta. No hay correlación entre el pulso y el payload
//! resultante: el efecto es "disparar y olvidar".
//!
//! # Arquitectura de Actores
//! 1. La tarea temporizadora (`gather_timer`) envía `Event::Tick` en cada período.
//! 2. Esta tarea reacciona a cada `Tick` ejecutando `gather`.
//! 3. Ambas terminan cuando se cancela el token de apagado.


use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};
use crate::config::pulse::PULSE_DELAY;
use crate::context::domain::AppContext;
use crate::pulse::domain::{Actuator, Event};


/// Enciende el actuador, espera `PULSE_DELAY` y lo apaga.
pub async fn gather(actuator: &dyn Actuator, ctx: &AppContext) {
    if ctx.system.debug {
        info!("Info: disparando accesorio de monitoreo {}", ctx.system.monitor_accessory_name);
    }
    actuator.set(true);
    sleep(PULSE_DELAY).await;
    actuator.set(false);
}


/// Ejecuta el bucle de pulsos.
///
/// # Argumentos
/// * `rx_from_timer`: Canal de entrada con los `Tick` del temporizador.
/// * `actuator`: Switch del accesorio de monitoreo.
/// * `app_context`: Configuración global (nombre del accesorio, modo debug).
/// * `cancel`: Token de apagado compartido con el servidor de ingesta.
#[instrument(
    name = "run_pulse_task",
    skip(rx_from_timer, actuator, app_context, cancel)
)]
pub async fn run_pulse(mut rx_from_timer: mpsc::Receiver<Event>,
                       actuator: Arc<dyn Actuator>,
                       app_context: AppContext,
                       cancel: CancellationToken) {

    info!("Info: pulse task creada");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            event = rx_from_timer.recv() => {
                match event {
                    Some(Event::Tick) => {
                        debug!("Debug: tick del temporizador");
                        gather(actuator.as_ref(), &app_context).await;
                    }
                    None => break,
                }
            }
        }
    }

    // Nunca dejar el switch encendido al salir.
    actuator.set(false);
    info!("Info: pulse task finalizada");
}


pub fn start_pulse(from_timer: mpsc::Receiver<Event>,
                   actuator: Arc<dyn Actuator>,
                   ctx: AppContext,
                   cancel: CancellationToken) {

    info!("Info: iniciando tarea pulse");
    tokio::spawn(async move {
        run_pulse(
            from_timer,
            actuator,
            ctx,
            cancel,
        ).await;
    });
}
