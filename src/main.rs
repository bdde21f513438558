use std::process;
use std::sync::Arc;
use tokio::time::Duration;
use tracing::{error, info};
use crate::channels::domain::Channels;
use crate::context::domain::AppContext;
use crate::gate::domain::{IngestServer, PairedControllers};
use crate::metric::domain::MetricEmitter;
use crate::pulse::domain::{start_gather_timer, SwitchAccessory};
use crate::pulse::logic::start_pulse;
use crate::sink::domain::ChannelSink;
use crate::sink::logic::{start_sink, Forwarder};
use crate::system::domain::{init_tracing, System};

mod classify;
mod payload;
mod metric;
mod sink;
mod gate;
mod pulse;
mod system;
mod context;
mod channels;
mod config;


#[tokio::main]
async fn main() {

    let system = match System::new() {
        Ok(system) => system,
        Err(e) => {
            eprintln!("Error: configuración inválida: {e:?}");
            process::exit(1);
        }
    };

    init_tracing(&system);

    let channels = Channels::new();
    let app_context = AppContext::new(system);

    let forwarder = match Forwarder::from_system(&app_context.system) {
        Ok(forwarder) => forwarder,
        Err(e) => {
            error!("Error: no se pudo crear el sink de métricas: {:?}", e);
            process::exit(1);
        }
    };
    let sink_handle = start_sink(channels.sink_from_emitter, forwarder);

    let emitter = MetricEmitter::new(app_context.system.monitor_accessory_name.clone(),
                                     app_context.names.as_ref().clone(),
                                     Arc::new(ChannelSink::new(channels.emitter_to_sink)));

    let authorizer = Arc::new(PairedControllers::new(app_context.system.paired_controllers.iter().copied()));

    let server = match IngestServer::start(app_context.clone(), emitter, authorizer).await {
        Ok(server) => server,
        Err(e) => {
            error!("Error: no se pudo iniciar el servidor de monitoreo: {:?}", e);
            process::exit(1);
        }
    };

    info!("Info: configurando accesorio de monitoreo {}", app_context.system.monitor_accessory_name);
    let accessory = Arc::new(SwitchAccessory::new(app_context.system.monitor_accessory_name.clone()));
    let pulse_cancel = server.live.child_token();

    start_gather_timer(channels.timer_to_pulse,
                       Duration::from_secs(app_context.system.gather_interval_secs.max(1)),
                       pulse_cancel.clone());

    start_pulse(channels.pulse_from_timer,
                accessory,
                app_context.clone(),
                pulse_cancel);

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Error: no se pudo escuchar la señal de apagado: {}", e);
    }

    server.stop().await;

    // El último emisor del canal se libera con el router; el sink vuelca lo pendiente.
    if let Err(e) = sink_handle.await {
        error!("Error: sink task finalizada con error: {}", e);
    }
    info!("Info: servicio finalizado");
}
