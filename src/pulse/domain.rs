use tokio::sync::{mpsc, watch};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;


pub enum Event {
    /// Se cumplió el período de recolección.
    Tick,
}


/// Actuador booleano externo (el switch del accesorio de monitoreo).
pub trait Actuator: Send + Sync {
    fn set(&self, on: bool);
}


/// Switch del accesorio de monitoreo.
///
/// El estado vive en un canal `watch`: se lee sin bloquear a quien lo escribe.
#[derive(Debug)]
pub struct SwitchAccessory {
    pub name: String,
    state: watch::Sender<bool>,
}


impl SwitchAccessory {
    pub fn new(name: impl Into<String>) -> Self {
        let (state, _) = watch::channel(false);
        Self { name: name.into(), state }
    }

    pub fn is_on(&self) -> bool {
        *self.state.borrow()
    }
}


impl Actuator for SwitchAccessory {
    fn set(&self, on: bool) {
        debug!("Debug: accesorio {}: {} -> {}", self.name, self.is_on(), on);
        self.state.send_replace(on);
    }
}


/// Temporizador de recolección: envía `Event::Tick` en cada período hasta ser cancelado.
pub async fn gather_timer(tx_to_pulse: mpsc::Sender<Event>,
                          period: Duration,
                          cancel: CancellationToken) {

    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                if tx_to_pulse.send(Event::Tick).await.is_err() {
                    break; // Canal cerrado, terminar tarea
                }
            }
        }
    }
}


pub fn start_gather_timer(tx_to_pulse: mpsc::Sender<Event>,
                          period: Duration,
                          cancel: CancellationToken) {

    tokio::spawn(async move {
        gather_timer(
            tx_to_pulse,
            period,
            cancel
        ).await;
    });
}
