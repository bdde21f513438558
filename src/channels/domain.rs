use tokio::sync::mpsc;
use crate::config::pulse::TICK_CHANNEL;
use crate::config::sink::METRIC_CHANNEL;
use crate::metric::domain::Metric;
use crate::pulse::domain::Event;


pub struct Channels {
    pub timer_to_pulse: mpsc::Sender<Event>,
    pub pulse_from_timer: mpsc::Receiver<Event>,

    pub emitter_to_sink: mpsc::Sender<Metric>,
    pub sink_from_emitter: mpsc::Receiver<Metric>,
}


impl Channels {
    pub fn new() -> Channels {
        let (t_to_p, p_from_t) = mpsc::channel::<Event>(TICK_CHANNEL);
        let (e_to_s, s_from_e) = mpsc::channel::<Metric>(METRIC_CHANNEL);

        Self {
            timer_to_pulse: t_to_p,
            pulse_from_timer: p_from_t,
            emitter_to_sink: e_to_s,
            sink_from_emitter: s_from_e,
        }
    }
}
