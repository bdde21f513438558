pub mod pulse {
    use tokio::time::Duration;

    pub const PULSE_DELAY: Duration = Duration::from_millis(100);
    pub const TICK_CHANNEL: usize = 10;
}

pub mod ingest {
    pub const MAX_BODY_BYTES: usize = 64 * 1024;
    pub const JSON_CONTENT_TYPE: &str = "application/json";
    pub const OK_BODY: &str = "Ok";
}

pub mod sink {
    use tokio::time::Duration;

    pub const BATCH_SIZE: usize = 100;
    pub const FLUSH_INTERVAL: Duration = Duration::from_secs(5);
    pub const METRIC_CHANNEL: usize = 1000;
    pub const HTTP_TIMEOUT: Duration = Duration::from_secs(10);
}
