use sous_core::{Cooker, PinProvider};
use sous_io::metrics::{self, init_metrics, serve_metrics};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::info;

pub fn init() {
    init_metrics();
}

pub fn start_metrics_server(
    addr: &Option<String>,
    stop: &Arc<AtomicBool>,
) -> Option<thread::JoinHandle<()>> {
    addr.as_ref().map(|addr| {
        info!(addr = %addr, "Starting metrics server");
        serve_metrics(addr.clone(), Arc::clone(stop))
    })
}

pub fn start_metrics_updater<P: PinProvider>(
    cooker: Arc<Cooker<P>>,
    stop: Arc<AtomicBool>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        while !stop.load(Ordering::Relaxed) {
            metrics::record_state(&cooker.get_state());
            metrics::record_samples(cooker.samples_applied());
            metrics::record_samples_rejected(cooker.samples_rejected());
            metrics::record_engine(&cooker.with_heater(|heater| heater.engine().status()));

            thread::sleep(Duration::from_millis(200));
        }
    })
}
