use crate::runtime::config::{ConfigError, RuntimeConfig};
use crate::runtime::logging::init_tracing;
use crate::runtime::telemetry;
use sous_core::{
    BathConfig, BathModel, ControlError, Cooker, CookerConfig, CycleEngine, Heater, HeaterConfig,
    PidTuning, PinProvider, SimulatedBath, SimulatedPins, TemperatureTracker,
};
use sous_io::{
    run_server, Ds18b20, Ds18b20Tracker, SamplerConfig, SensorError, ServerConfig, ServerError,
    SysfsGpio,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("temperature sensor: {0}")]
    Sensor(#[from] SensorError),

    #[error(transparent)]
    Control(#[from] ControlError),

    #[error(transparent)]
    Server(#[from] ServerError),
}

pub fn run_from_args() -> Result<(), AppError> {
    let config = RuntimeConfig::from_env()?;
    if config.show_help {
        RuntimeConfig::print_help();
        return Ok(());
    }
    run(config)
}

pub fn run(config: RuntimeConfig) -> Result<(), AppError> {
    // Held until exit so buffered file logs are flushed
    let _log_guard = init_tracing(config.json_logs, config.log_dir.as_deref());

    telemetry::init();

    let stop = Arc::new(AtomicBool::new(false));
    let metrics_handle = telemetry::start_metrics_server(&config.metrics_addr, &stop);

    let period = config.sample_period;
    let result = if config.simulate {
        info!(time_scale = config.time_scale, "Using simulated relay and water bath");
        let pins = SimulatedPins::new();
        let bath = SimulatedBath::new(
            pins.clone(),
            BathModel::default(),
            BathConfig {
                relay_pin: config.relay_pin,
                period,
                time_scale: config.time_scale,
                ..BathConfig::default()
            },
        );
        serve(pins, Box::new(bath), &config, &stop)
    } else {
        let sensor = Ds18b20::open(&config.w1_root, config.sensor_id.as_deref())?;
        info!(sensor = sensor.id(), gpio_root = %config.gpio_root.display(), "Using hardware");
        let tracker = Ds18b20Tracker::new(sensor, SamplerConfig { period });
        serve(SysfsGpio::new(&config.gpio_root), Box::new(tracker), &config, &stop)
    };

    stop.store(true, Ordering::Relaxed);
    if let Some(handle) = metrics_handle {
        let _ = handle.join();
    }
    result
}

fn serve<P: PinProvider>(
    provider: P,
    tracker: Box<dyn TemperatureTracker>,
    config: &RuntimeConfig,
    stop: &Arc<AtomicBool>,
) -> Result<(), AppError> {
    let heater = Heater::new(
        CycleEngine::new(provider, config.relay_pin),
        HeaterConfig {
            cycle_time: config.cycle_time,
            minimum_duration: config.min_duration,
            setting: 0.0,
        },
    )?;
    let cooker = Arc::new(Cooker::new(
        heater,
        tracker,
        CookerConfig {
            target: config.target,
            tuning: PidTuning {
                kp: config.kp,
                ki: config.ki,
                ..PidTuning::default()
            },
            history_limit: config.history_limit,
        },
    ));

    info!(
        relay_pin = config.relay_pin,
        target = config.target,
        cycle_time_s = config.cycle_time,
        sample_period_s = config.sample_period.as_secs_f64(),
        "Starting heater"
    );
    cooker.start_heater()?;
    cooker.start_sampling()?;

    let updater = config
        .metrics_addr
        .as_ref()
        .map(|_| telemetry::start_metrics_updater(Arc::clone(&cooker), Arc::clone(stop)));

    let server = if config.server_enabled {
        let server_config = ServerConfig {
            bind_addr: config.bind_addr.clone(),
            ..ServerConfig::default()
        };
        let (addr, handle) = run_server(Arc::clone(&cooker), server_config, Arc::clone(stop))?;
        info!(addr = %addr, "State server started");
        Some(handle)
    } else {
        info!("State server disabled");
        None
    };

    info!("sous-vide running");

    match config.run_seconds {
        Some(duration) => {
            info!(seconds = duration.as_secs_f64(), "Running for limited duration");
            thread::sleep(duration);
        }
        None => loop {
            thread::park();
        },
    }

    stop.store(true, Ordering::Relaxed);
    for handle in [server, updater].into_iter().flatten() {
        if handle.join().is_err() {
            warn!("Worker thread panicked during shutdown");
        }
    }

    cooker.close();
    let state = cooker.get_state();
    info!(
        history = cooker.history().len(),
        samples_rejected = cooker.samples_rejected(),
        "Run complete\n{}",
        state
    );
    Ok(())
}
