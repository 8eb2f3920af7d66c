pub mod ds18b20;
pub mod gpio;
pub mod metrics;
pub mod protocol;
pub mod server;

pub use ds18b20::{Ds18b20, Ds18b20Tracker, Reading, SamplerConfig, SensorError};
pub use gpio::{SysfsGpio, SysfsPin};
pub use metrics::{init_metrics, serve_metrics};
pub use protocol::{ProtocolError, StateUpdate};
pub use server::{route, run_server, Reply, ServerConfig, ServerError};
