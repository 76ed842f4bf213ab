pub mod clock;
pub mod config;
pub mod display_mode;
pub mod engine;
pub mod error;
pub mod render;
pub mod scheduler;
pub mod sync;
pub mod topics;
pub mod types;
pub mod weather;

pub use clock::{ClockState, FixedClock, SystemClock, WallClock};
pub use config::{FaceConfig, LayoutConfig, NetworkConfig, RuntimeConfig};
pub use display_mode::{DisplayModeController, FaceMode};
pub use engine::{FaceAction, FaceEngine, FaceEvent};
pub use error::{ConfigError, PayloadError};
pub use render::{DrawCommand, DrawSurface, FaceRenderer, MonospaceMeasure, TextMeasure};
pub use scheduler::RedrawScheduler;
pub use sync::{ChangeEvent, ChangeKind, ChannelState, WeatherSyncChannel};
pub use topics::*;
pub use types::FaceStatus;
pub use weather::{WeatherIcon, WeatherSnapshot};
