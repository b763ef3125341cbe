mod types;
mod utils;

pub use types::{EngineConfig, HardwareProbe};
pub use utils::{detect_gpu, OcrEngine, RunningFlag};
