pub mod error;
pub mod logger;
pub mod image_utils;
pub mod loader;
pub mod engine;

pub use error::OcrError;
pub use loader::{ApiVersion, HardwareType, LoaderConfig, OcrLoader, TextBox, TextBoxList};
pub use engine::{EngineConfig, HardwareProbe, OcrEngine};
