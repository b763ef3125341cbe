use image::DynamicImage;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::types::{EngineConfig, HardwareProbe};
use crate::error::OcrError;
use crate::image_utils::to_packed_rgb;
use crate::loader::{HardwareType, OcrLoader, TextBox};

/// Shared view of the engine's "analysis in progress" state, for polling
/// from another thread. Advisory only; it cannot cancel anything.
#[derive(Clone, Debug, Default)]
pub struct RunningFlag(Arc<AtomicBool>);

impl RunningFlag {
    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn start(&self) -> RunningGuard {
        self.0.store(true, Ordering::SeqCst);
        RunningGuard(self.clone())
    }
}

struct RunningGuard(RunningFlag);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        (self.0).0.store(false, Ordering::SeqCst);
    }
}

/// Checks for the accelerator device node.
pub fn detect_gpu(device_node: &Path) -> HardwareProbe {
    match device_node.try_exists() {
        Ok(true) => HardwareProbe::Supported,
        Ok(false) => HardwareProbe::Unsupported,
        Err(e) => HardwareProbe::Error(e),
    }
}

/// Recognition facade used by the application windows.
///
/// Construction never fails: if the library, the instance or the default
/// plugin cannot be set up, the engine stays disabled and every method logs
/// a warning and returns its empty value. Calls must not overlap; `&mut self`
/// enforces that, and [`running_flag`](Self::running_flag) is the one piece
/// of state meant for other threads.
pub struct OcrEngine {
    loader: OcrLoader,
    running: RunningFlag,
    hardware: HardwareType,
}

impl OcrEngine {
    pub fn new(config: EngineConfig) -> Self {
        log::info!("Initializing OCR dynamic loader");
        let mut loader = OcrLoader::new(config.loader.clone());

        if let Err(e) = loader.load_library() {
            log::error!("Unable to load OCR library: {}", e);
            log::error!(
                "Make sure lib{} is installed or set {}",
                config.loader.library_name,
                crate::loader::LoaderConfig::LIBRARY_PATH_ENV
            );
        }

        Self::from_loader(loader, &config)
    }

    /// Runs engine initialization on a loader that already had its library
    /// loaded (or failed to).
    pub fn from_loader(mut loader: OcrLoader, config: &EngineConfig) -> Self {
        let mut hardware = HardwareType::Cpu;

        if loader.is_loaded() {
            log::info!("OCR library loaded, version: {}", loader.version());
            match Self::initialize(&mut loader, config) {
                Ok(selected) => {
                    hardware = selected;
                    log::info!("OCR engine initialized");
                }
                Err(e) => {
                    log::error!("OCR engine disabled: {}", e);
                    loader.unload_library();
                }
            }
        } else {
            log::error!("OCR engine disabled: library not loaded");
        }

        Self {
            loader,
            running: RunningFlag::default(),
            hardware,
        }
    }

    fn initialize(loader: &mut OcrLoader, config: &EngineConfig) -> Result<HardwareType, OcrError> {
        loader
            .create_ocr()
            .inspect_err(|e| log::error!("Unable to create OCR instance: {}", e))?;
        loader
            .load_default_plugin()
            .inspect_err(|e| log::error!("Unable to load default plugin: {}", e))?;

        if !loader.plugin_ready() {
            log::warn!("OCR plugin is not ready yet");
        }

        if let Err(e) = loader.set_max_threads(config.max_threads) {
            log::warn!("Failed to set max threads: {}", e);
        }

        if let Some(language) = config.default_language.as_deref().filter(|l| !l.is_empty()) {
            if let Err(e) = loader.set_language(language) {
                log::warn!("Failed to set default language {}: {}", language, e);
            }
        }

        Ok(Self::select_hardware(loader, config))
    }

    fn select_hardware(loader: &mut OcrLoader, config: &EngineConfig) -> HardwareType {
        match detect_gpu(&config.gpu_device_node) {
            HardwareProbe::Supported => {
                log::info!(
                    "GPU device {} found, enabling Vulkan acceleration",
                    config.gpu_device_node.display()
                );
                match loader.set_hardware(HardwareType::GpuVulkan, config.gpu_device_id) {
                    Ok(()) => {
                        log::info!("GPU acceleration enabled");
                        HardwareType::GpuVulkan
                    }
                    Err(e) => {
                        log::warn!("Failed to enable GPU acceleration: {}", e);
                        log::info!("Falling back to CPU");
                        HardwareType::Cpu
                    }
                }
            }
            HardwareProbe::Unsupported => {
                log::info!("No GPU device found, using CPU");
                HardwareType::Cpu
            }
            HardwareProbe::Error(e) => {
                log::warn!(
                    "Could not probe {}: {}, using CPU",
                    config.gpu_device_node.display(),
                    e
                );
                HardwareType::Cpu
            }
        }
    }

    pub fn is_available(&self) -> bool {
        self.loader.is_loaded()
    }

    fn ensure_available(&self) -> bool {
        if !self.is_available() {
            log::warn!("OCR loader unavailable");
        }
        self.is_available()
    }

    pub fn hardware(&self) -> HardwareType {
        self.hardware
    }

    pub fn version_info(&self) -> String {
        if self.is_available() {
            self.loader.api_version_info()
        } else {
            "OCR library not loaded".to_string()
        }
    }

    pub fn set_image(&mut self, image: &DynamicImage) -> Result<(), OcrError> {
        if !self.ensure_available() {
            return Err(OcrError::Unavailable("OCR loader"));
        }

        log::debug!(
            "Setting OCR input image, size: {}x{} color: {:?}",
            image.width(),
            image.height(),
            image.color()
        );

        let rgb = to_packed_rgb(image).inspect_err(|e| log::warn!("Rejected input image: {}", e))?;
        self.loader
            .set_rgb_image(&rgb)
            .inspect_err(|e| log::warn!("Failed to set image data: {}", e))
    }

    pub fn set_image_file(&mut self, path: &Path) -> Result<(), OcrError> {
        if !self.ensure_available() {
            return Err(OcrError::Unavailable("OCR loader"));
        }

        self.loader
            .set_image_file(path)
            .inspect_err(|e| log::warn!("Failed to set image file {}: {}", path.display(), e))
    }

    /// Changing language during an analysis is undefined for the native
    /// library, so a running analysis is cancelled first.
    pub fn set_language(&mut self, language: &str) -> bool {
        if !self.ensure_available() {
            return false;
        }
        if language.is_empty() {
            log::warn!("Language is empty");
            return false;
        }

        log::info!("Setting OCR language to {}", language);

        if self.loader.is_running() {
            log::info!("Interrupting current analysis to switch language");
            if let Err(e) = self.loader.break_analyze() {
                log::warn!("Failed to interrupt analysis: {}", e);
            }
        }

        match self.loader.set_language(language) {
            Ok(()) => {
                log::info!("Language set: {}", language);
                true
            }
            Err(e) => {
                log::warn!("Failed to set language {}: {}", language, e);
                false
            }
        }
    }

    /// Runs recognition on the current image and blocks until it finishes.
    /// Returns an empty string when nothing was recognized or on failure.
    pub fn get_recognition_result(&mut self) -> String {
        if !self.ensure_available() {
            return String::new();
        }
        if !self.loader.plugin_ready() {
            log::warn!("OCR plugin is not ready");
            return String::new();
        }

        log::info!("Starting text recognition");
        let analyzed = {
            let _running = self.running.start();
            self.loader.analyze()
        };
        if let Err(e) = analyzed {
            log::warn!("OCR analysis failed: {}", e);
            return String::new();
        }

        match self.loader.get_simple_result() {
            Ok(text) => {
                log::info!("Recognition finished, result length: {}", text.chars().count());
                if text.is_empty() {
                    log::info!("No text recognized");
                }
                text
            }
            Err(e) => {
                log::warn!("Failed to fetch OCR result: {}", e);
                String::new()
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.is_running()
    }

    pub fn running_flag(&self) -> RunningFlag {
        self.running.clone()
    }

    /// Text regions of the last recognition, copied out of native memory.
    pub fn text_boxes(&mut self) -> Vec<TextBox> {
        if !self.ensure_available() {
            return Vec::new();
        }

        match self.loader.get_text_boxes() {
            Ok(Some(boxes)) => boxes.to_vec(),
            Ok(None) => Vec::new(),
            Err(e) => {
                log::warn!("Failed to fetch text boxes: {}", e);
                Vec::new()
            }
        }
    }
}

impl Drop for OcrEngine {
    fn drop(&mut self) {
        log::info!("Shutting down OCR engine");
        self.loader.destroy_ocr();
        self.loader.unload_library();
    }
}
