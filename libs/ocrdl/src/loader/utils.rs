use image::{DynamicImage, RgbImage};
use std::ffi::{c_int, CStr, CString};
use std::path::Path;

use super::instance::{OcrInstance, TextBoxList};
use super::search::{LibraryLocation, LibrarySearch};
use super::symbols::{FunctionTable, NativeLibrary, SymbolSource};
use super::types::{ApiVersion, HardwareType, LoaderConfig, RawHandle};
use crate::error::OcrError;
use crate::image_utils::{to_packed_rgb, RGB_CHANNELS};

/// Dynamic loader for the native OCR library.
///
/// Holds at most one library image and one native OCR instance. Table
/// entries and the instance exist only while the library is loaded; every
/// call into the library checks for both first. Failures are returned and
/// also kept in a single last-error slot.
///
/// The native library is not known to support several independent loads in
/// one process, so create one loader per process.
pub struct OcrLoader {
    config: LoaderConfig,
    instance: Option<OcrInstance>,
    table: FunctionTable,
    library: Option<Box<dyn SymbolSource>>,
    last_error: Option<String>,
}

fn check_status(operation: &'static str, code: c_int) -> Result<(), OcrError> {
    if code == 0 {
        Err(OcrError::OperationFailed { operation, code })
    } else {
        Ok(())
    }
}

fn c_string(value: &str, what: &str) -> Result<CString, OcrError> {
    CString::new(value)
        .map_err(|_| OcrError::InvalidInput(format!("{} contains a NUL byte", what)))
}

impl OcrLoader {
    pub fn new(config: LoaderConfig) -> Self {
        log::debug!("Initializing OCR dynamic loader");
        Self {
            config,
            instance: None,
            table: FunctionTable::default(),
            library: None,
            last_error: None,
        }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Locates, loads and validates the OCR library. Does nothing if a
    /// library is already loaded. On failure nothing stays loaded.
    pub fn load_library(&mut self) -> Result<(), OcrError> {
        if self.is_loaded() {
            log::debug!("OCR library already loaded");
            return Ok(());
        }

        let result = self.open_library().and_then(|library| self.attach(library));
        self.record(result)
    }

    /// Same as [`load_library`](Self::load_library) for an image that is
    /// already open.
    pub fn load_from_source(&mut self, source: Box<dyn SymbolSource>) -> Result<(), OcrError> {
        if self.is_loaded() {
            log::debug!(
                "OCR library already loaded, ignoring {}",
                source.location()
            );
            return Ok(());
        }

        let result = self.attach(source);
        self.record(result)
    }

    fn open_library(&self) -> Result<Box<dyn SymbolSource>, OcrError> {
        let location = match self.config.explicit_library_path() {
            Some(path) => LibraryLocation::File(path),
            None => {
                let search = LibrarySearch::from_config(&self.config);
                search.locate().ok_or(OcrError::LibraryNotFound {
                    candidates: search.candidate_count(),
                })?
            }
        };

        log::debug!("Loading OCR library: {}", location);
        Ok(Box::new(NativeLibrary::open(location)?))
    }

    /// Resolves the table and checks the version. The loader state is only
    /// touched once every check passed; on error `source` is dropped here.
    fn attach(&mut self, source: Box<dyn SymbolSource>) -> Result<(), OcrError> {
        let mut table = FunctionTable::resolve(source.as_ref())?;

        table.api_version = FunctionTable::resolve_version(source.as_ref());
        match table.api_version {
            Some(query) => {
                let found = query.query();
                let required = self.config.min_api_version;
                log::debug!("Checking API version {} >= {}", found, required);
                if !found.is_compatible_with(&required) {
                    return Err(OcrError::IncompatibleVersion { found, required });
                }
            }
            None => log::warn!("API version functions not found, assuming a compatible legacy library"),
        }

        self.table = table;
        self.library = Some(source);
        log::info!(
            "OCR library loaded from {}: {}",
            self.library_location().unwrap_or_default(),
            self.api_version_info()
        );
        Ok(())
    }

    /// Destroys the instance, unloads the library and clears the last error.
    /// Safe to call at any time, any number of times.
    pub fn unload_library(&mut self) {
        self.instance = None;
        self.table = FunctionTable::default();
        if let Some(library) = self.library.take() {
            log::debug!("OCR library unloaded: {}", library.location());
        }
        self.last_error = None;
    }

    pub fn is_loaded(&self) -> bool {
        self.library.is_some()
    }

    pub fn library_location(&self) -> Option<String> {
        self.library.as_ref().map(|library| library.location())
    }

    pub fn resolved_symbols(&self) -> usize {
        self.table.resolved_count()
    }

    pub fn has_instance(&self) -> bool {
        self.instance.is_some()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn record<T>(&mut self, result: Result<T, OcrError>) -> Result<T, OcrError> {
        if let Err(e) = &result {
            log::warn!("OCR loader error: {}", e);
            self.last_error = Some(e.to_string());
        }
        result
    }

    fn handle(&self) -> Result<RawHandle, OcrError> {
        if !self.is_loaded() {
            return Err(OcrError::Unavailable("OCR library"));
        }
        self.instance
            .as_ref()
            .map(OcrInstance::raw)
            .ok_or(OcrError::Unavailable("OCR instance"))
    }

    fn required<F>(&self, entry: Option<F>, name: &'static str) -> Result<(RawHandle, F), OcrError> {
        let handle = self.handle()?;
        let entry = entry.ok_or(OcrError::Unavailable(name))?;
        Ok((handle, entry))
    }

    pub fn api_version(&self) -> Option<ApiVersion> {
        self.table.api_version.map(|query| query.query())
    }

    /// True when the library reports no API version at all.
    pub fn is_api_compatible(&self) -> bool {
        match self.api_version() {
            Some(found) => found.is_compatible_with(&self.config.min_api_version),
            None => true,
        }
    }

    pub fn api_version_info(&self) -> String {
        let library_version = self.table.get_version.map(|_| self.version());
        match (self.api_version(), library_version) {
            (Some(api), Some(library)) => format!("API version {} (library {})", api, library),
            (Some(api), None) => format!("API version {}", api),
            (None, Some(library)) => format!("library {} (no API version)", library),
            (None, None) => "version information unavailable".to_string(),
        }
    }

    pub fn version(&self) -> String {
        let Some(get_version) = self.table.get_version else {
            return "version information unavailable".to_string();
        };
        // SAFETY: entry resolved from the loaded library.
        let version = unsafe { get_version() };
        if version.is_null() {
            return "unknown version".to_string();
        }
        // SAFETY: the library returns a NUL-terminated static string.
        unsafe { CStr::from_ptr(version) }.to_string_lossy().into_owned()
    }

    /// Creates the native instance. Returns `Ok` without side effects when
    /// one already exists.
    pub fn create_ocr(&mut self) -> Result<(), OcrError> {
        if self.instance.is_some() {
            log::debug!("OCR instance already exists");
            return Ok(());
        }

        let result = match (self.table.create, self.table.destroy) {
            (Some(create), Some(destroy)) => {
                // SAFETY: entries resolved from the loaded library.
                let handle = unsafe { create() };
                OcrInstance::new(handle, destroy).ok_or(OcrError::InstanceCreationFailed)
            }
            _ => Err(OcrError::Unavailable("ocr_create")),
        };

        let instance = self.record(result)?;
        self.instance = Some(instance);
        log::debug!("OCR instance created");
        Ok(())
    }

    pub fn destroy_ocr(&mut self) {
        self.instance = None;
    }

    pub fn load_default_plugin(&mut self) -> Result<(), OcrError> {
        let result = self
            .required(self.table.load_default_plugin, "ocr_load_default_plugin")
            .and_then(|(handle, load)| {
                // SAFETY: live handle and entry from the loaded library.
                match unsafe { load(handle) } {
                    0 => Err(OcrError::PluginLoadFailed(0)),
                    _ => Ok(()),
                }
            });
        self.record(result)?;
        log::debug!("Default plugin loaded");
        Ok(())
    }

    pub fn plugin_ready(&self) -> bool {
        match (self.handle(), self.table.plugin_ready) {
            // SAFETY: live handle and entry from the loaded library.
            (Ok(handle), Some(ready)) => unsafe { ready(handle) != 0 },
            _ => false,
        }
    }

    /// Missing `ocr_set_hardware` counts as success.
    pub fn set_hardware(&mut self, hardware: HardwareType, device_id: i32) -> Result<(), OcrError> {
        let result = self.handle().and_then(|handle| match self.table.set_hardware {
            None => {
                log::warn!("ocr_set_hardware unavailable, skipping");
                Ok(())
            }
            Some(set_hardware) => {
                // SAFETY: live handle and entry from the loaded library.
                let code = unsafe { set_hardware(handle, hardware as c_int, device_id) };
                check_status("set hardware", code)
                    .inspect(|_| log::debug!("Hardware set to {} (device {})", hardware, device_id))
            }
        });
        self.record(result)
    }

    /// Missing `ocr_set_max_threads` counts as success.
    pub fn set_max_threads(&mut self, count: i32) -> Result<(), OcrError> {
        let result = self.handle().and_then(|handle| match self.table.set_max_threads {
            None => {
                log::warn!("ocr_set_max_threads unavailable, skipping");
                Ok(())
            }
            Some(set_max_threads) => {
                // SAFETY: live handle and entry from the loaded library.
                let code = unsafe { set_max_threads(handle, count) };
                check_status("set max threads", code)
                    .inspect(|_| log::debug!("Max threads set to {}", count))
            }
        });
        self.record(result)
    }

    /// Missing `ocr_set_language` counts as success.
    pub fn set_language(&mut self, language: &str) -> Result<(), OcrError> {
        let result = self.handle().and_then(|handle| match self.table.set_language {
            None => {
                log::warn!("ocr_set_language unavailable, skipping");
                Ok(())
            }
            Some(set_language) => {
                let language_c = c_string(language, "language")?;
                // SAFETY: live handle and entry; the string outlives the call.
                let code = unsafe { set_language(handle, language_c.as_ptr()) };
                check_status("set language", code)
                    .inspect(|_| log::debug!("Language set to {}", language))
            }
        });
        self.record(result)
    }

    pub fn set_image_file(&mut self, path: &Path) -> Result<(), OcrError> {
        let result = self
            .required(self.table.set_image_file, "ocr_set_image_file")
            .and_then(|(handle, set_image_file)| {
                let path_str = path.to_str().ok_or_else(|| {
                    OcrError::InvalidInput(format!("path is not UTF-8: {}", path.display()))
                })?;
                let path_c = c_string(path_str, "image path")?;
                // SAFETY: live handle and entry; the string outlives the call.
                let code = unsafe { set_image_file(handle, path_c.as_ptr()) };
                check_status("set image file", code)
            });
        self.record(result)?;
        log::debug!("Image file set: {}", path.display());
        Ok(())
    }

    /// Converts `image` to packed RGB8 and hands it to the library.
    pub fn set_image(&mut self, image: &DynamicImage) -> Result<(), OcrError> {
        let result = self
            .required(self.table.set_image_data, "ocr_set_image_data")
            .and_then(|_| to_packed_rgb(image));
        let rgb = self.record(result)?;
        self.set_rgb_image(&rgb)
    }

    pub fn set_rgb_image(&mut self, image: &RgbImage) -> Result<(), OcrError> {
        let result = self
            .required(self.table.set_image_data, "ocr_set_image_data")
            .and_then(|(handle, set_image_data)| {
                let (width, height) = image.dimensions();
                let (Ok(w), Ok(h)) = (i32::try_from(width), i32::try_from(height)) else {
                    return Err(OcrError::InvalidInput(format!(
                        "image dimensions {}x{} exceed the native limit",
                        width, height
                    )));
                };
                if w == 0 || h == 0 {
                    return Err(OcrError::InvalidInput("image is empty".to_string()));
                }
                // SAFETY: the buffer holds `w * h * 3` bytes and outlives the call.
                let code =
                    unsafe { set_image_data(handle, image.as_raw().as_ptr(), w, h, RGB_CHANNELS) };
                check_status("set image data", code)
            });
        self.record(result)?;
        log::debug!("Image data set {}x{}", image.width(), image.height());
        Ok(())
    }

    /// Runs recognition on the current image. Blocks until the library returns.
    pub fn analyze(&mut self) -> Result<(), OcrError> {
        let result = self
            .required(self.table.analyze, "ocr_analyze")
            // SAFETY: live handle and entry from the loaded library.
            .and_then(|(handle, analyze)| check_status("analyze", unsafe { analyze(handle) }));
        self.record(result)?;
        log::debug!("OCR analysis finished");
        Ok(())
    }

    /// Asks the library to stop a running analysis. Fails when cancellation
    /// is not exported.
    pub fn break_analyze(&mut self) -> Result<(), OcrError> {
        let result = self
            .required(self.table.break_analyze, "ocr_break_analyze")
            .and_then(|(handle, break_analyze)| {
                // SAFETY: live handle and entry from the loaded library.
                let code = unsafe { break_analyze(handle) };
                log::debug!("Break analyze returned {}", code);
                check_status("break analyze", code)
            });
        self.record(result)
    }

    pub fn is_running(&self) -> bool {
        match (self.handle(), self.table.is_running) {
            // SAFETY: live handle and entry from the loaded library.
            (Ok(handle), Some(is_running)) => unsafe { is_running(handle) != 0 },
            _ => false,
        }
    }

    pub fn get_simple_result(&mut self) -> Result<String, OcrError> {
        let result = self
            .required(self.table.get_simple_result, "ocr_get_simple_result")
            .and_then(|(handle, get_simple_result)| {
                // SAFETY: live handle and entry from the loaded library.
                let text = unsafe { get_simple_result(handle) };
                if text.is_null() {
                    return Err(OcrError::NullResult("ocr_get_simple_result"));
                }
                // SAFETY: the library returns a NUL-terminated UTF-8 string
                // owned by the instance.
                Ok(unsafe { CStr::from_ptr(text) }.to_string_lossy().into_owned())
            });
        let text = self.record(result)?;
        log::debug!("OCR result fetched, {} chars", text.chars().count());
        Ok(text)
    }

    /// Text regions of the last analysis. `Ok(None)` when the library does
    /// not export `ocr_get_text_boxes` or has nothing to report.
    pub fn get_text_boxes(&mut self) -> Result<Option<TextBoxList<'_>>, OcrError> {
        let handle = match self.handle() {
            Ok(handle) => handle,
            Err(e) => return self.record(Err(e)),
        };
        let Some(get_text_boxes) = self.table.get_text_boxes else {
            log::warn!("ocr_get_text_boxes unavailable");
            return Ok(None);
        };

        // SAFETY: live handle and entry from the loaded library.
        let raw = unsafe { get_text_boxes(handle) };
        let boxes = TextBoxList::new(raw, self.table.free_text_boxes);
        if let Some(boxes) = &boxes {
            log::debug!("Fetched {} text boxes", boxes.len());
        }
        Ok(boxes)
    }
}

impl Drop for OcrLoader {
    fn drop(&mut self) {
        self.unload_library();
    }
}
