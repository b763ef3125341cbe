use std::ffi::c_void;

use super::search::LibraryLocation;
use super::types::*;
use crate::error::OcrError;

/// A loaded library image that can hand out symbol addresses.
pub trait SymbolSource: Send {
    /// Path or name the image was loaded from.
    fn location(&self) -> String;

    /// Address of `name`, or `None` when the symbol is absent or null.
    fn symbol(&self, name: &str) -> Option<*const c_void>;
}

pub struct NativeLibrary {
    library: libloading::Library,
    location: LibraryLocation,
}

impl NativeLibrary {
    pub fn open(location: LibraryLocation) -> Result<Self, OcrError> {
        // SAFETY: loading runs the library's initializers; callers only pass
        // locations produced by the OCR library search or configured paths.
        let library = unsafe { libloading::Library::new(location.as_os_str()) }.map_err(|e| {
            OcrError::LibraryLoad {
                path: location.to_string(),
                reason: e.to_string(),
            }
        })?;
        Ok(Self { library, location })
    }
}

impl SymbolSource for NativeLibrary {
    fn location(&self) -> String {
        self.location.to_string()
    }

    fn symbol(&self, name: &str) -> Option<*const c_void> {
        // SAFETY: the address is only reinterpreted as the function type the
        // OCR C API declares for `name`, and is dropped with the table before
        // the library is unloaded.
        let symbol = unsafe { self.library.get::<*const c_void>(name.as_bytes()) }.ok()?;
        let address = *symbol;
        (!address.is_null()).then_some(address)
    }
}

pub struct SymbolSpec {
    pub name: &'static str,
    pub required: bool,
}

const fn required(name: &'static str) -> SymbolSpec {
    SymbolSpec { name, required: true }
}

const fn optional(name: &'static str) -> SymbolSpec {
    SymbolSpec { name, required: false }
}

/// Every entry the loader resolves at load time. The API version trio is
/// resolved separately since it is only meaningful as a whole.
pub const SYMBOLS: [SymbolSpec; 16] = [
    required("ocr_create"),
    required("ocr_destroy"),
    required("ocr_load_default_plugin"),
    required("ocr_plugin_ready"),
    optional("ocr_set_hardware"),
    optional("ocr_set_max_threads"),
    optional("ocr_set_language"),
    required("ocr_set_image_file"),
    required("ocr_set_image_data"),
    required("ocr_analyze"),
    optional("ocr_break_analyze"),
    optional("ocr_is_running"),
    required("ocr_get_simple_result"),
    optional("ocr_get_text_boxes"),
    optional("ocr_free_text_boxes"),
    optional("ocr_get_version"),
];

#[derive(Clone, Copy)]
pub struct VersionQuery {
    pub major: VersionPartFn,
    pub minor: VersionPartFn,
    pub patch: VersionPartFn,
}

impl VersionQuery {
    pub fn query(&self) -> ApiVersion {
        // SAFETY: resolved from the loaded library, which is alive while the
        // table holding this query exists.
        unsafe { ApiVersion::new((self.major)(), (self.minor)(), (self.patch)()) }
    }
}

/// Typed capability table. `None` means the entry was not exported.
#[derive(Default, Clone, Copy)]
pub struct FunctionTable {
    pub create: Option<CreateFn>,
    pub destroy: Option<DestroyFn>,
    pub load_default_plugin: Option<StatusFn>,
    pub plugin_ready: Option<StatusFn>,
    pub set_hardware: Option<SetHardwareFn>,
    pub set_max_threads: Option<SetMaxThreadsFn>,
    pub set_language: Option<SetStringFn>,
    pub set_image_file: Option<SetStringFn>,
    pub set_image_data: Option<SetImageDataFn>,
    pub analyze: Option<StatusFn>,
    pub break_analyze: Option<StatusFn>,
    pub is_running: Option<StatusFn>,
    pub get_simple_result: Option<GetStringFn>,
    pub get_text_boxes: Option<GetTextBoxesFn>,
    pub free_text_boxes: Option<FreeTextBoxesFn>,
    pub get_version: Option<LibraryVersionFn>,
    pub api_version: Option<VersionQuery>,
}

macro_rules! resolve {
    ($source:expr, $name:literal, $ty:ty) => {
        $source.symbol($name).map(|address| {
            // SAFETY: `$ty` is the signature the OCR C API exports under `$name`.
            unsafe { std::mem::transmute::<*const c_void, $ty>(address) }
        })
    };
}

impl FunctionTable {
    /// Resolves every entry in [`SYMBOLS`]. Fails on the first missing
    /// required entry; missing optional entries are logged and left empty.
    pub fn resolve(source: &dyn SymbolSource) -> Result<Self, OcrError> {
        let table = Self {
            create: resolve!(source, "ocr_create", CreateFn),
            destroy: resolve!(source, "ocr_destroy", DestroyFn),
            load_default_plugin: resolve!(source, "ocr_load_default_plugin", StatusFn),
            plugin_ready: resolve!(source, "ocr_plugin_ready", StatusFn),
            set_hardware: resolve!(source, "ocr_set_hardware", SetHardwareFn),
            set_max_threads: resolve!(source, "ocr_set_max_threads", SetMaxThreadsFn),
            set_language: resolve!(source, "ocr_set_language", SetStringFn),
            set_image_file: resolve!(source, "ocr_set_image_file", SetStringFn),
            set_image_data: resolve!(source, "ocr_set_image_data", SetImageDataFn),
            analyze: resolve!(source, "ocr_analyze", StatusFn),
            break_analyze: resolve!(source, "ocr_break_analyze", StatusFn),
            is_running: resolve!(source, "ocr_is_running", StatusFn),
            get_simple_result: resolve!(source, "ocr_get_simple_result", GetStringFn),
            get_text_boxes: resolve!(source, "ocr_get_text_boxes", GetTextBoxesFn),
            free_text_boxes: resolve!(source, "ocr_free_text_boxes", FreeTextBoxesFn),
            get_version: resolve!(source, "ocr_get_version", LibraryVersionFn),
            api_version: None,
        };

        let mut loaded = 0;
        for spec in SYMBOLS.iter() {
            if table.has(spec.name) {
                loaded += 1;
                log::trace!("Resolved {}", spec.name);
            } else if spec.required {
                return Err(OcrError::RequiredSymbolMissing(spec.name));
            } else {
                log::warn!("Optional function not found: {}", spec.name);
            }
        }
        log::debug!(
            "Resolved {}/{} functions ({} required)",
            loaded,
            SYMBOLS.len(),
            SYMBOLS.iter().filter(|s| s.required).count()
        );

        Ok(table)
    }

    /// The version trio, only when all three parts are exported.
    pub fn resolve_version(source: &dyn SymbolSource) -> Option<VersionQuery> {
        Some(VersionQuery {
            major: resolve!(source, "ocr_get_api_version_major", VersionPartFn)?,
            minor: resolve!(source, "ocr_get_api_version_minor", VersionPartFn)?,
            patch: resolve!(source, "ocr_get_api_version_patch", VersionPartFn)?,
        })
    }

    pub fn has(&self, name: &str) -> bool {
        match name {
            "ocr_create" => self.create.is_some(),
            "ocr_destroy" => self.destroy.is_some(),
            "ocr_load_default_plugin" => self.load_default_plugin.is_some(),
            "ocr_plugin_ready" => self.plugin_ready.is_some(),
            "ocr_set_hardware" => self.set_hardware.is_some(),
            "ocr_set_max_threads" => self.set_max_threads.is_some(),
            "ocr_set_language" => self.set_language.is_some(),
            "ocr_set_image_file" => self.set_image_file.is_some(),
            "ocr_set_image_data" => self.set_image_data.is_some(),
            "ocr_analyze" => self.analyze.is_some(),
            "ocr_break_analyze" => self.break_analyze.is_some(),
            "ocr_is_running" => self.is_running.is_some(),
            "ocr_get_simple_result" => self.get_simple_result.is_some(),
            "ocr_get_text_boxes" => self.get_text_boxes.is_some(),
            "ocr_free_text_boxes" => self.free_text_boxes.is_some(),
            "ocr_get_version" => self.get_version.is_some(),
            "ocr_get_api_version_major"
            | "ocr_get_api_version_minor"
            | "ocr_get_api_version_patch" => self.api_version.is_some(),
            _ => false,
        }
    }

    /// Number of non-empty entries, counting the version trio as three.
    pub fn resolved_count(&self) -> usize {
        SYMBOLS.iter().filter(|spec| self.has(spec.name)).count()
            + if self.api_version.is_some() { 3 } else { 0 }
    }
}
