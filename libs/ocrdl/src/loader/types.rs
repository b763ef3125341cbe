use serde::{Deserialize, Serialize};
use std::ffi::{c_char, c_int, c_void};
use std::path::PathBuf;

pub type RawHandle = *mut c_void;

pub type CreateFn = unsafe extern "C" fn() -> RawHandle;
pub type DestroyFn = unsafe extern "C" fn(RawHandle);
/// Shape shared by every entry that takes only the handle and reports a status.
pub type StatusFn = unsafe extern "C" fn(RawHandle) -> c_int;
pub type SetHardwareFn = unsafe extern "C" fn(RawHandle, c_int, c_int) -> c_int;
pub type SetMaxThreadsFn = unsafe extern "C" fn(RawHandle, c_int) -> c_int;
pub type SetStringFn = unsafe extern "C" fn(RawHandle, *const c_char) -> c_int;
pub type SetImageDataFn =
    unsafe extern "C" fn(RawHandle, *const u8, c_int, c_int, c_int) -> c_int;
pub type GetStringFn = unsafe extern "C" fn(RawHandle) -> *const c_char;
pub type GetTextBoxesFn = unsafe extern "C" fn(RawHandle) -> *mut RawTextBoxList;
pub type FreeTextBoxesFn = unsafe extern "C" fn(*mut RawTextBoxList);
pub type LibraryVersionFn = unsafe extern "C" fn() -> *const c_char;
pub type VersionPartFn = unsafe extern "C" fn() -> c_int;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawTextBox {
    pub points: [f32; 8],
    pub angle: f32,
}

#[repr(C)]
#[derive(Debug)]
pub struct RawTextBoxList {
    pub boxes: *mut RawTextBox,
    pub count: c_int,
}

/// One recognized text region: four corner points and a rotation angle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TextBox {
    pub points: [(f32, f32); 4],
    pub angle: f32,
}

impl From<&RawTextBox> for TextBox {
    fn from(raw: &RawTextBox) -> Self {
        let p = raw.points;
        Self {
            points: [(p[0], p[1]), (p[2], p[3]), (p[4], p[5]), (p[6], p[7])],
            angle: raw.angle,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i32)]
pub enum HardwareType {
    Cpu = 0,
    GpuVulkan = 101,
}

impl std::fmt::Display for HardwareType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HardwareType::Cpu => write!(f, "CPU"),
            HardwareType::GpuVulkan => write!(f, "GPU (Vulkan)"),
        }
    }
}

/// Semantic API version reported by the library. Field order gives the
/// lexicographic ordering used by the compatibility gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ApiVersion {
    pub major: i32,
    pub minor: i32,
    pub patch: i32,
}

impl ApiVersion {
    pub const MINIMUM: ApiVersion = ApiVersion::new(1, 0, 0);

    pub const fn new(major: i32, minor: i32, patch: i32) -> Self {
        Self { major, minor, patch }
    }

    pub fn is_compatible_with(&self, minimum: &ApiVersion) -> bool {
        self >= minimum
    }
}

impl std::fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Library stem without prefix or suffix, e.g. `dtk6ocr`.
    pub library_name: String,
    /// Full version of the exact-versioned file name.
    pub library_version: String,
    /// Older file names still accepted, tried after the current names.
    pub legacy_names: Vec<String>,
    pub extra_search_paths: Vec<PathBuf>,
    /// Environment variable holding a `:`-separated list of directories.
    pub search_path_env: Option<String>,
    /// Let the OS loader resolve bare names before probing directories.
    pub auto_resolve: bool,
    /// Skip the search and load this file.
    pub library_path: Option<PathBuf>,
    pub min_api_version: ApiVersion,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            library_name: "dtk6ocr".to_string(),
            library_version: "1.0.0".to_string(),
            legacy_names: vec!["libdtkocr.so.1".to_string(), "libdtkocr.so".to_string()],
            extra_search_paths: Vec::new(),
            search_path_env: Some("LD_LIBRARY_PATH".to_string()),
            auto_resolve: true,
            library_path: None,
            min_api_version: ApiVersion::MINIMUM,
        }
    }
}

impl LoaderConfig {
    pub const LIBRARY_PATH_ENV: &'static str = "OCRDL_LIBRARY";

    /// Explicit library file from the config, else from `OCRDL_LIBRARY`.
    pub fn explicit_library_path(&self) -> Option<PathBuf> {
        self.library_path.clone().or_else(|| {
            std::env::var_os(Self::LIBRARY_PATH_ENV)
                .filter(|value| !value.is_empty())
                .map(PathBuf::from)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_gate_is_lexicographic() {
        let min = ApiVersion::new(1, 0, 0);

        assert!(ApiVersion::new(1, 0, 0).is_compatible_with(&min));
        assert!(!ApiVersion::new(0, 9, 9).is_compatible_with(&min));
        assert!(ApiVersion::new(2, 0, 0).is_compatible_with(&min));
        assert!(ApiVersion::new(2, -1, -5).is_compatible_with(&ApiVersion::new(1, 7, 3)));
    }

    #[test]
    fn test_version_gate_minor_and_patch() {
        let min = ApiVersion::new(1, 2, 3);

        assert!(!ApiVersion::new(1, 1, 9).is_compatible_with(&min));
        assert!(ApiVersion::new(1, 3, 0).is_compatible_with(&min));
        assert!(!ApiVersion::new(1, 2, 2).is_compatible_with(&min));
        assert!(ApiVersion::new(1, 2, 3).is_compatible_with(&min));
    }

    #[test]
    fn test_raw_text_box_corners() {
        let raw = RawTextBox {
            points: [0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0],
            angle: 90.0,
        };
        let text_box = TextBox::from(&raw);

        assert_eq!(text_box.points[0], (0.0, 1.0));
        assert_eq!(text_box.points[3], (6.0, 7.0));
        assert_eq!(text_box.angle, 90.0);
    }

    #[test]
    fn test_config_defaults_fill_missing_fields() {
        let config: LoaderConfig = serde_json::from_str(r#"{"library_name": "foo"}"#).unwrap();

        assert_eq!(config.library_name, "foo");
        assert_eq!(config.library_version, "1.0.0");
        assert!(config.auto_resolve);
        assert_eq!(config.min_api_version, ApiVersion::MINIMUM);
    }
}
