// Dynamic loader for the native OCR library (libdtk6ocr)
mod instance;
mod search;
mod symbols;
mod types;
mod utils;

#[cfg(test)]
pub(crate) mod testing;

pub use instance::TextBoxList;
pub use search::{library_names, system_library_paths, LibraryLocation, LibrarySearch};
pub use symbols::{FunctionTable, NativeLibrary, SymbolSource, SymbolSpec, VersionQuery, SYMBOLS};
pub use types::{ApiVersion, HardwareType, LoaderConfig, RawTextBox, RawTextBoxList, TextBox};
pub use utils::OcrLoader;
