//! In-process stand-in for the native OCR library.
//!
//! Entry points are plain `extern "C"` functions over a boxed [`FakeOcr`].
//! Calls are logged per thread, so parallel tests do not see each other.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::ffi::{c_char, c_int, c_void, CStr};

use super::symbols::SymbolSource;
use super::types::*;

thread_local! {
    static CALLS: RefCell<Vec<&'static str>> = const { RefCell::new(Vec::new()) };
    static LAST_IMAGE: Cell<Option<(i32, i32, i32, [u8; 3])>> = const { Cell::new(None) };
    static RUNNING: Cell<bool> = const { Cell::new(false) };
}

pub(crate) fn calls() -> Vec<&'static str> {
    CALLS.with(|calls| calls.borrow().clone())
}

/// Width, height, channels and first pixel of the last image handed over.
pub(crate) fn last_image() -> Option<(i32, i32, i32, [u8; 3])> {
    LAST_IMAGE.with(Cell::get)
}

pub(crate) fn set_running(running: bool) {
    RUNNING.with(|r| r.set(running));
}

fn reset() {
    CALLS.with(|calls| calls.borrow_mut().clear());
    LAST_IMAGE.with(|image| image.set(None));
    RUNNING.with(|r| r.set(false));
}

fn log_call(name: &'static str) {
    CALLS.with(|calls| calls.borrow_mut().push(name));
}

#[derive(Default)]
struct FakeOcr {
    plugin_loaded: bool,
    has_image: bool,
    analyzed: bool,
}

unsafe fn state<'a>(handle: RawHandle) -> &'a mut FakeOcr {
    &mut *(handle as *mut FakeOcr)
}

extern "C" fn ocr_create() -> RawHandle {
    log_call("create");
    Box::into_raw(Box::<FakeOcr>::default()) as RawHandle
}

extern "C" fn ocr_create_null() -> RawHandle {
    log_call("create");
    std::ptr::null_mut()
}

unsafe extern "C" fn ocr_destroy(handle: RawHandle) {
    log_call("destroy");
    drop(Box::from_raw(handle as *mut FakeOcr));
}

unsafe extern "C" fn ocr_load_default_plugin(handle: RawHandle) -> c_int {
    log_call("load_default_plugin");
    state(handle).plugin_loaded = true;
    1
}

extern "C" fn ocr_load_default_plugin_fails(_handle: RawHandle) -> c_int {
    log_call("load_default_plugin");
    0
}

unsafe extern "C" fn ocr_plugin_ready(handle: RawHandle) -> c_int {
    c_int::from(state(handle).plugin_loaded)
}

extern "C" fn ocr_set_hardware(_handle: RawHandle, hardware: c_int, _device_id: c_int) -> c_int {
    log_call(if hardware == HardwareType::GpuVulkan as c_int {
        "set_hardware_gpu"
    } else {
        "set_hardware_cpu"
    });
    1
}

extern "C" fn ocr_set_hardware_fails(_handle: RawHandle, _hardware: c_int, _device_id: c_int) -> c_int {
    log_call("set_hardware_failed");
    0
}

extern "C" fn ocr_set_max_threads(_handle: RawHandle, count: c_int) -> c_int {
    log_call("set_max_threads");
    c_int::from(count > 0)
}

unsafe extern "C" fn ocr_set_language(_handle: RawHandle, language: *const c_char) -> c_int {
    log_call("set_language");
    c_int::from(!CStr::from_ptr(language).to_bytes().is_empty())
}

unsafe extern "C" fn ocr_set_image_file(handle: RawHandle, path: *const c_char) -> c_int {
    log_call("set_image_file");
    let ok = !CStr::from_ptr(path).to_bytes().is_empty();
    state(handle).has_image = ok;
    c_int::from(ok)
}

unsafe extern "C" fn ocr_set_image_data(
    handle: RawHandle,
    data: *const u8,
    width: c_int,
    height: c_int,
    channels: c_int,
) -> c_int {
    log_call("set_image_data");
    let pixels = std::slice::from_raw_parts(data, (width * height * channels) as usize);
    LAST_IMAGE.with(|image| {
        image.set(Some((width, height, channels, [pixels[0], pixels[1], pixels[2]])))
    });
    state(handle).has_image = true;
    1
}

unsafe extern "C" fn ocr_analyze(handle: RawHandle) -> c_int {
    log_call("analyze");
    let ocr = state(handle);
    ocr.analyzed = ocr.has_image;
    c_int::from(ocr.analyzed)
}

extern "C" fn ocr_break_analyze(_handle: RawHandle) -> c_int {
    log_call("break_analyze");
    1
}

extern "C" fn ocr_is_running(_handle: RawHandle) -> c_int {
    c_int::from(RUNNING.with(Cell::get))
}

unsafe extern "C" fn ocr_get_simple_result(handle: RawHandle) -> *const c_char {
    if state(handle).analyzed {
        b"hello ocr\0".as_ptr() as *const c_char
    } else {
        std::ptr::null()
    }
}

extern "C" fn ocr_get_text_boxes(_handle: RawHandle) -> *mut RawTextBoxList {
    let boxes = vec![
        RawTextBox {
            points: [0.0, 0.0, 8.0, 0.0, 8.0, 4.0, 0.0, 4.0],
            angle: 0.0,
        },
        RawTextBox {
            points: [10.0, 20.0, 30.0, 20.0, 30.0, 25.0, 10.0, 25.0],
            angle: 5.0,
        },
    ]
    .into_boxed_slice();
    let count = boxes.len() as c_int;
    Box::into_raw(Box::new(RawTextBoxList {
        boxes: Box::into_raw(boxes) as *mut RawTextBox,
        count,
    }))
}

unsafe extern "C" fn ocr_free_text_boxes(list: *mut RawTextBoxList) {
    log_call("free_text_boxes");
    let list = Box::from_raw(list);
    drop(Box::from_raw(std::ptr::slice_from_raw_parts_mut(
        list.boxes,
        list.count as usize,
    )));
}

extern "C" fn ocr_get_version() -> *const c_char {
    b"1.2.3-fake\0".as_ptr() as *const c_char
}

extern "C" fn version_0() -> c_int {
    0
}

extern "C" fn version_1() -> c_int {
    1
}

extern "C" fn version_2() -> c_int {
    2
}

extern "C" fn version_3() -> c_int {
    3
}

extern "C" fn version_9() -> c_int {
    9
}

pub(crate) struct FakeLibrary {
    symbols: HashMap<&'static str, usize>,
}

impl FakeLibrary {
    /// Required entries only. Clears this thread's call log.
    pub(crate) fn required_only() -> Self {
        reset();
        let symbols = HashMap::from([
            ("ocr_create", ocr_create as CreateFn as usize),
            ("ocr_destroy", ocr_destroy as DestroyFn as usize),
            ("ocr_load_default_plugin", ocr_load_default_plugin as StatusFn as usize),
            ("ocr_plugin_ready", ocr_plugin_ready as StatusFn as usize),
            ("ocr_set_image_file", ocr_set_image_file as SetStringFn as usize),
            ("ocr_set_image_data", ocr_set_image_data as SetImageDataFn as usize),
            ("ocr_analyze", ocr_analyze as StatusFn as usize),
            ("ocr_get_simple_result", ocr_get_simple_result as GetStringFn as usize),
        ]);
        Self { symbols }
    }

    /// Every entry, reporting API version 1.2.3. Clears this thread's call log.
    pub(crate) fn full() -> Self {
        Self::required_only()
            .with("ocr_set_hardware", ocr_set_hardware as SetHardwareFn as usize)
            .with("ocr_set_max_threads", ocr_set_max_threads as SetMaxThreadsFn as usize)
            .with("ocr_set_language", ocr_set_language as SetStringFn as usize)
            .with("ocr_break_analyze", ocr_break_analyze as StatusFn as usize)
            .with("ocr_is_running", ocr_is_running as StatusFn as usize)
            .with("ocr_get_text_boxes", ocr_get_text_boxes as GetTextBoxesFn as usize)
            .with("ocr_free_text_boxes", ocr_free_text_boxes as FreeTextBoxesFn as usize)
            .with("ocr_get_version", ocr_get_version as LibraryVersionFn as usize)
            .with("ocr_get_api_version_major", version_1 as VersionPartFn as usize)
            .with("ocr_get_api_version_minor", version_2 as VersionPartFn as usize)
            .with("ocr_get_api_version_patch", version_3 as VersionPartFn as usize)
    }

    pub(crate) fn with(mut self, name: &'static str, address: usize) -> Self {
        self.symbols.insert(name, address);
        self
    }

    pub(crate) fn without(mut self, name: &'static str) -> Self {
        self.symbols.remove(name);
        self
    }

    pub(crate) fn with_api_version_0_9_9(self) -> Self {
        self.with("ocr_get_api_version_major", version_0 as VersionPartFn as usize)
            .with("ocr_get_api_version_minor", version_9 as VersionPartFn as usize)
            .with("ocr_get_api_version_patch", version_9 as VersionPartFn as usize)
    }

    pub(crate) fn with_null_create(self) -> Self {
        self.with("ocr_create", ocr_create_null as CreateFn as usize)
    }

    pub(crate) fn with_failing_plugin(self) -> Self {
        self.with(
            "ocr_load_default_plugin",
            ocr_load_default_plugin_fails as StatusFn as usize,
        )
    }

    pub(crate) fn with_failing_hardware(self) -> Self {
        self.with("ocr_set_hardware", ocr_set_hardware_fails as SetHardwareFn as usize)
    }
}

impl SymbolSource for FakeLibrary {
    fn location(&self) -> String {
        "fake://libdtk6ocr.so".to_string()
    }

    fn symbol(&self, name: &str) -> Option<*const c_void> {
        self.symbols.get(name).map(|address| *address as *const c_void)
    }
}
