use std::marker::PhantomData;
use std::ptr::NonNull;

use super::types::{DestroyFn, FreeTextBoxesFn, RawHandle, RawTextBox, RawTextBoxList, TextBox};

/// Owns one native OCR instance and destroys it exactly once on drop.
pub(crate) struct OcrInstance {
    handle: NonNull<std::ffi::c_void>,
    destroy: DestroyFn,
}

// SAFETY: the native instance is not bound to the creating thread. Every
// call through it goes via `&mut OcrLoader`, so calls are never concurrent.
unsafe impl Send for OcrInstance {}

impl OcrInstance {
    pub(crate) fn new(handle: RawHandle, destroy: DestroyFn) -> Option<Self> {
        NonNull::new(handle).map(|handle| Self { handle, destroy })
    }

    pub(crate) fn raw(&self) -> RawHandle {
        self.handle.as_ptr()
    }
}

impl Drop for OcrInstance {
    fn drop(&mut self) {
        // SAFETY: the handle came from `ocr_create` of the same library and
        // the loader drops instances before unloading the library.
        unsafe { (self.destroy)(self.handle.as_ptr()) };
        log::debug!("OCR instance destroyed");
    }
}

/// Text regions returned by the native library.
///
/// The native list is released through `ocr_free_text_boxes` when this value
/// is dropped. The borrow on the loader keeps the library mapped meanwhile.
pub struct TextBoxList<'a> {
    list: NonNull<RawTextBoxList>,
    free: Option<FreeTextBoxesFn>,
    _loader: PhantomData<&'a mut ()>,
}

impl<'a> TextBoxList<'a> {
    pub(crate) fn new(list: *mut RawTextBoxList, free: Option<FreeTextBoxesFn>) -> Option<Self> {
        NonNull::new(list).map(|list| Self {
            list,
            free,
            _loader: PhantomData,
        })
    }

    fn raw_boxes(&self) -> &[RawTextBox] {
        // SAFETY: the list stays valid until freed in `drop`.
        let raw = unsafe { self.list.as_ref() };
        match usize::try_from(raw.count) {
            Ok(count) if count > 0 && !raw.boxes.is_null() => {
                // SAFETY: the native side allocates `count` contiguous boxes.
                unsafe { std::slice::from_raw_parts(raw.boxes, count) }
            }
            _ => &[],
        }
    }

    pub fn len(&self) -> usize {
        self.raw_boxes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = TextBox> + '_ {
        self.raw_boxes().iter().map(TextBox::from)
    }

    pub fn to_vec(&self) -> Vec<TextBox> {
        self.iter().collect()
    }
}

impl Drop for TextBoxList<'_> {
    fn drop(&mut self) {
        match self.free {
            // SAFETY: the list came from `ocr_get_text_boxes` and is freed once.
            Some(free) => unsafe { free(self.list.as_ptr()) },
            None => log::debug!("ocr_free_text_boxes unavailable, text box list not released"),
        }
    }
}
