//! The binary layout shared with the extension host.
//!
//! Every buffer that crosses the boundary has exactly one owner. Arguments
//! passed into a call stay owned by the caller. Anything written through a
//! `ret` or `err` out-pointer belongs to the receiver, who must release it
//! exactly once with the matching `*_free` function. Freeing resets the value
//! to an empty buffer, so a second free is a no-op.

use std::{
    ffi::{c_char, CStr},
    marker::PhantomData,
    ptr, slice,
};

/// A length-prefixed UTF-8 buffer (`extension_string_t`).
#[repr(C)]
#[derive(Debug)]
pub struct ExtensionString {
    ptr: *mut u8,
    len: usize,
}

impl ExtensionString {
    pub const fn empty() -> Self {
        Self {
            ptr: ptr::null_mut(),
            len: 0,
        }
    }

    /// Copies `s` into a freshly owned buffer.
    pub fn dup(s: &str) -> Self {
        Self::dup_bytes(s.as_bytes())
    }

    fn dup_bytes(bytes: &[u8]) -> Self {
        let buffer: Box<[u8]> = bytes.into();
        let len = buffer.len();
        let ptr = Box::into_raw(buffer).cast::<u8>();
        live::increment();
        Self { ptr, len }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        raw_slice(self.ptr, self.len)
    }

    /// Copies the contents out, leaving the buffer with its current owner.
    ///
    /// Invalid UTF-8 is replaced with U+FFFD and logged.
    pub fn to_string_lossy(&self) -> String {
        match std::str::from_utf8(self.as_bytes()) {
            Ok(contents) => contents.to_string(),
            Err(error) => {
                log::warn!("extension string is not valid UTF-8: {error}");
                String::from_utf8_lossy(self.as_bytes()).into_owned()
            }
        }
    }

    /// Copies the contents out and releases the buffer.
    pub fn take(&mut self) -> String {
        let contents = self.to_string_lossy();
        self.free();
        contents
    }
}

impl AbiFree for ExtensionString {
    fn free(&mut self) {
        if self.ptr.is_null() {
            return;
        }
        unsafe { drop(Box::from_raw(ptr::slice_from_raw_parts_mut(self.ptr, self.len))) };
        live::decrement();
        *self = Self::empty();
    }
}

/// `extension_option_string_t`
#[repr(C)]
#[derive(Debug)]
pub struct ExtensionOptionString {
    pub is_some: bool,
    pub val: ExtensionString,
}

impl ExtensionOptionString {
    pub const fn none() -> Self {
        Self {
            is_some: false,
            val: ExtensionString::empty(),
        }
    }

    pub fn some(value: &str) -> Self {
        Self {
            is_some: true,
            val: ExtensionString::dup(value),
        }
    }

    pub fn to_option(&self) -> Option<String> {
        self.is_some.then(|| self.val.to_string_lossy())
    }

    pub fn take(&mut self) -> Option<String> {
        let value = self.to_option();
        self.free();
        value
    }
}

impl AbiFree for ExtensionOptionString {
    fn free(&mut self) {
        self.val.free();
        self.is_some = false;
    }
}

/// `extension_tuple2_string_string_t`
#[repr(C)]
#[derive(Debug)]
pub struct ExtensionTuple2StringString {
    pub f0: ExtensionString,
    pub f1: ExtensionString,
}

impl ExtensionTuple2StringString {
    pub fn dup(key: &str, value: &str) -> Self {
        Self {
            f0: ExtensionString::dup(key),
            f1: ExtensionString::dup(value),
        }
    }
}

impl AbiFree for ExtensionTuple2StringString {
    fn free(&mut self) {
        self.f0.free();
        self.f1.free();
    }
}

/// A `{ptr, len}` list. Empty lists are always written as a null pointer with
/// a zero length.
#[repr(C)]
#[derive(Debug)]
pub struct ExtensionList<T> {
    ptr: *mut T,
    len: usize,
}

impl<T> ExtensionList<T> {
    pub const fn empty() -> Self {
        Self {
            ptr: ptr::null_mut(),
            len: 0,
        }
    }

    pub fn from_vec(items: Vec<T>) -> Self {
        if items.is_empty() {
            return Self::empty();
        }
        let items = items.into_boxed_slice();
        let len = items.len();
        Self {
            ptr: Box::into_raw(items).cast::<T>(),
            len,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[T] {
        raw_slice(self.ptr, self.len)
    }
}

impl<T: AbiFree> AbiFree for ExtensionList<T> {
    fn free(&mut self) {
        if self.ptr.is_null() {
            return;
        }
        let mut items =
            unsafe { Box::from_raw(ptr::slice_from_raw_parts_mut(self.ptr, self.len)) };
        for item in items.iter_mut() {
            item.free();
        }
        drop(items);
        *self = Self::empty();
    }
}

pub type ExtensionListString = ExtensionList<ExtensionString>;
pub type ExtensionListTuple2StringString = ExtensionList<ExtensionTuple2StringString>;
/// `extension_env_vars_t`
pub type ExtensionEnvVars = ExtensionListTuple2StringString;

impl ExtensionListString {
    pub fn dup_all<S: AsRef<str>>(items: &[S]) -> Self {
        Self::from_vec(
            items
                .iter()
                .map(|item| ExtensionString::dup(item.as_ref()))
                .collect(),
        )
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.as_slice()
            .iter()
            .map(ExtensionString::to_string_lossy)
            .collect()
    }
}

impl ExtensionListTuple2StringString {
    pub fn dup_pairs<K: AsRef<str>, V: AsRef<str>>(pairs: &[(K, V)]) -> Self {
        Self::from_vec(
            pairs
                .iter()
                .map(|(key, value)| ExtensionTuple2StringString::dup(key.as_ref(), value.as_ref()))
                .collect(),
        )
    }

    pub fn to_vec(&self) -> Vec<(String, String)> {
        self.as_slice()
            .iter()
            .map(|pair| (pair.f0.to_string_lossy(), pair.f1.to_string_lossy()))
            .collect()
    }
}

/// `extension_command_t`
#[repr(C)]
#[derive(Debug)]
pub struct ExtensionCommand {
    pub command: ExtensionString,
    pub args: ExtensionListString,
    pub env: ExtensionEnvVars,
}

impl ExtensionCommand {
    pub const fn empty() -> Self {
        Self {
            command: ExtensionString::empty(),
            args: ExtensionList::empty(),
            env: ExtensionList::empty(),
        }
    }
}

impl AbiFree for ExtensionCommand {
    fn free(&mut self) {
        self.command.free();
        self.args.free();
        self.env.free();
    }
}

/// A borrowed handle to a host-owned worktree (`extension_borrow_worktree_t`).
#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExtensionBorrowWorktree(pub u32);

/// Opaque element types of the label entry points, which the shim never
/// inspects.
#[repr(C)]
pub struct ExtensionCompletion {
    _private: [u8; 0],
    _marker: PhantomData<*mut u8>,
}

#[repr(C)]
pub struct ExtensionSymbol {
    _private: [u8; 0],
    _marker: PhantomData<*mut u8>,
}

#[repr(C)]
pub struct ExtensionOptionCodeLabel {
    _private: [u8; 0],
    _marker: PhantomData<*mut u8>,
}

pub type ExtensionListCompletion = ExtensionList<ExtensionCompletion>;
pub type ExtensionListSymbol = ExtensionList<ExtensionSymbol>;
pub type ExtensionListOptionCodeLabel = ExtensionList<ExtensionOptionCodeLabel>;

/// `klyx_extension_system_toast_duration_t`
pub type ExtensionToastDuration = u8;
pub const KLYX_EXTENSION_SYSTEM_TOAST_DURATION_SHORT: ExtensionToastDuration = 0;
pub const KLYX_EXTENSION_SYSTEM_TOAST_DURATION_LONG: ExtensionToastDuration = 1;

/// Releases a buffer exactly once.
pub trait AbiFree {
    fn free(&mut self);
}

fn raw_slice<'a, T>(ptr: *const T, len: usize) -> &'a [T] {
    if ptr.is_null() || len == 0 {
        &[]
    } else {
        unsafe { slice::from_raw_parts(ptr, len) }
    }
}

/// # Safety
///
/// `ret` must be valid for writes. `s` must be null or point to a
/// NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn extension_string_dup(ret: *mut ExtensionString, s: *const c_char) {
    let bytes = if s.is_null() {
        &[][..]
    } else {
        CStr::from_ptr(s).to_bytes()
    };
    ret.write(ExtensionString::dup_bytes(bytes));
}

/// # Safety
///
/// `s` must be null or point to a string produced by this module.
#[no_mangle]
pub unsafe extern "C" fn extension_string_free(s: *mut ExtensionString) {
    if let Some(s) = s.as_mut() {
        s.free();
    }
}

/// # Safety
///
/// `s` must be null or point to an option produced by this module.
#[no_mangle]
pub unsafe extern "C" fn extension_option_string_free(s: *mut ExtensionOptionString) {
    if let Some(s) = s.as_mut() {
        s.free();
    }
}

/// # Safety
///
/// `list` must be null or point to a list produced by this module.
#[no_mangle]
pub unsafe extern "C" fn extension_list_string_free(list: *mut ExtensionListString) {
    if let Some(list) = list.as_mut() {
        list.free();
    }
}

/// # Safety
///
/// `env` must be null or point to a list produced by this module.
#[no_mangle]
pub unsafe extern "C" fn extension_env_vars_free(env: *mut ExtensionEnvVars) {
    if let Some(env) = env.as_mut() {
        env.free();
    }
}

/// # Safety
///
/// `command` must be null or point to a command produced by this module.
#[no_mangle]
pub unsafe extern "C" fn extension_command_free(command: *mut ExtensionCommand) {
    if let Some(command) = command.as_mut() {
        command.free();
    }
}

#[cfg(any(test, feature = "test-support"))]
mod live {
    use std::cell::Cell;

    thread_local! {
        static LIVE_STRINGS: Cell<isize> = const { Cell::new(0) };
    }

    pub(super) fn increment() {
        LIVE_STRINGS.with(|live| live.set(live.get() + 1));
    }

    pub(super) fn decrement() {
        LIVE_STRINGS.with(|live| live.set(live.get() - 1));
    }

    pub fn count() -> isize {
        LIVE_STRINGS.with(Cell::get)
    }
}

#[cfg(not(any(test, feature = "test-support")))]
mod live {
    #[inline]
    pub(super) fn increment() {}

    #[inline]
    pub(super) fn decrement() {}
}

/// The number of strings duplicated on this thread and not yet freed.
#[cfg(any(test, feature = "test-support"))]
pub fn live_string_count() -> isize {
    live::count()
}
