//! Calls into the host's user interface.

use crate::{
    abi::{
        AbiFree, ExtensionString, ExtensionToastDuration, KLYX_EXTENSION_SYSTEM_TOAST_DURATION_LONG,
        KLYX_EXTENSION_SYSTEM_TOAST_DURATION_SHORT,
    },
    host,
};

/// How long a toast stays on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ToastDuration {
    Short = KLYX_EXTENSION_SYSTEM_TOAST_DURATION_SHORT,
    Long = KLYX_EXTENSION_SYSTEM_TOAST_DURATION_LONG,
}

impl ToastDuration {
    pub fn from_raw(raw: ExtensionToastDuration) -> Option<Self> {
        match raw {
            KLYX_EXTENSION_SYSTEM_TOAST_DURATION_SHORT => Some(Self::Short),
            KLYX_EXTENSION_SYSTEM_TOAST_DURATION_LONG => Some(Self::Long),
            _ => None,
        }
    }

    pub fn to_raw(self) -> ExtensionToastDuration {
        self as ExtensionToastDuration
    }
}

/// Shows a toast notification in the host.
pub fn show_toast(message: &str, duration: ToastDuration) {
    let mut message = ExtensionString::dup(message);
    unsafe { host::klyx_extension_system_show_toast(&mut message, duration.to_raw()) };
    message.free();
}
