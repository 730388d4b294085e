use windows::{
    core::Error,
    Win32::Foundation::{
        CloseHandle,
        HANDLE,
    },
};

/// Process or snapshot handle owned by the interface.
/// The handle gets released exactly once, when the owner is dropped.
pub struct OwnedHandle {
    inner: HANDLE,
    kind: &'static str,
}

impl OwnedHandle {
    /// Take ownership of a handle returned by a Win32 call.
    /// Null and `INVALID_HANDLE_VALUE` are rejected, as they must never be closed.
    pub fn from_raw_handle(handle: HANDLE, kind: &'static str) -> Option<Self> {
        if handle.is_invalid() || handle.0 == 0 {
            return None;
        }

        Some(Self {
            inner: handle,
            kind,
        })
    }

    pub fn raw_handle(&self) -> HANDLE {
        self.inner
    }
}

impl Drop for OwnedHandle {
    fn drop(&mut self) {
        log::trace!("Releasing {} handle {:X}", self.kind, self.inner.0);
        if !unsafe { CloseHandle(self.inner) }.as_bool() {
            log::warn!(
                "Failed to release {} handle {:X}: {}",
                self.kind,
                self.inner.0,
                Error::from_win32()
            );
        }
    }
}
