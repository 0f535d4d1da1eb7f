#![allow(unused_macros)]

/// Helper macro for locking items, mapping a poisoned lock to [`crate::Error::LockError`]
///
/// ```rust, ignore
///  let mut handles = lock!(self.handles);
///  handles.view = None;
/// ```
macro_rules! lock {
    ($lock:expr) => {
        $lock.lock().map_err(|_| crate::Error::LockError)?
    };
}

/// Helper macro for running a closure against a locked item
///
/// ```rust, ignore
///  let len = with_lock!(self.handles, |handles| handles.view.as_ref().map(View::len))?;
/// ```
macro_rules! with_lock {
    ($lock:expr, $closure:expr) => {{
        match $lock.lock() {
            Ok(mut guard) => Ok($closure(&mut *guard)),
            Err(_) => Err(crate::Error::LockError),
        }
    }};
}
