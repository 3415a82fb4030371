//! FFI bindings for Synheart Calm
//!
//! This module provides C-compatible functions for calling the engine from
//! the app shells. All functions use C strings (null-terminated) and return
//! allocated memory that must be freed by the caller using `calm_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::classifier::classify_json;
use crate::config::CalmConfig;
use crate::guidance::guidance_for_label;
use crate::monitor::MeditationMonitor;
use crate::types::HeartRateSample;

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

fn json_to_cstr<T: serde::Serialize>(value: &T) -> *mut c_char {
    match serde_json::to_string(value) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Classify a JSON array of `{heartRate, timestamp}` samples.
///
/// # Safety
/// - `window_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `calm_free_string`.
/// - Returns NULL on error; call `calm_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn calm_classify(window_json: *const c_char) -> *mut c_char {
    clear_last_error();

    let json_str = match cstr_to_string(window_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return ptr::null_mut();
        }
    };

    match classify_json(&json_str) {
        Ok(result) => string_to_cstr(&result),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Breathing guidance JSON for a state label.
///
/// NULL or unknown labels yield the warming-up guidance.
///
/// # Safety
/// - `state` must be NULL or a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `calm_free_string`.
#[no_mangle]
pub unsafe extern "C" fn calm_guidance(state: *const c_char) -> *mut c_char {
    clear_last_error();

    let label = cstr_to_string(state);
    json_to_cstr(&guidance_for_label(label.as_deref()))
}

// ============================================================================
// Stateful Monitor API
// ============================================================================

/// Opaque handle to a MeditationMonitor
pub struct CalmMonitorHandle {
    monitor: MeditationMonitor,
}

/// Create a monitor. `config_json` may be NULL for defaults.
///
/// # Safety
/// - `config_json` must be NULL or a valid null-terminated C string.
/// - Must be freed with `calm_monitor_free`.
/// - Returns NULL on error; call `calm_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn calm_monitor_new(config_json: *const c_char) -> *mut CalmMonitorHandle {
    clear_last_error();

    let config = if config_json.is_null() {
        CalmConfig::default()
    } else {
        let json_str = match cstr_to_string(config_json) {
            Some(s) => s,
            None => {
                set_last_error("Invalid config string pointer");
                return ptr::null_mut();
            }
        };
        match CalmConfig::from_json(&json_str) {
            Ok(config) => config,
            Err(e) => {
                set_last_error(&e.to_string());
                return ptr::null_mut();
            }
        }
    };

    let handle = Box::new(CalmMonitorHandle {
        monitor: MeditationMonitor::with_config(&config),
    });
    Box::into_raw(handle)
}

/// Free a monitor.
///
/// # Safety
/// - `monitor` must be a valid pointer returned by `calm_monitor_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn calm_monitor_free(monitor: *mut CalmMonitorHandle) {
    if !monitor.is_null() {
        drop(Box::from_raw(monitor));
    }
}

/// Push one heart-rate sample and return the update as JSON.
///
/// # Safety
/// - `monitor` must be a valid pointer returned by `calm_monitor_new`.
/// - Returns a newly allocated string that must be freed with `calm_free_string`.
/// - Returns NULL on error; call `calm_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn calm_monitor_push(
    monitor: *mut CalmMonitorHandle,
    heart_rate: f64,
    timestamp_ms: i64,
) -> *mut c_char {
    clear_last_error();

    if monitor.is_null() {
        set_last_error("Null monitor pointer");
        return ptr::null_mut();
    }
    if !heart_rate.is_finite() {
        set_last_error("Heart rate must be a finite number");
        return ptr::null_mut();
    }

    let handle = &mut *monitor;
    let update = handle
        .monitor
        .push_sample(HeartRateSample::new(heart_rate, timestamp_ms));
    json_to_cstr(&update)
}

/// Clear a monitor's sample window.
///
/// # Safety
/// - `monitor` must be a valid pointer returned by `calm_monitor_new`, or NULL.
#[no_mangle]
pub unsafe extern "C" fn calm_monitor_reset(monitor: *mut CalmMonitorHandle) {
    if !monitor.is_null() {
        (*monitor).monitor.reset();
    }
}

/// Free a string returned by Calm functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a Calm function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn calm_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next Calm function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn calm_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn calm_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
