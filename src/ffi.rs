//! FFI bindings for Ridelink
//!
//! C-compatible functions for the stateless part of the pipeline:
//! classification, navigation parsing, and wire transformation. All
//! functions use C strings (null-terminated) and return allocated memory
//! that must be freed by the caller using `ridelink_free_string`.
//!
//! The stateful pieces (call tracking, link management) are not exposed
//! here; hosts that need them embed the crate directly.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use chrono::Utc;

use crate::classifier::NotificationClassifier;
use crate::config::FormatProfile;
use crate::parser::NavigationParser;
use crate::transformer::DataTransformer;
use crate::types::{NavigationEvent, RawNotification};

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

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Classify a notification and return the classification as JSON.
///
/// # Safety
/// - `source` must be a valid null-terminated C string; `title`, `text`,
///   and `big_text` may each be NULL (treated as empty).
/// - Returns a newly allocated string that must be freed with
///   `ridelink_free_string`.
/// - Returns NULL on error; call `ridelink_last_error` for the message.
#[no_mangle]
pub unsafe extern "C" fn ridelink_classify(
    source: *const c_char,
    title: *const c_char,
    text: *const c_char,
    big_text: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let source = match cstr_to_string(source) {
        Some(s) => s,
        None => {
            set_last_error("Invalid source string pointer");
            return ptr::null_mut();
        }
    };

    let raw = RawNotification {
        source,
        title: cstr_to_string(title).unwrap_or_default(),
        text: cstr_to_string(text).unwrap_or_default(),
        big_text: cstr_to_string(big_text).unwrap_or_default(),
        phone_number: None,
        posted_at: Utc::now(),
    };

    let classifier = match NotificationClassifier::new(Vec::new()) {
        Ok(c) => c,
        Err(e) => {
            set_last_error(&e.to_string());
            return ptr::null_mut();
        }
    };

    match serde_json::to_string(&classifier.classify(&raw)) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Parse navigation cue text and return the event as JSON.
///
/// # Safety
/// - `text` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with
///   `ridelink_free_string`.
/// - Returns NULL when no cue was found or on error; call
///   `ridelink_last_error` for the message.
#[no_mangle]
pub unsafe extern "C" fn ridelink_parse_navigation(text: *const c_char) -> *mut c_char {
    clear_last_error();

    let text = match cstr_to_string(text) {
        Some(s) => s,
        None => {
            set_last_error("Invalid text string pointer");
            return ptr::null_mut();
        }
    };

    let parser = match NavigationParser::new() {
        Ok(p) => p,
        Err(e) => {
            set_last_error(&e.to_string());
            return ptr::null_mut();
        }
    };

    let Some(event) = parser.parse(&text) else {
        set_last_error("No navigation cue found");
        return ptr::null_mut();
    };

    match serde_json::to_string(&event) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Transform a navigation event (as JSON) into wire payload JSON.
///
/// # Safety
/// - `event_json` must be a valid null-terminated C string.
/// - `max_payload` of 0 selects the default limit.
/// - Returns a newly allocated string that must be freed with
///   `ridelink_free_string`.
/// - Returns NULL on error; call `ridelink_last_error` for the message.
#[no_mangle]
pub unsafe extern "C" fn ridelink_transform_navigation(
    event_json: *const c_char,
    max_payload: u32,
) -> *mut c_char {
    clear_last_error();

    let event_json = match cstr_to_string(event_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid event JSON string pointer");
            return ptr::null_mut();
        }
    };

    let event: NavigationEvent = match serde_json::from_str(&event_json) {
        Ok(e) => e,
        Err(e) => {
            set_last_error(&e.to_string());
            return ptr::null_mut();
        }
    };

    let mut profile = FormatProfile::default();
    if max_payload > 0 {
        profile.max_payload_bytes = max_payload as usize;
    }

    match DataTransformer::new(profile).transform_navigation(&event) {
        Ok(payload) => string_to_cstr(&payload.json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free a string returned by Ridelink functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a Ridelink function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn ridelink_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next Ridelink call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn ridelink_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

/// Get the Ridelink library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn ridelink_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    #[test]
    fn test_ffi_classify() {
        let source = CString::new("com.google.android.apps.maps").unwrap();
        let text = CString::new("Turn left in 200m").unwrap();

        unsafe {
            let result =
                ridelink_classify(source.as_ptr(), ptr::null(), text.as_ptr(), ptr::null());
            assert!(!result.is_null());

            let result_str = CStr::from_ptr(result).to_str().unwrap();
            assert!(result_str.contains("\"navigation\""));

            ridelink_free_string(result);
        }
    }

    #[test]
    fn test_ffi_parse_and_transform() {
        let text = CString::new("Turn left in 200m onto Main Street").unwrap();

        unsafe {
            let event = ridelink_parse_navigation(text.as_ptr());
            assert!(!event.is_null());

            let wire = ridelink_transform_navigation(event, 0);
            assert!(!wire.is_null());

            let wire_str = CStr::from_ptr(wire).to_str().unwrap();
            assert!(wire_str.contains("\"NAVIGATION\""));
            assert!(wire_str.contains("\"left\""));

            ridelink_free_string(event);
            ridelink_free_string(wire);
        }
    }

    #[test]
    fn test_ffi_parse_error_path() {
        let text = CString::new("battery at 80 percent").unwrap();

        unsafe {
            let result = ridelink_parse_navigation(text.as_ptr());
            assert!(result.is_null());

            let error = ridelink_last_error();
            assert!(!error.is_null());
            let error_str = CStr::from_ptr(error).to_str().unwrap();
            assert!(!error_str.is_empty());
        }
    }

    #[test]
    fn test_ffi_version() {
        unsafe {
            let version = ridelink_version();
            assert!(!version.is_null());
            let version_str = CStr::from_ptr(version).to_str().unwrap();
            assert!(!version_str.is_empty());
        }
    }
}
