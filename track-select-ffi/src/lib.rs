//! FFI bindings for track-select.
//!
//! This crate provides C ABI functions over a device selector for hosts
//! that enumerate devices themselves (web views, native shells). The host
//! acts as the selector's enumeration collaborator: it pushes device lists,
//! active-device changes and errors in, and drains the requests the selector
//! issued. All functions use panic::catch_unwind to prevent Rust panics from
//! unwinding across the FFI boundary.

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::ffi::{c_char, c_void, CStr, CString};
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use std::rc::Rc;
use std::sync::mpsc::Receiver;
use std::sync::OnceLock;
use track_select::media::{
    shared, DeviceEvent, MediaDeviceError, MediaDeviceInfo, MediaDeviceKind, MediaDeviceSource,
    PermissionRequest, SourceRequest, TrackHandle, WatcherSet,
};
use track_select::select::{DeviceSelectHandlers, DeviceSelectOptions, DeviceSelector};
use tracing::debug;
use tracing_subscriber::EnvFilter;

// ============================================================================
// Error Handling
// ============================================================================

/// Error codes returned by FFI functions.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Success = 0,
    InvalidHandle = -1,
    InvalidArgument = -2,
    DeviceNotFound = -3,
    PermissionDenied = -4,
    JsonError = -5,
    UnsupportedKind = -6,
    DeviceError = -7,
    Panic = -99,
}

impl From<&MediaDeviceError> for ErrorCode {
    fn from(err: &MediaDeviceError) -> Self {
        match err {
            MediaDeviceError::DeviceNotFound { .. } => ErrorCode::DeviceNotFound,
            MediaDeviceError::PermissionDenied { .. } => ErrorCode::PermissionDenied,
            MediaDeviceError::UnsupportedKind { .. } => ErrorCode::UnsupportedKind,
            _ => ErrorCode::DeviceError,
        }
    }
}

/// Failure of a single FFI call.
#[derive(Debug)]
struct FfiError {
    code: ErrorCode,
    message: String,
}

impl FfiError {
    fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for FfiError {
    fn from(err: serde_json::Error) -> Self {
        FfiError::new(ErrorCode::JsonError, err.to_string())
    }
}

/// Thread-local storage for the last error.
thread_local! {
    static LAST_ERROR: RefCell<Option<(ErrorCode, String)>> = const { RefCell::new(None) };
}

fn set_last_error(code: ErrorCode, message: impl Into<String>) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = Some((code, message.into()));
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Run `f`, recording failures and panics as the last error.
fn guarded<T>(
    what: &str,
    on_error: impl FnOnce(ErrorCode) -> T,
    f: impl FnOnce() -> Result<T, FfiError>,
) -> T {
    clear_last_error();

    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => value,
        Ok(Err(err)) => {
            debug!(what, code = ?err.code, message = %err.message, "FFI call failed");
            let code = err.code;
            set_last_error(code, err.message);
            on_error(code)
        }
        Err(_) => {
            set_last_error(ErrorCode::Panic, format!("Panic during {what}"));
            on_error(ErrorCode::Panic)
        }
    }
}

/// `guarded` for calls reporting a status code.
fn guarded_status(what: &str, f: impl FnOnce() -> Result<(), FfiError>) -> i32 {
    guarded(what, |code| code as i32, || {
        f()?;
        Ok(ErrorCode::Success as i32)
    })
}

// ============================================================================
// Data Types for JSON Serialization
// ============================================================================

/// Configuration for engine creation.
#[derive(Debug, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(flatten)]
    pub select: DeviceSelectOptions,

    #[serde(default)]
    pub log_level: Option<String>,
}

/// A request the selector issued to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RequestDto {
    Watch {
        kind: MediaDeviceKind,
        request_permissions: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        track_id: Option<String>,
    },
    RequestPermissions {
        kind: MediaDeviceKind,
    },
    SetActiveDevice {
        kind: MediaDeviceKind,
        device_id: String,
    },
}

impl From<SourceRequest> for RequestDto {
    fn from(request: SourceRequest) -> Self {
        match request {
            SourceRequest::Watch {
                kind,
                permission,
                track_id,
            } => RequestDto::Watch {
                kind,
                request_permissions: permission.is_requested(),
                track_id,
            },
            SourceRequest::RequestPermissions { kind } => RequestDto::RequestPermissions { kind },
            SourceRequest::SetActiveDevice { kind, device_id } => {
                RequestDto::SetActiveDevice { kind, device_id }
            }
        }
    }
}

/// A caller notification produced by the selector.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    DeviceListChange { devices: Vec<MediaDeviceInfo> },
    ActiveDeviceChange { device_id: String },
    MediaDeviceError {
        code: i32,
        message: String,
        error: MediaDeviceError,
    },
}

// ============================================================================
// Host Device Source
// ============================================================================

/// Enumeration collaborator whose work is done by the host.
#[derive(Debug, Default)]
struct HostDeviceSource {
    watchers: WatcherSet,
    requests: Vec<SourceRequest>,
}

impl HostDeviceSource {
    fn push(&mut self, kind: MediaDeviceKind, event: DeviceEvent) {
        self.watchers.send(kind, &event);
    }

    fn take_requests(&mut self) -> Vec<SourceRequest> {
        std::mem::take(&mut self.requests)
    }
}

impl MediaDeviceSource for HostDeviceSource {
    fn watch(
        &mut self,
        kind: MediaDeviceKind,
        permission: PermissionRequest,
        track: Option<&TrackHandle>,
    ) -> Receiver<DeviceEvent> {
        self.requests.push(SourceRequest::Watch {
            kind,
            permission,
            track_id: track.map(|t| t.track_id.clone()),
        });
        self.watchers.add(kind).1
    }

    fn request_permissions(&mut self, kind: MediaDeviceKind) {
        self.requests.push(SourceRequest::RequestPermissions { kind });
    }

    fn set_active_device(&mut self, kind: MediaDeviceKind, device_id: &str) {
        self.requests.push(SourceRequest::SetActiveDevice {
            kind,
            device_id: device_id.to_string(),
        });
    }
}

// ============================================================================
// Engine Handle Type
// ============================================================================

/// Opaque handle to a selector engine. Actually points to a SelectEngine struct.
pub type SelectEngineHandle = *mut c_void;

/// Internal engine state.
struct SelectEngine {
    kind: MediaDeviceKind,
    host: Rc<RefCell<HostDeviceSource>>,
    selector: DeviceSelector,
    notifications: Rc<RefCell<Vec<Notification>>>,
}

impl SelectEngine {
    fn new(options: DeviceSelectOptions) -> Self {
        let kind = options.kind;
        let (host, source) = shared(HostDeviceSource::default());
        let notifications = Rc::new(RefCell::new(Vec::new()));

        let lists = notifications.clone();
        let actives = notifications.clone();
        let errors = notifications.clone();
        let handlers = DeviceSelectHandlers::new()
            .on_device_list_change(move |devices| {
                lists.borrow_mut().push(Notification::DeviceListChange {
                    devices: devices.to_vec(),
                })
            })
            .on_active_device_change(move |device_id| {
                actives.borrow_mut().push(Notification::ActiveDeviceChange {
                    device_id: device_id.to_string(),
                })
            })
            .on_media_device_error(move |err| {
                errors.borrow_mut().push(Notification::MediaDeviceError {
                    code: ErrorCode::from(&err) as i32,
                    message: err.to_string(),
                    error: err,
                })
            });

        Self {
            kind,
            host,
            selector: DeviceSelector::new(source, options, handlers),
            notifications,
        }
    }

    /// Deliver a host event and let the selector react to it.
    fn push(&mut self, event: DeviceEvent) {
        self.host.borrow_mut().push(self.kind, event);
        self.selector.process_events();
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Allocate a C string from a Rust string. Caller must free with track_select_free_string.
fn alloc_c_string(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cs) => cs.into_raw(),
        // Interior null byte: hand back an empty string instead
        Err(_) => CString::default().into_raw(),
    }
}

/// Parse a C string to a Rust string slice.
unsafe fn parse_c_str<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok()
}

fn required_str<'a>(ptr: *const c_char, name: &str) -> Result<&'a str, FfiError> {
    unsafe { parse_c_str(ptr) }
        .ok_or_else(|| FfiError::new(ErrorCode::InvalidArgument, format!("Invalid {name}")))
}

fn engine<'a>(handle: SelectEngineHandle) -> Result<&'a mut SelectEngine, FfiError> {
    if handle.is_null() {
        return Err(FfiError::new(ErrorCode::InvalidHandle, "Null engine handle"));
    }
    Ok(unsafe { &mut *(handle as *mut SelectEngine) })
}

fn init_logging(level: Option<&str>) {
    static INIT: OnceLock<()> = OnceLock::new();
    INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(level.unwrap_or("warn")));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init()
            .ok();
    });
}

// ============================================================================
// FFI Functions - Lifecycle
// ============================================================================

/// Create a new selector engine.
///
/// # Arguments
/// * `config_json` - JSON configuration, e.g. `{"kind":"audioinput","request_permissions":false}`
///
/// # Returns
/// Handle to the engine, or null on failure. Check track_select_last_error_code() on failure.
///
/// # Safety
/// The returned handle must be freed with track_select_destroy().
#[no_mangle]
pub extern "C" fn track_select_create(config_json: *const c_char) -> SelectEngineHandle {
    guarded("engine creation", |_| ptr::null_mut(), || {
        let json = required_str(config_json, "config")?;
        let config: EngineConfig = serde_json::from_str(json)?;
        init_logging(config.log_level.as_deref());

        let engine = Box::new(SelectEngine::new(config.select));
        Ok(Box::into_raw(engine) as SelectEngineHandle)
    })
}

/// Destroy a selector engine.
///
/// # Safety
/// The handle must have been created by track_select_create() and must not be used after this call.
#[no_mangle]
pub extern "C" fn track_select_destroy(handle: SelectEngineHandle) {
    if handle.is_null() {
        return;
    }

    let _ = panic::catch_unwind(|| unsafe {
        let _ = Box::from_raw(handle as *mut SelectEngine);
    });
}

// ============================================================================
// FFI Functions - Host Events
// ============================================================================

/// Report the full device list for the engine's kind.
///
/// # Arguments
/// * `devices_json` - JSON array of `{"deviceId","label","kind","groupId"?}` objects
///
/// # Returns
/// 0 on success, negative error code on failure.
#[no_mangle]
pub extern "C" fn track_select_push_devices(
    handle: SelectEngineHandle,
    devices_json: *const c_char,
) -> i32 {
    guarded_status("device list push", || {
        let engine = engine(handle)?;
        let json = required_str(devices_json, "device list")?;
        let devices: Vec<MediaDeviceInfo> = serde_json::from_str(json)?;
        engine.push(DeviceEvent::DevicesChanged(devices));
        Ok(())
    })
}

/// Report the host's active device for the engine's kind.
#[no_mangle]
pub extern "C" fn track_select_push_active_device(
    handle: SelectEngineHandle,
    device_id: *const c_char,
) -> i32 {
    guarded_status("active device push", || {
        let engine = engine(handle)?;
        let device_id = required_str(device_id, "device ID")?;
        engine.push(DeviceEvent::ActiveDeviceChanged(device_id.to_string()));
        Ok(())
    })
}

/// Report a media device error (permission denial, enumeration or switch failure).
///
/// # Arguments
/// * `error_json` - tagged error, e.g. `{"permission_denied":{"kind":"audioinput"}}`
///   or `{"platform":"NotReadableError"}`
#[no_mangle]
pub extern "C" fn track_select_push_error(
    handle: SelectEngineHandle,
    error_json: *const c_char,
) -> i32 {
    guarded_status("error push", || {
        let engine = engine(handle)?;
        let json = required_str(error_json, "error")?;
        let error: MediaDeviceError = serde_json::from_str(json)?;
        engine.push(DeviceEvent::Error(error));
        Ok(())
    })
}

// ============================================================================
// FFI Functions - User Actions
// ============================================================================

/// Open or close the selection surface.
#[no_mangle]
pub extern "C" fn track_select_set_open(handle: SelectEngineHandle, open: bool) -> i32 {
    guarded_status("set open", || {
        let engine = engine(handle)?;
        engine.selector.set_open(open);
        Ok(())
    })
}

/// Select a device as the active one.
#[no_mangle]
pub extern "C" fn track_select_select_device(
    handle: SelectEngineHandle,
    device_id: *const c_char,
) -> i32 {
    guarded_status("device selection", || {
        let engine = engine(handle)?;
        let device_id = required_str(device_id, "device ID")?;
        engine.selector.select_device(device_id);
        Ok(())
    })
}

// ============================================================================
// FFI Functions - State
// ============================================================================

/// Get the selector's view model.
///
/// # Returns
/// JSON object, or JSON `null` when no selector should be rendered.
/// Caller must free with track_select_free_string(). Returns null on failure.
#[no_mangle]
pub extern "C" fn track_select_view(handle: SelectEngineHandle) -> *mut c_char {
    guarded("view", |_| ptr::null_mut(), || {
        let engine = engine(handle)?;
        let json = serde_json::to_string(&engine.selector.view())?;
        Ok(alloc_c_string(&json))
    })
}

/// Drain the requests the selector issued to the host.
///
/// # Returns
/// JSON array of requests. Caller must free with track_select_free_string().
#[no_mangle]
pub extern "C" fn track_select_take_requests(handle: SelectEngineHandle) -> *mut c_char {
    guarded("request drain", |_| ptr::null_mut(), || {
        let engine = engine(handle)?;
        let requests: Vec<RequestDto> = engine
            .host
            .borrow_mut()
            .take_requests()
            .into_iter()
            .map(Into::into)
            .collect();
        Ok(alloc_c_string(&serde_json::to_string(&requests)?))
    })
}

/// Drain the caller notifications produced since the last call.
///
/// # Returns
/// JSON array of notifications. Caller must free with track_select_free_string().
#[no_mangle]
pub extern "C" fn track_select_take_notifications(handle: SelectEngineHandle) -> *mut c_char {
    guarded("notification drain", |_| ptr::null_mut(), || {
        let engine = engine(handle)?;
        let notifications = std::mem::take(&mut *engine.notifications.borrow_mut());
        Ok(alloc_c_string(&serde_json::to_string(&notifications)?))
    })
}

// ============================================================================
// FFI Functions - Memory Management
// ============================================================================

/// Free a string allocated by this library.
///
/// # Safety
/// The pointer must have been returned by one of the track_select_* functions.
/// Do not call this on strings from other sources.
#[no_mangle]
pub extern "C" fn track_select_free_string(ptr: *mut c_char) {
    if ptr.is_null() {
        return;
    }

    let _ = panic::catch_unwind(|| unsafe {
        let _ = CString::from_raw(ptr);
    });
}

// ============================================================================
// FFI Functions - Error Handling
// ============================================================================

/// Get the last error code.
///
/// # Returns
/// The error code from the last failed operation, or 0 if no error.
#[no_mangle]
pub extern "C" fn track_select_last_error_code() -> i32 {
    LAST_ERROR.with(|e| {
        e.borrow()
            .as_ref()
            .map(|(code, _)| *code as i32)
            .unwrap_or(0)
    })
}

/// Get the last error message.
///
/// # Returns
/// Error message string. Caller must free with track_select_free_string().
/// Returns null if no error.
#[no_mangle]
pub extern "C" fn track_select_last_error_message() -> *mut c_char {
    LAST_ERROR.with(|e| {
        e.borrow()
            .as_ref()
            .map(|(_, msg)| alloc_c_string(msg))
            .unwrap_or(ptr::null_mut())
    })
}

// ============================================================================
// FFI Functions - Utility
// ============================================================================

/// Get the library version.
///
/// # Returns
/// Version string. Caller must free with track_select_free_string().
#[no_mangle]
pub extern "C" fn track_select_version() -> *mut c_char {
    alloc_c_string(env!("CARGO_PKG_VERSION"))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn take_json(ptr: *mut c_char) -> Value {
        assert!(!ptr.is_null());
        let value = unsafe { serde_json::from_str(CStr::from_ptr(ptr).to_str().unwrap()).unwrap() };
        track_select_free_string(ptr);
        value
    }

    fn create(config: &str) -> SelectEngineHandle {
        let config = CString::new(config).unwrap();
        track_select_create(config.as_ptr())
    }

    fn push_devices(handle: SelectEngineHandle, devices: Value) -> i32 {
        let json = CString::new(devices.to_string()).unwrap();
        track_select_push_devices(handle, json.as_ptr())
    }

    fn two_mics() -> Value {
        json!([
            {"deviceId": "a1", "label": "Mic 1", "kind": "audioinput"},
            {"deviceId": "a2", "label": "Mic 2", "kind": "audioinput"}
        ])
    }

    #[test]
    fn test_error_code_conversion() {
        assert_eq!(
            ErrorCode::from(&MediaDeviceError::DeviceNotFound {
                device_id: "test".to_string()
            }),
            ErrorCode::DeviceNotFound
        );
        assert_eq!(
            ErrorCode::from(&MediaDeviceError::Platform("x".to_string())),
            ErrorCode::DeviceError
        );
    }

    #[test]
    fn test_engine_lifecycle() {
        let handle = create(r#"{"kind":"audioinput"}"#);
        assert!(!handle.is_null());
        assert_eq!(
            take_json(track_select_take_requests(handle)),
            json!([{"type": "watch", "kind": "audioinput", "request_permissions": false}])
        );
        track_select_destroy(handle);
    }

    #[test]
    fn test_create_rejects_bad_config() {
        let handle = create(r#"{"kind":"hologram"}"#);
        assert!(handle.is_null());
        assert_eq!(track_select_last_error_code(), ErrorCode::JsonError as i32);

        let handle = track_select_create(ptr::null());
        assert!(handle.is_null());
        assert_eq!(track_select_last_error_code(), ErrorCode::InvalidArgument as i32);
    }

    #[test]
    fn test_null_handle_is_rejected() {
        assert_eq!(
            track_select_set_open(ptr::null_mut(), true),
            ErrorCode::InvalidHandle as i32
        );
        assert_eq!(track_select_last_error_code(), ErrorCode::InvalidHandle as i32);
        let message = track_select_last_error_message();
        assert!(!message.is_null());
        track_select_free_string(message);
    }

    #[test]
    fn test_view_appears_with_two_devices() {
        let handle = create(r#"{"kind":"audioinput","size":"sm"}"#);

        let single = json!([{"deviceId": "", "label": "Default", "kind": "audioinput"},
                            {"deviceId": "a1", "label": "Mic 1", "kind": "audioinput"}]);
        assert_eq!(push_devices(handle, single), 0);
        assert_eq!(take_json(track_select_view(handle)), Value::Null);

        assert_eq!(push_devices(handle, two_mics()), 0);
        let view = take_json(track_select_view(handle));
        assert_eq!(view["items"][1]["value"], "a2");
        assert_eq!(view["size"], "sm");
        assert_eq!(view["placeholder"], Value::Null);

        let notifications = take_json(track_select_take_notifications(handle));
        assert_eq!(notifications.as_array().unwrap().len(), 2);
        assert_eq!(notifications[0]["type"], "device_list_change");
        assert_eq!(notifications[0]["devices"][0]["deviceId"], "a1");

        track_select_destroy(handle);
    }

    #[test]
    fn test_open_and_select_queue_requests() {
        let handle = create(r#"{"kind":"audioinput"}"#);
        push_devices(handle, two_mics());
        take_json(track_select_take_requests(handle));

        assert_eq!(track_select_set_open(handle, true), 0);
        assert_eq!(track_select_set_open(handle, false), 0);
        assert_eq!(track_select_set_open(handle, true), 0);
        let device_id = CString::new("a2").unwrap();
        assert_eq!(track_select_select_device(handle, device_id.as_ptr()), 0);

        assert_eq!(
            take_json(track_select_take_requests(handle)),
            json!([
                {"type": "request_permissions", "kind": "audioinput"},
                {"type": "set_active_device", "kind": "audioinput", "device_id": "a2"}
            ])
        );

        let notifications = take_json(track_select_take_notifications(handle));
        assert_eq!(
            notifications.as_array().unwrap().last().unwrap(),
            &json!({"type": "active_device_change", "device_id": "a2"})
        );

        assert_eq!(track_select_push_active_device(handle, device_id.as_ptr()), 0);
        assert_eq!(take_json(track_select_view(handle))["value"], "a2");

        track_select_destroy(handle);
    }

    fn push_error(handle: SelectEngineHandle, error: Value) -> i32 {
        let json = CString::new(error.to_string()).unwrap();
        track_select_push_error(handle, json.as_ptr())
    }

    #[test]
    fn test_pushed_errors_keep_their_category() {
        let handle = create(r#"{"kind":"videoinput"}"#);
        let denied = json!({"permission_denied": {"kind": "videoinput"}});
        assert_eq!(push_error(handle, denied.clone()), 0);
        assert_eq!(push_error(handle, json!({"platform": "NotReadableError"})), 0);

        let notifications = take_json(track_select_take_notifications(handle));
        assert_eq!(notifications[0]["type"], "media_device_error");
        assert_eq!(notifications[0]["code"], ErrorCode::PermissionDenied as i32);
        assert_eq!(notifications[0]["error"], denied);
        assert_eq!(notifications[1]["code"], ErrorCode::DeviceError as i32);
        assert_eq!(notifications[1]["message"], "NotReadableError");
        track_select_destroy(handle);
    }

    #[test]
    fn test_push_error_rejects_untagged_message() {
        let handle = create(r#"{"kind":"audioinput"}"#);
        let message = CString::new("NotAllowedError").unwrap();
        assert_eq!(
            track_select_push_error(handle, message.as_ptr()),
            ErrorCode::JsonError as i32
        );
        track_select_destroy(handle);
    }

    #[test]
    fn test_version() {
        let version = track_select_version();
        assert!(!version.is_null());
        unsafe {
            let s = CStr::from_ptr(version).to_str().unwrap();
            assert!(!s.is_empty());
        }
        track_select_free_string(version);
    }
}
