//! In-process stand-in for libpython
//!
//! Just enough of the C API, implemented as `extern "C"` functions with the
//! declared prototypes, to drive the dispatcher end to end. Objects are
//! leaked boxes; interpreter, lock and error state is per thread so tests
//! run independently.

#![allow(dead_code)]

use pylink::globals::DataSymbol;
use pylink::{Catalog, NativeAddress, Runtime, StaticSymbols, SymbolSource};
use std::cell::Cell;
use std::ffi::{c_char, CStr, CString};
use std::sync::{Arc, Mutex};

pub enum FakeObject {
    None,
    Type(&'static str),
    Int(i64),
    Float(f64),
    Str(CString),
    Dict(Mutex<Vec<(String, usize)>>),
}

pub static NONE: FakeObject = FakeObject::None;
pub static TYPE_ERROR: FakeObject = FakeObject::Type("TypeError");
pub static KEY_ERROR: FakeObject = FakeObject::Type("KeyError");

// `PyObject *` variables, like the real `PyExc_*` exports
static PYEXC_TYPE_ERROR: &FakeObject = &TYPE_ERROR;
static PYEXC_KEY_ERROR: &FakeObject = &KEY_ERROR;

static THREAD_STATE: u64 = 0;

thread_local! {
    static RUNNING: Cell<bool> = const { Cell::new(false) };
    static LOCK_DEPTH: Cell<i32> = const { Cell::new(0) };
    static ERROR: Cell<(usize, usize)> = const { Cell::new((0, 0)) };
    static REFCOUNT_OPS: Cell<i64> = const { Cell::new(0) };
}

fn new_object(object: FakeObject) -> *mut FakeObject {
    Box::into_raw(Box::new(object))
}

unsafe fn object<'a>(ptr: *const FakeObject) -> Option<&'a FakeObject> {
    ptr.as_ref()
}

fn set_error(kind: &'static FakeObject, message: &str) {
    let value = new_object(FakeObject::Str(CString::new(message).unwrap_or_default()));
    ERROR.with(|e| e.set((kind as *const FakeObject as usize, value as usize)));
}

fn key_text(ptr: *const FakeObject) -> Option<String> {
    match unsafe { object(ptr) } {
        Some(FakeObject::Str(s)) => Some(s.to_string_lossy().into_owned()),
        _ => None,
    }
}

// Lifecycle and lock

extern "C" fn py_initialize() {
    RUNNING.with(|r| r.set(true));
    LOCK_DEPTH.with(|d| d.set(1));
}

extern "C" fn py_is_initialized() -> i32 {
    RUNNING.with(Cell::get) as i32
}

extern "C" fn py_finalize_ex() -> i32 {
    RUNNING.with(|r| r.set(false));
    0
}

extern "C" fn save_thread() -> *const u64 {
    LOCK_DEPTH.with(|d| d.set(d.get() - 1));
    &THREAD_STATE
}

extern "C" fn restore_thread(_state: *const u64) {
    LOCK_DEPTH.with(|d| d.set(d.get() + 1));
}

extern "C" fn gil_ensure() -> i32 {
    LOCK_DEPTH.with(|d| {
        let unlocked = d.get() == 0;
        d.set(d.get() + 1);
        unlocked as i32
    })
}

extern "C" fn gil_release(_state: i32) {
    LOCK_DEPTH.with(|d| d.set(d.get() - 1));
}

extern "C" fn gil_check() -> i32 {
    (LOCK_DEPTH.with(Cell::get) > 0) as i32
}

pub fn lock_depth() -> i32 {
    LOCK_DEPTH.with(Cell::get)
}

// Reference counts

extern "C" fn incref(_obj: *mut FakeObject) {
    REFCOUNT_OPS.with(|c| c.set(c.get() + 1));
}

extern "C" fn decref(_obj: *mut FakeObject) {
    REFCOUNT_OPS.with(|c| c.set(c.get() - 1));
}

pub fn refcount_balance() -> i64 {
    REFCOUNT_OPS.with(Cell::get)
}

// Numbers

extern "C" fn long_from_long_long(v: i64) -> *mut FakeObject {
    new_object(FakeObject::Int(v))
}

extern "C" fn long_as_long_long(obj: *mut FakeObject) -> i64 {
    match unsafe { object(obj) } {
        Some(FakeObject::Int(v)) => *v,
        _ => {
            set_error(&TYPE_ERROR, "an integer is required");
            -1
        }
    }
}

extern "C" fn float_from_double(v: f64) -> *mut FakeObject {
    new_object(FakeObject::Float(v))
}

extern "C" fn float_as_double(obj: *mut FakeObject) -> f64 {
    match unsafe { object(obj) } {
        Some(FakeObject::Float(v)) => *v,
        Some(FakeObject::Int(v)) => *v as f64,
        _ => {
            set_error(&TYPE_ERROR, "must be real number");
            -1.0
        }
    }
}

extern "C" fn number_add(a: *mut FakeObject, b: *mut FakeObject) -> *mut FakeObject {
    match unsafe { (object(a), object(b)) } {
        (Some(FakeObject::Int(x)), Some(FakeObject::Int(y))) => new_object(FakeObject::Int(x + y)),
        (Some(FakeObject::Float(x)), Some(FakeObject::Float(y))) => new_object(FakeObject::Float(x + y)),
        _ => {
            set_error(&TYPE_ERROR, "unsupported operand type(s) for +");
            std::ptr::null_mut()
        }
    }
}

// Strings

extern "C" fn unicode_from_string(s: *const c_char) -> *mut FakeObject {
    let text = unsafe { CStr::from_ptr(s) }.to_owned();
    new_object(FakeObject::Str(text))
}

extern "C" fn unicode_as_utf8(obj: *mut FakeObject) -> *const c_char {
    match unsafe { object(obj) } {
        Some(FakeObject::Str(s)) => s.as_ptr(),
        _ => {
            set_error(&TYPE_ERROR, "bad argument type");
            std::ptr::null()
        }
    }
}

// Dictionaries

extern "C" fn dict_new() -> *mut FakeObject {
    new_object(FakeObject::Dict(Mutex::new(Vec::new())))
}

fn with_dict<R>(dict: *mut FakeObject, f: impl FnOnce(&mut Vec<(String, usize)>) -> R) -> Option<R> {
    match unsafe { object(dict) } {
        Some(FakeObject::Dict(entries)) => {
            let mut entries = entries.lock().ok()?;
            Some(f(&mut entries))
        }
        _ => {
            set_error(&TYPE_ERROR, "expected a dict");
            None
        }
    }
}

extern "C" fn dict_set_item_string(dict: *mut FakeObject, key: *const c_char, value: *mut FakeObject) -> i32 {
    let key = unsafe { CStr::from_ptr(key) }.to_string_lossy().into_owned();
    with_dict(dict, |entries| {
        entries.retain(|(k, _)| *k != key);
        entries.push((key, value as usize));
        0
    })
    .unwrap_or(-1)
}

extern "C" fn dict_get_item_string(dict: *mut FakeObject, key: *const c_char) -> *mut FakeObject {
    let key = unsafe { CStr::from_ptr(key) }.to_string_lossy().into_owned();
    with_dict(dict, |entries| {
        entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| *v as *mut FakeObject)
    })
    .flatten()
    .unwrap_or(std::ptr::null_mut())
}

extern "C" fn dict_contains(dict: *mut FakeObject, key: *mut FakeObject) -> i32 {
    let Some(key) = key_text(key) else {
        set_error(&TYPE_ERROR, "unhashable key");
        return -1;
    };
    with_dict(dict, |entries| entries.iter().any(|(k, _)| *k == key) as i32).unwrap_or(-1)
}

extern "C" fn dict_size(dict: *mut FakeObject) -> isize {
    with_dict(dict, |entries| entries.len() as isize).unwrap_or(-1)
}

extern "C" fn mapping_has_key_string(dict: *mut FakeObject, key: *const c_char) -> i32 {
    !dict_get_item_string(dict, key).is_null() as i32
}

// Error state

extern "C" fn err_occurred() -> *mut FakeObject {
    ERROR.with(|e| e.get().0 as *mut FakeObject)
}

extern "C" fn err_clear() {
    ERROR.with(|e| e.set((0, 0)));
}

extern "C" fn err_set_string(kind: *mut FakeObject, message: *const c_char) {
    let message = unsafe { CStr::from_ptr(message) }.to_owned();
    let value = new_object(FakeObject::Str(message));
    ERROR.with(|e| e.set((kind as usize, value as usize)));
}

extern "C" fn err_fetch(ptype: *mut usize, pvalue: *mut usize, ptraceback: *mut usize) {
    let (kind, value) = ERROR.with(|e| e.replace((0, 0)));
    unsafe {
        ptype.write(kind);
        pvalue.write(value);
        ptraceback.write(0);
    }
}

/// Entry points the fake implements, all with their catalogue signatures
pub const ENTRY_POINTS: &[&str] = &[
    "Py_Initialize",
    "Py_IsInitialized",
    "Py_FinalizeEx",
    "PyEval_SaveThread",
    "PyEval_RestoreThread",
    "PyGILState_Ensure",
    "PyGILState_Release",
    "PyGILState_Check",
    "Py_IncRef",
    "Py_DecRef",
    "PyLong_FromLongLong",
    "PyLong_AsLongLong",
    "PyFloat_FromDouble",
    "PyFloat_AsDouble",
    "PyNumber_Add",
    "PyUnicode_FromString",
    "PyUnicode_AsUTF8",
    "PyDict_New",
    "PyDict_SetItemString",
    "PyDict_GetItemString",
    "PyDict_Contains",
    "PyDict_Size",
    "PyMapping_HasKeyString",
    "PyErr_Occurred",
    "PyErr_Clear",
    "PyErr_SetString",
    "PyErr_Fetch",
];

pub const DATA_SYMBOLS: &[DataSymbol] = &[
    DataSymbol::direct("_Py_NoneStruct", "None"),
    DataSymbol::indirect("PyExc_TypeError", "TypeError"),
    DataSymbol::indirect("PyExc_KeyError", "KeyError"),
];

pub fn symbols() -> StaticSymbols {
    StaticSymbols::new("fake-libpython")
        .with_fn("Py_Initialize", py_initialize as *const ())
        .with_fn("Py_IsInitialized", py_is_initialized as *const ())
        .with_fn("Py_FinalizeEx", py_finalize_ex as *const ())
        .with_fn("PyEval_SaveThread", save_thread as *const ())
        .with_fn("PyEval_RestoreThread", restore_thread as *const ())
        .with_fn("PyGILState_Ensure", gil_ensure as *const ())
        .with_fn("PyGILState_Release", gil_release as *const ())
        .with_fn("PyGILState_Check", gil_check as *const ())
        .with_fn("Py_IncRef", incref as *const ())
        .with_fn("Py_DecRef", decref as *const ())
        .with_fn("PyLong_FromLongLong", long_from_long_long as *const ())
        .with_fn("PyLong_AsLongLong", long_as_long_long as *const ())
        .with_fn("PyFloat_FromDouble", float_from_double as *const ())
        .with_fn("PyFloat_AsDouble", float_as_double as *const ())
        .with_fn("PyNumber_Add", number_add as *const ())
        .with_fn("PyUnicode_FromString", unicode_from_string as *const ())
        .with_fn("PyUnicode_AsUTF8", unicode_as_utf8 as *const ())
        .with_fn("PyDict_New", dict_new as *const ())
        .with_fn("PyDict_SetItemString", dict_set_item_string as *const ())
        .with_fn("PyDict_GetItemString", dict_get_item_string as *const ())
        .with_fn("PyDict_Contains", dict_contains as *const ())
        .with_fn("PyDict_Size", dict_size as *const ())
        .with_fn("PyMapping_HasKeyString", mapping_has_key_string as *const ())
        .with_fn("PyErr_Occurred", err_occurred as *const ())
        .with_fn("PyErr_Clear", err_clear as *const ())
        .with_fn("PyErr_SetString", err_set_string as *const ())
        .with_fn("PyErr_Fetch", err_fetch as *const ())
        .with("_Py_NoneStruct", NativeAddress::from_ptr(&NONE as *const FakeObject))
        .with("PyExc_TypeError", NativeAddress::from_ptr(&PYEXC_TYPE_ERROR as *const &FakeObject))
        .with("PyExc_KeyError", NativeAddress::from_ptr(&PYEXC_KEY_ERROR as *const &FakeObject))
}

/// A runtime bound to the fake, not yet initialized
pub fn runtime() -> Runtime {
    let source: Arc<dyn SymbolSource> = Arc::new(symbols());
    let catalog = Catalog::python()
        .select(ENTRY_POINTS)
        .expect("fake entry points are all declared");

    Runtime::from_source(source, &catalog, DATA_SYMBOLS).expect("fake runtime binds")
}

/// Address of a fake static object
pub fn address_of(object: &'static FakeObject) -> NativeAddress {
    NativeAddress::from_ptr(object as *const FakeObject)
}
