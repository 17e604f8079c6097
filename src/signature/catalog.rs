//! The CPython C API surface bound by this crate
//!
//! Declarations mirror the C prototypes. Only functions exported by every
//! CPython from 3.8 onward are listed, so one table resolves against any
//! supported libpython.
//!
//! Entries marked `[infallible]` never report failure through their return
//! value: a null from `PyErr_Occurred` or `PyDict_GetItemString` means
//! "nothing there", not "error raised".

use super::EntryPoint;

pub static PYTHON_C_API: &[EntryPoint] = crate::declare_entry_points! {
    // Lifecycle
    Py_Initialize() -> Void;
    Py_InitializeEx(Int32) -> Void;
    Py_Finalize() -> Void;
    Py_FinalizeEx() -> Int32;
    Py_IsInitialized() -> Int32 [infallible];
    Py_GetVersion() -> CString;

    // Interpreter lock and thread state
    PyEval_SaveThread() -> Object [infallible];
    PyEval_RestoreThread(Object) -> Void;
    PyGILState_Ensure() -> Int32 [infallible];
    PyGILState_Release(Int32) -> Void;
    PyGILState_Check() -> Int32 [infallible];
    PyGILState_GetThisThreadState() -> Object [infallible];

    // Reference counts
    Py_IncRef(Object) -> Void;
    Py_DecRef(Object) -> Void;

    // Running code and importing
    PyRun_SimpleString(CString) -> Int32;
    PyRun_String(CString, Int32, Object, Object) -> Object;
    Py_CompileString(CString, CString, Int32) -> Object;
    PyEval_EvalCode(Object, Object, Object) -> Object;
    PyEval_GetBuiltins() -> Object;
    PyImport_ImportModule(CString) -> Object;
    PyImport_Import(Object) -> Object;
    PyImport_AddModule(CString) -> Object;
    PyModule_GetDict(Object) -> Object;
    PyModule_GetName(Object) -> CString;
    PyModule_AddObject(Object, CString, Object) -> Int32;
    PySys_GetObject(CString) -> Object [infallible];
    PySys_SetObject(CString, Object) -> Int32;

    // Generic object protocol
    PyObject_GetAttr(Object, Object) -> Object;
    PyObject_GetAttrString(Object, CString) -> Object;
    PyObject_SetAttr(Object, Object, Object) -> Int32;
    PyObject_SetAttrString(Object, CString, Object) -> Int32;
    PyObject_HasAttr(Object, Object) -> Int32 [infallible];
    PyObject_HasAttrString(Object, CString) -> Int32 [infallible];
    PyObject_GetItem(Object, Object) -> Object;
    PyObject_SetItem(Object, Object, Object) -> Int32;
    PyObject_DelItem(Object, Object) -> Int32;
    PyObject_DelItemString(Object, CString) -> Int32;
    PyObject_Str(Object) -> Object;
    PyObject_Repr(Object) -> Object;
    PyObject_ASCII(Object) -> Object;
    PyObject_Bytes(Object) -> Object;
    PyObject_Format(Object, Object) -> Object;
    PyObject_Type(Object) -> Object;
    PyObject_Size(Object) -> SSIZE;
    PyObject_Hash(Object) -> SSIZE;
    PyObject_IsTrue(Object) -> Int32;
    PyObject_Not(Object) -> Int32;
    PyObject_Call(Object, Object, Object) -> Object;
    PyObject_CallObject(Object, Object) -> Object;
    PyObject_RichCompare(Object, Object, Int32) -> Object;
    PyObject_RichCompareBool(Object, Object, Int32) -> Int32;
    PyObject_IsInstance(Object, Object) -> Int32;
    PyObject_IsSubclass(Object, Object) -> Int32;
    PyObject_GetIter(Object) -> Object;
    PyObject_Dir(Object) -> Object;
    PyType_IsSubtype(Object, Object) -> Int32 [infallible];
    PyCallable_Check(Object) -> Int32 [infallible];
    PyIter_Next(Object) -> Object;

    // Integers, floats, booleans, complex
    PyLong_FromLong(LONG) -> Object;
    PyLong_AsLong(Object) -> LONG;
    PyLong_FromLongLong(Int64) -> Object;
    PyLong_AsLongLong(Object) -> Int64;
    PyLong_FromSsize_t(SSIZE) -> Object;
    PyLong_AsSsize_t(Object) -> SSIZE;
    PyLong_FromDouble(Float64) -> Object;
    PyLong_AsDouble(Object) -> Float64;
    PyLong_FromString(CString, ObjectRef, Int32) -> Object;
    PyFloat_FromDouble(Float64) -> Object;
    PyFloat_AsDouble(Object) -> Float64;
    PyFloat_FromString(Object) -> Object;
    PyBool_FromLong(LONG) -> Object;
    PyComplex_FromDoubles(Float64, Float64) -> Object;
    PyComplex_RealAsDouble(Object) -> Float64;
    PyComplex_ImagAsDouble(Object) -> Float64;

    // Number protocol
    PyNumber_Check(Object) -> Int32 [infallible];
    PyNumber_Add(Object, Object) -> Object;
    PyNumber_Subtract(Object, Object) -> Object;
    PyNumber_Multiply(Object, Object) -> Object;
    PyNumber_TrueDivide(Object, Object) -> Object;
    PyNumber_FloorDivide(Object, Object) -> Object;
    PyNumber_Remainder(Object, Object) -> Object;
    PyNumber_Divmod(Object, Object) -> Object;
    PyNumber_Power(Object, Object, Object) -> Object;
    PyNumber_Negative(Object) -> Object;
    PyNumber_Positive(Object) -> Object;
    PyNumber_Absolute(Object) -> Object;
    PyNumber_Invert(Object) -> Object;
    PyNumber_Lshift(Object, Object) -> Object;
    PyNumber_Rshift(Object, Object) -> Object;
    PyNumber_And(Object, Object) -> Object;
    PyNumber_Or(Object, Object) -> Object;
    PyNumber_Xor(Object, Object) -> Object;
    PyNumber_Long(Object) -> Object;
    PyNumber_Float(Object) -> Object;
    PyNumber_Index(Object) -> Object;

    // Text and bytes
    PyUnicode_FromString(CString) -> Object;
    PyUnicode_FromStringAndSize(CString, SSIZE) -> Object;
    PyUnicode_InternFromString(CString) -> Object;
    PyUnicode_AsUTF8(Object) -> CString;
    PyUnicode_AsUTF8AndSize(Object, ObjectRef) -> CString;
    PyUnicode_AsUTF8String(Object) -> Object;
    PyUnicode_GetLength(Object) -> SSIZE;
    PyUnicode_Concat(Object, Object) -> Object;
    PyBytes_FromString(CString) -> Object;
    PyBytes_FromStringAndSize(CString, SSIZE) -> Object;
    PyBytes_Size(Object) -> SSIZE;

    // Dictionaries
    PyDict_New() -> Object;
    PyDict_SetItem(Object, Object, Object) -> Int32;
    PyDict_SetItemString(Object, CString, Object) -> Int32;
    PyDict_GetItem(Object, Object) -> Object [infallible];
    PyDict_GetItemString(Object, CString) -> Object [infallible];
    PyDict_GetItemWithError(Object, Object) -> Object;
    PyDict_DelItem(Object, Object) -> Int32;
    PyDict_DelItemString(Object, CString) -> Int32;
    PyDict_Contains(Object, Object) -> Int32;
    PyDict_Keys(Object) -> Object;
    PyDict_Values(Object) -> Object;
    PyDict_Items(Object) -> Object;
    PyDict_Size(Object) -> SSIZE;
    PyDict_Clear(Object) -> Void;
    PyDict_Copy(Object) -> Object;
    PyDict_Update(Object, Object) -> Int32;
    PyDict_Merge(Object, Object, Int32) -> Int32;
    PyDict_Next(Object, ObjectRef, ObjectRef, ObjectRef) -> Int32 [infallible];

    // Lists
    PyList_New(SSIZE) -> Object;
    PyList_Size(Object) -> SSIZE;
    PyList_GetItem(Object, SSIZE) -> Object;
    PyList_SetItem(Object, SSIZE, Object) -> Int32;
    PyList_Insert(Object, SSIZE, Object) -> Int32;
    PyList_Append(Object, Object) -> Int32;
    PyList_GetSlice(Object, SSIZE, SSIZE) -> Object;
    PyList_Sort(Object) -> Int32;
    PyList_Reverse(Object) -> Int32;
    PyList_AsTuple(Object) -> Object;

    // Tuples
    PyTuple_New(SSIZE) -> Object;
    PyTuple_Size(Object) -> SSIZE;
    PyTuple_GetItem(Object, SSIZE) -> Object;
    PyTuple_SetItem(Object, SSIZE, Object) -> Int32;
    PyTuple_GetSlice(Object, SSIZE, SSIZE) -> Object;

    // Sets
    PySet_New(Object) -> Object;
    PySet_Size(Object) -> SSIZE;
    PySet_Add(Object, Object) -> Int32;
    PySet_Discard(Object, Object) -> Int32;
    PySet_Contains(Object, Object) -> Int32;

    // Sequence and mapping protocols
    PySequence_Check(Object) -> Int32 [infallible];
    PySequence_Size(Object) -> SSIZE;
    PySequence_GetItem(Object, SSIZE) -> Object;
    PySequence_Contains(Object, Object) -> Int32;
    PySequence_List(Object) -> Object;
    PySequence_Tuple(Object) -> Object;
    PyMapping_Check(Object) -> Int32 [infallible];
    PyMapping_Size(Object) -> SSIZE;
    PyMapping_Keys(Object) -> Object;
    PyMapping_Values(Object) -> Object;
    PyMapping_Items(Object) -> Object;
    PyMapping_GetItemString(Object, CString) -> Object;
    PyMapping_SetItemString(Object, CString, Object) -> Int32;
    PyMapping_HasKeyString(Object, CString) -> Int32 [infallible];

    // Error state
    PyErr_Occurred() -> Object [infallible];
    PyErr_Clear() -> Void;
    PyErr_Print() -> Void;
    PyErr_Fetch(ObjectRef, ObjectRef, ObjectRef) -> Void;
    PyErr_Restore(Object, Object, Object) -> Void;
    PyErr_NormalizeException(ObjectRef, ObjectRef, ObjectRef) -> Void;
    PyErr_SetString(Object, CString) -> Void;
    PyErr_SetObject(Object, Object) -> Void;
    PyErr_SetNone(Object) -> Void;
    PyErr_NoMemory() -> Object;
    PyErr_WarnEx(Object, CString, SSIZE) -> Int32;
    PyErr_ExceptionMatches(Object) -> Int32 [infallible];
    PyErr_GivenExceptionMatches(Object, Object) -> Int32 [infallible];
    PyException_GetTraceback(Object) -> Object [infallible];
};
