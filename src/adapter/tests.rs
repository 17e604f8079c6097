//! Adapter tests - preparation, raw calls per lowering, table completeness

use super::*;
use crate::library::StaticSymbols;
use crate::signature::Kind;
use std::sync::atomic::{AtomicI32, Ordering};

extern "C" fn add_i32(a: i32, b: i32) -> i32 {
    a.wrapping_add(b)
}

extern "C" fn negate_i32(a: i32) -> i32 {
    -a
}

extern "C" fn add_i64(a: i64, b: i64) -> i64 {
    a + b
}

extern "C" fn half_f32(x: f32) -> f32 {
    x / 2.0
}

extern "C" fn scale_f64(x: f64, by: i32) -> f64 {
    x * by as f64
}

extern "C" fn identity_ptr(p: *mut u8) -> *mut u8 {
    p
}

static SIDE_EFFECT: AtomicI32 = AtomicI32::new(0);

extern "C" fn store(value: i32) {
    SIDE_EFFECT.store(value, Ordering::SeqCst);
}

static TEST_API: &[EntryPoint] = crate::declare_entry_points! {
    add_i32(Int32, Int32) -> Int32;
    negate_i32(Int32) -> Int32;
    add_i64(Int64, Int64) -> Int64;
    half_f32(Float32) -> Float32;
    scale_f64(Float64, Int32) -> Float64;
    identity_ptr(Object) -> Object;
    store(Int32) -> Void;
};

fn test_symbols() -> Arc<dyn SymbolSource> {
    Arc::new(
        StaticSymbols::new("test-api")
            .with_fn("add_i32", add_i32 as *const ())
            .with_fn("negate_i32", negate_i32 as *const ())
            .with_fn("add_i64", add_i64 as *const ())
            .with_fn("half_f32", half_f32 as *const ())
            .with_fn("scale_f64", scale_f64 as *const ())
            .with_fn("identity_ptr", identity_ptr as *const ())
            .with_fn("store", store as *const ()),
    )
}

fn test_table() -> AdapterTable {
    let catalog = Catalog::new(TEST_API.iter().copied()).unwrap();
    AdapterTable::build(&catalog, test_symbols()).expect("all symbols registered")
}

fn slot_i32(v: i32) -> NativeValue {
    let mut slot = NativeValue::zeroed();
    slot.i32 = v;
    slot
}

fn slot_i64(v: i64) -> NativeValue {
    let mut slot = NativeValue::zeroed();
    slot.i64 = v;
    slot
}

#[test]
fn table_holds_exactly_one_adapter_per_declaration() {
    let table = test_table();
    assert_eq!(table.len(), TEST_API.len());

    for entry in TEST_API {
        let adapter = table.get(entry.name).expect("adapter present");
        assert_eq!(adapter.name(), entry.name);
        assert_eq!(adapter.signature(), &entry.signature);
    }
    assert_eq!(table.source().name(), "test-api");
}

#[test]
fn build_fails_whole_when_any_symbol_is_missing() {
    let mut entries: Vec<EntryPoint> = TEST_API.to_vec();
    entries.push(EntryPoint::new("not_there", &[], Kind::Void));
    entries.push(EntryPoint::new("also_not_there", &[Kind::Int32], Kind::Int32));
    let catalog = Catalog::new(entries).unwrap();

    let err = AdapterTable::build(&catalog, test_symbols()).unwrap_err();
    let BuildError::MissingSymbols { library, missing } = err;

    assert_eq!(library, "test-api");
    assert_eq!(missing, vec!["not_there".to_string(), "also_not_there".to_string()]);
}

#[test]
fn rebuilding_is_deterministic() {
    let first = test_table();
    let second = test_table();

    for entry in TEST_API {
        let a = first.get(entry.name).unwrap();
        let b = second.get(entry.name).unwrap();
        assert_eq!(a.address(), b.address());
        assert_eq!(a.lowered_params(), b.lowered_params());
        assert_eq!(a.lowered_return(), b.lowered_return());
    }
}

#[test]
fn lowering_follows_declaration() {
    let table = test_table();
    let scale = table.get("scale_f64").unwrap();

    assert_eq!(scale.lowered_params(), &[Lowered::F64, Lowered::I32]);
    assert_eq!(scale.lowered_return(), Lowered::F64);
    assert_eq!(scale.convention(), CallingConvention::host());
    assert_eq!(table.get("store").unwrap().lowered_return(), Lowered::Void);
}

#[test]
fn raw_call_int32() {
    let table = test_table();
    let add = table.get("add_i32").unwrap();
    let result = unsafe { add.call_raw(&[slot_i32(40), slot_i32(2)]) };
    assert_eq!(unsafe { result.i32 }, 42);
}

#[test]
fn raw_call_negative_int32_keeps_sign() {
    let table = test_table();
    let negate = table.get("negate_i32").unwrap();
    let result = unsafe { negate.call_raw(&[slot_i32(7)]) };
    assert_eq!(unsafe { result.i32 }, -7);
}

#[test]
fn raw_call_int64_beyond_32_bits() {
    let table = test_table();
    let add = table.get("add_i64").unwrap();
    let result = unsafe { add.call_raw(&[slot_i64(1 << 40), slot_i64(5)]) };
    assert_eq!(unsafe { result.i64 }, (1 << 40) + 5);
}

#[test]
fn raw_call_floats_are_bit_exact() {
    let table = test_table();

    let mut arg = NativeValue::zeroed();
    arg.f32 = 3.0;
    let half = unsafe { table.get("half_f32").unwrap().call_raw(&[arg]) };
    assert_eq!(unsafe { half.f32 }.to_bits(), 1.5f32.to_bits());

    let mut x = NativeValue::zeroed();
    x.f64 = 0.1;
    let scaled = unsafe { table.get("scale_f64").unwrap().call_raw(&[x, slot_i32(3)]) };
    assert_eq!(unsafe { scaled.f64 }.to_bits(), (0.1f64 * 3.0).to_bits());
}

#[test]
fn raw_call_address_round_trips() {
    let table = test_table();
    let addr = NativeAddress::from_bits(0xDEAD_BEE0);
    let result = unsafe {
        table
            .get("identity_ptr")
            .unwrap()
            .call_raw(&[NativeValue::from_address(addr)])
    };
    assert_eq!(NativeAddress::from_mut_ptr(unsafe { result.ptr }), addr);
}

#[test]
fn raw_call_void_runs_side_effect() {
    let table = test_table();
    unsafe { table.get("store").unwrap().call_raw(&[slot_i32(99)]) };
    assert_eq!(SIDE_EFFECT.load(Ordering::SeqCst), 99);
}

#[test]
fn adapters_are_shareable_across_threads() {
    let table = Arc::new(test_table());

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let table = Arc::clone(&table);
            std::thread::spawn(move || {
                let add = table.get("add_i64").unwrap();
                unsafe { add.call_raw(&[slot_i64(i), slot_i64(i)]).i64 }
            })
        })
        .collect();

    let results: Vec<i64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(results, vec![0, 2, 4, 6]);
}

#[cfg(target_os = "linux")]
#[test]
fn builds_against_the_host_c_library() {
    use crate::library::LibraryHandle;

    static LIBC: &[EntryPoint] = crate::declare_entry_points! {
        abs(Int32) -> Int32;
        labs(LONG) -> LONG;
    };

    let libc: Arc<dyn SymbolSource> = Arc::new(LibraryHandle::open("libc.so.6").unwrap());
    let table = AdapterTable::build(&Catalog::new(LIBC.iter().copied()).unwrap(), libc).unwrap();

    let abs = unsafe { table.get("abs").unwrap().call_raw(&[slot_i32(-12)]) };
    assert_eq!(unsafe { abs.i32 }, 12);
}
