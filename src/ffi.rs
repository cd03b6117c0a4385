//! C ABI function exports for the adder/subtractor simulator
//!
//! These functions are called from host test harnesses (Ruby Fiddle, Python
//! ctypes, C). All functions use C-compatible types and tolerate null
//! pointers, reporting failure through return values.

use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int, c_uint, c_ulong};
use std::ptr;
use std::slice;

use crate::core::{CoreSimulator, Inputs, INPUT_NAMES, OUTPUT_NAMES};
use crate::error::SimError;
use crate::logic::Op;

// ============================================================================
// Simulator Context
// ============================================================================

/// Opaque simulator context passed to all FFI functions
pub struct AddSubSimContext {
    pub core: CoreSimulator,
}

unsafe fn write_error(error_out: *mut *mut c_char, e: SimError) {
    if !error_out.is_null() {
        let msg = CString::new(e.to_string()).unwrap_or_default();
        *error_out = msg.into_raw();
    }
}

unsafe fn name_arg<'a>(name: *const c_char) -> Option<&'a str> {
    if name.is_null() {
        return None;
    }
    CStr::from_ptr(name).to_str().ok()
}

// ============================================================================
// Lifecycle
// ============================================================================

/// Create a simulator with the given operand width (1..=8).
/// Returns null on error, error message written to error_out if provided
#[no_mangle]
pub unsafe extern "C" fn addsub_sim_create(
    width: c_uint,
    error_out: *mut *mut c_char,
) -> *mut AddSubSimContext {
    match CoreSimulator::with_width(width) {
        Ok(core) => Box::into_raw(Box::new(AddSubSimContext { core })),
        Err(e) => {
            write_error(error_out, e);
            ptr::null_mut()
        }
    }
}

/// Create a simulator from a JSON config
#[no_mangle]
pub unsafe extern "C" fn addsub_sim_create_from_json(
    json: *const c_char,
    json_len: usize,
    error_out: *mut *mut c_char,
) -> *mut AddSubSimContext {
    if json.is_null() {
        return ptr::null_mut();
    }
    let json_slice = slice::from_raw_parts(json as *const u8, json_len);
    let json_str = match std::str::from_utf8(json_slice) {
        Ok(s) => s,
        Err(e) => {
            if !error_out.is_null() {
                let msg = CString::new(format!("Invalid UTF-8 in JSON: {}", e)).unwrap_or_default();
                *error_out = msg.into_raw();
            }
            return ptr::null_mut();
        }
    };

    match CoreSimulator::from_json(json_str) {
        Ok(core) => Box::into_raw(Box::new(AddSubSimContext { core })),
        Err(e) => {
            write_error(error_out, e);
            ptr::null_mut()
        }
    }
}

#[no_mangle]
pub unsafe extern "C" fn addsub_sim_destroy(ctx: *mut AddSubSimContext) {
    if !ctx.is_null() {
        drop(Box::from_raw(ctx));
    }
}

/// Free an error string returned by the create functions
#[no_mangle]
pub unsafe extern "C" fn addsub_sim_free_error(error: *mut c_char) {
    if !error.is_null() {
        drop(CString::from_raw(error));
    }
}

/// Free a string returned by addsub_sim functions
#[no_mangle]
pub unsafe extern "C" fn addsub_sim_free_string(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}

// ============================================================================
// Stepping
// ============================================================================

/// Apply one step and write the registered outputs.
/// Operands keep their low 8 bits, then the core masks them to its width.
/// Returns 0 on success, -1 on a null context
#[no_mangle]
pub unsafe extern "C" fn addsub_sim_step(
    ctx: *mut AddSubSimContext,
    a: c_uint,
    b: c_uint,
    op: c_int,
    select: c_int,
    clock_edge: c_int,
    reset: c_int,
    z_out: *mut c_uint,
    overflow_out: *mut c_int,
) -> c_int {
    if ctx.is_null() {
        return -1;
    }
    let inputs = Inputs {
        a: (a & 0xFF) as u8,
        b: (b & 0xFF) as u8,
        op: Op::from(op != 0),
        select: select != 0,
        clock_edge: clock_edge != 0,
        reset: reset != 0,
    };
    let out = (*ctx).core.step(inputs);
    if !z_out.is_null() {
        *z_out = out.z as c_uint;
    }
    if !overflow_out.is_null() {
        *overflow_out = out.overflow as c_int;
    }
    0
}

#[no_mangle]
pub unsafe extern "C" fn addsub_sim_reset(ctx: *mut AddSubSimContext) {
    if !ctx.is_null() {
        (*ctx).core.reset();
    }
}

// ============================================================================
// Pin-level access
// ============================================================================

/// Poke an input pin
/// Returns 0 on success, -1 on error (unknown or non-input signal)
#[no_mangle]
pub unsafe extern "C" fn addsub_sim_poke(
    ctx: *mut AddSubSimContext,
    name: *const c_char,
    value: c_ulong,
) -> c_int {
    if ctx.is_null() {
        return -1;
    }
    let Some(name) = name_arg(name) else {
        return -1;
    };
    match (*ctx).core.poke(name, value as u64) {
        Ok(()) => 0,
        Err(_) => -1,
    }
}

/// Peek a signal value
/// Returns the value, or 0 on error (check addsub_sim_has_signal)
#[no_mangle]
pub unsafe extern "C" fn addsub_sim_peek(
    ctx: *const AddSubSimContext,
    name: *const c_char,
) -> c_ulong {
    if ctx.is_null() {
        return 0;
    }
    let Some(name) = name_arg(name) else {
        return 0;
    };
    (*ctx).core.peek(name).unwrap_or(0) as c_ulong
}

#[no_mangle]
pub unsafe extern "C" fn addsub_sim_has_signal(name: *const c_char) -> c_int {
    match name_arg(name) {
        Some(name) if CoreSimulator::has_signal(name) => 1,
        _ => 0,
    }
}

/// Evaluate combinational wires
#[no_mangle]
pub unsafe extern "C" fn addsub_sim_evaluate(ctx: *mut AddSubSimContext) {
    if !ctx.is_null() {
        (*ctx).core.evaluate();
    }
}

/// Tick (reset check + clock edge detection + register update)
#[no_mangle]
pub unsafe extern "C" fn addsub_sim_tick(ctx: *mut AddSubSimContext) {
    if !ctx.is_null() {
        (*ctx).core.tick();
    }
}

/// Get register count
#[no_mangle]
pub unsafe extern "C" fn addsub_sim_reg_count(ctx: *const AddSubSimContext) -> c_uint {
    if ctx.is_null() {
        return 0;
    }
    (*ctx).core.reg_count() as c_uint
}

/// Get input pin names (comma-separated, caller must free)
#[no_mangle]
pub extern "C" fn addsub_sim_input_names() -> *mut c_char {
    CString::new(INPUT_NAMES.join(",")).unwrap_or_default().into_raw()
}

/// Get output names (comma-separated, caller must free)
#[no_mangle]
pub extern "C" fn addsub_sim_output_names() -> *mut c_char {
    CString::new(OUTPUT_NAMES.join(",")).unwrap_or_default().into_raw()
}

// ============================================================================
// Tracing
// ============================================================================

#[no_mangle]
pub unsafe extern "C" fn addsub_sim_trace_start(ctx: *mut AddSubSimContext) {
    if !ctx.is_null() {
        (*ctx).core.trace_start();
    }
}

/// Returns 0 on success, -1 if flushing the stream failed
#[no_mangle]
pub unsafe extern "C" fn addsub_sim_trace_stop(ctx: *mut AddSubSimContext) -> c_int {
    if ctx.is_null() {
        return -1;
    }
    match (*ctx).core.trace_stop() {
        Ok(()) => 0,
        Err(_) => -1,
    }
}

/// Drop buffered trace changes and rewind trace time
#[no_mangle]
pub unsafe extern "C" fn addsub_sim_trace_clear(ctx: *mut AddSubSimContext) {
    if !ctx.is_null() {
        (*ctx).core.trace_clear();
    }
}

/// Buffered trace as VCD text (caller must free with addsub_sim_free_string)
#[no_mangle]
pub unsafe extern "C" fn addsub_sim_trace_to_vcd(ctx: *const AddSubSimContext) -> *mut c_char {
    if ctx.is_null() {
        return ptr::null_mut();
    }
    CString::new((*ctx).core.trace_to_vcd()).unwrap_or_default().into_raw()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_step_destroy() {
        unsafe {
            let ctx = addsub_sim_create(8, ptr::null_mut());
            assert!(!ctx.is_null());

            let mut z: c_uint = 0;
            let mut v: c_int = 0;
            assert_eq!(addsub_sim_step(ctx, 120, 10, 0, 0, 1, 0, &mut z, &mut v), 0);
            assert_eq!((z, v), (130, 1));

            addsub_sim_reset(ctx);
            let name = CString::new("z").unwrap();
            assert_eq!(addsub_sim_peek(ctx, name.as_ptr()), 0);

            addsub_sim_destroy(ctx);
        }
    }

    #[test]
    fn test_create_rejects_width() {
        unsafe {
            let mut err: *mut c_char = ptr::null_mut();
            let ctx = addsub_sim_create(9, &mut err);
            assert!(ctx.is_null());
            assert!(!err.is_null());
            let msg = CStr::from_ptr(err).to_str().unwrap().to_string();
            assert!(msg.contains("out of range"));
            addsub_sim_free_error(err);
        }
    }

    #[test]
    fn test_poke_tick_peek() {
        unsafe {
            let ctx = addsub_sim_create(8, ptr::null_mut());
            let a = CString::new("a").unwrap();
            let b = CString::new("b").unwrap();
            let op = CString::new("op").unwrap();
            let clk = CString::new("clk").unwrap();
            let z = CString::new("z").unwrap();
            let bogus = CString::new("led").unwrap();

            assert_eq!(addsub_sim_poke(ctx, a.as_ptr(), 5), 0);
            assert_eq!(addsub_sim_poke(ctx, b.as_ptr(), 10), 0);
            assert_eq!(addsub_sim_poke(ctx, op.as_ptr(), 1), 0);
            assert_eq!(addsub_sim_poke(ctx, clk.as_ptr(), 1), 0);
            assert_eq!(addsub_sim_poke(ctx, bogus.as_ptr(), 1), -1);
            addsub_sim_tick(ctx);

            assert_eq!(addsub_sim_peek(ctx, z.as_ptr()), 251);
            assert_eq!(addsub_sim_has_signal(z.as_ptr()), 1);
            assert_eq!(addsub_sim_has_signal(bogus.as_ptr()), 0);
            addsub_sim_destroy(ctx);
        }
    }

    #[test]
    fn test_step_keeps_low_byte_of_operands() {
        unsafe {
            let ctx = addsub_sim_create(8, ptr::null_mut());
            let mut z: c_uint = 0;
            let mut v: c_int = 0;
            addsub_sim_step(ctx, 0x105, 0x203, 0, 0, 1, 0, &mut z, &mut v);
            assert_eq!((z, v), (8, 0));

            let a_reg = CString::new("a_reg").unwrap();
            assert_eq!(addsub_sim_peek(ctx, a_reg.as_ptr()), 5);
            addsub_sim_destroy(ctx);
        }
    }

    #[test]
    fn test_names_and_counts() {
        unsafe {
            let ctx = addsub_sim_create(8, ptr::null_mut());
            assert_eq!(addsub_sim_reg_count(ctx), 6);
            assert_eq!(addsub_sim_reg_count(ptr::null()), 0);

            let s = addsub_sim_input_names();
            assert_eq!(CStr::from_ptr(s).to_str().unwrap(), "a,b,op,sel,clk,rst");
            addsub_sim_free_string(s);

            let s = addsub_sim_output_names();
            assert_eq!(CStr::from_ptr(s).to_str().unwrap(), "z,overflow");
            addsub_sim_free_string(s);
            addsub_sim_destroy(ctx);
        }
    }

    #[test]
    fn test_null_context_is_tolerated() {
        unsafe {
            assert_eq!(addsub_sim_step(ptr::null_mut(), 0, 0, 0, 0, 1, 0, ptr::null_mut(), ptr::null_mut()), -1);
            assert_eq!(addsub_sim_peek(ptr::null(), ptr::null()), 0);
            assert!(addsub_sim_trace_to_vcd(ptr::null()).is_null());
            addsub_sim_reset(ptr::null_mut());
            addsub_sim_destroy(ptr::null_mut());
        }
    }

    #[test]
    fn test_trace_roundtrip_through_abi() {
        unsafe {
            let json = r#"{"width": 8}"#;
            let ctx = addsub_sim_create_from_json(json.as_ptr() as *const c_char, json.len(), ptr::null_mut());
            assert!(!ctx.is_null());
            addsub_sim_trace_start(ctx);
            addsub_sim_step(ctx, 5, 3, 0, 0, 1, 0, ptr::null_mut(), ptr::null_mut());
            assert_eq!(addsub_sim_trace_stop(ctx), 0);

            let s = addsub_sim_trace_to_vcd(ctx);
            let vcd = CStr::from_ptr(s).to_str().unwrap().to_string();
            assert!(vcd.contains("b00001000 #"));
            addsub_sim_free_string(s);

            addsub_sim_trace_clear(ctx);
            let s = addsub_sim_trace_to_vcd(ctx);
            let vcd = CStr::from_ptr(s).to_str().unwrap().to_string();
            assert!(!vcd.contains("#1"));
            addsub_sim_free_string(s);
            addsub_sim_destroy(ctx);
        }
    }
}
