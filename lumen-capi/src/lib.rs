//! C-callable surface for Lumen
//!
//! Every export returns an `int32_t` status (see [`status`]) and reports
//! results through out-parameters. The declarations live in
//! `include/lumen.h`.
//!
//! Call `lumen_initialize` (or `lumen_initialize_with_config`) once before
//! anything else; bus and pin calls made earlier report
//! `LUMEN_E_NOT_INITIALIZED`. The close calls always succeed.

pub mod ffi;
pub mod runtime;
pub mod status;

use core::ffi::{c_char, CStr};
use std::path::Path;

use log::error;
use lumen_hal_linux::LinuxPlatform;

use crate::runtime::Runtime;
use crate::status::Status;

static RUNTIME: Runtime<LinuxPlatform> = Runtime::new();

fn initialize(path: Option<&Path>) -> Status {
    // A host application may already have installed its own logger
    let _ = env_logger::try_init();

    RUNTIME.initialize(|| {
        LinuxPlatform::load(path).map_err(|e| {
            error!("{}", e);
            status::CONFIG_ERROR
        })
    })
}

/// Load the board description from `$LUMEN_CONFIG` or the default location
#[no_mangle]
pub extern "C" fn lumen_initialize() -> Status {
    initialize(None)
}

/// Load the board description from `path`
///
/// # Safety
///
/// `path` must be null or a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn lumen_initialize_with_config(path: *const c_char) -> Status {
    if path.is_null() {
        return status::INVALID_ARGUMENT;
    }
    // SAFETY: non-null and NUL-terminated per the contract above
    let path = unsafe { CStr::from_ptr(path) };
    match path.to_str() {
        Ok(path) => initialize(Some(Path::new(path))),
        Err(_) => status::INVALID_ARGUMENT,
    }
}

/// Close every open session and release the board
#[no_mangle]
pub extern "C" fn lumen_shutdown() -> Status {
    RUNTIME.shutdown();
    status::OK
}

/// # Safety
///
/// `board_type` must be valid for one write.
#[no_mangle]
pub unsafe extern "C" fn lumen_get_board_type(board_type: *mut u32) -> Status {
    unsafe { ffi::get_board_type(&RUNTIME, board_type) }
}

#[no_mangle]
pub extern "C" fn lumen_verify_pin_function(pin: u32, function: u32, lock_action: u32) -> Status {
    ffi::verify_pin_function(&RUNTIME, pin, function, lock_action)
}

#[no_mangle]
pub extern "C" fn lumen_set_pin_mode(pin: u32, mode: u32, pull_up: bool) -> Status {
    ffi::set_pin_mode(&RUNTIME, pin, mode, pull_up)
}

#[no_mangle]
pub extern "C" fn lumen_set_pin_state(pin: u32, state: u32) -> Status {
    ffi::set_pin_state(&RUNTIME, pin, state)
}

/// # Safety
///
/// `state` must be valid for one write.
#[no_mangle]
pub unsafe extern "C" fn lumen_get_pin_state(pin: u32, state: *mut u32) -> Status {
    unsafe { ffi::get_pin_state(&RUNTIME, pin, state) }
}

/// Open an I2C session; `*handle` is -1 on failure
///
/// # Safety
///
/// `handle` must be valid for one write.
#[no_mangle]
pub unsafe extern "C" fn lumen_i2c_init(
    bus: u32,
    slave_address: u32,
    fast_mode: bool,
    handle: *mut i32,
) -> Status {
    unsafe { ffi::i2c_init(&RUNTIME, bus, slave_address, fast_mode, handle) }
}

/// # Safety
///
/// `buffer` must be valid for `length` bytes.
#[no_mangle]
pub unsafe extern "C" fn lumen_i2c_write(handle: i32, buffer: *const u8, length: usize) -> Status {
    unsafe { ffi::i2c_write(&RUNTIME, handle, buffer, length) }
}

/// # Safety
///
/// `buffer` must be valid for `length` bytes.
#[no_mangle]
pub unsafe extern "C" fn lumen_i2c_read(handle: i32, buffer: *mut u8, length: usize) -> Status {
    unsafe { ffi::i2c_read(&RUNTIME, handle, buffer, length) }
}

/// # Safety
///
/// Each buffer must be valid for its length.
#[no_mangle]
pub unsafe extern "C" fn lumen_i2c_write_read(
    handle: i32,
    write_buffer: *const u8,
    write_length: usize,
    read_buffer: *mut u8,
    read_length: usize,
) -> Status {
    unsafe {
        ffi::i2c_write_read(
            &RUNTIME,
            handle,
            write_buffer,
            write_length,
            read_buffer,
            read_length,
        )
    }
}

/// # Safety
///
/// `buffer` must be valid for `length` bytes, the out-pointers for one
/// write each.
#[no_mangle]
pub unsafe extern "C" fn lumen_i2c_write_partial(
    handle: i32,
    buffer: *const u8,
    length: usize,
    bytes_transferred: *mut usize,
    transfer_status: *mut u32,
) -> Status {
    unsafe {
        ffi::i2c_write_partial(
            &RUNTIME,
            handle,
            buffer,
            length,
            bytes_transferred,
            transfer_status,
        )
    }
}

/// # Safety
///
/// `buffer` must be valid for `length` bytes, the out-pointers for one
/// write each.
#[no_mangle]
pub unsafe extern "C" fn lumen_i2c_read_partial(
    handle: i32,
    buffer: *mut u8,
    length: usize,
    bytes_transferred: *mut usize,
    transfer_status: *mut u32,
) -> Status {
    unsafe {
        ffi::i2c_read_partial(
            &RUNTIME,
            handle,
            buffer,
            length,
            bytes_transferred,
            transfer_status,
        )
    }
}

/// # Safety
///
/// Each buffer must be valid for its length, the out-pointers for one
/// write each.
#[no_mangle]
pub unsafe extern "C" fn lumen_i2c_write_read_partial(
    handle: i32,
    write_buffer: *const u8,
    write_length: usize,
    read_buffer: *mut u8,
    read_length: usize,
    bytes_transferred: *mut usize,
    transfer_status: *mut u32,
) -> Status {
    unsafe {
        ffi::i2c_write_read_partial(
            &RUNTIME,
            handle,
            write_buffer,
            write_length,
            read_buffer,
            read_length,
            bytes_transferred,
            transfer_status,
        )
    }
}

#[no_mangle]
pub extern "C" fn lumen_i2c_close(handle: i32) -> Status {
    ffi::i2c_close(&RUNTIME, handle)
}

/// Open an SPI session; `*handle` is -1 on failure
///
/// # Safety
///
/// `handle` must be valid for one write.
#[no_mangle]
pub unsafe extern "C" fn lumen_spi_init(
    mode: u32,
    clock_frequency_hz: u32,
    data_bit_length: u32,
    handle: *mut i32,
) -> Status {
    unsafe { ffi::spi_init(&RUNTIME, mode, clock_frequency_hz, data_bit_length, handle) }
}

/// Chip-select framed full-duplex transfer of `length` bytes
///
/// Either buffer may be null, but not both.
///
/// # Safety
///
/// Each non-null buffer must be valid for `length` bytes.
#[no_mangle]
pub unsafe extern "C" fn lumen_spi_transfer_full_duplex(
    handle: i32,
    write_buffer: *const u8,
    read_buffer: *mut u8,
    length: usize,
) -> Status {
    unsafe { ffi::spi_transfer_full_duplex(&RUNTIME, handle, write_buffer, read_buffer, length) }
}

#[no_mangle]
pub extern "C" fn lumen_spi_close(handle: i32) -> Status {
    ffi::spi_close(&RUNTIME, handle)
}
