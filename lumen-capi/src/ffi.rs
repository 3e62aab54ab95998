//! Pointer-level call bodies
//!
//! Each `lumen_*` export forwards to the function of the same name here,
//! passing the process runtime. Keeping the bodies generic over the platform
//! lets them run against fakes.
//!
//! # Safety
//!
//! Every function here trusts the C caller's pointers: a non-null buffer
//! pointer must be valid for its length, and out-pointers must be valid for
//! one write. Null out-pointers are rejected, never written.

use embedded_hal::digital::PinState;
use lumen_core::{Error, Handle, Platform, TransferResult};
use lumen_hal::{LockAction, Mode, PinFunction, PinMode};

use crate::runtime::Runtime;
use crate::status::{self, Status};

/// View a caller buffer
///
/// Null is accepted only for an empty buffer.
unsafe fn input<'a>(ptr: *const u8, len: usize) -> Result<&'a [u8], Error> {
    if ptr.is_null() {
        return if len == 0 {
            Ok(&[])
        } else {
            Err(Error::InvalidArgument("null buffer"))
        };
    }
    // SAFETY: the caller guarantees `ptr` is valid for `len` bytes
    Ok(unsafe { core::slice::from_raw_parts(ptr, len) })
}

/// View a caller buffer for writing
unsafe fn output<'a>(ptr: *mut u8, len: usize) -> Result<&'a mut [u8], Error> {
    if ptr.is_null() {
        return if len == 0 {
            Ok(Default::default())
        } else {
            Err(Error::InvalidArgument("null buffer"))
        };
    }
    // SAFETY: the caller guarantees `ptr` is valid and unaliased for `len` bytes
    Ok(unsafe { core::slice::from_raw_parts_mut(ptr, len) })
}

/// Store `value` through a required out-pointer
unsafe fn store<T>(out: *mut T, value: T) {
    if !out.is_null() {
        // SAFETY: non-null out-pointers are valid for one write
        unsafe { out.write(value) };
    }
}

fn narrow(value: u32, what: &'static str) -> Result<u8, Error> {
    u8::try_from(value).map_err(|_| Error::InvalidArgument(what))
}

pub unsafe fn get_board_type<P: Platform>(runtime: &Runtime<P>, board: *mut u32) -> Status {
    if board.is_null() {
        return status::INVALID_ARGUMENT;
    }
    runtime.call(|hw| {
        let value = hw.board_type()?;
        unsafe { store(board, value as u32) };
        Ok(())
    })
}

pub fn verify_pin_function<P: Platform>(
    runtime: &Runtime<P>,
    pin: u32,
    function: u32,
    lock: u32,
) -> Status {
    runtime.call(|hw| {
        let pin = narrow(pin, "pin number out of range")?;
        let function = PinFunction::from_raw(function)
            .ok_or(Error::InvalidArgument("unknown pin function"))?;
        let lock =
            LockAction::from_raw(lock).ok_or(Error::InvalidArgument("unknown lock action"))?;
        hw.verify_pin_function(pin, function, lock)
    })
}

pub fn set_pin_mode<P: Platform>(
    runtime: &Runtime<P>,
    pin: u32,
    mode: u32,
    pull_up: bool,
) -> Status {
    runtime.call(|hw| {
        let pin = narrow(pin, "pin number out of range")?;
        let mode = PinMode::from_raw(mode).ok_or(Error::InvalidArgument("unknown pin mode"))?;
        hw.set_pin_mode(pin, mode, pull_up)
    })
}

pub fn set_pin_state<P: Platform>(runtime: &Runtime<P>, pin: u32, state: u32) -> Status {
    runtime.call(|hw| {
        let pin = narrow(pin, "pin number out of range")?;
        let state = match state {
            0 => PinState::Low,
            1 => PinState::High,
            _ => return Err(Error::InvalidArgument("unknown pin state")),
        };
        hw.set_pin_state(pin, state)
    })
}

pub unsafe fn get_pin_state<P: Platform>(
    runtime: &Runtime<P>,
    pin: u32,
    state: *mut u32,
) -> Status {
    if state.is_null() {
        return status::INVALID_ARGUMENT;
    }
    runtime.call(|hw| {
        let pin = narrow(pin, "pin number out of range")?;
        let value = match hw.get_pin_state(pin)? {
            PinState::Low => 0,
            PinState::High => 1,
        };
        unsafe { store(state, value) };
        Ok(())
    })
}

pub unsafe fn i2c_init<P: Platform>(
    runtime: &Runtime<P>,
    bus: u32,
    address: u32,
    fast_mode: bool,
    handle: *mut i32,
) -> Status {
    if handle.is_null() {
        return status::INVALID_ARGUMENT;
    }
    unsafe { store(handle, Handle::INVALID.raw()) };

    runtime.call(|hw| {
        let bus = narrow(bus, "I2C bus out of range")?;
        let address = narrow(address, "I2C address is not 7-bit")?;
        let opened = hw.i2c_init(bus, address, fast_mode)?;
        unsafe { store(handle, opened.raw()) };
        Ok(())
    })
}

pub unsafe fn i2c_write<P: Platform>(
    runtime: &Runtime<P>,
    handle: i32,
    data: *const u8,
    len: usize,
) -> Status {
    runtime.call(|hw| {
        let data = unsafe { input(data, len) }?;
        hw.i2c_write(Handle::from_raw(handle), data)
    })
}

pub unsafe fn i2c_read<P: Platform>(
    runtime: &Runtime<P>,
    handle: i32,
    buf: *mut u8,
    len: usize,
) -> Status {
    runtime.call(|hw| {
        let buf = unsafe { output(buf, len) }?;
        hw.i2c_read(Handle::from_raw(handle), buf)
    })
}

pub unsafe fn i2c_write_read<P: Platform>(
    runtime: &Runtime<P>,
    handle: i32,
    data: *const u8,
    data_len: usize,
    buf: *mut u8,
    buf_len: usize,
) -> Status {
    runtime.call(|hw| {
        let data = unsafe { input(data, data_len) }?;
        let buf = unsafe { output(buf, buf_len) }?;
        hw.i2c_write_read(Handle::from_raw(handle), data, buf)
    })
}

/// Shared tail of the partial variants
///
/// The out-parameters are written only when the handle was valid.
unsafe fn partial<P: Platform>(
    runtime: &Runtime<P>,
    bytes: *mut usize,
    transfer_status: *mut u32,
    f: impl FnOnce(&lumen_core::Hardware<P>) -> lumen_core::Result<TransferResult>,
) -> Status {
    if bytes.is_null() || transfer_status.is_null() {
        return status::INVALID_ARGUMENT;
    }
    runtime.call(|hw| {
        let result = f(hw)?;
        unsafe {
            store(bytes, result.bytes_transferred);
            store(transfer_status, result.status as u32);
        }
        Ok(())
    })
}

pub unsafe fn i2c_write_partial<P: Platform>(
    runtime: &Runtime<P>,
    handle: i32,
    data: *const u8,
    len: usize,
    bytes: *mut usize,
    transfer_status: *mut u32,
) -> Status {
    unsafe {
        partial(runtime, bytes, transfer_status, |hw| {
            let data = input(data, len)?;
            hw.i2c_write_partial(Handle::from_raw(handle), data)
        })
    }
}

pub unsafe fn i2c_read_partial<P: Platform>(
    runtime: &Runtime<P>,
    handle: i32,
    buf: *mut u8,
    len: usize,
    bytes: *mut usize,
    transfer_status: *mut u32,
) -> Status {
    unsafe {
        partial(runtime, bytes, transfer_status, |hw| {
            let buf = output(buf, len)?;
            hw.i2c_read_partial(Handle::from_raw(handle), buf)
        })
    }
}

#[allow(clippy::too_many_arguments)]
pub unsafe fn i2c_write_read_partial<P: Platform>(
    runtime: &Runtime<P>,
    handle: i32,
    data: *const u8,
    data_len: usize,
    buf: *mut u8,
    buf_len: usize,
    bytes: *mut usize,
    transfer_status: *mut u32,
) -> Status {
    unsafe {
        partial(runtime, bytes, transfer_status, |hw| {
            let data = input(data, data_len)?;
            let buf = output(buf, buf_len)?;
            hw.i2c_write_read_partial(Handle::from_raw(handle), data, buf)
        })
    }
}

/// Always succeeds, even before initialization
pub fn i2c_close<P: Platform>(runtime: &Runtime<P>, handle: i32) -> Status {
    if let Some(hw) = runtime.hardware() {
        hw.i2c_close(Handle::from_raw(handle));
    }
    status::OK
}

pub unsafe fn spi_init<P: Platform>(
    runtime: &Runtime<P>,
    mode: u32,
    clock_hz: u32,
    data_bits: u32,
    handle: *mut i32,
) -> Status {
    if handle.is_null() {
        return status::INVALID_ARGUMENT;
    }
    unsafe { store(handle, Handle::INVALID.raw()) };

    runtime.call(|hw| {
        let mode = Mode::from_raw(mode).ok_or(Error::InvalidArgument("unknown SPI mode"))?;
        let data_bits = narrow(data_bits, "SPI data bit length out of range")?;
        let opened = hw.spi_init(mode, clock_hz, data_bits)?;
        unsafe { store(handle, opened.raw()) };
        Ok(())
    })
}

/// Both buffers, when present, are `len` bytes long
pub unsafe fn spi_transfer_full_duplex<P: Platform>(
    runtime: &Runtime<P>,
    handle: i32,
    write: *const u8,
    read: *mut u8,
    len: usize,
) -> Status {
    runtime.call(|hw| {
        let write = (!write.is_null()).then(|| unsafe { core::slice::from_raw_parts(write, len) });
        let read = (!read.is_null()).then(|| unsafe { core::slice::from_raw_parts_mut(read, len) });
        if write.is_none() && read.is_none() {
            return Err(Error::InvalidArgument("no SPI buffer"));
        }
        hw.spi_transfer_full_duplex(Handle::from_raw(handle), write, read)
    })
}

/// Always succeeds, even before initialization
pub fn spi_close<P: Platform>(runtime: &Runtime<P>, handle: i32) -> Status {
    if let Some(hw) = runtime.hardware() {
        hw.spi_close(Handle::from_raw(handle));
    }
    status::OK
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::ptr;
    use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};
    use lumen_core::fakes::{FakePlatform, I2cBehavior, Probe};
    use lumen_core::TransferStatus;
    use lumen_hal::BoardType;

    fn runtime(board: BoardType) -> (Runtime<FakePlatform>, Probe) {
        let platform = FakePlatform::new(board);
        let probe = platform.probe();
        let runtime = Runtime::new();
        assert_eq!(runtime.initialize(move || Ok(platform)), status::OK);
        (runtime, probe)
    }

    fn open_i2c(runtime: &Runtime<FakePlatform>) -> i32 {
        let mut handle = 99;
        assert_eq!(
            unsafe { i2c_init(runtime, 1, 0x50, false, &mut handle) },
            status::OK
        );
        handle
    }

    #[test]
    fn test_address_nack_scenario() {
        let (rt, probe) = runtime(BoardType::Pi2Bare);
        probe.set_i2c_behavior(I2cBehavior::Fail(ErrorKind::NoAcknowledge(
            NoAcknowledgeSource::Address,
        )));

        let handle = open_i2c(&rt);
        assert_eq!(handle, 0);

        let data = [0xAAu8];
        let mut bytes = 7usize;
        let mut transfer_status = 7u32;
        let code = unsafe {
            i2c_write_partial(
                &rt,
                handle,
                data.as_ptr(),
                data.len(),
                &mut bytes,
                &mut transfer_status,
            )
        };
        assert_eq!(code, status::OK);
        assert_eq!(bytes, 0);
        assert_eq!(transfer_status, 2);

        assert_eq!(i2c_close(&rt, handle), status::OK);
        assert_eq!(i2c_close(&rt, handle), status::OK);
    }

    #[test]
    fn test_strict_codes() {
        let (rt, probe) = runtime(BoardType::Pi2Bare);
        let handle = open_i2c(&rt);
        let data = [1u8, 2, 3];
        let write = |rt: &Runtime<FakePlatform>| unsafe {
            i2c_write(rt, handle, data.as_ptr(), data.len())
        };

        assert_eq!(write(&rt), status::OK);

        probe.set_i2c_behavior(I2cBehavior::Short(2));
        assert_eq!(write(&rt), status::INCOMPLETE_TRANSFER);

        probe.set_i2c_behavior(I2cBehavior::Fail(ErrorKind::NoAcknowledge(
            NoAcknowledgeSource::Address,
        )));
        assert_eq!(write(&rt), status::ADDRESS_NACK);

        probe.set_i2c_behavior(I2cBehavior::Fail(ErrorKind::NoAcknowledge(
            NoAcknowledgeSource::Data,
        )));
        assert_eq!(write(&rt), status::DATA_NACK);

        probe.set_i2c_behavior(I2cBehavior::Fail(ErrorKind::Bus));
        assert_eq!(write(&rt), status::BUS_ERROR);
    }

    #[test]
    fn test_write_read_partial_sums_lengths() {
        let (rt, probe) = runtime(BoardType::MbmBare);
        probe.set_i2c_response(&[0x11, 0x22, 0x33]);
        let handle = open_i2c(&rt);

        let data = [0x00u8, 0x10];
        let mut buf = [0u8; 3];
        let mut bytes = 0usize;
        let mut transfer_status = 9u32;
        let code = unsafe {
            i2c_write_read_partial(
                &rt,
                handle,
                data.as_ptr(),
                data.len(),
                buf.as_mut_ptr(),
                buf.len(),
                &mut bytes,
                &mut transfer_status,
            )
        };
        assert_eq!(code, status::OK);
        assert_eq!(bytes, 5);
        assert_eq!(transfer_status, TransferStatus::FullTransfer as u32);
        assert_eq!(buf, [0x11, 0x22, 0x33]);

        let mut buf = [0u8; 2];
        let code = unsafe {
            i2c_write_read(&rt, handle, data.as_ptr(), 1, buf.as_mut_ptr(), buf.len())
        };
        assert_eq!(code, status::OK);
        assert_eq!(buf, [0x11, 0x22]);
    }

    #[test]
    fn test_invalid_handle_leaves_outputs() {
        let (rt, _probe) = runtime(BoardType::Pi2Bare);
        let mut buf = [0u8; 2];
        let mut bytes = 7usize;
        let mut transfer_status = 7u32;

        let code = unsafe {
            i2c_read_partial(
                &rt,
                4,
                buf.as_mut_ptr(),
                buf.len(),
                &mut bytes,
                &mut transfer_status,
            )
        };
        assert_eq!(code, status::INVALID_HANDLE);
        assert_eq!((bytes, transfer_status), (7, 7));

        let code = unsafe { i2c_read(&rt, -1, buf.as_mut_ptr(), buf.len()) };
        assert_eq!(code, status::INVALID_HANDLE);
    }

    #[test]
    fn test_null_pointers() {
        let (rt, _probe) = runtime(BoardType::Pi2Bare);
        let handle = open_i2c(&rt);

        assert_eq!(
            unsafe { i2c_write(&rt, handle, ptr::null(), 4) },
            status::INVALID_ARGUMENT
        );
        // An empty write is a plain address probe
        assert_eq!(unsafe { i2c_write(&rt, handle, ptr::null(), 0) }, status::OK);

        let mut bytes = 0usize;
        assert_eq!(
            unsafe { i2c_write_partial(&rt, handle, ptr::null(), 0, &mut bytes, ptr::null_mut()) },
            status::INVALID_ARGUMENT
        );
        assert_eq!(
            unsafe { i2c_init(&rt, 1, 0x50, false, ptr::null_mut()) },
            status::INVALID_ARGUMENT
        );
        assert_eq!(
            unsafe { spi_transfer_full_duplex(&rt, 0, ptr::null(), ptr::null_mut(), 4) },
            status::INVALID_ARGUMENT
        );
    }

    #[test]
    fn test_failed_init_reports_invalid_handle() {
        let (rt, _probe) = runtime(BoardType::GalileoGen2);
        let mut handle = 5;

        assert_eq!(
            unsafe { i2c_init(&rt, 1, 0x50, false, &mut handle) },
            status::UNSUPPORTED_BOARD
        );
        assert_eq!(handle, -1);

        handle = 5;
        assert_eq!(
            unsafe { spi_init(&rt, 0, 1_000_000, 8, &mut handle) },
            status::UNSUPPORTED_BOARD
        );
        assert_eq!(handle, -1);
    }

    #[test]
    fn test_argument_ranges() {
        let (rt, _probe) = runtime(BoardType::Pi2Bare);
        let mut handle = 0;

        assert_eq!(
            unsafe { i2c_init(&rt, 1, 0x1_0050, false, &mut handle) },
            status::INVALID_ARGUMENT
        );
        assert_eq!(
            unsafe { i2c_init(&rt, 1, 0x80, false, &mut handle) },
            status::INVALID_ARGUMENT
        );
        assert_eq!(
            unsafe { spi_init(&rt, 4, 1_000_000, 8, &mut handle) },
            status::INVALID_ARGUMENT
        );
        assert_eq!(handle, -1);
    }

    #[test]
    fn test_spi_loopback() {
        let (rt, probe) = runtime(BoardType::MbmBare);
        let mut handle = -5;
        assert_eq!(
            unsafe { spi_init(&rt, 0, 1_000_000, 8, &mut handle) },
            status::OK
        );
        assert_eq!(handle, 0);

        let write = [0x01u8, 0x02];
        let mut read = [0u8; 2];
        let code = unsafe {
            spi_transfer_full_duplex(&rt, handle, write.as_ptr(), read.as_mut_ptr(), 2)
        };
        assert_eq!(code, status::OK);
        assert_eq!(read, [0x01, 0x02]);

        let code = unsafe {
            spi_transfer_full_duplex(&rt, handle, write.as_ptr(), ptr::null_mut(), 2)
        };
        assert_eq!(code, status::OK);

        assert_eq!(spi_close(&rt, handle), status::OK);
        assert_eq!(spi_close(&rt, handle), status::OK);
        assert_eq!(probe.spi_ends(), 1);
        assert_eq!(
            unsafe { spi_transfer_full_duplex(&rt, handle, write.as_ptr(), ptr::null_mut(), 2) },
            status::INVALID_HANDLE
        );
    }

    #[test]
    fn test_pin_calls() {
        let (rt, _probe) = runtime(BoardType::Pi2Bare);

        let mut board = 0u32;
        assert_eq!(unsafe { get_board_type(&rt, &mut board) }, status::OK);
        assert_eq!(board, 6);

        assert_eq!(set_pin_mode(&rt, 4, 1, false), status::OK);
        assert_eq!(set_pin_state(&rt, 4, 1), status::OK);
        let mut state = 0u32;
        assert_eq!(unsafe { get_pin_state(&rt, 4, &mut state) }, status::OK);
        assert_eq!(state, 1);

        assert_eq!(verify_pin_function(&rt, 2, 0x08, 1), status::OK);
        assert_eq!(verify_pin_function(&rt, 2, 0x01, 0), status::PIN_LOCKED);
        assert_eq!(set_pin_mode(&rt, 2, 1, false), status::PIN_LOCKED);
        assert_eq!(set_pin_state(&rt, 2, 1), status::PIN_LOCKED);
        assert_eq!(verify_pin_function(&rt, 2, 0x03, 0), status::INVALID_ARGUMENT);
        assert_eq!(verify_pin_function(&rt, 2, 0x08, 3), status::INVALID_ARGUMENT);
        assert_eq!(set_pin_mode(&rt, 4, 2, false), status::INVALID_ARGUMENT);
        assert_eq!(set_pin_state(&rt, 400, 0), status::INVALID_ARGUMENT);
    }

    #[test]
    fn test_not_initialized() {
        let rt: Runtime<FakePlatform> = Runtime::new();
        let mut handle = 3;

        assert_eq!(
            unsafe { i2c_init(&rt, 1, 0x50, false, &mut handle) },
            status::NOT_INITIALIZED
        );
        assert_eq!(handle, -1);
        assert_eq!(
            unsafe { i2c_write(&rt, 0, ptr::null(), 0) },
            status::NOT_INITIALIZED
        );
        assert_eq!(i2c_close(&rt, 0), status::OK);
        assert_eq!(spi_close(&rt, 0), status::OK);
    }
}
