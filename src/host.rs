//! Host-side calls: time, numeric formatting and the periodic timer.
//!
//! These are the calls a device would provide from its own platform layer.
//! Sensor and CoAP calls stay unbound, so programs using them fail preflight.

use std::sync::OnceLock;
use std::thread;
use std::time::{Duration, Instant};

use rbpf::Runtime;
use rbpf::call::{CALL_FAILED, CallContext};
use rbpf_abi::CallId;

/// Largest fixed-point exponent `fmt_s16_dfp` accepts in either direction.
const MAX_FP_DIGITS: i32 = 9;

fn epoch() -> Instant {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    *EPOCH.get_or_init(Instant::now)
}

fn now_usec() -> u64 {
    epoch().elapsed().as_micros() as u64
}

/// A runtime with every host-side call bound.
pub fn runtime(store_capacity: Option<usize>) -> Runtime {
    let runtime = match store_capacity {
        Some(capacity) => Runtime::with_capacity(capacity),
        None => Runtime::new(),
    };
    runtime
        .with_call(CallId::NowMs, now_ms)
        .with_call(CallId::FmtS16Dfp, fmt_s16_dfp)
        .with_call(CallId::FmtU32Dec, fmt_u32_dec)
        .with_call(CallId::ZtimerNow, ztimer_now)
        .with_call(CallId::ZtimerPeriodicWakeup, ztimer_periodic_wakeup)
}

/// `now_ms()`: milliseconds since the host started.
fn now_ms(_: &mut CallContext<'_, '_>, _: [u64; 5]) -> u64 {
    now_usec() / 1000
}

/// `ztimer_now()`: microseconds since the host started, wrapping at 32 bits.
fn ztimer_now(_: &mut CallContext<'_, '_>, _: [u64; 5]) -> u64 {
    u64::from(now_usec() as u32)
}

/// `ztimer_periodic_wakeup(last_ptr, period)`
///
/// Sleeps until `*last_ptr + period` microseconds and stores that time back.
/// If the deadline has passed, returns immediately and stores now.
fn ztimer_periodic_wakeup(ctx: &mut CallContext<'_, '_>, args: [u64; 5]) -> u64 {
    let [last_ptr, period, ..] = args;
    let Ok(bytes) = ctx.memory().read_bytes(last_ptr, 4) else {
        return CALL_FAILED;
    };
    if ctx.check_writable(last_ptr, 4).is_err() {
        return CALL_FAILED;
    }
    let last = u32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);

    let now = now_usec() as u32;
    let deadline = last.wrapping_add(period as u32);
    let remaining = deadline.wrapping_sub(now) as i32;
    let next = if remaining > 0 {
        thread::sleep(Duration::from_micros(remaining as u64));
        deadline
    } else {
        now
    };

    match ctx.write_u32(last_ptr, next) {
        Ok(()) => 0,
        Err(_) => CALL_FAILED,
    }
}

/// Write formatted output, or just measure it when `out` is 0.
fn emit(ctx: &mut CallContext<'_, '_>, out: u64, text: &str) -> u64 {
    if out == 0 {
        return text.len() as u64;
    }
    match ctx.memory_mut().write_bytes(out, text.as_bytes()) {
        Ok(()) => text.len() as u64,
        Err(_) => CALL_FAILED,
    }
}

/// `fmt_u32_dec(out, value)`: decimal digits, no terminator.
fn fmt_u32_dec(ctx: &mut CallContext<'_, '_>, args: [u64; 5]) -> u64 {
    let [out, value, ..] = args;
    emit(ctx, out, &(value as u32).to_string())
}

/// `fmt_s16_dfp(out, value, fp_digits)`: a signed 16-bit fixed-point value.
fn fmt_s16_dfp(ctx: &mut CallContext<'_, '_>, args: [u64; 5]) -> u64 {
    let [out, value, fp_digits, ..] = args;
    let fp_digits = (fp_digits as u32 as i32).clamp(-MAX_FP_DIGITS, MAX_FP_DIGITS);
    emit(ctx, out, &format_fixed_point(value as u16 as i16, fp_digits))
}

/// `value * 10^fp_digits` as a decimal string.
fn format_fixed_point(value: i16, fp_digits: i32) -> String {
    if fp_digits >= 0 {
        return format!("{}{}", value, "0".repeat(fp_digits as usize));
    }
    let digits = fp_digits.unsigned_abs() as usize;
    let scale = 10u32.pow(digits as u32);
    let magnitude = u32::from(value.unsigned_abs());
    let sign = if value < 0 { "-" } else { "" };
    format!(
        "{}{}.{:0width$}",
        sign,
        magnitude / scale,
        magnitude % scale,
        width = digits
    )
}
