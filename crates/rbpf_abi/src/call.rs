//! Host call ID namespace.
//!
//! Call IDs are grouped into functional blocks by their high nibble:
//!
//! | Range       | Block          |
//! |-------------|----------------|
//! | 0x01 - 0x02 | stdlib         |
//! | 0x10 - 0x13 | key/value store|
//! | 0x20        | time           |
//! | 0x30 - 0x32 | sensor registry|
//! | 0x40 - 0x43 | CoAP           |
//! | 0x50 - 0x51 | formatting     |
//! | 0x60 - 0x61 | periodic timer |

use core::fmt;

/// Functional block a call belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallBlock {
    Stdlib,
    Store,
    Time,
    Sensor,
    Coap,
    Format,
    Timer,
}

impl fmt::Display for CallBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Stdlib => "stdlib",
            Self::Store => "kv-store",
            Self::Time => "time",
            Self::Sensor => "sensor",
            Self::Coap => "coap",
            Self::Format => "format",
            Self::Timer => "timer",
        };
        f.write_str(s)
    }
}

/// Every call ID known to the ABI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum CallId {
    Printf = 0x01,
    Memcpy = 0x02,

    StoreLocal = 0x10,
    StoreGlobal = 0x11,
    FetchLocal = 0x12,
    FetchGlobal = 0x13,

    NowMs = 0x20,

    SaulRegFindNth = 0x30,
    SaulRegFindType = 0x31,
    SaulRegRead = 0x32,

    GcoapRespInit = 0x40,
    CoapOptFinish = 0x41,
    CoapAddFormat = 0x42,
    CoapGetPdu = 0x43,

    FmtS16Dfp = 0x50,
    FmtU32Dec = 0x51,

    ZtimerNow = 0x60,
    ZtimerPeriodicWakeup = 0x61,
}

impl CallId {
    /// All call IDs, in ascending numeric order.
    pub const ALL: [CallId; 18] = [
        Self::Printf,
        Self::Memcpy,
        Self::StoreLocal,
        Self::StoreGlobal,
        Self::FetchLocal,
        Self::FetchGlobal,
        Self::NowMs,
        Self::SaulRegFindNth,
        Self::SaulRegFindType,
        Self::SaulRegRead,
        Self::GcoapRespInit,
        Self::CoapOptFinish,
        Self::CoapAddFormat,
        Self::CoapGetPdu,
        Self::FmtS16Dfp,
        Self::FmtU32Dec,
        Self::ZtimerNow,
        Self::ZtimerPeriodicWakeup,
    ];

    /// Number of call IDs.
    pub const COUNT: usize = Self::ALL.len();

    /// Look up a call ID from the immediate of a call instruction.
    pub const fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0x01 => Some(Self::Printf),
            0x02 => Some(Self::Memcpy),
            0x10 => Some(Self::StoreLocal),
            0x11 => Some(Self::StoreGlobal),
            0x12 => Some(Self::FetchLocal),
            0x13 => Some(Self::FetchGlobal),
            0x20 => Some(Self::NowMs),
            0x30 => Some(Self::SaulRegFindNth),
            0x31 => Some(Self::SaulRegFindType),
            0x32 => Some(Self::SaulRegRead),
            0x40 => Some(Self::GcoapRespInit),
            0x41 => Some(Self::CoapOptFinish),
            0x42 => Some(Self::CoapAddFormat),
            0x43 => Some(Self::CoapGetPdu),
            0x50 => Some(Self::FmtS16Dfp),
            0x51 => Some(Self::FmtU32Dec),
            0x60 => Some(Self::ZtimerNow),
            0x61 => Some(Self::ZtimerPeriodicWakeup),
            _ => None,
        }
    }

    #[inline]
    pub const fn as_raw(self) -> u32 {
        self as u32
    }

    /// Dense index of this ID, suitable for table lookup.
    pub const fn index(self) -> usize {
        match self {
            Self::Printf => 0,
            Self::Memcpy => 1,
            Self::StoreLocal => 2,
            Self::StoreGlobal => 3,
            Self::FetchLocal => 4,
            Self::FetchGlobal => 5,
            Self::NowMs => 6,
            Self::SaulRegFindNth => 7,
            Self::SaulRegFindType => 8,
            Self::SaulRegRead => 9,
            Self::GcoapRespInit => 10,
            Self::CoapOptFinish => 11,
            Self::CoapAddFormat => 12,
            Self::CoapGetPdu => 13,
            Self::FmtS16Dfp => 14,
            Self::FmtU32Dec => 15,
            Self::ZtimerNow => 16,
            Self::ZtimerPeriodicWakeup => 17,
        }
    }

    pub const fn block(self) -> CallBlock {
        match self.as_raw() >> 4 {
            0x0 => CallBlock::Stdlib,
            0x1 => CallBlock::Store,
            0x2 => CallBlock::Time,
            0x3 => CallBlock::Sensor,
            0x4 => CallBlock::Coap,
            0x5 => CallBlock::Format,
            _ => CallBlock::Timer,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Printf => "printf",
            Self::Memcpy => "memcpy",
            Self::StoreLocal => "store_local",
            Self::StoreGlobal => "store_global",
            Self::FetchLocal => "fetch_local",
            Self::FetchGlobal => "fetch_global",
            Self::NowMs => "now_ms",
            Self::SaulRegFindNth => "saul_reg_find_nth",
            Self::SaulRegFindType => "saul_reg_find_type",
            Self::SaulRegRead => "saul_reg_read",
            Self::GcoapRespInit => "gcoap_resp_init",
            Self::CoapOptFinish => "coap_opt_finish",
            Self::CoapAddFormat => "coap_add_format",
            Self::CoapGetPdu => "coap_get_pdu",
            Self::FmtS16Dfp => "fmt_s16_dfp",
            Self::FmtU32Dec => "fmt_u32_dec",
            Self::ZtimerNow => "ztimer_now",
            Self::ZtimerPeriodicWakeup => "ztimer_periodic_wakeup",
        }
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
