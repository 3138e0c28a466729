#![cfg_attr(all(feature = "bpf", not(feature = "user")), no_std)]

//! Wire types shared between the in-kernel tracer (`binder-trace-ebpf`) and
//! the userspace loader (`binder-trace-loader`): the thread `Phase` state
//! machine, the Binder ioctl/command/return ABI constants needed to frame
//! sub-records, and the event record layouts published on the ring buffer.

#[cfg(test)]
use core::mem::size_of;

use bytemuck::{Pod, Zeroable};

// =============================================================================
// THREAD PHASE STATE MACHINE
// =============================================================================

/// A thread's position inside one Binder ioctl. `Invalid` is both the
/// initial and the terminal value — see the transition table below.
#[repr(u32)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "user", derive(serde::Serialize, serde::Deserialize))]
pub enum Phase {
    Invalid = 0,
    Ioctl = 1,
    Command = 2,
    Txn = 3,
    WriteDone = 4,
    WaitForWork = 5,
    Return = 6,
    ReadDone = 7,
    TxnReceived = 8,
    IoctlDone = 9,
}

impl Phase {
    pub const fn from_u32(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::Invalid),
            1 => Some(Self::Ioctl),
            2 => Some(Self::Command),
            3 => Some(Self::Txn),
            4 => Some(Self::WriteDone),
            5 => Some(Self::WaitForWork),
            6 => Some(Self::Return),
            7 => Some(Self::ReadDone),
            8 => Some(Self::TxnReceived),
            9 => Some(Self::IoctlDone),
            _ => None,
        }
    }

    /// The sources from which a transition into `self` is permitted. An
    /// empty slice means the target is never reached via `do_transition`
    /// (it is set unconditionally instead, as `Ioctl` is on ioctl entry).
    pub const fn permitted_sources(self) -> &'static [Phase] {
        use Phase::*;
        match self {
            Invalid => &[],
            Ioctl => &[Invalid],
            Command => &[Ioctl, Command, Txn],
            Txn => &[Command],
            WriteDone => &[Txn, Command],
            WaitForWork => &[Ioctl, WriteDone],
            TxnReceived => &[WaitForWork, Return],
            Return => &[WaitForWork, TxnReceived, Return],
            ReadDone => &[WaitForWork, Return],
            IoctlDone => &[Ioctl, WriteDone, ReadDone],
        }
    }
}

/// `is_valid_transition(from, to)` succeeds iff `(from, to)` appears in the
/// transition table. Linear search over at most 3 permitted sources —
/// bounded and verifier-friendly.
pub fn is_valid_transition(from: Phase, to: Phase) -> bool {
    let mut sources = to.permitted_sources();
    while let [head, rest @ ..] = sources {
        if *head == from {
            return true;
        }
        sources = rest;
    }
    false
}

// =============================================================================
// RECORD TYPE — Phase plus the pseudo-variants used only as record tags
// =============================================================================

/// Tags every emitted record. The first ten values alias `Phase` 1:1 (a
/// `Phase`-typed record announces "the thread is now in this phase"); the
/// remaining four are emitted without ever being stored as a thread's
/// current phase.
pub mod record_type {
    pub const INVALID: u32 = 0;
    pub const IOCTL: u32 = 1;
    pub const COMMAND: u32 = 2;
    pub const TXN: u32 = 3;
    pub const WRITE_DONE: u32 = 4;
    pub const WAIT_FOR_WORK: u32 = 5;
    pub const RETURN: u32 = 6;
    pub const READ_DONE: u32 = 7;
    pub const TXN_RECEIVED: u32 = 8;
    pub const IOCTL_DONE: u32 = 9;
    /// One past the last real `Phase` value; also the first pseudo-tag.
    pub const PHASE_MAX: u32 = 10;
    pub const INVALIDATE_PROCESS: u32 = PHASE_MAX;
    pub const WRITE: u32 = 11;
    pub const READ: u32 = 12;
    pub const TXN_DATA: u32 = 13;
}

/// Ring-buffer wakeup mode for `submit`. Every record uses `Default`
/// except the first `Ioctl` record of a process, which forces a wakeup so
/// the consumer can snapshot `/proc/<pid>` before the process can exit.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WakeupMode {
    Default,
    Force,
}

// =============================================================================
// EVENT RECORD LAYOUT
// =============================================================================

/// Common header prefixing every record.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
#[cfg_attr(feature = "user", derive(serde::Serialize, serde::Deserialize))]
pub struct EventHeader {
    pub record_type: u32,
    pub pid: i32,
    pub tid: i32,
    pub timestamp_ns: u64,
}

/// Tail of an `Ioctl` record — the only record carrying `comm`/`uid`/`gid`,
/// since this is the first (and only guaranteed) chance to capture them
/// before the owning process can exit.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
#[cfg_attr(feature = "user", derive(serde::Serialize, serde::Deserialize))]
pub struct IoctlTail {
    pub fd: i32,
    pub comm: [u8; 16],
    pub uid: u32,
    pub gid: u32,
    pub cmd: u32,
    pub arg: u64,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
#[cfg_attr(feature = "user", derive(serde::Serialize, serde::Deserialize))]
pub struct IoctlDoneTail {
    pub ret: i32,
    pub _pad: u32,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
#[cfg_attr(feature = "user", derive(serde::Serialize, serde::Deserialize))]
pub struct TxnTail {
    pub debug_id: i32,
    pub target_node: i32,
    pub to_proc: i32,
    pub to_thread: i32,
    pub reply: i32,
    pub code: u32,
    pub flags: u32,
    pub _pad: u32,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
#[cfg_attr(feature = "user", derive(serde::Serialize, serde::Deserialize))]
pub struct TxnReceivedTail {
    pub debug_id: i32,
    pub _pad: u32,
}

/// Flags accepted by the ring buffer's `submit`/`output` helpers (not
/// `reserve`) — mirrors `libbpf`'s `BPF_RB_FORCE_WAKEUP`/`BPF_RB_NO_WAKEUP`.
pub mod ring_buf_flags {
    pub const DEFAULT: u64 = 0;
    pub const FORCE_WAKEUP: u64 = 1;
    pub const NO_WAKEUP: u64 = 2;
}

/// Full wire records — header plus tail, laid out consecutively — for the
/// fixed-size record types reserved directly on the ring buffer.
/// `Write`/`Read`/`TxnData` are variable-length and go through `output`
/// from the per-CPU scratch buffer instead, so they have no fixed struct
/// here.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct IoctlRecord {
    pub header: EventHeader,
    pub tail: IoctlTail,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct IoctlDoneRecord {
    pub header: EventHeader,
    pub tail: IoctlDoneTail,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct TxnRecord {
    pub header: EventHeader,
    pub tail: TxnTail,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct TxnReceivedRecord {
    pub header: EventHeader,
    pub tail: TxnReceivedTail,
}

/// `InvalidateProcess` and `Invalid` records carry no tail, just the
/// common header.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct HeaderOnlyRecord {
    pub header: EventHeader,
}

/// A snapshot of the user-space `binder_write_read` structure, bit-layout
/// compatible with the kernel uapi struct on 64-bit targets (all fields are
/// `binder_size_t`/`binder_uintptr_t`, i.e. `unsigned long`/pointer-width).
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
#[cfg_attr(feature = "user", derive(serde::Serialize, serde::Deserialize))]
pub struct BinderWriteRead {
    pub write_size: u64,
    pub write_consumed: u64,
    pub write_buffer: u64,
    pub read_size: u64,
    pub read_consumed: u64,
    pub read_buffer: u64,
}

pub const SIZEOF_BINDER_WRITE_READ: u32 = 48;

#[cfg(test)]
const _: () = assert!(size_of::<BinderWriteRead>() == SIZEOF_BINDER_WRITE_READ as usize);

/// Per-CPU scratch region: one fixed region big enough to construct any
/// `Write`/`Read`/`TxnData` record — header, `BinderWriteRead` snapshot,
/// and up to `SCRATCH_DATA_CAPACITY` bytes of payload, laid out
/// consecutively the way `struct write_read_buffer` does in the original C.
pub const SCRATCH_SIZE: usize = 32 * 1024;
pub const SCRATCH_DATA_CAPACITY: usize =
    SCRATCH_SIZE - core::mem::size_of::<EventHeader>() - core::mem::size_of::<BinderWriteRead>();

/// The verifier needs a compile-time power-of-two mask to prove a
/// user-buffer copy length is bounded before `bpf_probe_read_user_buf`
/// runs. `SCRATCH_SIZE` is already a power of two and an upper bound on
/// `SCRATCH_DATA_CAPACITY`, so masking against `SCRATCH_SIZE - 1` proves
/// the bound the verifier wants without discarding any of the data
/// region's real capacity; callers still need `clamp_copy_len` below to
/// bring a `SCRATCH_SIZE`-masked value back under `SCRATCH_DATA_CAPACITY`.
pub const SCRATCH_COPY_MASK: usize = SCRATCH_SIZE - 1;

/// Bounds a requested copy length to what the scratch buffer's `data`
/// field can actually hold, after the verifier-facing mask above has
/// already proven it's below `SCRATCH_SIZE`. Anything past
/// `SCRATCH_DATA_CAPACITY` is truncated, not rejected — the record still
/// goes out, just short, matching the original's "copy what fits, log the
/// rest as dropped" behavior instead of discarding the whole record.
pub const fn clamp_copy_len(requested: usize) -> usize {
    let masked = requested & SCRATCH_COPY_MASK;
    if masked > SCRATCH_DATA_CAPACITY {
        SCRATCH_DATA_CAPACITY
    } else {
        masked
    }
}

#[cfg(test)]
const _: () = assert!(SCRATCH_COPY_MASK >= SCRATCH_DATA_CAPACITY);

#[repr(C)]
#[derive(Copy, Clone)]
pub struct WriteReadScratch {
    pub header: EventHeader,
    pub bwr: BinderWriteRead,
    pub data: [u8; SCRATCH_DATA_CAPACITY],
}

unsafe impl Pod for WriteReadScratch {}
unsafe impl Zeroable for WriteReadScratch {}

#[cfg(test)]
const _: () = assert!(core::mem::size_of::<WriteReadScratch>() <= SCRATCH_SIZE);

/// `write_buffer`/`read_buffer` are reused on `TxnData` records purely as a
/// 0/1 tag distinguishing the payload record from the offsets record.
pub mod txn_data_tag {
    pub const PAYLOAD: u64 = 1;
    pub const OFFSETS: u64 = 1;
}

/// Per-thread ioctl context: `fd = -1` means "armed but not a Binder
/// ioctl" or "disarmed"; `cmd`/`arg` populate only once the Binder ioctl
/// tracepoint fires.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
#[cfg_attr(feature = "user", derive(serde::Serialize, serde::Deserialize))]
pub struct IoctlContext {
    pub fd: i32,
    pub cmd: u32,
    pub arg: u64,
}

impl IoctlContext {
    pub const DISARMED: Self = Self {
        fd: -1,
        cmd: 0,
        arg: 0,
    };

    pub const fn armed(fd: i32) -> Self {
        Self { fd, cmd: 0, arg: 0 }
    }
}

/// Default PID_MAX — Android's default, used to size the fixed-capacity
/// per-thread maps; eBPF maps need a fixed capacity declared up front, so
/// this has to be picked at compile time rather than read from
/// `/proc/sys/kernel/pid_max`.
pub const PID_MAX: u32 = 32_768;

/// Default ring buffer capacity, must be a power of two.
pub const RING_BUFFER_BYTES: u32 = 64 * 1024 * 1024;

// =============================================================================
// LINUX IOCTL ENCODING (`_IOW`/`_IOR`/`_IOWR`/`_IO`, `_IOC_SIZE`)
// =============================================================================

pub const IOC_NRBITS: u32 = 8;
pub const IOC_TYPEBITS: u32 = 8;
pub const IOC_SIZEBITS: u32 = 14;
pub const IOC_NRSHIFT: u32 = 0;
pub const IOC_TYPESHIFT: u32 = IOC_NRSHIFT + IOC_NRBITS;
pub const IOC_SIZESHIFT: u32 = IOC_TYPESHIFT + IOC_TYPEBITS;
pub const IOC_DIRSHIFT: u32 = IOC_SIZESHIFT + IOC_SIZEBITS;

pub const IOC_NONE: u32 = 0;
pub const IOC_WRITE: u32 = 1;
pub const IOC_READ: u32 = 2;

const fn ioc(dir: u32, ty: u8, nr: u32, size: u32) -> u32 {
    (dir << IOC_DIRSHIFT) | ((ty as u32) << IOC_TYPESHIFT) | (nr << IOC_NRSHIFT) | (size << IOC_SIZESHIFT)
}

const fn io_(ty: u8, nr: u32) -> u32 {
    ioc(IOC_NONE, ty, nr, 0)
}

const fn iow(ty: u8, nr: u32, size: u32) -> u32 {
    ioc(IOC_WRITE, ty, nr, size)
}

const fn ior(ty: u8, nr: u32, size: u32) -> u32 {
    ioc(IOC_READ, ty, nr, size)
}

const fn iowr(ty: u8, nr: u32, size: u32) -> u32 {
    ioc(IOC_WRITE | IOC_READ, ty, nr, size)
}

/// `_IOC_SIZE(nr)`: the size embedded in an ioctl command word. The
/// command/return cursor advance (`sizeof(u32) + IOC_SIZE(cmd)`) relies on
/// this matching the struct size each `BC_*`/`BR_*` constant was encoded
/// with — true of the current Binder ABI, but not re-derived from live
/// kernel BTF, so an ABI change here would need the constants below
/// updated by hand.
pub const fn ioc_size(nr: u32) -> u32 {
    (nr >> IOC_SIZESHIFT) & ((1 << IOC_SIZEBITS) - 1)
}

const SIZEOF_BINDER_TRANSACTION_DATA: u32 = 64;
const SIZEOF_BINDER_TRANSACTION_DATA_SG: u32 = 72;
const SIZEOF_BINDER_TRANSACTION_DATA_SECCTX: u32 = 72;
const SIZEOF_BINDER_UINTPTR_T: u32 = 8;
const SIZEOF_S32: u32 = 4;
const SIZEOF_BINDER_PTR_COOKIE: u32 = 16;

const TYPE_BINDER: u8 = b'b';
const TYPE_COMMAND: u8 = b'c';
const TYPE_RETURN: u8 = b'r';

/// `BINDER_WRITE_READ` — the only ioctl this tracer activates the
/// write-read extractor for.
pub const BINDER_WRITE_READ: u32 = iowr(TYPE_BINDER, 1, SIZEOF_BINDER_WRITE_READ);

/// `BC_*` — commands the kernel consumes from the write buffer.
pub mod bc {
    use super::*;

    pub const TRANSACTION: u32 = iow(TYPE_COMMAND, 0, SIZEOF_BINDER_TRANSACTION_DATA);
    pub const REPLY: u32 = iow(TYPE_COMMAND, 1, SIZEOF_BINDER_TRANSACTION_DATA);
    pub const ACQUIRE_RESULT: u32 = iow(TYPE_COMMAND, 2, SIZEOF_S32);
    pub const FREE_BUFFER: u32 = iow(TYPE_COMMAND, 3, SIZEOF_BINDER_UINTPTR_T);
    pub const INCREFS: u32 = iow(TYPE_COMMAND, 4, SIZEOF_S32);
    pub const ACQUIRE: u32 = iow(TYPE_COMMAND, 5, SIZEOF_S32);
    pub const RELEASE: u32 = iow(TYPE_COMMAND, 6, SIZEOF_S32);
    pub const DECREFS: u32 = iow(TYPE_COMMAND, 7, SIZEOF_S32);
    pub const TRANSACTION_SG: u32 = iow(TYPE_COMMAND, 17, SIZEOF_BINDER_TRANSACTION_DATA_SG);
    pub const REPLY_SG: u32 = iow(TYPE_COMMAND, 18, SIZEOF_BINDER_TRANSACTION_DATA_SG);

    /// Transaction-carrying commands the write-read extractor decodes;
    /// everything else in this module is traced only for cursor arithmetic
    /// via `_IOC_SIZE`, never payload-decoded.
    pub const fn carries_transaction(cmd: u32) -> bool {
        cmd == TRANSACTION || cmd == REPLY || cmd == TRANSACTION_SG || cmd == REPLY_SG
    }
}

/// `BR_*` — returns the kernel produces into the read buffer.
pub mod br {
    use super::*;

    pub const TRANSACTION_COMPLETE: u32 = io_(TYPE_RETURN, 6);
    pub const INCREFS: u32 = ior(TYPE_RETURN, 7, SIZEOF_BINDER_PTR_COOKIE);
    pub const ACQUIRE: u32 = ior(TYPE_RETURN, 8, SIZEOF_BINDER_PTR_COOKIE);
    pub const RELEASE: u32 = ior(TYPE_RETURN, 9, SIZEOF_BINDER_PTR_COOKIE);
    pub const DECREFS: u32 = ior(TYPE_RETURN, 10, SIZEOF_BINDER_PTR_COOKIE);
    pub const TRANSACTION: u32 = ior(TYPE_RETURN, 2, SIZEOF_BINDER_TRANSACTION_DATA);
    pub const REPLY: u32 = ior(TYPE_RETURN, 3, SIZEOF_BINDER_TRANSACTION_DATA);
    pub const DEAD_REPLY: u32 = io_(TYPE_RETURN, 5);
    pub const NOOP: u32 = io_(TYPE_RETURN, 12);
    pub const SPAWN_LOOPER: u32 = io_(TYPE_RETURN, 13);
    pub const FAILED_REPLY: u32 = io_(TYPE_RETURN, 17);
    pub const TRANSACTION_SEC_CTX: u32 =
        ior(TYPE_RETURN, 19, SIZEOF_BINDER_TRANSACTION_DATA_SECCTX);

    /// Transaction-carrying returns the write-read extractor decodes.
    pub const fn carries_transaction(cmd: u32) -> bool {
        cmd == TRANSACTION || cmd == REPLY || cmd == TRANSACTION_SEC_CTX
    }
}

/// `{u32 cmd, binder_transaction_data}` header read from `(buffer +
/// consumed)` for transaction-carrying commands/returns. Matches
/// the subset of `binder_transaction_data` needed to recover
/// `data_size`/`offsets_size` and the two user pointers; packed to mirror
/// the original's `__attribute__((packed))` header struct.
#[repr(C, packed)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct TxnDataHeader {
    pub cmd: u32,
    pub target: u64,
    pub cookie: u64,
    pub code: u32,
    pub flags: u32,
    pub sender_pid: i32,
    pub sender_euid: u32,
    pub data_size: u64,
    pub offsets_size: u64,
    pub data_buffer: u64,
    pub data_offsets: u64,
}

#[cfg(test)]
const _: () = assert!(size_of::<TxnDataHeader>() == 4 + SIZEOF_BINDER_TRANSACTION_DATA as usize);

// =============================================================================
// WRITE-READ CURSOR ARITHMETIC — pure functions shared by the in-kernel
// extractor and by host-side tests, since neither depends on any BPF
// helper.
// =============================================================================

pub mod cursor {
    use super::{ioc_size, BinderWriteRead};
    use core::mem::size_of;

    /// Unconditional advance of `write_consumed` past one traced command's
    /// header, whether or not a transaction was decoded from it — the
    /// kernel consumes the header either way, so the cursor has to track
    /// that regardless of whether this tracer found it interesting.
    pub fn advance_write_consumed(cursor: &mut BinderWriteRead, cmd: u32) {
        cursor.write_consumed += size_of::<u32>() as u64 + ioc_size(cmd) as u64;
    }

    /// `BR_NOOP` is never traced but is always the first thing the kernel
    /// consumes from the read buffer; pre-advance past its 4-byte header
    /// exactly once per ioctl, keyed on `read_consumed == 0` rather than on
    /// the thread's prior phase, since that's the only signal available on
    /// the very first return of the loop even when it turns out to be
    /// `BR_SPAWN_LOOPER`. Returns whether a pre-advance happened.
    pub fn pre_advance_for_noop(cursor: &mut BinderWriteRead) -> bool {
        if cursor.read_consumed == 0 {
            cursor.read_consumed += size_of::<u32>() as u64;
            true
        } else {
            false
        }
    }

    /// Unconditional advance of `read_consumed` past one traced return's
    /// header. Never called for `BR_SPAWN_LOOPER`, which carries no cursor
    /// advance of its own beyond the `BR_NOOP` pre-advance.
    pub fn advance_read_consumed(cursor: &mut BinderWriteRead, cmd: u32) {
        cursor.read_consumed += size_of::<u32>() as u64 + ioc_size(cmd) as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_header_is_16_bytes() {
        assert_eq!(size_of::<EventHeader>(), 16);
    }

    #[test]
    fn binder_write_read_ioctl_matches_known_constant() {
        // Well-known magic number for BINDER_WRITE_READ on 64-bit Android/Linux.
        assert_eq!(BINDER_WRITE_READ, 0xc030_6201);
    }

    #[test]
    fn ioc_size_recovers_struct_size() {
        assert_eq!(ioc_size(bc::TRANSACTION), SIZEOF_BINDER_TRANSACTION_DATA);
        assert_eq!(ioc_size(br::TRANSACTION), SIZEOF_BINDER_TRANSACTION_DATA);
        assert_eq!(ioc_size(bc::TRANSACTION_SG), SIZEOF_BINDER_TRANSACTION_DATA_SG);
        assert_eq!(ioc_size(br::NOOP), 0);
    }

    #[test]
    fn carries_transaction_classification() {
        assert!(bc::carries_transaction(bc::TRANSACTION));
        assert!(bc::carries_transaction(bc::REPLY_SG));
        assert!(!bc::carries_transaction(bc::FREE_BUFFER));
        assert!(br::carries_transaction(br::TRANSACTION));
        assert!(br::carries_transaction(br::TRANSACTION_SEC_CTX));
        assert!(!br::carries_transaction(br::NOOP));
        assert!(!br::carries_transaction(br::SPAWN_LOOPER));
    }

    #[test]
    fn transition_table_accepts_documented_paths() {
        use Phase::*;
        assert!(is_valid_transition(Invalid, Ioctl));
        assert!(is_valid_transition(Ioctl, Command));
        assert!(is_valid_transition(Command, Txn));
        assert!(is_valid_transition(Txn, Command));
        assert!(is_valid_transition(Command, WriteDone));
        assert!(is_valid_transition(WriteDone, WaitForWork));
        assert!(is_valid_transition(WaitForWork, Return));
        assert!(is_valid_transition(Return, TxnReceived));
        assert!(is_valid_transition(TxnReceived, Return));
        assert!(is_valid_transition(Return, Return));
        assert!(is_valid_transition(Return, ReadDone));
        assert!(is_valid_transition(ReadDone, IoctlDone));
        assert!(is_valid_transition(WriteDone, IoctlDone));
    }

    #[test]
    fn transition_table_rejects_undocumented_paths() {
        use Phase::*;
        // Unlike the C original's sentinel-terminated table walk, a fresh
        // (Invalid) thread cannot jump straight to Command: only the
        // Ioctl tracepoint sets Ioctl unconditionally; every other target
        // requires one of its explicitly documented sources.
        assert!(!is_valid_transition(Invalid, Command));
        assert!(!is_valid_transition(Invalid, Txn));
        assert!(!is_valid_transition(Invalid, WaitForWork));
        assert!(!is_valid_transition(Ioctl, Txn));
        assert!(!is_valid_transition(Command, Return));
        assert!(!is_valid_transition(IoctlDone, Command));
    }

    #[test]
    fn phase_roundtrips_through_u32() {
        for raw in 0..10u32 {
            let phase = Phase::from_u32(raw).unwrap();
            assert_eq!(phase as u32, raw);
        }
        assert!(Phase::from_u32(10).is_none());
    }

    #[cfg(feature = "user")]
    #[test]
    fn ioctl_tail_roundtrips_through_json() {
        let tail = IoctlTail {
            fd: 7,
            comm: *b"binder_thread1\0\0",
            uid: 1000,
            gid: 1000,
            cmd: BINDER_WRITE_READ,
            arg: 0x7f0000,
        };
        let json = serde_json::to_string(&tail).unwrap();
        let back: IoctlTail = serde_json::from_str(&json).unwrap();
        assert_eq!(back.fd, tail.fd);
        assert_eq!(back.cmd, tail.cmd);
    }

    fn fresh_cursor() -> BinderWriteRead {
        BinderWriteRead {
            write_size: 0,
            write_consumed: 0,
            write_buffer: 0x1000,
            read_size: 0,
            read_consumed: 0,
            read_buffer: 0x2000,
        }
    }

    // Simple write-only ioctl — BC_FREE_BUFFER advances the write cursor
    // by its IOC_SIZE with no transaction decoded.
    #[test]
    fn cursor_simple_write_only_ioctl() {
        let mut cursor = fresh_cursor();
        cursor::advance_write_consumed(&mut cursor, bc::FREE_BUFFER);
        assert_eq!(cursor.write_consumed, 4 + ioc_size(bc::FREE_BUFFER) as u64);
    }

    // Single transaction round-trip — BC_TRANSACTION then BR_REPLY, both
    // transaction-carrying, cursors advance independently.
    #[test]
    fn cursor_single_transaction_round_trip() {
        let mut cursor = fresh_cursor();
        assert!(bc::carries_transaction(bc::TRANSACTION));
        cursor::advance_write_consumed(&mut cursor, bc::TRANSACTION);
        assert_eq!(cursor.write_consumed, 4 + ioc_size(bc::TRANSACTION) as u64);

        // First return of the loop: BR_NOOP is never traced but always
        // consumed first.
        assert!(cursor::pre_advance_for_noop(&mut cursor));
        assert_eq!(cursor.read_consumed, 4);
        assert!(br::carries_transaction(br::REPLY));
        cursor::advance_read_consumed(&mut cursor, br::REPLY);
        assert_eq!(cursor.read_consumed, 4 + 4 + ioc_size(br::REPLY) as u64);

        // A later return in the same loop must not re-trigger the NOOP
        // pre-advance.
        assert!(!cursor::pre_advance_for_noop(&mut cursor));
    }

    // Truncation needs no cursor arithmetic of its own, but a
    // BR_SPAWN_LOOPER-as-first-return still gets the NOOP pre-advance even
    // though it is otherwise ignored for cursor arithmetic.
    #[test]
    fn cursor_spawn_looper_as_first_return_still_gets_noop_preadvance() {
        let mut cursor = fresh_cursor();
        assert!(cursor::pre_advance_for_noop(&mut cursor));
        assert_eq!(cursor.read_consumed, 4);
        // BR_SPAWN_LOOPER itself never reaches advance_read_consumed in the
        // real handler (it returns immediately after the pre-advance).
        assert!(!br::carries_transaction(br::SPAWN_LOOPER));
    }
}
