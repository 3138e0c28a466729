use core::mem::size_of;

use aya_ebpf::{
    helpers::{
        bpf_get_current_comm, bpf_get_current_pid_tgid, bpf_get_current_uid_gid,
        bpf_ktime_get_boot_ns, bpf_probe_read_user, bpf_probe_read_user_buf,
    },
    macros::{map, tracepoint},
    maps::{Array, HashMap, PerCpuArray, RingBuf},
    programs::TracePointContext,
};
use aya_log_ebpf::warn;
use binder_trace_common::{
    bc, br, cursor, ring_buf_flags, txn_data_tag, record_type, BinderWriteRead, EventHeader,
    HeaderOnlyRecord, IoctlContext, IoctlDoneRecord, IoctlDoneTail, IoctlRecord, IoctlTail,
    Phase, TxnDataHeader, TxnReceivedRecord, TxnReceivedTail, TxnRecord, TxnTail,
    WriteReadScratch, BINDER_WRITE_READ, PID_MAX, RING_BUFFER_BYTES,
};
use binder_trace_common::clamp_copy_len;

// =============================================================================
// MAPS
// =============================================================================

#[map(name = "BINDER_PROCESS_STATE")]
static mut BINDER_PROCESS_STATE: Array<u32> = Array::with_max_entries(PID_MAX, 0);

#[map(name = "IOCTL_CONTEXT_MAP")]
static mut IOCTL_CONTEXT_MAP: Array<IoctlContext> = Array::with_max_entries(PID_MAX, 0);

#[map(name = "WRITE_READ_CURSORS")]
static mut WRITE_READ_CURSORS: HashMap<u32, BinderWriteRead> =
    HashMap::with_max_entries(PID_MAX, 0);

#[map(name = "BINDER_EVENTS_BUFFER")]
static BINDER_EVENTS_BUFFER: RingBuf = RingBuf::with_byte_size(RING_BUFFER_BYTES, 0);

#[map(name = "TMP_BUFFERS")]
static mut TMP_BUFFERS: PerCpuArray<WriteReadScratch> = PerCpuArray::with_max_entries(1, 0);

const SYS_IOCTL: i64 = 29; // arm64 __NR_ioctl
const HEADER_LEN: usize = size_of::<EventHeader>() + size_of::<BinderWriteRead>();

// Offsets into the tracepoint's marshalled argument buffer, past the
// 8-byte common tracing header. Fixed by the kernel's trace event
// definitions in include/trace/events/{raw_syscalls,binder,sched}.h.
mod tp_offset {
    pub const SYS_ENTER_ID: usize = 8;
    pub const SYS_ENTER_ARGS: usize = 16;
    pub const SYS_EXIT_ID: usize = 8;
    pub const BINDER_IOCTL_CMD: usize = 8;
    pub const BINDER_IOCTL_ARG: usize = 16;
    pub const BINDER_IOCTL_DONE_RET: usize = 8;
    pub const BINDER_COMMAND_CMD: usize = 8;
    pub const BINDER_RETURN_CMD: usize = 8;
    pub const BINDER_TXN_DEBUG_ID: usize = 8;
    pub const BINDER_TXN_TARGET_NODE: usize = 12;
    pub const BINDER_TXN_TO_PROC: usize = 16;
    pub const BINDER_TXN_TO_THREAD: usize = 20;
    pub const BINDER_TXN_REPLY: usize = 24;
    pub const BINDER_TXN_CODE: usize = 28;
    pub const BINDER_TXN_FLAGS: usize = 32;
    pub const BINDER_TXN_RECEIVED_DEBUG_ID: usize = 8;
}

// =============================================================================
// SMALL HELPERS
// =============================================================================

/// Returns `(pid, tid)` in the tracer's vocabulary: `pid` is the thread
/// group (the process, as userspace sees it), `tid` is the individual
/// thread (what the kernel itself calls `pid`).
fn current_ids() -> (i32, u32) {
    let pid_tgid = bpf_get_current_pid_tgid();
    let tid = pid_tgid as u32;
    let pid = (pid_tgid >> 32) as u32 as i32;
    (pid, tid)
}

fn now_ns() -> u64 {
    // Boot-clock, not monotonic: monotonic time freezes across suspend, which
    // would make timestamps from before and after a suspend/resume cycle
    // incomparable.
    unsafe { bpf_ktime_get_boot_ns() }
}

fn header(rt: u32, pid: i32, tid: u32) -> EventHeader {
    EventHeader {
        record_type: rt,
        pid,
        tid: tid as i32,
        timestamp_ns: now_ns(),
    }
}

fn get_phase(tid: u32) -> Phase {
    try_get_phase(tid).unwrap_or(Phase::Invalid)
}

/// `None` only when `tid` is out of the fixed `PID_MAX` array bound — a
/// wholly unknown thread, silently dropped. Distinct from a
/// present-but-`Invalid` entry, which is a legitimate transition-table
/// lookup against `Phase::Invalid`.
fn try_get_phase(tid: u32) -> Option<Phase> {
    unsafe {
        BINDER_PROCESS_STATE
            .get(tid)
            .map(|raw| Phase::from_u32(*raw).unwrap_or(Phase::Invalid))
    }
}

fn set_phase(tid: u32, phase: Phase) {
    unsafe {
        if let Some(ptr) = BINDER_PROCESS_STATE.get_ptr_mut(tid) {
            *ptr = phase as u32;
        }
    }
}

fn get_ioctl_context(tid: u32) -> Option<IoctlContext> {
    unsafe { IOCTL_CONTEXT_MAP.get(tid).copied() }
}

fn set_ioctl_context(tid: u32, ctx: IoctlContext) {
    unsafe {
        if let Some(ptr) = IOCTL_CONTEXT_MAP.get_ptr_mut(tid) {
            *ptr = ctx;
        }
    }
}

fn tp_read_u32(ctx: &TracePointContext, offset: usize) -> Option<u32> {
    unsafe { ctx.read_at::<u32>(offset).ok() }
}

fn tp_read_u64(ctx: &TracePointContext, offset: usize) -> Option<u64> {
    unsafe { ctx.read_at::<u64>(offset).ok() }
}

fn tp_read_i32(ctx: &TracePointContext, offset: usize) -> Option<i32> {
    unsafe { ctx.read_at::<i32>(offset).ok() }
}

fn scratch_mut() -> Option<&'static mut WriteReadScratch> {
    unsafe { TMP_BUFFERS.get_ptr_mut(0).map(|ptr| &mut *ptr) }
}

/// Emits one `Invalid` record and resets the thread, for an out-of-order
/// transition or any other condition that leaves the thread's state
/// untrustworthy.
fn invalidate_thread(pid: i32, tid: u32) {
    set_phase(tid, Phase::Invalid);
    let record = HeaderOnlyRecord {
        header: header(record_type::INVALID, pid, tid),
    };
    if let Some(mut entry) = BINDER_EVENTS_BUFFER.reserve::<HeaderOnlyRecord>(0) {
        entry.write(record);
        entry.submit(ring_buf_flags::DEFAULT);
    }
}

/// Requests a transition into `target`; on success updates the thread's
/// phase and returns `true`. On a mismatched transition resets to `Invalid`
/// and emits the invalidation record. A `tid` outside the fixed `PID_MAX`
/// array bound is the "missing context" case instead: silently drop, no
/// emit, no mutation.
fn do_transition(pid: i32, tid: u32, target: Phase) -> bool {
    let current = match try_get_phase(tid) {
        Some(phase) => phase,
        None => return false,
    };
    if binder_trace_common::is_valid_transition(current, target) {
        set_phase(tid, target);
        true
    } else {
        invalidate_thread(pid, tid);
        false
    }
}

/// Publishes a `Write`/`Read`/`TxnData` record assembled in the per-CPU
/// scratch buffer via `output`. `requested_len` is masked to a
/// power-of-two bound the verifier can prove, then clamped down to the
/// scratch buffer's real data capacity; a payload longer than that is
/// truncated but still emitted, with a warning logged for the dropped
/// tail. Returns `false` (and emits nothing) when the scratch slot is
/// unavailable or the user-memory read fails, so the caller can unwind
/// the in-progress record instead of shipping a zeroed one.
fn emit_scratch_record(
    ctx: &TracePointContext,
    rt: u32,
    pid: i32,
    tid: u32,
    bwr: BinderWriteRead,
    data_ptr: u64,
    requested_len: u64,
) -> bool {
    let scratch = match scratch_mut() {
        Some(s) => s,
        None => return false,
    };
    let copy_len = clamp_copy_len(requested_len as usize);
    scratch.header = header(rt, pid, tid);
    scratch.bwr = bwr;
    if copy_len > 0 {
        let dst = &mut scratch.data[..copy_len];
        if unsafe { bpf_probe_read_user_buf(data_ptr as *const u8, dst) }.is_err() {
            warn!(ctx, "binder-trace: user buffer read failed, aborting record");
            dst.fill(0);
            return false;
        }
    }
    if (requested_len as usize) > copy_len {
        warn!(ctx, "binder-trace: truncated payload, embedded size exceeds scratch capacity");
    }
    let total = HEADER_LEN + copy_len;
    let bytes: &[u8] =
        unsafe { core::slice::from_raw_parts(scratch as *const WriteReadScratch as *const u8, total) };
    let _ = BINDER_EVENTS_BUFFER.output(bytes, ring_buf_flags::DEFAULT);
    true
}

// =============================================================================
// B. IOCTL CONTEXT TRACKER — raw_syscalls entry/exit
// =============================================================================

#[tracepoint(category = "raw_syscalls", name = "sys_enter")]
pub fn sys_enter(ctx: TracePointContext) -> u32 {
    try_sys_enter(&ctx).unwrap_or(1)
}

fn try_sys_enter(ctx: &TracePointContext) -> Option<u32> {
    let id = tp_read_u64(ctx, tp_offset::SYS_ENTER_ID).map(|v| v as i64)?;
    if id != SYS_IOCTL {
        return Some(0);
    }
    let fd = tp_read_u64(ctx, tp_offset::SYS_ENTER_ARGS)? as i32;
    let (_, tid) = current_ids();
    set_ioctl_context(tid, IoctlContext::armed(fd));
    Some(0)
}

#[tracepoint(category = "raw_syscalls", name = "sys_exit")]
pub fn sys_exit(ctx: TracePointContext) -> u32 {
    try_sys_exit(&ctx).unwrap_or(1)
}

fn try_sys_exit(ctx: &TracePointContext) -> Option<u32> {
    let id = tp_read_u64(ctx, tp_offset::SYS_EXIT_ID).map(|v| v as i64)?;
    if id != SYS_IOCTL {
        return Some(0);
    }
    let (_, tid) = current_ids();
    set_ioctl_context(tid, IoctlContext::DISARMED);
    Some(0)
}

// =============================================================================
// BINDER IOCTL ENTRY / DONE — drives Ioctl/IoctlDone phases and the
// write-read extractor's two activation points
// =============================================================================

#[tracepoint(category = "binder", name = "binder_ioctl")]
pub fn binder_ioctl(ctx: TracePointContext) -> u32 {
    try_binder_ioctl(&ctx).unwrap_or(1)
}

fn try_binder_ioctl(ctx: &TracePointContext) -> Option<u32> {
    let cmd = tp_read_u32(ctx, tp_offset::BINDER_IOCTL_CMD)?;
    let arg = tp_read_u64(ctx, tp_offset::BINDER_IOCTL_ARG)?;
    let (pid, tid) = current_ids();

    // Binder ioctl without a prior armed syscall-entry context is a
    // missing-context error — log, do not emit, do not mutate state.
    let mut ioctl_ctx = match get_ioctl_context(tid) {
        Some(c) if c.fd != -1 => c,
        _ => {
            warn!(ctx, "binder-trace: binder_ioctl with no armed syscall context");
            return Some(0);
        }
    };
    ioctl_ctx.cmd = cmd;
    ioctl_ctx.arg = arg;
    set_ioctl_context(tid, ioctl_ctx);

    // Ioctl is set unconditionally on entry — it is the one transition
    // whose source set is implicit rather than drawn from the table.
    set_phase(tid, Phase::Ioctl);

    let comm = unsafe { bpf_get_current_comm().unwrap_or([0u8; 16]) };
    let uid_gid = unsafe { bpf_get_current_uid_gid() };
    let tail = IoctlTail {
        fd: ioctl_ctx.fd,
        comm,
        uid: uid_gid as u32,
        gid: (uid_gid >> 32) as u32,
        cmd,
        arg,
    };
    let record = IoctlRecord {
        header: header(record_type::IOCTL, pid, tid),
        tail,
    };
    // The first per-process event forces a consumer wakeup so it can
    // snapshot /proc/<pid> before the process can exit.
    if let Some(mut entry) = BINDER_EVENTS_BUFFER.reserve::<IoctlRecord>(0) {
        entry.write(record);
        entry.submit(ring_buf_flags::FORCE_WAKEUP);
    }

    if cmd == BINDER_WRITE_READ {
        start_write_read(ctx, pid, tid, arg);
    }
    Some(0)
}

/// Moment 1 of the write-read extractor: snapshot the structure, persist
/// it for cursor arithmetic, and emit the `Write` record.
fn start_write_read(ctx: &TracePointContext, pid: i32, tid: u32, arg: u64) {
    let bwr = match unsafe { bpf_probe_read_user::<BinderWriteRead>(arg as *const BinderWriteRead) } {
        Ok(bwr) => bwr,
        Err(_) => {
            warn!(ctx, "binder-trace: failed to read binder_write_read from user memory");
            return;
        }
    };
    unsafe {
        let _ = WRITE_READ_CURSORS.insert(&tid, &bwr, 0);
    }
    let emitted = emit_scratch_record(
        ctx,
        record_type::WRITE,
        pid,
        tid,
        bwr,
        bwr.write_buffer,
        bwr.write_size,
    );
    if !emitted {
        unsafe {
            let _ = WRITE_READ_CURSORS.remove(&tid);
        }
    }
}

#[tracepoint(category = "binder", name = "binder_ioctl_done")]
pub fn binder_ioctl_done(ctx: TracePointContext) -> u32 {
    try_binder_ioctl_done(&ctx).unwrap_or(1)
}

fn try_binder_ioctl_done(ctx: &TracePointContext) -> Option<u32> {
    let ret = tp_read_i32(ctx, tp_offset::BINDER_IOCTL_DONE_RET)?;
    let (pid, tid) = current_ids();

    if !do_transition(pid, tid, Phase::IoctlDone) {
        return Some(0);
    }
    // IoctlDone resets the thread to Invalid.
    set_phase(tid, Phase::Invalid);

    // Moment 2 of the write-read extractor: only for BINDER_WRITE_READ, and
    // only after the IoctlDone transition itself succeeds. A failure here
    // invalidates the thread and skips the IoctlDone record entirely,
    // matching binder_ioctl_done's `do_binder_write_read` + `send_invalidate`
    // early-return path.
    if get_ioctl_context(tid).map(|c| c.cmd) == Some(BINDER_WRITE_READ) {
        let arg = get_ioctl_context(tid).map(|c| c.arg).unwrap_or(0);
        if !finish_write_read(ctx, pid, tid, arg) {
            invalidate_thread(pid, tid);
            return Some(0);
        }
    }

    let record = IoctlDoneRecord {
        header: header(record_type::IOCTL_DONE, pid, tid),
        tail: IoctlDoneTail { ret, _pad: 0 },
    };
    if let Some(mut entry) = BINDER_EVENTS_BUFFER.reserve::<IoctlDoneRecord>(0) {
        entry.write(record);
        entry.submit(ring_buf_flags::DEFAULT);
    }
    Some(0)
}

/// Re-reads the updated `binder_write_read` structure and emits the `Read`
/// record. Returns `false` on a user-memory read failure or scratch-record
/// emission failure, in which case the caller invalidates the thread
/// instead of emitting `IoctlDone`.
fn finish_write_read(ctx: &TracePointContext, pid: i32, tid: u32, arg: u64) -> bool {
    let bwr = match unsafe { bpf_probe_read_user::<BinderWriteRead>(arg as *const BinderWriteRead) } {
        Ok(bwr) => bwr,
        Err(_) => {
            warn!(ctx, "binder-trace: failed to re-read binder_write_read at ioctl done");
            unsafe {
                let _ = WRITE_READ_CURSORS.remove(&tid);
            }
            return false;
        }
    };
    let emitted = emit_scratch_record(
        ctx,
        record_type::READ,
        pid,
        tid,
        bwr,
        bwr.read_buffer,
        bwr.read_consumed,
    );
    unsafe {
        let _ = WRITE_READ_CURSORS.remove(&tid);
    }
    emitted
}

// =============================================================================
// D. WRITE-READ EXTRACTOR — command/return sub-protocol
// =============================================================================

#[tracepoint(category = "binder", name = "binder_command")]
pub fn binder_command(ctx: TracePointContext) -> u32 {
    try_binder_command(&ctx).unwrap_or(1)
}

fn try_binder_command(ctx: &TracePointContext) -> Option<u32> {
    let cmd = tp_read_u32(ctx, tp_offset::BINDER_COMMAND_CMD)?;
    let (pid, tid) = current_ids();

    if !do_transition(pid, tid, Phase::Command) {
        return Some(0);
    }

    let mut wr = match unsafe { WRITE_READ_CURSORS.get(&tid) } {
        Some(c) => *c,
        None => return Some(0),
    };

    if bc::carries_transaction(cmd) {
        let addr = wr.write_buffer + wr.write_consumed;
        match unsafe { bpf_probe_read_user::<TxnDataHeader>(addr as *const TxnDataHeader) } {
            Ok(txn) if txn.cmd == cmd => {
                let mut ok = true;
                if txn.data_size != 0 {
                    ok &= emit_scratch_record(
                        ctx,
                        record_type::TXN_DATA,
                        pid,
                        tid,
                        tagged_bwr(&wr, txn_data_tag::PAYLOAD, 0),
                        txn.data_buffer,
                        txn.data_size,
                    );
                }
                if txn.offsets_size != 0 {
                    ok &= emit_scratch_record(
                        ctx,
                        record_type::TXN_DATA,
                        pid,
                        tid,
                        tagged_bwr(&wr, 0, txn_data_tag::OFFSETS),
                        txn.data_offsets,
                        txn.offsets_size,
                    );
                }
                if !ok {
                    unsafe {
                        let _ = WRITE_READ_CURSORS.remove(&tid);
                    }
                    return Some(0);
                }
            }
            Ok(_) => {
                // Embedded cmd mismatch: discard the cursor and abort.
                unsafe {
                    let _ = WRITE_READ_CURSORS.remove(&tid);
                }
                return Some(0);
            }
            Err(_) => {
                warn!(ctx, "binder-trace: failed to read transaction header from write buffer");
                unsafe {
                    let _ = WRITE_READ_CURSORS.remove(&tid);
                }
                return Some(0);
            }
        }
    }

    // Unconditional cursor advance regardless of whether a transaction
    // header was decoded — the kernel consumes the command either way.
    cursor::advance_write_consumed(&mut wr, cmd);
    unsafe {
        let _ = WRITE_READ_CURSORS.insert(&tid, &wr, 0);
    }
    Some(0)
}

#[tracepoint(category = "binder", name = "binder_return")]
pub fn binder_return(ctx: TracePointContext) -> u32 {
    try_binder_return(&ctx).unwrap_or(1)
}

fn try_binder_return(ctx: &TracePointContext) -> Option<u32> {
    let cmd = tp_read_u32(ctx, tp_offset::BINDER_RETURN_CMD)?;
    let (pid, tid) = current_ids();

    if !do_transition(pid, tid, Phase::Return) {
        return Some(0);
    }

    let mut wr = match unsafe { WRITE_READ_CURSORS.get(&tid) } {
        Some(c) => *c,
        None => return Some(0),
    };

    // BR_NOOP is never traced but is always consumed first; pre-advance by
    // its 4-byte header on the first return of the loop. Keyed on
    // `read_consumed == 0` rather than the thread's prior phase, since that's
    // the only signal available this early — and it must persist even when
    // this return turns out to be BR_SPAWN_LOOPER.
    if cursor::pre_advance_for_noop(&mut wr) {
        unsafe {
            let _ = WRITE_READ_CURSORS.insert(&tid, &wr, 0);
        }
    }

    // BR_SPAWN_LOOPER is always the last return and is ignored entirely for
    // further cursor arithmetic — the NOOP pre-advance above still applies
    // and has already been persisted.
    if cmd == br::SPAWN_LOOPER {
        return Some(0);
    }

    if br::carries_transaction(cmd) {
        let addr = wr.read_buffer + wr.read_consumed;
        match unsafe { bpf_probe_read_user::<TxnDataHeader>(addr as *const TxnDataHeader) } {
            Ok(txn) if txn.cmd == cmd => {
                let mut ok = true;
                if txn.data_size != 0 {
                    ok &= emit_scratch_record(
                        ctx,
                        record_type::TXN_DATA,
                        pid,
                        tid,
                        tagged_bwr(&wr, txn_data_tag::PAYLOAD, 0),
                        txn.data_buffer,
                        txn.data_size,
                    );
                }
                if txn.offsets_size != 0 {
                    ok &= emit_scratch_record(
                        ctx,
                        record_type::TXN_DATA,
                        pid,
                        tid,
                        tagged_bwr(&wr, 0, txn_data_tag::OFFSETS),
                        txn.data_offsets,
                        txn.offsets_size,
                    );
                }
                if !ok {
                    unsafe {
                        let _ = WRITE_READ_CURSORS.remove(&tid);
                    }
                    return Some(0);
                }
            }
            Ok(_) => {
                unsafe {
                    let _ = WRITE_READ_CURSORS.remove(&tid);
                }
                return Some(0);
            }
            Err(_) => {
                warn!(ctx, "binder-trace: failed to read transaction header from read buffer");
                unsafe {
                    let _ = WRITE_READ_CURSORS.remove(&tid);
                }
                return Some(0);
            }
        }
    }

    cursor::advance_read_consumed(&mut wr, cmd);
    unsafe {
        let _ = WRITE_READ_CURSORS.insert(&tid, &wr, 0);
    }
    Some(0)
}

fn tagged_bwr(cursor: &BinderWriteRead, write_tag: u64, read_tag: u64) -> BinderWriteRead {
    BinderWriteRead {
        write_buffer: write_tag,
        read_buffer: read_tag,
        ..*cursor
    }
}

// =============================================================================
// C. THREAD STATE MACHINE — plain phase transitions with no record of
// their own; the wire format has no tail struct for these
// =============================================================================

#[tracepoint(category = "binder", name = "binder_transaction")]
pub fn binder_transaction(ctx: TracePointContext) -> u32 {
    try_binder_transaction(&ctx).unwrap_or(1)
}

fn try_binder_transaction(ctx: &TracePointContext) -> Option<u32> {
    let debug_id = tp_read_i32(ctx, tp_offset::BINDER_TXN_DEBUG_ID)?;
    let target_node = tp_read_i32(ctx, tp_offset::BINDER_TXN_TARGET_NODE)?;
    let to_proc = tp_read_i32(ctx, tp_offset::BINDER_TXN_TO_PROC)?;
    let to_thread = tp_read_i32(ctx, tp_offset::BINDER_TXN_TO_THREAD)?;
    let reply = tp_read_i32(ctx, tp_offset::BINDER_TXN_REPLY)?;
    let code = tp_read_u32(ctx, tp_offset::BINDER_TXN_CODE)?;
    let flags = tp_read_u32(ctx, tp_offset::BINDER_TXN_FLAGS)?;
    let (pid, tid) = current_ids();

    if !do_transition(pid, tid, Phase::Txn) {
        return Some(0);
    }

    let record = TxnRecord {
        header: header(record_type::TXN, pid, tid),
        tail: TxnTail {
            debug_id,
            target_node,
            to_proc,
            to_thread,
            reply,
            code,
            flags,
            _pad: 0,
        },
    };
    if let Some(mut entry) = BINDER_EVENTS_BUFFER.reserve::<TxnRecord>(0) {
        entry.write(record);
        entry.submit(ring_buf_flags::DEFAULT);
    }
    Some(0)
}

#[tracepoint(category = "binder", name = "binder_transaction_received")]
pub fn binder_transaction_received(ctx: TracePointContext) -> u32 {
    try_binder_transaction_received(&ctx).unwrap_or(1)
}

fn try_binder_transaction_received(ctx: &TracePointContext) -> Option<u32> {
    let debug_id = tp_read_i32(ctx, tp_offset::BINDER_TXN_RECEIVED_DEBUG_ID)?;
    let (pid, tid) = current_ids();

    if !do_transition(pid, tid, Phase::TxnReceived) {
        return Some(0);
    }

    let record = TxnReceivedRecord {
        header: header(record_type::TXN_RECEIVED, pid, tid),
        tail: TxnReceivedTail {
            debug_id,
            _pad: 0,
        },
    };
    if let Some(mut entry) = BINDER_EVENTS_BUFFER.reserve::<TxnReceivedRecord>(0) {
        entry.write(record);
        entry.submit(ring_buf_flags::DEFAULT);
    }
    Some(0)
}

#[tracepoint(category = "binder", name = "binder_write_done")]
pub fn binder_write_done(ctx: TracePointContext) -> u32 {
    let (pid, tid) = current_ids();
    do_transition(pid, tid, Phase::WriteDone);
    let _ = ctx;
    0
}

#[tracepoint(category = "binder", name = "binder_wait_for_work")]
pub fn binder_wait_for_work(ctx: TracePointContext) -> u32 {
    let (pid, tid) = current_ids();
    do_transition(pid, tid, Phase::WaitForWork);
    let _ = ctx;
    0
}

#[tracepoint(category = "binder", name = "binder_read_done")]
pub fn binder_read_done(ctx: TracePointContext) -> u32 {
    let (pid, tid) = current_ids();
    do_transition(pid, tid, Phase::ReadDone);
    let _ = ctx;
    0
}

// =============================================================================
// E. LIFECYCLE HOOKS
// =============================================================================

#[tracepoint(category = "sched", name = "sched_process_exit")]
pub fn sched_process_exit(ctx: TracePointContext) -> u32 {
    let (pid, tid) = current_ids();
    let phase = get_phase(tid);
    let armed = get_ioctl_context(tid).map(|c| c.fd != -1).unwrap_or(false);
    if phase == Phase::Invalid && !armed {
        return 0;
    }
    set_phase(tid, Phase::Invalid);
    set_ioctl_context(tid, IoctlContext::DISARMED);
    unsafe {
        let _ = WRITE_READ_CURSORS.remove(&tid);
    }
    let record = HeaderOnlyRecord {
        header: header(record_type::INVALIDATE_PROCESS, pid, tid),
    };
    if let Some(mut entry) = BINDER_EVENTS_BUFFER.reserve::<HeaderOnlyRecord>(0) {
        entry.write(record);
        entry.submit(ring_buf_flags::DEFAULT);
    }
    let _ = ctx;
    0
}

#[cfg(all(not(test), target_arch = "bpf"))]
#[panic_handler]
fn panic(_: &core::panic::PanicInfo) -> ! {
    loop {}
}

#[link_section = "license"]
#[no_mangle]
static LICENSE: [u8; 4] = *b"GPL\0";
