//! Fixed-pool preemptive round-robin scheduler
//!
//! Task 0 is always the adopted shell task. Preemption is entirely IRQ-driven: the only places a
//! task's registers move are the timer IRQ entry (see `architecture::exception`) and the
//! synthesised trapframe a freshly created task starts from. There is no separate context-switch
//! routine — an ordinary exception-return into a task's saved (or synthesised) trapframe is the
//! entire mechanism, on one core at a time; see the design notes on why trapframes replace
//! co-routines here.

use crate::architecture::exception::Guard;
use crate::sync::SpinLock;
use core::sync::atomic::{AtomicU64, Ordering};

/// Number of task-control-block slots in the fixed pool
pub const MAX_TASKS: usize = 16;
/// Size of each task's stack, in bytes
const STACK_SIZE: usize = 8192;
/// Size of a trapframe, in 8-byte words (31 general registers + ELR + SPSR + one padding word)
///
/// Shared with the exception-vector assembly, which saves/restores a frame of exactly this shape.
pub(crate) const TRAPFRAME_WORDS: usize = 34;
/// Size of a trapframe, in bytes
pub(crate) const TRAPFRAME_BYTES: usize = TRAPFRAME_WORDS * 8;
/// Index of the exception-return address within a trapframe
pub(crate) const ELR_WORD: usize = 31;
/// Index of the saved processor state within a trapframe
pub(crate) const SPSR_WORD: usize = 32;
/// Index of the link register (x30) within a trapframe
pub(crate) const LR_WORD: usize = 30;
/// `SPSR_EL1` value selecting EL1h with every exception mask clear
const SPSR_EL1H_UNMASKED: u64 = 0b0101;

/// A task's lifecycle state
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum State {
    /// Eligible to run, waiting in the pending queue
    Ready,
    /// Currently executing on the one preempting core
    Running,
    /// Waiting for `sleep_until` to elapse
    Blocked,
    /// Slot is free for reuse
    Dead,
}

/// A task's stack, 16-byte aligned at its upper edge (the alignment the trapframe requires)
#[repr(C, align(16))]
struct Stack([u8; STACK_SIZE]);

impl Stack {
    const fn new() -> Self {
        Self([0; STACK_SIZE])
    }
}

/// A fixed-size task control block
struct Tcb {
    /// Monotonically assigned id; 0 is reserved for the adopted shell task
    id: u64,
    /// Current lifecycle state
    state: State,
    /// Short printable name
    name: heapless::String<31>,
    /// Saved stack pointer; valid whenever the task is not `Running`
    sp: usize,
    /// Absolute quantum count at which a `Blocked` task becomes eligible again
    sleep_until: u64,
    /// Pending-queue link, as an index into the pool; `None` when not queued or at the tail
    next: Option<usize>,
}

impl Tcb {
    const fn dead() -> Self {
        Self {
            id: 0,
            state: State::Dead,
            name: heapless::String::new(),
            sp: 0,
            sleep_until: 0,
            next: None,
        }
    }
}

/// All mutable scheduler state, behind one coarse lock (mutation is also always performed with
/// IRQs masked on the preempting core, per the concurrency model)
struct Pool {
    /// The fixed task-control-block pool
    tasks: [Tcb; MAX_TASKS],
    /// Backing stacks, one per pool slot
    stacks: [Stack; MAX_TASKS],
    /// Index of the currently running task, if the scheduler has been armed
    current: Option<usize>,
    /// Head of the pending (ready + blocked) queue
    pending_head: Option<usize>,
    /// Tail of the pending queue, for O(1) FIFO append
    pending_tail: Option<usize>,
    /// Next id to assign on `task_create`
    next_id: u64,
}

impl Pool {
    const fn new() -> Self {
        Self {
            tasks: [const { Tcb::dead() }; MAX_TASKS],
            stacks: [const { Stack::new() }; MAX_TASKS],
            current: None,
            pending_head: None,
            pending_tail: None,
            next_id: 1,
        }
    }

    /// Appends `idx` to the tail of the pending queue
    fn enqueue(&mut self, idx: usize) {
        self.tasks[idx].next = None;
        match self.pending_tail {
            Some(tail) => self.tasks[tail].next = Some(idx),
            None => self.pending_head = Some(idx),
        }
        self.pending_tail = Some(idx);
    }

    /// Removes `idx` from the pending queue, wherever it is; no-op if not queued
    fn unlink(&mut self, idx: usize) {
        let mut prev: Option<usize> = None;
        let mut node = self.pending_head;
        while let Some(current) = node {
            let next = self.tasks[current].next;
            if current == idx {
                match prev {
                    Some(p) => self.tasks[p].next = next,
                    None => self.pending_head = next,
                }
                if self.pending_tail == Some(idx) {
                    self.pending_tail = prev;
                }
                self.tasks[idx].next = None;
                return;
            }
            prev = Some(current);
            node = next;
        }
    }

    /// Finds the pool slot holding the given non-dead task id
    fn index_of(&self, id: u64) -> Option<usize> {
        self.tasks
            .iter()
            .position(|t| t.id == id && t.state != State::Dead)
    }
}

/// Global scheduler state
static POOL: SpinLock<Pool> = SpinLock::new(Pool::new());
/// Quantum counter, incremented on every timer firing regardless of whether a switch happens
static QUANTUM: AtomicU64 = AtomicU64::new(0);

/// Adopts the calling context as task 0 (the shell), `RUNNING`, with no saved frame yet
///
/// # Safety
/// Must be called exactly once, before interrupts are enabled
pub unsafe fn init() {
    crate::call_once!();
    let _guard = Guard::new();
    let mut pool = POOL.lock();
    pool.tasks[0] = Tcb {
        id: 0,
        state: State::Running,
        name: heapless::String::try_from("shell").unwrap_or_default(),
        sp: 0,
        sleep_until: 0,
        next: None,
    };
    pool.current = Some(0);
}

/// Builds a synthesized trapframe at the top of `stack` for a brand-new task
///
/// General registers are zero, the link register points at the exit trampoline (`task_exit`),
/// the exception-return address is `entry`, and the saved processor state selects EL1h with
/// every mask clear.
fn build_trapframe(stack: &mut Stack, entry: extern "C" fn() -> !) -> usize {
    let top = core::ptr::addr_of_mut!(stack.0) as usize + STACK_SIZE;
    let frame_addr = top - TRAPFRAME_BYTES;
    debug_assert!(frame_addr.is_multiple_of(16), "trapframe must be 16-byte aligned");
    // SAFETY: `frame_addr` lies within `stack`, is 16-byte (hence 8-byte) aligned, and is
    // exclusively owned by the caller
    let words = unsafe { core::slice::from_raw_parts_mut(frame_addr as *mut u64, TRAPFRAME_WORDS) };
    words.fill(0);
    words[LR_WORD] = task_exit as *const () as usize as u64;
    words[ELR_WORD] = entry as *const () as usize as u64;
    words[SPSR_WORD] = SPSR_EL1H_UNMASKED;
    frame_addr
}

/// Creates a new task running `entry`, named `name`, and appends it to the ready queue
///
/// Returns `None` (logging) if the pool is exhausted; never fatal.
pub fn task_create(entry: extern "C" fn() -> !, name: &str) -> Option<u64> {
    let _guard = Guard::new();
    let mut pool = POOL.lock();
    let idx = pool.tasks.iter().position(|t| t.state == State::Dead)?;
    let id = pool.next_id;
    pool.next_id += 1;

    let sp = build_trapframe(&mut pool.stacks[idx], entry);

    let mut tcb_name: heapless::String<31> = heapless::String::new();
    for c in name.chars() {
        if tcb_name.push(c).is_err() {
            break;
        }
    }

    pool.tasks[idx] = Tcb {
        id,
        state: State::Ready,
        name: tcb_name,
        sp,
        sleep_until: 0,
        next: None,
    };
    pool.enqueue(idx);
    Some(id)
}

/// The IRQ-driven scheduler dispatch: given the interrupted task's saved stack pointer, returns
/// the stack pointer of the task that should run next
///
/// Called exactly once per timer firing, from the assembly IRQ entry, with the outgoing task's
/// full trapframe already pushed onto its own stack.
pub fn schedule_irq(old_sp: usize) -> usize {
    // Already running with IRQs masked (exception entry masks them); `Guard` here is a no-op that
    // documents the invariant rather than doing any additional masking.
    let _guard = Guard::new();
    QUANTUM.fetch_add(1, Ordering::Relaxed);
    let mut pool = POOL.lock();

    let Some(cur) = pool.current else {
        return old_sp;
    };
    pool.tasks[cur].sp = old_sp;
    if pool.tasks[cur].state == State::Running {
        pool.tasks[cur].state = State::Ready;
        pool.enqueue(cur);
    }

    let now = QUANTUM.load(Ordering::Relaxed);
    let mut prev: Option<usize> = None;
    let mut node = pool.pending_head;
    let mut found = None;
    while let Some(idx) = node {
        let next = pool.tasks[idx].next;
        if pool.tasks[idx].state == State::Blocked && pool.tasks[idx].sleep_until <= now {
            pool.tasks[idx].state = State::Ready;
        }
        if pool.tasks[idx].state == State::Ready {
            match prev {
                Some(p) => pool.tasks[p].next = next,
                None => pool.pending_head = next,
            }
            if pool.pending_tail == Some(idx) {
                pool.pending_tail = prev;
            }
            pool.tasks[idx].next = None;
            found = Some(idx);
            break;
        }
        prev = node;
        node = next;
    }

    let next = found.unwrap_or(cur);
    pool.tasks[next].state = State::Running;
    pool.current = Some(next);
    pool.tasks[next].sp
}

/// Puts the current task to sleep for at least `ms` milliseconds, rounded up to whole quanta
pub fn task_sleep(ms: u64) {
    let quanta = ms.div_ceil(u64::from(crate::architecture::time::QUANTUM_MS));
    let cur = {
        let _guard = Guard::new();
        let mut pool = POOL.lock();
        let cur = pool.current.expect("task_sleep called with no current task");
        let now = QUANTUM.load(Ordering::Relaxed);
        pool.tasks[cur].sleep_until = now + quanta;
        pool.tasks[cur].state = State::Blocked;
        pool.enqueue(cur);
        cur
    };
    loop {
        aarch64_cpu::asm::wfi();
        let _guard = Guard::new();
        let pool = POOL.lock();
        if pool.current == Some(cur) && pool.tasks[cur].state == State::Running {
            return;
        }
    }
}

/// Voluntarily yields the remainder of the current quantum
///
/// A no-op: preemption already arrives at the next tick boundary regardless.
pub fn task_yield() {}

/// Marks the current task `DEAD` and parks it; the next timer IRQ schedules something else and
/// the slot becomes reusable
///
/// This is the exit trampoline every freshly created task's link register points at.
#[no_mangle]
extern "C" fn task_exit() -> ! {
    {
        let _guard = Guard::new();
        let mut pool = POOL.lock();
        let cur = pool.current.expect("task_exit called with no current task");
        pool.tasks[cur].state = State::Dead;
    }
    loop {
        aarch64_cpu::asm::wfi();
    }
}

/// Kills the task with the given id
///
/// Refuses id 0 (the shell) and refuses killing the currently running task. Returns whether a
/// live, non-current task with that id was found and killed.
pub fn task_kill(id: u64) -> bool {
    if id == 0 {
        return false;
    }
    let _guard = Guard::new();
    let mut pool = POOL.lock();
    let Some(idx) = pool.index_of(id) else {
        return false;
    };
    if pool.current == Some(idx) {
        return false;
    }
    pool.unlink(idx);
    pool.tasks[idx].state = State::Dead;
    true
}

/// One row of `ps` output: (id, name, state)
pub struct TaskInfo {
    /// Task id
    pub id: u64,
    /// Task name
    pub name: heapless::String<31>,
    /// Current lifecycle state
    pub state: State,
}

/// Snapshots every non-reused pool slot for the `ps`/`top` shell commands
pub fn snapshot(mut f: impl FnMut(TaskInfo)) {
    let _guard = Guard::new();
    let pool = POOL.lock();
    for task in &pool.tasks {
        if task.id != 0 || task.state != State::Dead {
            f(TaskInfo {
                id: task.id,
                name: task.name.clone(),
                state: task.state,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A standalone pending queue, exercised without the hardware-dependent trapframe machinery,
    /// to check FIFO ordering under synthetic enqueue/dequeue/requeue sequences
    fn fresh_pool() -> Pool {
        Pool::new()
    }

    fn mark_ready(pool: &mut Pool, idx: usize, id: u64) {
        pool.tasks[idx].id = id;
        pool.tasks[idx].state = State::Ready;
        pool.enqueue(idx);
    }

    /// Pops the next ready task the way `schedule_irq` does, without touching the quantum clock
    fn pop_ready(pool: &mut Pool) -> Option<usize> {
        let mut prev: Option<usize> = None;
        let mut node = pool.pending_head;
        while let Some(idx) = node {
            let next = pool.tasks[idx].next;
            if pool.tasks[idx].state == State::Ready {
                match prev {
                    Some(p) => pool.tasks[p].next = next,
                    None => pool.pending_head = next,
                }
                if pool.pending_tail == Some(idx) {
                    pool.pending_tail = prev;
                }
                pool.tasks[idx].next = None;
                return Some(idx);
            }
            prev = node;
            node = next;
        }
        None
    }

    #[test]
    fn ready_queue_is_strict_fifo() {
        let mut pool = fresh_pool();
        mark_ready(&mut pool, 1, 10);
        mark_ready(&mut pool, 2, 20);
        mark_ready(&mut pool, 3, 30);

        assert_eq!(pop_ready(&mut pool), Some(1));
        assert_eq!(pop_ready(&mut pool), Some(2));
        assert_eq!(pop_ready(&mut pool), Some(3));
        assert_eq!(pop_ready(&mut pool), None);
    }

    #[test]
    fn requeued_task_goes_to_the_back() {
        let mut pool = fresh_pool();
        mark_ready(&mut pool, 1, 10);
        mark_ready(&mut pool, 2, 20);

        let first = pop_ready(&mut pool).unwrap();
        // Simulate the preempted task being demoted back to READY and re-enqueued
        let first_id = pool.tasks[first].id;
        mark_ready(&mut pool, first, first_id);

        assert_eq!(pop_ready(&mut pool), Some(2));
        assert_eq!(pop_ready(&mut pool), Some(first));
    }

    #[test]
    fn unlink_removes_from_any_position() {
        let mut pool = fresh_pool();
        mark_ready(&mut pool, 1, 10);
        mark_ready(&mut pool, 2, 20);
        mark_ready(&mut pool, 3, 30);

        pool.unlink(2);

        assert_eq!(pop_ready(&mut pool), Some(1));
        assert_eq!(pop_ready(&mut pool), Some(3));
        assert_eq!(pop_ready(&mut pool), None);
    }

    #[test]
    fn blocked_task_becomes_eligible_once_deadline_passes() {
        let mut pool = fresh_pool();
        pool.tasks[1].id = 1;
        pool.tasks[1].state = State::Blocked;
        pool.tasks[1].sleep_until = 5;
        pool.enqueue(1);

        // Scan logic as `schedule_irq` performs it, at a tick before the deadline
        let now = 3;
        if pool.tasks[1].state == State::Blocked && pool.tasks[1].sleep_until <= now {
            pool.tasks[1].state = State::Ready;
        }
        assert_eq!(pop_ready(&mut pool), None);

        let now = 5;
        if pool.tasks[1].state == State::Blocked && pool.tasks[1].sleep_until <= now {
            pool.tasks[1].state = State::Ready;
        }
        assert_eq!(pop_ready(&mut pool), Some(1));
    }
}
