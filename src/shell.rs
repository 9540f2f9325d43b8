//! Interactive line-editing shell over the serial console and the in-memory filesystem
//!
//! Command dispatch is a flat match over the static command table, in the same terse,
//! macro-or-match-driven style as `kernel::print`'s macro family.

use crate::{architecture, board, fs, memory, print, println, sched};
use heapless::{String, Vec};

/// Static command table, used for both dispatch and tab completion
const COMMANDS: &[&str] = &[
    "help", "info", "time", "clear", "ps", "spawn", "kill", "top", "memtest", "mem", "alloc",
    "pgalloc", "pgfree", "history", "mmu", "ls", "cd", "pwd", "mkdir", "rmdir", "touch", "cat",
    "write", "rm",
];

/// Maximum length of one shell input line
const LINE_CAP: usize = 128;
/// Command history depth
const HISTORY_LEN: usize = 16;

/// Per-session shell state: current working directory and command history
struct Shell {
    cwd: usize,
    history: Vec<String<LINE_CAP>, HISTORY_LEN>,
}

impl Shell {
    fn new() -> Self {
        Self {
            cwd: fs::ROOT,
            history: Vec::new(),
        }
    }

    fn push_history(&mut self, line: &str) {
        if line.is_empty() {
            return;
        }
        if self.history.len() == HISTORY_LEN {
            self.history.remove(0);
        }
        let _ = self.history.push(String::try_from(line).unwrap_or_default());
    }

    fn prompt(&self) {
        let mut path = String::<256>::new();
        fs::path_of(self.cwd, &mut path);
        print!("{path} $ ");
    }
}

/// Runs the shell loop forever: print a prompt, read a line, dispatch, repeat
///
/// Never returns; this is the body of task 0.
pub fn run() -> ! {
    let mut shell = Shell::new();
    let serial = board::serial();
    loop {
        shell.prompt();
        let mut line = String::<LINE_CAP>::new();
        crate::kernel::serial::read_line(serial, &mut line, &shell.history, |prefix| {
            let mut matches = complete(prefix);
            let first = matches.next()?;
            if matches.next().is_none() {
                Some(first)
            } else {
                None
            }
        });
        shell.push_history(&line);
        dispatch(&mut shell, &line);
    }
}

/// Splits a line into whitespace-separated words and dispatches the first as a command
fn dispatch(shell: &mut Shell, line: &str) {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return;
    };
    let rest: Vec<&str, 4> = words.collect();

    match command {
        "help" => cmd_help(),
        "info" => cmd_info(),
        "time" => cmd_time(),
        "clear" => print!("\u{1B}[2J\u{1B}[H"),
        "ps" => cmd_ps(),
        "spawn" => cmd_spawn(),
        "kill" => cmd_kill(rest.first().copied()),
        "top" => cmd_ps(),
        "memtest" => cmd_memtest(),
        "mem" => cmd_mem(),
        "alloc" => cmd_alloc(rest.first().copied()),
        "pgalloc" => cmd_pgalloc(),
        "pgfree" => cmd_pgfree(rest.first().copied()),
        "history" => cmd_history(shell),
        "mmu" => cmd_mmu(),
        "ls" => cmd_ls(shell, rest.first().copied()),
        "cd" => cmd_cd(shell, rest.first().copied()),
        "pwd" => shell.prompt_path(),
        "mkdir" => cmd_mkdir(shell, rest.first().copied()),
        "rmdir" => cmd_rmdir(shell, rest.first().copied()),
        "touch" => cmd_touch(shell, rest.first().copied()),
        "cat" => cmd_cat(shell, rest.first().copied()),
        "write" => cmd_write(shell, rest.first().copied()),
        "rm" => cmd_rm(shell, rest.first().copied()),
        "" => {}
        other => println!("Unknown command: {other}"),
    }
}

impl Shell {
    fn prompt_path(&self) {
        let mut path = String::<256>::new();
        fs::path_of(self.cwd, &mut path);
        println!("{path}");
    }
}

fn cmd_help() {
    println!("Commands:");
    for command in COMMANDS {
        println!("  {command}");
    }
}

fn cmd_info() {
    architecture::CONFIG.log();
}

fn cmd_time() {
    let now = crate::kernel::time::now();
    println!("{}.{:03}s", now.as_secs(), now.subsec_millis());
}

fn cmd_ps() {
    println!("ID  STATE    NAME");
    sched::snapshot(|task| {
        let state = match task.state {
            sched::State::Ready => "READY",
            sched::State::Running => "RUNNING",
            sched::State::Blocked => "BLOCKED",
            sched::State::Dead => "DEAD",
        };
        println!("{:<3} {:<8} {}", task.id, state, task.name);
    });
}

/// Runs for the `counter` demo task: counts 1..5 then exits
extern "C" fn counter_task() -> ! {
    for i in 1..=5 {
        println!("[counter] {i}/5");
        sched::task_sleep(500);
    }
    println!("[counter] finished");
    sched::task_yield();
    // The exit trampoline (set up when this task was created) takes over from here.
    loop {
        aarch64_cpu::asm::wfi();
    }
}

/// Runs for the `spinner` demo task: cycles a spinner glyph forever until killed
extern "C" fn spinner_task() -> ! {
    const GLYPHS: [char; 4] = ['|', '/', '-', '\\'];
    let mut i = 0;
    loop {
        println!("[spinner] {}", GLYPHS[i % GLYPHS.len()]);
        i += 1;
        sched::task_sleep(500);
    }
}

fn cmd_spawn() {
    println!("Spawning 'counter' and 'spinner'...");
    if sched::task_create(counter_task, "counter").is_none() {
        println!("Failed to spawn 'counter': task pool full");
    }
    if sched::task_create(spinner_task, "spinner").is_none() {
        println!("Failed to spawn 'spinner': task pool full");
    }
}

fn cmd_kill(id: Option<&str>) {
    let Some(id) = id.and_then(|s| s.parse::<u64>().ok()) else {
        println!("usage: kill <id>");
        return;
    };
    if id == 0 {
        println!("Cannot kill the shell (task 0)");
        return;
    }
    if sched::task_kill(id) {
        println!("Killed task {id}");
    } else {
        println!("No such task: {id}");
    }
}

fn cmd_memtest() {
    let ptr = unsafe { alloc::alloc::alloc(core::alloc::Layout::new::<[u8; 64]>()) };
    if ptr.is_null() {
        println!("memtest: allocation failed");
        return;
    }
    unsafe {
        core::ptr::write_bytes(ptr, 0xAA, 64);
        alloc::alloc::dealloc(ptr, core::alloc::Layout::new::<[u8; 64]>());
    }
    println!("memtest: ok");
}

fn cmd_mem() {
    let (total, free, used) = memory::page_alloc::stats();
    let (arena, arena_used) = memory::heap::stats();
    println!("Pages: {used}/{total} used ({free} free)");
    println!("Heap arena: {arena_used}/{arena} bytes used");
}

fn cmd_alloc(count: Option<&str>) {
    let Some(n) = count.and_then(|s| s.parse::<usize>().ok()) else {
        println!("usage: alloc <n>");
        return;
    };
    let layout = match core::alloc::Layout::array::<u8>(n) {
        Ok(l) => l,
        Err(_) => {
            println!("alloc: invalid size");
            return;
        }
    };
    let ptr = unsafe { alloc::alloc::alloc(layout) };
    if ptr.is_null() {
        println!("alloc: failed");
    } else {
        println!("alloc: got 0x{:x}", ptr as usize);
        unsafe { alloc::alloc::dealloc(ptr, layout) };
    }
}

fn cmd_pgalloc() {
    match memory::page_alloc::page_alloc_n(1) {
        Some(addr) => println!("Page at 0x{addr:012x}"),
        None => println!("pgalloc: out of memory"),
    }
}

fn cmd_pgfree(addr: Option<&str>) {
    let Some(addr) = addr.and_then(|s| usize::from_str_radix(s.trim_start_matches("0x"), 16).ok())
    else {
        println!("usage: pgfree <hex address>");
        return;
    };
    memory::page_alloc::page_free_n(addr, 1);
}

fn cmd_history(shell: &Shell) {
    for line in &shell.history {
        println!("{line}");
    }
}

fn cmd_mmu() {
    use aarch64_cpu::registers::SCTLR_EL1;
    use tock_registers::interfaces::Readable;
    println!(
        "MMU: {} | D-cache: {} | I-cache: {}",
        if SCTLR_EL1.matches_all(SCTLR_EL1::M::Enable) { "on" } else { "off" },
        if SCTLR_EL1.matches_all(SCTLR_EL1::C::Cacheable) { "on" } else { "off" },
        if SCTLR_EL1.matches_all(SCTLR_EL1::I::Cacheable) { "on" } else { "off" },
    );
}

fn cmd_ls(shell: &Shell, path: Option<&str>) {
    let path = path.unwrap_or(".");
    if let Err(error) = fs::ls(shell.cwd, path, |name, is_dir| {
        if is_dir {
            println!("{name}/");
        } else {
            println!("{name}");
        }
    }) {
        println!("ls: {error}: {path}");
    }
}

fn cmd_cd(shell: &mut Shell, path: Option<&str>) {
    let path = path.unwrap_or("/");
    match fs::resolve(shell.cwd, path) {
        Some(idx) => shell.cwd = idx,
        None => println!("cd: not found: {path}"),
    }
}

fn cmd_mkdir(shell: &Shell, path: Option<&str>) {
    let Some(path) = path else {
        println!("usage: mkdir <path>");
        return;
    };
    if let Err(error) = fs::mkdir(shell.cwd, path) {
        println!("mkdir: {error}: {path}");
    }
}

fn cmd_rmdir(shell: &Shell, path: Option<&str>) {
    let Some(path) = path else {
        println!("usage: rmdir <path>");
        return;
    };
    if let Err(error) = fs::rmdir(shell.cwd, path) {
        println!("rmdir: {error}: {path}");
    }
}

fn cmd_touch(shell: &Shell, path: Option<&str>) {
    let Some(path) = path else {
        println!("usage: touch <path>");
        return;
    };
    if let Err(error) = fs::touch(shell.cwd, path) {
        println!("touch: {error}: {path}");
    }
}

fn cmd_cat(shell: &Shell, path: Option<&str>) {
    let Some(path) = path else {
        println!("usage: cat <path>");
        return;
    };
    let mut buf = [0_u8; fs::MAX_FILE_SIZE];
    match fs::read(shell.cwd, path, &mut buf) {
        Ok(len) => match core::str::from_utf8(&buf[..len]) {
            Ok(text) => print!("{text}"),
            Err(_) => println!("cat: {path}: binary content"),
        },
        Err(_) => println!("cat: not found: {path}"),
    }
}

/// Reads lines from the console until an empty line, concatenating them with `\n`, for `write`
fn cmd_write(shell: &Shell, path: Option<&str>) {
    let Some(path) = path else {
        println!("usage: write <path>");
        return;
    };
    let serial = board::serial();
    let mut content: String<{ fs::MAX_FILE_SIZE }> = String::new();
    loop {
        let mut line = String::<LINE_CAP>::new();
        crate::kernel::serial::read_line(serial, &mut line, &[], |_| None);
        if line.is_empty() {
            break;
        }
        let _ = content.push_str(&line);
        let _ = content.push('\n');
    }
    if let Err(error) = fs::write(shell.cwd, path, content.as_bytes()) {
        println!("write: {error}: {path}");
    }
}

fn cmd_rm(shell: &Shell, path: Option<&str>) {
    let Some(path) = path else {
        println!("usage: rm <path>");
        return;
    };
    if let Err(error) = fs::rm(shell.cwd, path) {
        println!("rm: {error}: {path}");
    }
}

/// Finds command-table entries with the given prefix, for tab completion
fn complete(prefix: &str) -> impl Iterator<Item = &'static str> + use<'_> {
    COMMANDS.iter().copied().filter(move |c| c.starts_with(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_is_a_bounded_ring_buffer() {
        let mut shell = Shell::new();
        for i in 0..(HISTORY_LEN + 3) {
            let mut line: String<LINE_CAP> = String::new();
            let _ = core::fmt::write(&mut line, format_args!("cmd{i}"));
            shell.push_history(&line);
        }
        assert_eq!(shell.history.len(), HISTORY_LEN);
        assert_eq!(shell.history[0].as_str(), "cmd3");
        assert_eq!(shell.history.last().unwrap().as_str(), "cmd18");
    }

    #[test]
    fn empty_lines_are_not_recorded() {
        let mut shell = Shell::new();
        shell.push_history("");
        assert!(shell.history.is_empty());
    }

    #[test]
    fn tab_completion_matches_prefix() {
        let matches: alloc::vec::Vec<_> = complete("p").collect();
        assert_eq!(matches, alloc::vec!["ps", "pgalloc", "pgfree", "pwd"]);
    }

    #[test]
    fn tab_completion_no_match_is_empty() {
        assert_eq!(complete("zzz").count(), 0);
    }
}
