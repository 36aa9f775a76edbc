/*!
 * Launch Tests
 * exec/wait/exit rendezvous, failed loads and resource reclamation
 */

mod common;

use common::{boot, boot_with, wait_until};
use pretty_assertions::assert_eq;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use userprog_kernel::loader::{ProgramHeader, SegmentType};
use userprog_kernel::{ImageBuilder, KernelConfig, ProcessState, SegmentFlags, PID_ERROR};

/// Receiver usable from a `Fn + Sync` program body
fn gate() -> (mpsc::Sender<()>, Arc<Mutex<mpsc::Receiver<()>>>) {
    let (tx, rx) = mpsc::channel();
    (tx, Arc::new(Mutex::new(rx)))
}

#[test]
fn test_run_returns_exit_status() {
    let tk = boot();
    tk.install("seven", |_| Ok(7));

    assert_eq!(tk.kernel.run("seven"), 7);
    tk.settle();
    assert_eq!(tk.lines(), vec!["seven: exit(7)"]);
}

#[test]
fn test_command_line_stops_at_nul() {
    let tk = boot();
    tk.install("p", |ctx| Ok(ctx.args()?.len() as i32));

    assert_eq!(tk.kernel.run("p\0x"), 1);
    assert_eq!(tk.kernel.run("\0p"), PID_ERROR);
    tk.settle();
    assert_eq!(tk.lines(), vec!["p: exit(1)"]);
    assert_eq!(tk.kernel.pool().in_use(), 0);
}

#[test]
fn test_exit_syscall_status() {
    let tk = boot();
    tk.install("quit", |ctx| {
        ctx.sys_exit(42)?;
        Ok(0)
    });

    assert_eq!(tk.kernel.run("quit"), 42);
    tk.settle();
    assert_eq!(tk.lines(), vec!["quit: exit(42)"]);
}

#[test]
fn test_child_exits_before_wait() {
    let tk = boot();
    tk.install("child", |_| Ok(3));

    let mut parent = tk.kernel.kernel_process();
    let pid = tk.kernel.launch(&mut parent, "child");
    assert!(pid > 0);

    // Child is fully gone before anyone waits
    wait_until(|| !tk.kernel.is_alive(pid));
    assert_eq!(tk.kernel.wait(&mut parent, pid), 3);
}

#[test]
fn test_parent_waits_before_child_exits() {
    let tk = boot();
    let (open, gate) = gate();
    tk.install("child", move |_| {
        gate.lock().unwrap().recv().unwrap();
        Ok(11)
    });
    tk.install("parent", |ctx| {
        let child = ctx.sys_exec("child")?;
        ctx.sys_wait(child)
    });

    let mut init = tk.kernel.kernel_process();
    let parent = tk.kernel.launch(&mut init, "parent");
    assert!(parent > 0);

    // Parent is blocked in wait before the child may finish
    wait_until(|| {
        tk.kernel
            .process_info(parent)
            .is_some_and(|info| info.state == ProcessState::Waiting)
    });
    open.send(()).unwrap();

    assert_eq!(tk.kernel.wait(&mut init, parent), 11);
    tk.settle();
    assert_eq!(tk.lines(), vec!["child: exit(11)", "parent: exit(11)"]);
}

#[test]
fn test_second_wait_fails() {
    let tk = boot();
    tk.install("child", |_| Ok(5));

    let mut parent = tk.kernel.kernel_process();
    let pid = tk.kernel.launch(&mut parent, "child");
    assert_eq!(tk.kernel.wait(&mut parent, pid), 5);
    assert_eq!(tk.kernel.wait(&mut parent, pid), -1);
}

#[test]
fn test_waited_children_are_forgotten() {
    let tk = boot();
    tk.install("child", |_| Ok(5));

    let mut parent = tk.kernel.kernel_process();
    let first = tk.kernel.launch(&mut parent, "child");
    let second = tk.kernel.launch(&mut parent, "child");
    assert_eq!(parent.children.len(), 2);

    assert_eq!(tk.kernel.wait(&mut parent, first), 5);
    assert_eq!(parent.children.len(), 1);
    assert!(parent.child(first).is_none());

    wait_until(|| !tk.kernel.is_alive(second));
    assert_eq!(tk.kernel.wait(&mut parent, second), 5);
    assert!(parent.children.is_empty());
    assert_eq!(tk.kernel.wait(&mut parent, second), -1);
}

#[test]
fn test_shell_loop_keeps_no_records() {
    let tk = boot();
    tk.install("child", |_| Ok(1));
    tk.install("shell", |ctx| {
        let mut total = 0;
        for _ in 0..20 {
            let child = ctx.sys_exec("child")?;
            total += ctx.sys_wait(child)?;
        }
        Ok(total)
    });

    let mut init = tk.kernel.kernel_process();
    let shell = tk.kernel.launch(&mut init, "shell");
    assert_eq!(tk.kernel.wait(&mut init, shell), 20);
    assert!(init.children.is_empty());
    tk.settle();
    assert_eq!(tk.kernel.pool().in_use(), 0);
}

#[test]
fn test_wait_on_unknown_child() {
    let tk = boot();
    tk.install("child", |_| Ok(0));
    let mut parent = tk.kernel.kernel_process();
    let mut stranger = tk.kernel.kernel_process();

    assert_eq!(tk.kernel.wait(&mut parent, PID_ERROR), -1);
    assert_eq!(tk.kernel.wait(&mut parent, 999), -1);

    // Only the launching process may wait
    let pid = tk.kernel.launch(&mut parent, "child");
    assert_eq!(tk.kernel.wait(&mut stranger, pid), -1);
    assert_eq!(tk.kernel.wait(&mut parent, pid), 0);
}

#[test]
fn test_wait_from_user_program() {
    let tk = boot();
    tk.install("child", |ctx| {
        let args = ctx.args()?;
        Ok(args[1].parse().unwrap_or(-2))
    });
    tk.install("parent", |ctx| {
        let first = ctx.sys_exec("child 4")?;
        let second = ctx.sys_exec("child 6")?;
        let total = ctx.sys_wait(first)? + ctx.sys_wait(second)?;
        let again = ctx.sys_wait(first)?;
        let bogus = ctx.sys_wait(12345)?;
        Ok(total * 100 + (again + 1) * 10 + (bogus + 1))
    });

    assert_eq!(tk.kernel.run("parent"), 1000);
}

#[test]
fn test_malformed_images_fail_launch() {
    let tk = boot();
    let entry = common::CODE_BASE;
    let rx = SegmentFlags::READ | SegmentFlags::EXECUTE;
    let code = || ImageBuilder::new(entry).segment(entry, vec![0xc3], rx);

    let cases = vec![
        ("badmagic", code().with_header(|h| h.ident[1] = b'X').build()),
        ("manysegs", code().with_header(|h| h.phnum = 1025).build()),
        ("machine", code().with_header(|h| h.machine = 62).build()),
        (
            "dynamic",
            code()
                .program_header(ProgramHeader::of_type(SegmentType::Dynamic))
                .build(),
        ),
        (
            "interp",
            code()
                .program_header(ProgramHeader::of_type(SegmentType::Interp))
                .build(),
        ),
        (
            "pagezero",
            ImageBuilder::new(0x100).segment(0x100, vec![0xc3], rx).build(),
        ),
        ("truncated", code().build()[..20].to_vec()),
    ];

    for (name, image) in &cases {
        tk.fs.install(name, image).unwrap();
        tk.kernel.programs().register(entry, |_| Ok(0));
        assert_eq!(tk.kernel.run(name), -1, "{name}");
        assert_eq!(tk.kernel.process_count(), 0, "{name}");
        assert_eq!(tk.kernel.pool().in_use(), 0, "{name}");
    }

    assert_eq!(tk.kernel.run("missing"), -1);
    assert_eq!(tk.kernel.run(""), -1);
    assert_eq!(tk.kernel.run("    "), -1);
    assert_eq!(tk.lines(), vec!["load: missing: open failed"]);
}

#[test]
fn test_arguments_reach_user_stack() {
    let tk = boot();
    let seen = Arc::new(Mutex::new(Vec::new()));
    {
        let seen = Arc::clone(&seen);
        tk.install("args", move |ctx| {
            assert_eq!(ctx.esp() % 4, 0);
            *seen.lock().unwrap() = ctx.args()?;
            Ok(0)
        });
    }

    assert_eq!(tk.kernel.run("  args  a bb   ccc "), 0);
    assert_eq!(*seen.lock().unwrap(), vec!["args", "a", "bb", "ccc"]);
}

#[test]
fn test_excess_arguments_dropped() {
    let tk = boot_with(KernelConfig::default().without_ticker().with_max_args(3));
    let count = Arc::new(Mutex::new(0usize));
    {
        let count = Arc::clone(&count);
        tk.install("many", move |ctx| {
            *count.lock().unwrap() = ctx.args()?.len();
            Ok(0)
        });
    }

    assert_eq!(tk.kernel.run("many 1 2 3 4 5"), 0);
    assert_eq!(*count.lock().unwrap(), 3);
}

#[test]
fn test_oversized_arguments_fail_launch() {
    let tk = boot();
    tk.install("prog", |_| Ok(0));
    // 32 tokens filling the command line: strings plus pointers exceed a page
    let arg = "x".repeat(130);
    let long = format!("prog{}", format!(" {arg}").repeat(31));
    assert!(long.len() < 4096);
    assert_eq!(tk.kernel.run(&long), -1);
    assert_eq!(tk.kernel.pool().in_use(), 0);
}

#[test]
fn test_pool_exhaustion_fails_without_leaks() {
    // Directory, code, data and stack need four frames
    let tk = boot_with(KernelConfig::default().without_ticker().with_user_pool_pages(3));
    tk.install("prog", |_| Ok(0));

    assert_eq!(tk.kernel.run("prog"), -1);
    assert_eq!(tk.kernel.pool().in_use(), 0);
    assert_eq!(tk.kernel.process_count(), 0);
}

#[test]
fn test_frames_return_after_exit() {
    let tk = boot_with(KernelConfig::default().without_ticker().with_user_pool_pages(8));
    tk.install("prog", |ctx| {
        ctx.alloca(64)?;
        Ok(0)
    });

    for _ in 0..10 {
        assert_eq!(tk.kernel.run("prog"), 0);
        tk.settle();
        assert_eq!(tk.kernel.pool().in_use(), 0);
    }
}

#[test]
fn test_image_without_code_is_killed() {
    let tk = boot();
    tk.fs.install("ghost", &common::image(0x0805_0000)).unwrap();

    assert_eq!(tk.kernel.run("ghost"), -1);
    tk.settle();
    assert_eq!(tk.lines(), vec!["ghost: exit(-1)"]);
}

#[test]
fn test_panicking_program_is_killed() {
    let tk = boot();
    tk.install("crash", |_| panic!("user fault"));

    assert_eq!(tk.kernel.run("crash"), -1);
    tk.settle();
    assert_eq!(tk.lines(), vec!["crash: exit(-1)"]);
}

#[test]
fn test_orphan_finishes_after_parent() {
    let tk = boot();
    let (open, gate) = gate();
    tk.install("child", move |_| {
        gate.lock().unwrap().recv().unwrap();
        Ok(9)
    });
    tk.install("parent", |ctx| {
        let child = ctx.sys_exec("child")?;
        Ok(if child > 0 { 0 } else { 1 })
    });

    assert_eq!(tk.kernel.run("parent"), 0);
    wait_until(|| tk.kernel.process_count() == 1);
    open.send(()).unwrap();
    tk.settle();

    assert_eq!(tk.kernel.pool().in_use(), 0);
    assert_eq!(tk.lines(), vec!["parent: exit(0)", "child: exit(9)"]);
}

#[test]
fn test_process_table_tracks_running_processes() {
    let tk = boot();
    let (open, gate) = gate();
    tk.install("idle", move |_| {
        gate.lock().unwrap().recv().unwrap();
        Ok(0)
    });

    let mut init = tk.kernel.kernel_process();
    let pid = tk.kernel.launch(&mut init, "idle arg");
    let info = tk.kernel.process_info(pid).unwrap();
    assert_eq!(info.name, "idle");
    assert_eq!(info.parent, init.pid);
    assert_eq!(info.state, ProcessState::Running);
    assert_eq!(tk.kernel.processes().len(), 1);

    open.send(()).unwrap();
    assert_eq!(tk.kernel.wait(&mut init, pid), 0);
    tk.settle();
    assert!(!tk.kernel.is_alive(pid));
}

#[test]
fn test_concurrent_launches() {
    let tk = Arc::new(boot());
    tk.install("worker", |ctx| {
        let args = ctx.args()?;
        Ok(args[1].parse().unwrap_or(-2))
    });

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let tk = Arc::clone(&tk);
            std::thread::spawn(move || tk.kernel.run(&format!("worker {i}")))
        })
        .collect();

    let statuses: Vec<i32> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(statuses, (0..8).collect::<Vec<_>>());
    tk.settle();
    assert_eq!(tk.kernel.pool().in_use(), 0);
}
