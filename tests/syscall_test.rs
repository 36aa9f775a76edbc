/*!
 * Syscall Tests
 * Dispatcher, pointer validation and the file, console and system calls
 */

mod common;

use common::{boot, boot_with, wait_until, DATA_OFFSET};
use pretty_assertions::assert_eq;
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;
use userprog_kernel::core::limits::PHYS_BASE;
use userprog_kernel::loader::STACK_PAGE;
use userprog_kernel::{KernelConfig, SyscallNumber, Trap, UserContext};

type Body = fn(&mut UserContext<'_>) -> Result<i32, Trap>;

/// Entry point clear of the sequentially installed programs
const HOLE_ENTRY: u32 = 0x0900_0000;

#[test]
fn test_console_write() {
    let tk = boot();
    tk.install("hello", |ctx| {
        let written = ctx.print("hello, world\n")?;
        Ok(written)
    });

    assert_eq!(tk.kernel.run("hello"), 13);
    tk.settle();
    assert_eq!(tk.lines(), vec!["hello, world", "hello: exit(13)"]);
}

#[test]
fn test_file_roundtrip() {
    let tk = boot();
    tk.install("files", |ctx| {
        assert!(ctx.sys_create("data", 16)?);
        assert!(!ctx.sys_create("data", 16)?);

        let fd = ctx.sys_open("data")?;
        assert_eq!(fd, 2);
        assert_eq!(ctx.sys_filesize(fd)?, 16);

        let src = ctx.push_bytes(b"0123456789")?;
        assert_eq!(ctx.sys_write(fd, src, 10)?, 10);
        assert_eq!(ctx.sys_tell(fd)?, 10);

        ctx.sys_seek(fd, 0)?;
        let dst = ctx.alloca(10)?;
        assert_eq!(ctx.sys_read(fd, dst, 10)?, 10);
        let mut back = [0u8; 10];
        ctx.read(dst, &mut back)?;
        assert_eq!(&back, b"0123456789");

        // Files do not grow
        ctx.sys_seek(fd, 12)?;
        assert_eq!(ctx.sys_write(fd, src, 10)?, 4);
        assert_eq!(ctx.sys_read(fd, dst, 10)?, 0);

        ctx.sys_close(fd)?;
        assert_eq!(ctx.sys_tell(fd)?, -1);
        Ok(0)
    });

    assert_eq!(tk.kernel.run("files"), 0);
    assert_eq!(tk.fs.contents("data").unwrap(), b"0123456789\0\x000123".to_vec());
}

#[test]
fn test_descriptor_ids_not_reused() {
    let tk = boot();
    tk.fs.install("f", b"abc").unwrap();
    tk.install("fds", |ctx| {
        let a = ctx.sys_open("f")?;
        let b = ctx.sys_open("f")?;
        ctx.sys_close(a)?;
        let c = ctx.sys_open("f")?;
        Ok(a * 100 + b * 10 + c)
    });

    assert_eq!(tk.kernel.run("fds"), 234);
}

#[test]
fn test_open_capacity() {
    let tk = boot_with(KernelConfig::default().without_ticker().with_max_open_files(5));
    tk.fs.install("f", b"abc").unwrap();
    tk.install("hog", |ctx| {
        for expected in 2..5 {
            assert_eq!(ctx.sys_open("f")?, expected);
        }
        assert_eq!(ctx.sys_open("f")?, -1);

        // A full table fails before the path is examined
        assert_eq!(ctx.syscall(SyscallNumber::Open.raw(), &[0])?, -1);
        Ok(0)
    });

    assert_eq!(tk.kernel.run("hog"), 0);
}

#[test]
fn test_open_missing_and_remove() {
    let tk = boot();
    tk.fs.install("gone", b"x").unwrap();
    tk.install("rm", |ctx| {
        let fd = ctx.sys_open("gone")?;
        assert!(ctx.sys_remove("gone")?);
        assert!(!ctx.sys_remove("gone")?);
        assert_eq!(ctx.sys_open("gone")?, -1);
        // Still readable through the open handle
        assert_eq!(ctx.sys_filesize(fd)?, 1);
        Ok(0)
    });

    assert_eq!(tk.kernel.run("rm"), 0);
}

#[test]
fn test_close_is_lenient() {
    let tk = boot();
    tk.install("closer", |ctx| {
        ctx.sys_close(0)?;
        ctx.sys_close(1)?;
        ctx.sys_close(77)?;
        ctx.sys_close(-5)?;
        ctx.print("still here\n")?;
        Ok(0)
    });

    assert_eq!(tk.kernel.run("closer"), 0);
    assert!(tk.output().contains("still here"));
}

#[test]
fn test_seek_past_end_is_ignored() {
    let tk = boot();
    tk.fs.install("short", b"abcd").unwrap();
    tk.install("seeker", |ctx| {
        let fd = ctx.sys_open("short")?;
        ctx.sys_seek(fd, 2)?;
        ctx.sys_seek(fd, 100)?;
        assert_eq!(ctx.sys_tell(fd)?, 2);
        ctx.sys_seek(fd, 4)?;
        assert_eq!(ctx.sys_tell(fd)?, 4);
        // Unknown descriptor: nothing happens
        ctx.sys_seek(40, 1)?;
        Ok(0)
    });

    assert_eq!(tk.kernel.run("seeker"), 0);
}

#[test]
fn test_invalid_descriptors() {
    let tk = boot();
    tk.install("badfd", |ctx| {
        let buf = ctx.alloca(8)?;
        assert_eq!(ctx.sys_read(1, buf, 8)?, -1);
        assert_eq!(ctx.sys_read(9, buf, 8)?, -1);
        assert_eq!(ctx.sys_write(0, buf, 8)?, -1);
        assert_eq!(ctx.sys_write(9, buf, 8)?, -1);
        assert_eq!(ctx.sys_filesize(0)?, -1);
        assert_eq!(ctx.sys_filesize(9)?, -1);
        assert_eq!(ctx.sys_tell(1)?, -1);
        Ok(0)
    });

    assert_eq!(tk.kernel.run("badfd"), 0);
}

#[test]
fn test_console_read_echoes() {
    let tk = boot();
    tk.console.push_input(b"hi!");
    tk.install("reader", |ctx| {
        let buf = ctx.alloca(4)?;
        assert_eq!(ctx.sys_read(0, buf, 3)?, 3);
        let mut got = [0u8; 3];
        ctx.read(buf, &mut got)?;
        Ok(i32::from(&got == b"hi!"))
    });

    assert_eq!(tk.kernel.run("reader"), 1);
    assert!(tk.output().starts_with("hi!"));
}

#[test]
fn test_bad_pointers_kill_only_the_caller() {
    let tk = boot();
    let (tx, rx) = mpsc::channel::<()>();
    let gate = Arc::new(Mutex::new(rx));
    tk.install("sibling", move |ctx| {
        gate.lock().unwrap().recv().unwrap();
        ctx.print("sibling done\n")?;
        Ok(0)
    });

    let cases: [(&str, Body); 6] = [
        ("null", |ctx| ctx.sys_write(1, 0, 4)),
        ("kernel", |ctx| ctx.sys_write(1, PHYS_BASE, 4)),
        // Starts in the stack page, ends below it
        ("straddle", |ctx| ctx.sys_write(1, STACK_PAGE - 2, 4)),
        ("readinto", |ctx| ctx.sys_read(0, 0x2000_0000, 1)),
        ("badname", |ctx| ctx.syscall(SyscallNumber::Create.raw(), &[0x1234, 0])),
        ("badexec", |ctx| ctx.syscall(SyscallNumber::Exec.raw(), &[PHYS_BASE + 8])),
    ];
    let mut names = Vec::new();
    for (name, body) in cases {
        tk.install(name, body);
        names.push(name);
    }

    // Both ends of the buffer are mapped (code page, data page) while the
    // pages between them are not
    let holes: [(&str, u32, Body); 2] = [
        ("holewrite", HOLE_ENTRY, |ctx| {
            ctx.sys_write(1, HOLE_ENTRY, DATA_OFFSET + 4)
        }),
        ("holeread", HOLE_ENTRY + 0x1000, |ctx| {
            ctx.sys_read(0, HOLE_ENTRY + 0x1000, DATA_OFFSET + 4)
        }),
    ];
    for (name, entry, body) in holes {
        tk.install_at(name, entry, body);
        names.push(name);
    }

    let mut init = tk.kernel.kernel_process();
    let sibling = tk.kernel.launch(&mut init, "sibling");
    for name in &names {
        assert_eq!(tk.kernel.run(name), -1, "{name}");
        assert!(tk.kernel.is_alive(sibling));
    }

    tx.send(()).unwrap();
    assert_eq!(tk.kernel.wait(&mut init, sibling), 0);
    tk.settle();

    let lines = tk.lines();
    for name in &names {
        assert!(lines.contains(&format!("{name}: exit(-1)")), "{name}");
    }
    assert!(lines.contains(&"sibling done".to_string()));
}

#[test]
fn test_unknown_syscall_kills() {
    let tk = boot();
    tk.install("unknown", |ctx| ctx.syscall(99, &[]));
    assert_eq!(tk.kernel.run("unknown"), -1);
}

#[test]
fn test_bad_stack_pointer_kills() {
    let tk = boot();
    tk.install("nullsp", |ctx| ctx.syscall_with_esp(0));
    tk.install("kernsp", |ctx| ctx.syscall_with_esp(PHYS_BASE));
    tk.install("edgesp", |ctx| {
        // Number fits at the top of the stack, its arguments would not
        let esp = PHYS_BASE - 4;
        ctx.write(esp, &SyscallNumber::Write.raw().to_le_bytes())?;
        ctx.syscall_with_esp(esp)
    });

    assert_eq!(tk.kernel.run("nullsp"), -1);
    assert_eq!(tk.kernel.run("kernsp"), -1);
    assert_eq!(tk.kernel.run("edgesp"), -1);
}

#[test]
fn test_exit_through_raw_trap() {
    let tk = boot();
    tk.install("raw", |ctx| {
        let esp = ctx.push_bytes(&[1, 0, 0, 0, 17, 0, 0, 0])?;
        ctx.syscall_with_esp(esp)?;
        Ok(0)
    });

    assert_eq!(tk.kernel.run("raw"), 17);
}

#[test]
fn test_user_store_to_code_faults() {
    let tk = boot();
    tk.install("scribble", |ctx| {
        ctx.write(common::CODE_BASE, b"x")?;
        Ok(0)
    });

    assert_eq!(tk.kernel.run("scribble"), -1);
}

#[test]
fn test_halt() {
    let tk = boot();
    tk.install("off", |ctx| {
        ctx.sys_halt()?;
        Ok(0)
    });

    assert_eq!(tk.kernel.run("off"), -1);
    assert!(tk.kernel.is_halted());
    assert!(tk.kernel.wait_for_halt(Duration::from_millis(10)));
    tk.settle();
    assert!(!tk.output().contains("off: exit"));

    // Nothing starts once the machine is off
    assert_eq!(tk.kernel.run("off"), -1);
}

#[test]
fn test_sleep_advances_ticks() {
    let config = KernelConfig {
        timer_freq: 1000,
        ..KernelConfig::default()
    };
    let tk = boot_with(config);
    tk.install("nap", |ctx| {
        ctx.sys_sleep(30)?;
        Ok(0)
    });

    let before = tk.kernel.timer().ticks();
    assert_eq!(tk.kernel.run("nap"), 0);
    assert!(tk.kernel.timer().ticks() - before >= 30);
    tk.kernel.shutdown();
}

#[test]
fn test_sleep_with_manual_ticks() {
    let tk = boot();
    tk.install("nap", |ctx| {
        ctx.sys_sleep(50)?;
        Ok(0)
    });

    let mut init = tk.kernel.kernel_process();
    let pid = tk.kernel.launch(&mut init, "nap");
    wait_until(|| tk.kernel.timer().sleeper_count() == 1);
    // 50ms at 100Hz is five ticks
    for _ in 0..5 {
        tk.kernel.timer().tick();
    }
    assert_eq!(tk.kernel.wait(&mut init, pid), 0);
}

#[test]
fn test_halt_releases_sleeping_processes() {
    let tk = boot();
    tk.install("nap", |ctx| {
        ctx.sys_sleep(60_000)?;
        Ok(4)
    });

    let mut init = tk.kernel.kernel_process();
    let first = tk.kernel.launch(&mut init, "nap");
    let second = tk.kernel.launch(&mut init, "nap");
    wait_until(|| tk.kernel.timer().sleeper_count() == 2);

    // No tick ever arrives; only the power off lets them go
    tk.kernel.halt();
    assert_eq!(tk.kernel.wait(&mut init, first), 4);
    assert_eq!(tk.kernel.wait(&mut init, second), 4);
    assert_eq!(tk.kernel.timer().sleeper_count(), 0);
    tk.kernel.shutdown();
    tk.settle();
    assert_eq!(tk.kernel.pool().in_use(), 0);
}
