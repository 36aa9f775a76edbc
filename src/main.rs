/*!
 * Kernel - Main Entry Point
 *
 * Boots a kernel on the host console, installs a few demo programs and runs
 * the command line given as arguments (default: `echo hello kernel`).
 */

use miette::{IntoDiagnostic, Result};
use std::sync::Arc;
use tracing::info;
use userprog_kernel::{
    init_tracing, ImageBuilder, Kernel, KernelConfig, MemFs, SegmentFlags, StdConsole, Trap,
    UserContext,
};

const ECHO_ENTRY: u32 = 0x0804_8000;
const CAT_ENTRY: u32 = 0x0804_9000;
const EXIT_ENTRY: u32 = 0x0804_a000;

fn echo(ctx: &mut UserContext<'_>) -> Result<i32, Trap> {
    let args = ctx.args()?;
    let line = format!("{}\n", args.get(1..).unwrap_or_default().join(" "));
    ctx.print(&line)?;
    Ok(0)
}

fn cat(ctx: &mut UserContext<'_>) -> Result<i32, Trap> {
    let args = ctx.args()?;
    let mut status = 0;
    for name in args.iter().skip(1) {
        let fd = ctx.sys_open(name)?;
        if fd < 0 {
            ctx.print(&format!("cat: {name}: cannot open\n"))?;
            status = 1;
            continue;
        }

        let buffer = ctx.alloca(512)?;
        loop {
            let read = ctx.sys_read(fd, buffer, 512)?;
            if read <= 0 {
                break;
            }
            ctx.sys_write(1, buffer, read as u32)?;
        }
        ctx.sys_close(fd)?;
    }
    Ok(status)
}

fn exit(ctx: &mut UserContext<'_>) -> Result<i32, Trap> {
    let status = ctx
        .args()?
        .get(1)
        .and_then(|arg| arg.parse().ok())
        .unwrap_or(0);
    ctx.sys_exit(status)
}

fn install_demos(kernel: &Kernel, fs: &MemFs) -> Result<()> {
    let demos: [(&str, u32, fn(&mut UserContext<'_>) -> Result<i32, Trap>); 3] = [
        ("echo", ECHO_ENTRY, echo),
        ("cat", CAT_ENTRY, cat),
        ("exit", EXIT_ENTRY, exit),
    ];

    for (name, entry, main) in demos {
        let image = ImageBuilder::new(entry)
            .segment(entry, name.as_bytes().to_vec(), SegmentFlags::READ | SegmentFlags::EXECUTE)
            .bss(entry + 0x0010_0000, 0x1000, SegmentFlags::READ | SegmentFlags::WRITE)
            .build();
        fs.install(name, &image).into_diagnostic()?;
        kernel.programs().register(entry, main);
    }

    fs.install("motd", b"Welcome to the userprog kernel.\n")
        .into_diagnostic()?;
    Ok(())
}

fn main() -> Result<()> {
    init_tracing();

    let config = KernelConfig::from_env()?;
    let fs = Arc::new(MemFs::new());
    let kernel = Kernel::builder()
        .with_config(config)
        .with_file_system(fs.clone())
        .with_console(Arc::new(StdConsole::new()))
        .build()?;
    install_demos(&kernel, &fs)?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command_line = if args.is_empty() {
        "echo hello kernel".to_string()
    } else {
        args.join(" ")
    };

    info!(command_line = %command_line, "Running");
    let status = kernel.run(&command_line);
    info!(status, "Program finished");

    kernel.halt();
    kernel.shutdown();
    std::process::exit(status);
}
