use std::env;
use std::process;

use wxprobe::{Mode, run};

/// The observable payload: one fixed line on stdout.
extern "C" fn hello() {
    println!("Hello world!");
}

fn print_usage(program: &str) {
    eprintln!("{} <stack|heap|freed_heap|bss|mmap|memfd>", program);
}

fn main() {
    // Diagnostics go to stderr; RUST_LOG overrides the default level.
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Warn)
        .parse_default_env()
        .target(env_logger::Target::Stderr)
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(false)
        .init();

    let args: Vec<String> = env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("wxprobe");

    if args.len() != 2 {
        print_usage(program);
        process::exit(-libc::EINVAL);
    }

    let mode: Mode = match args[1].parse() {
        Ok(mode) => mode,
        Err(_) => {
            print_usage(program);
            process::exit(-libc::EINVAL);
        }
    };

    if let Err(err) = run(mode, hello) {
        eprintln!("{}: {}", program, err);
        process::exit(-1);
    }
}
