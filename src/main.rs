//! # Sea Shell
//!
//! An interactive, POSIX job-controlling command interpreter: built-in
//! `cd`/`jobs`/`fg`/`bg`/`exit`/`help`, external commands resolved against
//! `$PATH`, and job control over `Ctrl-C`/`Ctrl-Z` matching a plain
//! interactive Unix shell.

mod control;
mod error;
mod job;
mod launcher;
mod rendezvous;
mod resolver;
mod shell;
mod status;
mod tokenizer;

use error::Fatal;
use nix::libc::STDIN_FILENO;
use nix::sys::signal::{self, SigHandler, Signal};
use nix::unistd::{getpid, isatty, setpgid, tcsetpgrp};
use shell::{Outcome, Shell};
use std::io::{self, Write};

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(fatal) => {
            eprintln!("seashell: {fatal}");
            std::process::exit(fatal.exit_code());
        }
    }
}

fn run() -> Result<i32, Fatal> {
    take_terminal_control();

    let mut shell = Shell::new();
    shell.print_banner();

    loop {
        shell.settle_jobs()?;

        print!("{}", shell.prompt());
        io::stdout().flush().map_err(Fatal::ReadFailed)?;

        let mut line = String::new();
        let bytes = io::stdin()
            .read_line(&mut line)
            .map_err(Fatal::ReadFailed)?;
        if bytes == 0 {
            // EOF (Ctrl-D)
            break;
        }

        match shell.execute_line(&line) {
            Ok(Outcome::Continue) => {}
            Ok(Outcome::Exit) => break,
            Err(Fatal::IllegalDelimiter) => unreachable!("delimiter set is a fixed constant"),
            Err(fatal) => return Err(fatal),
        }
    }

    shell.print_farewell();
    Ok(0)
}

/// Places the shell in its own process group and, if attached to a
/// terminal, takes control of it; ignores the job-control signals that
/// would otherwise stop or kill an interactive shell (`Ctrl-C`, `Ctrl-Z`,
/// and the background-read/write signals a shell's own process group
/// triggers while it isn't in the foreground).
fn take_terminal_control() {
    let pid = getpid();
    setpgid(pid, pid).ok();

    let stdin = unsafe { std::os::fd::BorrowedFd::borrow_raw(STDIN_FILENO) };
    if isatty(stdin).unwrap_or(false) {
        let _ = tcsetpgrp(stdin, pid);
    }

    for sig in [
        Signal::SIGINT,
        Signal::SIGQUIT,
        Signal::SIGTSTP,
        Signal::SIGTTIN,
        Signal::SIGTTOU,
    ] {
        unsafe {
            signal::signal(sig, SigHandler::SigIgn).ok();
        }
    }
}
