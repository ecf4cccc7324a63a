//! Collects process status changes via `waitpid` and renders them into the
//! deferred status lines the shell prints between prompts.

use crate::error::Fatal;
use crate::job::{JobState, JobTable};
use nix::errno::Errno;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;

/// One observed change in a job's status, queued for reporting at the next
/// safe point (never printed mid-line while the user is typing).
#[derive(Debug, Clone)]
pub struct StatusEvent {
    pub job_num: usize,
    pub command: String,
    pub state: JobState,
    pub code: i32,
}

impl StatusEvent {
    /// Renders the line the shell prints for this event, e.g.
    /// `[2]+  Done                    sleep 10 &`.
    pub fn render(&self) -> String {
        match self.state {
            JobState::Done if self.code != 0 => format!(
                "[{}]+  Done ({})             {}",
                self.job_num, self.code, self.command
            ),
            JobState::Done => {
                format!(
                    "[{}]+  Done                    {}",
                    self.job_num, self.command
                )
            }
            JobState::Terminated => format!(
                "[{}]+  Terminated              {}",
                self.job_num, self.command
            ),
            JobState::Stopped => {
                format!(
                    "[{}]+  Stopped                 {}",
                    self.job_num, self.command
                )
            }
            JobState::Running => {
                format!(
                    "[{}]+  Running                 {}",
                    self.job_num, self.command
                )
            }
        }
    }
}

/// Runs one `waitpid` call against every live job with the given flags,
/// folding any reported change into the job table and appending the
/// corresponding event to `events`.
///
/// Returns `Ok(true)` if a status change was observed, `Ok(false)` if
/// nothing was ready (only possible with `WNOHANG`).
fn collect_one(
    jobs: &mut JobTable,
    events: &mut Vec<StatusEvent>,
    flags: WaitPidFlag,
) -> Result<bool, Fatal> {
    match waitpid(Pid::from_raw(-1), Some(flags)) {
        Ok(WaitStatus::StillAlive) => Ok(false),
        Ok(status) => {
            let pid = status_pid(&status);
            // Pipelines are out of scope (spec §1): every child this shell
            // ever forks is a job leader in its own process group, so a
            // waitpid hit for a pid the table doesn't know about means the
            // table and the kernel have disagreed about what's alive.
            let Some(job) = jobs.find_by_pgid_mut(pid) else {
                return Err(Fatal::JobTableCorrupt(format!(
                    "waitpid reported status for untracked pid {pid}"
                )));
            };

            let (state, code) = match status {
                WaitStatus::Exited(_, code) => (JobState::Done, code),
                WaitStatus::Signaled(_, sig, _) => (JobState::Terminated, sig as i32),
                WaitStatus::Stopped(_, sig) => (JobState::Stopped, sig as i32),
                WaitStatus::Continued(_) => (JobState::Running, 0),
                WaitStatus::StillAlive => unreachable!(),
                _ => return Ok(true),
            };

            // A stopped job has lost the controlling terminal (the
            // composite wait loop reclaims it for the shell right after),
            // so it's detached the same as an explicit `bg` would leave it.
            if state == JobState::Stopped {
                job.background = true;
            }
            job.state = state;
            job.last_status = code;
            events.push(StatusEvent {
                job_num: job.num,
                command: job.command.clone(),
                state,
                code,
            });
            Ok(true)
        }
        Err(Errno::ECHILD) => Ok(false), // no children left to wait for
        Err(Errno::EINTR) => Ok(true),   // retry at the caller's discretion
        Err(e) => Err(Fatal::Syscall {
            syscall: "waitpid",
            errno: e,
        }),
    }
}

fn status_pid(status: &WaitStatus) -> Pid {
    match status {
        WaitStatus::Exited(p, _)
        | WaitStatus::Signaled(p, _, _)
        | WaitStatus::Stopped(p, _)
        | WaitStatus::Continued(p) => *p,
        _ => Pid::from_raw(-1),
    }
}

/// Non-blocking drain: reap every status change currently pending, without
/// blocking if none are. Called on every pass through the composite wait
/// loop.
pub fn drain_nonblocking(jobs: &mut JobTable, events: &mut Vec<StatusEvent>) -> Result<(), Fatal> {
    loop {
        let flags = WaitPidFlag::WNOHANG | WaitPidFlag::WUNTRACED | WaitPidFlag::WCONTINUED;
        if !collect_one(jobs, events, flags)? {
            return Ok(());
        }
    }
}

/// Blocks until at least one status change is observed for the given
/// foreground process group, folding it (and anything else ready at the
/// same time) into the job table.
///
/// Used by the composite wait loop described in the design: drain
/// non-blocking first, and only block if a foreground job is still present
/// after the drain.
pub fn wait_foreground(jobs: &mut JobTable, events: &mut Vec<StatusEvent>) -> Result<(), Fatal> {
    let flags = WaitPidFlag::WUNTRACED | WaitPidFlag::WCONTINUED;
    collect_one(jobs, events, flags)?;
    drain_nonblocking(jobs, events)
}

/// Flushes queued events to stdout (one line each) and purges every job
/// that reached a terminal state, returning the purged jobs for any final
/// bookkeeping the caller wants (there is none at present beyond the
/// printed report).
pub fn report_and_purge(jobs: &mut JobTable, events: &mut Vec<StatusEvent>) {
    for event in events.drain(..) {
        println!("{}", event.render());
    }
    let _terminal = jobs.drain_terminal();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobTable;
    use nix::sys::signal::{self, Signal};
    use nix::unistd::{fork, ForkResult};
    use serial_test::serial;
    use std::time::Duration;

    // waitpid(-1, ...) reaps any child of this process, not just the one a
    // given test forked, so every test here that forks a real child must run
    // serialized against every other test in the binary that does the same
    // (see launcher.rs, rendezvous.rs, shell.rs).
    #[test]
    #[serial(real_fork)]
    fn collects_exit_status_of_a_real_child() {
        let mut jobs = JobTable::new();
        let mut events = Vec::new();

        match unsafe { fork() }.unwrap() {
            ForkResult::Child => {
                std::process::exit(7);
            }
            ForkResult::Parent { child } => {
                nix::unistd::setpgid(child, child).ok();
                jobs.insert(child, "test-exit".into(), true);

                let mut tries = 0;
                loop {
                    wait_foreground(&mut jobs, &mut events).unwrap();
                    if !events.is_empty() || tries > 50 {
                        break;
                    }
                    tries += 1;
                    std::thread::sleep(Duration::from_millis(10));
                }

                assert_eq!(events.len(), 1);
                assert_eq!(events[0].state, JobState::Done);
                assert_eq!(events[0].code, 7);
            }
        }
    }

    #[test]
    #[serial(real_fork)]
    fn collects_signaled_termination() {
        let mut jobs = JobTable::new();
        let mut events = Vec::new();

        match unsafe { fork() }.unwrap() {
            ForkResult::Child => loop {
                std::thread::sleep(Duration::from_secs(5));
            },
            ForkResult::Parent { child } => {
                nix::unistd::setpgid(child, child).ok();
                jobs.insert(child, "test-kill".into(), true);
                signal::kill(child, Signal::SIGKILL).unwrap();

                let mut tries = 0;
                loop {
                    wait_foreground(&mut jobs, &mut events).unwrap();
                    if !events.is_empty() || tries > 50 {
                        break;
                    }
                    tries += 1;
                    std::thread::sleep(Duration::from_millis(10));
                }

                assert_eq!(events.len(), 1);
                assert_eq!(events[0].state, JobState::Terminated);
                assert_eq!(events[0].code, Signal::SIGKILL as i32);
            }
        }
    }

    #[test]
    fn report_and_purge_empties_both_queues_but_keeps_live_jobs() {
        let mut jobs = JobTable::new();
        let pgid = jobs.insert(Pid::from_raw(999999), "sleep 5".into(), true);
        jobs.find_by_num_mut(pgid).unwrap().state = JobState::Done;
        jobs.insert(Pid::from_raw(999998), "sleep 6".into(), true);

        let mut events = vec![StatusEvent {
            job_num: 1,
            command: "sleep 5".into(),
            state: JobState::Done,
            code: 0,
        }];

        report_and_purge(&mut jobs, &mut events);
        assert!(events.is_empty());
        assert_eq!(jobs.iter().count(), 1);
        assert_eq!(jobs.iter().next().unwrap().num, 2);
    }
}
