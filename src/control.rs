//! `fg`/`bg` job control: resuming a stopped or backgrounded job, with or
//! without handing it back the controlling terminal.

use crate::job::{JobState, JobTable};
use nix::libc::STDIN_FILENO;
use nix::sys::signal::{self, Signal};
use nix::unistd::tcsetpgrp;

#[derive(Debug, PartialEq, Eq)]
pub enum ControlError {
    /// No job matches the given number, and no job exists at all to fall
    /// back to as "the current job".
    NoSuchJob,
    /// `bg` was asked to resume a job that is already running in the
    /// foreground — forbidden, since the shell has no second terminal to
    /// had it to run it in background.
    AlreadyForeground,
}

/// Brings a job to the foreground: hands it the controlling terminal and,
/// if stopped, sends `SIGCONT`. Returns the job's pgid so the caller can
/// wait on it.
pub fn foreground(
    jobs: &mut JobTable,
    job_num: Option<usize>,
) -> Result<nix::unistd::Pid, ControlError> {
    let pgid = {
        let job = select_job(jobs, job_num).ok_or(ControlError::NoSuchJob)?;
        job.background = false;
        job.pgid
    };

    let stdin = unsafe { std::os::fd::BorrowedFd::borrow_raw(STDIN_FILENO) };
    let _ = tcsetpgrp(stdin, pgid);
    if let Some(job) = jobs.find_by_pgid_mut(pgid) {
        if job.state == JobState::Stopped {
            let _ = signal::killpg(pgid, Signal::SIGCONT);
            job.state = JobState::Running;
        }
    }
    Ok(pgid)
}

/// Resumes a stopped job in the background. Refuses a job that is already
/// running in the foreground: there is nothing to do, and no terminal to
/// reclaim, since the shell itself already holds it.
pub fn background(
    jobs: &mut JobTable,
    job_num: Option<usize>,
) -> Result<nix::unistd::Pid, ControlError> {
    let job = select_job(jobs, job_num).ok_or(ControlError::NoSuchJob)?;
    if job.state == JobState::Running && !job.background {
        return Err(ControlError::AlreadyForeground);
    }

    let pgid = job.pgid;
    job.background = true;
    if job.state == JobState::Stopped {
        job.state = JobState::Running;
        let _ = signal::killpg(pgid, Signal::SIGCONT);
    }
    Ok(pgid)
}

fn select_job(jobs: &mut JobTable, job_num: Option<usize>) -> Option<&mut crate::job::Job> {
    match job_num {
        Some(n) => jobs.find_by_num_mut(n),
        None => {
            let num = jobs.most_recent()?.num;
            jobs.find_by_num_mut(num)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobTable;
    use nix::unistd::Pid;

    #[test]
    fn foreground_requires_an_existing_job() {
        let mut jobs = JobTable::new();
        assert_eq!(foreground(&mut jobs, Some(1)), Err(ControlError::NoSuchJob));
    }

    #[test]
    fn foreground_with_no_number_targets_the_most_recent_job() {
        let mut jobs = JobTable::new();
        jobs.insert(Pid::from_raw(111), "a".into(), true);
        jobs.insert(Pid::from_raw(222), "b".into(), true);

        let pgid = foreground(&mut jobs, None).unwrap();
        assert_eq!(pgid, Pid::from_raw(222));
        assert!(!jobs.find_by_pgid_mut(pgid).unwrap().background);
    }

    #[test]
    fn background_refuses_a_running_foreground_job() {
        let mut jobs = JobTable::new();
        jobs.insert(Pid::from_raw(111), "a".into(), false);

        assert_eq!(
            background(&mut jobs, Some(1)),
            Err(ControlError::AlreadyForeground)
        );
    }

    #[test]
    fn background_resumes_a_stopped_job() {
        let mut jobs = JobTable::new();
        jobs.insert(Pid::from_raw(111), "a".into(), true);
        jobs.find_by_num_mut(1).unwrap().state = JobState::Stopped;

        let pgid = background(&mut jobs, Some(1)).unwrap();
        assert_eq!(pgid, Pid::from_raw(111));
        assert_eq!(jobs.find_by_num_mut(1).unwrap().state, JobState::Running);
        assert!(jobs.find_by_num_mut(1).unwrap().background);
    }
}
