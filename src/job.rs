//! The job table: the shell's record of every process group it has
//! launched that hasn't yet been reported and purged.

use nix::unistd::Pid;

/// Lifecycle state of a job, updated as status events arrive from the
/// status collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Running,
    Stopped,
    Done,
    Terminated,
}

impl JobState {
    /// Terminal states are purged from the table once reported.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Done | JobState::Terminated)
    }

    pub fn label(self) -> &'static str {
        match self {
            JobState::Running => "Running",
            JobState::Stopped => "Stopped",
            JobState::Done => "Done",
            JobState::Terminated => "Terminated",
        }
    }
}

/// A single job: one process group launched from one command line.
#[derive(Debug, Clone)]
pub struct Job {
    /// 1-based, user-visible job number (`%N` in `fg`/`bg` arguments).
    pub num: usize,
    /// Process group ID, equal to the leader's pid.
    pub pgid: Pid,
    /// The command line the job was started from, for `jobs` listing.
    pub command: String,
    pub state: JobState,
    /// Exit code for `Done`, signal number for `Terminated`/`Stopped`. See
    /// DESIGN.md for why this departs from the original's raw wait status.
    pub last_status: i32,
    pub background: bool,
}

/// The ordered set of live jobs, indexed by insertion order (not by
/// job number, since numbers are never reused within a session segment
/// but jobs are removed once reported).
#[derive(Debug, Default)]
pub struct JobTable {
    jobs: Vec<Job>,
    next_num: usize,
}

impl JobTable {
    pub fn new() -> Self {
        JobTable {
            jobs: Vec::new(),
            next_num: 1,
        }
    }

    /// Registers a newly-launched job and returns its assigned job number.
    pub fn insert(&mut self, pgid: Pid, command: String, background: bool) -> usize {
        let num = self.next_num;
        self.next_num += 1;
        self.jobs.push(Job {
            num,
            pgid,
            command,
            state: JobState::Running,
            last_status: 0,
            background,
        });
        num
    }

    pub fn find_by_pgid_mut(&mut self, pgid: Pid) -> Option<&mut Job> {
        self.jobs.iter_mut().find(|j| j.pgid == pgid)
    }

    pub fn find_by_num(&self, num: usize) -> Option<&Job> {
        self.jobs.iter().find(|j| j.num == num)
    }

    pub fn find_by_num_mut(&mut self, num: usize) -> Option<&mut Job> {
        self.jobs.iter_mut().find(|j| j.num == num)
    }

    /// Removes and returns every job currently in a terminal state, in
    /// table order, so the caller can report them before dropping them.
    pub fn drain_terminal(&mut self) -> Vec<Job> {
        let (terminal, remaining): (Vec<Job>, Vec<Job>) =
            self.jobs.drain(..).partition(|j| j.state.is_terminal());
        self.jobs = remaining;
        terminal
    }

    pub fn iter(&self) -> impl Iterator<Item = &Job> {
        self.jobs.iter()
    }

    /// The most recently inserted job still in the table, used when `fg`
    /// or `bg` is given no job number ("current job").
    pub fn most_recent(&self) -> Option<&Job> {
        self.jobs.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(n: i32) -> Pid {
        Pid::from_raw(n)
    }

    #[test]
    fn job_numbers_increase_and_never_reuse_within_table_lifetime() {
        let mut table = JobTable::new();
        let n1 = table.insert(pid(100), "sleep 1".into(), true);
        let n2 = table.insert(pid(200), "sleep 2".into(), true);
        assert_eq!(n1, 1);
        assert_eq!(n2, 2);

        table.find_by_num_mut(1).unwrap().state = JobState::Done;
        let _ = table.drain_terminal();

        let n3 = table.insert(pid(300), "sleep 3".into(), true);
        assert_eq!(n3, 3, "job numbers must not be reused after removal");
    }

    #[test]
    fn drain_terminal_only_removes_done_and_terminated() {
        let mut table = JobTable::new();
        table.insert(pid(1), "a".into(), true);
        table.insert(pid(2), "b".into(), true);
        table.find_by_num_mut(1).unwrap().state = JobState::Done;

        let drained = table.drain_terminal();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].num, 1);
        assert_eq!(table.iter().count(), 1);
        assert_eq!(table.iter().next().unwrap().num, 2);
    }

    #[test]
    fn find_by_pgid_locates_the_right_job() {
        let mut table = JobTable::new();
        table.insert(pid(10), "a".into(), false);
        table.insert(pid(20), "b".into(), false);

        let job = table.find_by_pgid_mut(pid(20)).unwrap();
        assert_eq!(job.num, 2);
    }

    #[test]
    fn most_recent_tracks_last_insertion_not_last_mutation() {
        let mut table = JobTable::new();
        table.insert(pid(10), "a".into(), true);
        table.insert(pid(20), "b".into(), true);
        table.find_by_num_mut(1).unwrap().state = JobState::Stopped;

        assert_eq!(table.most_recent().unwrap().num, 2);
    }
}
