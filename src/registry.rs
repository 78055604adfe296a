use crate::job::Job;

/// Outstanding jobs of one region. Only non-terminal jobs are ever held.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: Vec<Job>,
}

impl JobRegistry {
    pub fn new(jobs: Vec<Job>) -> Self {
        let mut registry = Self::default();
        registry.replace(jobs);
        registry
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Job> {
        self.jobs.iter()
    }

    pub fn get(&self, remote_id: &str) -> Option<&Job> {
        self.jobs.iter().find(|j| j.remote_id() == remote_id)
    }

    /// Adds a job to be polled from the next cycle on. Terminal jobs are ignored.
    pub fn register(&mut self, job: Job) {
        if !job.status().is_terminal() {
            self.jobs.push(job);
        }
    }

    /// Takes the current contents for a poll cycle, leaving the registry empty.
    pub(crate) fn take(&mut self) -> Vec<Job> {
        std::mem::take(&mut self.jobs)
    }

    /// Writes back the polled jobs of a cycle in one step and returns the ones
    /// that reached a terminal state. Jobs present before the call are kept
    /// after the polled ones.
    pub(crate) fn replace(&mut self, polled: Vec<Job>) -> Vec<Job> {
        let (terminal, remaining): (Vec<Job>, Vec<Job>) = polled
            .into_iter()
            .partition(|job| job.status().is_terminal());

        let added = std::mem::replace(&mut self.jobs, remaining);
        self.jobs.extend(added);
        terminal
    }
}
