//! Scripted in-memory service used by the unit tests.
use crate::error::RemoteError;
use crate::remote::{AppeearsOps, BundleFile, FileBody, RemoteStatus, Token};
use crate::submit::TaskRequest;
use futures_util::stream::{self, StreamExt};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

type Scripted<T> = Result<T, u16>;

#[derive(Default)]
struct State {
    submissions: Vec<String>,
    rejected: HashSet<usize>,
    statuses: HashMap<String, VecDeque<Scripted<RemoteStatus>>>,
    status_calls: Vec<String>,
    bundles: HashMap<String, Scripted<Vec<BundleFile>>>,
    files: HashMap<(String, String), Scripted<Vec<u8>>>,
    fetches: Vec<String>,
}

#[derive(Default)]
pub struct FakeAppeears {
    state: Mutex<State>,
}

fn status_error(status: u16) -> RemoteError {
    RemoteError::Status {
        status,
        body: format!("scripted {status}"),
    }
}

impl FakeAppeears {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(&self) -> Token {
        Token::new("test-token")
    }

    /// Makes the n-th submission (1-based) fail with HTTP 400.
    pub fn reject_submission(&self, n: usize) {
        self.state.lock().unwrap().rejected.insert(n);
    }

    /// Queues a status answer; the last queued answer repeats.
    pub fn push_status(&self, task_id: &str, status: &str) {
        self.push(
            task_id,
            Ok(RemoteStatus {
                status: status.to_string(),
                message: None,
            }),
        );
    }

    pub fn push_failed(&self, task_id: &str, message: &str) {
        self.push(
            task_id,
            Ok(RemoteStatus {
                status: "failed".to_string(),
                message: Some(message.to_string()),
            }),
        );
    }

    /// Queues a failing status query with the given HTTP status.
    pub fn push_status_error(&self, task_id: &str, status: u16) {
        self.push(task_id, Err(status));
    }

    fn push(&self, task_id: &str, answer: Scripted<RemoteStatus>) {
        self.state
            .lock()
            .unwrap()
            .statuses
            .entry(task_id.to_string())
            .or_default()
            .push_back(answer);
    }

    /// Registers a bundle whose files all download `content`.
    pub fn set_bundle(&self, task_id: &str, file_names: &[&str], content: &[u8]) {
        let mut state = self.state.lock().unwrap();
        let mut files = vec![];
        for (i, name) in file_names.iter().enumerate() {
            let file_id = format!("{task_id}-file-{i}");
            state.files.insert(
                (task_id.to_string(), file_id.clone()),
                Ok(content.to_vec()),
            );
            files.push(BundleFile {
                file_id,
                file_name: name.to_string(),
                file_size: Some(content.len() as u64),
            });
        }
        state.bundles.insert(task_id.to_string(), Ok(files));
    }

    pub fn fail_bundle(&self, task_id: &str, status: u16) {
        self.state
            .lock()
            .unwrap()
            .bundles
            .insert(task_id.to_string(), Err(status));
    }

    /// Makes the download of `file_name` in the bundle of `task_id` fail.
    pub fn fail_file(&self, task_id: &str, file_name: &str, status: u16) {
        let mut state = self.state.lock().unwrap();
        let file_id = match state.bundles.get(task_id) {
            Some(Ok(files)) => files
                .iter()
                .find(|f| f.file_name == file_name)
                .map(|f| f.file_id.clone()),
            _ => None,
        }
        .expect("file must be registered with set_bundle first");
        state
            .files
            .insert((task_id.to_string(), file_id), Err(status));
    }

    pub fn submitted_names(&self) -> Vec<String> {
        self.state.lock().unwrap().submissions.clone()
    }

    pub fn status_calls(&self) -> Vec<String> {
        self.state.lock().unwrap().status_calls.clone()
    }

    /// File names fetched, in order.
    pub fn fetched(&self) -> Vec<String> {
        self.state.lock().unwrap().fetches.clone()
    }
}

impl AppeearsOps for FakeAppeears {
    async fn submit_task(
        &self,
        request: &TaskRequest,
        _token: &Token,
    ) -> Result<String, RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.submissions.push(request.task_name.clone());
        let n = state.submissions.len();
        if state.rejected.contains(&n) {
            return Err(status_error(400));
        }
        Ok(format!("task-{n}"))
    }

    async fn task_status(
        &self,
        task_id: &str,
        _token: &Token,
    ) -> Result<RemoteStatus, RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.status_calls.push(task_id.to_string());
        let queue = state
            .statuses
            .get_mut(task_id)
            .ok_or_else(|| status_error(404))?;
        let answer = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        match answer {
            Some(Ok(status)) => Ok(status),
            Some(Err(code)) => Err(status_error(code)),
            None => Err(status_error(404)),
        }
    }

    async fn list_bundle(
        &self,
        task_id: &str,
        _token: &Token,
    ) -> Result<Vec<BundleFile>, RemoteError> {
        let state = self.state.lock().unwrap();
        match state.bundles.get(task_id) {
            Some(Ok(files)) => Ok(files.clone()),
            Some(Err(code)) => Err(status_error(*code)),
            None => Ok(vec![]),
        }
    }

    async fn fetch_file(
        &self,
        task_id: &str,
        file_id: &str,
        _token: &Token,
    ) -> Result<FileBody, RemoteError> {
        let mut state = self.state.lock().unwrap();
        let name = state
            .bundles
            .get(task_id)
            .and_then(|b| b.as_ref().ok())
            .and_then(|files| files.iter().find(|f| f.file_id == file_id))
            .map(|f| f.file_name.clone())
            .unwrap_or_else(|| file_id.to_string());
        state.fetches.push(name);

        match state.files.get(&(task_id.to_string(), file_id.to_string())) {
            Some(Ok(content)) => {
                let pieces: Vec<Result<Vec<u8>, RemoteError>> =
                    content.chunks(4).map(|c| Ok(c.to_vec())).collect();
                Ok(FileBody {
                    content_length: Some(content.len() as u64),
                    chunks: stream::iter(pieces).boxed(),
                })
            }
            Some(Err(code)) => Err(status_error(*code)),
            None => Err(status_error(404)),
        }
    }
}
