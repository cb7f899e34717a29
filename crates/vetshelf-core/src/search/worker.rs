//! Background search worker.
//!
//! The index lives on its own thread and is reached only through
//! messages. Every request carries a strictly increasing id and its own
//! reply channel, so responses are matched to requests regardless of the
//! order they complete in.

use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::runtime::{self, Runtime};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::{DebugInfo, IndexStats, SearchError, SearchHit, SearchHits, SearchResult, SnapshotFile, TextIndex};
use crate::models::SearchSummary;

enum Command {
    Search(String),
    Update(SearchSummary),
    Add(SearchSummary),
    Reset,
    Load,
    Persist,
    ClearCache,
    Debug(Option<String>),
    #[cfg(test)]
    Stall(Duration),
}

#[derive(Debug)]
enum Reply {
    Hits(Vec<SearchHit>),
    Done,
    Debug(DebugInfo),
}

type ReplySender = oneshot::Sender<SearchResult<Reply>>;

struct Request {
    id: u64,
    command: Command,
    reply: ReplySender,
}

/// Handle for a request whose response has not been collected.
///
/// Dropping a ticket abandons the request: the worker still runs it but
/// its response is discarded.
#[derive(Debug)]
#[must_use = "a ticket must be waited on to observe the outcome"]
pub struct Ticket {
    id: u64,
    reply: oneshot::Receiver<SearchResult<Reply>>,
}

impl Ticket {
    pub fn id(&self) -> u64 {
        self.id
    }
}

struct Engine {
    index: TextIndex,
    snapshot: SnapshotFile,
}

impl Engine {
    fn handle(&mut self, command: Command) -> SearchResult<Reply> {
        match command {
            Command::Search(query) => Ok(Reply::Hits(self.index.search(&query))),
            Command::Update(summary) | Command::Add(summary) => {
                self.index.update(summary);
                Ok(Reply::Done)
            }
            Command::Reset => {
                self.index.reset();
                Ok(Reply::Done)
            }
            Command::Load => {
                self.index = self.snapshot.load()?;
                info!(documents = self.index.len(), "Loaded search snapshot");
                Ok(Reply::Done)
            }
            Command::Persist => {
                self.snapshot.save(&self.index)?;
                debug!(documents = self.index.len(), "Persisted search snapshot");
                Ok(Reply::Done)
            }
            Command::ClearCache => {
                self.snapshot.remove()?;
                Ok(Reply::Done)
            }
            Command::Debug(Some(id)) => Ok(Reply::Debug(DebugInfo::Document(
                self.index.document(&id).cloned(),
            ))),
            Command::Debug(None) => {
                let IndexStats { documents, terms } = self.index.stats();
                Ok(Reply::Debug(DebugInfo::Stats {
                    documents,
                    terms,
                    snapshot_documents: self.snapshot.document_count(),
                }))
            }
            #[cfg(test)]
            Command::Stall(duration) => {
                thread::sleep(duration);
                Ok(Reply::Done)
            }
        }
    }

    /// Serve requests until every sender is gone.
    fn run(mut self, mut requests: mpsc::UnboundedReceiver<Request>) {
        debug!("Search worker started");
        while let Some(Request { id, command, reply }) = requests.blocking_recv() {
            let result = self.handle(command);
            if reply.send(result).is_err() {
                debug!(request = id, "Discarded late search response");
            }
        }
        debug!("Search worker stopped");
    }
}

/// Client side of the search worker thread.
pub struct SearchWorker {
    requests: Option<mpsc::UnboundedSender<Request>>,
    runtime: Runtime,
    next_id: u64,
    timeout: Option<Duration>,
    handle: Option<JoinHandle<()>>,
}

impl SearchWorker {
    /// Start a worker with an empty index backed by `snapshot`.
    ///
    /// With `timeout` set, a request unanswered for that long fails with
    /// [`SearchError::Timeout`] and its eventual response is discarded.
    pub fn spawn(snapshot: SnapshotFile, timeout: Option<Duration>) -> SearchResult<Self> {
        let runtime = runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .map_err(|e| SearchError::Spawn(e.to_string()))?;

        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let engine = Engine {
            index: TextIndex::new(),
            snapshot,
        };

        let handle = thread::Builder::new()
            .name("vetshelf-search".into())
            .spawn(move || engine.run(request_rx))
            .map_err(|e| SearchError::Spawn(e.to_string()))?;

        Ok(Self {
            requests: Some(request_tx),
            runtime,
            next_id: 1,
            timeout,
            handle: Some(handle),
        })
    }

    fn send(&mut self, command: Command) -> SearchResult<Ticket> {
        let id = self.next_id;
        self.next_id += 1;

        let (reply, receiver) = oneshot::channel();
        let requests = self.requests.as_ref().ok_or(SearchError::Disconnected)?;
        requests
            .send(Request { id, command, reply })
            .map_err(|_| SearchError::Disconnected)?;
        Ok(Ticket {
            id,
            reply: receiver,
        })
    }

    fn wait(&self, ticket: Ticket) -> SearchResult<Reply> {
        let Ticket { id, reply } = ticket;
        let Some(limit) = self.timeout else {
            return reply.blocking_recv().map_err(|_| SearchError::Disconnected)?;
        };

        match self.runtime.block_on(async { tokio::time::timeout(limit, reply).await }) {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(SearchError::Disconnected),
            Err(_) => {
                warn!(
                    request = id,
                    timeout_ms = limit.as_millis() as u64,
                    "Search worker timed out"
                );
                Err(SearchError::Timeout(id))
            }
        }
    }

    fn call(&mut self, command: Command) -> SearchResult<Reply> {
        let ticket = self.send(command)?;
        self.wait(ticket)
    }

    fn call_done(&mut self, command: Command) -> SearchResult<()> {
        self.call(command).map(|_| ())
    }

    /// Ranked matches for `query`.
    pub fn search(&mut self, query: &str) -> SearchResult<SearchHits> {
        match self.call(Command::Search(query.to_string()))? {
            Reply::Hits(hits) => Ok(SearchHits::new(hits)),
            _ => Err(SearchError::UnexpectedReply("search")),
        }
    }

    /// Insert or replace a summary.
    pub fn update(&mut self, summary: SearchSummary) -> SearchResult<()> {
        self.call_done(Command::Update(summary))
    }

    pub fn add(&mut self, summary: SearchSummary) -> SearchResult<()> {
        self.call_done(Command::Add(summary))
    }

    /// Queue an update without waiting for it. Collect the outcome with
    /// [`SearchWorker::wait_done`].
    pub fn queue_update(&mut self, summary: SearchSummary) -> SearchResult<Ticket> {
        self.send(Command::Update(summary))
    }

    pub fn wait_done(&mut self, ticket: Ticket) -> SearchResult<()> {
        self.wait(ticket).map(|_| ())
    }

    /// Drop every indexed document. The snapshot is untouched.
    pub fn reset(&mut self) -> SearchResult<()> {
        self.call_done(Command::Reset)
    }

    /// Replace the index with the persisted snapshot.
    pub fn load(&mut self) -> SearchResult<()> {
        self.call_done(Command::Load)
    }

    pub fn persist(&mut self) -> SearchResult<()> {
        self.call_done(Command::Persist)
    }

    /// Delete the persisted snapshot only.
    pub fn clear_cache(&mut self) -> SearchResult<()> {
        self.call_done(Command::ClearCache)
    }

    /// Indexed summary for `id`, or index statistics when `id` is `None`.
    pub fn debug(&mut self, id: Option<&str>) -> SearchResult<DebugInfo> {
        match self.call(Command::Debug(id.map(str::to_string)))? {
            Reply::Debug(info) => Ok(info),
            _ => Err(SearchError::UnexpectedReply("debug")),
        }
    }
}

impl Drop for SearchWorker {
    fn drop(&mut self) {
        // Closing the request channel ends the worker loop
        self.requests.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Search worker panicked");
            }
        }
    }
}
