//! Chunk server catalog with load-aware round-robin selection.

use std::collections::HashSet;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use displaydoc::Display;

/// Scale applied to the mean server size when computing the underloaded
/// threshold. Must be greater than 1.
const FILL_FACTOR: f64 = 1.2;
/// Full traversals of the server list before a selection gives up.
const ROUNDS: usize = 3;

#[derive(Debug, Display)]
pub enum Error {
    /// chunk server already registered
    AlreadyRegistered,
}
impl std::error::Error for Error {}

/// A registered chunk server and its cumulative stored-byte count.
#[derive(Debug)]
pub struct ChunkServer {
    address: String,
    size: AtomicI64,
}

impl ChunkServer {
    fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            size: AtomicI64::new(0),
        }
    }

    /// Base URL under which the server's endpoints are reachable.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Point-in-time stored-byte count.
    ///
    /// Adjusters run concurrently with selections, so the value may be
    /// slightly stale by the time it is compared against the threshold.
    pub fn size(&self) -> i64 {
        self.size.load(Ordering::Relaxed)
    }

    fn add_size(&self, delta: i64) {
        self.size.fetch_add(delta, Ordering::Relaxed);
    }
}

#[derive(Debug, Default)]
struct Inner {
    /// Addresses of all registered servers. Used to ensure uniqueness.
    addresses: HashSet<String>,
    /// Registration-ordered server list. Append-only, so indices stay
    /// stable and double as round-robin positions.
    servers: Vec<Arc<ChunkServer>>,
    total_size: i64,
}

/// Catalog of chunk servers.
///
/// Selections walk the server list under the shared lock; registrations
/// take the exclusive lock. The round-robin cursor has its own mutex so
/// the walk can advance it without upgrading the registry lock.
#[derive(Debug, Default)]
pub struct Registry {
    inner: RwLock<Inner>,
    cursor: Mutex<Option<usize>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a chunk server address.
    pub fn register(&self, url: &str) -> Result<(), Error> {
        let mut inner = self.inner.write().unwrap();

        if !inner.addresses.insert(url.to_string()) {
            return Err(Error::AlreadyRegistered);
        }
        inner.servers.push(Arc::new(ChunkServer::new(url)));

        Ok(())
    }

    /// Adds the per-shard sizes to the servers and the grand total.
    ///
    /// Per-server counters are adjusted atomically outside the registry
    /// lock; concurrent selections may observe them before the total
    /// catches up, which only affects future placement.
    pub fn adjust_sizes(&self, servers: &[Arc<ChunkServer>], sizes: &[i64], total_size: i64) {
        for (server, size) in servers.iter().zip(sizes) {
            server.add_size(*size);
        }

        let mut inner = self.inner.write().unwrap();
        inner.total_size += total_size;
    }

    /// Selects `n` distinct servers, preferring those below the size
    /// threshold.
    ///
    /// Returns `None` when fewer than `n` servers are registered. The
    /// walk starts at the persistent cursor and wraps around the list;
    /// after one full traversal servers above the threshold become
    /// admissible too, so the selection always makes progress. The
    /// cursor keeps its position between calls, rotating the starting
    /// point across successive uploads.
    pub fn select_underloaded(&self, n: usize) -> Option<Vec<Arc<ChunkServer>>> {
        let inner = self.inner.read().unwrap();

        if inner.servers.len() < n {
            return None;
        }
        if n == 0 {
            return Some(Vec::new());
        }

        let len = inner.servers.len();
        let threshold = size_threshold(inner.total_size, len as i64, FILL_FACTOR);
        tracing::info!(
            total_size = inner.total_size,
            num_servers = len,
            threshold,
            "Selecting chunk servers"
        );

        let mut cursor = self.cursor.lock().unwrap();
        let mut pos = match *cursor {
            Some(pos) if pos < len => pos,
            _ => 0,
        };

        let start = pos;
        let mut first_round = true;
        let mut ready_to_get_oversized = false;
        let mut picked: Vec<Arc<ChunkServer>> = Vec::with_capacity(n);
        let mut picked_positions: HashSet<usize> = HashSet::with_capacity(n);

        for _ in 0..ROUNDS * len {
            if pos == start {
                if !first_round {
                    // One full traversal is done; servers above the
                    // threshold are now admissible.
                    ready_to_get_oversized = true;
                }
                first_round = false;
            }

            if !picked_positions.contains(&pos) {
                let server = &inner.servers[pos];
                let size = server.size();
                let selected = size < threshold || ready_to_get_oversized;

                tracing::debug!(
                    address = server.address(),
                    size,
                    ready_to_get_oversized,
                    selected,
                    "Checking server"
                );

                if selected {
                    picked.push(Arc::clone(server));
                    picked_positions.insert(pos);
                    if picked.len() == n {
                        *cursor = Some(pos);
                        return Some(picked);
                    }
                }
            }

            pos = (pos + 1) % len;
        }

        *cursor = Some(pos);
        None
    }
}

/// Size cutoff distinguishing underloaded from oversized servers.
///
/// A server below the mean stored size scaled by `fill_factor` is
/// underloaded. With nothing stored yet the threshold is 1, so every
/// empty server qualifies.
fn size_threshold(total_size: i64, num_servers: i64, fill_factor: f64) -> i64 {
    let threshold = ((total_size / num_servers) as f64 * fill_factor) as i64;
    if threshold == 0 {
        return 1;
    }
    threshold
}
