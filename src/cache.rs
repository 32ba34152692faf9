//! Bounded cache of decoded pictures.
//!
//! The viewer shows one picture at a time, so the cache defaults to a single
//! slot: installing a new decode evicts the previous image and large
//! animations never accumulate. Decodes run on the blocking pool; a second
//! request for a path whose decode is already in flight awaits that result
//! instead of decoding twice.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::decode::{Decode, DecodedImage};
use crate::error::Error;

type Outcome = Result<Arc<DecodedImage>, Error>;

pub struct PictureCache<D> {
    decoder: Arc<D>,
    capacity: usize,
    state: Arc<Mutex<State>>,
}

impl<D> Clone for PictureCache<D> {
    fn clone(&self) -> Self {
        Self {
            decoder: Arc::clone(&self.decoder),
            capacity: self.capacity,
            state: Arc::clone(&self.state),
        }
    }
}

#[derive(Default)]
struct State {
    /// Oldest at the front; the back entry is the current picture.
    entries: VecDeque<(PathBuf, Arc<DecodedImage>)>,
    /// One sender per decode in flight; latecomers subscribe to it.
    pending: HashMap<PathBuf, broadcast::Sender<Outcome>>,
}

enum Ticket {
    Wait(broadcast::Receiver<Outcome>),
    Decode,
}

impl<D: Decode> PictureCache<D> {
    pub fn new(decoder: D, capacity: usize) -> Self {
        Self {
            decoder: Arc::new(decoder),
            capacity: capacity.max(1),
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    /// The decoded picture for `path`, decoding on a blocking worker on a
    /// cache miss and installing the result.
    pub async fn get(&self, path: &Path) -> Outcome {
        let ticket = {
            let mut st = lock(&self.state);
            if let Some(pos) = st.entries.iter().position(|(p, _)| p == path) {
                // Touch: move to the back so eviction stays least-recent.
                if let Some((p, img)) = st.entries.remove(pos) {
                    let hit = Arc::clone(&img);
                    st.entries.push_back((p, img));
                    trace!(path = %path.display(), "cache hit");
                    return Ok(hit);
                }
            }
            if let Some(tx) = st.pending.get(path) {
                Ticket::Wait(tx.subscribe())
            } else {
                let (tx, _) = broadcast::channel(1);
                st.pending.insert(path.to_path_buf(), tx);
                Ticket::Decode
            }
        };

        match ticket {
            Ticket::Wait(mut rx) => {
                trace!(path = %path.display(), "awaiting in-flight decode");
                match rx.recv().await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(Error::Io {
                        path: path.to_path_buf(),
                        reason: "decode abandoned".into(),
                    }),
                }
            }
            Ticket::Decode => self.decode_and_install(path).await,
        }
    }

    async fn decode_and_install(&self, path: &Path) -> Outcome {
        // If this future is dropped mid-decode the pending entry must not
        // leak; waiters then observe a closed channel.
        let guard = PendingGuard {
            state: Arc::clone(&self.state),
            path: path.to_path_buf(),
            armed: true,
        };

        let decoder = Arc::clone(&self.decoder);
        let owned = path.to_path_buf();
        let joined = tokio::task::spawn_blocking(move || decoder.decode(&owned)).await;
        let outcome: Outcome = match joined {
            Ok(Ok(image)) => Ok(Arc::new(image)),
            Ok(Err(err)) => Err(err),
            Err(err) => Err(Error::Io {
                path: path.to_path_buf(),
                reason: format!("decode worker failed: {err}"),
            }),
        };

        let mut st = lock(&self.state);
        if let Ok(image) = &outcome {
            st.entries.push_back((path.to_path_buf(), Arc::clone(image)));
            while st.entries.len() > self.capacity {
                if let Some((evicted, _)) = st.entries.pop_front() {
                    debug!(path = %evicted.display(), "evicting cached picture");
                }
            }
        }
        if let Some(tx) = st.pending.remove(path) {
            let _ = tx.send(outcome.clone());
        }
        drop(st);
        guard.disarm();
        outcome
    }

    /// Drops the cached entry for `path`, if any. In-flight decodes are not
    /// interrupted.
    pub fn invalidate(&self, path: &Path) {
        let mut st = lock(&self.state);
        st.entries.retain(|(p, _)| p != path);
    }

    /// The most recently installed picture.
    pub fn current(&self) -> Option<Arc<DecodedImage>> {
        let st = lock(&self.state);
        st.entries.back().map(|(_, img)| Arc::clone(img))
    }

    pub fn contains(&self, path: &Path) -> bool {
        let st = lock(&self.state);
        st.entries.iter().any(|(p, _)| p == path)
    }

    pub fn len(&self) -> usize {
        lock(&self.state).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn lock(state: &Arc<Mutex<State>>) -> std::sync::MutexGuard<'_, State> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

struct PendingGuard {
    state: Arc<Mutex<State>>,
    path: PathBuf,
    armed: bool,
}

impl PendingGuard {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if self.armed {
            let mut st = lock(&self.state);
            st.pending.remove(&self.path);
        }
    }
}
