use std::collections::{HashSet, VecDeque};

/// Worklist of discovered URLs together with the visited-set guarding against cycles.
///
/// URLs are handed out in discovery order, each one at most once per run.
#[derive(Debug, Default)]
pub struct Frontier {
    queue: VecDeque<(String, usize)>,
    queued: HashSet<String>,
    visited: HashSet<String>,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues `url` found at `depth` unless it is already visited or waiting.
    pub fn push(&mut self, url: impl Into<String>, depth: usize) -> bool {
        let url = url.into();
        if self.visited.contains(&url) || self.queued.contains(&url) {
            return false;
        }
        self.queued.insert(url.clone());
        self.queue.push_back((url, depth));
        true
    }

    /// Next URL that was not visited yet, marked as visited.
    pub fn pop(&mut self) -> Option<(String, usize)> {
        while let Some((url, depth)) = self.queue.pop_front() {
            self.queued.remove(&url);
            if self.visited.insert(url.clone()) {
                return Some((url, depth));
            }
            log::debug!("Already visited {url}");
        }
        None
    }

    /// Marks `url` as visited without going through the queue, e.g. a redirect target.
    pub fn mark_visited(&mut self, url: impl Into<String>) -> bool {
        self.visited.insert(url.into())
    }

    pub fn is_visited(&self, url: &str) -> bool {
        self.visited.contains(url)
    }

    pub fn visited(&self) -> usize {
        self.visited.len()
    }

    /// Number of URLs still waiting.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Drops everything still waiting and returns how many URLs that was.
    pub fn clear(&mut self) -> usize {
        let dropped = self.queue.len();
        self.queue.clear();
        self.queued.clear();
        dropped
    }
}
