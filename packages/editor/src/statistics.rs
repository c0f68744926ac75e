//! # Statistics
//!
//! Word and character counts, the background worker that computes them off
//! the editing path, and requirement alerts derived from the counts.
//!
//! ## Ordering
//!
//! Several counts for the same key may be in flight at once. Each request is
//! issued a token by the [`AlertBoard`]; a result is only applied when its
//! token is still the newest issued for that key, so a slow stale count can
//! never overwrite a fresher one.

use crate::config::StatisticsRequirements;
use manuscript_model::visitor::walk_node;
use manuscript_model::{Mark, Node, NodeType, Visitor};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StatisticsError {
    #[error("Statistics worker stopped")]
    WorkerStopped,
}

struct TextBuilder {
    out: String,
}

impl Visitor for TextBuilder {
    fn visit_node(&mut self, node: &Node, pos: usize) {
        match node.node_type {
            NodeType::HardBreak => self.out.push(' '),
            NodeType::Paragraph | NodeType::SectionTitle | NodeType::Figcaption => {
                walk_node(self, node, pos);
                self.out.push('\n');
            }
            _ => walk_node(self, node, pos),
        }
    }

    fn visit_text(&mut self, text: &str, _marks: &[Mark], _pos: usize) {
        self.out.push_str(text);
    }
}

/// Plain text of a node, one line per text block
pub fn build_text(node: &Node) -> String {
    let mut builder = TextBuilder { out: String::new() };
    if node.is_text() {
        builder.visit_node(node, 0);
    } else {
        builder.visit_document(node);
    }
    builder.out
}

/// Whitespace-separated tokens containing at least one letter or digit
pub fn count_words(text: &str) -> usize {
    text.split_whitespace()
        .filter(|word| word.chars().any(char::is_alphanumeric))
        .count()
}

/// Characters excluding line breaks
pub fn count_characters(text: &str) -> usize {
    text.chars().filter(|c| *c != '\n').count()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Statistics {
    pub words: usize,
    pub characters: usize,
}

impl Statistics {
    pub fn of(node: &Node) -> Self {
        let text = build_text(node);
        Self {
            words: count_words(&text),
            characters: count_characters(&text),
        }
    }
}

struct CountRequest {
    node: Arc<Node>,
    reply: oneshot::Sender<Statistics>,
}

/// Counts statistics on a tokio task
#[derive(Debug, Clone)]
pub struct StatisticsWorker {
    requests: mpsc::Sender<CountRequest>,
}

impl StatisticsWorker {
    /// Spawn the worker task. Must be called inside a tokio runtime; the
    /// task ends when the last handle is dropped.
    pub fn spawn() -> Self {
        let (tx, mut rx) = mpsc::channel::<CountRequest>(100);
        tokio::spawn(async move {
            while let Some(request) = rx.recv().await {
                let statistics = Statistics::of(&request.node);
                // The requester may have given up waiting
                let _ = request.reply.send(statistics);
            }
            tracing::debug!("Statistics worker stopped");
        });
        Self { requests: tx }
    }

    pub async fn count(&self, node: Arc<Node>) -> Result<Statistics, StatisticsError> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(CountRequest { node, reply })
            .await
            .map_err(|_| StatisticsError::WorkerStopped)?;
        response.await.map_err(|_| StatisticsError::WorkerStopped)
    }
}

impl std::fmt::Debug for CountRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CountRequest").finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RequirementAlert {
    TooFewWords { min: usize, actual: usize },
    TooManyWords { max: usize, actual: usize },
    TooFewCharacters { min: usize, actual: usize },
    TooManyCharacters { max: usize, actual: usize },
}

pub fn compute_alerts(statistics: Statistics, requirements: &StatisticsRequirements) -> Vec<RequirementAlert> {
    let mut alerts = Vec::new();
    let Statistics { words, characters } = statistics;
    if let Some(min) = requirements.min_words.filter(|min| words < *min) {
        alerts.push(RequirementAlert::TooFewWords { min, actual: words });
    }
    if let Some(max) = requirements.max_words.filter(|max| words > *max) {
        alerts.push(RequirementAlert::TooManyWords { max, actual: words });
    }
    if let Some(min) = requirements.min_characters.filter(|min| characters < *min) {
        alerts.push(RequirementAlert::TooFewCharacters {
            min,
            actual: characters,
        });
    }
    if let Some(max) = requirements.max_characters.filter(|max| characters > *max) {
        alerts.push(RequirementAlert::TooManyCharacters {
            max,
            actual: characters,
        });
    }
    alerts
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestToken(u64);

#[derive(Debug, Default)]
struct AlertSlot {
    latest: u64,
    alerts: Vec<RequirementAlert>,
}

/// Alerts per key (e.g. the manuscript id), last issued request wins
#[derive(Debug, Default)]
pub struct AlertBoard {
    next: u64,
    slots: BTreeMap<String, AlertSlot>,
}

impl AlertBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a token for a new count of `key`
    pub fn issue(&mut self, key: &str) -> RequestToken {
        self.next += 1;
        self.slots.entry(key.to_string()).or_default().latest = self.next;
        RequestToken(self.next)
    }

    /// Store `alerts` if `token` is still the newest for `key`
    pub fn resolve(&mut self, key: &str, token: RequestToken, alerts: Vec<RequirementAlert>) -> bool {
        match self.slots.get_mut(key) {
            Some(slot) if slot.latest == token.0 => {
                slot.alerts = alerts;
                true
            }
            _ => {
                tracing::debug!(key, token = token.0, "Discarded stale statistics result");
                false
            }
        }
    }

    pub fn alerts(&self, key: &str) -> &[RequirementAlert] {
        self.slots
            .get(key)
            .map(|slot| slot.alerts.as_slice())
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use manuscript_model::builders::*;

    fn sample() -> Node {
        manuscript(vec![
            section("s1", "Introduction", vec![paragraph(vec![text("Hello, world! — 42 times.")])]),
            paragraph(vec![text("Second line")]),
        ])
    }

    #[test]
    fn test_build_text_separates_blocks() {
        assert_eq!(
            build_text(&sample()),
            "Introduction\nHello, world! — 42 times.\nSecond line\n"
        );
    }

    #[test]
    fn test_fixed_counts() {
        let text = build_text(&sample());
        assert_eq!(count_words(&text), 7);
        assert_eq!(count_characters(&text), 12 + 25 + 11);
        assert_eq!(Statistics::of(&sample()), Statistics { words: 7, characters: 48 });
    }

    #[test]
    fn test_alerts_from_requirements() {
        let requirements = StatisticsRequirements {
            min_words: Some(10),
            max_characters: Some(40),
            ..StatisticsRequirements::default()
        };
        let alerts = compute_alerts(Statistics { words: 7, characters: 48 }, &requirements);
        assert_eq!(
            alerts,
            vec![
                RequirementAlert::TooFewWords { min: 10, actual: 7 },
                RequirementAlert::TooManyCharacters { max: 40, actual: 48 },
            ]
        );
    }

    #[test]
    fn test_stale_results_are_discarded() {
        let mut board = AlertBoard::new();
        let first = board.issue("doc");
        let second = board.issue("doc");
        let alert = RequirementAlert::TooFewWords { min: 1, actual: 0 };

        assert!(board.resolve("doc", second, vec![]));
        assert!(!board.resolve("doc", first, vec![alert]));
        assert!(board.alerts("doc").is_empty());
    }

    #[tokio::test]
    async fn test_worker_counts() {
        let worker = StatisticsWorker::spawn();
        let statistics = worker.count(Arc::new(sample())).await.unwrap();
        assert_eq!(statistics.words, 7);
    }
}
