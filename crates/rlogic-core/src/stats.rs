//! Periodic update statistics.
//!
//! When a logging rate is set, every `update()` feeds its [`UpdateReport`]
//! into [`UpdateStatistics`]. After `rate` updates the collected window is
//! summarized, logged at info level and cleared.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::id::ObjectId;
use crate::objects::ApiObjects;
use crate::update::UpdateReport;

/// Nodes listed in the slowest-nodes line of a summary.
const SLOWEST_NODES: usize = 5;

/// Minimum, maximum and average of one measured quantity over a window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Spread {
    pub min: u64,
    pub max: u64,
    pub avg: u64,
}

impl Spread {
    fn of(values: &[u64]) -> Self {
        let (Some(&min), Some(&max)) = (values.iter().min(), values.iter().max()) else {
            return Spread::default();
        };
        let avg = values.iter().sum::<u64>() / values.len() as u64;
        Spread { min, max, avg }
    }
}

/// One logged window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatisticsSummary {
    pub updates: usize,
    /// Duration of `update()`, in microseconds.
    pub update_time_us: Spread,
    /// Time between consecutive `update()` calls, in microseconds. `None`
    /// when the window held a single update.
    pub time_between_updates_us: Option<Spread>,
    pub nodes_executed: Spread,
    /// Node count at the last update of the window.
    pub total_nodes: usize,
    pub activated_links: Spread,
    /// Slowest single executions in the window, slowest first.
    pub slowest_nodes: Vec<(ObjectId, Duration)>,
}

impl StatisticsSummary {
    /// Writes the summary through `tracing`, naming nodes from `objects`.
    pub fn log(&self, objects: &ApiObjects) {
        let u = self.update_time_us;
        tracing::info!(
            updates = self.updates,
            "Update execution time (min/max/avg): {}/{}/{} [u]sec",
            u.min,
            u.max,
            u.avg
        );
        match self.time_between_updates_us {
            Some(b) => tracing::info!("Time between update calls (min/max/avg): {}/{}/{} [u]sec", b.min, b.max, b.avg),
            None => tracing::info!("Time between update calls cannot be measured with a logging rate of 1"),
        }
        let n = self.nodes_executed;
        tracing::info!(
            "Nodes executed (min/max/avg): {}%/{}%/{}% ({}/{}/{}) of {} nodes total",
            percent(n.min, self.total_nodes),
            percent(n.max, self.total_nodes),
            percent(n.avg, self.total_nodes),
            n.min,
            n.max,
            n.avg,
            self.total_nodes
        );
        let l = self.activated_links;
        tracing::info!("Activated links (min/max/avg): {}/{}/{}", l.min, l.max, l.avg);
        if !self.slowest_nodes.is_empty() {
            let listed: Vec<String> = self
                .slowest_nodes
                .iter()
                .map(|(id, time)| {
                    let name = objects.node(*id).map_or("<destroyed>", |n| n.name());
                    format!("[{}:{}]", name, time.as_micros())
                })
                .collect();
            tracing::info!("Slowest nodes [name:time_us]: {}", listed.join(" "));
        }
    }
}

fn percent(part: u64, total: usize) -> u64 {
    if total == 0 {
        0
    } else {
        part * 100 / total as u64
    }
}

/// Collector for update statistics; disabled while the logging rate is 0.
#[derive(Debug, Default)]
pub struct UpdateStatistics {
    logging_rate: usize,
    update_times: Vec<u64>,
    between_updates: Vec<u64>,
    nodes_executed: Vec<u64>,
    activated_links: Vec<u64>,
    slowest: HashMap<ObjectId, Duration>,
    total_nodes: usize,
    last_update: Option<Instant>,
}

impl UpdateStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Summarize every `rate` updates. 0 disables collection and drops the
    /// current window.
    pub fn set_logging_rate(&mut self, rate: usize) {
        self.logging_rate = rate;
        self.reset();
        self.last_update = None;
    }

    pub fn logging_rate(&self) -> usize {
        self.logging_rate
    }

    pub fn is_enabled(&self) -> bool {
        self.logging_rate > 0
    }

    /// Updates collected in the current window.
    pub fn collected(&self) -> usize {
        self.update_times.len()
    }

    /// Adds one update. Returns the window summary once `rate` updates have
    /// been collected, and starts a new window.
    pub fn collect(&mut self, report: &UpdateReport, total_nodes: usize, now: Instant) -> Option<StatisticsSummary> {
        if !self.is_enabled() {
            return None;
        }
        if let Some(last) = self.last_update.replace(now) {
            if !self.update_times.is_empty() {
                self.between_updates.push(micros(now.saturating_duration_since(last)));
            }
        }
        self.update_times.push(micros(report.total_time));
        self.nodes_executed.push(report.executed.len() as u64);
        self.activated_links.push(report.activated_links as u64);
        self.total_nodes = total_nodes;
        for &(id, time) in &report.node_times {
            let slot = self.slowest.entry(id).or_default();
            *slot = (*slot).max(time);
        }

        if self.collected() < self.logging_rate {
            return None;
        }
        let summary = self.summarize();
        self.reset();
        Some(summary)
    }

    fn summarize(&self) -> StatisticsSummary {
        let mut slowest: Vec<(ObjectId, Duration)> = self.slowest.iter().map(|(id, t)| (*id, *t)).collect();
        slowest.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        slowest.truncate(SLOWEST_NODES);
        StatisticsSummary {
            updates: self.collected(),
            update_time_us: Spread::of(&self.update_times),
            time_between_updates_us: (!self.between_updates.is_empty()).then(|| Spread::of(&self.between_updates)),
            nodes_executed: Spread::of(&self.nodes_executed),
            total_nodes: self.total_nodes,
            activated_links: Spread::of(&self.activated_links),
            slowest_nodes: slowest,
        }
    }

    fn reset(&mut self) {
        self.update_times.clear();
        self.between_updates.clear();
        self.nodes_executed.clear();
        self.activated_links.clear();
        self.slowest.clear();
    }
}

fn micros(d: Duration) -> u64 {
    u64::try_from(d.as_micros()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(executed: &[(u64, u64)], links: usize, total_us: u64) -> UpdateReport {
        UpdateReport {
            executed: executed.iter().map(|(id, _)| ObjectId(*id)).collect(),
            node_times: executed
                .iter()
                .map(|(id, us)| (ObjectId(*id), Duration::from_micros(*us)))
                .collect(),
            activated_links: links,
            total_time: Duration::from_micros(total_us),
            ..UpdateReport::default()
        }
    }

    #[test]
    fn disabled_collector_ignores_updates() {
        let mut stats = UpdateStatistics::new();
        assert!(stats.collect(&report(&[(1, 3)], 0, 10), 1, Instant::now()).is_none());
        assert_eq!(stats.collected(), 0);
    }

    #[test]
    fn single_update_window() {
        let mut stats = UpdateStatistics::new();
        stats.set_logging_rate(1);
        let summary = stats
            .collect(&report(&[(1, 3), (2, 10)], 1, 20), 4, Instant::now())
            .unwrap();

        assert_eq!(summary.updates, 1);
        assert_eq!(summary.update_time_us, Spread { min: 20, max: 20, avg: 20 });
        assert_eq!(summary.time_between_updates_us, None);
        assert_eq!(summary.nodes_executed, Spread { min: 2, max: 2, avg: 2 });
        assert_eq!(summary.total_nodes, 4);
        assert_eq!(
            summary.slowest_nodes,
            vec![
                (ObjectId(2), Duration::from_micros(10)),
                (ObjectId(1), Duration::from_micros(3)),
            ]
        );
        assert_eq!(stats.collected(), 0);
    }

    #[test]
    fn window_spans_rate_updates() {
        let mut stats = UpdateStatistics::new();
        stats.set_logging_rate(3);
        let t0 = Instant::now();

        assert!(stats.collect(&report(&[(1, 5)], 2, 10), 2, t0).is_none());
        assert!(stats
            .collect(&report(&[], 0, 4), 2, t0 + Duration::from_micros(100))
            .is_none());
        let summary = stats
            .collect(&report(&[(1, 7), (2, 1)], 1, 16), 2, t0 + Duration::from_micros(400))
            .unwrap();

        assert_eq!(summary.updates, 3);
        assert_eq!(summary.update_time_us, Spread { min: 4, max: 16, avg: 10 });
        assert_eq!(summary.time_between_updates_us, Some(Spread { min: 100, max: 300, avg: 200 }));
        assert_eq!(summary.nodes_executed, Spread { min: 0, max: 2, avg: 1 });
        assert_eq!(summary.activated_links, Spread { min: 0, max: 2, avg: 1 });
        assert_eq!(summary.slowest_nodes[0], (ObjectId(1), Duration::from_micros(7)));
    }

    #[test]
    fn slowest_list_is_capped() {
        let mut stats = UpdateStatistics::new();
        stats.set_logging_rate(1);
        let nodes: Vec<(u64, u64)> = (1..=8).map(|i| (i, 10)).collect();
        let summary = stats.collect(&report(&nodes, 0, 80), 8, Instant::now()).unwrap();
        let ids: Vec<u64> = summary.slowest_nodes.iter().map(|(id, _)| id.0).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn percentages_survive_an_empty_graph() {
        assert_eq!(percent(0, 0), 0);
        assert_eq!(percent(1, 4), 25);
    }
}
