//! Cross-process result/statistics exchange.
//!
//! There is no vendor-able MPI crate to reach for here, so this defines the
//! `Transport` trait the coordinator actually needs (`send`, `try_recv`,
//! `barrier`) and gives it one concrete, in-process implementation,
//! [`LocalTransport`], built on `crossbeam_channel`. A real MPI binding would
//! be a second `Transport` impl behind the same trait; nothing above
//! `Coordinator` would change.

use crate::results::{ResultCollection, SqsResult};
use crate::stats::Statistics;
use crossbeam_channel::{Receiver, Sender};
use std::collections::HashMap;
use std::sync::{Arc, Barrier};

/// Wire-format message tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    BetterObjective = 1,
    Result = 2,
    Statistics = 3,
}

/// What the coordinator sends and receives between ranks. A real MPI
/// transport would serialize these through [`crate::io::binary`]; the local
/// transport passes them directly since there's no process boundary to
/// cross.
#[derive(Debug, Clone)]
pub enum Message {
    BetterObjective(f64),
    Result(SqsResult),
    Statistics(StatisticsSnapshot),
}

/// A plain-data snapshot of [`Statistics`], suitable for sending across a
/// [`Transport`]. Omits the `comm` timing, which only exists once results
/// have already reached the head.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatisticsSnapshot {
    pub finished: u64,
    pub working: u64,
    pub best_objective: f64,
}

impl StatisticsSnapshot {
    pub fn of(stats: &Statistics) -> Self {
        Self {
            finished: stats.finished_count(),
            working: stats.working_count(),
            best_objective: stats.best_objective(),
        }
    }

    /// The elementwise average across `snapshots`, one per gathered rank.
    /// Returns the zero snapshot for an empty slice.
    pub fn average(snapshots: &[StatisticsSnapshot]) -> Self {
        let n = snapshots.len() as u64;
        if n == 0 {
            return Self::default();
        }
        let finished: u64 = snapshots.iter().map(|s| s.finished).sum();
        let working: u64 = snapshots.iter().map(|s| s.working).sum();
        let best_objective: f64 = snapshots.iter().map(|s| s.best_objective).sum();
        Self {
            finished: finished / n,
            working: working / n,
            best_objective: best_objective / n as f64,
        }
    }
}

/// What a coordinator needs from its process group: point-to-point send,
/// non-blocking receive, and a collective barrier. Implementations are
/// addressed by `(tag, rank)`.
pub trait Transport: Send + Sync {
    fn send(&self, tag: Tag, rank: usize, message: Message);
    fn try_recv(&self, tag: Tag, rank: usize) -> Option<Message>;
    fn barrier(&self);
    fn num_ranks(&self) -> usize;
}

/// A `crossbeam_channel`-backed [`Transport`] connecting simulated ranks
/// within a single process. One bounded-less channel per `(tag, rank)`.
pub struct LocalTransport {
    num_ranks: usize,
    channels: HashMap<(Tag, usize), (Sender<Message>, Receiver<Message>)>,
    barrier: Arc<Barrier>,
}

impl LocalTransport {
    pub fn new(num_ranks: usize) -> Self {
        let tags = [Tag::BetterObjective, Tag::Result, Tag::Statistics];
        let mut channels = HashMap::new();
        for &tag in &tags {
            for rank in 0..num_ranks {
                channels.insert((tag, rank), crossbeam_channel::unbounded());
            }
        }
        Self {
            num_ranks,
            channels,
            barrier: Arc::new(Barrier::new(num_ranks.max(1))),
        }
    }
}

impl Transport for LocalTransport {
    fn send(&self, tag: Tag, rank: usize, message: Message) {
        if let Some((tx, _)) = self.channels.get(&(tag, rank)) {
            let _ = tx.send(message);
        }
    }

    fn try_recv(&self, tag: Tag, rank: usize) -> Option<Message> {
        self.channels.get(&(tag, rank)).and_then(|(_, rx)| rx.try_recv().ok())
    }

    fn barrier(&self) {
        self.barrier.wait();
    }

    fn num_ranks(&self) -> usize {
        self.num_ranks
    }
}

/// Implements the head/non-head gather protocol over any [`Transport`].
pub struct Coordinator<'a> {
    transport: &'a dyn Transport,
    rank_index: usize,
}

impl<'a> Coordinator<'a> {
    pub fn new(transport: &'a dyn Transport, rank_index: usize) -> Self {
        Self { transport, rank_index }
    }

    pub fn is_head(&self) -> bool {
        self.rank_index == 0
    }

    /// Non-head ranks call this after local compute: send every local
    /// result, then a single statistics snapshot, to the head.
    pub fn send_local(&self, results: &[SqsResult], stats: &Statistics) {
        assert!(!self.is_head(), "only non-head ranks send to the head");
        for result in results {
            self.transport.send(Tag::Result, 0, Message::Result(result.clone()));
        }
        self.transport
            .send(Tag::Statistics, 0, Message::Statistics(StatisticsSnapshot::of(stats)));
        self.transport.barrier();
    }

    /// The head rank calls this to gather every non-head rank's results and
    /// merge their statistics, blocking (via spin + barrier) until all
    /// `num_ranks - 1` statistics messages have arrived.
    ///
    /// Every incoming result runs through the same keep-`keep`,
    /// dedup-by-rank [`ResultCollection::insert`] local workers already use,
    /// so the head's gathered set obeys the same top-K/dedup invariant
    /// rather than a plain concatenation. The per-rank snapshots are
    /// averaged and logged before returning.
    pub fn gather(&self, local_results: Vec<SqsResult>, local_stats: &Statistics, keep: usize) -> (Vec<SqsResult>, StatisticsSnapshot) {
        assert!(self.is_head(), "only the head rank gathers");
        let num_ranks = self.transport.num_ranks();
        let collection = ResultCollection::new(keep.max(1));
        for result in local_results {
            collection.insert(result);
        }
        let mut snapshots = vec![StatisticsSnapshot::of(local_stats)];

        let mut received_stats = 0usize;
        while received_stats < num_ranks.saturating_sub(1) {
            while let Some(Message::Result(result)) = self.transport.try_recv(Tag::Result, 0) {
                collection.insert(result);
            }
            if let Some(Message::Statistics(snapshot)) = self.transport.try_recv(Tag::Statistics, 0) {
                snapshots.push(snapshot);
                received_stats += 1;
            }
        }
        while let Some(Message::Result(result)) = self.transport.try_recv(Tag::Result, 0) {
            collection.insert(result);
        }

        self.transport.barrier();

        let average = StatisticsSnapshot::average(&snapshots);
        tracing::info!(
            ranks = snapshots.len(),
            avg_finished = average.finished,
            avg_working = average.working,
            avg_best_objective = average.best_objective,
            "gathered results from all ranks"
        );

        let all_results = collection.finish().into_iter().flat_map(|(_, rs)| rs).collect();
        (all_results, average)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::grid::Grid3;

    fn sample_result(objective: f64) -> SqsResult {
        SqsResult::Interact {
            objective,
            species: vec![1, 2],
            sro: Grid3::<f64>::zeros(1, 2),
        }
    }

    #[test]
    fn head_gathers_results_and_statistics_from_one_worker() {
        let transport = LocalTransport::new(2);
        let worker_stats = Statistics::new();
        worker_stats.mark_finished(5);

        std::thread::scope(|scope| {
            scope.spawn(|| {
                let worker = Coordinator::new(&transport, 1);
                worker.send_local(&[sample_result(1.0)], &worker_stats);
            });

            let head_stats = Statistics::new();
            head_stats.mark_finished(10);
            let head = Coordinator::new(&transport, 0);
            let (results, average) = head.gather(vec![sample_result(0.5)], &head_stats, 4);
            assert_eq!(results.len(), 2);
            // (5 + 10) / 2 ranks
            assert_eq!(average.finished, 7);
        });
    }

    #[test]
    fn gather_dedups_equal_rank_results_through_the_keep_k_collection() {
        let transport = LocalTransport::new(2);
        let worker_stats = Statistics::new();

        std::thread::scope(|scope| {
            scope.spawn(|| {
                let worker = Coordinator::new(&transport, 1);
                worker.send_local(&[sample_result(1.0)], &worker_stats);
            });

            let head_stats = Statistics::new();
            let head = Coordinator::new(&transport, 0);
            let (results, _) = head.gather(vec![sample_result(1.0)], &head_stats, 4);
            // Both ranks produced the same candidate (same objective, same rank).
            assert_eq!(results.len(), 1);
        });
    }

    #[test]
    fn gather_respects_the_keep_k_cutoff() {
        let transport = LocalTransport::new(2);
        let worker_stats = Statistics::new();

        std::thread::scope(|scope| {
            scope.spawn(|| {
                let worker = Coordinator::new(&transport, 1);
                worker.send_local(&[sample_result(2.0)], &worker_stats);
            });

            let head_stats = Statistics::new();
            let head = Coordinator::new(&transport, 0);
            let (results, _) = head.gather(vec![sample_result(1.0)], &head_stats, 1);
            assert_eq!(results.len(), 1);
            assert_eq!(results[0].objective(), 1.0);
        });
    }

    #[test]
    fn rank_zero_is_head() {
        let transport = LocalTransport::new(3);
        assert!(Coordinator::new(&transport, 0).is_head());
        assert!(!Coordinator::new(&transport, 1).is_head());
    }
}
