//! Round lifecycle controller.
//!
//! A background poller finds active rounds whose timer has run out and
//! completes each one: an Active → Completed compare-and-swap, PASS
//! synthesis for silent roster members, the scoring pipeline, score
//! persistence, and a completion notification. The admin "end now"
//! command funnels into the same path, so whichever caller loses the
//! CAS skips the pipeline entirely.
//!
//! The poller is a supervised task owned by the node: it stops on a
//! watch-channel shutdown signal, not a process hook. Rounds in one
//! tick are independent - a failure scoring one never blocks another,
//! and a round whose scoring failed stays Completed and is retried on
//! the next tick's sweep.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info};

use crate::error::{Error, Result};
use crate::models::{Round, RoundScore, Submission};
use crate::storage::Store;
use crate::ws::{EndReason, RoundEvent};

/// Current unix time in seconds.
pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_secs()
}

/// Drives rounds through expiry, scoring and notification.
pub struct RoundScheduler {
    store: Arc<Store>,
    events: broadcast::Sender<RoundEvent>,
    poll_interval: Duration,
}

impl RoundScheduler {
    /// Create a scheduler over the shared store and event channel.
    pub fn new(
        store: Arc<Store>,
        events: broadcast::Sender<RoundEvent>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            store,
            events,
            poll_interval,
        }
    }

    /// Run the poller until the shutdown signal flips.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Round scheduler starting (checking every {:?})",
            self.poll_interval
        );
        let mut interval = tokio::time::interval(self.poll_interval);
        loop {
            tokio::select! {
                _ = interval.tick() => self.tick(unix_now()),
                _ = shutdown.changed() => {
                    info!("Round scheduler stopping");
                    break;
                }
            }
        }
    }

    /// One poller pass: end expired rounds, then retry any completed
    /// round whose scores never landed.
    pub fn tick(&self, now: u64) {
        match self.store.find_expired_active(now) {
            Ok(expired) => {
                if !expired.is_empty() {
                    info!("Found {} expired round(s)", expired.len());
                }
                for round in expired {
                    match self.complete_round(&round.id, EndReason::TimeExpired, now) {
                        Ok(true) => info!("Round {} ended (timer expired)", round.id),
                        Ok(false) => {} // someone else got there first
                        Err(e) => error!("Failed to end round {}: {}", round.id, e),
                    }
                }
            }
            Err(e) => error!("Expiry check failed: {}", e),
        }

        match self.store.find_completed_unscored() {
            Ok(unscored) => {
                for round in unscored {
                    match self.score_completed_round(&round) {
                        Ok(()) => {
                            info!("Repaired scores for round {}", round.id);
                            let _ = self.events.send(RoundEvent::ScoresRepaired {
                                round_id: round.id.clone(),
                            });
                        }
                        Err(e) => error!("Score retry failed for round {}: {}", round.id, e),
                    }
                }
            }
            Err(e) => error!("Unscored sweep failed: {}", e),
        }
    }

    /// Complete a round exactly once.
    ///
    /// Returns `Ok(true)` for the caller that won the compare-and-swap
    /// and ran the pipeline, `Ok(false)` for everyone who lost the race
    /// (not an error - the loser just skips). A scoring failure leaves
    /// the round Completed-but-unscored for the retry sweep; the status
    /// is never reverted.
    pub fn complete_round(&self, round_id: &str, reason: EndReason, now: u64) -> Result<bool> {
        if !self.store.try_complete_round(round_id, now)? {
            return Ok(false);
        }

        let round = self
            .store
            .get_round(round_id)?
            .ok_or_else(|| Error::NotFound(format!("round {round_id}")))?;

        if let Err(e) = self.score_completed_round(&round) {
            error!("Scoring failed for round {}: {}", round_id, e);
        }

        let _ = self.events.send(RoundEvent::RoundEnded {
            round_id: round.id.clone(),
            game_id: round.game_id.clone(),
            lobby_id: round.lobby_id.clone(),
            round_number: round.round_number,
            end_time: round.end_time.unwrap_or(now),
            reason,
        });

        Ok(true)
    }

    /// The scoring pipeline for a completed round.
    ///
    /// Reconciles the roster (synthesizing PASS records exactly once),
    /// snapshots the submissions - immutable now that the round is
    /// Completed - runs the engine, and upserts every score. Pure given
    /// its inputs, so re-running is safe.
    pub fn score_completed_round(&self, round: &Round) -> Result<()> {
        let members = self.store.lobby_members(&round.lobby_id)?;
        let stamp = round.end_time.unwrap_or_else(unix_now);

        let created = self.store.synthesize_passes(&round.id, &members, stamp)?;
        if created > 0 {
            debug!(
                "Synthesized {} PASS submission(s) for round {}",
                created, round.id
            );
        }

        let submissions = self.store.list_submissions(&round.id)?;
        let records: Vec<_> = submissions.iter().map(Submission::record).collect();

        let scored =
            gambit_scoring::score_round(&records, &members, &round.correct_answer, &round.params)?;

        for node in &scored {
            self.store
                .upsert_score(&RoundScore::from_scored(&round.id, node))?;
        }

        debug!("Scored {} participant(s) for round {}", scored.len(), round.id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Lobby, RoundStatus};
    use gambit_scoring::{Action, ScoringParams};
    use tempfile::tempdir;

    fn setup() -> (
        tempfile::TempDir,
        Arc<Store>,
        Arc<RoundScheduler>,
        broadcast::Receiver<RoundEvent>,
    ) {
        let dir = tempdir().unwrap();
        let store = Arc::new(Store::open(dir.path()).unwrap());
        let (tx, rx) = broadcast::channel(64);
        let scheduler = Arc::new(RoundScheduler::new(
            Arc::clone(&store),
            tx,
            Duration::from_secs(5),
        ));
        (dir, store, scheduler, rx)
    }

    fn seed_lobby(store: &Store, members: &[&str]) {
        let mut lobby = Lobby::new("l1".into(), "Table 1".into());
        for m in members {
            lobby.add_member(m.to_string());
        }
        store.put_lobby(&lobby).unwrap();
    }

    fn seed_active_round(store: &Store, id: &str, params: ScoringParams) {
        let round = Round::new(
            id.into(),
            "g1".into(),
            "l1".into(),
            1,
            "Capital of France?".into(),
            "PARIS".into(),
            60,
            params,
        );
        store.create_round(&round).unwrap();
        store.start_round(id, 100).unwrap();
    }

    fn solve(store: &Store, round_id: &str, who: &str, answer: &str) {
        store
            .put_submission(&Submission::new(
                round_id.into(),
                who.into(),
                Action::Solve,
                Some(answer.into()),
                None,
                110,
            ))
            .unwrap();
    }

    #[test]
    fn tick_completes_and_scores_expired_round() {
        let (_dir, store, scheduler, mut rx) = setup();
        seed_lobby(&store, &["alice", "bob", "carol"]);
        seed_active_round(&store, "r1", ScoringParams::default());
        solve(&store, "r1", "alice", "paris");

        // Not yet expired: nothing happens.
        scheduler.tick(159);
        assert_eq!(
            store.get_round("r1").unwrap().unwrap().status,
            RoundStatus::Active
        );

        scheduler.tick(160);
        let round = store.get_round("r1").unwrap().unwrap();
        assert_eq!(round.status, RoundStatus::Completed);
        assert_eq!(round.end_time, Some(160));

        // Every roster member is scored; the silent two as passes.
        let scores = store.list_scores("r1").unwrap();
        assert_eq!(scores.len(), 3);
        let alice = scores
            .iter()
            .find(|s| s.participant_id == "alice")
            .unwrap();
        assert!((alice.total_score - 1.0).abs() < 1e-9);

        let subs = store.list_submissions("r1").unwrap();
        assert_eq!(subs.iter().filter(|s| s.synthesized).count(), 2);

        let event = rx.try_recv().unwrap();
        assert!(matches!(event, RoundEvent::RoundEnded { reason: EndReason::TimeExpired, .. }));
    }

    #[test]
    fn admin_end_wins_and_poller_skips() {
        let (_dir, store, scheduler, mut rx) = setup();
        seed_lobby(&store, &["alice", "bob"]);
        seed_active_round(&store, "r1", ScoringParams::default());
        solve(&store, "r1", "alice", "PARIS");

        assert!(scheduler
            .complete_round("r1", EndReason::AdminEnded, 130)
            .unwrap());

        // The poller finds nothing left to do.
        scheduler.tick(160);
        assert!(!scheduler
            .complete_round("r1", EndReason::TimeExpired, 160)
            .unwrap());

        // Exactly one RoundEnded event.
        assert!(matches!(
            rx.try_recv().unwrap(),
            RoundEvent::RoundEnded { reason: EndReason::AdminEnded, .. }
        ));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn concurrent_completions_have_one_winner() {
        let (_dir, store, scheduler, _rx) = setup();
        seed_lobby(&store, &["alice", "bob"]);
        seed_active_round(&store, "r1", ScoringParams::default());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let scheduler = Arc::clone(&scheduler);
            handles.push(std::thread::spawn(move || {
                scheduler
                    .complete_round("r1", EndReason::TimeExpired, 160)
                    .unwrap()
            }));
        }
        let winners: usize = handles
            .into_iter()
            .map(|h| usize::from(h.join().unwrap()))
            .sum();
        assert_eq!(winners, 1);

        assert_eq!(store.list_scores("r1").unwrap().len(), 2);
    }

    #[test]
    fn one_bad_round_does_not_block_the_tick() {
        let (_dir, store, scheduler, _rx) = setup();
        seed_lobby(&store, &["alice", "bob"]);
        // Invalid gamma: scoring for this round always fails.
        let bad_params = ScoringParams {
            gamma: -1.0,
            ..Default::default()
        };
        seed_active_round(&store, "r-bad", bad_params);
        seed_active_round(&store, "r-good", ScoringParams::default());
        solve(&store, "r-good", "alice", "paris");

        scheduler.tick(160);

        // Both rounds completed; only the good one has scores.
        for id in ["r-bad", "r-good"] {
            assert_eq!(
                store.get_round(id).unwrap().unwrap().status,
                RoundStatus::Completed
            );
        }
        assert!(store.has_scores("r-good").unwrap());
        assert!(!store.has_scores("r-bad").unwrap());
    }

    #[test]
    fn retry_sweep_repairs_unscored_round() {
        let (_dir, store, scheduler, mut rx) = setup();
        seed_lobby(&store, &["alice", "bob"]);
        seed_active_round(&store, "r1", ScoringParams::default());
        solve(&store, "r1", "alice", "paris");

        // Simulate a crash between the CAS and the pipeline: the round
        // is Completed but no scores were written.
        assert!(store.try_complete_round("r1", 160).unwrap());
        assert!(!store.has_scores("r1").unwrap());

        scheduler.tick(165);

        assert!(store.has_scores("r1").unwrap());
        assert_eq!(store.list_scores("r1").unwrap().len(), 2);
        assert!(matches!(
            rx.try_recv().unwrap(),
            RoundEvent::ScoresRepaired { .. }
        ));
    }

    #[test]
    fn rescoring_is_idempotent() {
        let (_dir, store, scheduler, _rx) = setup();
        seed_lobby(&store, &["alice", "bob"]);
        seed_active_round(&store, "r1", ScoringParams::default());
        solve(&store, "r1", "alice", "paris");

        scheduler.tick(160);
        let first = store.list_scores("r1").unwrap();

        let round = store.get_round("r1").unwrap().unwrap();
        scheduler.score_completed_round(&round).unwrap();
        let second = store.list_scores("r1").unwrap();

        assert_eq!(first, second);
    }
}
