//! Persistent storage using RocksDB.
//!
//! Key layout: `lobby:{id}`, `round:{id}`, `sub:{round}:{participant}`,
//! `score:{round}:{participant}`, all with JSON values.
//!
//! The store owns the only shared mutable state in the system - round
//! status and the submission set. Status transitions and guarded
//! submission writes are serialized behind an internal mutex, so the
//! compare-and-swap semantics hold without callers doing any locking of
//! their own.

use crate::error::{Error, RejectReason, Result};
use crate::models::{Lobby, Round, RoundScore, RoundStatus, Submission};
use gambit_scoring::Action;
use rocksdb::{Options, DB};
use std::path::Path;
use std::sync::Mutex;

/// Storage backend for game data.
pub struct Store {
    db: DB,
    /// Serializes round-status transitions and guarded submission writes.
    write_lock: Mutex<()>,
}

impl Store {
    /// Open or create storage at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        let db = DB::open(&opts, path)?;
        Ok(Self {
            db,
            write_lock: Mutex::new(()),
        })
    }

    // --- Lobbies ---

    /// Store a lobby.
    pub fn put_lobby(&self, lobby: &Lobby) -> Result<()> {
        let key = format!("lobby:{}", lobby.id);
        let value = serde_json::to_vec(lobby)?;
        self.db.put(key.as_bytes(), value)?;
        Ok(())
    }

    /// Get a lobby by ID.
    pub fn get_lobby(&self, id: &str) -> Result<Option<Lobby>> {
        let key = format!("lobby:{}", id);
        match self.db.get(key.as_bytes())? {
            Some(data) => Ok(Some(serde_json::from_slice(&data)?)),
            None => Ok(None),
        }
    }

    /// List all lobbies.
    pub fn list_lobbies(&self) -> Result<Vec<Lobby>> {
        self.list_prefix("lobby:")
    }

    /// The roster query: every participant expected to act in the round.
    pub fn lobby_members(&self, lobby_id: &str) -> Result<Vec<String>> {
        let lobby = self
            .get_lobby(lobby_id)?
            .ok_or_else(|| Error::NotFound(format!("lobby {lobby_id}")))?;
        Ok(lobby.members)
    }

    /// Add a member to a lobby. Returns false if already present.
    pub fn add_lobby_member(&self, lobby_id: &str, participant_id: String) -> Result<bool> {
        let _guard = self.write_lock.lock().expect("store lock poisoned");
        let mut lobby = self
            .get_lobby(lobby_id)?
            .ok_or_else(|| Error::NotFound(format!("lobby {lobby_id}")))?;
        let added = lobby.add_member(participant_id);
        if added {
            self.put_lobby(&lobby)?;
        }
        Ok(added)
    }

    // --- Rounds ---

    /// Store a newly created round.
    pub fn create_round(&self, round: &Round) -> Result<()> {
        self.put_round(round)
    }

    fn put_round(&self, round: &Round) -> Result<()> {
        let key = format!("round:{}", round.id);
        let value = serde_json::to_vec(round)?;
        self.db.put(key.as_bytes(), value)?;
        Ok(())
    }

    /// Get a round by ID.
    pub fn get_round(&self, id: &str) -> Result<Option<Round>> {
        let key = format!("round:{}", id);
        match self.db.get(key.as_bytes())? {
            Some(data) => Ok(Some(serde_json::from_slice(&data)?)),
            None => Ok(None),
        }
    }

    /// List every round for a lobby.
    pub fn list_rounds_for_lobby(&self, lobby_id: &str) -> Result<Vec<Round>> {
        let mut rounds: Vec<Round> = self.list_prefix("round:")?;
        rounds.retain(|r: &Round| r.lobby_id == lobby_id);
        rounds.sort_by_key(|r| r.round_number);
        Ok(rounds)
    }

    /// Pending → Active transition; records the start time.
    ///
    /// Fails unless the round is currently Pending.
    pub fn start_round(&self, id: &str, now: u64) -> Result<Round> {
        let _guard = self.write_lock.lock().expect("store lock poisoned");
        let mut round = self
            .get_round(id)?
            .ok_or_else(|| Error::NotFound(format!("round {id}")))?;
        if round.status != RoundStatus::Pending {
            return Err(Error::InvalidInput(format!(
                "round {id} is not pending"
            )));
        }
        round.status = RoundStatus::Active;
        round.start_time = Some(now);
        self.put_round(&round)?;
        Ok(round)
    }

    /// Active → Completed compare-and-swap; records the end time.
    ///
    /// Returns `true` only for the single caller that performed the
    /// transition. Everyone else - a poller tick racing an admin end,
    /// or a repeat call - gets `false` and must skip the scoring
    /// pipeline.
    pub fn try_complete_round(&self, id: &str, now: u64) -> Result<bool> {
        let _guard = self.write_lock.lock().expect("store lock poisoned");
        let mut round = self
            .get_round(id)?
            .ok_or_else(|| Error::NotFound(format!("round {id}")))?;
        if round.status != RoundStatus::Active {
            return Ok(false);
        }
        round.status = RoundStatus::Completed;
        round.end_time = Some(now);
        self.put_round(&round)?;
        Ok(true)
    }

    /// All active rounds whose timer has run out at `now`.
    pub fn find_expired_active(&self, now: u64) -> Result<Vec<Round>> {
        let mut rounds: Vec<Round> = self.list_prefix("round:")?;
        rounds.retain(|r: &Round| r.is_expired(now));
        Ok(rounds)
    }

    /// Completed rounds with no persisted scores - candidates for the
    /// retry sweep after a failed scoring run.
    pub fn find_completed_unscored(&self) -> Result<Vec<Round>> {
        let rounds: Vec<Round> = self.list_prefix("round:")?;
        let mut unscored = Vec::new();
        for round in rounds {
            if round.status == RoundStatus::Completed && !self.has_scores(&round.id)? {
                unscored.push(round);
            }
        }
        Ok(unscored)
    }

    // --- Submissions ---

    fn submission_key(round_id: &str, participant_id: &str) -> String {
        format!("sub:{}:{}", round_id, participant_id)
    }

    /// Write-guarded submission intake.
    ///
    /// Rejects with a [`RejectReason`] unless the round is Active, the
    /// participant hasn't acted yet, and a DELEGATE target is another
    /// lobby member. The first write wins; a repeat is an explicit
    /// `DUPLICATE` rejection, never a silent overwrite.
    pub fn put_submission(&self, sub: &Submission) -> Result<()> {
        if let Some(msg) = sub.shape_error() {
            return Err(Error::InvalidInput(msg.to_string()));
        }

        let _guard = self.write_lock.lock().expect("store lock poisoned");

        let round = self
            .get_round(&sub.round_id)?
            .ok_or_else(|| Error::NotFound(format!("round {}", sub.round_id)))?;
        if round.status != RoundStatus::Active {
            return Err(Error::Rejected(RejectReason::RoundNotActive));
        }

        let key = Self::submission_key(&sub.round_id, &sub.participant_id);
        if self.db.get(key.as_bytes())?.is_some() {
            return Err(Error::Rejected(RejectReason::Duplicate));
        }

        if sub.action == Action::Delegate {
            let target = sub.delegate_to.as_deref().unwrap_or_default();
            let lobby = self
                .get_lobby(&round.lobby_id)?
                .ok_or_else(|| Error::NotFound(format!("lobby {}", round.lobby_id)))?;
            if target == sub.participant_id || !lobby.contains(target) {
                return Err(Error::Rejected(RejectReason::InvalidTarget));
            }
        }

        let value = serde_json::to_vec(sub)?;
        self.db.put(key.as_bytes(), value)?;
        Ok(())
    }

    /// All submissions for a round.
    pub fn list_submissions(&self, round_id: &str) -> Result<Vec<Submission>> {
        self.list_prefix(&format!("sub:{}:", round_id))
    }

    /// Number of submissions recorded for a round.
    pub fn submission_count(&self, round_id: &str) -> Result<usize> {
        Ok(self.list_submissions(round_id)?.len())
    }

    /// Materialize a PASS for every roster member without a submission.
    ///
    /// Part of the completion step, after the status CAS - the round is
    /// no longer accepting writes, so the reconciliation can't race new
    /// submissions. Skips participants that already have a record,
    /// making retries safe. Returns how many passes were created.
    pub fn synthesize_passes(
        &self,
        round_id: &str,
        members: &[String],
        now: u64,
    ) -> Result<usize> {
        let _guard = self.write_lock.lock().expect("store lock poisoned");
        let mut created = 0;
        for member in members {
            let key = Self::submission_key(round_id, member);
            if self.db.get(key.as_bytes())?.is_some() {
                continue;
            }
            let pass = Submission::synthesized_pass(round_id.to_string(), member.clone(), now);
            self.db.put(key.as_bytes(), serde_json::to_vec(&pass)?)?;
            created += 1;
        }
        Ok(created)
    }

    // --- Scores ---

    /// Upsert one participant's score for a round. Recomputation
    /// overwrites deterministically.
    pub fn upsert_score(&self, score: &RoundScore) -> Result<()> {
        let key = format!("score:{}:{}", score.round_id, score.participant_id);
        let value = serde_json::to_vec(score)?;
        self.db.put(key.as_bytes(), value)?;
        Ok(())
    }

    /// All scores for a round.
    pub fn list_scores(&self, round_id: &str) -> Result<Vec<RoundScore>> {
        self.list_prefix(&format!("score:{}:", round_id))
    }

    /// Whether any score exists for the round.
    pub fn has_scores(&self, round_id: &str) -> Result<bool> {
        let prefix = format!("score:{}:", round_id);
        let mut iter = self.db.prefix_iterator(prefix.as_bytes());
        match iter.next() {
            Some(item) => {
                let (key, _) = item?;
                Ok(key.starts_with(prefix.as_bytes()))
            }
            None => Ok(false),
        }
    }

    // --- Helpers ---

    fn list_prefix<T: serde::de::DeserializeOwned>(&self, prefix: &str) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let iter = self.db.prefix_iterator(prefix.as_bytes());
        for item in iter {
            let (key, value) = item?;
            if key.starts_with(prefix.as_bytes()) {
                items.push(serde_json::from_slice(&value)?);
            } else {
                break;
            }
        }
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gambit_scoring::ScoringParams;
    use tempfile::tempdir;

    fn store() -> (tempfile::TempDir, Store) {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        (dir, store)
    }

    fn seed_lobby(store: &Store, members: &[&str]) -> Lobby {
        let mut lobby = Lobby::new("l1".into(), "Table 1".into());
        for m in members {
            lobby.add_member(m.to_string());
        }
        store.put_lobby(&lobby).unwrap();
        lobby
    }

    fn seed_round(store: &Store) -> Round {
        let round = Round::new(
            "r1".into(),
            "g1".into(),
            "l1".into(),
            1,
            "Capital of France?".into(),
            "PARIS".into(),
            60,
            ScoringParams::default(),
        );
        store.create_round(&round).unwrap();
        round
    }

    fn submission(action: Action, participant: &str) -> Submission {
        let (answer, target) = match action {
            Action::Solve => (Some("PARIS".to_string()), None),
            Action::Delegate => (None, Some("bob".to_string())),
            Action::Pass => (None, None),
        };
        Submission::new("r1".into(), participant.into(), action, answer, target, 10)
    }

    #[test]
    fn round_roundtrip() {
        let (_dir, store) = store();
        let round = seed_round(&store);
        let loaded = store.get_round("r1").unwrap().unwrap();
        assert_eq!(round, loaded);
    }

    #[test]
    fn start_requires_pending() {
        let (_dir, store) = store();
        seed_round(&store);

        let started = store.start_round("r1", 100).unwrap();
        assert_eq!(started.status, RoundStatus::Active);
        assert_eq!(started.start_time, Some(100));

        assert!(store.start_round("r1", 101).is_err());
    }

    #[test]
    fn complete_cas_single_winner() {
        let (_dir, store) = store();
        seed_round(&store);
        store.start_round("r1", 100).unwrap();

        assert!(store.try_complete_round("r1", 160).unwrap());
        assert!(!store.try_complete_round("r1", 161).unwrap());

        let round = store.get_round("r1").unwrap().unwrap();
        assert_eq!(round.status, RoundStatus::Completed);
        assert_eq!(round.end_time, Some(160));
    }

    #[test]
    fn complete_skips_pending_round() {
        let (_dir, store) = store();
        seed_round(&store);
        assert!(!store.try_complete_round("r1", 160).unwrap());
    }

    #[test]
    fn submission_rejected_unless_active() {
        let (_dir, store) = store();
        seed_lobby(&store, &["alice", "bob"]);
        seed_round(&store);

        let err = store
            .put_submission(&submission(Action::Solve, "alice"))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Rejected(RejectReason::RoundNotActive)
        ));

        store.start_round("r1", 100).unwrap();
        store
            .put_submission(&submission(Action::Solve, "alice"))
            .unwrap();

        store.try_complete_round("r1", 160).unwrap();
        let err = store
            .put_submission(&submission(Action::Solve, "bob"))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Rejected(RejectReason::RoundNotActive)
        ));
    }

    #[test]
    fn duplicate_submission_rejected_not_overwritten() {
        let (_dir, store) = store();
        seed_lobby(&store, &["alice", "bob"]);
        seed_round(&store);
        store.start_round("r1", 100).unwrap();

        store
            .put_submission(&submission(Action::Solve, "alice"))
            .unwrap();
        let err = store
            .put_submission(&submission(Action::Pass, "alice"))
            .unwrap_err();
        assert!(matches!(err, Error::Rejected(RejectReason::Duplicate)));

        // The original survives.
        let subs = store.list_submissions("r1").unwrap();
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].action, Action::Solve);
    }

    #[test]
    fn delegate_target_must_be_another_member() {
        let (_dir, store) = store();
        seed_lobby(&store, &["alice", "bob"]);
        seed_round(&store);
        store.start_round("r1", 100).unwrap();

        // Unknown target
        let mut sub = submission(Action::Delegate, "alice");
        sub.delegate_to = Some("stranger".into());
        assert!(matches!(
            store.put_submission(&sub).unwrap_err(),
            Error::Rejected(RejectReason::InvalidTarget)
        ));

        // Self-delegation
        let mut sub = submission(Action::Delegate, "alice");
        sub.delegate_to = Some("alice".into());
        assert!(matches!(
            store.put_submission(&sub).unwrap_err(),
            Error::Rejected(RejectReason::InvalidTarget)
        ));

        // Valid member target
        let sub = submission(Action::Delegate, "alice");
        store.put_submission(&sub).unwrap();
    }

    #[test]
    fn synthesize_passes_once_per_silent_member() {
        let (_dir, store) = store();
        let lobby = seed_lobby(&store, &["alice", "bob", "carol"]);
        seed_round(&store);
        store.start_round("r1", 100).unwrap();
        store
            .put_submission(&submission(Action::Solve, "alice"))
            .unwrap();
        store.try_complete_round("r1", 160).unwrap();

        let created = store
            .synthesize_passes("r1", &lobby.members, 160)
            .unwrap();
        assert_eq!(created, 2);

        // Retry creates nothing new.
        let created = store
            .synthesize_passes("r1", &lobby.members, 161)
            .unwrap();
        assert_eq!(created, 0);

        let subs = store.list_submissions("r1").unwrap();
        assert_eq!(subs.len(), 3);
        let synthesized = subs.iter().filter(|s| s.synthesized).count();
        assert_eq!(synthesized, 2);
    }

    #[test]
    fn scores_upsert_and_query() {
        let (_dir, store) = store();
        assert!(!store.has_scores("r1").unwrap());

        let score = RoundScore {
            round_id: "r1".into(),
            participant_id: "alice".into(),
            total_score: 1.2,
            in_cycle: false,
            distance: Some(0),
        };
        store.upsert_score(&score).unwrap();
        assert!(store.has_scores("r1").unwrap());

        // Overwrite is deterministic, not additive.
        store.upsert_score(&score).unwrap();
        let scores = store.list_scores("r1").unwrap();
        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0], score);
    }

    #[test]
    fn expired_active_query_honors_boundary() {
        let (_dir, store) = store();
        seed_round(&store);
        store.start_round("r1", 100).unwrap();

        assert!(store.find_expired_active(159).unwrap().is_empty());
        let expired = store.find_expired_active(160).unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].id, "r1");
    }

    #[test]
    fn completed_unscored_query() {
        let (_dir, store) = store();
        seed_round(&store);
        store.start_round("r1", 100).unwrap();
        store.try_complete_round("r1", 160).unwrap();

        let unscored = store.find_completed_unscored().unwrap();
        assert_eq!(unscored.len(), 1);

        store
            .upsert_score(&RoundScore {
                round_id: "r1".into(),
                participant_id: "alice".into(),
                total_score: 0.0,
                in_cycle: false,
                distance: None,
            })
            .unwrap();
        assert!(store.find_completed_unscored().unwrap().is_empty());
    }
}
