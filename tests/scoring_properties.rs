//! Randomized invariant checks for the scoring ledger.
//!
//! Each test drives a seeded stream of awards and decays and checks the
//! invariants after every step.

use rand::{rngs::StdRng, Rng, SeedableRng};

use engagefx::clock::ManualClock;
use engagefx::config::LedgerConfig;
use engagefx::engine::signals::{NullSink, RecordingSink};
use engagefx::scoring::{level_for, ActionKind, ScoringLedger, SessionContext};

const ACTIONS: [ActionKind; 6] = [
    ActionKind::Comment,
    ActionKind::Like,
    ActionKind::Gift,
    ActionKind::Motion,
    ActionKind::Effect,
    ActionKind::Voice,
];

fn ledger(seed: u64) -> (ScoringLedger, StdRng) {
    let ledger = ScoringLedger::with_default_catalog(
        LedgerConfig::default(),
        ManualClock::shared(0),
        std::sync::Arc::new(NullSink),
    );
    (ledger, StdRng::seed_from_u64(seed))
}

fn random_ctx(rng: &mut StdRng) -> SessionContext {
    SessionContext {
        viewer_count: rng.gen_range(0..200),
        live_duration_ms: rng.gen_range(0..20_000_000),
        motion_streak_ms: rng.gen_range(0..600_000),
    }
}

#[test]
fn test_awarded_points_sum_to_ledger_total() {
    for seed in 0..5 {
        let (mut ledger, mut rng) = ledger(seed);
        let mut sum = 0u64;
        for _ in 0..2_000 {
            let id = format!("p{}", rng.gen_range(0..20));
            let action = ACTIONS[rng.gen_range(0..ACTIONS.len())];
            let base = rng.gen_range(0..200);
            let ctx = random_ctx(&mut rng);
            sum += ledger.add_points(&id, action, base, &ctx).awarded_points;
        }
        assert_eq!(ledger.total_points(), sum, "seed {}", seed);
    }
}

#[test]
fn test_levels_never_drop_from_awards() {
    let (mut ledger, mut rng) = ledger(11);
    let mut last_level = std::collections::HashMap::new();
    for _ in 0..3_000 {
        let id = format!("p{}", rng.gen_range(0..8));
        let action = ACTIONS[rng.gen_range(0..ACTIONS.len())];
        let out = ledger.add_points(&id, action, rng.gen_range(0..50), &SessionContext::default());
        let prev = last_level.insert(id.clone(), out.level).unwrap_or(1);
        assert!(out.level >= prev);
        assert_eq!(out.level, level_for(out.total_points).max(prev));
        assert_eq!(out.leveled_up, out.level > prev);
    }
}

#[test]
fn test_leaderboard_invariants_hold_under_decay() {
    let (mut ledger, mut rng) = ledger(23);
    for step in 0..1_500 {
        if step % 50 == 49 {
            let before: Vec<(String, u64)> = ledger.participants().map(|p| (p.id.clone(), p.points)).collect();
            ledger.apply_decay(rng.gen_range(0.0..=1.0)).unwrap();
            for (id, points) in before {
                assert!(ledger.participant(&id).unwrap().points <= points);
            }
        } else {
            let id = format!("p{}", rng.gen_range(0..30));
            let action = ACTIONS[rng.gen_range(0..ACTIONS.len())];
            ledger.add_points(&id, action, rng.gen_range(0..100), &SessionContext::default());
        }

        let board = ledger.leaderboard();
        assert!(board.len() <= 10);
        for pair in board.windows(2) {
            assert!(
                pair[0].points > pair[1].points
                    || (pair[0].points == pair[1].points && pair[0].participant_id < pair[1].participant_id)
            );
        }
        for (i, entry) in board.iter().enumerate() {
            assert_eq!(entry.rank, i + 1);
            assert_eq!(ledger.participant(&entry.participant_id).unwrap().points, entry.points);
        }
    }
}

#[test]
fn test_each_achievement_unlocks_once() {
    let sink = RecordingSink::shared();
    let mut ledger = ScoringLedger::with_default_catalog(LedgerConfig::default(), ManualClock::shared(0), sink.clone());
    let ctx = SessionContext {
        viewer_count: 5_000,
        live_duration_ms: 20_000_000,
        motion_streak_ms: 400_000,
    };
    for _ in 0..1_200 {
        for action in ACTIONS {
            ledger.add_points("star", action, 1, &ctx);
        }
    }
    let star = ledger.participant("star").unwrap();
    assert_eq!(star.achievements.len(), 11);
    assert_eq!(sink.count("achievementUnlocked"), 11);
}
