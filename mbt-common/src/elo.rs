//! ELO rating update for pairwise comparisons
//!
//! Classic logistic expected score with a fixed K factor:
//!
//! ```text
//! expected(a, b) = 1 / (1 + 10^((b - a) / 400))
//! winner' = winner + round(K * (1 - expected(winner, loser)))
//! loser'  = loser  + round(K * (0 - expected(loser, winner)))
//! ```

use serde::Serialize;

/// Adjustment factor applied to every fight
pub const K_FACTOR: f64 = 32.0;

/// Rating difference for which the stronger side is expected to win 10:1
const SCALE: f64 = 400.0;

/// Ratings of both sides after one fight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EloOutcome {
    pub winner: i64,
    pub loser: i64,
}

/// Probability that a side rated `rating` beats a side rated `opponent`
pub fn expected_score(rating: i64, opponent: i64) -> f64 {
    1.0 / (1.0 + 10f64.powf((opponent - rating) as f64 / SCALE))
}

/// Round half towards positive infinity (-2.5 -> -2, 2.5 -> 3)
fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

/// New ratings after `winner` beat `loser`
pub fn fight(winner: i64, loser: i64) -> EloOutcome {
    let expected_winner = expected_score(winner, loser);
    let expected_loser = expected_score(loser, winner);

    EloOutcome {
        winner: winner + round_half_up(K_FACTOR * (1.0 - expected_winner)),
        loser: loser + round_half_up(K_FACTOR * (0.0 - expected_loser)),
    }
}
