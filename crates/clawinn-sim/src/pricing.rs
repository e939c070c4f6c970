//! Pricing policy.
//!
//! Pure functions over an injected RNG:
//! - [`calculate_worker_price`]: a worker's asking price
//! - [`evaluate_offer`]: an employer's reaction to a price
//! - [`worker_counter_proposal`]: how far a worker comes down

use clawinn_core::{Agent, NegotiationConfig};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Skills that command a premium.
pub const HIGH_VALUE_SKILLS: [&str; 3] = [
    "Smart Contract Auditing",
    "Security Auditing",
    "Solana Program Dev",
];

/// Lowest price a worker ever asks.
pub const MIN_WORKER_PRICE: u64 = 10;

/// An employer's reaction to a price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "response", content = "amount")]
pub enum OfferResponse {
    /// Take the price as is.
    Accept,
    /// Propose this amount instead.
    Counteroffer(u64),
    /// Walk away.
    Reject,
}

/// Asking price for `worker`.
///
/// Skill count sets the base, low or high balances shift it down or up, each
/// high-value skill adds a premium, and the total gets ±15% jitter. Never
/// below [`MIN_WORKER_PRICE`].
pub fn calculate_worker_price<R: Rng + ?Sized>(worker: &Agent, rng: &mut R) -> u64 {
    let skill_count = worker.skills.len() as f64;
    let base = skill_count.mul_add(30.0, 50.0).min(200.0);

    let balance_modifier = if worker.credits_balance < 200 {
        rng.gen_range(0.7..0.8)
    } else if worker.credits_balance > 1_000 {
        rng.gen_range(1.1..1.2)
    } else {
        1.0
    };

    let skill_premium: f64 = worker
        .skills
        .iter()
        .filter(|s| HIGH_VALUE_SKILLS.contains(&s.as_str()))
        .map(|_| rng.gen_range(10.0..30.0))
        .sum();

    let variance = rng.gen_range(0.85..1.15);
    let raw = base.mul_add(balance_modifier, skill_premium) * variance;

    (raw.round() as u64).max(MIN_WORKER_PRICE)
}

/// Counter amount for an ask: 60-85% of it, at least 1.
fn counter_amount<R: Rng + ?Sized>(ask: u64, rng: &mut R) -> u64 {
    let share = rng.gen_range(0.6..0.85);
    ((ask as f64 * share).round() as u64).max(1)
}

/// How an employer holding `balance` credits reacts to `ask`.
///
/// | ask vs balance       | accept | counter | reject |
/// |----------------------|--------|---------|--------|
/// | ≤ 15%                | 70%    | 30%     | 0%     |
/// | ≤ 30%                | 30%    | 60%     | 10%    |
/// | > 50%                | 0%     | 40%     | 60%    |
/// | otherwise            | 25%    | 50%     | 25%    |
///
/// Bands compare `ask` against scaled balances, so a zero balance lands in
/// the last-resort "> 50%" band instead of dividing by zero.
pub fn evaluate_offer<R: Rng + ?Sized>(balance: u64, ask: u64, rng: &mut R) -> OfferResponse {
    let balance = balance as f64;
    let ask_f = ask as f64;
    let roll: f64 = rng.r#gen();

    if ask_f <= balance * 0.15 {
        if roll < 0.7 {
            OfferResponse::Accept
        } else {
            OfferResponse::Counteroffer(counter_amount(ask, rng))
        }
    } else if ask_f <= balance * 0.30 {
        if roll < 0.3 {
            OfferResponse::Accept
        } else if roll < 0.9 {
            OfferResponse::Counteroffer(counter_amount(ask, rng))
        } else {
            OfferResponse::Reject
        }
    } else if ask_f > balance * 0.5 {
        if roll < 0.6 {
            OfferResponse::Reject
        } else {
            OfferResponse::Counteroffer(counter_amount(ask, rng))
        }
    } else if roll < 0.25 {
        OfferResponse::Accept
    } else if roll < 0.75 {
        OfferResponse::Counteroffer(counter_amount(ask, rng))
    } else {
        OfferResponse::Reject
    }
}

/// Whether a worker asking `worker_price` takes `offered` in `counter_round`.
pub fn worker_accepts(offered: u64, worker_price: u64, counter_round: u32, cfg: &NegotiationConfig) -> bool {
    if worker_price == 0 {
        return true;
    }
    offered as f64 / worker_price as f64 >= cfg.accept_threshold(counter_round)
}

/// The worker's reply to a low offer: close a random share of the gap.
pub fn worker_counter_proposal<R: Rng + ?Sized>(
    offered: u64,
    worker_price: u64,
    cfg: &NegotiationConfig,
    rng: &mut R,
) -> u64 {
    let gap = worker_price.saturating_sub(offered) as f64;
    let share = if cfg.worker_counter_min_share < cfg.worker_counter_max_share {
        rng.gen_range(cfg.worker_counter_min_share..cfg.worker_counter_max_share)
    } else {
        cfg.worker_counter_min_share
    };
    (gap.mul_add(share, offered as f64).round() as u64).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use clawinn_core::AgentRole;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use test_case::test_case;
    use uuid::Uuid;

    fn worker(balance: u64, skills: &[&str]) -> Agent {
        Agent::new(Uuid::new_v4(), "Cipher", AgentRole::Worker, balance, Utc::now())
            .with_skills(skills.iter().copied())
    }

    // ========================================================================
    // Worker price
    // ========================================================================

    #[test]
    fn no_skills_mid_balance_stays_near_base() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..200 {
            let price = calculate_worker_price(&worker(500, &[]), &mut rng);
            assert!((42..=58).contains(&price), "price {price}");
        }
    }

    #[test]
    fn base_caps_at_two_hundred() {
        let skills = ["a", "b", "c", "d", "e", "f", "g"];
        let mut rng = StdRng::seed_from_u64(2);
        for _ in 0..200 {
            let price = calculate_worker_price(&worker(500, &skills), &mut rng);
            assert!(price <= 230, "price {price}");
        }
    }

    #[test]
    fn high_value_skills_add_premium() {
        let mut rng = StdRng::seed_from_u64(3);
        let plain = worker(500, &["Data Analysis"]);
        let premium = worker(500, &["Security Auditing"]);
        let plain_total: u64 = (0..500).map(|_| calculate_worker_price(&plain, &mut rng)).sum();
        let premium_total: u64 = (0..500).map(|_| calculate_worker_price(&premium, &mut rng)).sum();
        assert!(premium_total > plain_total);
    }

    #[test]
    fn poor_workers_ask_less_than_rich_ones() {
        let mut rng = StdRng::seed_from_u64(4);
        let poor = worker(100, &["Data Analysis"]);
        let rich = worker(5_000, &["Data Analysis"]);
        let poor_max = (0..300).map(|_| calculate_worker_price(&poor, &mut rng)).max();
        let rich_min = (0..300).map(|_| calculate_worker_price(&rich, &mut rng)).min();
        assert!(poor_max < rich_min);
    }

    // ========================================================================
    // Offer evaluation
    // ========================================================================

    fn tally(balance: u64, ask: u64, trials: usize) -> (usize, usize, usize) {
        let mut rng = StdRng::seed_from_u64(99);
        let mut counts = (0, 0, 0);
        for _ in 0..trials {
            match evaluate_offer(balance, ask, &mut rng) {
                OfferResponse::Accept => counts.0 += 1,
                OfferResponse::Counteroffer(amount) => {
                    assert!((60..=85).contains(&amount), "counter {amount}");
                    counts.1 += 1;
                }
                OfferResponse::Reject => counts.2 += 1,
            }
        }
        counts
    }

    #[test]
    fn cheap_ask_is_mostly_accepted_never_rejected() {
        let (accept, counter, reject) = tally(1_000, 100, 10_000);
        assert_eq!(reject, 0);
        assert!((6_700..=7_300).contains(&accept), "accept {accept}");
        assert!((2_700..=3_300).contains(&counter), "counter {counter}");
    }

    #[test_case(1_000, 250, 0.30, 0.60, 0.10 ; "up to thirty percent")]
    #[test_case(1_000, 400, 0.25, 0.50, 0.25 ; "thirty to fifty percent")]
    #[test_case(1_000, 800, 0.00, 0.40, 0.60 ; "over half")]
    #[test_case(0, 100, 0.00, 0.40, 0.60 ; "broke employer")]
    fn band_distribution(balance: u64, ask: u64, accept: f64, counter: f64, reject: f64) {
        let trials = 10_000;
        let mut rng = StdRng::seed_from_u64(7);
        let mut counts = [0usize; 3];
        for _ in 0..trials {
            match evaluate_offer(balance, ask, &mut rng) {
                OfferResponse::Accept => counts[0] += 1,
                OfferResponse::Counteroffer(_) => counts[1] += 1,
                OfferResponse::Reject => counts[2] += 1,
            }
        }
        for (observed, expected) in counts.iter().zip([accept, counter, reject]) {
            let share = *observed as f64 / trials as f64;
            assert!((share - expected).abs() < 0.03, "share {share} vs {expected}");
        }
    }

    // ========================================================================
    // Worker side
    // ========================================================================

    #[test]
    fn round_two_offer_of_eighty_is_accepted() {
        let cfg = NegotiationConfig::default();
        assert!(worker_accepts(80, 100, 2, &cfg));
    }

    #[test_case(69, 0, false ; "below seventy in round zero")]
    #[test_case(70, 0, true ; "seventy in round zero")]
    #[test_case(59, 1, false ; "below sixty in round one")]
    #[test_case(50, 3, true ; "floor in late rounds")]
    #[test_case(49, 3, false ; "below floor")]
    fn acceptance_threshold(offered: u64, round: u32, accepted: bool) {
        let cfg = NegotiationConfig::default();
        assert_eq!(worker_accepts(offered, 100, round, &cfg), accepted);
    }

    #[test]
    fn worker_counter_closes_part_of_gap() {
        let cfg = NegotiationConfig::default();
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..500 {
            let counter = worker_counter_proposal(60, 100, &cfg, &mut rng);
            assert!((72..=84).contains(&counter), "counter {counter}");
        }
    }

    proptest! {
        #[test]
        fn price_is_at_least_ten(
            seed: u64,
            balance in 0u64..20_000,
            skill_count in 0usize..8,
            premium in proptest::bool::ANY,
        ) {
            let mut skills: Vec<String> = (0..skill_count).map(|i| format!("Skill {i}")).collect();
            if premium {
                skills.push(HIGH_VALUE_SKILLS[0].to_string());
            }
            let agent = Agent::new(Uuid::new_v4(), "P", AgentRole::Worker, balance, Utc::now())
                .with_skills(skills);
            let mut rng = StdRng::seed_from_u64(seed);
            prop_assert!(calculate_worker_price(&agent, &mut rng) >= MIN_WORKER_PRICE);
        }

        #[test]
        fn counteroffers_stay_in_band(seed: u64, balance in 0u64..10_000, ask in 1u64..5_000) {
            let mut rng = StdRng::seed_from_u64(seed);
            if let OfferResponse::Counteroffer(amount) = evaluate_offer(balance, ask, &mut rng) {
                let low = ((ask as f64 * 0.6).round() as u64).max(1);
                let high = ((ask as f64 * 0.85).round() as u64).max(1);
                prop_assert!(amount >= low && amount <= high, "{amount} not in [{low}, {high}]");
            }
        }

        #[test]
        fn worker_counter_between_offer_and_price(seed: u64, offered in 1u64..1_000, extra in 0u64..1_000) {
            let cfg = NegotiationConfig::default();
            let price = offered + extra;
            let mut rng = StdRng::seed_from_u64(seed);
            let counter = worker_counter_proposal(offered, price, &cfg, &mut rng);
            prop_assert!(counter >= offered && counter <= price);
        }
    }
}
