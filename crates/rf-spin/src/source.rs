//! Result sources — the upstream collaborator behind every spin
//!
//! The core never knows how results are produced. A [`ResultSource`] hands
//! back a settled [`SpinResponse`], `None` when the server returned nothing,
//! or an [`UpstreamError`].

use std::collections::VecDeque;
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::config::GridSpec;
use crate::error::UpstreamError;
use crate::result::{Balance, BonusInfo, FreeSpinInfo, SpinRequest, SpinResponse};
use crate::symbols::{SymbolKind, SymbolTable};

/// Outcome of one upstream request
pub type FetchResult = Result<Option<SpinResponse>, UpstreamError>;

/// Upstream spin result provider
pub trait ResultSource: Send + Sync {
    fn fetch(&self, request: SpinRequest) -> BoxFuture<'_, FetchResult>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// SCRIPTED SOURCE
// ═══════════════════════════════════════════════════════════════════════════════

/// Replays a fixed queue of outcomes in order
///
/// An exhausted script answers `Ok(None)`.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    script: Mutex<VecDeque<FetchResult>>,
    requests: Mutex<Vec<SpinRequest>>,
    latency: Duration,
}

impl ScriptedSource {
    pub fn new(outcomes: impl IntoIterator<Item = FetchResult>) -> Self {
        Self {
            script: Mutex::new(outcomes.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
            latency: Duration::ZERO,
        }
    }

    /// Every outcome is a successful response
    pub fn responses(responses: impl IntoIterator<Item = SpinResponse>) -> Self {
        Self::new(responses.into_iter().map(|r| Ok(Some(r))))
    }

    /// Simulated network latency before each answer
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn push(&self, outcome: FetchResult) {
        self.script.lock().push_back(outcome);
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().len()
    }

    /// Requests received so far, in order
    pub fn requests(&self) -> Vec<SpinRequest> {
        self.requests.lock().clone()
    }
}

impl ResultSource for ScriptedSource {
    fn fetch(&self, request: SpinRequest) -> BoxFuture<'_, FetchResult> {
        self.requests.lock().push(request);
        let outcome = self.script.lock().pop_front().unwrap_or(Ok(None));
        let latency = self.latency;
        async move {
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            outcome
        }
        .boxed()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SYNTHETIC SOURCE
// ═══════════════════════════════════════════════════════════════════════════════

/// Frequencies used by [`SyntheticSource`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticProfile {
    pub bet: f64,
    pub starting_balance: f64,
    /// Chance a spin wins anything
    pub hit_rate: f64,
    /// Chance a base spin awards free spins
    pub free_spin_rate: f64,
    /// Chance a base spin triggers the bonus game
    pub bonus_rate: f64,
    /// Chance a free-spin round awards extra rounds
    pub retrigger_rate: f64,
    /// Chance of a near miss (bonus on the trigger reels, no feature)
    pub near_miss_rate: f64,
    /// Chance the request fails in transport
    pub failure_rate: f64,
    pub free_spin_rounds: u32,
    pub retrigger_rounds: u32,
    pub latency_ms: u64,
}

impl Default for SyntheticProfile {
    fn default() -> Self {
        Self {
            bet: 1.0,
            starting_balance: 1000.0,
            hit_rate: 0.3,
            free_spin_rate: 0.02,
            bonus_rate: 0.01,
            retrigger_rate: 0.05,
            near_miss_rate: 0.05,
            failure_rate: 0.0,
            free_spin_rounds: 10,
            retrigger_rounds: 5,
            latency_ms: 80,
        }
    }
}

struct SyntheticState {
    rng: StdRng,
    balance: f64,
    /// (total, played) of the running free-spin award
    free_spins: Option<(u32, u32)>,
}

/// Seeded generator of plausible upstream results
pub struct SyntheticSource {
    grid: GridSpec,
    symbols: SymbolTable,
    profile: SyntheticProfile,
    state: Mutex<SyntheticState>,
}

impl SyntheticSource {
    pub fn new(grid: GridSpec, symbols: SymbolTable, profile: SyntheticProfile, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let balance = profile.starting_balance;
        Self {
            grid,
            symbols,
            profile,
            state: Mutex::new(SyntheticState {
                rng,
                balance,
                free_spins: None,
            }),
        }
    }

    pub fn balance(&self) -> f64 {
        self.state.lock().balance
    }

    pub fn profile(&self) -> &SyntheticProfile {
        &self.profile
    }

    /// Produce one response synchronously
    pub fn generate(&self, request: SpinRequest) -> FetchResult {
        let mut state = self.state.lock();
        let profile = &self.profile;

        if profile.failure_rate > 0.0 && state.rng.random_bool(profile.failure_rate.min(1.0)) {
            return Err(UpstreamError::Transport("synthetic connection drop".into()));
        }

        let mut reels = self.random_grid(&mut state.rng);
        let total_win = if state.rng.random_bool(profile.hit_rate.clamp(0.0, 1.0)) {
            round_cents(profile.bet * state.rng.random_range(0.2..8.0))
        } else {
            0.0
        };

        let before = state.balance;
        let stake = if request.is_free_spin() { 0.0 } else { profile.bet };
        let after = before - stake + total_win;
        state.balance = after;

        let mut response = SpinResponse::new(reels.clone(), total_win, Balance { before, after })
            .with_win_event(win_event_type(total_win, profile.bet));

        match request {
            SpinRequest::Base => {
                let roll: f64 = state.rng.random();
                if roll < profile.free_spin_rate {
                    self.place(&mut state.rng, &mut reels, SymbolKind::Scatter, &[0, 2, 4]);
                    state.free_spins = Some((profile.free_spin_rounds, 0));
                    response = response.with_free_spin(FreeSpinInfo {
                        total_rounds: profile.free_spin_rounds,
                        played_rounds: 0,
                        extra_rounds: 0,
                        feature_win: 0.0,
                    });
                } else if roll < profile.free_spin_rate + profile.bonus_rate {
                    let positions = self.place(&mut state.rng, &mut reels, SymbolKind::Bonus, &[0, 2, 4]);
                    response = response.with_bonus(BonusInfo {
                        positions,
                        history: Vec::new(),
                    });
                } else if roll < profile.free_spin_rate + profile.bonus_rate + profile.near_miss_rate {
                    self.place(&mut state.rng, &mut reels, SymbolKind::Bonus, &[0, 2]);
                }
            }
            SpinRequest::FreeSpin { .. } => {
                let (mut total, played) = state.free_spins.unwrap_or((profile.free_spin_rounds, 0));
                let extra = if state.rng.random_bool(profile.retrigger_rate.clamp(0.0, 1.0)) {
                    profile.retrigger_rounds
                } else {
                    0
                };
                total += extra;
                let played = played + 1;
                state.free_spins = if played >= total { None } else { Some((total, played)) };
                response = response.with_free_spin(FreeSpinInfo {
                    total_rounds: total,
                    played_rounds: played,
                    extra_rounds: extra,
                    feature_win: total_win,
                });
            }
        }

        response.reels = reels;
        Ok(Some(response))
    }

    fn random_grid(&self, rng: &mut StdRng) -> Vec<Vec<u32>> {
        let fillers = self.symbols.fillers();
        (0..self.grid.reels)
            .map(|_| {
                (0..self.grid.rows)
                    .map(|_| fillers[rng.random_range(0..fillers.len())])
                    .collect()
            })
            .collect()
    }

    /// Put one symbol of `kind` on each listed reel; returns flat positions
    fn place(&self, rng: &mut StdRng, reels: &mut [Vec<u32>], kind: SymbolKind, columns: &[usize]) -> Vec<u32> {
        let Some(&id) = self.symbols.ids_of(kind).first() else {
            return Vec::new();
        };
        let rows = self.grid.rows as usize;
        columns
            .iter()
            .filter_map(|&column| {
                let reel = reels.get_mut(column)?;
                let row = rng.random_range(0..rows);
                reel[row] = id;
                Some((column * rows + row) as u32)
            })
            .collect()
    }
}

impl ResultSource for SyntheticSource {
    fn fetch(&self, request: SpinRequest) -> BoxFuture<'_, FetchResult> {
        let outcome = self.generate(request);
        let latency = Duration::from_millis(self.profile.latency_ms);
        async move {
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            outcome
        }
        .boxed()
    }
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn win_event_type(total_win: f64, bet: f64) -> &'static str {
    let ratio = if bet > 0.0 { total_win / bet } else { 0.0 };
    match ratio {
        r if r >= 50.0 => "epicWin",
        r if r >= 25.0 => "megaWin",
        r if r >= 10.0 => "bigWin",
        _ => "normal",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::{BONUS_ID, SCATTER_ID};

    fn source(profile: SyntheticProfile) -> SyntheticSource {
        SyntheticSource::new(GridSpec::standard_5x3(), SymbolTable::standard(), profile, Some(7))
    }

    #[tokio::test]
    async fn test_scripted_replays_in_order() {
        let first = SpinResponse::new(vec![vec![1]], 1.0, Balance { before: 0.0, after: 1.0 });
        let script = ScriptedSource::new([
            Ok(Some(first.clone())),
            Ok(None),
            Err(UpstreamError::Transport("down".into())),
        ]);

        assert_eq!(script.fetch(SpinRequest::Base).await, Ok(Some(first)));
        assert_eq!(script.fetch(SpinRequest::Base).await, Ok(None));
        assert!(script.fetch(SpinRequest::FreeSpin { round: 1 }).await.is_err());
        // Exhausted script answers "no result"
        assert_eq!(script.fetch(SpinRequest::Base).await, Ok(None));
        assert_eq!(script.requests().len(), 4);
        assert_eq!(script.remaining(), 0);
    }

    #[test]
    fn test_synthetic_grid_shape_and_ledger() {
        let source = source(SyntheticProfile::default());
        let mut balance = source.balance();
        for _ in 0..50 {
            let response = source.generate(SpinRequest::Base).unwrap().unwrap();
            assert!(GridSpec::standard_5x3().check(&response.reels).is_ok());
            assert_eq!(response.balance.before, balance);
            assert!((response.balance.after - (balance - 1.0 + response.total_win)).abs() < 1e-9);
            balance = response.balance.after;
        }
    }

    #[test]
    fn test_synthetic_free_spin_award() {
        let source = source(SyntheticProfile {
            free_spin_rate: 1.0,
            ..Default::default()
        });
        let response = source.generate(SpinRequest::Base).unwrap().unwrap();
        let info = response.free_spin.clone().unwrap();
        assert_eq!(info.total_rounds, 10);
        assert_eq!(info.played_rounds, 0);
        let scatters = response.reels.iter().flatten().filter(|&&id| id == SCATTER_ID).count();
        assert_eq!(scatters, 3);

        let round = source.generate(SpinRequest::FreeSpin { round: 1 }).unwrap().unwrap();
        assert_eq!(round.free_spin.map(|f| f.played_rounds), Some(1));
        // Free rounds cost nothing
        assert_eq!(round.balance.after, round.balance.before + round.total_win);
    }

    #[test]
    fn test_synthetic_near_miss_places_trigger_bonus() {
        let source = source(SyntheticProfile {
            free_spin_rate: 0.0,
            bonus_rate: 0.0,
            near_miss_rate: 1.0,
            ..Default::default()
        });
        let response = source.generate(SpinRequest::Base).unwrap().unwrap();
        assert!(response.reels[0].contains(&BONUS_ID));
        assert!(response.reels[2].contains(&BONUS_ID));
        assert!(response.triggered_feature().is_none());
    }

    #[test]
    fn test_synthetic_failures() {
        let source = source(SyntheticProfile {
            failure_rate: 1.0,
            ..Default::default()
        });
        assert!(matches!(
            source.generate(SpinRequest::Base),
            Err(UpstreamError::Transport(_))
        ));
    }
}
