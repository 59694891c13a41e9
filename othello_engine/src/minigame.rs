// Chance minigames.
//
// The set of minigames is closed: `Minigame` is a plain enum over the three
// concrete games and every caller goes through its dispatch methods. The
// games themselves are clock-free state machines: callers drive them with
// `tick_second()` (and, for the reaction game, millisecond timestamps
// measured from `start()`), which keeps them deterministic under test.
//
// Each game can export a typed snapshot as JSON. The owner of a chance event
// publishes snapshots via `MINIGAME_UPDATE`; the spectating peer applies them
// to its own instance so both screens show the same state. A snapshot that
// fails to parse (or belongs to a different game) is ignored.

use enum_map::Enum;
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// Wire names are the upper-case variant names (`REACTION`, `MEMORY`,
/// `DODGE`).
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Enum,
    EnumString,
    Display,
    EnumIter,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum MinigameKind {
    Reaction,
    Memory,
    Dodge,
}

/// Pass/fail result consumed by the chance coordinator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinigameOutcome {
    pub success: bool,
    pub score: i64,
    pub elapsed_seconds: i64,
}

impl MinigameOutcome {
    pub fn failed() -> Self {
        Self {
            success: false,
            score: 0,
            elapsed_seconds: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Memory
// ---------------------------------------------------------------------------

pub const MEMORY_PAIRS: usize = 8;
pub const MEMORY_CARDS: usize = MEMORY_PAIRS * 2;
pub const MEMORY_TIME_LIMIT_SECS: i32 = 30;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MemorySnapshot {
    pub pairs_found: i32,
    pub time_remaining: i32,
    pub game_over: bool,
    pub success: bool,
    pub started: bool,
    pub values: Vec<i32>,
    pub flipped: Vec<bool>,
    pub matched: Vec<bool>,
}

/// Find all eight pairs on a 4x4 grid before the clock runs out.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemoryGame {
    values: Vec<i32>,
    flipped: Vec<bool>,
    matched: Vec<bool>,
    /// Face-up cards that are not part of a found pair, in flip order.
    open: Vec<usize>,
    pairs_found: i32,
    time_remaining: i32,
    started: bool,
    game_over: bool,
    success: bool,
}

impl MemoryGame {
    pub fn new<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut values: Vec<i32> = (0..MEMORY_PAIRS as i32).flat_map(|v| [v, v]).collect();
        values.shuffle(rng);
        Self {
            values,
            flipped: vec![false; MEMORY_CARDS],
            matched: vec![false; MEMORY_CARDS],
            open: Vec::new(),
            pairs_found: 0,
            time_remaining: MEMORY_TIME_LIMIT_SECS,
            started: false,
            game_over: false,
            success: false,
        }
    }

    pub fn start(&mut self) {
        self.started = true;
        self.flipped.fill(false);
        self.open.clear();
    }

    pub fn values(&self) -> &[i32] {
        &self.values
    }

    pub fn is_face_up(&self, index: usize) -> bool {
        self.flipped.get(index).copied().unwrap_or(false)
    }

    pub fn pairs_found(&self) -> i32 {
        self.pairs_found
    }

    /// Turn a card face-up. Returns false if the flip was not accepted
    /// (not started, finished, out of range, or already face-up).
    pub fn flip(&mut self, index: usize) -> bool {
        if !self.started || self.game_over || index >= MEMORY_CARDS {
            return false;
        }
        if self.open.len() == 2 {
            self.settle();
        }
        if self.flipped[index] {
            return false;
        }
        self.flipped[index] = true;
        self.open.push(index);

        if let [first, second] = self.open[..] {
            if self.values[first] == self.values[second] {
                self.matched[first] = true;
                self.matched[second] = true;
                self.open.clear();
                self.pairs_found += 1;
                if self.pairs_found as usize == MEMORY_PAIRS {
                    self.game_over = true;
                    self.success = true;
                }
            }
        }
        true
    }

    /// Hide a mismatched pair left face-up by the last flip.
    pub fn settle(&mut self) {
        if self.open.len() == 2 {
            for index in self.open.drain(..) {
                self.flipped[index] = false;
            }
        }
    }

    pub fn tick_second(&mut self) {
        if !self.started || self.game_over {
            return;
        }
        self.time_remaining = (self.time_remaining - 1).max(0);
        if self.time_remaining == 0 {
            self.game_over = true;
            self.success = false;
        }
    }

    pub fn is_finished(&self) -> bool {
        self.game_over
    }

    pub fn result(&self) -> Option<MinigameOutcome> {
        self.game_over.then(|| MinigameOutcome {
            success: self.success,
            score: i64::from(self.pairs_found),
            elapsed_seconds: i64::from(MEMORY_TIME_LIMIT_SECS - self.time_remaining),
        })
    }

    pub fn snapshot(&self) -> MemorySnapshot {
        MemorySnapshot {
            pairs_found: self.pairs_found,
            time_remaining: self.time_remaining,
            game_over: self.game_over,
            success: self.success,
            started: self.started,
            values: self.values.clone(),
            flipped: self.flipped.clone(),
            matched: self.matched.clone(),
        }
    }

    /// Overwrite local state with a peer's snapshot. Snapshots with the
    /// wrong grid size are rejected.
    pub fn apply_snapshot(&mut self, snapshot: MemorySnapshot) -> bool {
        let sized = |len: usize| len == MEMORY_CARDS;
        if !sized(snapshot.values.len())
            || !sized(snapshot.flipped.len())
            || !sized(snapshot.matched.len())
        {
            return false;
        }
        self.open = (0..MEMORY_CARDS)
            .filter(|&i| snapshot.flipped[i] && !snapshot.matched[i])
            .collect();
        self.pairs_found = snapshot.pairs_found;
        self.time_remaining = snapshot.time_remaining;
        self.game_over = snapshot.game_over;
        self.success = snapshot.success;
        self.started = snapshot.started;
        self.values = snapshot.values;
        self.flipped = snapshot.flipped;
        self.matched = snapshot.matched;
        true
    }
}

// ---------------------------------------------------------------------------
// Reaction
// ---------------------------------------------------------------------------

/// Presses slower than this after the signal fail.
pub const REACTION_SUCCESS_WINDOW_MS: u64 = 500;
/// With no press at all, the game fails this long after the signal.
pub const REACTION_GIVE_UP_MS: u64 = 3_000;
const REACTION_MIN_DELAY_MS: u64 = 1_000;
const REACTION_MAX_DELAY_MS: u64 = 4_000;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ReactionSnapshot {
    pub started: bool,
    pub signal_shown: bool,
    pub false_start: bool,
    pub game_over: bool,
    pub success: bool,
    /// -1 until a valid press has been measured.
    pub reaction_ms: i64,
}

/// Press as soon as the signal appears; pressing early is a false start.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReactionGame {
    signal_at_ms: u64,
    clock_ms: u64,
    reaction_ms: Option<u64>,
    started: bool,
    false_start: bool,
    game_over: bool,
    success: bool,
}

impl ReactionGame {
    pub fn new<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::with_signal_at(rng.random_range(REACTION_MIN_DELAY_MS..=REACTION_MAX_DELAY_MS))
    }

    pub fn with_signal_at(signal_at_ms: u64) -> Self {
        Self {
            signal_at_ms,
            clock_ms: 0,
            reaction_ms: None,
            started: false,
            false_start: false,
            game_over: false,
            success: false,
        }
    }

    pub fn start(&mut self) {
        self.started = true;
    }

    pub fn signal_at_ms(&self) -> u64 {
        self.signal_at_ms
    }

    pub fn signal_shown(&self) -> bool {
        self.started && self.clock_ms >= self.signal_at_ms
    }

    /// Register a press `at_ms` milliseconds after `start()`.
    pub fn press(&mut self, at_ms: u64) {
        if !self.started || self.game_over {
            return;
        }
        self.clock_ms = self.clock_ms.max(at_ms);
        self.game_over = true;
        if at_ms < self.signal_at_ms {
            self.false_start = true;
            self.success = false;
            return;
        }
        let reaction = at_ms - self.signal_at_ms;
        self.reaction_ms = Some(reaction);
        self.success = reaction <= REACTION_SUCCESS_WINDOW_MS;
    }

    pub fn tick_second(&mut self) {
        if !self.started || self.game_over {
            return;
        }
        self.clock_ms += 1_000;
        if self.clock_ms >= self.signal_at_ms + REACTION_GIVE_UP_MS {
            self.game_over = true;
            self.success = false;
        }
    }

    pub fn is_finished(&self) -> bool {
        self.game_over
    }

    pub fn result(&self) -> Option<MinigameOutcome> {
        if !self.game_over {
            return None;
        }
        let score = self
            .reaction_ms
            .map_or(0, |ms| 1_000i64.saturating_sub(ms as i64).max(0));
        Some(MinigameOutcome {
            success: self.success,
            score,
            elapsed_seconds: (self.clock_ms / 1_000) as i64,
        })
    }

    pub fn snapshot(&self) -> ReactionSnapshot {
        ReactionSnapshot {
            started: self.started,
            signal_shown: self.signal_shown(),
            false_start: self.false_start,
            game_over: self.game_over,
            success: self.success,
            reaction_ms: self.reaction_ms.map_or(-1, |ms| ms as i64),
        }
    }

    pub fn apply_snapshot(&mut self, snapshot: ReactionSnapshot) -> bool {
        self.started = snapshot.started;
        self.false_start = snapshot.false_start;
        self.game_over = snapshot.game_over;
        self.success = snapshot.success;
        self.reaction_ms = u64::try_from(snapshot.reaction_ms).ok();
        if snapshot.signal_shown {
            self.clock_ms = self.clock_ms.max(self.signal_at_ms);
        }
        true
    }
}

// ---------------------------------------------------------------------------
// Dodge
// ---------------------------------------------------------------------------

pub const DODGE_TIME_LIMIT_SECS: i32 = 45;
pub const DODGE_TARGET_SCORE: i32 = 20;
pub const DODGE_LIVES: i32 = 3;
const DODGE_POINTS_PER_SHOT: i32 = 2;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DodgeSnapshot {
    pub score: i32,
    pub lives: i32,
    pub time_remaining: i32,
    pub game_over: bool,
    pub success: bool,
    pub started: bool,
}

/// Shoot down enough attackers to reach the target score without losing
/// every life.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DodgeGame {
    score: i32,
    lives: i32,
    time_remaining: i32,
    started: bool,
    game_over: bool,
    success: bool,
}

impl Default for DodgeGame {
    fn default() -> Self {
        Self::new()
    }
}

impl DodgeGame {
    pub fn new() -> Self {
        Self {
            score: 0,
            lives: DODGE_LIVES,
            time_remaining: DODGE_TIME_LIMIT_SECS,
            started: false,
            game_over: false,
            success: false,
        }
    }

    pub fn start(&mut self) {
        self.started = true;
    }

    pub fn score(&self) -> i32 {
        self.score
    }

    pub fn lives(&self) -> i32 {
        self.lives
    }

    fn active(&self) -> bool {
        self.started && !self.game_over
    }

    pub fn shoot_down(&mut self) {
        if !self.active() {
            return;
        }
        self.score += DODGE_POINTS_PER_SHOT;
        if self.score >= DODGE_TARGET_SCORE {
            self.game_over = true;
            self.success = true;
        }
    }

    pub fn hit(&mut self) {
        if !self.active() {
            return;
        }
        self.lives -= 1;
        if self.lives <= 0 {
            self.game_over = true;
            self.success = false;
        }
    }

    pub fn tick_second(&mut self) {
        if !self.active() {
            return;
        }
        self.time_remaining = (self.time_remaining - 1).max(0);
        if self.time_remaining == 0 {
            self.game_over = true;
            self.success = false;
        }
    }

    pub fn is_finished(&self) -> bool {
        self.game_over
    }

    pub fn result(&self) -> Option<MinigameOutcome> {
        self.game_over.then(|| MinigameOutcome {
            success: self.success,
            score: i64::from(self.score),
            elapsed_seconds: i64::from(DODGE_TIME_LIMIT_SECS - self.time_remaining),
        })
    }

    pub fn snapshot(&self) -> DodgeSnapshot {
        DodgeSnapshot {
            score: self.score,
            lives: self.lives,
            time_remaining: self.time_remaining,
            game_over: self.game_over,
            success: self.success,
            started: self.started,
        }
    }

    pub fn apply_snapshot(&mut self, snapshot: DodgeSnapshot) -> bool {
        self.score = snapshot.score;
        self.lives = snapshot.lives;
        self.time_remaining = snapshot.time_remaining;
        self.game_over = snapshot.game_over;
        self.success = snapshot.success;
        self.started = snapshot.started;
        true
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Minigame {
    Memory(MemoryGame),
    Reaction(ReactionGame),
    Dodge(DodgeGame),
}

impl Minigame {
    pub fn new<R: Rng + ?Sized>(kind: MinigameKind, rng: &mut R) -> Self {
        match kind {
            MinigameKind::Memory => Minigame::Memory(MemoryGame::new(rng)),
            MinigameKind::Reaction => Minigame::Reaction(ReactionGame::new(rng)),
            MinigameKind::Dodge => Minigame::Dodge(DodgeGame::new()),
        }
    }

    pub fn kind(&self) -> MinigameKind {
        match self {
            Minigame::Memory(_) => MinigameKind::Memory,
            Minigame::Reaction(_) => MinigameKind::Reaction,
            Minigame::Dodge(_) => MinigameKind::Dodge,
        }
    }

    pub fn start(&mut self) {
        match self {
            Minigame::Memory(game) => game.start(),
            Minigame::Reaction(game) => game.start(),
            Minigame::Dodge(game) => game.start(),
        }
    }

    pub fn tick_second(&mut self) {
        match self {
            Minigame::Memory(game) => game.tick_second(),
            Minigame::Reaction(game) => game.tick_second(),
            Minigame::Dodge(game) => game.tick_second(),
        }
    }

    pub fn is_finished(&self) -> bool {
        match self {
            Minigame::Memory(game) => game.is_finished(),
            Minigame::Reaction(game) => game.is_finished(),
            Minigame::Dodge(game) => game.is_finished(),
        }
    }

    pub fn result(&self) -> Option<MinigameOutcome> {
        match self {
            Minigame::Memory(game) => game.result(),
            Minigame::Reaction(game) => game.result(),
            Minigame::Dodge(game) => game.result(),
        }
    }

    pub fn snapshot_json(&self) -> serde_json::Result<String> {
        match self {
            Minigame::Memory(game) => serde_json::to_string(&game.snapshot()),
            Minigame::Reaction(game) => serde_json::to_string(&game.snapshot()),
            Minigame::Dodge(game) => serde_json::to_string(&game.snapshot()),
        }
    }

    /// Apply a peer's JSON snapshot. Returns false (state untouched) if the
    /// payload does not parse as this game's snapshot.
    pub fn apply_snapshot_json(&mut self, json: &str) -> bool {
        match self {
            Minigame::Memory(game) => serde_json::from_str(json)
                .map(|snapshot| game.apply_snapshot(snapshot))
                .unwrap_or(false),
            Minigame::Reaction(game) => serde_json::from_str(json)
                .map(|snapshot| game.apply_snapshot(snapshot))
                .unwrap_or(false),
            Minigame::Dodge(game) => serde_json::from_str(json)
                .map(|snapshot| game.apply_snapshot(snapshot))
                .unwrap_or(false),
        }
    }
}
