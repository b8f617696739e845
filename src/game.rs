//! The session runtime
//!
//! [`Game`] owns the round catalog, the [`SessionState`] of one
//! play-through, the storage it persists to and the timer of the active
//! phase. Everything a view layer can do goes through its action methods
//! (or [`Game::receive_action`]); everything it can show is read through
//! its accessors. No action returns an error: storage, validator and sink
//! failures are logged and absorbed, and actions that make no sense in the
//! current stage return `false` without changing anything.

use std::{collections::BTreeMap, fmt::Debug, time::Duration};

use garde::Validate;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use tracing::{debug, info, warn};

use crate::{
    AlarmMessage,
    constants::{
        storage::MAX_QUIZ_ID_LENGTH,
        timer::{
            DEFAULT_ANSWER_SECONDS, DEFAULT_CATEGORY_SECONDS, DEFAULT_GRACE_MILLIS,
            DEFAULT_PERSIST_INTERVAL_MILLIS, DEFAULT_QUESTION_SECONDS, MAX_GRACE_SECONDS,
            MAX_PERSIST_INTERVAL_SECONDS, MAX_PHASE_SECONDS, MIN_GRACE_SECONDS,
            MIN_PERSIST_INTERVAL_SECONDS, MIN_PHASE_SECONDS,
        },
    },
    names,
    results::{ResultRow, final_total, reconstruct},
    round::{
        answer::{BuiltinValidator, RawAnswer, Resolution, Validation, Validator, resolve},
        config::{Catalog, Round},
    },
    scoring,
    session::{AlwaysReady, FinishedRun, MediaReadiness, NameListener, SessionSink},
    stage::{Cursor, Stage},
    state::{Player, SessionState},
    store::{Key, KeyValueStore, SessionStore},
    timer::{
        Clock, DeadlineTimer, EpochMillis, PauseSignals, PauseSource, Phase, SystemClock,
        TimerView,
    },
};

/// Checks that a duration lies within `[MIN_SECONDS, MAX_SECONDS]`
fn validate_duration<const MIN_SECONDS: u64, const MAX_SECONDS: u64>(
    val: &Duration,
) -> garde::Result {
    if (MIN_SECONDS..=MAX_SECONDS).contains(&val.as_secs()) {
        Ok(())
    } else {
        Err(garde::Error::new(format!(
            "outside of bounds [{MIN_SECONDS},{MAX_SECONDS}]",
        )))
    }
}

/// Configuration of a session
///
/// Durations are (de)serialized as milliseconds. Every field has a default,
/// so `{}` is a valid configuration.
#[serde_with::serde_as]
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Options {
    /// Identifies the quiz; namespaces every stored key, so it cannot
    /// contain the `:` separator
    #[garde(length(min = 1, max = MAX_QUIZ_ID_LENGTH), pattern(r"^[^:]+$"))]
    pub quiz_id: String,
    /// Length of the category preview
    #[garde(custom(|v, _| validate_duration::<MIN_PHASE_SECONDS, MAX_PHASE_SECONDS>(v)))]
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    pub category_time: Duration,
    /// Length of the question phase for rounds without their own
    #[garde(custom(|v, _| validate_duration::<MIN_PHASE_SECONDS, MAX_PHASE_SECONDS>(v)))]
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    pub question_time: Duration,
    /// Length of the answer reveal
    #[garde(custom(|v, _| validate_duration::<MIN_PHASE_SECONDS, MAX_PHASE_SECONDS>(v)))]
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    pub answer_time: Duration,
    /// Added to every deadline to absorb render latency
    #[garde(custom(|v, _| validate_duration::<MIN_GRACE_SECONDS, MAX_GRACE_SECONDS>(v)))]
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    pub grace: Duration,
    /// How often a paused timer writes its projected deadline
    #[garde(custom(|v, _| validate_duration::<MIN_PERSIST_INTERVAL_SECONDS, MAX_PERSIST_INTERVAL_SECONDS>(v)))]
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    pub persist_interval: Duration,
    /// Room the run belongs to, reported with the finished run
    #[garde(skip)]
    pub room_code: Option<String>,
    /// Name already known to the host; skips the name stage
    #[garde(skip)]
    pub player_name: Option<String>,
    /// Start time agreed with other players, in epoch milliseconds
    #[garde(skip)]
    pub started_at: Option<EpochMillis>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            quiz_id: "default".to_owned(),
            category_time: Duration::from_secs(DEFAULT_CATEGORY_SECONDS),
            question_time: Duration::from_secs(DEFAULT_QUESTION_SECONDS),
            answer_time: Duration::from_secs(DEFAULT_ANSWER_SECONDS),
            grace: Duration::from_millis(DEFAULT_GRACE_MILLIS),
            persist_interval: Duration::from_millis(DEFAULT_PERSIST_INTERVAL_MILLIS),
            room_code: None,
            player_name: None,
            started_at: None,
        }
    }
}

impl Options {
    /// Validates the options, handing them back when they are usable
    ///
    /// # Errors
    ///
    /// Returns the garde report listing every field out of bounds.
    pub fn validated(self) -> Result<Self, garde::Report> {
        self.validate()?;
        Ok(self)
    }
}

/// Actions a view layer can send
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub enum Action {
    /// Choose a display name
    SubmitName(String),
    /// Go one step forward
    Next,
    /// Go one step back
    Previous,
    /// Arm the power-up for the current round
    ArmPowerUp,
    /// Set the final round stake
    SetWager(u8),
    /// Submit the answer to the current question
    SubmitAnswer(RawAnswer),
    /// Mark the revealed answer by hand
    MarkAnswer(bool),
    /// A blocking dialog opened or closed
    SetModalOpen(bool),
    /// The host stopped or resumed rendering
    SetHidden(bool),
    /// Discard the run and start over
    Reset,
}

/// The timer of the phase currently on screen
#[derive(Debug, Clone)]
struct ActiveTimer {
    phase: Phase,
    index: usize,
    timer: DeadlineTimer,
}

/// A single-player trivia session
///
/// # Type Parameters
///
/// * `S` - Storage backend the session persists to
/// * `C` - Source of wall-clock time
pub struct Game<S, C = SystemClock> {
    /// Ordered rounds of the quiz
    catalog: Catalog,
    /// Session configuration
    options: Options,
    /// The play-through
    state: SessionState,
    /// Persistence of `state` and of phase deadlines
    store: SessionStore<S>,
    /// Time source
    clock: C,
    /// Timer of the active phase, if it is timed
    timer: Option<ActiveTimer>,
    /// Reasons the active timer is held
    pauses: PauseSignals,
    /// Bumped whenever a phase is left; alarms carrying an older token are stale
    token: u64,
    /// Last time a paused timer wrote its projected deadline
    last_persist: EpochMillis,
    /// Verdicts of automatically checked answers, by round index
    validations: BTreeMap<usize, Validation>,
    validator: Box<dyn Validator>,
    media: Box<dyn MediaReadiness>,
    sink: Option<Box<dyn SessionSink>>,
    name_listener: Option<NameListener>,
}

impl<S, C> Debug for Game<S, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Game")
            .field("state", &self.state)
            .field("timer", &self.timer)
            .finish_non_exhaustive()
    }
}

/// Reads a session back from storage
///
/// Missing or unreadable keys fall back to a fresh value, and the round index
/// is clamped to the catalog.
fn restore<S: KeyValueStore>(store: &SessionStore<S>, round_count: usize) -> SessionState {
    let fresh = SessionState::default();
    let stage = store.load(Key::Stage).unwrap_or_default();
    let index = store.load(Key::Index).unwrap_or_default();
    let mut cursor = Cursor::new(stage, index).clamped(round_count);
    if cursor.stage.is_round_stage() && round_count == 0 {
        cursor = Cursor::new(Stage::Intro, 0);
    }

    SessionState {
        run_id: store.load(Key::RunId).unwrap_or(fresh.run_id),
        cursor,
        player: store.load(Key::Player).unwrap_or_default(),
        power_up: store.load(Key::PowerUp).unwrap_or_default(),
        outcomes: store.load(Key::Outcomes).unwrap_or_default(),
        raw_answers: store.load(Key::RawAnswers).unwrap_or_default(),
        wager: store.load(Key::Wager).unwrap_or_default(),
        last_correct: store.load(Key::LastCorrect).unwrap_or_default(),
        started_at: store.load::<Option<EpochMillis>>(Key::StartedAt).flatten(),
        name_announced: store.load(Key::NameAnnounced).unwrap_or_default(),
        finish_reported: store.load(Key::FinishReported).unwrap_or_default(),
    }
}

impl<S: KeyValueStore, C: Clock> Game<S, C> {
    /// Opens a session, resuming whatever `backend` holds for this quiz
    ///
    /// State saved for a different catalog (by ordered round ids) is
    /// discarded. A timer that was running when the session was saved
    /// resumes from its stored deadline if that is still in the future.
    pub fn new(catalog: Catalog, options: Options, backend: S, clock: C) -> Self {
        let mut store = SessionStore::new(backend, &options.quiz_id);
        let signature = catalog.signature();
        if store
            .load::<Vec<String>>(Key::CatalogSignature)
            .is_some_and(|stored| stored != signature)
        {
            warn!(namespace = store.namespace(), "round catalog changed, discarding saved session");
            store.clear();
        }
        store.save(Key::CatalogSignature, &signature);

        let state = restore(&store, catalog.len());
        let last_persist = clock.now();
        let mut game = Self {
            catalog,
            options,
            state,
            store,
            clock,
            timer: None,
            pauses: PauseSignals::default(),
            token: 0,
            last_persist,
            validations: BTreeMap::new(),
            validator: Box::new(BuiltinValidator),
            media: Box::new(AlwaysReady),
            sink: None,
            name_listener: None,
        };

        if game.state.player.name.is_empty()
            && let Some(name) = game.options.player_name.as_deref().and_then(names::external_name)
        {
            game.state.player.name = name;
        }
        if game.state.started_at.is_none() {
            game.state.started_at = game.options.started_at;
        }

        debug!(stage = %game.state.stage(), index = game.state.round_index(), "session opened");
        if game.state.stage() == Stage::Name && !game.state.player.name.is_empty() {
            game.move_to(Cursor::new(Stage::Intro, 0));
        } else {
            game.resume_phase();
            game.persist();
        }
        game
    }

    /// Replaces the built-in answer validator for catalog and scoreline rounds
    #[must_use]
    pub fn with_validator(mut self, validator: impl Validator + 'static) -> Self {
        self.validator = Box::new(validator);
        self
    }

    /// Installs the media readiness provider
    #[must_use]
    pub fn with_media(mut self, media: impl MediaReadiness + 'static) -> Self {
        self.media = Box::new(media);
        self.refresh_media();
        self
    }

    /// Installs the receiver of the finished run
    #[must_use]
    pub fn with_sink(mut self, sink: impl SessionSink + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    /// Installs the callback fired when a player-entered name is accepted
    #[must_use]
    pub fn with_name_listener(mut self, listener: impl FnMut(&str) + 'static) -> Self {
        self.name_listener = Some(Box::new(listener));
        self
    }
}

// Accessors
impl<S: KeyValueStore, C: Clock> Game<S, C> {
    /// The play-through, read-only
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// The round catalog
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// The session configuration
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Current stage
    pub fn stage(&self) -> Stage {
        self.state.stage()
    }

    /// Current round index
    pub fn round_index(&self) -> usize {
        self.state.round_index()
    }

    /// Player name and live tallies
    pub fn player(&self) -> &Player {
        &self.state.player
    }

    /// The round the cursor points at
    pub fn current_round(&self) -> Option<&Round> {
        self.catalog.get(self.state.round_index())
    }

    /// Whether the current round is the final round
    pub fn is_final_round(&self) -> bool {
        self.catalog.is_final(self.state.round_index())
    }

    /// The automatic verdict on round `index`, if it was checked automatically
    pub fn validation(&self, index: usize) -> Option<&Validation> {
        self.validations.get(&index)
    }

    /// What the countdown of the active phase should show
    pub fn timer_view(&self) -> Option<TimerView> {
        let active = self.timer.as_ref()?;
        Some(active.timer.view(active.phase, self.clock.now()))
    }

    /// The results table, rebuilt from the recorded outcomes
    pub fn results(&self) -> Vec<ResultRow> {
        reconstruct(
            self.catalog.rounds(),
            &self.state.outcomes,
            &self.state.power_up,
            &self.state.wager,
            &self.state.raw_answers,
        )
    }

    /// The payload reported when the run finishes
    pub fn finished_run(&self) -> FinishedRun {
        let round_results = self.results();
        let duration_seconds = self.state.started_at.map_or(0, |started_at| {
            self.clock.now().saturating_sub(started_at).saturating_add(500) / 1000
        });

        FinishedRun {
            run_id: self.state.run_id,
            room_code: self.options.room_code.clone(),
            player_name: self.state.player.name.clone(),
            final_score: final_total(&round_results),
            max_streak: self.state.player.max_streak,
            duration_seconds,
            round_results,
        }
    }

    /// Whether moving forward is allowed by the rules of the current stage
    ///
    /// [`Game::next`] does not consult this: leaving an unmarked answer is
    /// still possible and records the round as wrong.
    pub fn can_advance(&self) -> bool {
        let Cursor { stage, index } = self.state.cursor;
        match stage {
            Stage::Name => !self.state.player.name.is_empty(),
            Stage::Answer if self.catalog.is_final(index) => self.state.wager.resolved,
            Stage::Answer => self.state.outcomes.contains_key(&index),
            Stage::Results => false,
            Stage::Intro | Stage::Category | Stage::Question => true,
        }
    }
}

// Actions
impl<S: KeyValueStore, C: Clock> Game<S, C> {
    /// Dispatches an action from the view layer
    ///
    /// # Returns
    ///
    /// Whether the action changed anything.
    pub fn receive_action(&mut self, action: Action) -> bool {
        match action {
            Action::SubmitName(name) => self.submit_name(&name).is_ok(),
            Action::Next => self.next(),
            Action::Previous => self.previous(),
            Action::ArmPowerUp => self.arm_power_up(),
            Action::SetWager(amount) => self.set_wager(amount),
            Action::SubmitAnswer(raw) => self.submit_answer(raw),
            Action::MarkAnswer(correct) => self.mark_answer(correct),
            Action::SetModalOpen(open) => {
                self.set_modal_open(open);
                true
            }
            Action::SetHidden(hidden) => {
                self.set_hidden(hidden);
                true
            }
            Action::Reset => {
                self.reset();
                true
            }
        }
    }

    /// Accepts a player-entered name
    ///
    /// The first accepted name is announced to the name listener. From the
    /// name stage the run moves on to the intro.
    ///
    /// # Errors
    ///
    /// Returns the rule the name broke; nothing changes in that case.
    pub fn submit_name(&mut self, name: &str) -> Result<(), names::Error> {
        let name = names::accept_name(name)?;
        info!(%name, "name accepted");
        if !self.state.name_announced {
            self.state.name_announced = true;
            if let Some(listener) = &mut self.name_listener {
                listener(&name);
            }
        }
        self.state.player.name = name;

        if self.state.stage() == Stage::Name {
            self.move_to(Cursor::new(Stage::Intro, 0));
        } else {
            self.persist();
        }
        Ok(())
    }

    /// Adopts an externally agreed start time unless the run already has one
    pub fn set_started_at_override(&mut self, started_at: EpochMillis) -> bool {
        if self.state.started_at.is_some() {
            return false;
        }
        self.state.started_at = Some(started_at);
        self.store.save(Key::StartedAt, &self.state.started_at);
        true
    }

    /// Moves one step forward
    ///
    /// Leaving the answer of a non-final round that was never marked records
    /// it as wrong first. Returns false from the results, and from the name
    /// stage while no name is known.
    pub fn next(&mut self) -> bool {
        let from = self.state.cursor;
        match from.stage {
            Stage::Results => return false,
            Stage::Name if self.state.player.name.is_empty() => return false,
            Stage::Answer if !self.catalog.is_final(from.index) => {
                self.score(from.index, false);
            }
            _ => (),
        }
        self.move_to(from.advance(self.catalog.len()));
        true
    }

    /// Moves one step back
    pub fn previous(&mut self) -> bool {
        let from = self.state.cursor;
        let to = from.retreat();
        if to == from {
            return false;
        }
        self.move_to(to);
        true
    }

    /// Arms the power-up for the current round
    pub fn arm_power_up(&mut self) -> bool {
        let index = self.state.round_index();
        let armed = scoring::arm_power_up(&mut self.state, index, self.catalog.is_final(index));
        if armed {
            self.persist_progress();
        }
        armed
    }

    /// Sets the stake during the final round's category preview
    pub fn set_wager(&mut self, amount: u8) -> bool {
        if self.stage() != Stage::Category || !self.is_final_round() {
            return false;
        }
        let set = scoring::set_wager(&mut self.state, amount);
        if set {
            self.store.save(Key::Wager, &self.state.wager);
        }
        set
    }

    /// Submits the answer to the current question and reveals the answer
    ///
    /// An explicit "no answer" is scored wrong at once without consulting the
    /// validator. Numeric rounds are graded internally, catalog and scoreline
    /// rounds by the validator, and free text waits for [`Game::mark_answer`].
    /// A round that already has a result keeps it.
    pub fn submit_answer(&mut self, raw: RawAnswer) -> bool {
        let index = self.state.round_index();
        if self.stage() != Stage::Question {
            return false;
        }
        let Some(round) = self.catalog.get(index) else {
            return false;
        };

        if !self.is_settled(index) {
            let raw = raw.stored_for(round.answer_mode);
            let resolution = resolve(round, &raw, self.validator.as_ref());
            debug!(index, ?resolution, "answer submitted");
            self.state.raw_answers.insert(index, raw);
            match resolution {
                Resolution::NoAnswer => self.score(index, false),
                Resolution::Graded(validation) => {
                    let correct = validation.correct;
                    self.validations.insert(index, validation);
                    self.score(index, correct);
                }
                Resolution::Manual => self.persist_progress(),
            }
        }

        self.move_to(Cursor::new(Stage::Answer, index));
        true
    }

    /// Marks the revealed answer by hand
    ///
    /// A non-final round moves on to the next category once marked; on the
    /// final round this settles the wager and stays on the answer. Returns
    /// false when the round already has a result.
    pub fn mark_answer(&mut self, correct: bool) -> bool {
        let index = self.state.round_index();
        if self.stage() != Stage::Answer || self.is_settled(index) {
            return false;
        }
        self.score(index, correct);
        if !self.catalog.is_final(index) {
            self.move_to(self.state.cursor.advance(self.catalog.len()));
        }
        true
    }

    /// Raises or clears the blocking-dialog pause
    pub fn set_modal_open(&mut self, open: bool) {
        self.set_pause(PauseSource::Modal, open);
    }

    /// Raises or clears the not-rendering pause
    pub fn set_hidden(&mut self, hidden: bool) {
        self.set_pause(PauseSource::Hidden, hidden);
    }

    /// Asks the media provider again whether the current question may run
    ///
    /// Hosts call this when media finishes loading.
    pub fn refresh_media(&mut self) {
        let pending = self.stage() == Stage::Question
            && self
                .current_round()
                .is_some_and(|round| round.has_media() && !self.media.is_ready(round));
        self.set_pause(PauseSource::MediaPending, pending);
    }

    /// Observes the active timer
    ///
    /// Call this from the host's frame loop. While the timer is paused its
    /// projected deadline is written at most once per persist interval; once
    /// it expires, the phase's expiry policy runs.
    ///
    /// # Returns
    ///
    /// Whether the timer expired.
    pub fn tick(&mut self) -> bool {
        let now = self.clock.now();
        let Some(active) = &mut self.timer else {
            return false;
        };

        if active.timer.is_paused() {
            let interval = self.options.persist_interval.as_millis() as EpochMillis;
            if now.saturating_sub(self.last_persist) >= interval {
                self.store.save_deadline(
                    active.phase,
                    active.index,
                    active.timer.projected_deadline(now),
                );
                self.last_persist = now;
            }
            return false;
        }

        if !active.timer.expire(now) {
            return false;
        }
        let phase = active.phase;
        debug!(%phase, index = active.index, "timer expired");
        self.expire(phase);
        true
    }

    /// The alarm a host should schedule for the active timer
    ///
    /// `None` while there is no timer or it is paused. The returned delay is
    /// the time left on the timer.
    pub fn pending_alarm(&self) -> Option<(AlarmMessage, Duration)> {
        let active = self.timer.as_ref()?;
        if active.timer.is_paused() {
            return None;
        }
        Some((
            AlarmMessage {
                token: self.token,
                phase: active.phase,
                index: active.index,
            },
            active.timer.remaining(self.clock.now()),
        ))
    }

    /// Handles an alarm scheduled from [`Game::pending_alarm`]
    ///
    /// Alarms for a phase that has since been left are ignored. An alarm that
    /// arrives early (the deadline moved during a pause) does nothing; the
    /// host should schedule the next [`Game::pending_alarm`].
    pub fn receive_alarm(&mut self, alarm: AlarmMessage) -> bool {
        if alarm.token != self.token {
            debug!(token = alarm.token, current = self.token, "stale alarm ignored");
            return false;
        }
        self.tick()
    }

    /// Discards the run and starts over
    ///
    /// Every stored key of the session is removed. The player's name is kept,
    /// so the new run starts at the intro when one is known.
    pub fn reset(&mut self) {
        self.disarm();
        self.store.clear();
        self.store.save(Key::CatalogSignature, &self.catalog.signature());
        self.validations.clear();
        self.pauses.set(PauseSource::MediaPending, false);

        let name = std::mem::take(&mut self.state.player.name);
        let name_announced = self.state.name_announced;
        self.state = SessionState {
            player: Player {
                name,
                ..Player::default()
            },
            name_announced,
            ..SessionState::default()
        };
        info!(run = %self.state.run_id, "session reset");

        if self.state.player.name.is_empty() {
            self.persist();
        } else {
            self.move_to(Cursor::new(Stage::Intro, 0));
        }
    }
}

// Transitions and their effects
impl<S: KeyValueStore, C: Clock> Game<S, C> {
    /// Whether round `index` already has its result
    fn is_settled(&self, index: usize) -> bool {
        if self.catalog.is_final(index) {
            self.state.wager.resolved
        } else {
            self.state.outcomes.contains_key(&index)
        }
    }

    /// Scores round `index` and persists the result
    fn score(&mut self, index: usize, correct: bool) {
        let Some(round) = self.catalog.get(index) else {
            return;
        };
        let scored = if self.catalog.is_final(index) {
            scoring::settle_wager(&mut self.state, index, correct)
        } else {
            scoring::record(&mut self.state, index, round.points, correct)
        };
        if scored {
            self.persist_progress();
        }
    }

    /// Leaves the current stage for `to`, running exit and entry effects
    fn move_to(&mut self, to: Cursor) {
        let from = self.state.cursor;
        self.disarm();
        self.pauses.set(PauseSource::MediaPending, false);
        self.state.cursor = to;
        debug!(from = %from.stage, to = %to.stage, index = to.index, "stage changed");

        let now = self.clock.now();
        match to.stage {
            Stage::Name | Stage::Answer | Stage::Question | Stage::Category => (),
            Stage::Intro => {
                if self.state.started_at.is_none() {
                    self.state.started_at = Some(now);
                }
            }
            Stage::Results => self.report_finish(),
        }
        if to.stage == Stage::Category && self.catalog.is_final(to.index) {
            scoring::reopen_wager(&mut self.state, to.index);
        }
        self.resume_phase();
        self.persist();
    }

    /// Arms the timer of the current stage, honoring a stored deadline
    fn resume_phase(&mut self) {
        let Cursor { stage, index } = self.state.cursor;
        let Some(phase) = stage.phase() else {
            return;
        };
        let Some(round) = self.catalog.get(index) else {
            return;
        };
        let duration = match phase {
            Phase::Category => self.options.category_time,
            Phase::Question => round.time.unwrap_or(self.options.question_time),
            // the final round waits for the wager to be settled
            Phase::Answer if self.catalog.is_final(index) => return,
            Phase::Answer => self.options.answer_time,
        };

        let now = self.clock.now();
        let stored = self.store.load_deadline(phase, index, now);
        let mut timer = DeadlineTimer::arm_or_resume(stored, now, duration, self.options.grace);
        if self.pauses.any() {
            timer.set_paused(true, now);
        }
        self.store.save_deadline(phase, index, timer.deadline());
        self.last_persist = now;
        debug!(%phase, index, deadline = timer.deadline(), resumed = stored.is_some(), "timer armed");
        self.timer = Some(ActiveTimer {
            phase,
            index,
            timer,
        });
        self.refresh_media();
    }

    /// Cancels the active timer and forgets its stored deadline
    fn disarm(&mut self) {
        if let Some(active) = self.timer.take() {
            self.store.remove_deadline(active.phase, active.index);
        }
        self.token += 1;
    }

    fn set_pause(&mut self, source: PauseSource, active: bool) {
        if self.pauses.get(source) == active {
            return;
        }
        self.pauses.set(source, active);
        let paused = self.pauses.any();
        let now = self.clock.now();
        if let Some(current) = &mut self.timer
            && let Some(deadline) = current.timer.set_paused(paused, now)
        {
            self.store.save_deadline(current.phase, current.index, deadline);
        }
        debug!(?source, active, paused, "pause signal changed");
    }

    /// Runs the expiry policy of `phase`
    fn expire(&mut self, phase: Phase) {
        match phase {
            Phase::Category | Phase::Answer => {
                self.next();
            }
            Phase::Question => {
                let mode = self
                    .current_round()
                    .map(|round| round.answer_mode)
                    .unwrap_or_default();
                self.submit_answer(RawAnswer::empty_for(mode));
            }
        }
    }

    /// Reports the finished run, once per run
    fn report_finish(&mut self) {
        if self.state.finish_reported {
            return;
        }
        self.state.finish_reported = true;

        let run = self.finished_run();
        info!(
            run = %run.run_id,
            score = run.final_score,
            max_streak = run.max_streak,
            duration_seconds = run.duration_seconds,
            "run finished"
        );
        if let Some(sink) = &self.sink
            && let Err(error) = sink.report(&run)
        {
            warn!(%error, "finished run was not delivered");
        }
    }

    /// Writes everything scoring touches
    fn persist_progress(&mut self) {
        let (store, state) = (&mut self.store, &self.state);
        store.save(Key::Outcomes, &state.outcomes);
        store.save(Key::RawAnswers, &state.raw_answers);
        store.save(Key::Player, &state.player);
        store.save(Key::PowerUp, &state.power_up);
        store.save(Key::Wager, &state.wager);
        store.save(Key::LastCorrect, &state.last_correct);
    }

    /// Writes the whole state; the position goes last so a partial write
    /// never points past a result it depends on
    fn persist(&mut self) {
        self.persist_progress();
        let (store, state) = (&mut self.store, &self.state);
        store.save(Key::RunId, &state.run_id);
        store.save(Key::StartedAt, &state.started_at);
        store.save(Key::NameAnnounced, &state.name_announced);
        store.save(Key::FinishReported, &state.finish_reported);
        store.save(Key::Index, &state.cursor.index);
        store.save(Key::Stage, &state.cursor.stage);
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;
    use crate::{
        round::answer::ValidatorError,
        session::SinkError,
        state::Outcome,
        store::MemoryStore,
        timer::ManualClock,
    };

    const SECOND: Duration = Duration::from_secs(1);
    const START: EpochMillis = 1_700_000_000_000;

    const QUIZ: &str = r#"[
        {"id": "q4", "order": 4, "category": "Final", "prompt": "Who won in 2004?", "answerMode": "text", "answer": "Greece"},
        {"id": "q1", "order": 1, "category": "Legends", "prompt": "Who is the king?", "points": 1, "answerMode": "catalog", "answer": "Pelé", "aliases": ["Pele"]},
        {"id": "q2", "order": 2, "category": "Numbers", "prompt": "How many?", "points": 2, "answerMode": "numeric", "acceptNumbers": [3]},
        {"id": "q3", "order": 3, "category": "Finals", "prompt": "Score?", "points": 1, "answerMode": "scoreline", "answer": "2-1", "media": {"kind": "image", "src": "/final.png"}}
    ]"#;

    /// Answers that are correct for each of the first three rounds
    fn correct_answer(index: usize) -> RawAnswer {
        match index {
            0 => RawAnswer::Text("pele".to_owned()),
            1 => RawAnswer::Text("3".to_owned()),
            _ => RawAnswer::Scoreline { home: 2, away: 1 },
        }
    }

    struct Harness {
        backend: MemoryStore,
        clock: ManualClock,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                backend: MemoryStore::new(),
                clock: ManualClock::new(START),
            }
        }

        fn options() -> Options {
            Options {
                quiz_id: "cup".to_owned(),
                ..Options::default()
            }
        }

        fn open_with(&self, options: Options) -> Game<MemoryStore, ManualClock> {
            Game::new(
                Catalog::from_json(QUIZ),
                options,
                self.backend.clone(),
                self.clock.clone(),
            )
        }

        fn open(&self) -> Game<MemoryStore, ManualClock> {
            self.open_with(Self::options())
        }

        /// A game past the name stage, sitting on the intro
        fn named(&self) -> Game<MemoryStore, ManualClock> {
            let mut game = self.open();
            game.submit_name("Ada").unwrap();
            game
        }
    }

    #[derive(Clone, Default)]
    struct RecordingSink(Rc<RefCell<Vec<FinishedRun>>>);

    impl SessionSink for RecordingSink {
        fn report(&self, run: &FinishedRun) -> Result<(), SinkError> {
            self.0.borrow_mut().push(run.clone());
            Ok(())
        }
    }

    struct OfflineSink;

    impl SessionSink for OfflineSink {
        fn report(&self, _: &FinishedRun) -> Result<(), SinkError> {
            Err(SinkError("offline".to_owned()))
        }
    }

    struct PanicValidator;

    impl Validator for PanicValidator {
        fn validate(&self, _: &Round, _: &RawAnswer) -> Result<Validation, ValidatorError> {
            panic!("validator must not be called");
        }
    }

    struct BrokenValidator;

    impl Validator for BrokenValidator {
        fn validate(&self, round: &Round, _: &RawAnswer) -> Result<Validation, ValidatorError> {
            Err(ValidatorError::Failed(round.id.clone()))
        }
    }

    #[derive(Clone, Default)]
    struct SwitchableMedia(Rc<RefCell<bool>>);

    impl MediaReadiness for SwitchableMedia {
        fn is_ready(&self, _: &Round) -> bool {
            *self.0.borrow()
        }
    }

    /// Plays a non-final round from its category to its answer
    fn play_round(game: &mut Game<MemoryStore, ManualClock>, raw: RawAnswer) {
        assert_eq!(game.stage(), Stage::Category);
        assert!(game.next());
        assert!(game.submit_answer(raw));
        assert_eq!(game.stage(), Stage::Answer);
    }

    #[test]
    fn test_options_defaults_and_bounds() {
        let options: Options = serde_json::from_str("{}").unwrap();
        assert_eq!(options.category_time, 20 * SECOND);
        assert_eq!(options.question_time, 25 * SECOND);
        assert_eq!(options.answer_time, 10 * SECOND);
        assert_eq!(options.grace, SECOND);
        assert!(options.clone().validated().is_ok());

        let options: Options =
            serde_json::from_str(r#"{"quiz_id": "x", "question_time": 45000}"#).unwrap();
        assert_eq!(options.question_time, 45 * SECOND);

        let too_long = Options {
            answer_time: Duration::from_secs(3600),
            ..Options::default()
        };
        assert!(too_long.validated().is_err());

        let unnamed = Options {
            quiz_id: String::new(),
            ..Options::default()
        };
        assert!(unnamed.validated().is_err());

        let nested = Options {
            quiz_id: "league:2024".to_owned(),
            ..Options::default()
        };
        assert!(nested.validated().is_err());
    }

    #[test]
    fn test_name_stage() {
        let harness = Harness::new();
        let announced = Rc::new(RefCell::new(Vec::new()));
        let log = announced.clone();
        let mut game = harness
            .open()
            .with_name_listener(move |name| log.borrow_mut().push(name.to_owned()));

        assert_eq!(game.stage(), Stage::Name);
        assert!(!game.can_advance());
        assert!(!game.next());
        assert_eq!(game.submit_name("J"), Err(names::Error::TooShort));
        assert_eq!(game.stage(), Stage::Name);

        game.submit_name("  Ada ").unwrap();
        assert_eq!(game.stage(), Stage::Intro);
        assert_eq!(game.player().name, "Ada");
        assert_eq!(game.state().started_at, Some(START));

        game.submit_name("Grace").unwrap();
        assert_eq!(*announced.borrow(), ["Ada"]);
    }

    #[test]
    fn test_known_name_skips_name_stage() {
        let harness = Harness::new();
        let game = harness.open_with(Options {
            player_name: Some("  Sofia  ".to_owned()),
            started_at: Some(START - 5_000),
            ..Harness::options()
        });
        assert_eq!(game.stage(), Stage::Intro);
        assert_eq!(game.player().name, "Sofia");
        assert_eq!(game.state().started_at, Some(START - 5_000));
    }

    #[test]
    fn test_started_at_override_only_when_unset() {
        let harness = Harness::new();
        let mut game = harness.open();
        assert!(game.set_started_at_override(START - 1_000));
        game.submit_name("Ada").unwrap();
        assert_eq!(game.state().started_at, Some(START - 1_000));
        assert!(!game.set_started_at_override(START));
    }

    #[test]
    fn test_perfect_run_scores_and_reports() {
        let harness = Harness::new();
        let sink = RecordingSink::default();
        let mut game = harness.named().with_sink(sink.clone());

        assert!(game.next());
        for index in 0..3 {
            assert_eq!(game.round_index(), index);
            play_round(&mut game, correct_answer(index));
            assert!(game.can_advance());
            assert!(game.next());
        }
        // 1, then 2 points, then 1 + streak bonus
        assert_eq!(game.player().score, 5);
        assert_eq!(game.player().max_streak, 3);

        assert!(game.is_final_round());
        assert!(game.set_wager(2));
        assert!(game.next());
        assert!(game.submit_answer(RawAnswer::Text("Greece".to_owned())));
        assert!(!game.can_advance());
        assert!(game.timer_view().is_none());
        assert!(game.mark_answer(true));
        assert!(!game.mark_answer(false));
        assert_eq!(game.player().score, 7);

        harness.clock.advance(90 * SECOND);
        assert!(game.next());
        assert_eq!(game.stage(), Stage::Results);
        assert!(!game.next());

        let reports = sink.0.borrow();
        assert_eq!(reports.len(), 1);
        let run = &reports[0];
        assert_eq!(run.final_score, 7);
        assert_eq!(run.max_streak, 3);
        assert_eq!(run.duration_seconds, 90);
        assert_eq!(run.player_name, "Ada");
        assert_eq!(run.round_results.len(), 4);
        assert_eq!(run.round_results[2].streak_bonus, 1);
        assert_eq!(run.round_results[3].outcome, Some(Outcome::FinalCorrect));
        assert_eq!(run.round_results[2].answer_text, "2 - 1");
    }

    #[test]
    fn test_finish_reported_once_across_back_navigation() {
        let harness = Harness::new();
        let sink = RecordingSink::default();
        let mut game = harness.named().with_sink(sink.clone());
        game.next();
        for index in 0..4 {
            play_round(&mut game, correct_answer(index));
            game.next();
        }
        assert_eq!(game.stage(), Stage::Results);
        assert!(game.previous());
        assert!(game.next());
        assert_eq!(sink.0.borrow().len(), 1);
    }

    #[test]
    fn test_failing_sink_does_not_block_results() {
        let harness = Harness::new();
        let mut game = harness.named().with_sink(OfflineSink);
        game.next();
        for index in 0..4 {
            play_round(&mut game, correct_answer(index));
            game.next();
        }
        assert_eq!(game.stage(), Stage::Results);
        assert!(game.state().finish_reported);
    }

    #[test]
    fn test_power_up_doubles_round() {
        let harness = Harness::new();
        let mut game = harness.named();
        game.next();
        game.next();
        game.submit_answer(RawAnswer::Text("nope".to_owned()));
        game.next();

        assert_eq!(game.round_index(), 1);
        assert!(game.arm_power_up());
        assert!(!game.arm_power_up());
        play_round(&mut game, correct_answer(1));
        assert_eq!(game.player().score, 4);
        assert!(game.results()[1].x2);
    }

    #[test]
    fn test_power_up_rejected_for_scored_round() {
        let harness = Harness::new();
        let mut game = harness.named();
        game.next();
        play_round(&mut game, correct_answer(0));
        assert!(game.previous());
        assert!(game.previous());
        assert_eq!(game.state().cursor, Cursor::new(Stage::Category, 0));

        assert!(!game.arm_power_up());
        assert!(game.state().power_up.available);
        assert_eq!(game.player().score, 1);
        assert_eq!(final_total(&game.results()), game.player().score);
    }

    #[test]
    fn test_power_up_rejected_outside_category() {
        let harness = Harness::new();
        let mut game = harness.named();
        assert!(!game.arm_power_up());
        game.next();
        game.next();
        assert_eq!(game.stage(), Stage::Question);
        assert!(!game.arm_power_up());
        assert!(game.state().power_up.available);
    }

    #[test]
    fn test_numeric_round_is_graded_without_validator() {
        let harness = Harness::new();
        let mut game = harness.named().with_validator(PanicValidator);
        game.next();
        play_round(&mut game, RawAnswer::Text(String::new()));
        game.next();

        play_round(&mut game, RawAnswer::Text("3".to_owned()));
        let validation = game.validation(1).unwrap();
        assert!(validation.correct);
        assert_eq!(validation.canonical.as_deref(), Some("3"));
        assert_eq!(game.state().outcomes[&1], Outcome::Correct);
        assert_eq!(
            game.state().raw_answers[&1],
            RawAnswer::Numeric { value: Some(3.0) }
        );
    }

    #[test]
    fn test_empty_catalog_answer_skips_validator() {
        let harness = Harness::new();
        let mut game = harness.named().with_validator(PanicValidator);
        game.next();
        play_round(&mut game, RawAnswer::Text("   ".to_owned()));
        assert_eq!(game.state().outcomes[&0], Outcome::Wrong);
        assert!(game.validation(0).is_none());
    }

    #[test]
    fn test_validator_failure_falls_back_to_manual_marking() {
        let harness = Harness::new();
        let mut game = harness.named().with_validator(BrokenValidator);
        game.next();
        play_round(&mut game, RawAnswer::Text("Pelé".to_owned()));
        assert!(!game.state().outcomes.contains_key(&0));
        assert!(!game.can_advance());
        assert!(game.mark_answer(true));
        assert_eq!(game.player().score, 1);
        assert_eq!(game.state().cursor, Cursor::new(Stage::Category, 1));
        assert!(!game.mark_answer(false));
    }

    #[test]
    fn test_answer_is_recorded_once() {
        let harness = Harness::new();
        let mut game = harness.named();
        game.next();
        play_round(&mut game, correct_answer(0));
        assert!(game.previous());
        assert_eq!(game.stage(), Stage::Question);
        assert!(game.submit_answer(RawAnswer::Text("wrong".to_owned())));
        assert_eq!(game.state().outcomes[&0], Outcome::Correct);
        assert_eq!(game.player().score, 1);
    }

    #[test]
    fn test_leaving_unmarked_answer_counts_wrong() {
        let harness = Harness::new();
        let mut game = harness.named();
        game.next();
        play_round(&mut game, correct_answer(0));
        game.next();
        play_round(&mut game, correct_answer(1));
        game.next();
        game.next();
        // reveal without submitting
        assert!(game.next());
        assert_eq!(game.stage(), Stage::Answer);
        assert!(game.next());
        assert_eq!(game.state().outcomes[&2], Outcome::Wrong);
        assert_eq!(game.player().streak, 0);
        assert_eq!(crate::results::final_total(&game.results()), game.player().score);
    }

    #[test]
    fn test_retreat_paths() {
        let harness = Harness::new();
        let mut game = harness.named();
        assert!(!game.previous());
        game.next();
        assert!(game.previous());
        assert_eq!(game.stage(), Stage::Intro);
        game.next();
        play_round(&mut game, correct_answer(0));
        game.next();
        assert_eq!(game.state().cursor, Cursor::new(Stage::Category, 1));
        assert!(game.previous());
        assert_eq!(game.state().cursor, Cursor::new(Stage::Answer, 0));
    }

    #[test]
    fn test_final_category_reentry_reopens_wager() {
        let harness = Harness::new();
        let mut game = harness.named();
        game.next();
        for index in 0..3 {
            play_round(&mut game, correct_answer(index));
            game.next();
        }
        assert!(game.set_wager(3));
        game.next();
        game.submit_answer(RawAnswer::Text("Spain".to_owned()));
        game.mark_answer(false);
        assert_eq!(game.player().score, 2);

        // back to the final category
        game.previous();
        game.previous();
        assert_eq!(game.stage(), Stage::Category);
        assert_eq!(game.state().wager.amount, 0);
        assert!(!game.state().wager.resolved);
        assert_eq!(game.player().score, 5);
        assert!(!game.state().outcomes.contains_key(&3));
        assert!(game.set_wager(9));
        assert_eq!(game.state().wager.amount, 3);
    }

    #[test]
    fn test_wager_only_in_final_category() {
        let harness = Harness::new();
        let mut game = harness.named();
        game.next();
        assert!(!game.set_wager(2));
    }

    #[test]
    fn test_text_round_waits_for_marking() {
        let harness = Harness::new();
        let mut game = harness.named();
        game.next();
        for index in 0..3 {
            play_round(&mut game, correct_answer(index));
            game.next();
        }
        game.next();
        game.submit_answer(RawAnswer::Text("Greece".to_owned()));
        assert!(!game.state().wager.resolved);
        assert!(game.validation(3).is_none());
        assert_eq!(
            game.state().raw_answers[&3],
            RawAnswer::Text("Greece".to_owned())
        );
    }

    #[test]
    fn test_category_expiry_reveals_question() {
        let harness = Harness::new();
        let mut game = harness.named();
        game.next();
        let view = game.timer_view().unwrap();
        assert_eq!(view.phase, Phase::Category);
        assert_eq!(view.remaining, 21 * SECOND);

        harness.clock.advance(20 * SECOND);
        assert!(!game.tick());
        harness.clock.advance(SECOND);
        assert!(game.tick());
        assert_eq!(game.stage(), Stage::Question);
        assert_eq!(game.timer_view().unwrap().remaining, 26 * SECOND);
    }

    #[test]
    fn test_question_expiry_submits_no_answer() {
        let harness = Harness::new();
        let mut game = harness.named();
        game.next();
        game.next();
        harness.clock.advance(26 * SECOND);
        assert!(game.tick());
        assert_eq!(game.stage(), Stage::Answer);
        assert_eq!(game.state().outcomes[&0], Outcome::Wrong);
        assert_eq!(game.state().raw_answers[&0], RawAnswer::Text(String::new()));
    }

    #[test]
    fn test_answer_expiry_moves_on() {
        let harness = Harness::new();
        let mut game = harness.named();
        game.next();
        play_round(&mut game, correct_answer(0));
        harness.clock.advance(11 * SECOND);
        assert!(game.tick());
        assert_eq!(game.state().cursor, Cursor::new(Stage::Category, 1));
        assert!(!game.tick());
    }

    #[test]
    fn test_stale_alarm_is_ignored() {
        let harness = Harness::new();
        let mut game = harness.named();
        game.next();
        let (alarm, delay) = game.pending_alarm().unwrap();
        assert_eq!(alarm.phase, Phase::Category);
        assert_eq!(delay, 21 * SECOND);

        game.next();
        harness.clock.advance(delay);
        assert!(!game.receive_alarm(alarm));
        assert_eq!(game.stage(), Stage::Question);

        let (alarm, delay) = game.pending_alarm().unwrap();
        harness.clock.advance(delay);
        assert!(game.receive_alarm(alarm));
        assert_eq!(game.stage(), Stage::Answer);
    }

    #[test]
    fn test_pause_freezes_and_shifts_deadline() {
        let harness = Harness::new();
        let mut game = harness.named();
        game.next();
        harness.clock.advance(5 * SECOND);

        game.set_modal_open(true);
        game.set_hidden(true);
        assert!(game.pending_alarm().is_none());
        harness.clock.advance(60 * SECOND);
        assert!(!game.tick());
        let view = game.timer_view().unwrap();
        assert!(view.paused);
        assert_eq!(view.remaining, 16 * SECOND);

        game.set_modal_open(false);
        assert!(game.timer_view().unwrap().paused);
        game.set_hidden(false);
        assert_eq!(game.timer_view().unwrap().remaining, 16 * SECOND);
        harness.clock.advance(16 * SECOND);
        assert!(game.tick());
    }

    #[test]
    fn test_media_holds_question_timer() {
        let harness = Harness::new();
        let media = SwitchableMedia::default();
        let mut game = harness.named().with_media(media.clone());
        game.next();
        play_round(&mut game, correct_answer(0));
        game.next();
        play_round(&mut game, correct_answer(1));
        game.next();
        game.next();
        assert_eq!(game.round_index(), 2);
        assert!(game.timer_view().unwrap().paused);

        harness.clock.advance(40 * SECOND);
        assert!(!game.tick());
        *media.0.borrow_mut() = true;
        game.refresh_media();
        let view = game.timer_view().unwrap();
        assert!(!view.paused);
        assert_eq!(view.remaining, 26 * SECOND);
    }

    #[test]
    fn test_reload_resumes_question_timer() {
        let harness = Harness::new();
        let mut game = harness.named();
        game.next();
        play_round(&mut game, correct_answer(0));
        game.next();
        game.next();
        assert_eq!(game.stage(), Stage::Question);
        harness.clock.advance(10 * SECOND);
        let before = game.timer_view().unwrap().remaining;
        drop(game);

        let reloaded = harness.open();
        assert_eq!(reloaded.state().cursor, Cursor::new(Stage::Question, 1));
        assert_eq!(reloaded.timer_view().unwrap().remaining, before);
        assert_eq!(before, 16 * SECOND);
        assert_eq!(reloaded.player().score, 1);
        assert_eq!(reloaded.player().name, "Ada");
        assert_eq!(reloaded.state().outcomes[&0], Outcome::Correct);
    }

    #[test]
    fn test_reload_after_deadline_rearms() {
        let harness = Harness::new();
        let mut game = harness.named();
        game.next();
        drop(game);

        harness.clock.advance(120 * SECOND);
        let mut reloaded = harness.open();
        assert_eq!(reloaded.stage(), Stage::Category);
        assert_eq!(reloaded.timer_view().unwrap().remaining, 21 * SECOND);
        assert!(!reloaded.tick());
    }

    #[test]
    fn test_paused_timer_persists_projected_deadline() {
        let harness = Harness::new();
        let mut game = harness.named();
        game.next();
        game.set_modal_open(true);
        harness.clock.advance(30 * SECOND);
        assert!(!game.tick());
        drop(game);

        let reloaded = harness.open();
        assert_eq!(reloaded.timer_view().unwrap().remaining, 21 * SECOND);
    }

    #[test]
    fn test_reload_keeps_final_wager() {
        let harness = Harness::new();
        let mut game = harness.named();
        game.next();
        for index in 0..3 {
            play_round(&mut game, correct_answer(index));
            game.next();
        }
        game.set_wager(3);
        drop(game);

        let reloaded = harness.open();
        assert_eq!(reloaded.stage(), Stage::Category);
        assert_eq!(reloaded.state().wager.amount, 3);
    }

    #[test]
    fn test_changed_catalog_discards_saved_state() {
        let harness = Harness::new();
        let mut game = harness.named();
        game.next();
        drop(game);

        let other = Game::new(
            Catalog::from_json(r#"[{"id": "other"}]"#),
            Harness::options(),
            harness.backend.clone(),
            harness.clock.clone(),
        );
        assert_eq!(other.stage(), Stage::Name);
        assert!(other.player().name.is_empty());
    }

    #[test]
    fn test_reset_clears_storage_but_keeps_name() {
        let harness = Harness::new();
        let mut game = harness.named();
        game.next();
        play_round(&mut game, correct_answer(0));
        let run_id = game.state().run_id;

        game.reset();
        assert_eq!(game.stage(), Stage::Intro);
        assert_eq!(game.player().name, "Ada");
        assert_eq!(game.player().score, 0);
        assert!(game.state().outcomes.is_empty());
        assert_ne!(game.state().run_id, run_id);
        assert!(game.timer_view().is_none());

        let reloaded = harness.open();
        assert_eq!(reloaded.stage(), Stage::Intro);
        assert!(reloaded.state().outcomes.is_empty());
        assert_eq!(reloaded.state().run_id, game.state().run_id);
    }

    #[test]
    fn test_storage_namespaced_by_quiz() {
        let harness = Harness::new();
        let mut game = harness.named();
        game.next();
        drop(game);

        let other = harness.open_with(Options {
            quiz_id: "league".to_owned(),
            ..Options::default()
        });
        assert_eq!(other.stage(), Stage::Name);
    }

    #[test]
    fn test_actions_dispatch() {
        let harness = Harness::new();
        let mut game = harness.open();
        let actions: Vec<Action> = serde_json::from_str(
            r#"[{"SubmitName": "Ada"}, "Next", "ArmPowerUp", "Next", {"SubmitAnswer": "Pele"}]"#,
        )
        .unwrap();
        for action in actions {
            assert!(game.receive_action(action));
        }
        assert_eq!(game.stage(), Stage::Answer);
        assert_eq!(game.player().score, 2);
        assert!(game.receive_action(Action::Next));
        assert_eq!(game.stage(), Stage::Category);
        assert!(game.receive_action(Action::Reset));
        assert_eq!(game.player().score, 0);
    }

    #[test]
    fn test_live_score_matches_results_throughout() {
        let harness = Harness::new();
        let mut game = harness.named();
        game.next();
        for (index, correct) in [(0, true), (1, false), (2, true)] {
            if index == 2 {
                game.arm_power_up();
            }
            let raw = if correct {
                correct_answer(index)
            } else {
                RawAnswer::Text("12".to_owned())
            };
            play_round(&mut game, raw);
            assert_eq!(final_total(&game.results()), game.player().score);
            game.next();
        }
        game.set_wager(1);
        game.next();
        game.submit_answer(RawAnswer::Text("Greece".to_owned()));
        game.mark_answer(true);
        assert_eq!(final_total(&game.results()), game.player().score);
        assert_eq!(game.player().score, 1 + 2 + 1);
    }
}
