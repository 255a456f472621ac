use crate::config::TmtConfig;
use crate::export::{ExportSink, ExportSummary, export_results};
use crate::hit::hit_test;
use crate::input::InputOwnership;
use crate::notice::Notice;
use crate::pointset::{PointSource, parse_points, validate_points, warn_on_label_pattern};
use crate::store::KeyValueStore;
use crate::transform::{Margins, SurfaceTransform};
use crate::trial::ActiveTrial;
use chrono::{DateTime, Local};
use std::time::Duration;
use tmt_core::{
    BoardView, Node, ResultsAggregate, Screen, ScreenSelector, TmtError, TrialKind, TrialResult,
    TrialStatus,
};
use tmt_timing::{TickSchedule, Timer};
use tracing::{debug, info, warn};

/// Point data the host must fetch before [`SessionMachine::apply_load`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    pub kind: TrialKind,
    pub generation: u64,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Running { kind: TrialKind, n: u32 },
    /// The trial this load was issued for is no longer the active one
    Stale { generation: u64 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClickOutcome {
    /// No trial owns the input, or the owner is not running
    Ignored,
    Miss,
    Accepted { order: u32, progress: u32 },
    Rejected { order: u32, errors: u32 },
    Completed { kind: TrialKind, result: TrialResult },
}

/// Orchestrates the four-trial administration flow. Owns every piece of
/// mutable session state; hosts drive it with load results, clicks and ticks.
pub struct SessionMachine<T, V>
where
    T: Timer<Timestamp = u64>,
    V: ScreenSelector,
{
    pub config: TmtConfig,
    timer: T,
    screens: V,
    participant_id: Option<String>,
    results: ResultsAggregate,
    trial: Option<ActiveTrial>,
    generation: u64,
    input: InputOwnership,
    ticker: TickSchedule,
    notice: Option<Notice>,
    revision: u64,
    surface: (f32, f32),
    last_error: Option<String>,
}

impl<T, V> SessionMachine<T, V>
where
    T: Timer<Timestamp = u64>,
    V: ScreenSelector,
{
    pub fn new(config: TmtConfig, timer: T, mut screens: V) -> Self {
        screens.activate(Screen::Welcome);
        let surface = (config.surface_width as f32, config.surface_height as f32);
        Self {
            config,
            timer,
            screens,
            participant_id: None,
            results: ResultsAggregate::default(),
            trial: None,
            generation: 0,
            input: InputOwnership::new(),
            ticker: TickSchedule::new(),
            notice: None,
            revision: 0,
            surface,
            last_error: None,
        }
    }

    /// Size of the board surface the next trial's transform fits into
    pub fn set_surface_size(&mut self, width: u32, height: u32) {
        self.surface = (width as f32, height as f32);
    }

    pub fn begin(&mut self, participant_id: &str) -> Result<(), TmtError> {
        let id = participant_id.trim();
        if id.is_empty() {
            return Err(TmtError::MissingParticipantId);
        }
        info!(participant = id, "session started");
        self.participant_id = Some(id.to_string());
        self.screens.activate(Screen::Intro(TrialKind::PracticeA));
        Ok(())
    }

    /// First half of a trial start: drop whatever trial was active, reset,
    /// switch to the game view and hand back what must be loaded.
    pub fn request_trial(&mut self, kind: TrialKind) -> LoadRequest {
        self.abandon_active();
        self.input.revoke_all();

        self.generation += 1;
        let trial_config = self.config.trial(kind);
        self.trial = Some(ActiveTrial::loading(
            kind,
            self.generation,
            trial_config.count_errors,
        ));
        self.last_error = None;
        self.revision += 1;
        self.screens.activate(Screen::Game);

        info!(?kind, generation = self.generation, "trial loading");
        LoadRequest {
            kind,
            generation: self.generation,
            source: trial_config.source.clone(),
        }
    }

    /// Second half of a trial start: parse, validate and place the points,
    /// then start the clock and bind input. Results for a superseded
    /// generation are dropped without touching the active trial.
    pub fn apply_load(
        &mut self,
        generation: u64,
        fetched: Result<String, TmtError>,
    ) -> Result<LoadOutcome, TmtError> {
        let Some(mut trial) = self
            .trial
            .take_if(|t| t.generation == generation && t.status == TrialStatus::Loading)
        else {
            warn!(generation, "discarding point data for a trial that is no longer active");
            return Ok(LoadOutcome::Stale { generation });
        };
        let kind = trial.kind;

        let nodes = match fetched.and_then(|text| self.place_nodes(kind, &text)) {
            Ok(nodes) => nodes,
            Err(e) => {
                self.fail_start(kind, &e);
                return Err(e);
            }
        };

        trial.nodes = nodes;
        trial.status = TrialStatus::Ready;
        self.revision += 1;

        let now = self.timer.now();
        let interval = Duration::from_secs_f64(1.0 / self.config.tick_hz);
        trial.started_at = Some(now);
        trial.tick = Some(self.ticker.start(now, interval));
        trial.input = Some(self.input.acquire(kind, generation));
        trial.status = TrialStatus::Running;

        let n = trial.n();
        info!(?kind, generation, n, "trial running");
        self.trial = Some(trial);
        Ok(LoadOutcome::Running { kind, n })
    }

    /// Both halves of a trial start, loading synchronously from `source`
    pub fn start_trial<P: PointSource + ?Sized>(
        &mut self,
        kind: TrialKind,
        source: &P,
    ) -> Result<LoadOutcome, TmtError> {
        let request = self.request_trial(kind);
        let fetched = source.fetch(&request.source);
        self.apply_load(request.generation, fetched)
    }

    fn place_nodes(&self, kind: TrialKind, text: &str) -> Result<Vec<Node>, TmtError> {
        let mut nodes = parse_points(text)?;
        validate_points(&nodes)?;
        warn_on_label_pattern(&nodes, kind.pattern());

        let (width, height) = self.surface;
        let margins = Margins {
            x: self.config.margin_x,
            y: self.config.margin_y,
        };
        let transform = SurfaceTransform::fit(&nodes, width, height, margins);
        transform.apply(&mut nodes);
        debug!(?kind, scale = transform.scale, "points placed");
        Ok(nodes)
    }

    fn fail_start(&mut self, kind: TrialKind, error: &TmtError) {
        warn!(?kind, %error, "trial start failed");
        self.last_error = Some(format!("{}: {error}", kind.title()));
        self.revision += 1;
        self.screens.activate(Screen::Intro(kind));
    }

    /// Routes a pointer press in board coordinates to the trial holding input
    pub fn click(&mut self, x: f32, y: f32) -> ClickOutcome {
        let Some(binding) = self.input.current() else {
            return ClickOutcome::Ignored;
        };
        let now = self.timer.now();
        let Some(trial) = self.trial.as_mut() else {
            return ClickOutcome::Ignored;
        };
        if trial.generation != binding.generation || trial.kind != binding.kind || !trial.is_running() {
            return ClickOutcome::Ignored;
        }

        let Some(order) = hit_test(&trial.nodes, x, y, self.config.hit_radius).map(|n| n.order)
        else {
            debug!(x, y, "click missed every node");
            return ClickOutcome::Miss;
        };

        if order == trial.expected_order() {
            let finished = trial.accept();
            let progress = trial.progress;
            self.revision += 1;
            debug!(order, progress, "click accepted");
            if finished {
                return self.complete(now);
            }
            ClickOutcome::Accepted { order, progress }
        } else {
            let expected = trial.expected_order();
            let errors = trial.reject();
            let text = self.config.warning(trial.kind).to_string();
            self.notice = Some(Notice::new(
                text,
                now,
                Duration::from_millis(self.config.warning_ms),
            ));
            debug!(order, expected, errors, "click rejected");
            ClickOutcome::Rejected { order, errors }
        }
    }

    fn complete(&mut self, now: u64) -> ClickOutcome {
        let Some(trial) = self.trial.as_mut() else {
            return ClickOutcome::Ignored;
        };
        if trial.status == TrialStatus::Completed {
            return ClickOutcome::Ignored;
        }
        trial.status = TrialStatus::Completed;
        if let Some(tick) = trial.tick.take() {
            self.ticker.cancel(tick);
        }
        if let Some(token) = trial.input.take() {
            self.input.release(token);
        }

        let started = trial.started_at.unwrap_or(now);
        let result = TrialResult {
            duration_ms: now.saturating_sub(started) as f64 / 1_000_000.0,
            errors: trial.errors,
            n: trial.n(),
        };
        trial.result = Some(result);
        let kind = trial.kind;

        if let Err(e) = self.results.record(kind, result) {
            warn!(%e, "result slot already filled, keeping the first result");
        }
        info!(
            ?kind,
            duration_ms = result.duration_ms,
            errors = result.errors,
            n = result.n,
            "trial completed"
        );
        self.notice = None;
        self.screens.activate(Screen::after(kind));
        ClickOutcome::Completed { kind, result }
    }

    /// Drops the active trial, cancelling its tick and releasing its input
    fn abandon_active(&mut self) {
        if let Some(mut trial) = self.trial.take() {
            if let Some(tick) = trial.tick.take() {
                self.ticker.cancel(tick);
            }
            if let Some(token) = trial.input.take() {
                self.input.release(token);
            }
            if trial.status != TrialStatus::Completed {
                info!(kind = ?trial.kind, generation = trial.generation, "trial abandoned");
            }
            self.revision += 1;
        }
        self.notice = None;
    }

    /// Abandons the running trial, or passes over the trial whose intro is shown
    pub fn skip(&mut self) {
        let kind = match (self.screens.active(), self.trial.as_ref()) {
            (Screen::Game, Some(trial)) => trial.kind,
            (Screen::Intro(kind), _) => kind,
            (screen, _) => {
                debug!(?screen, "nothing to skip");
                return;
            }
        };
        self.abandon_active();
        self.last_error = None;
        info!(?kind, "trial skipped");
        self.screens.activate(Screen::after(kind));
    }

    /// Forgets all results and the participant and returns to the welcome view
    pub fn restart(&mut self) {
        self.abandon_active();
        self.input.revoke_all();
        self.results.clear();
        self.participant_id = None;
        self.last_error = None;
        info!("session restarted");
        self.screens.activate(Screen::Welcome);
    }

    pub fn export<S, K>(
        &self,
        sink: &mut S,
        store: &mut K,
        at: DateTime<Local>,
    ) -> Result<ExportSummary, TmtError>
    where
        S: ExportSink + ?Sized,
        K: KeyValueStore + ?Sized,
    {
        export_results(
            self.participant_id.as_deref(),
            &self.results,
            &self.config,
            sink,
            store,
            at,
        )
    }

    /// Polls the elapsed-time display tick; true when the display should refresh
    pub fn tick(&mut self) -> bool {
        self.ticker.poll(self.timer.now())
    }

    pub fn clock_running(&self) -> bool {
        self.ticker.is_running()
    }

    pub fn next_tick_in(&self) -> Option<Duration> {
        self.ticker
            .next_due()
            .map(|due| Duration::from_nanos(due.saturating_sub(self.timer.now())))
    }

    /// Elapsed time for display; frozen at the recorded duration once completed
    pub fn elapsed(&self) -> Duration {
        match self.trial.as_ref() {
            Some(t) if t.status == TrialStatus::Running => t
                .started_at
                .map(|s| self.timer.elapsed(s))
                .unwrap_or_default(),
            Some(ActiveTrial {
                result: Some(r), ..
            }) => Duration::from_secs_f64(r.duration_ms / 1000.0),
            _ => Duration::ZERO,
        }
    }

    pub fn notice(&self) -> Option<&str> {
        let now = self.timer.now();
        self.notice
            .as_ref()
            .filter(|n| n.visible(now))
            .map(|n| n.text.as_str())
    }

    pub fn board(&self) -> Option<BoardView<'_>> {
        let trial = self.trial.as_ref()?;
        if trial.nodes.is_empty() {
            return None;
        }
        Some(BoardView {
            nodes: &trial.nodes,
            progress: trial.progress,
            revision: self.revision,
            start_marker: (trial.progress == 0).then_some(self.config.start_marker.as_str()),
        })
    }

    /// Title of the trial on the board, for the heads-up strip
    pub fn hud_title(&self) -> Option<&'static str> {
        self.trial.as_ref().map(|t| t.kind.title())
    }

    pub fn screen(&self) -> Screen {
        self.screens.active()
    }

    pub fn screens(&self) -> &V {
        &self.screens
    }

    pub fn results(&self) -> &ResultsAggregate {
        &self.results
    }

    pub fn participant_id(&self) -> Option<&str> {
        self.participant_id.as_deref()
    }

    pub fn active_kind(&self) -> Option<TrialKind> {
        self.trial.as_ref().map(|t| t.kind)
    }

    pub fn status(&self) -> TrialStatus {
        self.trial
            .as_ref()
            .map_or(TrialStatus::Idle, |t| t.status)
    }

    pub fn progress(&self) -> u32 {
        self.trial.as_ref().map_or(0, |t| t.progress)
    }

    pub fn errors(&self) -> u32 {
        self.trial.as_ref().map_or(0, |t| t.errors)
    }

    pub fn node_count(&self) -> u32 {
        self.trial.as_ref().map_or(0, |t| t.n())
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn listener_count(&self) -> usize {
        self.input.listener_count()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }

    pub fn timer_mut(&mut self) -> &mut T {
        &mut self.timer
    }
}
