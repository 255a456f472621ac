use anyhow::Result;
use pixels::{Pixels, SurfaceTexture};
use std::sync::Arc;
use std::time::Instant;
use tmt_core::{Screen, ScreenState, TmtError, TrialKind};
use tmt_experiment::{
    ClickOutcome, DirExportSink, FsPointSource, JsonFileStore, LoadOutcome, PointSource,
    SessionMachine, TmtConfig,
};
use tmt_render::{BoardStyle, Hud, Scene, SkiaRenderer, load_font};
use tmt_timing::{HighPrecisionTimer, Timer};
use tracing::{debug, error, info, trace, warn};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{ElementState, KeyEvent, MouseButton, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop, EventLoopProxy},
    keyboard::{Key, KeyCode, NamedKey, PhysicalKey},
    window::{Fullscreen, Window, WindowId},
};

/// Events posted back to the loop from worker threads
#[derive(Debug)]
pub enum AppEvent {
    PointsLoaded {
        generation: u64,
        outcome: Result<String, TmtError>,
    },
}

pub struct App {
    window: Option<Arc<Window>>,
    pixels: Option<Pixels<'static>>,
    renderer: Option<SkiaRenderer>,
    session: SessionMachine<HighPrecisionTimer, ScreenState>,
    frame_timer: HighPrecisionTimer,
    proxy: EventLoopProxy<AppEvent>,

    points: FsPointSource,
    sink: DirExportSink,
    store: JsonFileStore,

    participant_input: String,
    status: Option<String>,
    cursor: (f64, f64),
    current_size: Option<PhysicalSize<u32>>,
    scale_factor: f64,
    refresh_rate: Option<f64>,

    should_exit: bool,
}

impl App {
    pub fn new(config: TmtConfig, proxy: EventLoopProxy<AppEvent>) -> Self {
        let points = FsPointSource::new(config.points_dir.clone());
        let sink = DirExportSink::new(config.export_dir.clone());
        let store = JsonFileStore::open(config.store_path.clone());
        let session = SessionMachine::new(config, HighPrecisionTimer::new(), ScreenState::new());

        Self {
            window: None,
            pixels: None,
            renderer: None,
            session,
            frame_timer: HighPrecisionTimer::new(),
            proxy,
            points,
            sink,
            store,
            participant_input: String::new(),
            status: None,
            cursor: (0.0, 0.0),
            current_size: None,
            scale_factor: 1.0,
            refresh_rate: None,
            should_exit: false,
        }
    }

    pub fn run(config: TmtConfig) -> Result<()> {
        let event_loop = EventLoop::<AppEvent>::with_user_event().build()?;
        let mut app = App::new(config, event_loop.create_proxy());

        info!(
            platform = std::env::consts::OS,
            arch = std::env::consts::ARCH,
            "trail making test starting; press Esc to exit"
        );
        event_loop.run_app(&mut app).map_err(Into::into)
    }

    fn create_window_and_surface(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let primary_monitor = event_loop
            .primary_monitor()
            .or_else(|| event_loop.available_monitors().next())
            .ok_or_else(|| anyhow::anyhow!("No monitor available"))?;

        self.refresh_rate = primary_monitor
            .refresh_rate_millihertz()
            .map(|rate| rate as f64 / 1000.0);

        let window_attributes = Window::default_attributes()
            .with_title("Trail Making Test")
            .with_fullscreen(Some(Fullscreen::Borderless(Some(primary_monitor))))
            .with_resizable(false);

        let window = Arc::new(event_loop.create_window(window_attributes)?);
        let physical_size = window.inner_size();
        self.current_size = Some(physical_size);
        self.scale_factor = window.scale_factor();

        info!(
            width = physical_size.width,
            height = physical_size.height,
            scale_factor = self.scale_factor,
            refresh_hz = ?self.refresh_rate,
            "display configured"
        );
        if let Some(hz) = self.refresh_rate.filter(|hz| *hz > 0.0) {
            self.session.config.tick_hz = hz;
        }

        let surface_texture =
            SurfaceTexture::new(physical_size.width, physical_size.height, window.clone());
        self.pixels = Some(Pixels::new(
            physical_size.width,
            physical_size.height,
            surface_texture,
        )?);

        let style = BoardStyle {
            node_radius: self.session.config.node_radius,
            ..BoardStyle::default()
        };
        let font = load_font(self.session.config.font_path.as_deref());
        let renderer = SkiaRenderer::new(physical_size.width, physical_size.height, style, font)?;
        let (w, h) = renderer.board_size();
        self.session.set_surface_size(w, h);
        self.renderer = Some(renderer);

        window.request_redraw();
        self.window = Some(window);
        Ok(())
    }

    fn request_redraw(&self) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    /// Heading and lines for every screen except the board
    fn message(&self) -> Option<(String, Vec<String>)> {
        let mut lines = Vec::new();
        let heading = match self.session.screen() {
            Screen::Game => return None,
            Screen::Welcome => {
                lines.push(format!("Participant ID: {}_", self.participant_input));
                lines.push("Type the participant ID, then press Enter.".to_string());
                "Trail Making Test".to_string()
            }
            Screen::Intro(kind) => {
                lines.push(instructions(kind).to_string());
                if kind.is_practice() {
                    lines.push("This is a practice round.".to_string());
                }
                lines.push("Press Space to start, Tab to skip.".to_string());
                lines.extend(self.session.last_error().map(str::to_string));
                kind.title().to_string()
            }
            Screen::Final => {
                for kind in TrialKind::ALL {
                    lines.push(match self.session.results().get(kind) {
                        Some(r) => format!(
                            "{}: {:.1} s, {} errors, {} nodes",
                            kind.title(),
                            r.duration_ms / 1000.0,
                            r.errors,
                            r.n
                        ),
                        None => format!("{}: not done", kind.title()),
                    });
                }
                lines.push("Press E to export the results, R to start over.".to_string());
                "All trials done".to_string()
            }
        };
        lines.extend(self.status.clone());
        Some((heading, lines))
    }

    fn render(&mut self) -> Result<()> {
        let message = self.message();
        let (Some(pixels), Some(renderer)) = (self.pixels.as_mut(), self.renderer.as_mut()) else {
            return Ok(());
        };

        let scene = match &message {
            Some((heading, lines)) => Scene::Message {
                heading: heading.as_str(),
                lines: lines.as_slice(),
            },
            None => Scene::Game {
                hud: Hud {
                    title: self.session.hud_title().unwrap_or_default(),
                    elapsed: self.session.elapsed(),
                    errors: self.session.errors(),
                    notice: self.session.notice(),
                },
                board: self.session.board(),
            },
        };

        let stats = renderer.render_frame(&scene, pixels.frame_mut(), &mut self.frame_timer)?;
        let t = self.frame_timer.now();
        pixels.render()?;
        trace!(
            scene_ms = stats.scene.as_secs_f64() * 1e3,
            copy_ms = stats.copy.as_secs_f64() * 1e3,
            present_ms = self.frame_timer.elapsed(t).as_secs_f64() * 1e3,
            board_redrawn = stats.board_redrawn,
            "frame"
        );
        Ok(())
    }

    fn start_trial(&mut self, kind: TrialKind) {
        if let Some(renderer) = &self.renderer {
            let (w, h) = renderer.board_size();
            self.session.set_surface_size(w, h);
        }
        self.status = None;
        let request = self.session.request_trial(kind);
        let generation = request.generation;
        let reference = request.source.clone();

        let source = self.points.clone();
        let proxy = self.proxy.clone();
        let spawned = std::thread::Builder::new()
            .name("point-loader".into())
            .spawn(move || {
                let outcome = source.fetch(&request.source);
                if proxy
                    .send_event(AppEvent::PointsLoaded { generation, outcome })
                    .is_err()
                {
                    debug!(generation, "event loop closed before points arrived");
                }
            });
        if let Err(source) = spawned {
            let err = TmtError::ResourceLoad { reference, source };
            if let Err(e) = self.session.apply_load(generation, Err(err)) {
                error!(%e, "could not start point loader");
            }
        }
    }

    fn export(&mut self) {
        let at = chrono::Local::now();
        self.status = Some(match self.session.export(&mut self.sink, &mut self.store, at) {
            Ok(summary) => format!(
                "Saved {} ({} participants in {}).",
                summary.participant_file.display(),
                summary.cumulative_rows,
                summary.cumulative_file.display()
            ),
            Err(TmtError::MissingParticipantId) => {
                "No participant ID: restart and enter one before exporting.".to_string()
            }
            Err(e) => {
                error!(%e, "export failed");
                format!("Export failed: {e}")
            }
        });
    }

    fn restart(&mut self) {
        self.session.restart();
        self.participant_input.clear();
        self.status = None;
    }

    fn handle_welcome_key(&mut self, event: &KeyEvent) {
        match &event.logical_key {
            Key::Named(NamedKey::Enter) => match self.session.begin(&self.participant_input) {
                Ok(()) => self.status = None,
                Err(e) => self.status = Some(format!("{e}.")),
            },
            Key::Named(NamedKey::Backspace) => {
                self.participant_input.pop();
            }
            _ => {
                if let Some(text) = &event.text {
                    self.participant_input
                        .extend(text.chars().filter(|c| !c.is_control()));
                }
            }
        }
    }

    fn handle_input(&mut self, event: &KeyEvent, event_loop: &ActiveEventLoop) {
        if event.physical_key == PhysicalKey::Code(KeyCode::Escape) {
            self.cleanup_and_exit(event_loop);
            return;
        }
        let screen = self.session.screen();
        if event.repeat && !screen.is_welcome() {
            return;
        }
        match screen {
            Screen::Welcome => self.handle_welcome_key(event),
            Screen::Intro(kind) => match &event.logical_key {
                Key::Named(NamedKey::Space | NamedKey::Enter) => self.start_trial(kind),
                Key::Named(NamedKey::Tab) => self.session.skip(),
                _ => {}
            },
            Screen::Game => {
                if event.logical_key == Key::Named(NamedKey::Tab) {
                    self.session.skip();
                }
            }
            Screen::Final => match event.physical_key {
                PhysicalKey::Code(KeyCode::KeyE) => self.export(),
                PhysicalKey::Code(KeyCode::KeyR) => self.restart(),
                _ => {}
            },
        }
        self.request_redraw();
    }

    fn handle_click(&mut self) {
        if !self.session.screen().allows_pointer() {
            return;
        }
        let Some(renderer) = &self.renderer else {
            return;
        };
        let (ox, oy) = renderer.board_origin();
        let x = self.cursor.0 as f32 - ox;
        let y = self.cursor.1 as f32 - oy;
        match self.session.click(x, y) {
            ClickOutcome::Ignored | ClickOutcome::Miss => {}
            outcome => {
                trace!(?outcome, "click");
                self.request_redraw();
            }
        }
    }

    fn handle_points(&mut self, generation: u64, outcome: Result<String, TmtError>) {
        match self.session.apply_load(generation, outcome) {
            Ok(LoadOutcome::Running { kind, n }) => debug!(?kind, n, "board ready"),
            Ok(LoadOutcome::Stale { .. }) => {}
            Err(e) => warn!(%e, "trial did not start"),
        }
        self.request_redraw();
    }

    fn handle_resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.current_size = Some(new_size);
        if let Some(pixels) = &mut self.pixels {
            if let Err(e) = pixels.resize_surface(new_size.width, new_size.height) {
                warn!(%e, "failed to resize surface");
            }
            if let Err(e) = pixels.resize_buffer(new_size.width, new_size.height) {
                warn!(%e, "failed to resize buffer");
            }
        }
        if let Some(renderer) = &mut self.renderer {
            if let Err(e) = renderer.resize(new_size.width, new_size.height) {
                warn!(%e, "failed to resize renderer");
            }
            // the running board keeps its placement; the next trial uses the new size
            let (w, h) = renderer.board_size();
            self.session.set_surface_size(w, h);
        }
        info!(width = new_size.width, height = new_size.height, "display resized");
        self.request_redraw();
    }

    fn cleanup_and_exit(&mut self, event_loop: &ActiveEventLoop) {
        let stats = self.frame_timer.pacing_stats();
        info!(
            frames = stats.samples,
            average_ms = stats.average_frame_time_ns / 1e6,
            max_ms = stats.max_frame_time_ns / 1e6,
            "session closed"
        );
        self.should_exit = true;
        event_loop.exit();
    }
}

fn instructions(kind: TrialKind) -> &'static str {
    match kind.pattern() {
        tmt_core::Pattern::A => "Click the circles in ascending order: 1, 2, 3, ...",
        tmt_core::Pattern::B => "Alternate numbers and letters in order: 1, A, 2, B, 3, C, ...",
    }
}

impl ApplicationHandler<AppEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(e) = self.create_window_and_surface(event_loop) {
                error!(%e, "failed to create window and surface");
                event_loop.exit();
            }
        }
    }

    fn user_event(&mut self, _event_loop: &ActiveEventLoop, event: AppEvent) {
        match event {
            AppEvent::PointsLoaded {
                generation,
                outcome,
            } => self.handle_points(generation, outcome),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => self.cleanup_and_exit(event_loop),
            WindowEvent::RedrawRequested => {
                if let Err(e) = self.render() {
                    error!(%e, "render failed");
                    self.cleanup_and_exit(event_loop);
                }
            }
            WindowEvent::KeyboardInput { event, .. } if event.state.is_pressed() => {
                self.handle_input(&event, event_loop);
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = (position.x, position.y);
            }
            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                button: MouseButton::Left,
                ..
            } => self.handle_click(),
            WindowEvent::Resized(size) => self.handle_resize(size),
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                self.scale_factor = scale_factor;
                if let Some(size) = self.window.as_ref().map(|w| w.inner_size()) {
                    self.handle_resize(size);
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.should_exit {
            event_loop.exit();
            return;
        }
        if self.session.clock_running() {
            if self.session.tick() {
                self.request_redraw();
            }
            let wait = self.session.next_tick_in().unwrap_or_default();
            event_loop.set_control_flow(ControlFlow::WaitUntil(Instant::now() + wait));
        } else {
            event_loop.set_control_flow(ControlFlow::Wait);
        }
    }
}

impl Drop for App {
    fn drop(&mut self) {
        debug!("application resources released");
    }
}
