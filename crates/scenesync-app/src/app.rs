//! Terminal application: stdin commands in, session ticks and status out.

use crate::commands::{self, Command, CommandError};
use kurbo::Point;
use scenesync_core::shell::{Screen, ShellModel};
use scenesync_core::surface::{ObjectId, StyleUpdate, SurfaceError};
use scenesync_core::time::{Duration, Instant};
use scenesync_core::{CanvasSurface, SceneAddress, SceneSession, SyncConfig};
use std::io::{self, BufRead};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

/// Tick interval.
const FRAME: Duration = Duration::from_millis(16);

/// Host area the surface is sized from.
const HOST_SIZE: (f64, f64) = (1280.0, 800.0);

/// How long `quit` waits for a final write.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct App {
    config: SyncConfig,
    session: SceneSession,
    last_status: Option<String>,
}

impl App {
    pub fn new(address: SceneAddress, config: SyncConfig) -> Self {
        let session = open_session(address, &config, Instant::now());
        Self {
            config,
            session,
            last_status: None,
        }
    }

    pub fn session(&self) -> &SceneSession {
        &self.session
    }

    /// Run until `quit` or end of input.
    pub fn run(mut self) {
        let lines = spawn_stdin_reader();
        loop {
            let now = Instant::now();
            match self.drain_input(&lines, now) {
                Flow::Continue => {}
                Flow::Quit => break,
            }
            self.session.tick(now);
            self.report_status();
            thread::sleep(FRAME);
        }
        self.shutdown();
    }

    fn drain_input(&mut self, lines: &Receiver<String>, now: Instant) -> Flow {
        loop {
            match lines.try_recv() {
                Ok(line) => {
                    if self.handle_line(&line, now) == Flow::Quit {
                        return Flow::Quit;
                    }
                }
                Err(TryRecvError::Empty) => return Flow::Continue,
                Err(TryRecvError::Disconnected) => return Flow::Quit,
            }
        }
    }

    /// Parse and run one input line.
    pub fn handle_line(&mut self, line: &str, now: Instant) -> Flow {
        match Command::parse(line) {
            Ok(command) => match self.execute(command, now) {
                Ok(flow) => flow,
                Err(e) => {
                    println!("! {}", e);
                    Flow::Continue
                }
            },
            Err(CommandError::Empty) => Flow::Continue,
            Err(e) => {
                println!("! {}", e);
                Flow::Continue
            }
        }
    }

    pub fn execute(&mut self, command: Command, now: Instant) -> Result<Flow, SurfaceError> {
        if command.edits_scene() && self.session.is_loading() {
            println!("Scene is still loading");
            return Ok(Flow::Continue);
        }
        let surface = self.session.adapter_mut().surface_mut();
        match command {
            Command::Rect { x, y } => {
                let id = surface.add_rectangle(x, y)?;
                println!("Added rectangle #{}", id);
            }
            Command::Circle { x, y } => {
                let id = surface.add_circle(x, y)?;
                println!("Added circle #{}", id);
            }
            Command::Text { x, y, content } => {
                let id = surface.add_text(x, y)?;
                if let Some(content) = content {
                    surface.edit_text(id, &content)?;
                }
                println!("Added text #{}", id);
            }
            Command::Draw(points) => {
                if let Some(id) = draw_stroke(surface, &points)? {
                    println!("Drew path #{}", id);
                }
            }
            Command::Fill(color) => {
                let Some(id) = surface.selected().map(|o| o.id) else {
                    println!("Nothing selected");
                    return Ok(Flow::Continue);
                };
                surface.update_style(id, StyleUpdate::fill(color))?;
            }
            Command::Move { dx, dy } => {
                let Some(id) = surface.selected().map(|o| o.id) else {
                    println!("Nothing selected");
                    return Ok(Flow::Continue);
                };
                surface.move_by(id, dx, dy)?;
            }
            Command::Delete => {
                if !surface.remove_selected()? {
                    println!("Nothing selected");
                }
            }
            Command::Clear => surface.clear()?,
            Command::Select { x, y } => match surface.select_at(Point::new(x, y))? {
                Some(id) => println!("Selected #{}", id),
                None => println!("Nothing there"),
            },
            Command::Save => {
                if !self.session.manual_save(now) {
                    println!("Saving is not available in this session");
                }
            }
            Command::Status => self.print_status(),
            Command::Share => match self.model().share {
                Some(links) => {
                    println!("Edit:      {}", links.edit);
                    println!("View only: {}", links.view_only);
                }
                None => println!("Share links are only available for stored scenes"),
            },
            Command::Online => self.session.set_network_online(true, now),
            Command::Offline => self.session.set_network_online(false, now),
            Command::New => {
                let address = SceneAddress::generate();
                println!("New scene: {}", address.path());
                self.session = open_session(address, &self.config, now);
                self.last_status = None;
            }
            Command::Help => commands::print_help(),
            Command::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    fn model(&self) -> ShellModel {
        let has_selection = self.session.adapter().surface().selected().is_some();
        ShellModel::derive(&self.session.status(), &self.config.origin, has_selection)
    }

    /// Print the status line when it changed.
    fn report_status(&mut self) {
        let line = status_line(&self.model());
        if self.last_status.as_ref() != Some(&line) {
            println!("{}", line);
            self.last_status = Some(line);
        }
    }

    fn print_status(&self) {
        let model = self.model();
        let surface = self.session.adapter().surface();
        println!("Scene:   {}", self.session.address().path());
        println!("Status:  {} {}", model.status.icon, model.status.text);
        println!("Store:   {} {}", model.remote.icon(), model.remote.text());
        println!("Shapes:  {}", surface.len());
        if let Some(selected) = surface.selected() {
            println!("Selected: #{} ({})", selected.id, selected.shape.kind());
        }
        if let Some(banner) = model.offline_banner {
            println!("{}", banner);
        }
    }

    /// Save unsaved edits and wait briefly for the write to land.
    fn shutdown(mut self) {
        let started = Instant::now();
        self.session.tick(started);
        if self.session.coordinator().has_pending() {
            self.session.manual_save(started);
        }
        while self.session.coordinator().is_writing() && started.elapsed() < SHUTDOWN_GRACE {
            thread::sleep(FRAME);
            self.session.tick(Instant::now());
        }
        self.report_status();
        self.session.close();
    }
}

fn open_session(address: SceneAddress, config: &SyncConfig, now: Instant) -> SceneSession {
    let surface = CanvasSurface::with_host(HOST_SIZE.0, HOST_SIZE.1);
    SceneSession::connect(address, surface, config, now)
}

fn draw_stroke(surface: &mut CanvasSurface, points: &[Point]) -> Result<Option<ObjectId>, SurfaceError> {
    let Some((first, rest)) = points.split_first() else {
        return Ok(None);
    };
    surface.set_drawing_mode(true)?;
    surface.begin_stroke(*first)?;
    for point in rest {
        surface.extend_stroke(*point);
    }
    let id = surface.finish_stroke();
    surface.set_drawing_mode(false)?;
    id
}

fn status_line(model: &ShellModel) -> String {
    match &model.screen {
        Screen::Loading => "Loading scene...".to_string(),
        Screen::Error { message } => format!("Error: {}", message),
        Screen::Editor => {
            let mut line = format!(
                "[{} {}] [{} {}]",
                model.status.icon,
                model.status.text,
                model.remote.icon(),
                model.remote.text()
            );
            if let Some(banner) = model.offline_banner {
                line.push(' ');
                line.push_str(banner);
            }
            line
        }
    }
}

/// Read stdin lines on a helper thread so the tick loop never blocks.
fn spawn_stdin_reader() -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}
