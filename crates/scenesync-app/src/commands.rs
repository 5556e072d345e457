//! Shell command parsing and help.

use kurbo::Point;
use thiserror::Error;

/// A parsed shell command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Rect { x: f64, y: f64 },
    Circle { x: f64, y: f64 },
    Text { x: f64, y: f64, content: Option<String> },
    /// Brush stroke through the given points.
    Draw(Vec<Point>),
    Fill(String),
    Move { dx: f64, dy: f64 },
    Delete,
    Clear,
    Select { x: f64, y: f64 },
    Save,
    Status,
    Share,
    Online,
    Offline,
    New,
    Help,
    Quit,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Empty command")]
    Empty,
    #[error("Unknown command: {0} (try `help`)")]
    Unknown(String),
    #[error("Usage: {0}")]
    Usage(&'static str),
}

/// A command's help entry.
#[derive(Debug, Clone)]
pub struct CommandHelp {
    pub usage: &'static str,
    pub description: &'static str,
}

impl CommandHelp {
    pub const fn new(usage: &'static str, description: &'static str) -> Self {
        Self { usage, description }
    }
}

/// Every command the shell understands.
pub const COMMANDS: &[CommandHelp] = &[
    CommandHelp::new("rect X Y", "Add a rectangle"),
    CommandHelp::new("circle X Y", "Add a circle"),
    CommandHelp::new("text X Y [CONTENT]", "Add a text box"),
    CommandHelp::new("draw X Y X Y ...", "Draw a brush stroke"),
    CommandHelp::new("fill COLOR", "Set the fill of the selection"),
    CommandHelp::new("move DX DY", "Move the selection"),
    CommandHelp::new("delete", "Delete the selection"),
    CommandHelp::new("clear", "Remove everything"),
    CommandHelp::new("select X Y", "Select the topmost shape at a point"),
    CommandHelp::new("save", "Save now"),
    CommandHelp::new("status", "Show save and connection status"),
    CommandHelp::new("share", "Show share links"),
    CommandHelp::new("online / offline", "Simulate network changes"),
    CommandHelp::new("new", "Start a new scene"),
    CommandHelp::new("help", "Show this list"),
    CommandHelp::new("quit", "Save pending changes and exit"),
];

/// Print all commands to the console.
pub fn print_help() {
    println!("\n=== Commands ===");
    for command in COMMANDS {
        println!("  {:22} {}", command.usage, command.description);
    }
    println!();
}

impl Command {
    /// Whether the command changes scene content.
    pub fn edits_scene(&self) -> bool {
        matches!(
            self,
            Command::Rect { .. }
                | Command::Circle { .. }
                | Command::Text { .. }
                | Command::Draw(_)
                | Command::Fill(_)
                | Command::Move { .. }
                | Command::Delete
                | Command::Clear
        )
    }

    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let mut words = line.split_whitespace();
        let Some(name) = words.next() else {
            return Err(CommandError::Empty);
        };
        let args: Vec<&str> = words.collect();

        let command = match name.to_ascii_lowercase().as_str() {
            "rect" | "rectangle" => {
                let [x, y] = numbers(&args, "rect X Y")?;
                Command::Rect { x, y }
            }
            "circle" => {
                let [x, y] = numbers(&args, "circle X Y")?;
                Command::Circle { x, y }
            }
            "text" => {
                const USAGE: &str = "text X Y [CONTENT]";
                if args.len() < 2 {
                    return Err(CommandError::Usage(USAGE));
                }
                let [x, y] = numbers(&args[..2], USAGE)?;
                let content = (args.len() > 2).then(|| args[2..].join(" "));
                Command::Text { x, y, content }
            }
            "draw" => {
                const USAGE: &str = "draw X Y X Y ...";
                if args.len() < 4 || args.len() % 2 != 0 {
                    return Err(CommandError::Usage(USAGE));
                }
                let points = args
                    .chunks(2)
                    .map(|pair| numbers::<2>(pair, USAGE).map(|[x, y]| Point::new(x, y)))
                    .collect::<Result<Vec<_>, _>>()?;
                Command::Draw(points)
            }
            "fill" => match args.as_slice() {
                [color] => Command::Fill(color.to_string()),
                _ => return Err(CommandError::Usage("fill COLOR")),
            },
            "move" => {
                let [dx, dy] = numbers(&args, "move DX DY")?;
                Command::Move { dx, dy }
            }
            "select" => {
                let [x, y] = numbers(&args, "select X Y")?;
                Command::Select { x, y }
            }
            "delete" | "del" => Command::Delete,
            "clear" => Command::Clear,
            "save" => Command::Save,
            "status" => Command::Status,
            "share" => Command::Share,
            "online" => Command::Online,
            "offline" => Command::Offline,
            "new" => Command::New,
            "help" | "?" => Command::Help,
            "quit" | "exit" | "q" => Command::Quit,
            other => return Err(CommandError::Unknown(other.to_string())),
        };
        Ok(command)
    }
}

fn numbers<const N: usize>(args: &[&str], usage: &'static str) -> Result<[f64; N], CommandError> {
    if args.len() != N {
        return Err(CommandError::Usage(usage));
    }
    let mut values = [0.0; N];
    for (value, arg) in values.iter_mut().zip(args) {
        *value = arg.parse().map_err(|_| CommandError::Usage(usage))?;
    }
    Ok(values)
}
