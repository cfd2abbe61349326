#![warn(clippy::all, rust_2018_idioms)]

pub mod artboard;
pub mod command;
pub mod config;
pub mod event;
pub mod geometry;
pub mod project;
pub mod workers;

pub use artboard::{Artboard, ArtboardError, ArtboardRef};
pub use command::{
    BoxedCommand, Command, CommandError, CommandHistory, CommandResult, HistoryError, OwnsResources,
    ShutdownCases, StackSide,
};
pub use config::EditorConfig;
pub use event::{EventBus, HandlerId, HistoryEvent};
pub use geometry::{Region, Span};
pub use project::{Project, ProjectRef};
pub use workers::Workers;
