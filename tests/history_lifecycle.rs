use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, ThreadId};

use egui::Color32;
use parking_lot::Mutex;
use sprite_editor::command::{
    ClosureCommand, CreateArtboard, DuplicateArtboard, FloodFill, Inline, ReleaseState, RemoveArtboard,
    RenderThread,
};
use sprite_editor::config::{HistoryConfig, WorkerConfig};
use sprite_editor::{
    Artboard, Command, CommandError, CommandHistory, CommandResult, HistoryError, OwnsResources, Project,
    ShutdownCases, Workers,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn history(capacity: usize) -> CommandHistory {
    CommandHistory::new(&HistoryConfig { capacity }, Inline)
}

/// Counts how often its resources are released.
struct Tracked {
    cases: ShutdownCases,
    state: ReleaseState,
    releases: Arc<AtomicUsize>,
    transient: bool,
}

impl Tracked {
    fn new(cases: ShutdownCases) -> (Self, Arc<AtomicUsize>) {
        let releases = Arc::new(AtomicUsize::new(0));
        let tracked = Self {
            cases,
            state: ReleaseState::default(),
            releases: releases.clone(),
            transient: false,
        };
        (tracked, releases)
    }
}

impl Command for Tracked {
    fn name(&self) -> &'static str {
        "tracked"
    }

    fn execute(&mut self) -> CommandResult {
        Ok(())
    }

    fn undo(&mut self) -> CommandResult {
        Ok(())
    }

    fn is_transient(&self) -> bool {
        self.transient
    }

    fn resources(&mut self) -> Option<&mut dyn OwnsResources> {
        Some(self)
    }
}

impl OwnsResources for Tracked {
    fn shutdown_cases(&self) -> ShutdownCases {
        self.cases
    }

    fn release_native_resources(&mut self) {
        let releases = &self.releases;
        self.state.release(|| {
            releases.fetch_add(1, Ordering::SeqCst);
        });
    }

    fn is_released(&self) -> bool {
        self.state.is_released()
    }
}

#[test]
fn test_undo_eviction_releases() {
    init_logging();
    let mut history = history(1);
    let (first, releases) = Tracked::new(ShutdownCases::OnUndoEviction);
    let (second, _) = Tracked::new(ShutdownCases::OnUndoEviction);

    history.push(Box::new(first)).unwrap();
    assert_eq!(releases.load(Ordering::SeqCst), 0);
    history.push(Box::new(second)).unwrap();
    assert_eq!(releases.load(Ordering::SeqCst), 1);
}

#[test]
fn test_undo_eviction_ignored_by_redo_owner() {
    init_logging();
    let mut history = history(1);
    let (first, releases) = Tracked::new(ShutdownCases::OnRedoEviction);
    let (second, _) = Tracked::new(ShutdownCases::OnRedoEviction);

    history.push(Box::new(first)).unwrap();
    history.push(Box::new(second)).unwrap();
    assert_eq!(releases.load(Ordering::SeqCst), 0);
}

#[test]
fn test_redo_discard_releases() {
    init_logging();
    let mut history = history(8);
    let (undone, releases) = Tracked::new(ShutdownCases::OnRedoEviction);
    let (next, _) = Tracked::new(ShutdownCases::OnRedoEviction);

    history.push(Box::new(undone)).unwrap();
    history.undo().unwrap();
    assert_eq!(releases.load(Ordering::SeqCst), 0);

    history.push(Box::new(next)).unwrap();
    assert_eq!(releases.load(Ordering::SeqCst), 1);
}

#[test]
fn test_clear_follows_stack_side() {
    init_logging();
    let mut history = history(8);
    let (kept, kept_releases) = Tracked::new(ShutdownCases::OnRedoEviction);
    let (undone, undone_releases) = Tracked::new(ShutdownCases::OnRedoEviction);

    history.push(Box::new(kept)).unwrap();
    history.push(Box::new(undone)).unwrap();
    history.undo().unwrap();

    history.clear();
    assert_eq!(kept_releases.load(Ordering::SeqCst), 0);
    assert_eq!(undone_releases.load(Ordering::SeqCst), 1);
    assert!(!history.can_undo());
    assert!(!history.can_redo());
}

#[test]
fn test_release_exactly_once_across_triggers() {
    init_logging();
    let mut history = history(8);
    let (tracked, releases) = Tracked::new(ShutdownCases::OnAnyEviction);

    history.push(Box::new(tracked)).unwrap();
    history.undo().unwrap();
    history.redo().unwrap();
    history.clear();
    history.shutdown();
    drop(history);
    assert_eq!(releases.load(Ordering::SeqCst), 1);
}

#[test]
fn test_drop_releases_remaining_commands() {
    init_logging();
    let mut history = history(8);
    let (undoable, undo_releases) = Tracked::new(ShutdownCases::OnUndoEviction);
    let (redoable, redo_releases) = Tracked::new(ShutdownCases::OnRedoEviction);

    history.push(Box::new(redoable)).unwrap();
    history.undo().unwrap();
    history.push(Box::new(undoable)).unwrap();
    assert_eq!(redo_releases.load(Ordering::SeqCst), 1);

    drop(history);
    assert_eq!(undo_releases.load(Ordering::SeqCst), 1);
    assert_eq!(redo_releases.load(Ordering::SeqCst), 1);
}

#[test]
fn test_transient_owner_released_after_execute() {
    init_logging();
    let mut history = history(8);
    let (mut tracked, releases) = Tracked::new(ShutdownCases::OnUndoEviction);
    tracked.transient = true;

    history.push(Box::new(tracked)).unwrap();
    assert_eq!(releases.load(Ordering::SeqCst), 1);
    assert!(!history.can_undo());
}

#[test]
fn test_created_artboard_freed_when_redo_discarded() {
    init_logging();
    let project = Project::new().into_ref();
    let mut history = history(8);

    let create = CreateArtboard::new(project.clone(), 4, 4).unwrap();
    history.push(Box::new(create)).unwrap();
    let artboard = project.lock().artboards()[0].clone();
    let id = artboard.read().id();

    history.undo().unwrap();
    assert!(project.lock().is_empty());
    assert!(!artboard.read().is_released());

    history.redo().unwrap();
    assert_eq!(project.lock().current(), Some(id));
    history.undo().unwrap();

    let other = CreateArtboard::new(project.clone(), 2, 2).unwrap();
    history.push(Box::new(other)).unwrap();
    assert!(artboard.read().is_released());
    assert_eq!(project.lock().len(), 1);
}

#[test]
fn test_removed_artboard_freed_when_undo_evicted() {
    init_logging();
    let project = Project::new().into_ref();
    let artboard = project.lock().create_artboard(4, 4).unwrap();
    let id = artboard.read().id();
    let mut history = history(1);

    history
        .push(Box::new(RemoveArtboard::new(project.clone(), id).unwrap()))
        .unwrap();
    assert!(!artboard.read().is_released());

    let survivor = project.lock().create_artboard(2, 2).unwrap();
    let survivor_id = survivor.read().id();
    history
        .push(Box::new(DuplicateArtboard::new(project.clone(), survivor_id).unwrap()))
        .unwrap();

    assert!(artboard.read().is_released());
    assert!(!survivor.read().is_released());
    assert_eq!(project.lock().len(), 2);
}

#[test]
fn test_failed_remove_leaves_artboard_alive() {
    init_logging();
    let project = Project::new().into_ref();
    let artboard = project.lock().create_artboard(4, 4).unwrap();
    let id = artboard.read().id();
    let mut history = history(8);

    let first = RemoveArtboard::new(project.clone(), id).unwrap();
    let stale = RemoveArtboard::new(project.clone(), id).unwrap();
    history.push(Box::new(first)).unwrap();
    assert!(matches!(
        history.push(Box::new(stale)),
        Err(HistoryError::Command(CommandError::UnknownArtboard(_)))
    ));

    history.undo().unwrap();
    assert!(project.lock().contains(id));
    assert!(!artboard.read().is_released());
}

#[test]
fn test_flood_fill_on_render_thread() {
    init_logging();
    let artboard = Artboard::new(10, 10).unwrap().into_ref();
    let workers = Workers::new(&WorkerConfig::default()).unwrap();
    let mut history = CommandHistory::new(&HistoryConfig::default(), RenderThread::spawn("render").unwrap());

    let fill = FloodFill::new(artboard.clone(), workers, Color32::RED, 5, 5).unwrap();
    history.push(Box::new(fill)).unwrap();
    let red = |artboard: &sprite_editor::ArtboardRef| {
        let board = artboard.read();
        board
            .bounds()
            .cells()
            .filter(|&(x, y)| board.get(x, y) == Some(Color32::RED))
            .count()
    };
    assert_eq!(red(&artboard), 100);

    history.undo().unwrap();
    assert_eq!(red(&artboard), 0);
    history.redo().unwrap();
    assert_eq!(red(&artboard), 100);
}

#[test]
fn test_panicking_command_keeps_render_thread_alive() {
    init_logging();
    let mut history = CommandHistory::new(&HistoryConfig::default(), RenderThread::spawn("render").unwrap());

    let exploding = ClosureCommand::new("explode", || panic!("boom"), || Ok(())).on_render_thread();
    assert!(matches!(
        history.push(Box::new(exploding)),
        Err(HistoryError::Command(CommandError::Panicked("explode")))
    ));

    let calm = ClosureCommand::new("calm", || Ok(()), || Ok(())).on_render_thread();
    history.push(Box::new(calm)).unwrap();
    history.undo().unwrap();
    assert_eq!(history.redo_len(), 1);
}

/// Records the thread every hook ran on.
struct ThreadProbe {
    threads: Arc<Mutex<Vec<ThreadId>>>,
    state: ReleaseState,
}

impl ThreadProbe {
    fn record(&self) {
        self.threads.lock().push(thread::current().id());
    }
}

impl Command for ThreadProbe {
    fn name(&self) -> &'static str {
        "thread probe"
    }

    fn execute(&mut self) -> CommandResult {
        self.record();
        Ok(())
    }

    fn undo(&mut self) -> CommandResult {
        self.record();
        Ok(())
    }

    fn requires_render_thread(&self) -> bool {
        true
    }

    fn resources(&mut self) -> Option<&mut dyn OwnsResources> {
        Some(self)
    }
}

impl OwnsResources for ThreadProbe {
    fn shutdown_cases(&self) -> ShutdownCases {
        ShutdownCases::OnAnyEviction
    }

    fn release_native_resources(&mut self) {
        let threads = &self.threads;
        self.state.release(|| threads.lock().push(thread::current().id()));
    }

    fn is_released(&self) -> bool {
        self.state.is_released()
    }
}

#[test]
fn test_render_thread_runs_every_hook() {
    init_logging();
    let render = RenderThread::spawn("render").unwrap();
    let render_id = render.thread_id().unwrap();
    let threads = Arc::new(Mutex::new(Vec::new()));
    let mut history = CommandHistory::new(&HistoryConfig { capacity: 4 }, render);

    let probe = ThreadProbe {
        threads: threads.clone(),
        state: ReleaseState::default(),
    };
    history.push(Box::new(probe)).unwrap();
    history.undo().unwrap();
    history.redo().unwrap();
    drop(history);

    let threads = threads.lock();
    assert_eq!(threads.len(), 4);
    assert!(threads.iter().all(|id| *id == render_id));
    assert_ne!(render_id, thread::current().id());
}
