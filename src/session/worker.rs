//! Background execution of a [`Session`].
//!
//! The worker owns the session on a dedicated thread, so exactly one
//! operation runs at a time. Commands arrive over a channel and progress
//! comes back as [`Event`]s. While the loop is running the worker ticks
//! every `interval` (the session's configured tick interval unless one is
//! given); pending commands are handled before the next tick, so
//! `StopLoop` always wins over a due tick. A tick in progress is never
//! interrupted.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::compute::agent::AgentProgress;
use crate::compute::sequence::{EpochProgress, TrainOutcome};
use crate::schema::NetworkSnapshot;

use super::context::{GeneratedBlock, Session, TickReport};

/// Requests handled by the worker thread.
#[derive(Debug, Clone)]
pub enum Command {
    SetCorpus(String),
    TrainModel,
    SpawnAgent,
    SpawnChild(String),
    EvolvePopulation,
    Tick,
    /// Tick every `interval`, or every `tick_interval_ms` from the session config.
    StartLoop { interval: Option<Duration> },
    StopLoop,
    GenerateFromModel,
    GenerateFromAgent,
    ExportCorpus(PathBuf),
    ClearCorpus,
    Snapshot(String),
    Shutdown,
}

/// Notifications from the worker thread.
#[derive(Debug, Clone)]
pub enum Event {
    Notice(String),
    EpochCompleted(EpochProgress),
    Trained(TrainOutcome),
    AgentSpawned(String),
    AgentEvolved(AgentProgress),
    TickCompleted(TickReport),
    Generated(GeneratedBlock),
    Snapshot { id: String, snapshot: NetworkSnapshot },
    Failed(String),
}

/// Handle to a session running on its own thread.
pub struct Worker {
    commands: Sender<Command>,
    events: Receiver<Event>,
    looping: Arc<AtomicBool>,
    handle: Option<JoinHandle<Session>>,
}

impl Worker {
    /// Move `session` onto a new worker thread.
    pub fn spawn(session: Session) -> std::io::Result<Self> {
        let (command_tx, command_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let looping = Arc::new(AtomicBool::new(false));
        let looping_clone = Arc::clone(&looping);

        let handle = thread::Builder::new()
            .name("spaic-worker".to_string())
            .spawn(move || run(session, command_rx, event_tx, looping_clone))?;

        Ok(Self {
            commands: command_tx,
            events: event_rx,
            looping,
            handle: Some(handle),
        })
    }

    /// Queue a command. Returns `false` once the worker has exited.
    pub fn send(&self, command: Command) -> bool {
        self.commands.send(command).is_ok()
    }

    /// Event stream from the worker.
    pub fn events(&self) -> &Receiver<Event> {
        &self.events
    }

    /// Next event, waiting at most `timeout`.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<Event> {
        self.events.recv_timeout(timeout).ok()
    }

    pub fn is_looping(&self) -> bool {
        self.looping.load(Ordering::Relaxed)
    }

    /// Stop the worker and take the session back.
    pub fn shutdown(mut self) -> Option<Session> {
        self.stop()
    }

    fn stop(&mut self) -> Option<Session> {
        // Receiver may already be gone if the thread exited
        self.commands.send(Command::Shutdown).ok();
        self.handle.take().and_then(|handle| handle.join().ok())
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(
    mut session: Session,
    commands: Receiver<Command>,
    events: Sender<Event>,
    looping: Arc<AtomicBool>,
) -> Session {
    let mut interval: Option<Duration> = None;
    let mut next_tick = Instant::now();

    loop {
        let received = match interval {
            Some(_) => {
                let wait = next_tick.saturating_duration_since(Instant::now());
                match commands.recv_timeout(wait) {
                    Ok(command) => Some(command),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            None => match commands.recv() {
                Ok(command) => Some(command),
                Err(_) => break,
            },
        };

        match received {
            None => {
                tick(&mut session, &events);
                if let Some(period) = interval {
                    next_tick = Instant::now() + period;
                }
            }
            Some(Command::Shutdown) => break,
            Some(Command::StartLoop { interval: requested }) => {
                let period = requested.unwrap_or_else(|| session.config().tick_interval());
                interval = Some(period);
                next_tick = Instant::now() + period;
                looping.store(true, Ordering::Relaxed);
                notify(&events, format!("Loop started ({} ms)", period.as_millis()));
            }
            Some(Command::StopLoop) => {
                interval = None;
                looping.store(false, Ordering::Relaxed);
                notify(&events, "Loop stopped".to_string());
            }
            Some(command) => handle(&mut session, command, &events),
        }
    }

    looping.store(false, Ordering::Relaxed);
    session
}

fn notify(events: &Sender<Event>, message: String) {
    events.send(Event::Notice(message)).ok();
}

fn fail(events: &Sender<Event>, error: impl std::fmt::Display) {
    log::warn!("{error}");
    events.send(Event::Failed(error.to_string())).ok();
}

fn tick(session: &mut Session, events: &Sender<Event>) {
    match session.tick() {
        Ok(report) => {
            events.send(Event::TickCompleted(report)).ok();
        }
        Err(err) => fail(events, err),
    }
}

fn handle(session: &mut Session, command: Command, events: &Sender<Event>) {
    match command {
        Command::SetCorpus(text) => session.set_corpus(text),
        Command::ClearCorpus => {
            session.clear_corpus();
            notify(events, "Corpus cleared".to_string());
        }
        Command::TrainModel => {
            let outcome = session.train_model_with_progress(|progress| {
                events.send(Event::EpochCompleted(progress)).ok();
            });
            match outcome {
                Ok(outcome) => {
                    events.send(Event::Trained(outcome)).ok();
                }
                Err(err) => fail(events, err),
            }
        }
        Command::SpawnAgent => {
            let id = session.spawn_agent();
            events.send(Event::AgentSpawned(id)).ok();
        }
        Command::SpawnChild(parent) => match session.spawn_child(&parent) {
            Ok(id) => {
                events.send(Event::AgentSpawned(id)).ok();
            }
            Err(err) => fail(events, err),
        },
        Command::EvolvePopulation => {
            let result = session.evolve_population_with_progress(|progress| {
                events.send(Event::AgentEvolved(progress.clone())).ok();
            });
            match result {
                Ok(evolved) => notify(events, format!("Evolved {evolved} agents")),
                Err(err) => fail(events, err),
            }
        }
        Command::Tick => tick(session, events),
        Command::GenerateFromModel => match session.generate_from_model() {
            Ok(block) => {
                events.send(Event::Generated(block)).ok();
            }
            Err(err) => fail(events, err),
        },
        Command::GenerateFromAgent => match session.generate_from_agent() {
            Ok(block) => {
                events.send(Event::Generated(block)).ok();
            }
            Err(err) => fail(events, err),
        },
        Command::ExportCorpus(path) => match session.export_corpus(&path) {
            Ok(()) => notify(events, format!("Corpus written to {}", path.display())),
            Err(err) => fail(events, err),
        },
        Command::Snapshot(id) => match session.agent_snapshot(&id) {
            Ok(snapshot) => {
                events.send(Event::Snapshot { id, snapshot }).ok();
            }
            Err(err) => fail(events, err),
        },
        Command::StartLoop { .. } | Command::StopLoop | Command::Shutdown => {}
    }
}
