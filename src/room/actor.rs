//! One task per room.
//!
//! The actor owns the room's [`GameState`] outright. Player actions, timer
//! ticks and membership changes all arrive as [`RoomCommand`]s on a single
//! queue and are applied one at a time, so concurrent submissions can never
//! lose each other's updates and one player's actions apply in the order they
//! were sent.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};

use super::ticker::spawn_ticker;
use crate::engine::{GameEngine, RoomSnapshot, Transition};
use crate::error::{AppError, RoomError, StandardError};
use crate::types::*;
use crate::validation::{require_non_empty, validate_nickname};

const COMMAND_QUEUE: usize = 64;
const EVENT_BUFFER: usize = 256;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    /// Known id to reconnect as; a fresh id is minted when absent
    pub player_id: Option<PlayerId>,
    pub name: String,
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JoinAck {
    pub player_id: PlayerId,
    /// Identifies this connection to the seat; pass it back on leave
    pub connection_id: String,
    pub reconnected: bool,
    pub snapshot: RoomSnapshot,
}

#[derive(Debug)]
pub enum RoomCommand {
    Join {
        request: JoinRequest,
        reply: oneshot::Sender<Result<JoinAck, StandardError>>,
    },
    Leave {
        player_id: PlayerId,
        connection_id: String,
    },
    Act {
        action: Action,
        reply: oneshot::Sender<Result<(), StandardError>>,
    },
    Tick {
        elapsed_ms: u64,
    },
    Snapshot {
        reply: oneshot::Sender<RoomSnapshot>,
    },
    State {
        reply: oneshot::Sender<GameState>,
    },
    TimerActive {
        reply: oneshot::Sender<bool>,
    },
    Shutdown,
}

/// Cloneable address of a running room
#[derive(Debug, Clone)]
pub struct RoomHandle {
    code: RoomCode,
    instance: String,
    tx: mpsc::Sender<RoomCommand>,
    events: broadcast::Sender<GameEvent>,
}

impl RoomHandle {
    pub fn code(&self) -> &str {
        &self.code
    }

    pub(crate) fn instance(&self) -> &str {
        &self.instance
    }

    /// Receive every event the room broadcasts from now on
    pub fn subscribe(&self) -> broadcast::Receiver<GameEvent> {
        self.events.subscribe()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    fn context(&self) -> BTreeMap<String, String> {
        BTreeMap::from([("room".to_string(), self.code.clone())])
    }

    fn closed(&self) -> StandardError {
        let err = AppError::from(RoomError::Closed(self.code.clone()));
        StandardError::from_error(&err, self.context())
    }

    async fn send(&self, command: RoomCommand) -> Result<(), StandardError> {
        self.tx.send(command).await.map_err(|_| self.closed())
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> RoomCommand,
    ) -> Result<T, StandardError> {
        let (reply, rx) = oneshot::channel();
        self.send(make(reply)).await?;
        rx.await.map_err(|_| self.closed())
    }

    pub async fn join(&self, mut request: JoinRequest) -> Result<JoinAck, StandardError> {
        request.name = validate_nickname(&request.name)
            .map_err(|e| StandardError::from_error(&AppError::from(e), self.context()))?;
        self.request(|reply| RoomCommand::Join { request, reply })
            .await?
    }

    /// Drop a connection. Ignored when the seat has since been taken over
    /// by a newer connection.
    pub async fn leave(&self, player_id: &str, connection_id: &str) -> Result<(), StandardError> {
        self.send(RoomCommand::Leave {
            player_id: player_id.to_string(),
            connection_id: connection_id.to_string(),
        })
        .await
    }

    pub async fn act(&self, player_id: &str, input: ActionInput) -> Result<(), StandardError> {
        if let ActionInput::SubmitVote { answer_id } = &input {
            require_non_empty("answerId", answer_id)
                .map_err(|e| StandardError::from_error(&AppError::from(e), self.context()))?;
        }
        let action = Action::new(player_id, input);
        self.request(|reply| RoomCommand::Act { action, reply })
            .await?
    }

    /// Feed elapsed time into the room, the same way its ticker does
    pub async fn tick(&self, elapsed_ms: u64) -> Result<(), StandardError> {
        self.send(RoomCommand::Tick { elapsed_ms }).await
    }

    pub async fn snapshot(&self) -> Result<RoomSnapshot, StandardError> {
        self.request(|reply| RoomCommand::Snapshot { reply }).await
    }

    pub async fn state(&self) -> Result<GameState, StandardError> {
        self.request(|reply| RoomCommand::State { reply }).await
    }

    pub async fn timer_active(&self) -> Result<bool, StandardError> {
        self.request(|reply| RoomCommand::TimerActive { reply })
            .await
    }

    pub async fn shutdown(&self) -> Result<(), StandardError> {
        self.send(RoomCommand::Shutdown).await
    }
}

pub(crate) struct RoomActor {
    code: RoomCode,
    engine: GameEngine,
    state: GameState,
    rx: mpsc::Receiver<RoomCommand>,
    weak_tx: mpsc::WeakSender<RoomCommand>,
    events: broadcast::Sender<GameEvent>,
    tick_every: Duration,
    timer: Option<JoinHandle<()>>,
    /// Live connection per seat
    connections: HashMap<PlayerId, String>,
    idle_timeout: Duration,
    /// Set while nobody is connected
    idle_deadline: Option<Instant>,
}

/// Start a room task with an empty lobby
pub(crate) fn spawn_room(
    code: RoomCode,
    engine: GameEngine,
    tick_every: Duration,
    idle_timeout: Duration,
) -> (RoomHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(COMMAND_QUEUE);
    let (events, _) = broadcast::channel(EVENT_BUFFER);

    let actor = RoomActor {
        code: code.clone(),
        state: engine.initialize(Vec::new()),
        engine,
        rx,
        weak_tx: tx.downgrade(),
        events: events.clone(),
        tick_every,
        timer: None,
        connections: HashMap::new(),
        idle_timeout,
        idle_deadline: Some(Instant::now() + idle_timeout),
    };
    let handle = RoomHandle {
        code,
        instance: ulid::Ulid::new().to_string(),
        tx,
        events,
    };

    (handle, tokio::spawn(actor.run()))
}

impl RoomActor {
    async fn run(mut self) {
        tracing::info!(room = %self.code, "Room opened");

        loop {
            let command = match self.idle_deadline {
                Some(deadline) => match timeout_at(deadline, self.rx.recv()).await {
                    Ok(command) => command,
                    Err(_) => {
                        tracing::info!(room = %self.code, "Nobody connected, closing idle room");
                        break;
                    }
                },
                None => self.rx.recv().await,
            };
            let Some(command) = command else {
                break;
            };

            match command {
                RoomCommand::Join { request, reply } => {
                    let _ = reply.send(self.handle_join(request));
                }
                RoomCommand::Leave {
                    player_id,
                    connection_id,
                } => {
                    if self.handle_leave(&player_id, &connection_id)
                        && self.state.connected_count() == 0
                    {
                        tracing::info!(room = %self.code, "All players disconnected");
                        break;
                    }
                }
                RoomCommand::Act { action, reply } => {
                    let _ = reply.send(self.handle_action(action));
                }
                RoomCommand::Tick { elapsed_ms } => {
                    self.state = self.engine.update_timer(&self.state, elapsed_ms);
                    self.drive();
                }
                RoomCommand::Snapshot { reply } => {
                    let _ = reply.send(self.engine.snapshot(&self.state));
                }
                RoomCommand::State { reply } => {
                    let _ = reply.send(self.state.clone());
                }
                RoomCommand::TimerActive { reply } => {
                    let _ = reply.send(self.timer.is_some());
                }
                RoomCommand::Shutdown => break,
            }
            self.sync_timer();
            self.sync_idle_deadline();
        }

        self.stop_timer();
        tracing::info!(room = %self.code, "Room closed");
    }

    fn context(&self, player_id: Option<&str>) -> BTreeMap<String, String> {
        let mut context = BTreeMap::from([
            ("room".to_string(), self.code.clone()),
            ("phase".to_string(), self.state.phase.to_string()),
        ]);
        if let Some(id) = player_id {
            context.insert("playerId".to_string(), id.to_string());
        }
        context
    }

    fn reject(&self, err: AppError, player_id: Option<&str>) -> StandardError {
        let err = StandardError::from_error(&err, self.context(player_id));
        err.log();
        err
    }

    fn publish(&self, events: Vec<GameEvent>) {
        for event in events {
            // No subscribers is fine
            let _ = self.events.send(event);
        }
    }

    fn room_update(&self) -> GameEvent {
        GameEvent::RoomUpdate(self.engine.snapshot(&self.state))
    }

    /// Hand the seat to a new connection, superseding any earlier one
    fn connect(&mut self, player_id: &str) -> String {
        let connection_id = ulid::Ulid::new().to_string();
        self.connections
            .insert(player_id.to_string(), connection_id.clone());
        connection_id
    }

    fn handle_join(&mut self, request: JoinRequest) -> Result<JoinAck, StandardError> {
        if let Some(id) = request
            .player_id
            .as_deref()
            .filter(|id| self.state.player(id).is_some())
        {
            self.state = self.engine.set_connected(&self.state, id, true);
            let connection_id = self.connect(id);
            tracing::info!(room = %self.code, player_id = id, "Player reconnected");
            self.publish(vec![self.room_update()]);
            return Ok(JoinAck {
                player_id: id.to_string(),
                connection_id,
                reconnected: true,
                snapshot: self.engine.snapshot(&self.state),
            });
        }

        let player = Player {
            id: request
                .player_id
                .unwrap_or_else(|| ulid::Ulid::new().to_string()),
            name: request.name,
            avatar: request.avatar,
            connected: true,
            score: 0,
        };

        match self.engine.join_player(&self.state, player.clone()) {
            Ok(state) => {
                self.state = state;
                tracing::info!(room = %self.code, player_id = %player.id, name = %player.name, "Player joined");
                let ack = JoinAck {
                    player_id: player.id.clone(),
                    connection_id: self.connect(&player.id),
                    reconnected: false,
                    snapshot: self.engine.snapshot(&self.state),
                };
                self.publish(vec![GameEvent::PlayerJoined(player), self.room_update()]);
                Ok(ack)
            }
            Err(e) => Err(self.reject(e.into(), Some(&player.id))),
        }
    }

    /// Returns whether the leave applied. A lobby seat is freed outright;
    /// once the game runs the seat stays and is marked disconnected.
    fn handle_leave(&mut self, player_id: &str, connection_id: &str) -> bool {
        if self.connections.get(player_id).map(String::as_str) != Some(connection_id) {
            tracing::debug!(room = %self.code, player_id, "Ignoring leave from superseded connection");
            return false;
        }
        self.connections.remove(player_id);

        if self.state.phase == Phase::Lobby {
            self.state = self.engine.remove_player(&self.state, player_id);
            tracing::info!(room = %self.code, player_id, "Player left the lobby");
        } else {
            self.state = self.engine.set_connected(&self.state, player_id, false);
            tracing::info!(room = %self.code, player_id, "Player disconnected");
        }
        self.publish(vec![
            GameEvent::PlayerLeft {
                player_id: player_id.to_string(),
            },
            self.room_update(),
        ]);
        true
    }

    fn sync_idle_deadline(&mut self) {
        if self.state.connected_count() > 0 {
            self.idle_deadline = None;
        } else if self.idle_deadline.is_none() {
            self.idle_deadline = Some(Instant::now() + self.idle_timeout);
        }
    }

    fn handle_action(&mut self, action: Action) -> Result<(), StandardError> {
        match self.engine.process_action(&self.state, &action) {
            Ok(Transition { state, events }) => {
                self.state = state;
                self.publish(events);
                self.drive();
                Ok(())
            }
            Err(e) => Err(self.reject(e.into(), Some(&action.player_id))),
        }
    }

    /// Auto-advance while the current phase is spent, or everyone has acted
    /// in a phase that waits for all players.
    fn drive(&mut self) {
        for _ in 0..Phase::ALL.len() {
            let phase = match self.engine.current_phase(&self.state) {
                Ok(phase) => phase,
                Err(e) => {
                    self.reject(e.into(), None);
                    return;
                }
            };
            if !phase.auto_advance {
                return;
            }

            let everyone_done = phase.requires_all_players
                && match self.state.phase {
                    Phase::Prompt => self.engine.all_answers_in(&self.state),
                    Phase::Choose => self.engine.is_round_complete(&self.state),
                    _ => false,
                };
            if !self.engine.is_phase_expired(&self.state) && !everyone_done {
                return;
            }

            self.advance();
        }
    }

    fn advance(&mut self) {
        let mut events = Vec::new();

        match self.state.phase {
            Phase::Reveal => {
                let scoring = self.engine.advance_phase(&self.state);
                let breakdown = self.engine.round_breakdown(&scoring);
                self.state = self.engine.calculate_scores(&scoring);
                events.push(self.phase_change());
                events.push(GameEvent::Scores {
                    round: self.state.round,
                    breakdown,
                    standings: self.engine.leaderboard(&self.state),
                });
            }
            Phase::Scoring => {
                let round_end = self.engine.advance_phase(&self.state);
                events.push(GameEvent::RoundEnd {
                    round: round_end.round,
                    correct_answer_id: round_end
                        .current_round
                        .as_ref()
                        .and_then(|r| r.correct_answer_id.clone()),
                });

                self.state = self.engine.start_new_round(&round_end);
                if self.engine.is_game_over(&self.state) {
                    tracing::info!(room = %self.code, "Game over");
                    events.push(GameEvent::GameOver {
                        standings: self.engine.leaderboard(&self.state),
                    });
                } else {
                    events.push(self.engine.prompt_event(&self.state));
                }
            }
            _ => {
                self.state = self.engine.advance_phase(&self.state);
                events.push(self.phase_change());
            }
        }

        tracing::debug!(
            room = %self.code,
            phase = %self.state.phase,
            round = self.state.round,
            "Phase advanced"
        );
        events.push(self.room_update());
        self.publish(events);
    }

    fn phase_change(&self) -> GameEvent {
        GameEvent::PhaseChange {
            phase: self.state.phase,
            round: self.state.round,
            time_left_ms: self.state.time_left_ms,
        }
    }

    /// Run the ticker exactly while the room sits in a timed phase
    fn sync_timer(&mut self) {
        let timed = self
            .engine
            .current_phase(&self.state)
            .is_ok_and(|phase| phase.is_timed());

        if !timed {
            self.stop_timer();
        } else if self.timer.is_none() {
            tracing::debug!(room = %self.code, phase = %self.state.phase, "Timer started");
            self.timer = Some(spawn_ticker(self.weak_tx.clone(), self.tick_every));
        }
    }

    fn stop_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
            tracing::debug!(room = %self.code, phase = %self.state.phase, "Timer cancelled");
        }
    }
}

impl Drop for RoomActor {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}
