mod actor;
mod ticker;

pub use actor::{JoinAck, JoinRequest, RoomCommand, RoomHandle};

use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::config::ServerConfig;
use crate::engine::{EngineSettings, GameEngine};
use crate::error::{AppError, RoomError, StandardError};
use crate::types::RoomCode;
use crate::validation::validate_room_code;

/// Safe character set for room codes (excludes 0/O, 1/I/L to avoid confusion)
const CODE_CHARS: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
const CODE_LENGTH: usize = 6;

fn generate_room_code() -> RoomCode {
    let mut rng = rand::rng();
    (0..CODE_LENGTH)
        .map(|_| CODE_CHARS[rng.random_range(0..CODE_CHARS.len())] as char)
        .collect()
}

#[derive(Debug, Clone)]
pub struct RoomSettings {
    pub engine: EngineSettings,
    pub tick_every: Duration,
    /// Draw prompts in random order per room
    pub shuffle_prompts: bool,
    /// Close a room once nobody has been connected for this long
    pub idle_timeout: Duration,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self::from(&ServerConfig::default())
    }
}

impl From<&ServerConfig> for RoomSettings {
    fn from(config: &ServerConfig) -> Self {
        Self {
            engine: EngineSettings::from(config),
            tick_every: Duration::from_millis(config.tick_ms),
            shuffle_prompts: true,
            idle_timeout: Duration::from_millis(config.idle_timeout_ms),
        }
    }
}

/// Shared directory of running rooms
#[derive(Clone)]
pub struct RoomRegistry {
    rooms: Arc<RwLock<HashMap<RoomCode, RoomHandle>>>,
    settings: RoomSettings,
}

impl RoomRegistry {
    pub fn new(settings: RoomSettings) -> Self {
        Self {
            rooms: Arc::new(RwLock::new(HashMap::new())),
            settings,
        }
    }

    fn build_engine(&self) -> GameEngine {
        let engine = GameEngine::new(self.settings.engine.clone());
        if !self.settings.shuffle_prompts {
            return engine;
        }
        let mut deck = engine.prompts().to_vec();
        deck.shuffle(&mut rand::rng());
        engine.with_prompts(deck)
    }

    /// Open a room under `code`, or a fresh random code when none is given
    pub async fn create_room(&self, code: Option<&str>) -> Result<RoomHandle, AppError> {
        let mut rooms = self.rooms.write().await;

        let code = match code {
            Some(code) => {
                validate_room_code(code)?;
                let code = code.to_ascii_uppercase();
                if rooms.contains_key(&code) {
                    return Err(RoomError::AlreadyExists(code).into());
                }
                code
            }
            None => loop {
                let code = generate_room_code();
                // Collision - try again (extremely rare)
                if !rooms.contains_key(&code) {
                    break code;
                }
            },
        };

        let (handle, task) = actor::spawn_room(
            code.clone(),
            self.build_engine(),
            self.settings.tick_every,
            self.settings.idle_timeout,
        );
        rooms.insert(code.clone(), handle.clone());
        drop(rooms);

        self.supervise(handle.clone(), task);
        tracing::info!(room = %code, "Room created");
        Ok(handle)
    }

    /// Remove the room once its task ends; a panicked task is reported as a system error
    fn supervise(&self, handle: RoomHandle, task: tokio::task::JoinHandle<()>) {
        let rooms = self.rooms.clone();
        tokio::spawn(async move {
            if let Err(e) = task.await {
                let err = AppError::from(RoomError::TaskFailed(e.to_string()));
                StandardError::from(err)
                    .with_context("room", handle.code())
                    .log();
            }

            let mut rooms = rooms.write().await;
            if rooms
                .get(handle.code())
                .is_some_and(|h| h.instance() == handle.instance())
            {
                rooms.remove(handle.code());
                tracing::info!(room = %handle.code(), "Room removed");
            }
        });
    }

    pub async fn get(&self, code: &str) -> Result<RoomHandle, AppError> {
        validate_room_code(code)?;
        let code = code.to_ascii_uppercase();
        self.rooms
            .read()
            .await
            .get(&code)
            .cloned()
            .ok_or(RoomError::NotFound(code).into())
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    pub async fn shutdown_room(&self, code: &str) -> Result<(), AppError> {
        let handle = self.get(code).await?;
        handle
            .shutdown()
            .await
            .map_err(|_| RoomError::Closed(handle.code().to_string()).into())
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new(RoomSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> RoomRegistry {
        RoomRegistry::new(RoomSettings {
            // Ticks are driven by hand in tests
            tick_every: Duration::from_secs(3600),
            shuffle_prompts: false,
            ..RoomSettings::default()
        })
    }

    async fn wait_until_empty(registry: &RoomRegistry) {
        for _ in 0..50 {
            if registry.room_count().await == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[test]
    fn test_generated_codes_are_valid() {
        for _ in 0..100 {
            let code = generate_room_code();
            assert!(validate_room_code(&code).is_ok(), "bad code {code}");
        }
    }

    #[tokio::test]
    async fn test_create_and_get_room() {
        let registry = registry();
        let room = registry.create_room(Some("abcd")).await.unwrap();
        assert_eq!(room.code(), "ABCD");

        let found = registry.get("ABCD").await.unwrap();
        assert_eq!(found.code(), "ABCD");
        assert_eq!(registry.room_count().await, 1);
    }

    #[tokio::test]
    async fn test_create_room_rejects_bad_or_taken_codes() {
        let registry = registry();
        let err = registry.create_room(Some("a!")).await.unwrap_err();
        assert_eq!(err.code(), "INVALID_ROOM_CODE");

        registry.create_room(Some("ROOM1")).await.unwrap();
        let err = registry.create_room(Some("room1")).await.unwrap_err();
        assert_eq!(err, AppError::Room(RoomError::AlreadyExists("ROOM1".to_string())));
    }

    #[tokio::test]
    async fn test_unknown_room() {
        let registry = registry();
        let err = registry.get("ZZZZ").await.unwrap_err();
        assert_eq!(err.code(), "ROOM_NOT_FOUND");
        assert_eq!(err.status_code(), 404);
    }

    #[tokio::test]
    async fn test_shutdown_removes_room() {
        let registry = registry();
        let room = registry.create_room(None).await.unwrap();
        registry.shutdown_room(room.code()).await.unwrap();

        // The supervisor removes the entry once the task has ended
        wait_until_empty(&registry).await;
        assert_eq!(registry.room_count().await, 0);
        assert!(room.snapshot().await.is_err());
    }

    #[tokio::test]
    async fn test_rooms_nobody_joins_are_closed() {
        let registry = RoomRegistry::new(RoomSettings {
            idle_timeout: Duration::from_millis(50),
            ..registry().settings
        });
        let mut rooms = Vec::new();
        for _ in 0..5 {
            rooms.push(registry.create_room(None).await.unwrap());
        }
        assert_eq!(registry.room_count().await, 5);

        // Polling a room does not keep it open
        assert!(rooms[0].snapshot().await.is_ok());

        tokio::time::sleep(Duration::from_millis(100)).await;
        wait_until_empty(&registry).await;
        assert_eq!(registry.room_count().await, 0);
        assert!(rooms.iter().all(|room| room.is_closed()));
    }

    #[tokio::test]
    async fn test_connected_room_is_not_idle() {
        let registry = RoomRegistry::new(RoomSettings {
            idle_timeout: Duration::from_millis(50),
            ..registry().settings
        });
        let room = registry.create_room(Some("BUSY")).await.unwrap();
        room.join(JoinRequest {
            player_id: None,
            name: "Alice".to_string(),
            avatar: None,
        })
        .await
        .unwrap();

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(registry.room_count().await, 1);
        assert!(room.snapshot().await.is_ok());
    }
}
