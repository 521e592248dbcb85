use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::actor::RoomCommand;

/// Spawn the periodic timer for one room. Every tick feeds the measured
/// elapsed time into the room's command queue, so countdowns are applied by
/// the room's single writer like any other command.
///
/// Holds only a weak sender: the ticker never keeps a dead room alive, and it
/// exits on its own once the room's queue is gone.
pub fn spawn_ticker(room: mpsc::WeakSender<RoomCommand>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(Instant::now() + every, every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last = Instant::now();

        loop {
            interval.tick().await;

            let now = Instant::now();
            let elapsed_ms = now.duration_since(last).as_millis() as u64;
            last = now;

            let Some(tx) = room.upgrade() else {
                break;
            };
            if tx.send(RoomCommand::Tick { elapsed_ms }).await.is_err() {
                break;
            }
        }

        tracing::debug!("Room ticker stopped");
    })
}
