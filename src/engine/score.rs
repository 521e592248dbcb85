use std::collections::BTreeMap;

use chrono::Utc;

use super::{GameEngine, POINTS_PER_VOTE, TRUE_ANSWER_BONUS};
use crate::types::*;

impl GameEngine {
    /// Points each author earns from the current round, without applying them.
    /// The truth-teller gets the flat bonus; every answer, true or bluff,
    /// earns its author a fixed reward per vote received.
    pub fn round_breakdown(&self, state: &GameState) -> Vec<RoundScore> {
        let Some(round) = state.current_round.as_ref() else {
            return Vec::new();
        };

        let mut per_player: BTreeMap<PlayerId, RoundScore> = BTreeMap::new();

        if let Some(answer) = round
            .correct_answer_id
            .as_ref()
            .and_then(|id| round.answers.get(id))
        {
            if let Some(score) = score_entry(&mut per_player, state, &answer.player_id) {
                score.truth_bonus += TRUE_ANSWER_BONUS;
            }
        }

        for (answer_id, votes) in round.vote_counts() {
            // Votes for answers that do not exist are ignored
            let Some(answer) = round.answers.get(&answer_id) else {
                continue;
            };
            if let Some(score) = score_entry(&mut per_player, state, &answer.player_id) {
                score.vote_points += POINTS_PER_VOTE * i64::from(votes);
            }
        }

        per_player
            .into_values()
            .map(|mut s| {
                s.total = s.truth_bonus + s.vote_points;
                s
            })
            .collect()
    }

    /// Apply the current round's points to the cumulative scores.
    /// A round is only ever scored once.
    pub fn calculate_scores(&self, state: &GameState) -> GameState {
        let Some(round) = state.current_round.as_ref() else {
            return state.clone();
        };
        if round.scored_at.is_some() {
            tracing::debug!(round = round.round_number, "Round already scored");
            return state.clone();
        }

        let breakdown = self.round_breakdown(state);
        let mut next = state.clone();
        for score in &breakdown {
            if let Some(player) = next.players.iter_mut().find(|p| p.id == score.player_id) {
                player.score += score.total;
            }
        }
        next.scores = next
            .players
            .iter()
            .map(|p| (p.id.clone(), p.score))
            .collect();

        let now = Utc::now();
        if let Some(round) = next.current_round.as_mut() {
            round.scored_at = Some(now);
        }
        next.updated_at = now;
        next
    }

    /// Cumulative standings, best first
    pub fn leaderboard(&self, state: &GameState) -> Vec<Standing> {
        let mut standings: Vec<Standing> = state
            .players
            .iter()
            .map(|p| Standing {
                player_id: p.id.clone(),
                name: p.name.clone(),
                score: p.score,
            })
            .collect();

        // Sort by score descending, then name for a stable order
        standings.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.name.cmp(&b.name)));
        standings
    }
}

/// Authors who have left the room earn nothing
fn score_entry<'a>(
    per_player: &'a mut BTreeMap<PlayerId, RoundScore>,
    state: &GameState,
    player_id: &PlayerId,
) -> Option<&'a mut RoundScore> {
    state.player(player_id)?;
    Some(
        per_player
            .entry(player_id.clone())
            .or_insert_with(|| RoundScore {
                player_id: player_id.clone(),
                ..RoundScore::default()
            }),
    )
}
