use serde::{Deserialize, Serialize};

/// All teams in a league with the remaining draft order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct League {
    pub teams: Vec<Team>,
    #[serde(default = "default_snake_draft")]
    pub snake_draft: bool,
    /// Indices into `teams`, one per remaining turn
    #[serde(default)]
    pub draft_order: Vec<usize>,
    #[serde(default)]
    pub current_draft_turn: u32,
}

fn default_snake_draft() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub name: String,
    pub owner: String,
    #[serde(default)]
    pub simulator: bool,
    pub draft_order: u32,
    #[serde(default)]
    pub roster: Vec<Player>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub name: String,
    pub position: String,
}

impl League {
    /// The team whose turn it is, if the draft is still running.
    pub fn on_the_clock(&self) -> Option<&Team> {
        self.draft_order
            .first()
            .and_then(|&index| self.teams.get(index))
    }

    pub fn turns_remaining(&self) -> usize {
        self.draft_order.len()
    }

    pub fn team_for_owner(&self, owner: &str) -> Option<&Team> {
        self.teams
            .iter()
            .find(|team| team.owner.eq_ignore_ascii_case(owner))
    }
}

impl Team {
    pub fn roster_size(&self) -> usize {
        self.roster.len()
    }

    pub fn count_at(&self, position: &str) -> usize {
        self.roster
            .iter()
            .filter(|player| player.position.eq_ignore_ascii_case(position))
            .count()
    }
}
