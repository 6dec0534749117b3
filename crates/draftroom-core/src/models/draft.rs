use serde::{Deserialize, Serialize};

/// A draft as returned by `GET /draft/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    pub id: String,
    #[serde(default)]
    pub picks: Vec<Pick>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pick {
    pub name: String,
    #[serde(default)]
    pub team: Option<String>,
    #[serde(default)]
    pub position: Option<String>,
}

impl Draft {
    pub fn pick_count(&self) -> usize {
        self.picks.len()
    }

    pub fn latest_pick(&self) -> Option<&Pick> {
        self.picks.last()
    }

    /// Whether a player has already been picked (names compare case-insensitively)
    pub fn is_taken(&self, player: &str) -> bool {
        let player = player.trim();
        self.picks
            .iter()
            .any(|pick| pick.name.trim().eq_ignore_ascii_case(player))
    }
}

impl Pick {
    pub fn display(&self) -> String {
        match (&self.position, &self.team) {
            (Some(position), Some(team)) => format!("{} ({}) - {}", self.name, position.to_uppercase(), team),
            (None, Some(team)) => format!("{} - {}", self.name, team),
            (Some(position), None) => format!("{} ({})", self.name, position.to_uppercase()),
            (None, None) => self.name.clone(),
        }
    }
}
