//! Static catalog of vote/action codes.

use serde::{Deserialize, Serialize};

use selection_types::VoteCode;

use crate::ActionError;

/// What a code does when it wins a round.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionRole {
    /// Triggers its keypress when it wins.
    Decisive,
    /// Decisive, and also awards the first-voter claim.
    Claim,
    /// Wins ties and below-threshold rounds; dispatches nothing.
    Neutral,
}

impl ActionRole {
    pub fn is_decisive(&self) -> bool {
        matches!(self, ActionRole::Decisive | ActionRole::Claim)
    }
}

/// A single vote command and the game action bound to it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub code: VoteCode,
    /// Display name, e.g. "Kill".
    pub name: String,
    pub description: String,
    /// Key sent to the game when this action wins; `None` for vote-only codes.
    pub keypress: Option<String>,
    /// Cooldown group honoured by the external dispatcher; informational here.
    pub cooldown_group: Option<String>,
    pub enabled: bool,
    /// Rollout phase in which the action became available.
    pub phase: u8,
    pub role: ActionRole,
}

impl Action {
    pub fn new(code: char, name: &str, description: &str, role: ActionRole) -> Self {
        Self {
            code: VoteCode::new(code),
            name: name.to_string(),
            description: description.to_string(),
            keypress: None,
            cooldown_group: None,
            enabled: true,
            phase: 1,
            role,
        }
    }

    pub fn with_keypress(mut self, key: &str, cooldown_group: &str) -> Self {
        self.keypress = Some(key.to_string());
        self.cooldown_group = Some(cooldown_group.to_string());
        self
    }
}

/// The catalog of actions, validated to contain exactly two decisive codes and
/// one neutral code.
#[derive(Clone, Debug)]
pub struct ActionRegistry {
    actions: Vec<Action>,
    decisive: (VoteCode, VoteCode),
    neutral: VoteCode,
    claim: Option<VoteCode>,
}

impl ActionRegistry {
    /// Build a registry from action definitions. Decisive codes keep their
    /// definition order: the first one is "decisive1" in resolution.
    pub fn new(actions: Vec<Action>) -> Result<Self, ActionError> {
        for (i, action) in actions.iter().enumerate() {
            if actions[..i].iter().any(|a| a.code == action.code) {
                return Err(ActionError::DuplicateCode(action.code));
            }
        }

        let neutrals: Vec<VoteCode> = actions
            .iter()
            .filter(|a| a.role == ActionRole::Neutral)
            .map(|a| a.code)
            .collect();
        if neutrals.len() != 1 {
            return Err(ActionError::NeutralCount(neutrals.len()));
        }

        let decisive: Vec<VoteCode> = actions
            .iter()
            .filter(|a| a.role.is_decisive())
            .map(|a| a.code)
            .collect();
        if decisive.len() != 2 {
            return Err(ActionError::DecisiveCount(decisive.len()));
        }

        let claims: Vec<VoteCode> = actions
            .iter()
            .filter(|a| a.role == ActionRole::Claim)
            .map(|a| a.code)
            .collect();
        if claims.len() > 1 {
            return Err(ActionError::ClaimCount(claims.len()));
        }

        Ok(Self {
            decisive: (decisive[0], decisive[1]),
            neutral: neutrals[0],
            claim: claims.first().copied(),
            actions,
        })
    }

    /// The phase-1 catalog: Kill, Lay (claim) and Extend.
    pub fn with_defaults() -> Self {
        Self {
            actions: default_actions(),
            decisive: (VoteCode::new('k'), VoteCode::new('l')),
            neutral: VoteCode::new('x'),
            claim: Some(VoteCode::new('l')),
        }
    }

    /// Whether `code` is known and currently enabled.
    pub fn is_valid(&self, code: VoteCode) -> bool {
        self.get(code).is_some_and(|a| a.enabled)
    }

    pub fn get(&self, code: VoteCode) -> Option<&Action> {
        self.actions.iter().find(|a| a.code == code)
    }

    pub fn all(&self) -> &[Action] {
        &self.actions
    }

    pub fn enabled_codes(&self) -> Vec<VoteCode> {
        self.actions
            .iter()
            .filter(|a| a.enabled)
            .map(|a| a.code)
            .collect()
    }

    /// The ordered decisive pair (decisive1, decisive2).
    pub fn decisive(&self) -> (VoteCode, VoteCode) {
        self.decisive
    }

    pub fn neutral(&self) -> VoteCode {
        self.neutral
    }

    pub fn claim_code(&self) -> Option<VoteCode> {
        self.claim
    }

    pub fn is_decisive(&self, code: VoteCode) -> bool {
        code == self.decisive.0 || code == self.decisive.1
    }

    /// Enable or disable a code. Disabled codes fail [`is_valid`](Self::is_valid)
    /// but keep their role.
    pub fn set_enabled(&mut self, code: VoteCode, enabled: bool) -> Result<(), ActionError> {
        let action = self
            .actions
            .iter_mut()
            .find(|a| a.code == code)
            .ok_or(ActionError::UnknownCode(code))?;
        action.enabled = enabled;
        Ok(())
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn default_actions() -> Vec<Action> {
    vec![
        Action::new(
            'k',
            "Kill",
            "Execute current organism (Delete key)",
            ActionRole::Decisive,
        )
        .with_keypress("Delete", "primary"),
        Action::new(
            'l',
            "Lay",
            "Force reproduction (Insert key)",
            ActionRole::Claim,
        )
        .with_keypress("Insert", "primary"),
        Action::new(
            'x',
            "Extend",
            "Keep watching current organism (no action)",
            ActionRole::Neutral,
        ),
    ]
}
