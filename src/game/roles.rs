//! Role rules as data.
//!
//! Everything the orchestrator needs to know about a role lives in one
//! `RoleRules` row, so adding a role means adding a row here rather than
//! editing every match in the session code.

use crate::types::{Faction, NightActionKind, Role};

/// How a role's night action counts toward night completion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NightDuty {
    /// No night action; never blocks the night
    None,
    /// Each living holder must act once
    Individual,
    /// Holders vote together and are done once their consensus closes
    Team,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleRules {
    pub role: Role,
    pub faction: Faction,
    pub action: Option<NightActionKind>,
    pub duty: NightDuty,
    /// Whether the holder may pick themselves as the night target
    pub may_target_self: bool,
    /// Whether the holder may pick a member of their own faction
    pub may_target_faction: bool,
}

impl RoleRules {
    /// Team-voting roles may revise their pick until consensus closes
    pub fn is_repeatable(&self) -> bool {
        self.duty == NightDuty::Team
    }
}

/// One row per role, in the order `Role::rules` indexes them
pub static ROLE_TABLE: [RoleRules; 4] = [
    RoleRules {
        role: Role::Mafia,
        faction: Faction::Mafia,
        action: Some(NightActionKind::Kill),
        duty: NightDuty::Team,
        may_target_self: false,
        may_target_faction: false,
    },
    RoleRules {
        role: Role::Doctor,
        faction: Faction::Town,
        action: Some(NightActionKind::Shield),
        duty: NightDuty::Individual,
        may_target_self: true,
        may_target_faction: true,
    },
    RoleRules {
        role: Role::Detective,
        faction: Faction::Town,
        action: Some(NightActionKind::Investigate),
        duty: NightDuty::Individual,
        may_target_self: false,
        may_target_faction: true,
    },
    RoleRules {
        role: Role::Citizen,
        faction: Faction::Town,
        action: None,
        duty: NightDuty::None,
        may_target_self: false,
        may_target_faction: false,
    },
];

impl Role {
    pub fn rules(self) -> &'static RoleRules {
        // Exhaustive so a new role cannot compile without a row
        let row = match self {
            Role::Mafia => 0,
            Role::Doctor => 1,
            Role::Detective => 2,
            Role::Citizen => 3,
        };
        &ROLE_TABLE[row]
    }

    pub fn faction(self) -> Faction {
        self.rules().faction
    }
}
