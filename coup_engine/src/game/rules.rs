//! Static rules tables: what each action costs, whether it needs a target,
//! which characters block it, and which character it claims.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::entities::{Character, Coins};

/// The seven declarable actions.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Income,
    ForeignAid,
    Coup,
    Tax,
    Assassinate,
    Steal,
    Exchange,
}

impl ActionKind {
    pub const ALL: [Self; 7] = [
        Self::Income,
        Self::ForeignAid,
        Self::Coup,
        Self::Tax,
        Self::Assassinate,
        Self::Steal,
        Self::Exchange,
    ];

    /// Behavioral descriptor for this action. The table is fixed at compile
    /// time; gameplay never mutates it.
    #[must_use]
    pub const fn rules(self) -> &'static ActionRules {
        match self {
            Self::Income => &ActionRules {
                cost: 0,
                needs_target: false,
                blockable_by: &[],
                claims: None,
            },
            Self::ForeignAid => &ActionRules {
                cost: 0,
                needs_target: false,
                blockable_by: &[Character::Duke],
                claims: None,
            },
            Self::Coup => &ActionRules {
                cost: 7,
                needs_target: true,
                blockable_by: &[],
                claims: None,
            },
            Self::Tax => &ActionRules {
                cost: 0,
                needs_target: false,
                blockable_by: &[],
                claims: Some(Character::Duke),
            },
            Self::Assassinate => &ActionRules {
                cost: 3,
                needs_target: true,
                blockable_by: &[Character::Contessa],
                claims: Some(Character::Assassin),
            },
            Self::Steal => &ActionRules {
                cost: 0,
                needs_target: true,
                blockable_by: &[Character::Captain, Character::Ambassador],
                claims: Some(Character::Captain),
            },
            Self::Exchange => &ActionRules {
                cost: 0,
                needs_target: false,
                blockable_by: &[],
                claims: Some(Character::Ambassador),
            },
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::Income => "Income",
            Self::ForeignAid => "Foreign Aid",
            Self::Coup => "Coup",
            Self::Tax => "Tax",
            Self::Assassinate => "Assassinate",
            Self::Steal => "Steal",
            Self::Exchange => "Exchange",
        };
        write!(f, "{repr}")
    }
}

/// Behavioral descriptor for one action kind.
#[derive(Debug)]
pub struct ActionRules {
    pub cost: Coins,
    pub needs_target: bool,
    /// Characters that may be claimed to block this action. Empty means
    /// unblockable.
    pub blockable_by: &'static [Character],
    /// Character the actor implicitly claims to hold. `None` means the
    /// action cannot be challenged.
    pub claims: Option<Character>,
}

impl ActionRules {
    #[must_use]
    pub const fn can_be_blocked(&self) -> bool {
        !self.blockable_by.is_empty()
    }

    #[must_use]
    pub const fn can_be_challenged(&self) -> bool {
        self.claims.is_some()
    }

    /// Income and Coup have no response window at all.
    #[must_use]
    pub const fn resolves_immediately(&self) -> bool {
        !self.can_be_blocked() && !self.can_be_challenged()
    }
}

/// Static client-facing description of a character's abilities.
#[derive(Debug, Serialize)]
pub struct CharacterInfo {
    pub name: &'static str,
    pub ability: &'static str,
    pub block_ability: Option<&'static str>,
}

impl Character {
    #[must_use]
    pub const fn info(self) -> &'static CharacterInfo {
        match self {
            Self::Duke => &CharacterInfo {
                name: "Duke",
                ability: "Tax: Take 3 coins",
                block_ability: Some("Blocks Foreign Aid"),
            },
            Self::Assassin => &CharacterInfo {
                name: "Assassin",
                ability: "Assassinate: Pay 3, kill target",
                block_ability: None,
            },
            Self::Captain => &CharacterInfo {
                name: "Captain",
                ability: "Steal: Take 2 coins from target",
                block_ability: Some("Blocks Stealing"),
            },
            Self::Ambassador => &CharacterInfo {
                name: "Ambassador",
                ability: "Exchange: Swap cards with deck",
                block_ability: Some("Blocks Stealing"),
            },
            Self::Contessa => &CharacterInfo {
                name: "Contessa",
                ability: "No action",
                block_ability: Some("Blocks Assassination"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_income_and_coup_resolve_immediately() {
        for kind in ActionKind::ALL {
            let immediate = kind.rules().resolves_immediately();
            match kind {
                ActionKind::Income | ActionKind::Coup => assert!(immediate, "{kind}"),
                _ => assert!(!immediate, "{kind}"),
            }
        }
    }

    #[test]
    fn challengeable_actions_claim_the_expected_character() {
        assert_eq!(ActionKind::Tax.rules().claims, Some(Character::Duke));
        assert_eq!(
            ActionKind::Assassinate.rules().claims,
            Some(Character::Assassin)
        );
        assert_eq!(ActionKind::Steal.rules().claims, Some(Character::Captain));
        assert_eq!(
            ActionKind::Exchange.rules().claims,
            Some(Character::Ambassador)
        );
        assert_eq!(ActionKind::Income.rules().claims, None);
        assert_eq!(ActionKind::ForeignAid.rules().claims, None);
        assert_eq!(ActionKind::Coup.rules().claims, None);
    }

    #[test]
    fn steal_is_blockable_by_captain_and_ambassador() {
        let rules = ActionKind::Steal.rules();
        assert!(rules.blockable_by.contains(&Character::Captain));
        assert!(rules.blockable_by.contains(&Character::Ambassador));
        assert_eq!(rules.blockable_by.len(), 2);
    }

    #[test]
    fn costs_match_the_rulebook() {
        assert_eq!(ActionKind::Coup.rules().cost, 7);
        assert_eq!(ActionKind::Assassinate.rules().cost, 3);
        for kind in [
            ActionKind::Income,
            ActionKind::ForeignAid,
            ActionKind::Tax,
            ActionKind::Steal,
            ActionKind::Exchange,
        ] {
            assert_eq!(kind.rules().cost, 0, "{kind}");
        }
    }
}
