//! Rank hierarchy and the rank-modification permission check.
//!
//! Pure decision logic: no I/O, safe to call without network access.

use std::{fmt, str::FromStr};

/// Fixed, totally ordered rank table (lowest first).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Rank {
    Aspirant,
    Novice,
    Adept,
    Crusader,
    Paladin,
    Exemplar,
    Prospect,
    Commander,
    Marshal,
    General,
    ChiefGeneral,
}

impl Rank {
    pub const ALL: [Rank; 11] = [
        Rank::Aspirant,
        Rank::Novice,
        Rank::Adept,
        Rank::Crusader,
        Rank::Paladin,
        Rank::Exemplar,
        Rank::Prospect,
        Rank::Commander,
        Rank::Marshal,
        Rank::General,
        Rank::ChiefGeneral,
    ];

    /// Rank assigned to newly added members.
    pub const LOWEST: Rank = Rank::Aspirant;

    /// Hierarchy level, 1 (lowest) through 11 (highest).
    pub fn level(self) -> u8 {
        self as u8 + 1
    }

    pub fn name(self) -> &'static str {
        match self {
            Rank::Aspirant => "Aspirant",
            Rank::Novice => "Novice",
            Rank::Adept => "Adept",
            Rank::Crusader => "Crusader",
            Rank::Paladin => "Paladin",
            Rank::Exemplar => "Exemplar",
            Rank::Prospect => "Prospect",
            Rank::Commander => "Commander",
            Rank::Marshal => "Marshal",
            Rank::General => "General",
            Rank::ChiefGeneral => "Chief General",
        }
    }

    /// Exact (case-sensitive) name lookup.
    pub fn from_name(name: &str) -> Option<Rank> {
        Rank::ALL.into_iter().find(|r| r.name() == name)
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown rank: {0}")]
pub struct UnknownRank(pub String);

impl FromStr for Rank {
    type Err = UnknownRank;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Rank::from_name(s).ok_or_else(|| UnknownRank(s.to_string()))
    }
}

/// Level of a rank name, or 0 when the name is not in the table.
pub fn level_of(rank_name: &str) -> u8 {
    Rank::from_name(rank_name).map(Rank::level).unwrap_or(0)
}

// ============== Permission Check ==============

pub const SELF_MODIFY_REASON: &str = "You cannot change your own rank.";
pub const GRANTED_REASON: &str = "Permission granted";

/// Decide whether `actor_rank` may change the rank of a member at `target_rank`.
///
/// Returns `(allowed, reason)`. When both ids are present and equal the request
/// is denied before any rank comparison. Otherwise the actor must be strictly
/// higher than the target; equal levels are not enough.
pub fn can_modify(
    actor_rank: &str,
    target_rank: &str,
    actor_id: Option<&str>,
    target_id: Option<&str>,
) -> (bool, String) {
    if let (Some(a), Some(t)) = (actor_id, target_id) {
        if a == t {
            return (false, SELF_MODIFY_REASON.to_string());
        }
    }

    let actor_level = level_of(actor_rank);
    let target_level = level_of(target_rank);

    if actor_level == 0 {
        return (false, format!("Unknown user rank: {actor_rank}"));
    }
    if target_level == 0 {
        return (false, format!("Unknown target rank: {target_rank}"));
    }

    if actor_level <= target_level {
        return (
            false,
            format!(
                "You don't have permission to change this member's rank. \
                 The target is a **{target_rank}** and you are a **{actor_rank}**. \
                 You can only change ranks of members below your level."
            ),
        );
    }

    (true, GRANTED_REASON.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_follow_table_order() {
        for (idx, rank) in Rank::ALL.iter().enumerate() {
            assert_eq!(rank.level() as usize, idx + 1);
            assert_eq!(level_of(rank.name()), rank.level());
        }
        assert_eq!(level_of("Chief General"), 11);
        assert_eq!(Rank::LOWEST.name(), "Aspirant");
    }

    #[test]
    fn unknown_names_map_to_zero() {
        assert_eq!(level_of(""), 0);
        assert_eq!(level_of("Admiral"), 0);
        assert_eq!(level_of("marshal"), 0);
        assert_eq!(level_of("ChiefGeneral"), 0);
        assert!("Admiral".parse::<Rank>().is_err());
    }

    #[test]
    fn strictly_higher_rank_is_required_for_every_pair() {
        for a in Rank::ALL {
            for b in Rank::ALL {
                let (ok, reason) = can_modify(a.name(), b.name(), Some("1"), Some("2"));
                assert_eq!(ok, a.level() > b.level(), "{a} -> {b}: {reason}");
                if a == b {
                    assert!(!ok);
                }
            }
        }
    }

    #[test]
    fn marshal_can_change_novice() {
        let (ok, reason) = can_modify("Marshal", "Novice", None, None);
        assert!(ok);
        assert_eq!(reason, GRANTED_REASON);
    }

    #[test]
    fn novice_cannot_change_marshal() {
        let (ok, reason) = can_modify("Novice", "Marshal", None, None);
        assert!(!ok);
        assert!(reason.contains("**Marshal**"));
        assert!(reason.contains("**Novice**"));
        assert!(reason.contains("below your level"));
    }

    #[test]
    fn equal_levels_are_denied() {
        let (ok, reason) = can_modify("Commander", "Commander", Some("10"), Some("20"));
        assert!(!ok);
        assert!(reason.contains("**Commander**"));
    }

    #[test]
    fn self_modification_is_denied_before_rank_comparison() {
        let (ok, reason) = can_modify("Chief General", "Aspirant", Some("7"), Some("7"));
        assert!(!ok);
        assert_eq!(reason, SELF_MODIFY_REASON);

        let (ok, reason) = can_modify("Nobody", "Whatever", Some("7"), Some("7"));
        assert!(!ok);
        assert_eq!(reason, SELF_MODIFY_REASON);
    }

    #[test]
    fn one_missing_id_skips_self_check() {
        let (ok, _) = can_modify("General", "Adept", Some("7"), None);
        assert!(ok);
    }

    #[test]
    fn unknown_side_is_named_in_reason() {
        let (ok, reason) = can_modify("Admiral", "Novice", None, None);
        assert!(!ok);
        assert_eq!(reason, "Unknown user rank: Admiral");

        let (ok, reason) = can_modify("Marshal", "Recruit", None, None);
        assert!(!ok);
        assert_eq!(reason, "Unknown target rank: Recruit");

        let (ok, reason) = can_modify("Admiral", "Recruit", None, None);
        assert!(!ok);
        assert_eq!(reason, "Unknown user rank: Admiral");
    }
}
