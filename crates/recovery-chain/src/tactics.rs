//! The tactic catalog

use serde::{Deserialize, Serialize};
use wayfinder_core_types::{Locator, ResolveErrorKind, TextMatch};

use challenge_watch::ChallengeKind;

use crate::types::{Proposal, RecoveryContext};

/// Recovery tactic, ordered by explicit priority
///
/// Priorities are total-ordered: no two tactics share a value, so the
/// dispatch order is static and verifiable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tactic {
    /// Exactly one extra element matched: try the next-ranked match
    NextRankedMatch,
    /// Hidden elements polluted the match set: filter them out
    VisibilityFilter,
    /// Compound selector drifted: keep only its last segment
    SimplifySelector,
    /// Fall back to the descriptor's text hint
    TextSubstitute,
    /// Fall back to the kind's ARIA role
    RoleSubstitute,
    /// Timeout-classified failure: wait out the page and retry as-is
    WaitAndRetry,
    /// Last resort: tag with generic attribute exclusions
    AttributeRelax,
}

impl Tactic {
    /// All tactics in descending priority
    pub fn catalog() -> &'static [Tactic] {
        &[
            Tactic::NextRankedMatch,
            Tactic::VisibilityFilter,
            Tactic::SimplifySelector,
            Tactic::TextSubstitute,
            Tactic::RoleSubstitute,
            Tactic::WaitAndRetry,
            Tactic::AttributeRelax,
        ]
    }

    /// Get tactic name as string
    pub fn name(&self) -> &'static str {
        match self {
            Tactic::NextRankedMatch => "next-ranked-match",
            Tactic::VisibilityFilter => "visibility-filter",
            Tactic::SimplifySelector => "simplify-selector",
            Tactic::TextSubstitute => "text-substitute",
            Tactic::RoleSubstitute => "role-substitute",
            Tactic::WaitAndRetry => "wait-and-retry",
            Tactic::AttributeRelax => "attribute-relax",
        }
    }

    /// Explicit priority, higher first
    pub fn priority(&self) -> u8 {
        match self {
            Tactic::NextRankedMatch => 70,
            Tactic::VisibilityFilter => 60,
            Tactic::SimplifySelector => 50,
            Tactic::TextSubstitute => 40,
            Tactic::RoleSubstitute => 30,
            Tactic::WaitAndRetry => 20,
            Tactic::AttributeRelax => 10,
        }
    }

    /// Retry budget for this tactic
    pub fn max_retries(&self) -> u32 {
        match self {
            Tactic::WaitAndRetry => 2,
            _ => 1,
        }
    }

    /// Whether this tactic has anything to offer for the context
    pub fn applies(&self, ctx: &RecoveryContext) -> bool {
        match self {
            Tactic::NextRankedMatch => {
                ctx.match_count == 2 && matches!(ctx.failed_locator, Locator::Css(_))
            }
            Tactic::VisibilityFilter => {
                ctx.hidden_matches > 0 && matches!(ctx.failed_locator, Locator::Css(_))
            }
            Tactic::SimplifySelector => ctx.failed_locator.has_hierarchy(),
            Tactic::TextSubstitute => ctx
                .descriptor
                .text
                .as_deref()
                .is_some_and(|text| !text.trim().is_empty()),
            Tactic::RoleSubstitute => {
                ctx.descriptor.kind.is_interactive()
                    && !ctx.descriptor.kind.aria_roles().is_empty()
                    && ctx.descriptor.accessible_name().is_some()
            }
            Tactic::WaitAndRetry => {
                ctx.error == ResolveErrorKind::Timeout
                    || ctx.has_challenge(ChallengeKind::SlowNetwork)
            }
            Tactic::AttributeRelax => ctx.descriptor.kind.html_tag().is_some(),
        }
    }

    /// Propose a locator to re-validate; `None` when the context turns
    /// out to carry nothing usable after all.
    pub fn propose(&self, ctx: &RecoveryContext) -> Option<Proposal> {
        match self {
            Tactic::NextRankedMatch => ctx.failed_locator.with_index(2).map(|locator| Proposal {
                locator,
                reasoning: "exactly one extra match; taking the next-ranked element".into(),
            }),
            Tactic::VisibilityFilter => {
                ctx.failed_locator.visible_only().map(|locator| Proposal {
                    locator,
                    reasoning: format!(
                        "{} hidden elements in the match set; filtering to visible",
                        ctx.hidden_matches
                    ),
                })
            }
            Tactic::SimplifySelector => ctx.failed_locator.simplified().map(|locator| Proposal {
                locator,
                reasoning: "compound selector no longer matches; trying its last segment".into(),
            }),
            Tactic::TextSubstitute => {
                let text = ctx.descriptor.text.as_deref()?.trim();
                Some(Proposal {
                    locator: Locator::Text {
                        pattern: text.to_string(),
                        mode: TextMatch::Normalized,
                    },
                    reasoning: "substituting the descriptor's text hint".into(),
                })
            }
            Tactic::RoleSubstitute => {
                let role = ctx.descriptor.kind.aria_roles().first()?;
                let name = ctx.descriptor.accessible_name()?;
                Some(Proposal {
                    locator: Locator::Role {
                        role: (*role).to_string(),
                        name: Some(name.trim().to_string()),
                    },
                    reasoning: "substituting an ARIA role locator".into(),
                })
            }
            Tactic::WaitAndRetry => Some(Proposal {
                locator: ctx.failed_locator.clone(),
                reasoning: "timeout-classified failure; waiting out the page".into(),
            }),
            Tactic::AttributeRelax => {
                let tag = ctx.descriptor.kind.html_tag()?;
                Some(Proposal {
                    locator: Locator::Css(format!("{tag}:not([disabled]):not([hidden])")),
                    reasoning: "last resort: tag with generic attribute exclusions".into(),
                })
            }
        }
    }
}
