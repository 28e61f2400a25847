//! Claim-based access policies
//!
//! A [`Policy`] is an ordered list of [`Rule`]s. Rules are tried top to bottom and the first
//! one whose [`Conditions`] all hold decides the outcome. Within a condition the patterns are
//! alternatives, so `repository: ["myorg/*", "partner/tooling"]` holds for either.
//!
//! Policies are usually loaded from configuration:
//!
//! ```
//! use gha_oidc::Policy;
//!
//! let policy = Policy::from_json(r#"{
//!     "rules": [
//!         {
//!             "name": "deploy-from-main",
//!             "conditions": {
//!                 "repository": ["myorg/*"],
//!                 "ref": ["refs/heads/main"],
//!                 "environment": ["production"]
//!             },
//!             "effect": "allow"
//!         }
//!     ],
//!     "default_deny": true
//! }"#)?;
//!
//! assert_eq!(policy.rules.len(), 1);
//! # Ok::<(), gha_oidc::PolicyError>(())
//! ```

use std::borrow::Cow;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::claims::ActionsClaims;
use crate::error::PolicyError;
use crate::matcher::is_match_any;

/// What happens when a rule matches
///
/// Unknown effect strings are kept as [`Effect::Unrecognized`] so that [`Policy::validate`]
/// can report them against the rule that carries them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Effect {
    Allow,
    Deny,
    Unrecognized(String),
}

impl Effect {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
            Self::Unrecognized(effect) => effect,
        }
    }
}

impl Default for Effect {
    /// A rule without an effect is rejected by [`Policy::validate`]
    fn default() -> Self {
        Self::Unrecognized(String::new())
    }
}

impl From<String> for Effect {
    fn from(effect: String) -> Self {
        match effect.as_str() {
            "allow" => Self::Allow,
            "deny" => Self::Deny,
            _ => Self::Unrecognized(effect),
        }
    }
}

impl From<Effect> for String {
    fn from(effect: Effect) -> Self {
        match effect {
            Effect::Unrecognized(effect) => effect,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Glob patterns per claim; a condition with no patterns is ignored
///
/// Unknown condition names fail deserialization, so a misspelled claim cannot silently widen
/// a rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Conditions {
    /// e.g. `myorg/*`, `myorg/myrepo`
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub repository: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub repository_owner: Vec<String>,
    /// `public`, `private`, `internal`
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub repository_visibility: Vec<String>,
    /// e.g. `refs/heads/main`, `refs/tags/**`
    #[serde(rename = "ref", skip_serializing_if = "Vec::is_empty")]
    pub git_ref: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ref_type: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub workflow: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub event_name: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub actor: Vec<String>,
    /// Never holds for tokens without an environment
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub environment: Vec<String>,
}

impl Conditions {
    /// True when no condition has any pattern
    pub fn is_empty(&self) -> bool {
        self.repository.is_empty()
            && self.repository_owner.is_empty()
            && self.repository_visibility.is_empty()
            && self.git_ref.is_empty()
            && self.ref_type.is_empty()
            && self.workflow.is_empty()
            && self.event_name.is_empty()
            && self.actor.is_empty()
            && self.environment.is_empty()
    }

    /// Check every active condition against the claims, stopping at the first that fails
    pub fn matches(&self, claims: &ActionsClaims) -> bool {
        holds(&self.repository, &claims.repository)
            && holds(&self.repository_owner, &claims.repository_owner)
            && holds(&self.repository_visibility, &claims.repository_visibility)
            && holds(&self.git_ref, &claims.git_ref)
            && holds(&self.ref_type, &claims.ref_type)
            && holds(&self.workflow, &claims.workflow)
            && holds(&self.event_name, &claims.event_name)
            && holds(&self.actor, &claims.actor)
            && holds_if_present(&self.environment, claims.environment())
    }
}

fn holds(patterns: &[String], value: &str) -> bool {
    patterns.is_empty() || is_match_any(patterns, value)
}

fn holds_if_present(patterns: &[String], value: Option<&str>) -> bool {
    if patterns.is_empty() {
        return true;
    }
    value.is_some_and(|value| is_match_any(patterns, value))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Optional identifier, reported in decisions and validation errors
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default)]
    pub conditions: Conditions,
    #[serde(default)]
    pub effect: Effect,
}

impl Rule {
    pub fn allow(name: impl Into<String>, conditions: Conditions) -> Self {
        Self {
            name: name.into(),
            conditions,
            effect: Effect::Allow,
        }
    }

    pub fn deny(name: impl Into<String>, conditions: Conditions) -> Self {
        Self {
            name: name.into(),
            conditions,
            effect: Effect::Deny,
        }
    }

    /// The rule name, or `rule[<index>]` for unnamed rules
    fn label(&self, index: usize) -> Cow<'_, str> {
        if self.name.is_empty() {
            Cow::Owned(format!("rule[{index}]"))
        } else {
            Cow::Borrowed(&self.name)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    /// Evaluated in order, first match wins
    #[serde(default)]
    pub rules: Vec<Rule>,
    /// Deny requests that match no rule. When false they are allowed, which is rarely what
    /// you want.
    #[serde(default)]
    pub default_deny: bool,
}

/// Outcome of evaluating a policy against a set of claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvaluationResult {
    pub allowed: bool,
    /// Rule that decided, if any: its configured name, or the positional label `rule[<index>]`
    /// when the rule is unnamed
    pub matched_rule: Option<String>,
    pub reason: String,
}

impl Policy {
    pub fn new(rules: Vec<Rule>, default_deny: bool) -> Self {
        Self {
            rules,
            default_deny,
        }
    }

    /// Parse a JSON policy and validate it
    pub fn from_json(json: &str) -> Result<Self, PolicyError> {
        let policy: Self = serde_json::from_str(json)?;
        policy.validate()?;
        Ok(policy)
    }

    pub fn evaluate(&self, claims: &ActionsClaims) -> EvaluationResult {
        let matched = self
            .rules
            .iter()
            .enumerate()
            .find(|(_, rule)| rule.conditions.matches(claims));

        if let Some((index, rule)) = matched {
            let label = rule.label(index);
            let allowed = rule.effect == Effect::Allow;
            tracing::debug!(rule = %label, allowed, "policy rule matched");

            return EvaluationResult {
                allowed,
                reason: format!("rule: {label}"),
                matched_rule: Some(label.into_owned()),
            };
        }

        if self.default_deny {
            return EvaluationResult {
                allowed: false,
                matched_rule: None,
                reason: "default deny policy".to_string(),
            };
        }

        EvaluationResult {
            allowed: true,
            matched_rule: None,
            reason: "default allow (no matching rules)".to_string(),
        }
    }

    /// Reject policies that are almost certainly authoring mistakes
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.rules.is_empty() {
            return Err(PolicyError::NoRules);
        }

        for (index, rule) in self.rules.iter().enumerate() {
            if let Effect::Unrecognized(effect) = &rule.effect {
                return Err(PolicyError::InvalidEffect {
                    rule: rule.label(index).into_owned(),
                    effect: effect.clone(),
                });
            }

            // A conditionless rule would match every token
            if rule.conditions.is_empty() {
                return Err(PolicyError::NoConditions {
                    rule: rule.label(index).into_owned(),
                });
            }
        }

        Ok(())
    }
}

/// Evaluate an optional policy; without one every verified token is allowed
pub fn evaluate(policy: Option<&Policy>, claims: &ActionsClaims) -> EvaluationResult {
    match policy {
        Some(policy) => policy.evaluate(claims),
        None => EvaluationResult {
            allowed: true,
            matched_rule: None,
            reason: "no policy configured".to_string(),
        },
    }
}

/// Validate an optional policy; having no policy is valid
pub fn validate(policy: Option<&Policy>) -> Result<(), PolicyError> {
    policy.map_or(Ok(()), Policy::validate)
}
