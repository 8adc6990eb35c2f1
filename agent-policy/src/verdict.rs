//! Safety verdicts returned by reviewers.

use serde::{Deserialize, Serialize};

/// Outcome class of a safety review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictKind {
    /// No forbidden capability was found.
    Safe,
    /// At least one reviewer rejected the code.
    Unsafe,
}

/// Structured verdict with the reasons behind a rejection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyVerdict {
    kind: VerdictKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    reasons: Vec<String>,
}

impl SafetyVerdict {
    /// Returns a safe verdict.
    #[must_use]
    pub fn safe() -> Self {
        Self {
            kind: VerdictKind::Safe,
            reasons: Vec::new(),
        }
    }

    /// Returns an unsafe verdict.
    ///
    /// Blank reasons are dropped; an empty list becomes a generic reason so
    /// that a rejection is never unexplained.
    #[must_use]
    pub fn unsafe_with<I, S>(reasons: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut reasons: Vec<String> = reasons
            .into_iter()
            .map(Into::into)
            .map(|reason| reason.trim().to_owned())
            .filter(|reason| !reason.is_empty())
            .collect();
        if reasons.is_empty() {
            reasons.push("rejected without a stated reason".to_owned());
        }
        Self {
            kind: VerdictKind::Unsafe,
            reasons,
        }
    }

    /// Combines two verdicts: unsafe if either is unsafe, reasons
    /// concatenated in order without duplicates.
    #[must_use]
    pub fn or(self, other: Self) -> Self {
        match (self.kind, other.kind) {
            (VerdictKind::Safe, VerdictKind::Safe) => Self::safe(),
            _ => {
                let mut reasons = self.reasons;
                for reason in other.reasons {
                    if !reasons.contains(&reason) {
                        reasons.push(reason);
                    }
                }
                Self {
                    kind: VerdictKind::Unsafe,
                    reasons,
                }
            }
        }
    }

    /// Returns the verdict kind.
    #[must_use]
    pub fn kind(&self) -> VerdictKind {
        self.kind
    }

    /// Returns true for a safe verdict.
    #[must_use]
    pub fn is_safe(&self) -> bool {
        self.kind == VerdictKind::Safe
    }

    /// Reasons for an unsafe verdict, in reviewer order.
    #[must_use]
    pub fn reasons(&self) -> &[String] {
        &self.reasons
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn or_fails_closed_and_keeps_order() {
        let merged = SafetyVerdict::unsafe_with(["a", "b"])
            .or(SafetyVerdict::unsafe_with(["b", "c"]));
        assert!(!merged.is_safe());
        assert_eq!(merged.reasons(), ["a", "b", "c"]);

        let one_sided = SafetyVerdict::safe().or(SafetyVerdict::unsafe_with(["x"]));
        assert_eq!(one_sided.kind(), VerdictKind::Unsafe);

        assert!(SafetyVerdict::safe().or(SafetyVerdict::safe()).is_safe());
    }

    #[test]
    fn unsafe_verdicts_always_carry_a_reason() {
        let verdict = SafetyVerdict::unsafe_with(Vec::<String>::new());
        assert_eq!(verdict.reasons().len(), 1);
        let verdict = SafetyVerdict::unsafe_with(["  "]);
        assert_eq!(verdict.reasons(), ["rejected without a stated reason"]);
    }

    #[test]
    fn serializes_kind_in_snake_case() {
        let json = serde_json::to_string(&SafetyVerdict::safe()).unwrap();
        assert_eq!(json, r#"{"kind":"safe"}"#);
    }
}
