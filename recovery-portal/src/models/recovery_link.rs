//! Parameters carried by an emailed recovery link.
//!
//! Depending on how the platform delivered the link, the proof shows up in
//! the query string (`?token_hash=…&type=recovery`, the documented email
//! template format) or in the URL fragment (`#access_token=…&refresh_token=…&type=recovery`,
//! the implicit-grant redirect). Both locations are read; query values win.

use reqwest::Url;
use std::fmt;

/// Proof keys in lookup order.
const PROOF_KEYS: [&str; 3] = ["token_hash", "access_token", "token"];
const REFRESH_KEY: &str = "refresh_token";
const KIND_KEY: &str = "type";

/// Purpose tag of an inbound link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkKind {
    Recovery,
    Signup,
    Other(String),
}

impl LinkKind {
    fn parse(raw: &str) -> Self {
        match raw {
            "recovery" => LinkKind::Recovery,
            "signup" => LinkKind::Signup,
            other => LinkKind::Other(other.to_string()),
        }
    }
}

#[derive(Clone, Default, PartialEq, Eq)]
pub struct RecoveryLink {
    pub proof: Option<String>,
    pub kind: Option<LinkKind>,
    pub refresh_proof: Option<String>,
}

impl RecoveryLink {
    /// Build a link from a raw query string and an optional raw fragment
    /// (both without their leading `?` / `#`).
    pub fn from_parts(query: Option<&str>, fragment: Option<&str>) -> Self {
        let query = parse_pairs(query);
        let fragment = parse_pairs(fragment);

        let lookup = |key: &str| -> Option<String> {
            find(&query, key).or_else(|| find(&fragment, key))
        };

        let proof = PROOF_KEYS.iter().find_map(|key| lookup(*key));

        Self {
            proof,
            kind: lookup(KIND_KEY).map(|k| LinkKind::parse(&k)),
            refresh_proof: lookup(REFRESH_KEY),
        }
    }

    /// Parse a full link URL; `None` when the URL itself is malformed.
    pub fn from_url(link: &str) -> Option<Self> {
        let url = Url::parse(link).ok()?;
        Some(Self::from_parts(url.query(), url.fragment()))
    }

    pub fn has_proof(&self) -> bool {
        self.proof.is_some()
    }

    /// Whether this page load is a recovery link landing: an explicit
    /// `type=recovery`, or an untyped link that still carries a proof.
    pub fn is_recovery_landing(&self) -> bool {
        match &self.kind {
            Some(LinkKind::Recovery) => true,
            Some(_) => false,
            None => self.proof.is_some(),
        }
    }
}

// Proofs are credentials; only their presence is printed.
impl fmt::Debug for RecoveryLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecoveryLink")
            .field("proof", &self.proof.as_ref().map(|_| "<redacted>"))
            .field("kind", &self.kind)
            .field("refresh_proof", &self.refresh_proof.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

fn parse_pairs(raw: Option<&str>) -> Vec<(String, String)> {
    raw.map(|s| s.trim_start_matches(['?', '#']))
        .filter(|s| !s.is_empty())
        .and_then(|s| serde_urlencoded::from_str::<Vec<(String, String)>>(s).ok())
        .unwrap_or_default()
}

fn find(pairs: &[(String, String)], key: &str) -> Option<String> {
    pairs
        .iter()
        .find(|(k, v)| k == key && !v.trim().is_empty())
        .map(|(_, v)| v.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_documented_query_format() {
        let link = RecoveryLink::from_parts(Some("token_hash=abc123&type=recovery"), None);

        assert_eq!(link.proof.as_deref(), Some("abc123"));
        assert_eq!(link.kind, Some(LinkKind::Recovery));
        assert!(link.refresh_proof.is_none());
        assert!(link.is_recovery_landing());
    }

    #[test]
    fn test_fragment_delivery_with_refresh_proof() {
        let link = RecoveryLink::from_parts(
            None,
            Some("access_token=eyJhbGci&refresh_token=r-456&expires_in=3600&type=recovery"),
        );

        assert_eq!(link.proof.as_deref(), Some("eyJhbGci"));
        assert_eq!(link.refresh_proof.as_deref(), Some("r-456"));
        assert_eq!(link.kind, Some(LinkKind::Recovery));
    }

    #[test]
    fn test_query_wins_over_fragment() {
        let link = RecoveryLink::from_parts(Some("token=from-query"), Some("token=from-fragment"));
        assert_eq!(link.proof.as_deref(), Some("from-query"));
    }

    #[test]
    fn test_proof_key_priority() {
        let link = RecoveryLink::from_parts(Some("token=legacy&access_token=jwt"), None);
        assert_eq!(link.proof.as_deref(), Some("jwt"));

        let link = RecoveryLink::from_parts(Some("access_token=jwt"), Some("token_hash=hash"));
        assert_eq!(link.proof.as_deref(), Some("hash"));
    }

    #[test]
    fn test_empty_values_are_absent() {
        let link = RecoveryLink::from_parts(Some("token_hash=&type=recovery"), Some("token=%20"));

        assert!(!link.has_proof());
        // Still a landing: the form must report the missing token.
        assert!(link.is_recovery_landing());
    }

    #[test]
    fn test_other_kinds_are_not_landings() {
        let link = RecoveryLink::from_parts(Some("token_hash=abc&type=signup"), None);
        assert_eq!(link.kind, Some(LinkKind::Signup));
        assert!(!link.is_recovery_landing());

        let link = RecoveryLink::from_parts(Some("token_hash=abc&type=magiclink"), None);
        assert_eq!(link.kind, Some(LinkKind::Other("magiclink".to_string())));
        assert!(!link.is_recovery_landing());
    }

    #[test]
    fn test_no_parameters() {
        let link = RecoveryLink::from_parts(None, Some(""));
        assert_eq!(link, RecoveryLink::default());
        assert!(!link.is_recovery_landing());
    }

    #[test]
    fn test_from_url_reads_both_locations() {
        let link = RecoveryLink::from_url(
            "https://hr.example.com/reset-password?type=recovery#access_token=a%2Bb&refresh_token=r",
        )
        .unwrap();

        assert_eq!(link.proof.as_deref(), Some("a+b"));
        assert_eq!(link.refresh_proof.as_deref(), Some("r"));
        assert_eq!(link.kind, Some(LinkKind::Recovery));
    }

    #[test]
    fn test_debug_redacts_proofs() {
        let link = RecoveryLink::from_parts(Some("token_hash=super-secret&refresh_token=also"), None);
        let printed = format!("{:?}", link);

        assert!(!printed.contains("super-secret"));
        assert!(!printed.contains("also"));
        assert!(printed.contains("<redacted>"));
    }
}
