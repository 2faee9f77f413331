use serde::{Deserialize, Serialize};

use crate::core::meta::Side;

/// Raw compatibility signal for one side, as the catalog and bundle
/// manifests spell it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SideSupport {
    Required,
    Optional,
    Unsupported,
    #[default]
    #[serde(other)]
    Unknown,
}

impl SideSupport {
    /// Absent and unrecognized values are both `Unknown`.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("required") => SideSupport::Required,
            Some("optional") => SideSupport::Optional,
            Some("unsupported") => SideSupport::Unsupported,
            _ => SideSupport::Unknown,
        }
    }

    pub fn support(self) -> Support {
        match self {
            SideSupport::Required | SideSupport::Optional => Support::Supported,
            SideSupport::Unsupported => Support::Unsupported,
            SideSupport::Unknown => Support::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SideSupport::Required => "required",
            SideSupport::Optional => "optional",
            SideSupport::Unsupported => "unsupported",
            SideSupport::Unknown => "unknown",
        }
    }
}

/// The three-valued signal the decision table works on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Support {
    Supported,
    Unsupported,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideDecision {
    /// Installable on neither side.
    Skip,
    Universal,
    Client,
    Server,
}

impl SideDecision {
    pub fn side(self) -> Option<Side> {
        match self {
            SideDecision::Skip => None,
            SideDecision::Universal => Some(Side::Both),
            SideDecision::Client => Some(Side::Client),
            SideDecision::Server => Some(Side::Server),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SideResolution {
    pub decision: SideDecision,
    pub warnings: Vec<String>,
}

/// Classify an artifact from its client and server signals.
///
/// Total over all nine combinations. Where both fallbacks could apply the
/// client side is checked first.
pub fn resolve(client: SideSupport, server: SideSupport) -> SideResolution {
    use Support::*;

    let decision = match (client.support(), server.support()) {
        (Unsupported, Unsupported) | (Unsupported, Unknown) | (Unknown, Unsupported) => {
            SideDecision::Skip
        }
        (Supported, Supported) | (Unknown, Unknown) => SideDecision::Universal,
        (Supported, Unsupported) | (Supported, Unknown) => SideDecision::Client,
        (Unsupported, Supported) | (Unknown, Supported) => SideDecision::Server,
    };

    let mut warnings = Vec::new();
    if decision != SideDecision::Skip {
        if client == SideSupport::Unknown {
            warnings.push(format!(
                "client support is unknown; treating as {}",
                describe(decision)
            ));
        }
        if server == SideSupport::Unknown {
            warnings.push(format!(
                "server support is unknown; treating as {}",
                describe(decision)
            ));
        }
    }

    SideResolution { decision, warnings }
}

/// Project-level resolution used by import. Never skips: where the table
/// says skip the artifact is installed on both sides with a warning.
pub fn resolve_project(client: SideSupport, server: SideSupport) -> (Side, Vec<String>) {
    let SideResolution {
        decision,
        mut warnings,
    } = resolve(client, server);

    match decision.side() {
        Some(side) => (side, warnings),
        None => {
            warnings.push(format!(
                "no supported side (client: {}, server: {}); assuming universal",
                client.as_str(),
                server.as_str()
            ));
            (Side::Both, warnings)
        }
    }
}

fn describe(decision: SideDecision) -> &'static str {
    match decision {
        SideDecision::Skip => "skip",
        SideDecision::Universal => "universal",
        SideDecision::Client => "client-only",
        SideDecision::Server => "server-only",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SUPPORTED: SideSupport = SideSupport::Required;
    const UNSUPPORTED: SideSupport = SideSupport::Unsupported;
    const UNKNOWN: SideSupport = SideSupport::Unknown;

    #[test]
    fn every_combination_has_one_decision() {
        let table = [
            (SUPPORTED, SUPPORTED, SideDecision::Universal),
            (SUPPORTED, UNSUPPORTED, SideDecision::Client),
            (SUPPORTED, UNKNOWN, SideDecision::Client),
            (UNSUPPORTED, SUPPORTED, SideDecision::Server),
            (UNSUPPORTED, UNSUPPORTED, SideDecision::Skip),
            (UNSUPPORTED, UNKNOWN, SideDecision::Skip),
            (UNKNOWN, SUPPORTED, SideDecision::Server),
            (UNKNOWN, UNSUPPORTED, SideDecision::Skip),
            (UNKNOWN, UNKNOWN, SideDecision::Universal),
        ];

        for (client, server, expected) in table {
            let resolution = resolve(client, server);
            assert_eq!(resolution.decision, expected, "{client:?} / {server:?}");

            let has_unknown = client == UNKNOWN || server == UNKNOWN;
            let should_warn = has_unknown && expected != SideDecision::Skip;
            assert_eq!(
                !resolution.warnings.is_empty(),
                should_warn,
                "{client:?} / {server:?}"
            );
        }
    }

    #[test]
    fn optional_counts_as_supported() {
        assert_eq!(
            resolve(SideSupport::Optional, SideSupport::Required).decision,
            SideDecision::Universal
        );
        assert_eq!(
            resolve(SideSupport::Optional, UNSUPPORTED).decision,
            SideDecision::Client
        );
    }

    #[test]
    fn required_client_unsupported_server() {
        let resolution = resolve(
            SideSupport::parse(Some("required")),
            SideSupport::parse(Some("unsupported")),
        );
        assert_eq!(resolution.decision, SideDecision::Client);
        assert!(resolution.warnings.is_empty());
    }

    #[test]
    fn unknown_client_unsupported_server_is_skipped() {
        let resolution = resolve(
            SideSupport::parse(Some("unknown")),
            SideSupport::parse(Some("unsupported")),
        );
        assert_eq!(resolution.decision, SideDecision::Skip);
        assert_eq!(resolution.decision.side(), None);
    }

    #[test]
    fn parse_treats_garbage_and_absence_as_unknown() {
        assert_eq!(SideSupport::parse(None), UNKNOWN);
        assert_eq!(SideSupport::parse(Some("sometimes")), UNKNOWN);
        let parsed: SideSupport = serde_json::from_str("\"sometimes\"").unwrap();
        assert_eq!(parsed, UNKNOWN);
    }

    #[test]
    fn project_resolution_never_skips() {
        let (side, warnings) = resolve_project(UNSUPPORTED, UNSUPPORTED);
        assert_eq!(side, Side::Both);
        assert_eq!(warnings.len(), 1);

        let (side, warnings) = resolve_project(SUPPORTED, UNSUPPORTED);
        assert_eq!(side, Side::Client);
        assert!(warnings.is_empty());
    }
}
