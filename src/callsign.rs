//! Callsign normalization for United flights, which show up in the feeds
//! as any of `262`, `UA262`, `UAL262`, or the spaced forms.

/// All callsign spellings to try for a user-supplied flight identifier.
/// The trimmed, upper-cased input is always the first entry.
pub fn callsign_variants(raw: &str) -> Vec<String> {
    let callsign = raw.trim().to_uppercase();
    let mut variants = vec![callsign.clone()];

    if !callsign.is_empty() && callsign.chars().all(|c| c.is_ascii_digit()) {
        variants.push(format!("UA{}", callsign));
        variants.push(format!("UAL{}", callsign));
        variants.push(format!("UA {}", callsign));
        variants.push(format!("UAL {}", callsign));
    } else if let Some(number) = callsign.strip_prefix("UAL") {
        let number = number.trim();
        variants.push(format!("UA{}", number));
        variants.push(format!("UA {}", number));
        variants.push(format!("UAL {}", number));
    } else if let Some(number) = callsign.strip_prefix("UA") {
        let number = number.trim();
        variants.push(format!("UAL{}", number));
        variants.push(format!("UA {}", number));
        variants.push(format!("UAL {}", number));
    }

    variants
}

/// Does a feed callsign match any of the variants?
pub fn matches_variants(candidate: &str, variants: &[String]) -> bool {
    let candidate = candidate.trim().to_uppercase();
    variants.iter().any(|v| *v == candidate)
}

/// Callsigns from `seen` that share a two-character prefix with any
/// variant, deduplicated, capped at `limit`. Used for "did you mean"
/// hints when a lookup comes up empty.
pub fn similar_callsigns<'a, I>(seen: I, variants: &[String], limit: usize) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let prefixes: Vec<&str> = variants.iter().filter_map(|v| v.get(..2)).collect();
    let mut similar = Vec::new();
    for callsign in seen {
        let callsign = callsign.trim().to_uppercase();
        if callsign.is_empty() || !prefixes.iter().any(|p| callsign.starts_with(p)) {
            continue;
        }
        if !similar.contains(&callsign) {
            similar.push(callsign);
        }
        if similar.len() == limit {
            break;
        }
    }
    similar
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variants_bare_number() {
        let variants = callsign_variants("262");
        assert_eq!(variants[0], "262");
        assert!(variants.contains(&"UA262".to_string()));
        assert!(variants.contains(&"UAL262".to_string()));
        assert!(variants.contains(&"UA 262".to_string()));
        assert!(variants.contains(&"UAL 262".to_string()));
        assert_eq!(variants.len(), 5);
    }

    #[test]
    fn test_variants_ua_prefix() {
        let variants = callsign_variants("UA262");
        assert_eq!(variants[0], "UA262");
        assert!(variants.contains(&"UAL262".to_string()));
        assert!(variants.contains(&"UA 262".to_string()));
        assert!(variants.contains(&"UAL 262".to_string()));
        assert_eq!(variants.len(), 4);
    }

    #[test]
    fn test_variants_ual_prefix() {
        let variants = callsign_variants("UAL262");
        assert_eq!(variants[0], "UAL262");
        assert!(variants.contains(&"UA262".to_string()));
        assert!(variants.contains(&"UA 262".to_string()));
        assert!(variants.contains(&"UAL 262".to_string()));
    }

    #[test]
    fn test_variants_normalize_case_and_whitespace() {
        let variants = callsign_variants("  ua262 ");
        assert_eq!(variants[0], "UA262");
        assert!(variants.contains(&"UAL262".to_string()));
    }

    #[test]
    fn test_variants_other_airline_untouched() {
        let variants = callsign_variants("DLH441");
        assert_eq!(variants, vec!["DLH441".to_string()]);
    }

    #[test]
    fn test_matches_variants_trims_candidate() {
        let variants = callsign_variants("262");
        assert!(matches_variants("UAL262 ", &variants));
        assert!(matches_variants("ua262", &variants));
        assert!(!matches_variants("UAL263", &variants));
    }

    #[test]
    fn test_similar_callsigns_prefix_and_cap() {
        let variants = callsign_variants("UA262");
        let seen = vec![
            "UAL100 ", "UA900", "DLH441", "UAL200", "UAL300", "UAL400", "UAL500", "UAL600",
            "UAL700", "UAL800", "UAL900", "UAL111",
        ];
        let similar = similar_callsigns(seen.into_iter(), &variants, 10);
        assert_eq!(similar.len(), 10);
        assert!(similar.contains(&"UAL100".to_string()));
        assert!(!similar.iter().any(|c| c.starts_with("DLH")));
    }

    #[test]
    fn test_similar_callsigns_dedup() {
        let variants = callsign_variants("262");
        let similar = similar_callsigns(["UAL100", "UAL100 "], &variants, 10);
        assert_eq!(similar, vec!["UAL100".to_string()]);
    }
}
