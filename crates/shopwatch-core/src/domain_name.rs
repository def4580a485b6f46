//! Core-domain normalization.
//!
//! Groups regional variants of the same shop (`example.com`, `example.de`,
//! `shop.example.co.uk`) under one root label without pulling in a full
//! public-suffix database.

/// Second-level labels that act as public suffixes (`example.co.uk`,
/// `shop.com.br`). Not exhaustive; covers the markets we track.
const SECOND_LEVEL_SUFFIXES: &[&str] = &["co", "com", "net", "org", "gov", "ac", "edu"];

/// Extract the core domain name: the registrable root label of a domain.
///
/// `example.com` → `example`, `www.example.de` → `example`,
/// `shop.example.co.uk` → `example`. Single-label inputs pass through.
pub fn core_domain_name(domain: &str) -> String {
    let normalized = domain.trim().trim_end_matches('.').to_ascii_lowercase();
    let labels: Vec<&str> = normalized.split('.').filter(|l| !l.is_empty()).collect();

    match labels.len() {
        0 => String::new(),
        1 => labels[0].to_string(),
        2 => labels[0].to_string(),
        n => {
            if SECOND_LEVEL_SUFFIXES.contains(&labels[n - 2]) {
                labels[n - 3].to_string()
            } else {
                labels[n - 2].to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_tld() {
        assert_eq!(core_domain_name("example.com"), "example");
        assert_eq!(core_domain_name("example.de"), "example");
    }

    #[test]
    fn subdomains_are_stripped() {
        assert_eq!(core_domain_name("www.example.de"), "example");
        assert_eq!(core_domain_name("shop.antiques.example.com"), "example");
    }

    #[test]
    fn second_level_suffixes() {
        assert_eq!(core_domain_name("example.co.uk"), "example");
        assert_eq!(core_domain_name("shop.example.co.uk"), "example");
        assert_eq!(core_domain_name("example.com.br"), "example");
    }

    #[test]
    fn normalization() {
        assert_eq!(core_domain_name("Example.COM."), "example");
        assert_eq!(core_domain_name("  example.de "), "example");
    }

    #[test]
    fn degenerate_inputs() {
        assert_eq!(core_domain_name("localhost"), "localhost");
        assert_eq!(core_domain_name(""), "");
        assert_eq!(core_domain_name("..."), "");
    }
}
