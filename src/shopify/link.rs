//! `Link` response header parsing (RFC 8288 subset).
//!
//! The Admin API paginates with `rel="next"` cursors and the CDN names the
//! stored file with `rel="canonical"`.
use regex::Regex;

/// Return the target of the first link whose `rel` contains `rel`.
pub fn link_target(header: &str, rel: &str) -> Option<String> {
    let link = Regex::new(r"<([^>]*)>([^<]*)").expect("regex for link values");
    let rel_param = Regex::new(r#"(?i)(?:^|;)\s*rel\s*=\s*(?:"([^"]*)"|([^\s;,]+))"#)
        .expect("regex for rel parameter");

    for cap in link.captures_iter(header) {
        let target = cap.get(1).map(|m| m.as_str()).unwrap_or_default();
        let params = cap.get(2).map(|m| m.as_str()).unwrap_or_default();
        let Some(rels) = rel_param
            .captures(params)
            .and_then(|rel_cap| rel_cap.get(1).or_else(|| rel_cap.get(2)))
        else {
            continue;
        };
        if rels
            .as_str()
            .split_whitespace()
            .any(|value| value.eq_ignore_ascii_case(rel))
        {
            return Some(target.trim().to_string());
        }
    }
    None
}
