//! Dotted version extraction and comparison
//!
//! Versions come straight out of client-supplied User-Agent strings, so every
//! comparison fails closed: anything that does not parse as a dotted list of
//! unsigned integers is never "newer".

use regex::Regex;

/// Build the regex that captures the version following `<name>/`
pub fn version_extractor(browser: &str) -> std::result::Result<Regex, regex::Error> {
    Regex::new(&format!(r"{}/([\d.]+)", regex::escape(browser)))
}

/// Pull the first `<name>/<digits-and-dots>` version out of a User-Agent
pub fn extract_version<'a>(extractor: &Regex, user_agent: &'a str) -> Option<&'a str> {
    extractor
        .captures(user_agent)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Component-wise numeric `detected > threshold`
///
/// The shorter side is right-padded with zeros, so `"122"` equals `"122.0.0"`.
/// A single non-numeric component on either side makes the result `false`.
pub fn version_greater_than(detected: &str, threshold: &str) -> bool {
    let (Some(mut left), Some(mut right)) =
        (parse_components(detected), parse_components(threshold))
    else {
        return false;
    };

    let len = left.len().max(right.len());
    left.resize(len, 0);
    right.resize(len, 0);

    left > right
}

fn parse_components(version: &str) -> Option<Vec<u64>> {
    version
        .split('.')
        .map(|part| part.parse::<u64>().ok())
        .collect()
}
