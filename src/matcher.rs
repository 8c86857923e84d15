//! Pattern compilation
//!
//! Turns a [`PolicyConfig`] into a [`MatcherSet`] once, at filter
//! construction. Every regex the request path needs is compiled here; a bad
//! rule aborts construction instead of producing a half-working filter.

use regex::Regex;
use tracing::debug;

use crate::error::{GateError, Result};
use crate::policy::{BrowserRule, PolicyConfig};
use crate::version::{extract_version, version_extractor, version_greater_than};

/// Marker that turns a version threshold into a strictly-newer check
const NEWER_THAN_MARKER: char = '>';

/// A compiled browser rule
#[derive(Debug, Clone)]
pub enum BrowserMatcher {
    /// Unanchored regex search over the raw User-Agent
    Pattern(Regex),
    /// `<name>/<version>` present with a version strictly above `threshold`
    NewerThan {
        name: String,
        extractor: Regex,
        threshold: String,
    },
}

impl BrowserMatcher {
    /// Compile a single rule
    ///
    /// An explicit pattern takes precedence over a version threshold.
    pub fn compile(rule: &BrowserRule) -> Result<Self> {
        let invalid = |source: regex::Error| GateError::InvalidBrowserPattern {
            name: rule.name.clone(),
            source,
        };

        if let Some(pattern) = rule.pattern() {
            if rule.version_threshold().is_some() {
                debug!(
                    browser = %rule.name,
                    "Both pattern and version threshold set, using pattern"
                );
            }
            return Regex::new(pattern).map(BrowserMatcher::Pattern).map_err(invalid);
        }

        let Some(threshold) = rule.version_threshold() else {
            return Err(GateError::InertRule {
                name: rule.name.clone(),
            });
        };

        let threshold = threshold.trim();
        match threshold.strip_prefix(NEWER_THAN_MARKER) {
            Some(threshold) => {
                let threshold = threshold.trim();
                if threshold.is_empty()
                    || threshold.split('.').any(|part| part.parse::<u64>().is_err())
                {
                    return Err(GateError::InvalidThreshold {
                        name: rule.name.clone(),
                        threshold: threshold.to_string(),
                    });
                }
                Ok(BrowserMatcher::NewerThan {
                    name: rule.name.clone(),
                    extractor: version_extractor(&rule.name).map_err(invalid)?,
                    threshold: threshold.to_string(),
                })
            }
            None => Regex::new(&exact_version_pattern(&rule.name, threshold))
                .map(BrowserMatcher::Pattern)
                .map_err(invalid),
        }
    }

    pub fn is_match(&self, user_agent: &str) -> bool {
        match self {
            BrowserMatcher::Pattern(re) => re.is_match(user_agent),
            BrowserMatcher::NewerThan {
                name,
                extractor,
                threshold,
            } => {
                let Some(detected) = extract_version(extractor, user_agent) else {
                    return false;
                };
                let newer = version_greater_than(detected, threshold);
                debug!(browser = %name, detected, threshold = %threshold, newer, "Version check");
                newer
            }
        }
    }
}

/// `<name>/<version>` followed by any number of finer `.N` components
///
/// Unanchored prefix match: `Chrome/121` also accepts `Chrome/1210`.
fn exact_version_pattern(browser: &str, version: &str) -> String {
    format!(
        r"{}/{}(\.\d+)*",
        regex::escape(browser),
        regex::escape(version)
    )
}

/// Compiled, immutable matcher set shared by all requests
#[derive(Debug, Clone)]
pub struct MatcherSet {
    browsers: Vec<BrowserMatcher>,
    os: Vec<Regex>,
}

impl MatcherSet {
    pub fn compile(policy: &PolicyConfig) -> Result<Self> {
        if policy.allowed_browsers.is_empty() {
            return Err(GateError::NoBrowsers);
        }

        let browsers = policy
            .allowed_browsers
            .iter()
            .map(BrowserMatcher::compile)
            .collect::<Result<Vec<_>>>()?;

        let os = policy
            .allowed_os_types
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|source| GateError::InvalidOsPattern {
                    pattern: pattern.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(
            browsers = browsers.len(),
            os_patterns = os.len(),
            "Compiled User-Agent matcher set"
        );

        Ok(Self { browsers, os })
    }

    /// First browser matcher that accepts the User-Agent wins
    pub fn matches_browser(&self, user_agent: &str) -> bool {
        self.browsers.iter().any(|m| m.is_match(user_agent))
    }

    /// An empty OS list means the OS is not filtered
    pub fn matches_os(&self, user_agent: &str) -> bool {
        self.os.is_empty() || self.os.iter().any(|re| re.is_match(user_agent))
    }

    pub fn browsers(&self) -> &[BrowserMatcher] {
        &self.browsers
    }

    pub fn os_patterns(&self) -> &[Regex] {
        &self.os
    }
}
