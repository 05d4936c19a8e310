//! Crawler detection.
//!
//! A fixed list of user-agent signatures lets search engines and link
//! previewers index public pages. Misses are acceptable; a missed crawler
//! is simply treated like any other client.

use crate::gate::policy::matches_route;

/// Lowercase user-agent fragments of known crawlers.
pub const BOT_SIGNATURES: &[&str] = &[
    "googlebot",
    "bingbot",
    "slurp",
    "duckduckbot",
    "baiduspider",
    "yandexbot",
    "facebookexternalhit",
    "twitterbot",
    "rogerbot",
    "linkedinbot",
    "embedly",
    "quora link preview",
    "showyoubot",
    "outbrain",
    "pinterest",
    "developers.google.com",
];

/// Returns true if the user agent matches a known crawler signature.
/// A missing or empty user agent is never a bot.
pub fn is_bot(user_agent: Option<&str>) -> bool {
    let Some(ua) = user_agent.filter(|ua| !ua.is_empty()) else {
        return false;
    };
    let ua = ua.to_ascii_lowercase();
    BOT_SIGNATURES.iter().any(|sig| ua.contains(sig))
}

/// True only for crawlers requesting one of `allowed_paths`.
///
/// This skips the session checks; it never skips the rate limiter.
pub fn should_bypass_auth(path: &str, user_agent: Option<&str>, allowed_paths: &[String]) -> bool {
    is_bot(user_agent) && allowed_paths.iter().any(|allowed| matches_route(path, allowed))
}
