//! Shared User-Agent string for catalog and mirror HTTP requests.

/// Project URL for User-Agent identification.
const PROJECT_UA_URL: &str = "https://github.com/notjawad/libgencli";

/// Default User-Agent for every request made through [`crate::HttpClient`].
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("libgen-cli/{version} (+{PROJECT_UA_URL})")
}
