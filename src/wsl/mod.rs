//! WSL readiness probing and bootstrap orchestration
//!
//! `readiness` turns a pile of remote probes into one structured report;
//! `bootstrap` drives the install / reboot / re-probe cycle until the guest
//! is ready or the reboot budget runs out.

pub mod bootstrap;
pub mod readiness;

pub use bootstrap::{BootstrapConfig, InstallOutcome, RebootBudget, WslBootstrap};
pub use readiness::{BootstrapState, WslReadinessProbe, WslReadinessReport};

/// Strip the UTF-16 artifacts wsl.exe output picks up on the way through
/// the remoting layer: interleaved NUL bytes, CRLF line endings, trailing
/// whitespace.
pub fn clean_wsl_output(raw: &str) -> String {
    raw.replace('\u{0}', "")
        .replace("\r\n", "\n")
        .trim_end()
        .to_string()
}

/// Resolve a requested distribution name against the installed list.
///
/// Matching is case-insensitive: exact match first, then unique-prefix
/// ("Ubuntu" finds "Ubuntu-22.04"). A prefix matching more than one
/// installed entry is ambiguous and resolves to nothing, so the caller is
/// told the name is unresolvable rather than silently handed whichever
/// entry wsl.exe listed first. Returns the installed name as wsl.exe
/// reports it, since that exact string must be passed back to
/// `wsl.exe --distribution`.
pub fn resolve_distro(requested: &str, installed: &[String]) -> Option<String> {
    let wanted = requested.trim().to_lowercase();
    if wanted.is_empty() {
        return None;
    }

    for name in installed {
        if name.trim().to_lowercase() == wanted {
            return Some(name.trim().to_string());
        }
    }

    let mut matches = installed
        .iter()
        .map(|name| name.trim())
        .filter(|name| name.to_lowercase().starts_with(&wanted));
    match (matches.next(), matches.next()) {
        (Some(only), None) => Some(only.to_string()),
        _ => None,
    }
}
