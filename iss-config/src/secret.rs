use secrecy::{ExposeSecret, SecretString};

/// Placeholder written in place of redacted URL credentials.
const REDACTED: &str = "***";

/// Returns a loggable rendering of a connection URL with its credentials masked.
///
/// Only the `user:password@` part of the authority is replaced. Scheme, hosts, path and
/// query string are kept so that operators can still tell which store is being used.
pub fn redact_url(url: &SecretString) -> String {
    let url = url.expose_secret();

    let Some((scheme, rest)) = url.split_once("://") else {
        return REDACTED.to_owned();
    };

    // Credentials can only appear in the authority, before any path or query.
    let authority_end = rest.find(['/', '?']).unwrap_or(rest.len());
    let (authority, tail) = rest.split_at(authority_end);

    match authority.rsplit_once('@') {
        Some((_, hosts)) => format!("{scheme}://{REDACTED}@{hosts}{tail}"),
        None => format!("{scheme}://{rest}"),
    }
}
