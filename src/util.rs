//! Path helpers for user-supplied configuration values.

use camino::Utf8PathBuf;

/// Expands a leading `~/` prefix to the user's home directory.
///
/// When `HOME` is unset the input is returned unchanged, so a key path such
/// as `~/.ssh/id_ed25519` will then fail to load with the literal path in
/// the error message.
///
/// # Examples
///
/// ```
/// # use crrunner::util::expand_tilde;
/// let home = std::env::var("HOME").expect("HOME should be set");
/// assert_eq!(expand_tilde("~/.ssh/id_ed25519"), format!("{home}/.ssh/id_ed25519"));
/// assert_eq!(expand_tilde("/etc/ssh/known_hosts"), "/etc/ssh/known_hosts");
/// ```
#[must_use]
pub fn expand_tilde(path: &str) -> Utf8PathBuf {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = std::env::var_os("HOME")
    {
        return Utf8PathBuf::from(format!("{}/{rest}", home.to_string_lossy()));
    }
    Utf8PathBuf::from(path)
}
