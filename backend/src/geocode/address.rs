//! Address normalization for geocoding queries and cache keys.

/// Prefecture suffixes that may be dropped when an address repeats the
/// prefecture in short form (e.g. `石川` for `石川県`).
const PREFECTURE_SUFFIXES: [char; 4] = ['県', '都', '道', '府'];

/// Strip a redundant prefecture prefix from `addr` and trim the result.
///
/// The full prefecture name is tried first, then the name without its
/// administrative suffix.
pub fn normalize_address(addr: &str, pref: &str) -> String {
    let addr = addr.trim();
    let pref = pref.trim();
    if pref.is_empty() {
        return addr.to_string();
    }

    if let Some(rest) = addr.strip_prefix(pref) {
        return rest.trim().to_string();
    }

    if let Some(short) = pref.strip_suffix(PREFECTURE_SUFFIXES) {
        if !short.is_empty() {
            if let Some(rest) = addr.strip_prefix(short) {
                return rest.trim().to_string();
            }
        }
    }

    addr.to_string()
}
