/// Decodes the `%2F`/`%2E` escaping bus node names use so a literal `/` or
/// `.` can appear inside a single path segment without being mistaken for a
/// path separator.
pub fn decode_path(raw: &str) -> String {
    raw.replace("%2F", "/").replace("%2E", ".")
}

pub fn encode_path(path: &str) -> String {
    path.replace('.', "%2E").replace('/', "%2F")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_escaped_separators() {
        let raw = "devices%2Fnode-1/temperature%2Ecelsius";
        let decoded = decode_path(raw);
        assert_eq!(decoded, "devices/node-1/temperature.celsius");
        assert_eq!(encode_path(&decoded), raw);
    }

    #[test]
    fn plain_paths_are_unchanged() {
        assert_eq!(decode_path("a/b/c"), "a/b/c");
        assert_eq!(encode_path("a/b/c"), "a/b/c");
    }
}
