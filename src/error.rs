pub type Error = Box<dyn std::error::Error + Send + Sync>;

/// A path was missing, absent, or otherwise not found where one was expected
/// (e.g. `getHistory` against a Watch that was never registered).
#[derive(Debug)]
pub struct NotFound(pub String);

impl std::fmt::Display for NotFound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "not found: {}", self.0)
    }
}

impl std::error::Error for NotFound {}

/// A path argument failed validation before it ever reached a Watch or the
/// bus (empty, or otherwise malformed).
#[derive(Debug)]
pub struct InvalidPath(pub String);

impl std::fmt::Display for InvalidPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid path: {:?}", self.0)
    }
}

impl std::error::Error for InvalidPath {}
