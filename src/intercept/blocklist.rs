use thiserror::Error;

/// Hard cap on blocklist entries; the feature targets a handful of known
/// binaries, not arbitrary policy.
pub const MAX_BLOCKED_PATHS: usize = 10;

/// Longest path the host itself accepts.
pub const MAX_PATH_LEN: usize = 4096;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BlocklistError {
    #[error("Path exceeds {MAX_PATH_LEN} bytes")]
    TooLong,

    #[error("Path is already on the blocklist")]
    AlreadyExists,

    #[error("Blocklist is full ({MAX_BLOCKED_PATHS} entries)")]
    OutOfCapacity,
}

type Result<T> = std::result::Result<T, BlocklistError>;

/// Insertion-ordered, duplicate-free set of executable paths to suppress.
#[derive(Debug, Default)]
pub struct BlockedPathSet {
    paths: Vec<String>,
}

impl BlockedPathSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, path: &str) -> Result<()> {
        if path.len() > MAX_PATH_LEN {
            return Err(BlocklistError::TooLong);
        }
        if self.paths.iter().any(|p| p == path) {
            return Err(BlocklistError::AlreadyExists);
        }
        if self.paths.len() >= MAX_BLOCKED_PATHS {
            return Err(BlocklistError::OutOfCapacity);
        }

        log::info!("Blocking execution of '{}'", path);
        self.paths.push(path.to_owned());
        Ok(())
    }

    /// Exact-match check against the copied caller path.
    pub fn contains(&self, path: &[u8]) -> bool {
        self.paths.iter().any(|p| p.as_bytes() == path)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.paths.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_insertion_order() {
        let mut set = BlockedPathSet::new();
        set.add("/usr/bin/one").unwrap();
        set.add("/usr/bin/two").unwrap();

        let order: Vec<&str> = set.iter().collect();
        assert_eq!(order, ["/usr/bin/one", "/usr/bin/two"]);
        assert!(set.contains(b"/usr/bin/two"));
        assert!(!set.contains(b"/usr/bin/three"));
    }

    #[test]
    fn rejects_duplicates() {
        let mut set = BlockedPathSet::new();
        set.add("/usr/bin/one").unwrap();
        assert_eq!(set.add("/usr/bin/one"), Err(BlocklistError::AlreadyExists));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn rejects_overlong_paths() {
        let mut set = BlockedPathSet::new();
        let long = "x".repeat(MAX_PATH_LEN + 1);
        assert_eq!(set.add(&long), Err(BlocklistError::TooLong));
        assert!(set.is_empty());

        let fits = "y".repeat(MAX_PATH_LEN);
        assert!(set.add(&fits).is_ok());
    }

    #[test]
    fn enforces_capacity() {
        let mut set = BlockedPathSet::new();
        for i in 0..MAX_BLOCKED_PATHS {
            set.add(&format!("/usr/bin/tool{i}")).unwrap();
        }
        assert_eq!(
            set.add("/usr/bin/one_too_many"),
            Err(BlocklistError::OutOfCapacity)
        );
        assert_eq!(set.len(), MAX_BLOCKED_PATHS);
    }
}
