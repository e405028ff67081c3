use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    /// Parse `"owner/name"` into a `RepoRef`.
    pub fn from_full_name(s: &str) -> Option<Self> {
        let (owner, name) = s.split_once('/')?;
        if owner.is_empty() || name.is_empty() {
            return None;
        }
        Some(Self {
            owner: owner.to_owned(),
            name: name.to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_name_round_trip() {
        let r = RepoRef::from_full_name("acme/app").unwrap();
        assert_eq!(r.owner, "acme");
        assert_eq!(r.full_name(), "acme/app");
    }

    #[test]
    fn rejects_missing_half() {
        assert!(RepoRef::from_full_name("acme").is_none());
        assert!(RepoRef::from_full_name("/app").is_none());
    }
}
