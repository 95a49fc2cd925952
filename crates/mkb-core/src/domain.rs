use std::fmt;

/// Platform user id (opaque numeric string).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(pub String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Normalized chat room name: lowercase, without the leading `#`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelName(String);

impl ChannelName {
    pub fn new(raw: &str) -> Self {
        Self(raw.trim().trim_start_matches('#').to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A resolved platform account: stable id plus canonical login name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserIdentity {
    pub id: UserId,
    pub name: String,
}

/// Identifier of a currently running broadcast.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BroadcastId(pub String);

/// Name and version of one component, reported by `!info`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ComponentVersion {
    pub name: &'static str,
    pub version: &'static str,
}

impl fmt::Display for ComponentVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.version)
    }
}
