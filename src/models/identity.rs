/// Stable key of a supervised process.
///
/// `key` is the logical role name ("search", "web", ...). `slot` addresses the
/// process's region in the signal channel, so two identities registered with
/// the same supervisor must never share a slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcessIdentity {
    key: String,
    slot: u32,
}

impl ProcessIdentity {
    pub fn new(key: impl Into<String>, slot: u32) -> Self {
        Self {
            key: key.into(),
            slot,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn slot(&self) -> u32 {
        self.slot
    }
}

impl std::fmt::Display for ProcessIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.key, self.slot)
    }
}
