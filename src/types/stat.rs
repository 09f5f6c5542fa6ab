use std::fmt;

/// The maildrop listing returned by `STAT`.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub struct Stat {
    /// Number of messages in the maildrop.
    pub count: u32,
    /// Size of the maildrop in octets.
    pub size: u64,
}

impl fmt::Display for Stat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} messages ({} octets)", self.count, self.size)
    }
}
