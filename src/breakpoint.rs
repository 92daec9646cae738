/// Addresses at which execution pauses before the instruction there is fetched.
///
/// Kept in insertion order, without duplicates.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Breakpoints(Vec<u16>);

impl Breakpoints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, address: u16) -> bool {
        self.0.contains(&address)
    }

    /// Returns `false` if a breakpoint already existed at `address`.
    pub fn insert(&mut self, address: u16) -> bool {
        if self.contains(address) {
            return false;
        }
        self.0.push(address);
        true
    }

    /// Returns whether a breakpoint was found with given address.
    pub fn remove(&mut self, address: u16) -> bool {
        let initial_len = self.0.len();
        self.0.retain(|&breakpoint| breakpoint != address);
        initial_len != self.0.len()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = u16> + '_ {
        self.0.iter().copied()
    }
}

impl From<Vec<u16>> for Breakpoints {
    fn from(vec: Vec<u16>) -> Self {
        let mut breakpoints = Breakpoints::new();
        for address in vec {
            breakpoints.insert(address);
        }
        breakpoints
    }
}

impl<'a> IntoIterator for &'a Breakpoints {
    type Item = &'a u16;
    type IntoIter = std::slice::Iter<'a, u16>;
    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Watched memory addresses.
///
/// Recorded for callers but never consulted while executing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Watchpoints(Vec<u16>);

impl Watchpoints {
    pub fn insert(&mut self, address: u16) {
        self.0.push(address);
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
