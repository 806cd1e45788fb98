//! Passcode lookup.

use std::fmt::Debug;

/// Identifies which stored passcode a code matched.
pub type MatchId = usize;

/// Looks up unlock codes in a passcode store.
pub trait PasscodeValidator: Debug + Send {
    /// Returns the id of the stored passcode equal to `code`, or `None` if there is none.
    fn lookup(&self, code: &str) -> Option<MatchId>;
}

/// A [PasscodeValidator] over a fixed list of passcodes, where the match id is the index in
/// the list.
#[derive(Clone, Debug, Default)]
pub struct ConfigPasscodes {
    passcodes: Vec<String>,
}

impl ConfigPasscodes {
    pub fn new(passcodes: Vec<String>) -> Self {
        Self { passcodes }
    }
}

impl PasscodeValidator for ConfigPasscodes {
    fn lookup(&self, code: &str) -> Option<MatchId> {
        self.passcodes.iter().position(|passcode| passcode == code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_id_is_the_index() {
        let passcodes = ConfigPasscodes::new(vec!["1234".to_string(), "0000".to_string()]);
        assert_eq!(passcodes.lookup("1234"), Some(0));
        assert_eq!(passcodes.lookup("0000"), Some(1));
        assert_eq!(passcodes.lookup("4321"), None);
        assert_eq!(passcodes.lookup(""), None);
    }
}
