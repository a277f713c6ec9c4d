use log::warn;
use serde::Serialize;
use std::fmt;

use crate::utils::error::{TstatError, TstatResult};

pub const DEFAULT_PROFILE: &str = "tstat7";
pub const CORE_PROFILE: &str = "tstat7-core";
pub const LEGACY_PROFILE: &str = "tstat7-legacy";

/// One expected holding-register value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RegisterEntry {
    pub address: u16,
    pub value: u16,
}

impl RegisterEntry {
    pub const fn new(address: u16, value: u16) -> Self {
        Self { address, value }
    }
}

impl fmt::Display for RegisterEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.address, self.value)
    }
}

// Current field configuration. 262 appears twice in the deployed table and is kept that way.
const TSTAT7: &[(u16, u16)] = &[
    (103, 1),
    (104, 1),
    (105, 1),
    (106, 3),
    (107, 1),
    (110, 1),
    (117, 5),
    (122, 1),
    (123, 1),
    (124, 0),
    (125, 0),
    (142, 20),
    (143, 20),
    (144, 20),
    (145, 20),
    (146, 20),
    (209, 0),
    (241, 3),
    (242, 30),
    (262, 1),
    (345, 700),
    (346, 5),
    (347, 5),
    (348, 700),
    (349, 68),
    (350, 67),
    (352, 5),
    (353, 5),
    (354, 67),
    (355, 720),
    (364, 70),
    (365, 74),
    (366, 64),
    (373, 1),
    (396, 0),
    (418, 5),
    (419, 0),
    (424, 22),
    (425, 0),
    (426, 6),
    (427, 0),
    (432, 21),
    (433, 0),
    (254, 31),
    (565, 1),
    (730, 0),
    (262, 1),
    (728, 1),
];

const TSTAT7_CORE: &[(u16, u16)] = &[
    (142, 20),
    (143, 20),
    (144, 20),
    (145, 20),
    (157, 0),
    (158, 0),
    (169, 0),
    (170, 0),
    (345, 700),
    (350, 700),
];

const TSTAT7_LEGACY: &[(u16, u16)] = &[
    (142, 20),
    (143, 20),
    (144, 20),
    (145, 20),
    (146, 20),
    (728, 1),
    (122, 1),
    (123, 1),
    (124, 0),
    (104, 1),
    (117, 10),
    (254, 31), // relays to manual switch
    (262, 1),
    (565, 0), // no day/night change
    (730, 0), // no keypad temperature limits
];

/// A named, ordered set of expected register values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegisterProfile {
    pub name: String,
    pub description: String,
    pub entries: Vec<RegisterEntry>,
}

impl RegisterProfile {
    pub fn new(name: impl Into<String>, description: impl Into<String>, entries: Vec<RegisterEntry>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            entries,
        }
    }

    fn from_table(name: &str, description: &str, table: &[(u16, u16)]) -> Self {
        let entries = table
            .iter()
            .map(|&(address, value)| RegisterEntry::new(address, value))
            .collect();
        Self::new(name, description, entries)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Registry of the built-in profiles, in declaration order.
#[derive(Debug, Clone)]
pub struct ProfileRegistry {
    profiles: Vec<RegisterProfile>,
}

impl ProfileRegistry {
    pub fn builtin() -> Self {
        Self {
            profiles: vec![
                RegisterProfile::from_table(DEFAULT_PROFILE, "TSTAT7 current field configuration", TSTAT7),
                RegisterProfile::from_table(CORE_PROFILE, "TSTAT7 reduced core register set", TSTAT7_CORE),
                RegisterProfile::from_table(LEGACY_PROFILE, "TSTAT7 original setup table", TSTAT7_LEGACY),
            ],
        }
    }

    pub fn get(&self, name: &str) -> TstatResult<&RegisterProfile> {
        self.profiles
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| TstatError::UnknownProfile(name.to_string()))
    }

    pub fn names(&self) -> Vec<&str> {
        self.profiles.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegisterProfile> {
        self.profiles.iter()
    }
}

impl Default for ProfileRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// A line of a register file that was not applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedLine {
    pub line: usize,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisterFile {
    pub entries: Vec<RegisterEntry>,
    pub skipped: Vec<SkippedLine>,
}

/// Parses `address,value` lines. `#` comments and blank lines are ignored,
/// anything else that is not exactly two integers is recorded as skipped.
pub fn parse_register_lines(text: &str) -> RegisterFile {
    let mut file = RegisterFile::default();

    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        match parse_entry(line) {
            Some(entry) => file.entries.push(entry),
            None => {
                warn!("Skipping malformed line {}: {}", index + 1, line);
                file.skipped.push(SkippedLine {
                    line: index + 1,
                    content: line.to_string(),
                });
            }
        }
    }

    file
}

fn parse_entry(line: &str) -> Option<RegisterEntry> {
    let fields: Vec<&str> = line.split(',').collect();
    if fields.len() != 2 {
        return None;
    }
    let address = fields[0].trim().parse::<u16>().ok()?;
    let value = fields[1].trim().parse::<u16>().ok()?;
    Some(RegisterEntry::new(address, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_profiles_are_distinct() {
        let registry = ProfileRegistry::builtin();
        assert_eq!(registry.names(), vec!["tstat7", "tstat7-core", "tstat7-legacy"]);

        let current = registry.get(DEFAULT_PROFILE).unwrap();
        let core = registry.get(CORE_PROFILE).unwrap();
        assert_eq!(current.len(), 48);
        assert_eq!(core.len(), 10);
        assert_ne!(current.entries, core.entries);
        assert_eq!(current.entries[0], RegisterEntry::new(103, 1));
        assert_eq!(*current.entries.last().unwrap(), RegisterEntry::new(728, 1));
    }

    #[test]
    fn test_unknown_profile() {
        let registry = ProfileRegistry::builtin();
        match registry.get("tstat9") {
            Err(TstatError::UnknownProfile(name)) => assert_eq!(name, "tstat9"),
            other => panic!("unexpected lookup result: {:?}", other),
        }
    }

    #[test]
    fn test_parse_skips_comments_and_malformed_lines() {
        let parsed = parse_register_lines("# comment\n100,5\nbad,line,here\n200,10\n");
        assert_eq!(
            parsed.entries,
            vec![RegisterEntry::new(100, 5), RegisterEntry::new(200, 10)]
        );
        assert_eq!(parsed.skipped.len(), 1);
        assert_eq!(parsed.skipped[0].line, 3);
        assert_eq!(parsed.skipped[0].content, "bad,line,here");
    }

    #[test]
    fn test_parse_rejects_non_integer_and_out_of_range() {
        let parsed = parse_register_lines("  345 , 700 \r\n\n100,abc\n70000,1\n-1,4\n");
        assert_eq!(parsed.entries, vec![RegisterEntry::new(345, 700)]);
        let lines: Vec<usize> = parsed.skipped.iter().map(|s| s.line).collect();
        assert_eq!(lines, vec![3, 4, 5]);
    }
}
