use core::fmt;
use serde::{Deserialize, Serialize};

/// One of the three disjoint card partitions. Every card carries exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Category {
    Suspect = 0,
    Weapon = 1,
    Location = 2,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Suspect, Category::Weapon, Category::Location];

    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Category::Suspect),
            1 => Some(Category::Weapon),
            2 => Some(Category::Location),
            _ => None,
        }
    }

    pub const fn index(self) -> usize {
        self as usize
    }

    /// Plural label used by summaries ("3 suspects").
    pub const fn plural(self) -> &'static str {
        match self {
            Category::Suspect => "suspects",
            Category::Weapon => "weapons",
            Category::Location => "locations",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Category::Suspect => "suspect",
            Category::Weapon => "weapon",
            Category::Location => "location",
        };
        f.write_str(label)
    }
}
