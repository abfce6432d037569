use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What to do when the target poster file already exists
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OverwriteOption {
    #[default]
    Overwrite,
    Copy,
    Skip,
}

impl OverwriteOption {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverwriteOption::Overwrite => "overwrite",
            OverwriteOption::Copy => "copy",
            OverwriteOption::Skip => "skip",
        }
    }
}

impl fmt::Display for OverwriteOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OverwriteOption {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "overwrite" => Ok(OverwriteOption::Overwrite),
            "copy" => Ok(OverwriteOption::Copy),
            "skip" => Ok(OverwriteOption::Skip),
            other => Err(format!(
                "Invalid overwrite option: {}. Use 'overwrite', 'copy' or 'skip'",
                other
            )),
        }
    }
}
