//! CI backends the generator can emit for

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    Github,
    Gitlab,
    Bash,
    #[serde(rename = "codecatalyst")]
    CodeCatalyst,
}

impl Target {
    pub const ALL: [Target; 4] = [
        Target::Github,
        Target::Gitlab,
        Target::Bash,
        Target::CodeCatalyst,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Target::Github => "github",
            Target::Gitlab => "gitlab",
            Target::Bash => "bash",
            Target::CodeCatalyst => "codecatalyst",
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
