use thiserror::Error;

/// Top-level category of a catalog step. Raw snapshots, processed "garden" data,
/// grapher-ready datasets and so on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Snapshot,
    Garden,
    Meadow,
    Grapher,
    OpenNumbers,
    Examples,
    Explorers,
    External,
    Multidim,
}

impl Channel {
    /// All the channels known to the catalog.
    pub const ALL: [Channel; 9] = [
        Channel::Snapshot,
        Channel::Garden,
        Channel::Meadow,
        Channel::Grapher,
        Channel::OpenNumbers,
        Channel::Examples,
        Channel::Explorers,
        Channel::External,
        Channel::Multidim,
    ];

    pub fn as_str(&self) -> &'static str {
        use Channel::*;
        match self {
            Snapshot => "snapshot",
            Garden => "garden",
            Meadow => "meadow",
            Grapher => "grapher",
            OpenNumbers => "open_numbers",
            Examples => "examples",
            Explorers => "explorers",
            External => "external",
            Multidim => "multidim",
        }
    }

    /// Names of all channels, sorted alphabetically. Used to tell the user
    /// what was expected when the channel is not recognized.
    pub fn expected() -> String {
        let mut names = Self::ALL.map(|channel| channel.as_str());
        names.sort_unstable();
        names.join(", ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid channel `{0}`, expected one of: {}", Channel::expected())]
pub struct InvalidChannel(pub String);

impl std::str::FromStr for Channel {
    type Err = InvalidChannel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|channel| channel.as_str() == s)
            .ok_or_else(|| InvalidChannel(s.to_owned()))
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<str> for Channel {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl PartialEq<str> for Channel {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for Channel {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}
