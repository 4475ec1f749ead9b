use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Metadata sources a show can be tracked against.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "lowercase")]
pub enum InfoSource {
    Tvdb,
    Tvmaze,
    Tmdb,
    Trakt,
    Imdb,
}

impl InfoSource {
    pub const ALL: [InfoSource; 5] = [
        InfoSource::Tvdb,
        InfoSource::Tvmaze,
        InfoSource::Tmdb,
        InfoSource::Trakt,
        InfoSource::Imdb,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InfoSource::Tvdb => "tvdb",
            InfoSource::Tvmaze => "tvmaze",
            InfoSource::Tmdb => "tmdb",
            InfoSource::Trakt => "trakt",
            InfoSource::Imdb => "imdb",
        }
    }
}

impl fmt::Display for InfoSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InfoSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        InfoSource::ALL
            .into_iter()
            .find(|source| source.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown info source '{s}'"))
    }
}

/// Strongly typed show identity: the source a show is tracked against plus
/// that source's production id. Rendered as `source:prodid`.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
pub struct ShowId {
    pub source: InfoSource,
    pub prodid: u64,
}

impl ShowId {
    pub const GLUE: char = ':';

    pub fn new(source: InfoSource, prodid: u64) -> Self {
        Self { source, prodid }
    }
}

impl fmt::Display for ShowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.source, Self::GLUE, self.prodid)
    }
}

impl FromStr for ShowId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (source, prodid) = s
            .split_once(Self::GLUE)
            .ok_or_else(|| format!("show id '{s}' is missing '{}'", Self::GLUE))?;
        let prodid = prodid
            .parse::<u64>()
            .map_err(|err| format!("invalid production id in '{s}': {err}"))?;
        Ok(Self::new(source.parse()?, prodid))
    }
}
