use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Media server flavour a poster archive is mirrored from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ServerKind {
    Plex,
    Jellyfin,
}

impl ServerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServerKind::Plex => "plex",
            ServerKind::Jellyfin => "jellyfin",
        }
    }

    /// Marker embedded in the filename of every poster managed from this server
    pub fn source_tag(&self) -> &'static str {
        match self {
            ServerKind::Plex => "**Plex**",
            ServerKind::Jellyfin => "**Jellyfin**",
        }
    }
}

impl fmt::Display for ServerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "plex" => Ok(ServerKind::Plex),
            "jellyfin" => Ok(ServerKind::Jellyfin),
            other => Err(format!("Unknown server kind: {}. Use 'plex' or 'jellyfin'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_server_kind() {
        assert_eq!("Plex".parse::<ServerKind>(), Ok(ServerKind::Plex));
        assert_eq!(" jellyfin ".parse::<ServerKind>(), Ok(ServerKind::Jellyfin));
        assert!("kodi".parse::<ServerKind>().is_err());
    }
}
