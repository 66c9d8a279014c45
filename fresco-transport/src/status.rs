use std::fmt;

/// Connection state of a transport session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ConnectionStatus {
    #[default]
    Unknown,
    Connecting,
    Connected,
    Disconnected,
}

impl ConnectionStatus {
    /// Integer code exported to control surfaces
    pub fn code(self) -> u16 {
        match self {
            Self::Unknown => 0,
            Self::Connecting => 1,
            Self::Connected => 2,
            Self::Disconnected => 3,
        }
    }

    /// Inverse of [`code`](Self::code)
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            0 => Some(Self::Unknown),
            1 => Some(Self::Connecting),
            2 => Some(Self::Connected),
            3 => Some(Self::Disconnected),
            _ => None,
        }
    }

    pub fn is_connected(self) -> bool {
        self == Self::Connected
    }

    /// Connected or on the way there
    pub fn is_active(self) -> bool {
        matches!(self, Self::Connecting | Self::Connected)
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unknown => "unknown",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        for status in [
            ConnectionStatus::Unknown,
            ConnectionStatus::Connecting,
            ConnectionStatus::Connected,
            ConnectionStatus::Disconnected,
        ] {
            assert_eq!(ConnectionStatus::from_code(status.code()), Some(status));
        }
        assert_eq!(ConnectionStatus::Connected.code(), 2);
        assert_eq!(ConnectionStatus::from_code(9), None);
    }

    #[test]
    fn test_default_is_unknown() {
        assert_eq!(ConnectionStatus::default(), ConnectionStatus::Unknown);
        assert!(!ConnectionStatus::default().is_active());
        assert!(ConnectionStatus::Connecting.is_active());
    }
}
