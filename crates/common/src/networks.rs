//! Well-known networks and their handshake magic.

/// A named network the client knows how to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Network {
    pub name: &'static str,
    pub network_magic: u32,
}

pub const MAINNET: Network = Network { name: "mainnet", network_magic: 764824073 };
pub const PREPROD: Network = Network { name: "preprod", network_magic: 1 };
pub const PREVIEW: Network = Network { name: "preview", network_magic: 2 };
pub const SANCHONET: Network = Network { name: "sanchonet", network_magic: 4 };

/// Network used when neither a name nor a magic is configured.
pub const DEFAULT_NETWORK: &str = "preview";

const NETWORKS: [Network; 4] = [MAINNET, PREPROD, PREVIEW, SANCHONET];

pub fn network_by_name(name: &str) -> Option<Network> {
    NETWORKS.iter().copied().find(|n| n.name == name)
}

pub fn network_by_magic(magic: u32) -> Option<Network> {
    NETWORKS.iter().copied().find(|n| n.network_magic == magic)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        assert_eq!(network_by_name("mainnet").unwrap().network_magic, 764824073);
        assert_eq!(network_by_name("preview"), Some(PREVIEW));
        assert_eq!(network_by_magic(1), Some(PREPROD));
        assert!(network_by_name("Mainnet").is_none());
        assert!(network_by_magic(999).is_none());
    }
}
