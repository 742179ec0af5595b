//! Chain identifiers and the per-chain lane registry.
//!
//! Chains are identified by CAIP-2 style `namespace:reference` pairs
//! (e.g., `eip155:8453` for Base, `solana:5eykt4UsFv8P8NJdTREpY1vzqKqZKvdp`
//! for Solana mainnet). The namespace determines the chain family and with
//! it the transaction-reference format and the adapter implementation.

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// CAIP-2 namespace for EVM-compatible chains.
pub const EIP155_NAMESPACE: &str = "eip155";

/// CAIP-2 namespace for Solana chains.
pub const SOLANA_NAMESPACE: &str = "solana";

/// A CAIP-2 compliant blockchain identifier.
///
/// The format is `namespace:reference` where `namespace` identifies the
/// blockchain family and `reference` the specific chain within it.
///
/// # Serialization
///
/// Serializes to/from a colon-separated string: `"eip155:8453"`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChainId {
    namespace: String,
    reference: String,
}

impl ChainId {
    /// Creates a new chain ID from namespace and reference components.
    pub fn new<N: Into<String>, R: Into<String>>(namespace: N, reference: R) -> Self {
        Self {
            namespace: namespace.into(),
            reference: reference.into(),
        }
    }

    /// Returns the namespace component of the chain ID.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Returns the reference component of the chain ID.
    #[must_use]
    pub fn reference(&self) -> &str {
        &self.reference
    }

    /// Returns the chain family implied by the namespace, if known.
    #[must_use]
    pub fn family(&self) -> Option<ChainFamily> {
        match self.namespace.as_str() {
            EIP155_NAMESPACE => Some(ChainFamily::Evm),
            SOLANA_NAMESPACE => Some(ChainFamily::Solana),
            _ => None,
        }
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.reference)
    }
}

impl From<ChainId> for String {
    fn from(value: ChainId) -> Self {
        value.to_string()
    }
}

/// Error returned when parsing an invalid chain ID string.
///
/// A valid chain ID must be in the format `namespace:reference` where both
/// components are non-empty.
#[derive(Debug, thiserror::Error)]
#[error("invalid chain id format {0}")]
pub struct ChainIdFormatError(String);

impl FromStr for ChainId {
    type Err = ChainIdFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((namespace, reference)) if !namespace.is_empty() && !reference.is_empty() => {
                Ok(Self::new(namespace, reference))
            }
            _ => Err(ChainIdFormatError(s.into())),
        }
    }
}

impl Serialize for ChainId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ChainId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(de::Error::custom)
    }
}

/// The closed set of chain families this system can verify against.
///
/// The family decides how transaction references are validated and which
/// adapter implementation serves the chain. It is derived once from the
/// chain ID namespace at configuration load, never re-branched on at
/// verification time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainFamily {
    /// EVM-compatible chains (event-log based transfers).
    Evm,
    /// Solana chains (instruction based transfers).
    Solana,
}

impl fmt::Display for ChainFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Evm => write!(f, "evm"),
            Self::Solana => write!(f, "solana"),
        }
    }
}

/// Registry of per-chain lanes indexed by chain ID.
///
/// Built once from configuration; lookup is read-only afterwards.
///
/// # Type Parameters
///
/// - `L` - The lane type held per chain (adapter, policy, breaker, ...).
#[derive(Debug)]
pub struct ChainRegistry<L>(HashMap<ChainId, L>);

impl<L> ChainRegistry<L> {
    /// Creates a new registry from the given lane map.
    #[must_use]
    pub const fn new(lanes: HashMap<ChainId, L>) -> Self {
        Self(lanes)
    }

    /// Looks up a lane by exact chain ID.
    ///
    /// Returns `None` if no lane is configured for the given chain.
    #[must_use]
    pub fn by_chain_id(&self, chain_id: &ChainId) -> Option<&L> {
        self.0.get(chain_id)
    }

    /// Iterates over all configured (chain ID, lane) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&ChainId, &L)> {
        self.0.iter()
    }

    /// Returns the number of configured lanes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if no lanes are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_id_serialize_eip155() {
        let chain_id = ChainId::new("eip155", "8453");
        let serialized = serde_json::to_string(&chain_id).unwrap();
        assert_eq!(serialized, "\"eip155:8453\"");
    }

    #[test]
    fn test_chain_id_deserialize_solana() {
        let chain_id: ChainId =
            serde_json::from_str("\"solana:5eykt4UsFv8P8NJdTREpY1vzqKqZKvdp\"").unwrap();
        assert_eq!(chain_id.namespace(), "solana");
        assert_eq!(chain_id.reference(), "5eykt4UsFv8P8NJdTREpY1vzqKqZKvdp");
    }

    #[test]
    fn test_chain_id_roundtrip() {
        let original = ChainId::new("eip155", "1");
        let serialized = serde_json::to_string(&original).unwrap();
        let deserialized: ChainId = serde_json::from_str(&serialized).unwrap();
        assert_eq!(original, deserialized);
    }

    #[test]
    fn test_chain_id_deserialize_invalid_format() {
        let result: Result<ChainId, _> = serde_json::from_str("\"invalid\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_chain_id_rejects_empty_components() {
        assert!("eip155:".parse::<ChainId>().is_err());
        assert!(":8453".parse::<ChainId>().is_err());
    }

    #[test]
    fn test_family_from_namespace() {
        assert_eq!(
            ChainId::new("eip155", "8453").family(),
            Some(ChainFamily::Evm)
        );
        assert_eq!(
            ChainId::new("solana", "devnet").family(),
            Some(ChainFamily::Solana)
        );
        assert_eq!(ChainId::new("cosmos", "hub").family(), None);
    }

    #[test]
    fn test_registry_lookup() {
        let mut lanes = HashMap::new();
        lanes.insert(ChainId::new("eip155", "8453"), 6u64);
        let registry = ChainRegistry::new(lanes);
        assert_eq!(registry.by_chain_id(&ChainId::new("eip155", "8453")), Some(&6));
        assert_eq!(registry.by_chain_id(&ChainId::new("eip155", "1")), None);
        assert_eq!(registry.len(), 1);
    }
}
