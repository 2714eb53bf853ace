// NODE CONFIGURATION
// Defaults, then an optional TOML file, then VIGIL__* environment variables.

use anyhow::{anyhow, bail, Context};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use vigil_core::{Network, OutPoint};
use vigil_crypto::{Hash256, OperatorKey};
use vigil_instantsend::{InstantSendConfig, LocalOperator};
use vigil_sync::SyncConfig;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NodeConfig {
    pub network: Network,
    /// Interval between node heartbeats.
    pub heartbeat_millis: u64,
    /// Default log filter; `RUST_LOG` takes precedence.
    pub log_level: String,
    /// Hex secret of the local operator key, if this node votes on locks.
    pub operator_secret_hex: Option<String>,
    /// Collateral outpoint of the local operator, as `txid:index`.
    pub operator_collateral: Option<String>,
    pub sync: SyncConfig,
    pub instantsend: InstantSendConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            network: Network::Mainnet,
            heartbeat_millis: 1_000,
            log_level: "info".to_string(),
            operator_secret_hex: None,
            operator_collateral: None,
            sync: SyncConfig::default(),
            instantsend: InstantSendConfig::default(),
        }
    }
}

impl NodeConfig {
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder().add_source(Config::try_from(&NodeConfig::default())?);
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        builder
            .add_source(
                Environment::with_prefix("VIGIL")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// The local operator identity, when both key and collateral are configured.
    pub fn local_operator(&self) -> anyhow::Result<Option<LocalOperator>> {
        match (&self.operator_secret_hex, &self.operator_collateral) {
            (Some(secret), Some(collateral)) => {
                let key = OperatorKey::from_secret_hex(secret).context("operator_secret_hex")?;
                let outpoint = parse_outpoint(collateral).context("operator_collateral")?;
                Ok(Some(LocalOperator::new(outpoint, key)))
            }
            (None, None) => Ok(None),
            _ => bail!("operator_secret_hex and operator_collateral must be set together"),
        }
    }
}

/// Parse `txid:index`.
pub fn parse_outpoint(s: &str) -> anyhow::Result<OutPoint> {
    let (txid, index) = s
        .trim()
        .split_once(':')
        .ok_or_else(|| anyhow!("expected txid:index, got {:?}", s))?;
    let txid = Hash256::from_hex(txid)?;
    let index = index.parse::<u32>().context("outpoint index")?;
    Ok(OutPoint::new(txid, index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = NodeConfig::default();
        assert_eq!(config.sync.heartbeat_divisor, 6);
        assert_eq!(config.instantsend.signatures_required, 6);
        assert_eq!(config.heartbeat_millis, 1_000);
        assert!(config.local_operator().unwrap().is_none());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let path = std::env::temp_dir().join(format!("vigil-config-{}.toml", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "network = \"regtest\"").unwrap();
        writeln!(file, "[instantsend]").unwrap();
        writeln!(file, "signatures_required = 4").unwrap();
        drop(file);

        let config = NodeConfig::load(Some(&path)).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(config.network, Network::Regtest);
        assert_eq!(config.instantsend.signatures_required, 4);
        assert_eq!(config.instantsend.signatures_total, 10);
        assert_eq!(config.sync.attempts_per_asset, 8);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let path = Path::new("/nonexistent/vigil.toml");
        assert!(NodeConfig::load(Some(path)).is_err());
    }

    #[test]
    fn test_local_operator_parsing() {
        let mut config = NodeConfig::default();
        config.operator_secret_hex = Some("11".repeat(32));
        assert!(config.local_operator().is_err());

        config.operator_collateral = Some(format!("{}:1", "ab".repeat(32)));
        let operator = config.local_operator().unwrap().unwrap();
        assert_eq!(operator.collateral.index, 1);
        assert_eq!(
            operator.public_key(),
            OperatorKey::from_secret_bytes(&[0x11; 32]).public_key()
        );
    }

    #[test]
    fn test_parse_outpoint_rejects_garbage() {
        assert!(parse_outpoint("nocolon").is_err());
        assert!(parse_outpoint(&format!("{}:x", "00".repeat(32))).is_err());
        assert!(parse_outpoint("zz:1").is_err());
    }

    proptest::proptest! {
        #[test]
        fn prop_collateral_text_parses(
            bytes in proptest::prelude::any::<[u8; 32]>(),
            index in proptest::prelude::any::<u32>(),
        ) {
            let text = format!(" {}:{} ", hex::encode(bytes), index);
            let outpoint = parse_outpoint(&text).unwrap();
            proptest::prop_assert_eq!(outpoint, OutPoint::new(Hash256(bytes), index));
        }
    }
}
