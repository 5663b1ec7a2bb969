//! Process-wide configuration and table loading.
//!
//! Both are external collaborators per the specification (JSON on disk, not
//! part of the core protocol engine), but a runnable crate still needs one
//! concrete realization — this one, via `serde_json`.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Network address of one party-shard, used by a real transport. The
/// simulated transport (`io::socket::SimulatedBus`) ignores these fields and
/// routes purely by `(party_id, machine_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoint {
    pub ip: String,
    pub server_port: u16,
    pub client_port: u16,
    pub websocket_port: u16,
}

/// Immutable, process-wide configuration, loaded once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Configuration {
    /// Number of non-colluding parties, N >= 2.
    pub parties: u32,
    /// Shards per party, M >= 1.
    pub parallelism: u32,
    /// `party_id -> machine_id -> Endpoint`, used only by a real transport.
    #[serde(default)]
    pub network: HashMap<u32, HashMap<u32, Endpoint>>,
    /// Prime modulus shared by every party's field arithmetic.
    pub modulus: u64,
    /// Base nonce input mixed with a per-batch counter to produce the
    /// `batch_nonce` that seeds the shuffler's PRG (see the PRG-seeding
    /// Open Question resolution in `DESIGN.md`).
    pub batch_nonce_seed: u64,
}

impl Configuration {
    /// Loads and validates a configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ProtocolError> {
        let text = fs::read_to_string(path.as_ref())
            .map_err(|e| ProtocolError::Configuration(format!("reading {}: {e}", path.as_ref().display())))?;
        let config: Configuration = serde_json::from_str(&text)
            .map_err(|e| ProtocolError::Configuration(format!("parsing {}: {e}", path.as_ref().display())))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ProtocolError> {
        if self.parties < 2 {
            return Err(ProtocolError::Configuration(format!("parties must be >= 2, got {}", self.parties)));
        }
        if self.parallelism < 1 {
            return Err(ProtocolError::Configuration(format!("parallelism must be >= 1, got {}", self.parallelism)));
        }
        Ok(())
    }

    /// Combines the configured base seed with a monotonically increasing
    /// per-process batch counter into the nonce all shards of a party must
    /// observe identically before calling `Shuffler::initialize`.
    pub fn batch_nonce(&self, batch_index: u64) -> u64 {
        self.batch_nonce_seed ^ batch_index.wrapping_mul(0x9E37_79B9_7F4A_7C15)
    }
}

/// The replicated lookup table, shared read-only across every party-shard in
/// a process.
pub type Table = Arc<HashMap<u64, u64>>;

/// Loads a table from a JSON file. Accepts either a `{"key": value, ...}`
/// object (string keys, since JSON object keys are always strings) or an
/// array of `[key, value]` pairs, matching the original's flat table format.
pub fn load_table(path: impl AsRef<Path>) -> Result<Table, ProtocolError> {
    let text = fs::read_to_string(path.as_ref())
        .map_err(|e| ProtocolError::Configuration(format!("reading {}: {e}", path.as_ref().display())))?;
    let raw: TableJson = serde_json::from_str(&text)
        .map_err(|e| ProtocolError::Configuration(format!("parsing {}: {e}", path.as_ref().display())))?;
    Ok(Arc::new(raw.into_map()))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TableJson {
    Object(HashMap<String, u64>),
    Pairs(Vec<(u64, u64)>),
}

impl TableJson {
    fn into_map(self) -> HashMap<u64, u64> {
        match self {
            TableJson::Object(map) => {
                map.into_iter().filter_map(|(k, v)| k.parse::<u64>().ok().map(|k| (k, v))).collect()
            }
            TableJson::Pairs(pairs) => pairs.into_iter().collect(),
        }
    }
}
