//! Inter-process message protocol.
//!
//! Subprocesses talk to the core with one JSON object per stdout line,
//! tagged by an explicit `type` discriminant; the core replies on the
//! subprocess's stdin in the same format. Field names are camelCase on the
//! wire. Messages are validated at the process boundary: lines that do not
//! parse into a known discriminant are logged and dropped.

use alloy::primitives::{Address, Bytes, U256};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

/// Messages flowing subprocess → core.
///
/// Serde's internally-tagged representation buffers field content in a way
/// that cannot carry the 128-bit fee fields, so the discriminant is handled
/// by hand: [`JobMessage::parse`] peeks `type` and then deserializes the
/// concrete payload straight from the line.
#[derive(Debug, Clone, PartialEq)]
pub enum JobMessage {
    /// The job found workable transactions.
    WorkRequest(WorkRequest),
    /// The job needs a local port for a fork.
    PortRequest(PortRequest),
}

impl JobMessage {
    /// Parse one subprocess stdout line.
    pub fn parse(line: &str) -> serde_json::Result<Self> {
        #[derive(Deserialize)]
        struct Discriminant<'a> {
            #[serde(rename = "type", borrow)]
            tag: &'a str,
        }

        let Discriminant { tag } = serde_json::from_str(line)?;
        match tag {
            "WorkRequest" => Ok(Self::WorkRequest(serde_json::from_str(line)?)),
            "PortRequest" => Ok(Self::PortRequest(serde_json::from_str(line)?)),
            other => Err(serde::de::Error::custom(format!(
                "unknown message type: {other}"
            ))),
        }
    }
}

impl Serialize for JobMessage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::WorkRequest(work) => {
                let mut s = serializer.serialize_struct("WorkRequest", 4)?;
                s.serialize_field("type", "WorkRequest")?;
                s.serialize_field("job", &work.job)?;
                s.serialize_field("correlationId", &work.correlation_id)?;
                s.serialize_field("burst", &work.burst)?;
                s.end()
            }
            Self::PortRequest(_) => {
                let mut s = serializer.serialize_struct("PortRequest", 1)?;
                s.serialize_field("type", "PortRequest")?;
                s.end()
            }
        }
    }
}

/// Messages flowing core → subprocess.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CoreMessage {
    /// Reply to a [`PortRequest`].
    AvailablePort { port: u16 },
}

/// One retryable unit of work reported by a job attempt.
///
/// `correlation_id` identifies the unit across its initial attempt and all
/// retries; the burst is an ordered sequence of workable groups, each
/// targeting a specific future block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkRequest {
    pub job: String,
    pub correlation_id: String,
    pub burst: Vec<WorkableGroup>,
}

/// An ordered group of transactions to be submitted atomically.
///
/// Invariant (checked before signing): non-empty, and the last transaction
/// must be EIP-1559 so the block producer can be paid via the priority fee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkableGroup {
    pub unsigned_txs: Vec<UnsignedTx>,
    pub target_block: u64,
    pub log_id: String,
}

/// Unsigned transaction as reported by a job subprocess.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsignedTx {
    pub chain_id: u64,
    pub to: Address,
    #[serde(default)]
    pub data: Bytes,
    #[serde(default)]
    pub value: U256,
    pub gas_limit: u64,
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
    pub nonce: u64,
    /// Transaction type discriminant; 2 = EIP-1559.
    #[serde(rename = "type")]
    pub tx_type: u8,
}

/// An empty port request; carries only its discriminant on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortRequest {}

impl UnsignedTx {
    /// Whether this transaction can carry a priority-fee payment to the
    /// block producer.
    pub fn supports_priority_fee(&self) -> bool {
        self.tx_type == 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    fn sample_tx(nonce: u64) -> UnsignedTx {
        UnsignedTx {
            chain_id: 1,
            to: address!("1cEB5cB57C4D4E2b2433641b95Dd330A33185A44"),
            data: Bytes::from(vec![0xde, 0xad]),
            value: U256::ZERO,
            gas_limit: 300_000,
            max_fee_per_gas: 30_000_000_000,
            max_priority_fee_per_gas: 2_000_000_000,
            nonce,
            tx_type: 2,
        }
    }

    #[test]
    fn test_port_request_wire_format() {
        let parsed = JobMessage::parse(r#"{"type":"PortRequest"}"#).unwrap();
        assert_eq!(parsed, JobMessage::PortRequest(PortRequest {}));
    }

    #[test]
    fn test_available_port_wire_format() {
        let message = CoreMessage::AvailablePort { port: 10_001 };
        let json = serde_json::to_string(&message).unwrap();
        assert_eq!(json, r#"{"type":"AvailablePort","port":10001}"#);
    }

    #[test]
    fn test_work_request_round_trip_is_exact() {
        let request = WorkRequest {
            job: "sample-job".to_string(),
            correlation_id: "7e3c9a".to_string(),
            burst: vec![WorkableGroup {
                unsigned_txs: vec![sample_tx(0), sample_tx(1)],
                target_block: 1_000_003,
                log_id: "7e3c9a-0".to_string(),
            }],
        };

        let line = serde_json::to_string(&JobMessage::WorkRequest(request.clone())).unwrap();
        let parsed = JobMessage::parse(&line).unwrap();
        match parsed {
            JobMessage::WorkRequest(back) => {
                assert_eq!(back.correlation_id, request.correlation_id);
                assert_eq!(back, request);
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_camel_case_field_names_on_wire() {
        let request = WorkRequest {
            job: "j".to_string(),
            correlation_id: "c".to_string(),
            burst: vec![WorkableGroup {
                unsigned_txs: vec![sample_tx(0)],
                target_block: 5,
                log_id: "l".to_string(),
            }],
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"correlationId\""));
        assert!(json.contains("\"unsignedTxs\""));
        assert!(json.contains("\"targetBlock\""));
        assert!(json.contains("\"maxPriorityFeePerGas\""));
        assert!(json.contains("\"type\":2"));
    }

    #[test]
    fn test_unknown_discriminant_is_rejected() {
        assert!(JobMessage::parse(r#"{"type":"Bogus"}"#).is_err());
    }

    #[test]
    fn test_work_request_line_with_txs_parses() {
        // fee fields are 128-bit; values past u64::MAX must survive the
        // discriminant peek and the payload parse
        let line = r#"{"type":"WorkRequest","job":"sample-job","correlationId":"7e3c9a","burst":[{"unsignedTxs":[{"chainId":1,"to":"0x1ceb5cb57c4d4e2b2433641b95dd330a33185a44","gasLimit":300000,"maxFeePerGas":36893488147419103232,"maxPriorityFeePerGas":2000000000,"nonce":7,"type":2}],"targetBlock":1000003,"logId":"7e3c9a-0"}]}"#;
        let parsed = JobMessage::parse(line).unwrap();
        let JobMessage::WorkRequest(work) = parsed else {
            panic!("expected a work request");
        };
        assert_eq!(work.correlation_id, "7e3c9a");
        let tx = &work.burst[0].unsigned_txs[0];
        assert_eq!(tx.max_fee_per_gas, 36_893_488_147_419_103_232);
        assert_eq!(tx.nonce, 7);
        assert!(tx.supports_priority_fee());
    }

    #[test]
    fn test_priority_fee_capability() {
        let mut tx = sample_tx(0);
        assert!(tx.supports_priority_fee());
        tx.tx_type = 0;
        assert!(!tx.supports_priority_fee());
    }
}
