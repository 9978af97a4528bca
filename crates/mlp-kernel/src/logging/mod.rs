use crate::error::AuditError;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One entry in the hash-chained audit trail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    /// Id of the process or response the event is about
    pub subject: String,
    pub action: String,
    pub detail: String,
    #[serde(with = "hex_hash")]
    pub prev_hash: [u8; 32],
    #[serde(with = "hex_hash")]
    pub hash: [u8; 32],
}

/// Append-only audit trail of tracker transitions and ledger writes
#[derive(Debug, Default)]
pub struct AuditLog {
    inner: Mutex<Vec<AuditEvent>>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(
        &self,
        subject: impl Into<String>,
        action: impl Into<String>,
        detail: impl Into<String>,
    ) -> u64 {
        let mut guard = self.inner.lock();
        let prev_hash = guard.last().map(|e| e.hash).unwrap_or([0u8; 32]);
        let mut event = AuditEvent {
            sequence: guard.len() as u64,
            timestamp: Utc::now(),
            subject: subject.into(),
            action: action.into(),
            detail: detail.into(),
            prev_hash,
            hash: [0u8; 32],
        };
        event.hash = compute_hash(&event);
        let sequence = event.sequence;
        guard.push(event);
        sequence
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.inner.lock().clone()
    }

    pub fn events_for(&self, subject: &str) -> Vec<AuditEvent> {
        self.inner
            .lock()
            .iter()
            .filter(|e| e.subject == subject)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    pub fn verify_integrity(&self) -> Result<(), AuditError> {
        let guard = self.inner.lock();
        let mut prev = [0u8; 32];
        for e in guard.iter() {
            if e.prev_hash != prev {
                return Err(AuditError::IntegrityViolation(e.sequence));
            }
            if e.hash != compute_hash(e) {
                return Err(AuditError::IntegrityViolation(e.sequence));
            }
            prev = e.hash;
        }
        Ok(())
    }

    #[cfg(test)]
    fn tamper(&self, sequence: usize, detail: &str) {
        self.inner.lock()[sequence].detail = detail.to_string();
    }
}

fn compute_hash(event: &AuditEvent) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(event.sequence.to_le_bytes());
    hasher.update(event.timestamp.timestamp_micros().to_le_bytes());
    hasher.update(event.subject.as_bytes());
    hasher.update([0]);
    hasher.update(event.action.as_bytes());
    hasher.update([0]);
    hasher.update(event.detail.as_bytes());
    hasher.update([0]);
    hasher.update(event.prev_hash);
    hasher.finalize().into()
}

mod hex_hash {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(bytes: &[u8; 32], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(bytes))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<[u8; 32], D::Error> {
        let raw = String::deserialize(d)?;
        hex::decode(raw)
            .map_err(D::Error::custom)?
            .try_into()
            .map_err(|_| D::Error::custom("hash must be 32 bytes"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_verifies() {
        let log = AuditLog::new();
        log.append("p1", "started", "week 1");
        log.append("p1", "advanced", "week 2");
        assert_eq!(log.len(), 2);
        assert!(log.verify_integrity().is_ok());
        assert_eq!(log.events()[1].prev_hash, log.events()[0].hash);
    }

    #[test]
    fn tampering_is_detected() {
        let log = AuditLog::new();
        log.append("p1", "started", "week 1");
        log.append("p1", "advanced", "week 2");
        log.tamper(0, "week 9");
        assert_eq!(log.verify_integrity(), Err(AuditError::IntegrityViolation(0)));
    }

    #[test]
    fn events_filter_by_subject() {
        let log = AuditLog::new();
        log.append("p1", "started", "");
        log.append("r1", "response_created", "");
        assert_eq!(log.events_for("r1").len(), 1);
    }
}
