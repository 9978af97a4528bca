//! Content units and their named sections
//!
//! A [`ContentUnit`] is the published material for one week of one process.
//! Units are immutable: a correction is published as a new version with its
//! own [`ContentUnitId`], so a response always points at the exact text the
//! user saw.

use crate::id::{ContentUnitId, ProcessId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Topical focus of one week (e.g. "Active listening")
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Theme(String);

impl Theme {
    /// Create a theme from its display name
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Theme name
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the name is empty after trimming
    #[inline]
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Theme {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Kind of weekly unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    /// Short lesson with a self-reflection prompt and weekly actions
    Microlearning,
    /// Pure reflection unit built around a question set
    Reflection,
}

/// Named section of a content unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldKey {
    SelfReflection,
    Insight,
    ActionInstructions,
    LeaderOnlyGuidance,
    Questions,
    /// Notes left by the authoring collaborator (generation context, sources)
    AuthoringNotes,
}

/// Who a section is written for
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Audience {
    /// Every participant
    Everyone,
    /// Team leaders and administrators
    Leaders,
    /// Content administrators only
    Authors,
}

impl FieldKey {
    /// All keys in display order
    pub const ALL: [FieldKey; 6] = [
        FieldKey::SelfReflection,
        FieldKey::Insight,
        FieldKey::ActionInstructions,
        FieldKey::LeaderOnlyGuidance,
        FieldKey::Questions,
        FieldKey::AuthoringNotes,
    ];

    /// Intended audience of this section
    #[inline]
    #[must_use]
    pub const fn audience(self) -> Audience {
        match self {
            FieldKey::LeaderOnlyGuidance => Audience::Leaders,
            FieldKey::AuthoringNotes => Audience::Authors,
            FieldKey::SelfReflection
            | FieldKey::Insight
            | FieldKey::ActionInstructions
            | FieldKey::Questions => Audience::Everyone,
        }
    }
}

/// Section body: free text or an ordered list (question sets)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    List(Vec<String>),
}

impl FieldValue {
    /// True when the value carries no visible text
    #[must_use]
    pub fn is_blank(&self) -> bool {
        match self {
            FieldValue::Text(text) => text.trim().is_empty(),
            FieldValue::List(items) => items.iter().all(|item| item.trim().is_empty()),
        }
    }
}

/// Ordered mapping of section name to body
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentFields(BTreeMap<FieldKey, FieldValue>);

impl ContentFields {
    /// Empty field set
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a text section
    #[must_use]
    pub fn with_text(mut self, key: FieldKey, text: impl Into<String>) -> Self {
        self.0.insert(key, FieldValue::Text(text.into()));
        self
    }

    /// Add the question set
    #[must_use]
    pub fn with_questions<I, S>(mut self, questions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let list = questions.into_iter().map(Into::into).collect();
        self.0.insert(FieldKey::Questions, FieldValue::List(list));
        self
    }

    /// Insert or replace a section
    pub fn insert(&mut self, key: FieldKey, value: FieldValue) {
        self.0.insert(key, value);
    }

    /// Look up a section
    #[inline]
    #[must_use]
    pub fn get(&self, key: FieldKey) -> Option<&FieldValue> {
        self.0.get(&key)
    }

    /// True when the section is present
    #[inline]
    #[must_use]
    pub fn contains(&self, key: FieldKey) -> bool {
        self.0.contains_key(&key)
    }

    /// Question set, empty when the unit has none
    #[must_use]
    pub fn questions(&self) -> Vec<String> {
        match self.0.get(&FieldKey::Questions) {
            Some(FieldValue::List(items)) => items.clone(),
            Some(FieldValue::Text(text)) => vec![text.clone()],
            None => Vec::new(),
        }
    }

    /// Keep only the sections accepted by `keep`
    #[must_use]
    pub fn retain_keys(&self, mut keep: impl FnMut(FieldKey) -> bool) -> Self {
        Self(
            self.0
                .iter()
                .filter(|(key, _)| keep(**key))
                .map(|(key, value)| (*key, value.clone()))
                .collect(),
        )
    }

    /// Section names present, in order
    pub fn keys(&self) -> impl Iterator<Item = FieldKey> + '_ {
        self.0.keys().copied()
    }

    /// Iterate sections in order
    pub fn iter(&self) -> impl Iterator<Item = (FieldKey, &FieldValue)> {
        self.0.iter().map(|(key, value)| (*key, value))
    }

    /// Number of sections
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when no section carries visible text
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.values().all(FieldValue::is_blank)
    }
}

/// BLAKE3 digest over a unit's identity and sections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentDigest(#[serde(with = "hex_bytes")] [u8; 32]);

impl ContentDigest {
    fn compute(draft: &UnitDraft) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(draft.process_id.as_str().as_bytes());
        hasher.update(&draft.week.to_le_bytes());
        hasher.update(&draft.version.to_le_bytes());
        hasher.update(draft.theme.as_str().as_bytes());
        hasher.update(&[0]);
        // BTreeMap keeps the encoding stable across runs
        let body = serde_json::to_vec(&(draft.kind, &draft.fields)).unwrap_or_default();
        hasher.update(&body);
        Self(*hasher.finalize().as_bytes())
    }

    /// First 16 hex characters
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

mod hex_bytes {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(bytes: &[u8; 32], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(bytes))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<[u8; 32], D::Error> {
        let raw = String::deserialize(d)?;
        let decoded = hex::decode(raw).map_err(D::Error::custom)?;
        decoded
            .try_into()
            .map_err(|_| D::Error::custom("digest must be 32 bytes"))
    }
}

/// Unit submitted for publication
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitDraft {
    pub process_id: ProcessId,
    pub week: u32,
    /// 1 for the first publication, `latest + 1` to supersede
    pub version: u32,
    pub theme: Theme,
    pub kind: ContentKind,
    pub fields: ContentFields,
}

impl UnitDraft {
    /// First version of a unit
    #[must_use]
    pub fn new(process_id: ProcessId, week: u32, theme: Theme, kind: ContentKind) -> Self {
        Self {
            process_id,
            week,
            version: 1,
            theme,
            kind,
            fields: ContentFields::new(),
        }
    }

    /// With explicit version
    #[inline]
    #[must_use]
    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// With sections
    #[inline]
    #[must_use]
    pub fn with_fields(mut self, fields: ContentFields) -> Self {
        self.fields = fields;
        self
    }

    pub(crate) fn seal(self, published_at: DateTime<Utc>) -> ContentUnit {
        let digest = ContentDigest::compute(&self);
        ContentUnit {
            id: ContentUnitId::generate(),
            process_id: self.process_id,
            week: self.week,
            version: self.version,
            theme: self.theme,
            kind: self.kind,
            fields: self.fields,
            digest,
            published_at,
        }
    }
}

/// Published, immutable content for one (process, week, version)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentUnit {
    pub id: ContentUnitId,
    pub process_id: ProcessId,
    pub week: u32,
    pub version: u32,
    pub theme: Theme,
    pub kind: ContentKind,
    pub fields: ContentFields,
    pub digest: ContentDigest,
    pub published_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> UnitDraft {
        UnitDraft::new(
            ProcessId::from("p1"),
            3,
            Theme::new("Active listening"),
            ContentKind::Microlearning,
        )
        .with_fields(
            ContentFields::new()
                .with_text(FieldKey::Insight, "Listen to understand")
                .with_questions(["When did you feel heard?"]),
        )
    }

    #[test]
    fn digest_is_stable_for_same_draft() {
        let a = draft().seal(Utc::now());
        let b = draft().seal(Utc::now());
        assert_eq!(a.digest, b.digest);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn digest_changes_with_version() {
        let a = draft().seal(Utc::now());
        let b = draft().with_version(2).seal(Utc::now());
        assert_ne!(a.digest, b.digest);
    }

    #[test]
    fn field_keys_serialize_camel_case() {
        let fields = ContentFields::new().with_text(FieldKey::LeaderOnlyGuidance, "model it");
        let json = serde_json::to_string(&fields).unwrap();
        assert_eq!(json, r#"{"leaderOnlyGuidance":"model it"}"#);
    }

    #[test]
    fn blank_sections_count_as_empty() {
        let fields = ContentFields::new()
            .with_text(FieldKey::Insight, "   ")
            .with_questions(["", " "]);
        assert!(fields.is_empty());
        assert_eq!(fields.len(), 2);
    }

    #[test]
    fn retain_keys_filters_sections() {
        let fields = draft().fields.retain_keys(|k| k.audience() == Audience::Everyone);
        assert!(fields.contains(FieldKey::Insight));
        assert_eq!(fields.questions(), vec!["When did you feel heard?".to_string()]);
    }
}
