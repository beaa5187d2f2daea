//! Purpose: Translate between native scalars and loosely-typed store attributes.
//! Exports: `AttributeValue`, `AttributeMap`, `read_str`, `read_int`, `write_str`, `write_int`.
//! Role: Leaf codec under every reader, writer, and store collaborator.
//! Invariants: Reads never fail; any anomaly yields `""` or `0`.
//! Invariants: Empty strings are never written; integers are always written as base-10 text.
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One attribute as the store represents it on the wire (`{"S": ..}`, `{"N": ..}`,
/// `{"BOOL": true}`, ..). Binary payloads stay in their base64 wire text.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    S(String),
    N(String),
    B(String),
    #[serde(rename = "BOOL")]
    Bool(bool),
    #[serde(rename = "NULL")]
    Null(bool),
    #[serde(rename = "SS")]
    Ss(Vec<String>),
    #[serde(rename = "NS")]
    Ns(Vec<String>),
    #[serde(rename = "BS")]
    Bs(Vec<String>),
    L(Vec<AttributeValue>),
    M(HashMap<String, AttributeValue>),
}

impl AttributeValue {
    pub fn string(value: impl Into<String>) -> Self {
        Self::S(value.into())
    }

    pub fn number(value: i64) -> Self {
        Self::N(value.to_string())
    }

    pub fn as_s(&self) -> Option<&str> {
        match self {
            Self::S(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_n(&self) -> Option<&str> {
        match self {
            Self::N(value) => Some(value),
            _ => None,
        }
    }

    pub fn type_tag(&self) -> &'static str {
        match self {
            Self::S(_) => "S",
            Self::N(_) => "N",
            Self::B(_) => "B",
            Self::Bool(_) => "BOOL",
            Self::Null(_) => "NULL",
            Self::Ss(_) => "SS",
            Self::Ns(_) => "NS",
            Self::Bs(_) => "BS",
            Self::L(_) => "L",
            Self::M(_) => "M",
        }
    }
}

pub type AttributeMap = HashMap<String, AttributeValue>;

pub fn read_str<'a>(item: Option<&'a AttributeMap>, key: &str) -> &'a str {
    item.and_then(|item| item.get(key))
        .and_then(AttributeValue::as_s)
        .unwrap_or("")
}

pub fn read_int(item: Option<&AttributeMap>, key: &str) -> i64 {
    item.and_then(|item| item.get(key))
        .and_then(AttributeValue::as_n)
        .and_then(|text| text.parse().ok())
        .unwrap_or(0)
}

/// Stores `value` under `key` unless either is empty.
pub fn write_str(item: &mut AttributeMap, key: &str, value: &str) {
    if key.is_empty() || value.is_empty() {
        return;
    }
    item.insert(key.to_string(), AttributeValue::string(value));
}

pub fn write_int(item: &mut AttributeMap, key: &str, value: i64) {
    if key.is_empty() {
        return;
    }
    item.insert(key.to_string(), AttributeValue::number(value));
}
