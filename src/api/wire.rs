//! Purpose: Request/response shapes of the DynamoDB JSON 1.0 protocol subset we speak.
//! Exports: Request/response structs, `ErrorBody`, target/content-type constants, kind mapping.
//! Role: Spoken by the `serve` development server; `RemoteStore` reuses the exception-name mapping.
//! Invariants: Field names follow the protocol's PascalCase; unknown response fields are ignored.
//! Invariants: Error kinds round-trip through exception names for every `ErrorKind` the server emits.
use serde::{Deserialize, Serialize};

use crate::core::attr::AttributeMap;
use crate::core::error::ErrorKind;
use crate::core::store::{KeyType, TableDef};

pub const TARGET_HEADER: &str = "X-Amz-Target";
pub const TARGET_PREFIX: &str = "DynamoDB_20120810.";
pub const CONTENT_TYPE: &str = "application/x-amz-json-1.0";
pub const EXCEPTION_PREFIX: &str = "com.amazonaws.dynamodb.v20120810#";

pub const SELECT_COUNT: &str = "COUNT";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ScanRequest {
    pub table_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ScanResponse {
    #[serde(default)]
    pub count: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<AttributeMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_evaluated_key: Option<AttributeMap>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PutItemRequest {
    pub table_name: String,
    pub item: AttributeMap,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeleteTableRequest {
    pub table_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AttributeDefinition {
    pub attribute_name: String,
    pub attribute_type: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct KeySchemaElement {
    pub attribute_name: String,
    pub key_type: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProvisionedThroughput {
    pub read_capacity_units: u64,
    pub write_capacity_units: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateTableRequest {
    pub table_name: String,
    pub attribute_definitions: Vec<AttributeDefinition>,
    pub key_schema: Vec<KeySchemaElement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioned_throughput: Option<ProvisionedThroughput>,
}

impl CreateTableRequest {
    /// Single hash-key table at the smallest provisioned throughput.
    pub fn from_def(def: &TableDef) -> Self {
        Self {
            table_name: def.name.clone(),
            attribute_definitions: vec![AttributeDefinition {
                attribute_name: def.key.clone(),
                attribute_type: def.key_type.as_tag().to_string(),
            }],
            key_schema: vec![KeySchemaElement {
                attribute_name: def.key.clone(),
                key_type: "HASH".to_string(),
            }],
            provisioned_throughput: Some(ProvisionedThroughput {
                read_capacity_units: 1,
                write_capacity_units: 1,
            }),
        }
    }

    /// The hash key definition, if the request has one we can serve.
    pub fn to_def(&self) -> Option<TableDef> {
        let hash = self.key_schema.iter().find(|key| key.key_type == "HASH")?;
        let definition = self
            .attribute_definitions
            .iter()
            .find(|def| def.attribute_name == hash.attribute_name)?;
        let key_type = KeyType::from_tag(&definition.attribute_type)?;
        Some(TableDef::new(
            self.table_name.clone(),
            hash.attribute_name.clone(),
            key_type,
        ))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TableDescription {
    pub table_name: String,
    pub table_status: String,
    pub item_count: u64,
    #[serde(default)]
    pub creation_date_time: f64,
    #[serde(default)]
    pub key_schema: Vec<KeySchemaElement>,
    #[serde(default)]
    pub attribute_definitions: Vec<AttributeDefinition>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TableDescriptionEnvelope {
    pub table_description: TableDescription,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(rename = "__type")]
    pub kind: String,
    #[serde(default, alias = "Message", skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

pub fn exception_name(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::NotFound => "ResourceNotFoundException",
        ErrorKind::AlreadyExists => "ResourceInUseException",
        ErrorKind::Usage => "ValidationException",
        ErrorKind::Permission => "AccessDeniedException",
        ErrorKind::Throttled => "ThrottlingException",
        ErrorKind::Protocol => "SerializationException",
        ErrorKind::Internal | ErrorKind::Io => "InternalServerError",
    }
}

/// Maps `__type` (with or without the namespace prefix) to an error kind.
pub fn kind_from_exception(kind: &str) -> ErrorKind {
    let name = kind.rsplit('#').next().unwrap_or(kind);
    match name {
        "ResourceNotFoundException" => ErrorKind::NotFound,
        "ResourceInUseException" | "TableAlreadyExistsException" => ErrorKind::AlreadyExists,
        "ValidationException" | "ConditionalCheckFailedException" => ErrorKind::Usage,
        "SerializationException" | "UnknownOperationException" => ErrorKind::Protocol,
        "AccessDeniedException"
        | "UnrecognizedClientException"
        | "MissingAuthenticationTokenException"
        | "IncompleteSignatureException" => ErrorKind::Permission,
        "ThrottlingException"
        | "ProvisionedThroughputExceededException"
        | "RequestLimitExceeded"
        | "LimitExceededException" => ErrorKind::Throttled,
        _ => ErrorKind::Internal,
    }
}

#[cfg(test)]
mod tests {
    use super::{
        CreateTableRequest, ErrorBody, ScanRequest, ScanResponse, exception_name,
        kind_from_exception,
    };
    use crate::core::attr::AttributeValue;
    use crate::core::error::ErrorKind;
    use crate::core::store::{KeyType, TableDef};
    use serde_json::json;

    #[test]
    fn scan_request_uses_pascal_case() {
        let request = ScanRequest {
            table_name: "users".to_string(),
            select: Some("COUNT".to_string()),
        };
        let value = serde_json::to_value(&request).expect("encode");
        assert_eq!(value, json!({"TableName": "users", "Select": "COUNT"}));

        let request = ScanRequest {
            table_name: "users".to_string(),
            select: None,
        };
        let value = serde_json::to_value(&request).expect("encode");
        assert_eq!(value, json!({"TableName": "users"}));
    }

    #[test]
    fn scan_response_decodes_items_and_ignores_extras() {
        let body = json!({
            "Count": 1,
            "ScannedCount": 1,
            "Items": [{"str": {"S": "one"}, "n": {"N": "2"}}]
        });
        let response: ScanResponse = serde_json::from_value(body).expect("decode");
        assert_eq!(response.count, 1);
        assert_eq!(
            response.items[0].get("str"),
            Some(&AttributeValue::string("one"))
        );
        assert!(response.last_evaluated_key.is_none());
    }

    #[test]
    fn scan_response_decodes_non_scalar_attributes() {
        let body = r#"{"Count":1,"Items":[{"id":{"S":"a"},"f":{"BOOL":true},"tags":{"SS":["x"]}}]}"#;
        let response: ScanResponse = serde_json::from_str(body).expect("decode");
        assert_eq!(response.items.len(), 1);
        assert_eq!(response.items[0].get("f"), Some(&AttributeValue::Bool(true)));
        assert_eq!(response.items[0]["id"].as_s(), Some("a"));
    }

    #[test]
    fn create_table_request_round_trips_def() {
        let def = TableDef::new("users", "id", KeyType::Number);
        let request = CreateTableRequest::from_def(&def);
        let value = serde_json::to_value(&request).expect("encode");
        assert_eq!(value["KeySchema"][0]["KeyType"], "HASH");
        assert_eq!(value["AttributeDefinitions"][0]["AttributeType"], "N");
        assert_eq!(value["ProvisionedThroughput"]["ReadCapacityUnits"], 1);
        assert_eq!(request.to_def(), Some(def));
    }

    #[test]
    fn create_table_request_without_hash_key_has_no_def() {
        let request: CreateTableRequest = serde_json::from_value(json!({
            "TableName": "users",
            "AttributeDefinitions": [{"AttributeName": "id", "AttributeType": "B"}],
            "KeySchema": [{"AttributeName": "id", "KeyType": "HASH"}]
        }))
        .expect("decode");
        assert_eq!(request.to_def(), None);
    }

    #[test]
    fn error_body_accepts_capitalized_message() {
        let body: ErrorBody = serde_json::from_value(json!({
            "__type": "com.amazonaws.dynamodb.v20120810#ResourceNotFoundException",
            "Message": "Requested resource not found"
        }))
        .expect("decode");
        assert_eq!(kind_from_exception(&body.kind), ErrorKind::NotFound);
        assert_eq!(body.message.as_deref(), Some("Requested resource not found"));
    }

    #[test]
    fn exception_names_round_trip() {
        for kind in [
            ErrorKind::NotFound,
            ErrorKind::AlreadyExists,
            ErrorKind::Usage,
            ErrorKind::Permission,
            ErrorKind::Throttled,
            ErrorKind::Protocol,
            ErrorKind::Internal,
        ] {
            assert_eq!(kind_from_exception(exception_name(kind)), kind);
        }
        assert_eq!(
            kind_from_exception("ProvisionedThroughputExceededException"),
            ErrorKind::Throttled
        );
    }
}
