//! Protocol messages exchanged with the sync server.
//!
//! All messages travel as UTF-8 JSON with snake_case field names:
//!
//! ```text
//! GET  /ping     <- PingResponse
//! POST /sync     -> SyncRequest        <- SyncResponse
//! POST /confirm  -> SyncConfirmation   <- (status only)
//! ```

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::{instant, AppMapping, IdentifierPreset, SyncConfig, Token, WireError};

/// The only protocol version this client speaks.
pub const SYNC_PROTOCOL_VERSION: u32 = 1;

/// Content type sent with every JSON body.
pub const CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// JSON encoding shared by every wire message.
///
/// Decoding is all-or-nothing: a malformed payload is an error, never a
/// partially populated message.
pub trait WireMessage: Serialize + DeserializeOwned {
    /// Serialize to JSON bytes.
    fn to_bytes(&self) -> Result<Vec<u8>, WireError> {
        serde_json::to_vec(self).map_err(WireError::Encode)
    }

    /// Deserialize from JSON bytes.
    fn from_bytes(bytes: &[u8]) -> Result<Self, WireError> {
        serde_json::from_slice(bytes).map_err(WireError::Decode)
    }
}

/// Body of `GET /ping`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingResponse {
    /// Protocol version announced by the server.
    pub pwm_sync_version: u32,
}

impl PingResponse {
    /// Whether the server speaks [`SYNC_PROTOCOL_VERSION`].
    pub fn is_valid(&self) -> bool {
        self.pwm_sync_version == SYNC_PROTOCOL_VERSION
    }
}

impl WireMessage for PingResponse {}

/// Body of `POST /sync`: the client's full preset set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRequest {
    /// User token.
    pub token: Token,
    /// Server time of the last successful sync (epoch when never).
    #[serde(with = "instant")]
    pub last_sync: DateTime<Utc>,
    /// Whether app mappings are included.
    pub include_apps: bool,
    /// Every locally stored preset.
    pub idents: Vec<IdentifierPreset>,
    /// Every locally stored app mapping.
    pub apps: Vec<AppMapping>,
}

impl SyncRequest {
    /// Build a request from the stored config and a full local snapshot.
    pub fn new(config: &SyncConfig, idents: Vec<IdentifierPreset>, apps: Vec<AppMapping>) -> Self {
        Self {
            token: config.token.clone(),
            last_sync: config.last_sync,
            include_apps: true,
            idents,
            apps,
        }
    }
}

impl WireMessage for SyncRequest {}

/// Body returned by `POST /sync`: what the client must change locally.
///
/// Absent lists decode as empty. `uuid`, `token` and `sync_time` are
/// required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResponse {
    /// Server-side exchange id, echoed in the confirmation.
    pub uuid: String,
    /// User token.
    pub token: Token,
    /// Server time of this exchange; becomes the new `last_sync`.
    #[serde(with = "instant")]
    pub sync_time: DateTime<Utc>,
    /// Presets to upsert.
    #[serde(default)]
    pub changed_idents: Vec<IdentifierPreset>,
    /// App mappings to upsert.
    #[serde(default)]
    pub changed_apps: Vec<AppMapping>,
    /// Identifiers to delete.
    #[serde(default)]
    pub deleted_idents: Vec<String>,
    /// Packages to delete.
    #[serde(default)]
    pub deleted_apps: Vec<String>,
}

impl SyncResponse {
    /// The confirmation that commits this exchange on the server.
    pub fn confirmation(&self) -> SyncConfirmation {
        SyncConfirmation {
            uuid: self.uuid.clone(),
            token: self.token.clone(),
            sync_time: self.sync_time,
        }
    }

    /// Reject responses that would violate store invariants.
    ///
    /// Every changed record must carry a non-empty key. Checked before the
    /// exchange is confirmed, so a bad response is never committed.
    pub fn validate(&self) -> Result<(), WireError> {
        if let Some(preset) = self.changed_idents.iter().find(|p| p.identifier.is_empty()) {
            return Err(WireError::InvalidData(format!(
                "changed preset with empty identifier (iter {})",
                preset.iteration
            )));
        }
        if self.changed_apps.iter().any(|a| a.pkg.is_empty() || a.identifier.is_empty()) {
            return Err(WireError::InvalidData(
                "changed app mapping with empty package or identifier".into(),
            ));
        }
        Ok(())
    }

    /// Whether applying this response leaves the local rows untouched.
    pub fn is_noop(&self) -> bool {
        self.changed_idents.is_empty()
            && self.changed_apps.is_empty()
            && self.deleted_idents.is_empty()
            && self.deleted_apps.is_empty()
    }
}

impl WireMessage for SyncResponse {}

/// Body of `POST /confirm`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfirmation {
    /// Exchange id from the response.
    pub uuid: String,
    /// User token.
    pub token: Token,
    /// Server time from the response.
    #[serde(with = "instant")]
    pub sync_time: DateTime<Utc>,
}

impl WireMessage for SyncConfirmation {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_response() -> SyncResponse {
        SyncResponse {
            uuid: "7d4f1c7e-3b8a-4a53-9a51-3f0e8c1b2a90".into(),
            token: Token::new("tok"),
            sync_time: Utc.timestamp_opt(1_717_000_000, 5_000_000).unwrap(),
            changed_idents: vec![IdentifierPreset::new("example.com", 1, "!#", true)],
            changed_apps: vec![AppMapping::new("org.example", "example.com")],
            deleted_idents: vec!["old.example".into()],
            deleted_apps: vec!["org.old".into()],
        }
    }

    // ===========================================
    // Ping
    // ===========================================

    #[test]
    fn ping_version_one_is_valid() {
        let ping = PingResponse::from_bytes(br#"{"pwm_sync_version":1}"#).unwrap();
        assert!(ping.is_valid());
    }

    #[test]
    fn ping_other_versions_are_invalid() {
        for body in [r#"{"pwm_sync_version":0}"#, r#"{"pwm_sync_version":2}"#] {
            let ping = PingResponse::from_bytes(body.as_bytes()).unwrap();
            assert!(!ping.is_valid());
        }
    }

    #[test]
    fn ping_missing_or_mistyped_version_fails_to_decode() {
        assert!(PingResponse::from_bytes(b"{}").is_err());
        assert!(PingResponse::from_bytes(br#"{"pwm_sync_version":"1"}"#).is_err());
        assert!(PingResponse::from_bytes(br#"{"pwm_sync_version":-1}"#).is_err());
        assert!(PingResponse::from_bytes(b"<html>").is_err());
    }

    // ===========================================
    // Request
    // ===========================================

    #[test]
    fn request_uses_snake_case_fields() {
        let config = SyncConfig::new("sync.example.com", 443, "tok");
        let request = SyncRequest::new(
            &config,
            vec![IdentifierPreset::new("example.com", 3, "$", false)],
            vec![],
        );
        let value: serde_json::Value = serde_json::from_slice(&request.to_bytes().unwrap()).unwrap();

        assert_eq!(value["token"], "tok");
        assert_eq!(value["last_sync"], "1970-01-01T00:00:00Z");
        assert_eq!(value["include_apps"], true);
        assert_eq!(value["idents"][0]["ident"], "example.com");
        assert_eq!(value["idents"][0]["iter"], 3);
        assert!(value["apps"].as_array().unwrap().is_empty());
    }

    #[test]
    fn request_carries_last_sync_from_config() {
        let mut config = SyncConfig::new("sync.example.com", 443, "tok");
        config.last_sync = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let request = SyncRequest::new(&config, vec![], vec![]);
        assert_eq!(request.last_sync, config.last_sync);
    }

    // ===========================================
    // Response
    // ===========================================

    #[test]
    fn response_decodes_server_payload() {
        let body = br#"{
            "uuid": "abc",
            "token": "tok",
            "sync_time": "2024-05-29T16:26:40.005Z",
            "changed_idents": [
                {"ident":"example.com","iter":4,"symbols":"!","longpw":false,"timestamp":"2024-05-29T16:00:00Z"}
            ],
            "changed_apps": [
                {"pkg":"org.example","ident":"example.com","timestamp":"2024-05-29T16:00:00Z"}
            ],
            "deleted_idents": ["gone.example"],
            "deleted_apps": []
        }"#;
        let response = SyncResponse::from_bytes(body).unwrap();

        assert_eq!(response.uuid, "abc");
        assert_eq!(instant::format(&response.sync_time), "2024-05-29T16:26:40.005Z");
        assert_eq!(response.changed_idents[0].iteration, 4);
        assert!(!response.changed_idents[0].long_mode);
        assert_eq!(response.changed_apps[0].pkg, "org.example");
        assert_eq!(response.deleted_idents, vec!["gone.example".to_string()]);
        assert!(response.deleted_apps.is_empty());
    }

    #[test]
    fn response_missing_lists_default_to_empty() {
        let body = br#"{"uuid":"u","token":"t","sync_time":"2024-01-01T00:00:00Z"}"#;
        let response = SyncResponse::from_bytes(body).unwrap();
        assert!(response.is_noop());
    }

    #[test]
    fn response_missing_scalars_fails() {
        assert!(SyncResponse::from_bytes(br#"{"token":"t","sync_time":"2024-01-01T00:00:00Z"}"#).is_err());
        assert!(SyncResponse::from_bytes(br#"{"uuid":"u","token":"t"}"#).is_err());
        assert!(SyncResponse::from_bytes(b"null").is_err());
    }

    #[test]
    fn response_with_bad_nested_record_fails_entirely() {
        let body = br#"{
            "uuid":"u","token":"t","sync_time":"2024-01-01T00:00:00Z",
            "changed_idents":[{"ident":"a.b","iter":1,"symbols":"!","longpw":true,"timestamp":"not a time"}]
        }"#;
        assert!(matches!(SyncResponse::from_bytes(body), Err(WireError::Decode(_))));
    }

    #[test]
    fn validate_rejects_empty_keys() {
        assert!(sample_response().validate().is_ok());

        let mut response = sample_response();
        response.changed_idents.push(IdentifierPreset::new("", 1, "!", true));
        assert!(matches!(response.validate(), Err(WireError::InvalidData(_))));

        let mut response = sample_response();
        response.changed_apps.push(AppMapping::new("", "example.com"));
        assert!(response.validate().is_err());
    }

    // ===========================================
    // Confirmation
    // ===========================================

    #[test]
    fn confirmation_echoes_uuid_and_sync_time() {
        let response = sample_response();
        let confirmation = response.confirmation();

        assert_eq!(confirmation.uuid, response.uuid);
        assert_eq!(confirmation.sync_time, response.sync_time);
        assert_eq!(confirmation.token, response.token);

        let value: serde_json::Value =
            serde_json::from_slice(&confirmation.to_bytes().unwrap()).unwrap();
        assert_eq!(value["sync_time"], "2024-05-29T16:26:40.005Z");
        assert_eq!(value.as_object().unwrap().len(), 3);
    }

    #[test]
    fn response_survives_encode_decode_with_full_precision() {
        let response = sample_response();
        let restored = SyncResponse::from_bytes(&response.to_bytes().unwrap()).unwrap();
        assert_eq!(restored, response);
    }

    #[test]
    fn debug_output_never_contains_token() {
        let mut response = sample_response();
        response.token = Token::new("super-secret-token");
        assert!(!format!("{:?}", response).contains("super-secret-token"));
        assert!(!format!("{:?}", response.confirmation()).contains("super-secret-token"));
    }
}
