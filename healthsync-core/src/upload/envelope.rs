//! oneM2M content instance envelope

use serde::Serialize;

use crate::error::Result;

/// Content type for creating a content instance (resource type 4)
pub const CONTENT_TYPE: &str = "application/vnd.onem2m-res+json; ty=4";

/// Request body wrapping a chunk payload as a single string field
#[derive(Debug, Serialize)]
pub struct ContentInstance<'a> {
    #[serde(rename = "m2m:cin")]
    pub cin: Content<'a>,
}

#[derive(Debug, Serialize)]
pub struct Content<'a> {
    pub con: &'a str,
}

impl<'a> ContentInstance<'a> {
    pub fn new(payload: &'a str) -> Self {
        Self {
            cin: Content { con: payload },
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_embeds_payload_verbatim() {
        let payload = "1714550400,1714551000,iPhone,120,1714551000,1714551600,Watch,-1";
        let json = ContentInstance::new(payload).to_json().unwrap();
        assert_eq!(json, format!(r#"{{"m2m:cin":{{"con":"{}"}}}}"#, payload));
    }

    #[test]
    fn test_envelope_escapes_quotes() {
        let json = ContentInstance::new(r#"1,2,Bob's "Watch",3"#).to_json().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["m2m:cin"]["con"], r#"1,2,Bob's "Watch",3"#);
    }
}
