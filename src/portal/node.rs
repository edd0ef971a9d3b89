//! Remote nodes returned by the portal's list API.

use serde::{Deserialize, Deserializer};

/// Kind of a remote node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// A leaf file that can be downloaded.
    File,
    /// A directory whose children are listed with another list call.
    Dir,
    /// Any type this client does not understand.
    #[serde(other)]
    Unknown,
}

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteNode {
    /// Opaque remote identifier used for listing and downloading.
    #[serde(deserialize_with = "string_or_number")]
    pub code: String,
    /// Display name, also used as the archive entry name.
    #[serde(default)]
    pub name: String,
    /// Whether the node is a file or a directory.
    #[serde(rename = "type")]
    pub kind: NodeKind,
    /// Size in bytes, meaningful only for files.
    #[serde(default, deserialize_with = "lenient_size")]
    pub size: u64,
    /// External reference: never traversed, counted or downloaded.
    #[serde(default, deserialize_with = "lenient_bool")]
    pub link: bool,
}

impl RemoteNode {
    /// Creates a directory node, typically the root of a sync run.
    #[must_use]
    pub fn dir(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            kind: NodeKind::Dir,
            size: 0,
            link: false,
        }
    }

    /// Creates a file node.
    #[must_use]
    pub fn file(code: impl Into<String>, name: impl Into<String>, size: u64) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            kind: NodeKind::File,
            size,
            link: false,
        }
    }

    /// Marks the node as an external link.
    #[must_use]
    pub fn as_link(mut self) -> Self {
        self.link = true;
        self
    }
}

/// Body of a successful list call.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ListBody {
    #[serde(default)]
    pub(crate) result: Vec<RemoteNode>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Unsigned(u64),
    Float(f64),
    Flag(bool),
    Null,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Scalar::deserialize(deserializer)? {
        Scalar::Text(text) => Ok(text),
        Scalar::Unsigned(value) => Ok(value.to_string()),
        Scalar::Float(value) => Ok(value.to_string()),
        Scalar::Flag(_) | Scalar::Null => Err(serde::de::Error::custom(
            "node code must be a string or a number",
        )),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn lenient_size<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Scalar::deserialize(deserializer)? {
        Scalar::Unsigned(value) => value,
        Scalar::Float(value) if value.is_finite() && value > 0.0 => value as u64,
        Scalar::Text(text) => text.trim().parse().unwrap_or(0),
        Scalar::Float(_) | Scalar::Flag(_) | Scalar::Null => 0,
    })
}

fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Scalar::deserialize(deserializer)? {
        Scalar::Flag(flag) => flag,
        Scalar::Unsigned(value) => value != 0,
        Scalar::Float(value) => value != 0.0,
        Scalar::Text(text) => matches!(text.trim(), "true" | "1"),
        Scalar::Null => false,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_list_body_parses_mixed_listing() {
        let body: ListBody = serde_json::from_str(
            r#"{"result":[
                {"code":"101","name":"slides.pdf","type":"file","size":2048,"link":false},
                {"code":77,"name":"Labs","type":"dir"},
                {"code":"9","name":"Moodle","type":"file","size":0,"link":true}
            ]}"#,
        )
        .unwrap();

        assert_eq!(body.result.len(), 3);
        assert_eq!(body.result[0], RemoteNode::file("101", "slides.pdf", 2048));
        assert_eq!(body.result[1], RemoteNode::dir("77", "Labs"));
        assert!(body.result[2].link);
    }

    #[test]
    fn test_list_body_missing_result_is_empty() {
        let body: ListBody = serde_json::from_str("{}").unwrap();
        assert!(body.result.is_empty());
    }

    #[test]
    fn test_node_unknown_type_maps_to_unknown() {
        let node: RemoteNode =
            serde_json::from_str(r#"{"code":"1","name":"x","type":"shortcut"}"#).unwrap();
        assert_eq!(node.kind, NodeKind::Unknown);
    }

    #[test]
    fn test_node_size_accepts_numeric_string() {
        let node: RemoteNode =
            serde_json::from_str(r#"{"code":"1","name":"a","type":"file","size":"512"}"#).unwrap();
        assert_eq!(node.size, 512);
    }

    #[test]
    fn test_node_link_accepts_integer_flag() {
        let node: RemoteNode =
            serde_json::from_str(r#"{"code":"1","name":"a","type":"file","link":1}"#).unwrap();
        assert!(node.link);
    }

    #[test]
    fn test_node_code_rejects_null() {
        let result =
            serde_json::from_str::<RemoteNode>(r#"{"code":null,"name":"a","type":"file"}"#);
        assert!(result.is_err());
    }
}
