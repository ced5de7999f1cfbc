//! Named convenience actions on top of [`BridgeClient`].
//!
//! Each builds a parameter mapping and waits for the response with the
//! client's default timeout.

use std::str::FromStr;

use serde_json::{Value, json};

use crate::bridge::protocol::Params;
use crate::bridge::store::Mailbox;
use crate::client::{BridgeClient, Reply};
use crate::error::Result;

pub const CREATE_OBJECT: &str = "createObject";
pub const DELETE_OBJECT: &str = "deleteObject";
pub const GET_SCENE_INFO: &str = "getSceneInfo";

/// Object type understood by the executor. Unknown names pass through as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ObjectKind {
    #[default]
    Empty,
    Cube,
    Sphere,
    Plane,
    Cylinder,
    Capsule,
    Custom(String),
}

impl ObjectKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Empty => "empty",
            Self::Cube => "cube",
            Self::Sphere => "sphere",
            Self::Plane => "plane",
            Self::Cylinder => "cylinder",
            Self::Capsule => "capsule",
            Self::Custom(name) => name,
        }
    }
}

impl From<&str> for ObjectKind {
    fn from(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "empty" => Self::Empty,
            "cube" => Self::Cube,
            "sphere" => Self::Sphere,
            "plane" => Self::Plane,
            "cylinder" => Self::Cylinder,
            "capsule" => Self::Capsule,
            _ => Self::Custom(name.to_string()),
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// World position `[x, y, z]`.
///
/// Integer coordinates stay integers on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct Position([Value; 3]);

impl Position {
    fn to_value(&self) -> Value {
        Value::Array(self.0.to_vec())
    }
}

impl From<[i64; 3]> for Position {
    fn from([x, y, z]: [i64; 3]) -> Self {
        Self([json!(x), json!(y), json!(z)])
    }
}

impl TryFrom<[f64; 3]> for Position {
    type Error = String;

    /// Fails on NaN or infinite coordinates, which JSON cannot carry.
    fn try_from(coords: [f64; 3]) -> std::result::Result<Self, Self::Error> {
        if let Some(bad) = coords.iter().find(|c| !c.is_finite()) {
            return Err(format!("invalid coordinate '{bad}'"));
        }
        let [x, y, z] = coords;
        Ok(Self([json!(x), json!(y), json!(z)]))
    }
}

impl FromStr for Position {
    type Err = String;

    /// Parse `"x,y,z"`.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        let [x, y, z] = parts.as_slice() else {
            return Err(format!("expected three comma-separated numbers, got '{s}'"));
        };

        let coord = |part: &str| -> std::result::Result<Value, String> {
            if let Ok(n) = part.parse::<i64>() {
                return Ok(json!(n));
            }
            match part.parse::<f64>() {
                Ok(f) if f.is_finite() => Ok(json!(f)),
                _ => Err(format!("invalid coordinate '{part}'")),
            }
        };

        Ok(Self([coord(*x)?, coord(*y)?, coord(*z)?]))
    }
}

impl<M: Mailbox> BridgeClient<M> {
    /// Create a named object, optionally placed and with extra components.
    ///
    /// `position` and `components` are only sent when given and non-empty.
    pub async fn create_object(
        &self,
        name: &str,
        kind: ObjectKind,
        position: Option<Position>,
        components: &[&str],
    ) -> Result<Reply> {
        let mut params = Params::new();
        params.insert("name".into(), json!(name));
        params.insert("type".into(), json!(kind.as_str()));
        if let Some(position) = position {
            params.insert("position".into(), position.to_value());
        }
        if !components.is_empty() {
            params.insert("components".into(), json!(components));
        }

        self.request(CREATE_OBJECT, params).await
    }

    pub async fn delete_object(&self, name: &str) -> Result<Reply> {
        let mut params = Params::new();
        params.insert("name".into(), json!(name));
        self.request(DELETE_OBJECT, params).await
    }

    pub async fn get_scene_info(&self) -> Result<Reply> {
        self.request(GET_SCENE_INFO, Params::new()).await
    }
}
