//! Operation parameters and type-tagged values.
//!
//! Kurento disambiguates polymorphic parameters with two discriminator keys
//! placed next to the value's own fields:
//!
//! ```text
//! {"__module__":"kurento","__type__":"IceCandidate",
//!  "candidate":"...","sdpMid":"0","sdpMLineIndex":0}
//! ```
//!
//! [`ParamValue::Typed`] holds such a value; the discriminators are produced
//! from [`RemoteType`] constants and are never written by hand.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::KURENTO_MODULE;
use crate::error::{ProtocolError, ProtocolResult};

/// Key carrying the type name of a tagged value.
pub const TYPE_KEY: &str = "__type__";

/// Key carrying the module of a tagged value.
pub const MODULE_KEY: &str = "__module__";

/// A complex server-side type that must be sent with discriminators.
pub trait RemoteType: Serialize {
    /// Module that defines the type (e.g. `kurento`).
    const MODULE: &'static str;
    /// Type name as known by the server (e.g. `IceCandidate`).
    const TYPE_NAME: &'static str;
}

/// A value carrying `__module__` / `__type__` discriminators.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedValue {
    module: String,
    type_name: String,
    fields: Map<String, Value>,
}

impl TypedValue {
    /// Builds a tagged value from a [`RemoteType`].
    ///
    /// The type must serialize to a JSON object.
    pub fn from_remote<T: RemoteType>(value: &T) -> ProtocolResult<Self> {
        match serde_json::to_value(value)? {
            Value::Object(fields) => Ok(Self {
                module: T::MODULE.to_string(),
                type_name: T::TYPE_NAME.to_string(),
                fields,
            }),
            other => Err(ProtocolError::invalid_param(
                T::TYPE_NAME,
                format!("expected an object, got {other}"),
            )),
        }
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Whether this value is tagged as `T`.
    pub fn is<T: RemoteType>(&self) -> bool {
        self.module == T::MODULE && self.type_name == T::TYPE_NAME
    }

    /// Decodes the fields back into `T` after checking the discriminators.
    pub fn decode<T: RemoteType + DeserializeOwned>(&self) -> ProtocolResult<T> {
        if !self.is::<T>() {
            return Err(ProtocolError::invalid_param(
                T::TYPE_NAME,
                format!("value is tagged {}.{}", self.module, self.type_name),
            ));
        }
        Ok(serde_json::from_value(Value::Object(self.fields.clone()))?)
    }

    fn from_object(mut object: Map<String, Value>) -> Result<Self, Map<String, Value>> {
        let tagged = matches!(object.get(TYPE_KEY), Some(Value::String(_)))
            && matches!(object.get(MODULE_KEY), Some(Value::String(_)));
        if !tagged {
            return Err(object);
        }
        let type_name = take_string(&mut object, TYPE_KEY);
        let module = take_string(&mut object, MODULE_KEY);
        Ok(Self {
            module,
            type_name,
            fields: object,
        })
    }
}

fn take_string(object: &mut Map<String, Value>, key: &str) -> String {
    match object.remove(key) {
        Some(Value::String(s)) => s,
        _ => String::new(),
    }
}

/// A single operation or constructor parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    /// Any JSON value sent as-is.
    Plain(Value),
    /// A value sent with discriminators.
    Typed(TypedValue),
}

impl ParamValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Plain(Value::Null))
    }

    pub fn as_typed(&self) -> Option<&TypedValue> {
        match self {
            Self::Typed(typed) => Some(typed),
            Self::Plain(_) => None,
        }
    }

    pub fn as_plain(&self) -> Option<&Value> {
        match self {
            Self::Plain(value) => Some(value),
            Self::Typed(_) => None,
        }
    }
}

macro_rules! plain_param_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for ParamValue {
                fn from(value: $ty) -> Self {
                    Self::Plain(Value::from(value))
                }
            }
        )*
    };
}

plain_param_from!(Value, &str, String, bool, i32, i64, u32, u64, f64);

impl Serialize for ParamValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Plain(value) => value.serialize(serializer),
            Self::Typed(typed) => {
                let mut map = serializer.serialize_map(Some(typed.fields.len() + 2))?;
                map.serialize_entry(MODULE_KEY, &typed.module)?;
                map.serialize_entry(TYPE_KEY, &typed.type_name)?;
                for (key, value) in &typed.fields {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for ParamValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Object(object) => match TypedValue::from_object(object) {
                Ok(typed) => Ok(Self::Typed(typed)),
                Err(object) => Ok(Self::Plain(Value::Object(object))),
            },
            other => Ok(Self::Plain(other)),
        }
    }
}

/// Named parameters of an operation or constructor.
///
/// Keys are kept sorted so encoded requests are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationParams(BTreeMap<String, ParamValue>);

impl OperationParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.0.iter()
    }

    /// Sets a parameter, returning the previous value.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<ParamValue>,
    ) -> Option<ParamValue> {
        self.0.insert(key.into(), value.into())
    }

    /// Builder: set a plain parameter.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Builder: set a tagged parameter from a [`RemoteType`].
    pub fn with_typed<T: RemoteType>(
        mut self,
        key: impl Into<String>,
        value: &T,
    ) -> ProtocolResult<Self> {
        let typed = TypedValue::from_remote(value)?;
        self.0.insert(key.into(), ParamValue::Typed(typed));
        Ok(self)
    }

    /// Builder: set a plain parameter from any serializable value.
    pub fn with_serialized<T: Serialize>(
        mut self,
        key: impl Into<String>,
        value: &T,
    ) -> ProtocolResult<Self> {
        let key = key.into();
        let value = serde_json::to_value(value)
            .map_err(|e| ProtocolError::invalid_param(key.clone(), e.to_string()))?;
        self.0.insert(key, ParamValue::Plain(value));
        Ok(self)
    }

    /// Overlays `overrides` onto these parameters.
    ///
    /// Keys from `overrides` replace existing ones; null overrides are ignored
    /// so they never erase a default.
    pub fn merge(&mut self, overrides: OperationParams) {
        for (key, value) in overrides.0 {
            if value.is_null() {
                continue;
            }
            self.0.insert(key, value);
        }
    }
}

impl<K: Into<String>> FromIterator<(K, ParamValue)> for OperationParams {
    fn from_iter<I: IntoIterator<Item = (K, ParamValue)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// A remote ICE candidate as exchanged during WebRTC negotiation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceCandidate {
    /// The candidate-attribute line.
    pub candidate: String,
    /// Media stream identification tag.
    #[serde(rename = "sdpMid")]
    pub sdp_mid: String,
    /// Index of the m-line the candidate belongs to.
    #[serde(rename = "sdpMLineIndex")]
    pub sdp_m_line_index: u32,
}

impl IceCandidate {
    pub fn new(
        candidate: impl Into<String>,
        sdp_mid: impl Into<String>,
        sdp_m_line_index: u32,
    ) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid: sdp_mid.into(),
            sdp_m_line_index,
        }
    }
}

impl RemoteType for IceCandidate {
    const MODULE: &'static str = KURENTO_MODULE;
    const TYPE_NAME: &'static str = "IceCandidate";
}

/// Container format used by recorder endpoints.
///
/// Enumerations travel as plain upper-case strings, without discriminators.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MediaProfileSpecType {
    #[default]
    Webm,
    Mp4,
    WebmVideoOnly,
    WebmAudioOnly,
    Mp4VideoOnly,
    Mp4AudioOnly,
    JpegVideoOnly,
    KurentoSplitRecorder,
}

impl MediaProfileSpecType {
    /// Name of the profile on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Webm => "WEBM",
            Self::Mp4 => "MP4",
            Self::WebmVideoOnly => "WEBM_VIDEO_ONLY",
            Self::WebmAudioOnly => "WEBM_AUDIO_ONLY",
            Self::Mp4VideoOnly => "MP4_VIDEO_ONLY",
            Self::Mp4AudioOnly => "MP4_AUDIO_ONLY",
            Self::JpegVideoOnly => "JPEG_VIDEO_ONLY",
            Self::KurentoSplitRecorder => "KURENTO_SPLIT_RECORDER",
        }
    }
}

impl From<MediaProfileSpecType> for ParamValue {
    fn from(profile: MediaProfileSpecType) -> Self {
        Self::Plain(Value::from(profile.as_str()))
    }
}
