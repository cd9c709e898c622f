//! Best-effort extraction of a typed payload from a chat-completion response.
//!
//! Every failure collapses into `None`. Callers treat the model boundary as
//! unreliable and never see a decode error.

use serde::de::value::{MapDeserializer, SeqDeserializer};
use serde::de::{DeserializeOwned, Deserializer, IntoDeserializer, Visitor};
use serde::forward_to_deserialize_any;
use serde_json::{Map, Value};
use tracing::debug;

/// Pulls `T` out of the first choice of a completion response.
///
/// `function_call.arguments` wins when present. If it fails to decode, the
/// free-text `content` is not consulted.
pub fn extract_structured<T>(response: &Value) -> Option<T>
where
    T: DeserializeOwned,
{
    let first = response.get("choices")?.as_array()?.first()?;
    let message = first.get("message")?;

    if let Some(arguments) = message
        .get("function_call")
        .and_then(|call| call.get("arguments"))
    {
        return match arguments {
            Value::String(raw) => match serde_json::from_str::<Value>(raw) {
                Ok(parsed) => decode(parsed, "function_call"),
                Err(err) => {
                    debug!(error = %err, "function_call.arguments is not valid JSON");
                    None
                }
            },
            other => decode(other.clone(), "function_call"),
        };
    }

    let content = message.get("content")?.as_str()?;
    let Some(span) = extract_json_span(content) else {
        debug!("assistant content carries no JSON object");
        return None;
    };

    match serde_json::from_str::<Value>(span) {
        Ok(parsed) => decode(parsed, "content"),
        Err(err) => {
            debug!(error = %err, "JSON span in assistant content is malformed");
            None
        }
    }
}

/// Slice from the first `{` to the last `}`, inclusive.
pub fn extract_json_span(text: &str) -> Option<&str> {
    if text.trim().is_empty() {
        return None;
    }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(&text[start..=end])
}

fn decode<T>(value: Value, source: &'static str) -> Option<T>
where
    T: DeserializeOwned,
{
    match T::deserialize(CaseInsensitive(value)) {
        Ok(decoded) => Some(decoded),
        Err(err) => {
            debug!(source, error = %err, "payload does not match target shape");
            None
        }
    }
}

/// Deserializer over a JSON value that matches struct fields ignoring case.
///
/// Object keys are only rewritten where a struct declares its fields, so
/// `Value` and map targets see the keys exactly as the model sent them.
struct CaseInsensitive(Value);

impl<'de> IntoDeserializer<'de, serde_json::Error> for CaseInsensitive {
    type Deserializer = Self;

    fn into_deserializer(self) -> Self {
        self
    }
}

impl<'de> Deserializer<'de> for CaseInsensitive {
    type Error = serde_json::Error;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        match self.0 {
            Value::Array(items) => {
                visitor.visit_seq(SeqDeserializer::new(items.into_iter().map(CaseInsensitive)))
            }
            Value::Object(map) => visitor.visit_map(MapDeserializer::new(
                map.into_iter().map(|(key, inner)| (key, CaseInsensitive(inner))),
            )),
            other => other.deserialize_any(visitor),
        }
    }

    fn deserialize_option<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        match self.0 {
            Value::Null => visitor.visit_none(),
            other => visitor.visit_some(CaseInsensitive(other)),
        }
    }

    fn deserialize_newtype_struct<V>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_struct<V>(
        self,
        _name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        match self.0 {
            Value::Object(map) => visitor.visit_map(MapDeserializer::new(
                match_fields(map, fields)
                    .into_iter()
                    .map(|(key, inner)| (key, CaseInsensitive(inner))),
            )),
            other => CaseInsensitive(other).deserialize_any(visitor),
        }
    }

    fn deserialize_enum<V>(
        self,
        name: &'static str,
        variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        self.0.deserialize_enum(name, variants, visitor)
    }

    forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf unit unit_struct seq tuple tuple_struct map identifier ignored_any
    }
}

/// Renames keys to the declared field they match ignoring case.
/// An exact key beats a case variant; among variants the first one in map order wins.
/// Keys matching no field pass through unchanged.
fn match_fields(map: Map<String, Value>, fields: &[&'static str]) -> Map<String, Value> {
    let mut matched = Map::with_capacity(map.len());
    let mut variants = Vec::new();

    for (key, inner) in map {
        if fields.contains(&key.as_str()) {
            matched.insert(key, inner);
        } else {
            variants.push((key, inner));
        }
    }

    for (key, inner) in variants {
        let folded = key.to_lowercase();
        let target = fields
            .iter()
            .find(|field| field.to_lowercase() == folded)
            .map(|field| field.to_string())
            .unwrap_or(key);
        matched.entry(target).or_insert(inner);
    }

    matched
}
