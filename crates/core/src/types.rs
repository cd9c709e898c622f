use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const PROFILE_FUNCTION_NAME: &str = "fill_user_profile";

pub const PROFILE_SYSTEM_PROMPT: &str = "You extract user profile details from free text. \
Call fill_user_profile with whatever you can find and leave unknown fields out.";

/// Profile record collected by the form. Every field is optional and unvalidated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct UserProfile {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub age: Option<i32>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<Address>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Address {
    #[serde(default)]
    pub street: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

impl UserProfile {
    /// Function-call descriptor asking the model to return a profile as arguments.
    pub fn function_schema() -> Value {
        json!({
            "name": PROFILE_FUNCTION_NAME,
            "description": "Fill in the user's profile from whatever the user said about themselves.",
            "parameters": {
                "type": "object",
                "properties": {
                    "name": { "type": "string", "description": "Full name" },
                    "age": { "type": "integer", "description": "Age in years" },
                    "email": { "type": "string", "description": "Email address" },
                    "address": {
                        "type": "object",
                        "properties": {
                            "street": { "type": "string" },
                            "city": { "type": "string" },
                            "country": { "type": "string" }
                        }
                    }
                }
            }
        })
    }

    /// Field-by-field merge: values already present in `self` win over `other`.
    pub fn merge(self, other: UserProfile) -> UserProfile {
        let address = match (self.address, other.address) {
            (Some(mine), Some(theirs)) => Some(mine.merge(theirs)),
            (mine, theirs) => mine.or(theirs),
        };

        UserProfile {
            name: self.name.or(other.name),
            age: self.age.or(other.age),
            email: self.email.or(other.email),
            address,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.age.is_none()
            && self.email.is_none()
            && self.address.as_ref().map_or(true, Address::is_empty)
    }
}

impl Address {
    pub fn merge(self, other: Address) -> Address {
        Address {
            street: self.street.or(other.street),
            city: self.city.or(other.city),
            country: self.country.or(other.country),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.street.is_none() && self.city.is_none() && self.country.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_deserialize_as_none() {
        let profile: UserProfile = serde_json::from_str(r#"{"name":"Ann","extra":true}"#).unwrap();
        assert_eq!(profile.name.as_deref(), Some("Ann"));
        assert_eq!(profile.age, None);
        assert_eq!(profile.address, None);
        assert!(!profile.is_empty());
        assert!(UserProfile::default().is_empty());
    }

    #[test]
    fn merge_keeps_existing_values() {
        let typed = UserProfile {
            name: Some("Ann".into()),
            address: Some(Address {
                city: Some("Oslo".into()),
                ..Address::default()
            }),
            ..UserProfile::default()
        };
        let suggested = UserProfile {
            name: Some("Anne".into()),
            age: Some(30),
            email: None,
            address: Some(Address {
                street: Some("Storgata 1".into()),
                city: Some("Bergen".into()),
                country: Some("Norway".into()),
            }),
        };

        let merged = typed.merge(suggested);
        assert_eq!(merged.name.as_deref(), Some("Ann"));
        assert_eq!(merged.age, Some(30));
        let address = merged.address.unwrap();
        assert_eq!(address.city.as_deref(), Some("Oslo"));
        assert_eq!(address.street.as_deref(), Some("Storgata 1"));
        assert_eq!(address.country.as_deref(), Some("Norway"));
    }

    #[test]
    fn function_schema_names_every_field() {
        let schema = UserProfile::function_schema();
        assert_eq!(schema["name"], PROFILE_FUNCTION_NAME);
        let properties = &schema["parameters"]["properties"];
        for field in ["name", "age", "email", "address"] {
            assert!(properties.get(field).is_some(), "missing {field}");
        }
    }
}
