use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};

/// A worklist item: one package as known to the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageEntry {
    #[serde(default, deserialize_with = "lenient_name")]
    pub name: String,

    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub repository: Option<Repository>,

    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl PackageEntry {
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Whether the entry carries a usable package name.
    #[must_use]
    pub fn has_name(&self) -> bool {
        !self.name.trim().is_empty()
    }
}

/// A package's repository descriptor.
///
/// The registry stores an object `{type, url}`, a bare shorthand string, or in older
/// documents a list of either (the first one wins). Shorthands have no type and are
/// therefore never treated as git repositories.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawRepository")]
pub struct Repository {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawRepository {
    Shorthand(String),
    Several(Vec<RawRepository>),
    Descriptor {
        #[serde(rename = "type", default, deserialize_with = "lenient")]
        kind: Option<String>,
        #[serde(default, deserialize_with = "lenient")]
        url: Option<String>,
    },
}

impl From<RawRepository> for Repository {
    fn from(raw: RawRepository) -> Self {
        match raw {
            RawRepository::Descriptor { kind, url } => Self { kind, url },
            RawRepository::Shorthand(url) => Self { kind: None, url: Some(url) },
            RawRepository::Several(all) => all.into_iter().next().map(Self::from).unwrap_or_default(),
        }
    }
}

/// Deserialize an optional field, reading a value of an unexpected shape as absent.
///
/// Registry data is loosely typed; one odd field must not cost the whole document.
pub fn lenient<'de, D, V>(deserializer: D) -> Result<Option<V>, D::Error>
where
    D: Deserializer<'de>,
    V: Deserialize<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Shape<T> {
        Expected(T),
        Other(IgnoredAny),
    }

    Ok(match Option::<Shape<V>>::deserialize(deserializer)? {
        Some(Shape::Expected(value)) => Some(value),
        Some(Shape::Other(_)) | None => None,
    })
}

fn lenient_name<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    lenient::<D, String>(deserializer).map(Option::unwrap_or_default)
}
