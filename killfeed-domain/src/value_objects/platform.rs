// Platform value object

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Platform {
    Pc,
    PlayStation,
    Xbox,
    #[default]
    Unknown,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Pc => "PC",
            Platform::PlayStation => "PlayStation",
            Platform::Xbox => "Xbox",
            Platform::Unknown => "Unknown",
        }
    }

    /// Parses the prefix of a `platformid=PS5:...` style value.
    pub fn from_platform_tag(tag: &str) -> Self {
        let tag = tag.trim();
        if tag.is_empty() {
            return Platform::Unknown;
        }
        let prefix = tag.split(':').next().unwrap_or("").to_uppercase();
        match prefix.as_str() {
            "PS5" | "PS4" | "PSN" => Platform::PlayStation,
            "XSX" | "XBOX" | "XB1" | "XBL" => Platform::Xbox,
            "" => Platform::Unknown,
            _ => Platform::Pc,
        }
    }
}

impl From<&str> for Platform {
    fn from(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "pc" => Platform::Pc,
            "playstation" => Platform::PlayStation,
            "xbox" => Platform::Xbox,
            "unknown" | "" => Platform::Unknown,
            other => Platform::from_platform_tag(other),
        }
    }
}
