use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub i64);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(UserId);
id_newtype!(ListId);
id_newtype!(TierId);
id_newtype!(ItemId);

/// Start-of-gradient tokens a tier may use.
pub const COLOR_FROM_TOKENS: &[&str] = &[
    "rose-500",
    "orange-500",
    "yellow-400",
    "lime-400",
    "cyan-400",
    "blue-400",
    "purple-400",
    "gray-500",
];

/// End-of-gradient tokens a tier may use.
pub const COLOR_TO_TOKENS: &[&str] = &[
    "pink-600",
    "amber-600",
    "yellow-600",
    "green-600",
    "blue-600",
    "indigo-600",
    "violet-600",
    "gray-600",
];

const FALLBACK_RGB: &str = "107 114 128";

/// Space-separated RGB triplet for a palette token. Unknown tokens fall back to gray.
pub fn palette_rgb(token: &str) -> &'static str {
    match token {
        "rose-500" => "244 63 94",
        "pink-600" => "219 39 119",
        "orange-500" => "249 115 22",
        "amber-600" => "217 119 6",
        "yellow-400" => "250 204 21",
        "yellow-600" => "202 138 4",
        "lime-400" => "163 230 53",
        "green-600" => "22 163 74",
        "cyan-400" => "34 211 238",
        "blue-400" => "96 165 250",
        "blue-600" => "37 99 235",
        "indigo-600" => "79 70 229",
        "purple-400" => "192 132 252",
        "violet-600" => "124 58 237",
        "gray-500" => "107 114 128",
        "gray-600" => "75 85 99",
        _ => FALLBACK_RGB,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TierColor {
    pub from: String,
    pub to: String,
}

impl TierColor {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn is_in_palette(&self) -> bool {
        COLOR_FROM_TOKENS.contains(&self.from.as_str()) && COLOR_TO_TOKENS.contains(&self.to.as_str())
    }

    /// CSS `linear-gradient` value for rendering a tier header.
    pub fn css_gradient(&self) -> String {
        format!(
            "linear-gradient(to right, rgb({}), rgb({}))",
            palette_rgb(&self.from),
            palette_rgb(&self.to)
        )
    }
}

impl Default for TierColor {
    fn default() -> Self {
        Self::new("gray-500", "gray-600")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierList {
    pub id: ListId,
    pub owner_id: UserId,
    pub title: String,
    pub is_completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tier {
    pub id: TierId,
    pub list_id: ListId,
    pub name: String,
    pub position: u32,
    pub color_from: String,
    pub color_to: String,
}

impl Tier {
    pub fn color(&self) -> TierColor {
        TierColor::new(self.color_from.clone(), self.color_to.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub list_id: ListId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub position: u32,
    pub tier: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: UserId,
    pub email: String,
}
