use crate::error::MindmapError;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::{
    fmt,
    fs::{read_to_string, write},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

pub const DEFAULT_PARENT_FIELD: &str = "parent_id";
pub const DEFAULT_CHILD_FIELD: &str = "child_ids";
pub const DEFAULT_NAME_FIELD: &str = "display_name";
pub const DEFAULT_COLOR_FIELD: &str = "mindmap_color";
pub const DEFAULT_LIMIT: usize = 80;
pub const DEFAULT_SEARCH_DEBOUNCE_MS: u64 = 400;
pub const DEFAULT_HOVER_DEBOUNCE_MS: u64 = 300;

/// How many tree levels the first build opens automatically.
///
/// A node at traversal depth `d` (roots are depth 1) is opened when `d < depth`, so a depth of 1
/// leaves everything collapsed except what the user opens, and 2 opens the roots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DefaultDepth(pub u32);

impl DefaultDepth {
    /// `root`: only roots are considered for auto-expansion.
    pub const ROOT: DefaultDepth = DefaultDepth(1);
    /// `leaf`, `leave`, `all`: expand everything.
    pub const ALL: DefaultDepth = DefaultDepth(999);
    /// Used for missing or unrecognized input.
    pub const FALLBACK: DefaultDepth = DefaultDepth(2);

    pub fn levels(&self) -> u32 {
        self.0
    }

    /// Parse the textual encodings. Never fails: unrecognized input becomes
    /// [`DefaultDepth::FALLBACK`].
    pub fn parse(raw: &str) -> DefaultDepth {
        match raw.trim() {
            "root" => DefaultDepth::ROOT,
            "leaf" | "leave" | "all" => DefaultDepth::ALL,
            "" => DefaultDepth::FALLBACK,
            other => other
                .parse::<u32>()
                .map(DefaultDepth)
                .unwrap_or(DefaultDepth::FALLBACK),
        }
    }
}

impl Default for DefaultDepth {
    fn default() -> Self {
        DefaultDepth::FALLBACK
    }
}

impl FromStr for DefaultDepth {
    type Err = MindmapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(DefaultDepth::parse(s))
    }
}

impl fmt::Display for DefaultDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            DefaultDepth::ROOT => write!(f, "root"),
            DefaultDepth::ALL => write!(f, "all"),
            DefaultDepth(levels) => write!(f, "{levels}"),
        }
    }
}

impl Serialize for DefaultDepth {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match *self {
            DefaultDepth::ROOT | DefaultDepth::ALL => serializer.serialize_str(&self.to_string()),
            DefaultDepth(levels) => serializer.serialize_u32(levels),
        }
    }
}

struct DepthVisitor;

impl<'de> de::Visitor<'de> for DepthVisitor {
    type Value = DefaultDepth;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(
            formatter,
            "an integer depth or one of 'root', 'leaf', 'leave', 'all'"
        )
    }

    fn visit_str<E: de::Error>(self, s: &str) -> Result<Self::Value, E> {
        Ok(DefaultDepth::parse(s))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        Ok(DefaultDepth(u32::try_from(v).unwrap_or(DefaultDepth::ALL.0)))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        match u64::try_from(v) {
            Ok(v) => self.visit_u64(v),
            Err(_) => Ok(DefaultDepth::FALLBACK),
        }
    }
}

impl<'de> Deserialize<'de> for DefaultDepth {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(DepthVisitor)
    }
}

/// Create/edit/delete rights resolved from the view flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    pub create: bool,
    pub edit: bool,
    pub delete: bool,
}

impl Default for Permissions {
    fn default() -> Self {
        Permissions {
            create: true,
            edit: true,
            delete: true,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_parent_field() -> String {
    DEFAULT_PARENT_FIELD.to_string()
}

fn default_child_field() -> String {
    DEFAULT_CHILD_FIELD.to_string()
}

fn default_name_field() -> String {
    DEFAULT_NAME_FIELD.to_string()
}

fn default_color_field() -> String {
    DEFAULT_COLOR_FIELD.to_string()
}

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

fn default_search_debounce_ms() -> u64 {
    DEFAULT_SEARCH_DEBOUNCE_MS
}

fn default_hover_debounce_ms() -> u64 {
    DEFAULT_HOVER_DEBOUNCE_MS
}

/// Everything the engine needs to know about the entity type it renders. Normally produced by an
/// upstream view/schema parser, or read from TOML through a [`ConfigProvider`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MindmapConfig {
    /// Entity type passed to every record source call.
    #[serde(default)]
    pub model: String,
    #[serde(default = "default_parent_field")]
    pub parent_field: String,
    #[serde(default = "default_child_field")]
    pub child_field: String,
    #[serde(default = "default_name_field")]
    pub name_field: String,
    #[serde(default = "default_color_field")]
    pub color_field: String,
    #[serde(default)]
    pub default_depth: DefaultDepth,
    #[serde(default)]
    pub readonly: bool,
    #[serde(default = "default_true")]
    pub create: bool,
    #[serde(default = "default_true")]
    pub edit: bool,
    #[serde(default = "default_true")]
    pub delete: bool,
    #[serde(default)]
    pub settings_view: Option<String>,
    #[serde(default)]
    pub side_panel_fields: Vec<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default = "default_search_debounce_ms")]
    pub search_debounce_ms: u64,
    #[serde(default = "default_hover_debounce_ms")]
    pub hover_debounce_ms: u64,
}

impl Default for MindmapConfig {
    fn default() -> Self {
        MindmapConfig {
            model: String::default(),
            parent_field: default_parent_field(),
            child_field: default_child_field(),
            name_field: default_name_field(),
            color_field: default_color_field(),
            default_depth: DefaultDepth::default(),
            readonly: false,
            create: true,
            edit: true,
            delete: true,
            settings_view: None,
            side_panel_fields: Vec::new(),
            limit: DEFAULT_LIMIT,
            search_debounce_ms: DEFAULT_SEARCH_DEBOUNCE_MS,
            hover_debounce_ms: DEFAULT_HOVER_DEBOUNCE_MS,
        }
    }
}

impl MindmapConfig {
    pub fn for_model(model: &str) -> Self {
        MindmapConfig {
            model: model.to_string(),
            ..Default::default()
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self, MindmapError> {
        let config: MindmapConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), MindmapError> {
        if self.parent_field.trim().is_empty() {
            return Err(MindmapError::Config(
                "parent_field must name an attribute".to_string(),
            ));
        }
        if self.parent_field == self.child_field {
            return Err(MindmapError::Config(format!(
                "parent_field and child_field are both '{}'",
                self.parent_field
            )));
        }
        Ok(())
    }

    pub fn permissions(&self) -> Permissions {
        if self.readonly {
            return Permissions {
                create: false,
                edit: false,
                delete: false,
            };
        }
        Permissions {
            create: self.create,
            edit: self.edit,
            delete: self.delete,
        }
    }

    /// The minimal attribute set requested while walking descendants.
    pub fn descendant_fields(&self) -> Vec<String> {
        vec![
            self.name_field.clone(),
            self.parent_field.clone(),
            self.color_field.clone(),
        ]
    }

    /// Attributes requested for the primary load.
    pub fn load_fields(&self) -> Vec<String> {
        let mut fields = vec![
            self.name_field.clone(),
            self.parent_field.clone(),
            self.child_field.clone(),
            self.color_field.clone(),
        ];
        for field in self.side_panel_fields.iter() {
            if !fields.contains(field) {
                fields.push(field.clone());
            }
        }
        fields
    }

    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }

    pub fn hover_debounce(&self) -> Duration {
        Duration::from_millis(self.hover_debounce_ms)
    }
}

pub trait ConfigProvider: Send + Sync {
    fn get_config(&self) -> Result<MindmapConfig, MindmapError>;
    fn set_config(&self, config: &MindmapConfig) -> Result<(), MindmapError>;
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TomlConfigProvider {
    path: PathBuf,
}

impl TomlConfigProvider {
    pub fn new(path: PathBuf) -> Self {
        TomlConfigProvider { path }
    }
}

impl ConfigProvider for TomlConfigProvider {
    fn get_config(&self) -> Result<MindmapConfig, MindmapError> {
        tracing::debug!("Attempting to read mindmap config from: {:?}", &self.path);
        if !self.path.exists() {
            tracing::debug!("Config file not found, returning default config.");
            return Ok(MindmapConfig::default());
        }
        let content = read_to_string(&self.path)?;
        MindmapConfig::from_toml_str(&content)
    }

    fn set_config(&self, config: &MindmapConfig) -> Result<(), MindmapError> {
        tracing::debug!("Attempting to write mindmap config to: {:?}", &self.path);
        config.validate()?;
        let toml_string = toml::to_string(config)?;
        write(&self.path, toml_string)?;
        Ok(())
    }
}
