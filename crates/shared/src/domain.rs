use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(pub u64);
    };
}

id_newtype!(ElementHandle);
id_newtype!(DecorationId);

/// A query describing zero or more page elements.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Selector(pub String);

impl Selector {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Selector {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    Bottom,
    Top,
    Left,
    #[default]
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MobileAction {
    OpenMenu,
    KeepMenuOpen,
    CloseMenu,
}

impl MobileAction {
    /// Steps whose target lives inside the drawer.
    pub fn needs_open_drawer(self) -> bool {
        matches!(self, Self::OpenMenu | Self::KeepMenuOpen)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    Desktop,
    Mobile,
}

impl Layout {
    pub fn for_width(width: f64, breakpoint: f64) -> Self {
        if width <= breakpoint {
            Self::Mobile
        } else {
            Self::Desktop
        }
    }

    pub fn is_mobile(self) -> bool {
        self == Self::Mobile
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Candidate,
    Student,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Candidate => "candidate",
            Self::Student => "student",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "candidate" => Some(Self::Candidate),
            "student" => Some(Self::Student),
            _ => None,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Self::Candidate => Self::Student,
            Self::Student => Self::Candidate,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of the guided tour, anchored to a page element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub target: Selector,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mobile_target: Option<Selector>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_target: Option<Selector>,
    pub title: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mobile_text: Option<String>,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub highlight: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlight_text: Option<String>,
    #[serde(default)]
    pub optional: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mobile_action: Option<MobileAction>,
}

impl Step {
    pub fn new(target: impl Into<Selector>, title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            mobile_target: None,
            fallback_target: None,
            title: title.into(),
            text: text.into(),
            mobile_text: None,
            icon: String::new(),
            position: Position::default(),
            highlight: false,
            highlight_text: None,
            optional: false,
            mobile_action: None,
        }
    }

    pub fn target_for(&self, layout: Layout) -> &Selector {
        match (layout, &self.mobile_target) {
            (Layout::Mobile, Some(mobile)) => mobile,
            _ => &self.target,
        }
    }

    pub fn text_for(&self, layout: Layout) -> &str {
        match (layout, &self.mobile_text) {
            (Layout::Mobile, Some(mobile)) => mobile,
            _ => &self.text,
        }
    }

    /// Drawer action applied before resolving, only ever on mobile.
    pub fn drawer_action(&self, layout: Layout) -> Option<MobileAction> {
        if layout.is_mobile() {
            self.mobile_action
        } else {
            None
        }
    }

    pub fn with_mobile_target(mut self, selector: impl Into<Selector>) -> Self {
        self.mobile_target = Some(selector.into());
        self
    }

    pub fn with_fallback(mut self, selector: impl Into<Selector>) -> Self {
        self.fallback_target = Some(selector.into());
        self
    }

    pub fn with_mobile_text(mut self, text: impl Into<String>) -> Self {
        self.mobile_text = Some(text.into());
        self
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = icon.into();
        self
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.position = position;
        self
    }

    pub fn highlighted(mut self) -> Self {
        self.highlight = true;
        self
    }

    pub fn with_highlight_text(mut self, text: impl Into<String>) -> Self {
        self.highlight_text = Some(text.into());
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn with_mobile_action(mut self, action: MobileAction) -> Self {
        self.mobile_action = Some(action);
        self
    }
}
