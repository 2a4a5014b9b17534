//! Built-in step catalog and loading of custom catalogs.

use std::{fs, path::Path};

use anyhow::Context;
use shared::{
    domain::{MobileAction, Position, Step},
    error::TourError,
};

use crate::surface::{CompletionMessage, WelcomeCard};

/// Fixed copy shown outside of individual steps.
#[derive(Debug, Clone, PartialEq)]
pub struct TourCopy {
    pub welcome: WelcomeCard,
    pub completion: CompletionMessage,
}

impl Default for TourCopy {
    fn default() -> Self {
        Self {
            welcome: WelcomeCard {
                title: "Welcome to Smart Classroom! 🎓".into(),
                body: "We're a non-profit educational platform helping students with free \
                       resources. Let us give you a quick tour to get started!"
                    .into(),
                hint: "⏱️ Takes only 30 seconds".into(),
            },
            completion: CompletionMessage {
                title: "You're All Set! 🎉".into(),
                body: "Happy learning with Smart Classroom!".into(),
            },
        }
    }
}

pub fn default_steps() -> Vec<Step> {
    vec![
        Step::new(
            ".logo",
            "Welcome to Smart Classroom!",
            "Let me show you around. This quick tutorial will help you navigate our platform effectively.",
        )
        .with_icon("👋")
        .with_position(Position::Bottom)
        .highlighted(),
        Step::new(
            "nav",
            "Navigation Menu",
            "Use this navigation bar to explore different sections like Subjects, Simulators, and Products.",
        )
        .with_mobile_target("#menu-toggle")
        .with_mobile_text(
            "Tap the menu icon to access all pages including Subjects, Simulators, and Products.",
        )
        .with_icon("🧭")
        .with_position(Position::Bottom)
        .highlighted(),
        Step::new(
            ".desktop-nav .role-switch",
            "⭐ Important: Role Switcher",
            "This is the MOST IMPORTANT feature! Toggle between \"Candidate\" (admission prep) and \
             \"Student\" (university courses) to see different content.",
        )
        .with_mobile_target(".slider-content .role-switch")
        .with_icon("🎯")
        .with_position(Position::Bottom)
        .highlighted()
        .with_highlight_text("Many users miss this! Always check your role before browsing.")
        .with_mobile_action(MobileAction::OpenMenu),
        Step::new(
            ".desktop-nav #role-toggle",
            "How to Switch Roles",
            "Click this toggle to switch between Candidate and Student modes. Give it a try!",
        )
        .with_mobile_target(".slider-content #role-toggle")
        .with_mobile_text("Tap this toggle to switch between Candidate and Student modes. Try it now!")
        .with_icon("🔄")
        .with_position(Position::Bottom)
        .highlighted()
        .with_highlight_text("Switch your role based on what you need to study!")
        .with_mobile_action(MobileAction::KeepMenuOpen),
        Step::new(
            "nav a[href=\"subjects.html\"]",
            "Subjects Section",
            "Different subjects appear based on your role. Candidates see admission topics, \
             Students see university courses.",
        )
        .with_fallback(".slider-content nav a[href=\"subjects.html\"]")
        .with_icon("📚")
        .with_position(Position::Bottom)
        .highlighted()
        .with_mobile_action(MobileAction::KeepMenuOpen),
        Step::new(
            "nav a[href=\"simulators.html\"]",
            "Interactive Simulators",
            "Explore physics, chemistry, and math simulators to understand concepts visually.",
        )
        .with_fallback(".slider-content nav a[href=\"simulators.html\"]")
        .with_icon("🔬")
        .with_position(Position::Bottom)
        .highlighted()
        .with_mobile_action(MobileAction::KeepMenuOpen),
        Step::new(
            ".instruction-button, #instruction-button",
            "Need Help?",
            "Click here anytime to see detailed instructions about using the website.",
        )
        .with_icon("❓")
        .with_position(Position::Left)
        .highlighted()
        .optional()
        .with_mobile_action(MobileAction::CloseMenu),
    ]
}

/// Reads a JSON array of steps.
pub fn load_steps(path: &Path) -> anyhow::Result<Vec<Step>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read step catalog '{}'", path.display()))?;
    parse_steps(&raw).with_context(|| format!("invalid step catalog '{}'", path.display()))
}

pub fn parse_steps(raw: &str) -> anyhow::Result<Vec<Step>> {
    let steps: Vec<Step> = serde_json::from_str(raw)?;
    if steps.is_empty() {
        return Err(TourError::EmptyCatalog.into());
    }
    Ok(steps)
}
