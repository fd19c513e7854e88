use serde::{Deserialize, Serialize};

/// Which slice of the task list is shown by default.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ViewFilter {
    #[default]
    Today,
    Upcoming,
    All,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

/// Process-wide user settings, persisted immediately on change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct UserPreferences {
    pub default_view: ViewFilter,
    pub show_completed_tasks: bool,
    pub enable_notifications: bool,
    pub theme: Theme,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            default_view: ViewFilter::Today,
            show_completed_tasks: true,
            enable_notifications: true,
            theme: Theme::Light,
        }
    }
}

/// Partial preferences change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreferencesUpdate {
    pub default_view: Option<ViewFilter>,
    pub show_completed_tasks: Option<bool>,
    pub enable_notifications: Option<bool>,
    pub theme: Option<Theme>,
}

impl UserPreferences {
    pub fn apply(&mut self, update: PreferencesUpdate) {
        if let Some(view) = update.default_view {
            self.default_view = view;
        }
        if let Some(show) = update.show_completed_tasks {
            self.show_completed_tasks = show;
        }
        if let Some(enable) = update.enable_notifications {
            self.enable_notifications = enable;
        }
        if let Some(theme) = update.theme {
            self.theme = theme;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let prefs: UserPreferences =
            serde_json::from_str(r#"{"defaultView":"all"}"#).expect("deserialize");
        assert_eq!(prefs.default_view, ViewFilter::All);
        assert!(prefs.show_completed_tasks);
        assert!(prefs.enable_notifications);
        assert_eq!(prefs.theme, Theme::Light);
    }

    #[test]
    fn apply_only_touches_given_fields() {
        let mut prefs = UserPreferences::default();
        prefs.apply(PreferencesUpdate {
            theme: Some(Theme::Dark),
            enable_notifications: Some(false),
            ..PreferencesUpdate::default()
        });
        assert_eq!(prefs.theme, Theme::Dark);
        assert!(!prefs.enable_notifications);
        assert_eq!(prefs.default_view, ViewFilter::Today);
        assert!(prefs.show_completed_tasks);
    }
}
