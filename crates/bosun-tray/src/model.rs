//! Pure derivation of the tray menu and tooltip from observed facts.

use bosun_config::ProxyMode;
use strum::Display;

/// The facts the tray derives its presentation from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrayFacts {
    /// Whether the kernel is presumed running.
    pub running: bool,
    /// Currently applied proxy mode.
    pub mode: ProxyMode,
    /// Name of the active configuration profile, when one is selected.
    pub active_profile: Option<String>,
}

/// Stable identifiers for tray menu actions.
///
/// The shell binds these to its own handlers; the model only decides which
/// of them exist and whether they are enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum MenuActionId {
    /// Bring the main window to the front.
    ShowInterface,
    /// Start the kernel.
    StartKernel,
    /// Stop the kernel.
    StopKernel,
    /// Restart the kernel.
    RestartKernel,
    /// Switch to system-proxy mode.
    UseSystemMode,
    /// Switch to TUN mode.
    UseTunMode,
    /// Non-interactive display of the current mode.
    CurrentMode,
    /// Quit the supervisor.
    Quit,
}

/// One actionable menu entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuAction {
    /// Identifier the shell dispatches on.
    pub id: MenuActionId,
    /// Visible label.
    pub label: String,
    /// Whether the entry is clickable.
    pub enabled: bool,
}

/// One entry of the derived tray menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuEntry {
    /// A clickable (or display-only) item.
    Action(MenuAction),
    /// A visual divider.
    Separator,
    /// A nested menu.
    Submenu {
        /// Visible label of the submenu.
        label: String,
        /// Entries inside the submenu.
        entries: Vec<MenuEntry>,
    },
}

/// The derived tray presentation: discarded and rebuilt, never patched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrayModel {
    /// Hover text summarising kernel status, mode, and profile.
    pub tooltip: String,
    /// Menu entries, top to bottom.
    pub entries: Vec<MenuEntry>,
}

impl TrayModel {
    /// Derives the full model from the supplied facts.
    #[must_use]
    pub fn derive(facts: &TrayFacts) -> Self {
        Self {
            tooltip: tooltip_for(facts),
            entries: vec![
                MenuEntry::Action(MenuAction {
                    id: MenuActionId::ShowInterface,
                    label: "Show interface".to_owned(),
                    enabled: true,
                }),
                MenuEntry::Separator,
                MenuEntry::Submenu {
                    label: "Kernel".to_owned(),
                    entries: vec![
                        MenuEntry::Action(MenuAction {
                            id: MenuActionId::StartKernel,
                            label: "Start kernel".to_owned(),
                            enabled: !facts.running,
                        }),
                        MenuEntry::Action(MenuAction {
                            id: MenuActionId::StopKernel,
                            label: "Stop kernel".to_owned(),
                            enabled: facts.running,
                        }),
                        MenuEntry::Action(MenuAction {
                            id: MenuActionId::RestartKernel,
                            label: "Restart kernel".to_owned(),
                            enabled: facts.running,
                        }),
                    ],
                },
                MenuEntry::Submenu {
                    label: "Proxy mode".to_owned(),
                    entries: vec![
                        MenuEntry::Action(MenuAction {
                            id: MenuActionId::CurrentMode,
                            label: format!("Current: {}", mode_label(facts.mode)),
                            enabled: false,
                        }),
                        MenuEntry::Action(MenuAction {
                            id: MenuActionId::UseSystemMode,
                            label: "System proxy".to_owned(),
                            enabled: facts.mode != ProxyMode::System,
                        }),
                        MenuEntry::Action(MenuAction {
                            id: MenuActionId::UseTunMode,
                            label: "TUN mode".to_owned(),
                            enabled: facts.mode != ProxyMode::Tun,
                        }),
                    ],
                },
                MenuEntry::Separator,
                MenuEntry::Action(MenuAction {
                    id: MenuActionId::Quit,
                    label: "Quit".to_owned(),
                    enabled: true,
                }),
            ],
        }
    }
}

fn mode_label(mode: ProxyMode) -> &'static str {
    match mode {
        ProxyMode::System => "system proxy",
        ProxyMode::Tun => "TUN mode",
    }
}

fn tooltip_for(facts: &TrayFacts) -> String {
    let status = if facts.running { "running" } else { "stopped" };
    let mut tooltip = format!("bosun — kernel {status}, {}", mode_label(facts.mode));
    if let Some(profile) = facts.active_profile.as_deref() {
        tooltip.push_str(", profile: ");
        tooltip.push_str(profile);
    }
    tooltip
}
