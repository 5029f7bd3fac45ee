use crate::controller::UiAction;
use egui::{self, Color32, RichText, ScrollArea};
use overcooked_core::{Channel, DirectoryEntry, Identity, NavigationTarget, Screen};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ThemeMode {
    #[default]
    System,
    Light,
    Dark,
}

impl ThemeMode {
    pub fn fallback_theme(self) -> eframe::Theme {
        match self {
            ThemeMode::Light => eframe::Theme::Light,
            ThemeMode::System | ThemeMode::Dark => eframe::Theme::Dark,
        }
    }

    /// `System` keeps whatever the context already uses.
    pub fn is_dark(self, ctx: &egui::Context) -> bool {
        match self {
            ThemeMode::Light => false,
            ThemeMode::Dark => true,
            ThemeMode::System => ctx.style().visuals.dark_mode,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThemePalette {
    pub background: Color32,
    pub surface: Color32,
    pub accent: Color32,
    pub text_primary: Color32,
    pub text_secondary: Color32,
    pub warning: Color32,
}

impl ThemePalette {
    pub fn for_dark() -> Self {
        Self {
            background: Color32::from_rgb(0x1B, 0x1D, 0x21),
            surface: Color32::from_rgb(0x26, 0x29, 0x2E),
            accent: Color32::from_rgb(0xF2, 0x8C, 0x28),
            text_primary: Color32::from_rgb(0xEC, 0xEC, 0xEC),
            text_secondary: Color32::from_rgb(0xA8, 0xAB, 0xB0),
            warning: Color32::from_rgb(0xE0, 0x5A, 0x4F),
        }
    }

    pub fn for_light() -> Self {
        Self {
            background: Color32::from_rgb(0xFF, 0xFB, 0xF6),
            surface: Color32::from_rgb(0xF4, 0xEE, 0xE6),
            accent: Color32::from_rgb(0xD9, 0x6A, 0x0B),
            text_primary: Color32::from_rgb(0x22, 0x22, 0x22),
            text_secondary: Color32::from_rgb(0x66, 0x66, 0x66),
            warning: Color32::from_rgb(0xB3, 0x26, 0x1E),
        }
    }

    pub fn visuals(&self, dark_mode: bool) -> egui::Visuals {
        let mut visuals = if dark_mode {
            egui::Visuals::dark()
        } else {
            egui::Visuals::light()
        };
        visuals.panel_fill = self.background;
        visuals.window_fill = self.surface;
        visuals.extreme_bg_color = self.surface;
        visuals.selection.bg_fill = self.accent;
        visuals.widgets.noninteractive.fg_stroke.color = self.text_primary;
        visuals.dark_mode = dark_mode;
        visuals
    }
}

pub struct TopBar;

impl TopBar {
    pub fn show(
        ui: &mut egui::Ui,
        palette: &ThemePalette,
        screen: Screen,
        identity: Option<&Identity>,
        banner: Option<&str>,
    ) -> Option<UiAction> {
        let mut action = None;
        ui.horizontal(|ui| {
            ui.heading(RichText::new("Overcooked Messenger").color(palette.accent));
            ui.label(RichText::new(screen.route()).small().color(palette.text_secondary));
            if let Some(identity) = identity {
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    ui.label(RichText::new(&identity.display_name).color(palette.text_primary));
                });
            }
        });
        if let Some(banner) = banner {
            ui.horizontal(|ui| {
                ui.colored_label(palette.warning, banner);
                if ui.small_button("Dismiss").clicked() {
                    action = Some(UiAction::DismissBanner);
                }
            });
        }
        action
    }
}

#[derive(Debug, Default)]
pub struct LoginFormState {
    pub email: String,
    pub password: String,
}

pub struct LoginForm;

impl LoginForm {
    pub fn show(
        ui: &mut egui::Ui,
        state: &mut LoginFormState,
        palette: &ThemePalette,
    ) -> Option<UiAction> {
        let mut action = None;
        ui.vertical_centered(|ui| {
            ui.add_space(24.0);
            ui.heading(RichText::new("Welcome back").color(palette.text_primary));
            ui.add_space(12.0);
            ui.add(egui::TextEdit::singleline(&mut state.email).hint_text("Email"));
            ui.add(
                egui::TextEdit::singleline(&mut state.password)
                    .password(true)
                    .hint_text("Password"),
            );
            ui.add_space(8.0);
            let ready = !state.email.trim().is_empty() && !state.password.is_empty();
            if ui.add_enabled(ready, egui::Button::new("Sign in")).clicked() {
                action = Some(UiAction::SignIn {
                    email: state.email.trim().to_string(),
                    password: std::mem::take(&mut state.password),
                });
            }
            if ui.link("No account? Create one").clicked() {
                action = Some(UiAction::OpenRegister);
            }
        });
        action
    }
}

#[derive(Debug, Default)]
pub struct RegisterFormState {
    pub display_name: String,
    pub email: String,
    pub password: String,
}

pub struct RegisterForm;

impl RegisterForm {
    /// Validation happens in the session core so its messages reach the banner.
    pub fn show(
        ui: &mut egui::Ui,
        state: &mut RegisterFormState,
        palette: &ThemePalette,
    ) -> Option<UiAction> {
        let mut action = None;
        ui.vertical_centered(|ui| {
            ui.add_space(24.0);
            ui.heading(RichText::new("Create Account").color(palette.text_primary));
            ui.add_space(12.0);
            ui.add(egui::TextEdit::singleline(&mut state.display_name).hint_text("Full name"));
            ui.add(egui::TextEdit::singleline(&mut state.email).hint_text("Email"));
            ui.add(
                egui::TextEdit::singleline(&mut state.password)
                    .password(true)
                    .hint_text("Password (6+ characters)"),
            );
            ui.add_space(8.0);
            if ui.button("Create Account").clicked() {
                action = Some(UiAction::Register {
                    display_name: state.display_name.trim().to_string(),
                    email: state.email.trim().to_string(),
                    password: std::mem::take(&mut state.password),
                });
            }
            if ui.link("Back to sign in").clicked() {
                action = Some(UiAction::Back);
            }
        });
        action
    }
}

pub struct ChatHome;

impl ChatHome {
    pub fn show(
        ui: &mut egui::Ui,
        palette: &ThemePalette,
        target: NavigationTarget,
        viewer: &str,
        channels: &[Channel],
    ) -> Option<UiAction> {
        let mut action = None;
        match target {
            NavigationTarget::Login => {
                ui.label("You are signed out.");
            }
            NavigationTarget::Loading {
                retry_available: false,
            } => {
                ui.vertical_centered(|ui| {
                    ui.add_space(32.0);
                    ui.spinner();
                    ui.label(RichText::new("Connecting to chat...").color(palette.text_secondary));
                });
            }
            NavigationTarget::Loading {
                retry_available: true,
            } => {
                ui.vertical_centered(|ui| {
                    ui.add_space(32.0);
                    ui.colored_label(palette.warning, "Could not connect to chat.");
                    ui.add_space(8.0);
                    if ui.button("Retry").clicked() {
                        action = Some(UiAction::Retry);
                    }
                    if ui.button("Log out").clicked() {
                        action = Some(UiAction::Logout);
                    }
                });
            }
            NavigationTarget::Chat => {
                ui.horizontal(|ui| {
                    if ui.button("Find people").clicked() {
                        action = Some(UiAction::OpenSearch);
                    }
                    if ui.button("Profile").clicked() {
                        action = Some(UiAction::OpenProfile);
                    }
                    if ui.button("Refresh").clicked() {
                        action = Some(UiAction::RefreshChannels);
                    }
                });
                ui.separator();
                if channels.is_empty() {
                    ui.label(
                        RichText::new("No conversations yet. Find someone to talk to.")
                            .color(palette.text_secondary),
                    );
                }
                ScrollArea::vertical().show(ui, |ui| {
                    for channel in channels {
                        ui.group(|ui| {
                            ui.label(RichText::new(channel.title_for(viewer)).strong());
                            ui.small(
                                RichText::new(channel.created_at.format("%Y-%m-%d %H:%M").to_string())
                                    .color(palette.text_secondary),
                            );
                        });
                    }
                });
            }
        }
        action
    }
}

pub struct ProfileCard;

impl ProfileCard {
    pub fn show(
        ui: &mut egui::Ui,
        palette: &ThemePalette,
        identity: Option<&Identity>,
    ) -> Option<UiAction> {
        let mut action = None;
        if let Some(identity) = identity {
            ui.group(|ui| {
                ui.heading(&identity.display_name);
                if let Some(email) = &identity.email {
                    ui.label(RichText::new(email).color(palette.text_secondary));
                }
                ui.small(format!("avatar: {}", identity.avatar_url));
            });
        }
        ui.add_space(8.0);
        ui.horizontal(|ui| {
            if ui.button("Log out").clicked() {
                action = Some(UiAction::Logout);
            }
            if ui
                .button(RichText::new("Delete account").color(palette.warning))
                .clicked()
            {
                action = Some(UiAction::DeleteAccount);
            }
            if ui.button("Back").clicked() {
                action = Some(UiAction::Back);
            }
        });
        action
    }
}

#[derive(Debug, Default)]
pub struct UserSearchState {
    pub query: String,
}

pub struct UserSearchPanel;

impl UserSearchPanel {
    pub fn show(
        ui: &mut egui::Ui,
        state: &mut UserSearchState,
        palette: &ThemePalette,
        results: &[DirectoryEntry],
    ) -> Option<UiAction> {
        let mut action = None;
        ui.horizontal(|ui| {
            let field = ui.add(egui::TextEdit::singleline(&mut state.query).hint_text("Name starts with..."));
            let submitted = field.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
            if ui.button("Search").clicked() || submitted {
                action = Some(UiAction::Search(state.query.clone()));
            }
            if ui.button("Back").clicked() {
                action = Some(UiAction::Back);
            }
        });
        ui.separator();
        if results.is_empty() {
            ui.label(RichText::new("No users found.").color(palette.text_secondary));
        }
        ScrollArea::vertical().show(ui, |ui| {
            for entry in results {
                ui.horizontal(|ui| {
                    ui.label(RichText::new(&entry.display_name).strong());
                    ui.small(RichText::new(&entry.user_id).color(palette.text_secondary));
                    if ui.button("Message").clicked() {
                        action = Some(UiAction::DirectMessage(entry.user_id.clone()));
                    }
                });
            }
        });
        action
    }
}
