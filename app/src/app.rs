use crate::controller::{Flow, MessengerController, UiAction};
use crate::ui::{
    ChatHome, LoginForm, LoginFormState, ProfileCard, RegisterForm, RegisterFormState,
    ThemeMode, ThemePalette, TopBar, UserSearchPanel, UserSearchState,
};
use overcooked_core::Screen;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use tracing::info;

pub struct OvercookedEguiApp {
    controller: MessengerController,
    runtime: Arc<Runtime>,
    theme: ThemeMode,
    login: LoginFormState,
    register: RegisterFormState,
    search: UserSearchState,
}

impl OvercookedEguiApp {
    pub fn new(controller: MessengerController, runtime: Arc<Runtime>, theme: ThemeMode) -> Self {
        Self {
            controller,
            runtime,
            theme,
            login: LoginFormState::default(),
            register: RegisterFormState::default(),
            search: UserSearchState::default(),
        }
    }

    pub fn controller(&self) -> &MessengerController {
        &self.controller
    }

    /// Blocks until outstanding connects have finished and their events are applied.
    pub fn settle(&mut self) {
        self.runtime.block_on(self.controller.settle());
    }

    pub fn dispatch(&mut self, action: UiAction) -> Flow {
        let flow = self.runtime.block_on(self.controller.handle(action));
        if flow == Flow::Continue {
            self.runtime.block_on(self.controller.poll());
        }
        flow
    }
}

impl eframe::App for OvercookedEguiApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        render_ui(ctx, self);
    }
}

/// Draws one frame and applies whatever the user did in it.
pub fn render_ui(ctx: &egui::Context, app: &mut OvercookedEguiApp) {
    app.runtime.block_on(app.controller.poll());

    let dark = app.theme.is_dark(ctx);
    let palette = if dark {
        ThemePalette::for_dark()
    } else {
        ThemePalette::for_light()
    };
    ctx.set_visuals(palette.visuals(dark));

    let screen = app.controller.current_screen();
    let identity = app.controller.identity();
    let banner = app.controller.banner().map(str::to_string);
    let target = app.controller.navigation_target();
    let mut action = None;

    egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
        action = TopBar::show(ui, &palette, screen, identity.as_ref(), banner.as_deref());
    });

    egui::CentralPanel::default().show(ctx, |ui| {
        let chosen = match screen {
            Screen::Login => LoginForm::show(ui, &mut app.login, &palette),
            Screen::Register => RegisterForm::show(ui, &mut app.register, &palette),
            Screen::Chat => {
                let viewer = identity
                    .as_ref()
                    .map(|identity| identity.user_id.as_str())
                    .unwrap_or_default();
                ChatHome::show(ui, &palette, target, viewer, app.controller.channels())
            }
            Screen::Profile => ProfileCard::show(ui, &palette, identity.as_ref()),
            Screen::UserSearch => UserSearchPanel::show(
                ui,
                &mut app.search,
                &palette,
                app.controller.search_results(),
            ),
        };
        if chosen.is_some() {
            action = chosen;
        }
    });

    if let Some(action) = action {
        if app.dispatch(action) == Flow::Exit {
            info!("closing window");
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
        }
    }

    // Connect completions arrive without input events.
    if app.controller.is_busy() {
        ctx.request_repaint_after(Duration::from_millis(100));
    }
}
