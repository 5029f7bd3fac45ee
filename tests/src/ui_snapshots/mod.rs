use crate::unit::{local_stack, test_runtime};
use egui::{self, RawInput};
use overcooked::ui::ThemeMode;
use overcooked::{render_ui, MessengerController, OvercookedEguiApp, UiAction};
use overcooked_core::LocalStack;
use std::sync::Arc;

fn build_app(theme: ThemeMode) -> (OvercookedEguiApp, LocalStack) {
    let runtime = Arc::new(test_runtime());
    let (stack, events) = local_stack(&runtime, None);
    let mut controller =
        MessengerController::new(stack.coordinator.clone(), Arc::clone(&stack.navigation), events);
    controller.start();
    let mut app = OvercookedEguiApp::new(controller, runtime, theme);
    app.settle();
    (app, stack)
}

fn register(app: &mut OvercookedEguiApp) {
    app.dispatch(UiAction::Register {
        display_name: "Ann Lee".into(),
        email: "ann@example.com".into(),
        password: "secret1".into(),
    });
}

struct Frame {
    texts: Vec<String>,
    primitives: usize,
    dark_mode: bool,
}

impl Frame {
    fn shows(&self, needle: &str) -> bool {
        self.texts.iter().any(|text| text.contains(needle))
    }

    fn assert_shows(&self, needle: &str) {
        assert!(self.shows(needle), "{needle:?} not drawn; got {:?}", self.texts);
    }
}

fn capture_frame(app: &mut OvercookedEguiApp) -> Frame {
    let ctx = egui::Context::default();
    let output = ctx.run(RawInput::default(), |ctx| {
        render_ui(ctx, app);
    });
    let mut texts = Vec::new();
    for clipped in &output.shapes {
        collect_text(&clipped.shape, &mut texts);
    }
    let primitives = ctx.tessellate(output.shapes, 1.0).len();
    Frame {
        texts,
        primitives,
        dark_mode: ctx.style().visuals.dark_mode,
    }
}

fn collect_text(shape: &egui::Shape, texts: &mut Vec<String>) {
    match shape {
        egui::Shape::Text(text) => texts.push(text.galley.text().to_string()),
        egui::Shape::Vec(shapes) => {
            for shape in shapes {
                collect_text(shape, texts);
            }
        }
        _ => {}
    }
}

#[test]
fn login_screen_dark() {
    let (mut app, _stack) = build_app(ThemeMode::Dark);
    let frame = capture_frame(&mut app);
    assert!(frame.primitives > 0);
    assert!(frame.dark_mode);
    frame.assert_shows("Overcooked Messenger");
    frame.assert_shows("Welcome back");
    frame.assert_shows("Sign in");
    frame.assert_shows("No account? Create one");
    assert!(!frame.shows("Dismiss"));
}

#[test]
fn register_screen_light() {
    let (mut app, _stack) = build_app(ThemeMode::Light);
    app.dispatch(UiAction::OpenRegister);
    let frame = capture_frame(&mut app);
    assert!(!frame.dark_mode);
    frame.assert_shows("Create Account");
    frame.assert_shows("Back to sign in");
    assert!(!frame.shows("Welcome back"));
}

#[test]
fn failed_sign_in_draws_banner() {
    let (mut app, _stack) = build_app(ThemeMode::Dark);
    app.dispatch(UiAction::SignIn {
        email: "nobody@example.com".into(),
        password: "secret1".into(),
    });
    app.settle();
    let frame = capture_frame(&mut app);
    frame.assert_shows("Authentication failed");
    frame.assert_shows("Dismiss");
    frame.assert_shows("Welcome back");
}

#[test]
fn connecting_then_connected() {
    let (mut app, stack) = build_app(ThemeMode::Dark);
    stack.chat.hold_connects();
    register(&mut app);
    let frame = capture_frame(&mut app);
    frame.assert_shows("Connecting to chat...");
    frame.assert_shows("Ann Lee");
    assert!(app.controller().is_busy());

    stack.chat.release_connects();
    app.settle();
    let frame = capture_frame(&mut app);
    assert!(!frame.shows("Connecting to chat..."));
    frame.assert_shows("No conversations yet. Find someone to talk to.");
    frame.assert_shows("Find people");
}

#[test]
fn failed_connect_light() {
    let (mut app, stack) = build_app(ThemeMode::Light);
    stack.chat.fail_connects(Some("maintenance window"));
    register(&mut app);
    app.settle();
    let frame = capture_frame(&mut app);
    assert!(!frame.dark_mode);
    frame.assert_shows("Could not connect to chat.");
    frame.assert_shows("Retry");
    frame.assert_shows("Log out");
    frame.assert_shows("maintenance window");
}

#[test]
fn profile_card_shows_identity() {
    let (mut app, _stack) = build_app(ThemeMode::Dark);
    register(&mut app);
    app.settle();
    app.dispatch(UiAction::OpenProfile);
    let frame = capture_frame(&mut app);
    frame.assert_shows("Ann Lee");
    frame.assert_shows("ann@example.com");
    frame.assert_shows("Delete account");
}

#[test]
fn search_results_offer_direct_message() {
    let (mut app, stack) = build_app(ThemeMode::Dark);
    stack
        .identity
        .seed_account("bo@example.com", "secret1", Some("Bo"))
        .expect("seed");
    register(&mut app);
    app.settle();

    app.dispatch(UiAction::Search("Zed".into()));
    capture_frame(&mut app).assert_shows("No users found.");

    app.dispatch(UiAction::Search("B".into()));
    let frame = capture_frame(&mut app);
    assert!(!frame.shows("No users found."));
    frame.assert_shows("Bo");
    frame.assert_shows("Message");
}
