pub mod app;
pub mod controller;
pub mod ui;

pub use app::{render_ui, OvercookedEguiApp};
pub use controller::{Flow, MessengerController, UiAction};
pub use ui::ThemeMode;
