#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

use eframe::NativeOptions;
use smoke_playground::App;

fn main() -> eframe::Result {
    env_logger::init(); // Log to stderr (run with `RUST_LOG=debug` for stage timings).

    let native_options = NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([960.0, 760.0])
            .with_min_inner_size([480.0, 400.0]),
        vsync: true,
        ..Default::default()
    };
    eframe::run_native(
        "Smoke Playground",
        native_options,
        Box::new(|cc| Ok(Box::new(App::new(cc)))),
    )
}
