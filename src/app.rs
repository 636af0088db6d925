use eframe::egui;
use std::time::Duration;

use crate::encode::unpack_rgba;
use crate::export::FrameRecorder;
use crate::model::{
    Diagnostics, Model, SimSnapshot, SimulationControlHandle, SimulationParams, DEFAULT_NX,
    DEFAULT_NY,
};

/// The GUI front end. The simulation itself lives on a background thread;
/// this type only sends commands and displays the latest completed tick.
pub struct App {
    handle: SimulationControlHandle,
    params: SimulationParams,
    nx: usize,
    ny: usize,
    paused: bool,

    texture: Option<egui::TextureHandle>,
    snapshot: Option<SimSnapshot>,
    diagnostics: Option<Diagnostics>,

    recording: bool,
    recorder: Option<FrameRecorder>,
}

impl App {
    pub fn new(_cc: &eframe::CreationContext) -> Self {
        let (nx, ny) = (DEFAULT_NX, DEFAULT_NY);
        let params = SimulationParams::new(nx, ny);
        let handle = Model::new(nx, ny, params.clone()).run();
        handle.request_snapshot();

        Self {
            handle,
            params,
            nx,
            ny,
            paused: false,
            texture: None,
            snapshot: None,
            diagnostics: None,
            recording: false,
            recorder: None,
        }
    }

    fn receive_updates(&mut self) {
        if let Some(snapshot) = self.handle.get_last_available_snapshot() {
            if self.recording && !snapshot.paused {
                if let Some(recorder) = &mut self.recorder {
                    if let Err(err) = recorder.capture(snapshot.nx, snapshot.ny, &snapshot.pixels)
                    {
                        log::error!("frame capture failed: {err:#}");
                        self.recording = false;
                    }
                }
            }
            self.snapshot = Some(snapshot);
        }
        if let Some(latest) = self.handle.drain_diagnostics().pop() {
            self.diagnostics = Some(latest);
        }
    }

    fn control_panel(&mut self, ui: &mut egui::Ui) {
        ui.vertical(|ui| {
            ui.horizontal(|ui| {
                if ui.button("Start").clicked() {
                    self.handle.resume();
                    self.paused = false;
                }
                if ui.button("Pause").clicked() {
                    self.handle.pause();
                    self.paused = true;
                }
                if ui.button("Reset").clicked() {
                    self.handle.reset();
                }
            });
            ui.separator();
            ui.label("Simulation Parameters");

            let p = &mut self.params;
            let mut changed = false;
            changed |= ui
                .add(egui::Slider::new(&mut p.dt, 0.001..=0.1).text("Time Step"))
                .changed();
            changed |= ui
                .add(egui::Slider::new(&mut p.pressure_iterations, 0..=40).text("Pressure Iterations"))
                .changed();
            changed |= ui
                .add(egui::Slider::new(&mut p.vorticity, 0.0..=40.0).text("Vorticity"))
                .changed();
            changed |= ui
                .add(egui::Slider::new(&mut p.velocity_damping, 0.9..=1.0).text("Velocity Damping"))
                .changed();
            changed |= ui
                .add(
                    egui::Slider::new(&mut p.density_dissipation, 0.9..=1.0)
                        .text("Density Dissipation"),
                )
                .changed();
            changed |= ui
                .add(egui::Slider::new(&mut p.turbulence, 0.0..=20.0).text("Turbulence"))
                .changed();
            changed |= ui
                .add(egui::Slider::new(&mut p.buoyancy_lift, 0.0..=40.0).text("Buoyancy"))
                .changed();
            changed |= ui
                .add(egui::Slider::new(&mut p.buoyancy_offset, 0.0..=10.0).text("Buoyancy Offset"))
                .changed();
            changed |= ui
                .add(egui::Slider::new(&mut p.pointer_radius, 1..=30).text("Brush Radius"))
                .changed();
            changed |= ui
                .add(egui::Slider::new(&mut p.pointer_strength, 0.0..=5.0).text("Brush Strength"))
                .changed();
            changed |= ui
                .add(egui::Slider::new(&mut p.reset_band, 0..=30).text("Floor Band"))
                .changed();
            changed |= ui.checkbox(&mut p.diffuse_velocity, "Diffuse Velocity").changed();
            if p.diffuse_velocity {
                changed |= ui
                    .add(
                        egui::Slider::new(&mut p.viscosity, 1e-6..=0.1)
                            .logarithmic(true)
                            .text("Viscosity"),
                    )
                    .changed();
            }
            changed |= ui.checkbox(&mut p.diffuse_density, "Diffuse Density").changed();
            if p.diffuse_density {
                changed |= ui
                    .add(egui::Slider::new(&mut p.density_diffusion, 0.0..=200.0).text("Diffusion"))
                    .changed();
            }
            if changed {
                self.handle.set_params(self.params.clone());
            }

            ui.separator();
            if ui.checkbox(&mut self.recording, "Record PPM Frames").changed() && self.recording {
                match FrameRecorder::new("frames") {
                    Ok(recorder) => self.recorder = Some(recorder),
                    Err(err) => {
                        log::error!("cannot start frame recording: {err:#}");
                        self.recording = false;
                    }
                }
            }
        });
    }

    fn field_view(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        let Some(snapshot) = &self.snapshot else {
            return;
        };

        let pixels: Vec<egui::Color32> = snapshot
            .pixels
            .iter()
            .map(|&pixel| {
                let [r, g, b, _] = unpack_rgba(pixel);
                egui::Color32::from_rgb(r, g, b)
            })
            .collect();
        let image = egui::ColorImage {
            size: [snapshot.nx, snapshot.ny],
            pixels,
        };
        let options = egui::TextureOptions {
            magnification: egui::TextureFilter::Linear,
            minification: egui::TextureFilter::Linear,
            mipmap_mode: None,
            wrap_mode: egui::TextureWrapMode::ClampToEdge,
        };
        if let Some(texture) = &mut self.texture {
            texture.set(image, options);
        } else {
            self.texture = Some(ctx.load_texture("simulation", image, options));
        }

        let Some(texture) = &self.texture else {
            return;
        };

        // Keep the domain square regardless of window shape.
        let available = ui.available_rect_before_wrap();
        let side = available.width().min(available.height());
        let (rect, response) =
            ui.allocate_exact_size(egui::vec2(side, side), egui::Sense::click_and_drag());

        // Pixel row 0 is the bottom of the domain, so flip v when drawing.
        let uv = egui::Rect::from_min_max(egui::pos2(0.0, 1.0), egui::pos2(1.0, 0.0));
        ui.painter().image(texture.id(), rect, uv, egui::Color32::WHITE);

        if let Some(pos) = response.hover_pos() {
            let gx = (pos.x - rect.left()) / rect.width() * self.nx as f32;
            let gy = (rect.bottom() - pos.y) / rect.height() * self.ny as f32;
            self.handle.set_pointer(gx, gy);
            if response.clicked() || response.drag_started() {
                self.handle
                    .inject_at_pointer(self.params.pointer_radius, self.params.click_strength);
            }
        }
    }

    fn status_panel(&self, ui: &mut egui::Ui) {
        ui.separator();
        let Some(d) = &self.diagnostics else {
            ui.label("waiting for first tick...");
            return;
        };
        let t = d.timings;
        ui.label(format!(
            "Step: {}, Time: {:.2} s, dt: {:.3} s, Density: {:.1}, Max Speed: {:.2}",
            d.simulation_step, d.simulation_time, d.dt, d.total_density, d.max_speed,
        ));
        ui.label(format!(
            "forcing {:.2?} | vorticity {:.2?} | advect v {:.2?} | project {:.2?} | advect d {:.2?} | encode {:.2?}",
            t.forcing, t.vorticity, t.advect_velocity, t.project, t.advect_density, t.encode,
        ));
        if self.recording {
            if let Some(recorder) = &self.recorder {
                ui.label(format!("Recorded {} frames", recorder.frames_written()));
            }
        }
    }
}

impl eframe::App for App {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.receive_updates();

        egui::SidePanel::left("control_panel").show(ctx, |ui| {
            self.control_panel(ui);
        });

        egui::TopBottomPanel::bottom("status_panel").show(ctx, |ui| {
            self.status_panel(ui);
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.field_view(ui, ctx);
        });

        // Ask for the next completed tick and keep the UI refreshing while
        // the simulation is running.
        self.handle.request_snapshot();
        if !self.paused {
            ctx.request_repaint_after(Duration::from_millis(16));
        }
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.handle.stop();
    }
}
