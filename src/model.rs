use std::sync::mpsc::{self, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::debug;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::encode;
use crate::forcing::{self, RegionMask};
use crate::grid::Grid;
use crate::math::Vec2;
use crate::ops;

pub const DEFAULT_NX: usize = 256;
pub const DEFAULT_NY: usize = 256;

/// Wall-clock pacing of the simulation thread; one tick per interval.
const TICK_INTERVAL: Duration = Duration::from_millis(20);

/// A scripted density source applied every tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SourceSpec {
    pub x: f32,
    pub y: f32,
    pub radius: i32,
    pub strength: f32,
}

/// Everything tunable about a simulation run.
///
/// Constructed per grid size because the default region masks and scripted
/// sources are expressed in grid coordinates. Parameters are swapped in
/// between ticks, never mid-tick.
#[derive(Clone)]
pub struct SimulationParams {
    pub dt: f32,
    /// Jacobi iteration count for the pressure solve. More iterations give
    /// a more divergence-free field at proportional cost; zero disables
    /// projection entirely.
    pub pressure_iterations: usize,
    pub vorticity: f32,
    /// Applied to velocity every tick, slightly below 1.
    pub velocity_damping: f32,
    /// Applied to density every tick, slightly below 1.
    pub density_dissipation: f32,
    pub diffuse_velocity: bool,
    pub viscosity: f32,
    pub diffuse_density: bool,
    pub density_diffusion: f32,
    pub buoyancy_lift: f32,
    pub buoyancy_offset: f32,
    /// Amplitude of the per-cell random velocity kicks; zero disables them.
    pub turbulence: f32,
    pub turbulence_region: RegionMask,
    /// Where the vorticity confinement force is applied.
    pub confinement_region: RegionMask,
    /// Radius/strength of the continuous source at the pointer position.
    pub pointer_radius: i32,
    pub pointer_strength: f32,
    /// Strength of the one-shot burst injected on click.
    pub click_strength: f32,
    pub sources: Vec<SourceSpec>,
    /// Cells with `y` below this are reset to rest every tick.
    pub reset_band: i32,
}

impl SimulationParams {
    pub fn new(nx: usize, _ny: usize) -> Self {
        let half = nx as i32 / 2;
        Self {
            dt: 0.02,
            pressure_iterations: 5,
            vorticity: 10.0,
            velocity_damping: 0.999,
            density_dissipation: 0.99,
            diffuse_velocity: false,
            viscosity: 1e-6,
            diffuse_density: false,
            density_diffusion: 100.01,
            buoyancy_lift: 20.0,
            buoyancy_offset: 5.0,
            turbulence: 10.0,
            turbulence_region: forcing::left_of(half),
            confinement_region: forcing::right_of(half),
            pointer_radius: 10,
            pointer_strength: 0.5,
            click_strength: 300.0,
            sources: vec![
                SourceSpec {
                    x: nx as f32 * 0.25,
                    y: 30.0,
                    radius: 10,
                    strength: 0.5,
                },
                SourceSpec {
                    x: nx as f32 * 0.75,
                    y: 30.0,
                    radius: 10,
                    strength: 0.5,
                },
            ],
            reset_band: 10,
        }
    }
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self::new(DEFAULT_NX, DEFAULT_NY)
    }
}

/// Wall-clock cost of each pipeline stage of the last tick.
#[derive(Clone, Copy, Debug, Default)]
pub struct StageTimings {
    pub forcing: Duration,
    pub vorticity: Duration,
    pub advect_velocity: Duration,
    pub project: Duration,
    pub advect_density: Duration,
    pub encode: Duration,
}

/// Per-tick numbers for the log panel.
#[derive(Clone, Copy, Debug)]
pub struct Diagnostics {
    pub simulation_step: usize,
    pub simulation_time: f32,
    pub dt: f32,
    pub total_density: f32,
    pub max_speed: f32,
    pub timings: StageTimings,
}

/// A snapshot structure to copy the data needed for visualization and
/// frame export. Always taken between ticks, never mid-tick.
#[derive(Clone)]
pub struct SimSnapshot {
    pub nx: usize,
    pub ny: usize,
    pub density: Vec<f32>,
    pub velocity: Vec<Vec2>,
    pub pixels: Vec<u32>,
    pub paused: bool,
}

pub enum Command {
    Stop,
    Pause,
    Resume,
    Reset,
    GetSnapshot,
    SetParams(SimulationParams),
    SetPointer(f32, f32),
    InjectAtPointer { radius: i32, strength: f32 },
}

pub struct SimulationControlHandle {
    command_sender: mpsc::Sender<Command>,
    snapshot_receiver: mpsc::Receiver<SimSnapshot>,
    diagnostics_receiver: mpsc::Receiver<Diagnostics>,
}

impl SimulationControlHandle {
    fn send(&self, command: Command) {
        let _ = self.command_sender.send(command);
    }

    pub fn stop(&self) {
        self.send(Command::Stop);
    }

    pub fn pause(&self) {
        self.send(Command::Pause);
    }

    pub fn resume(&self) {
        self.send(Command::Resume);
    }

    pub fn reset(&self) {
        self.send(Command::Reset);
    }

    pub fn set_params(&self, params: SimulationParams) {
        self.send(Command::SetParams(params));
    }

    pub fn set_pointer(&self, x: f32, y: f32) {
        self.send(Command::SetPointer(x, y));
    }

    pub fn inject_at_pointer(&self, radius: i32, strength: f32) {
        self.send(Command::InjectAtPointer { radius, strength });
    }

    pub fn request_snapshot(&self) {
        self.send(Command::GetSnapshot);
    }

    /// Drain the snapshot channel and keep only the newest one.
    pub fn get_last_available_snapshot(&self) -> Option<SimSnapshot> {
        let mut last_snapshot = None;
        loop {
            match self.snapshot_receiver.try_recv() {
                Ok(snapshot) => last_snapshot = Some(snapshot),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => break,
            }
        }
        last_snapshot
    }

    pub fn drain_diagnostics(&self) -> Vec<Diagnostics> {
        let mut messages = vec![];
        loop {
            match self.diagnostics_receiver.try_recv() {
                Ok(diagnostics) => messages.push(diagnostics),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => break,
            }
        }
        messages
    }
}

/// The simulation "model": all fields, scratch buffers and the step
/// orchestrator.
///
/// Velocity and density are double buffered; the solver scratch grids
/// (pressure pair, divergence, curl magnitude) are preallocated here so a
/// tick never allocates.
pub struct Model {
    params: SimulationParams,
    pointer: Vec2,

    velocity: Grid<Vec2>,
    velocity_next: Grid<Vec2>,
    density: Grid<f32>,
    density_next: Grid<f32>,

    pressure: Grid<f32>,
    pressure_next: Grid<f32>,
    divergence: Grid<f32>,
    abs_curl: Grid<f32>,

    pixels: Vec<u32>,
    rng: StdRng,

    simulation_step: usize,
    simulation_time: f32,
    last_timings: StageTimings,
}

impl Model {
    pub fn new(nx: usize, ny: usize, params: SimulationParams) -> Self {
        let mut model = Self {
            params,
            pointer: Vec2::new(nx as f32 * 0.5, ny as f32 * 0.5),
            velocity: Grid::new(nx, ny),
            velocity_next: Grid::new(nx, ny),
            density: Grid::new(nx, ny),
            density_next: Grid::new(nx, ny),
            pressure: Grid::new(nx, ny),
            pressure_next: Grid::new(nx, ny),
            divergence: Grid::new(nx, ny),
            abs_curl: Grid::new(nx, ny),
            pixels: Vec::with_capacity(nx * ny),
            rng: StdRng::seed_from_u64(0x5eed_cafe),
            simulation_step: 0,
            simulation_time: 0.0,
            last_timings: StageTimings::default(),
        };
        encode::encode_to_rgba(&model.density, &mut model.pixels);
        model
    }

    pub fn nx(&self) -> usize {
        self.velocity.nx() as usize
    }

    pub fn ny(&self) -> usize {
        self.velocity.ny() as usize
    }

    pub fn params(&self) -> &SimulationParams {
        &self.params
    }

    pub fn set_params(&mut self, params: SimulationParams) {
        self.params = params;
    }

    /// Reseed the turbulence generator (used for reproducible runs).
    pub fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    /// Pointer position in grid coordinates, origin bottom-left.
    pub fn set_pointer(&mut self, x: f32, y: f32) {
        self.pointer = Vec2::new(x, y);
    }

    pub fn pointer(&self) -> Vec2 {
        self.pointer
    }

    /// One-shot density burst at the pointer, applied immediately.
    pub fn inject_at_pointer(&mut self, radius: i32, strength: f32) {
        forcing::inject_density(
            &mut self.density,
            self.pointer.x,
            self.pointer.y,
            radius,
            strength,
        );
    }

    /// Run one full simulation tick.
    ///
    /// Stage order is load-bearing: confinement runs before velocity
    /// advection so the restored swirl is transported this tick, and the
    /// projection runs after velocity advection so density advection reads
    /// a divergence-free field. The optional diffusion passes slot in
    /// directly before their advection stage.
    pub fn advance(&mut self, dt: f32) {
        // ---------------- Forcing ----------------
        let start = Instant::now();
        let turbulence_region = Arc::clone(&self.params.turbulence_region);
        forcing::turbulence(
            &mut self.velocity,
            &mut self.rng,
            self.params.turbulence,
            &turbulence_region,
        );
        forcing::buoyancy(
            &mut self.velocity,
            &self.density,
            self.params.buoyancy_lift,
            self.params.buoyancy_offset,
            dt,
        );
        forcing::inject_density(
            &mut self.density,
            self.pointer.x,
            self.pointer.y,
            self.params.pointer_radius,
            self.params.pointer_strength,
        );
        self.velocity.scale_by(self.params.velocity_damping);
        self.density.scale_by(self.params.density_dissipation);
        for i in 0..self.params.sources.len() {
            let source = self.params.sources[i];
            forcing::inject_density(
                &mut self.density,
                source.x,
                source.y,
                source.radius,
                source.strength,
            );
        }
        let forcing_time = start.elapsed();

        // ---------------- Vorticity confinement ----------------
        let start = Instant::now();
        let confinement_region = Arc::clone(&self.params.confinement_region);
        ops::vorticity_confinement(
            &mut self.velocity_next,
            &self.velocity,
            &mut self.abs_curl,
            self.params.vorticity,
            dt,
            confinement_region.as_ref(),
        );
        self.velocity.swap(&mut self.velocity_next);
        let vorticity_time = start.elapsed();

        // ---------------- Velocity advection ----------------
        let start = Instant::now();
        if self.params.diffuse_velocity {
            ops::diffuse(&mut self.velocity_next, &self.velocity, self.params.viscosity, dt);
            self.velocity.swap(&mut self.velocity_next);
        }
        ops::advect(&mut self.velocity_next, &self.velocity, &self.velocity, dt);
        self.velocity.swap(&mut self.velocity_next);
        let advect_velocity_time = start.elapsed();

        // ---------------- Pressure projection ----------------
        let start = Instant::now();
        ops::project(
            &mut self.velocity,
            &mut self.pressure,
            &mut self.pressure_next,
            &mut self.divergence,
            self.params.pressure_iterations,
        );
        let project_time = start.elapsed();

        // ---------------- Density advection ----------------
        let start = Instant::now();
        if self.params.diffuse_density {
            ops::diffuse(
                &mut self.density_next,
                &self.density,
                self.params.density_diffusion,
                dt,
            );
            self.density.swap(&mut self.density_next);
        }
        ops::advect(&mut self.density_next, &self.density, &self.velocity, dt);
        self.density.swap(&mut self.density_next);
        forcing::clear_bottom_band(&mut self.density, &mut self.velocity, self.params.reset_band);
        let advect_density_time = start.elapsed();

        // ---------------- Encode for display ----------------
        let start = Instant::now();
        encode::encode_to_rgba(&self.density, &mut self.pixels);
        let encode_time = start.elapsed();

        self.last_timings = StageTimings {
            forcing: forcing_time,
            vorticity: vorticity_time,
            advect_velocity: advect_velocity_time,
            project: project_time,
            advect_density: advect_density_time,
            encode: encode_time,
        };
        self.simulation_step += 1;
        self.simulation_time += dt;

        debug!(
            "step {}: forcing {:?} vorticity {:?} advect_v {:?} project {:?} advect_d {:?} encode {:?}",
            self.simulation_step,
            forcing_time,
            vorticity_time,
            advect_velocity_time,
            project_time,
            advect_density_time,
            encode_time,
        );
    }

    /// Packed RGBA pixels of the last completed tick, row-major, row 0 at
    /// the bottom of the domain.
    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    pub fn total_density(&self) -> f32 {
        self.density.raw().iter().sum()
    }

    pub fn max_speed(&self) -> f32 {
        self.velocity
            .raw()
            .iter()
            .map(|v| v.length())
            .fold(0.0_f32, f32::max)
    }

    pub fn density_at(&self, x: i32, y: i32) -> f32 {
        self.density.get(x, y)
    }

    pub fn velocity_at(&self, x: i32, y: i32) -> Vec2 {
        self.velocity.get(x, y)
    }

    pub fn diagnostics(&self) -> Diagnostics {
        Diagnostics {
            simulation_step: self.simulation_step,
            simulation_time: self.simulation_time,
            dt: self.params.dt,
            total_density: self.total_density(),
            max_speed: self.max_speed(),
            timings: self.last_timings,
        }
    }

    pub fn get_snapshot(&self) -> SimSnapshot {
        SimSnapshot {
            nx: self.nx(),
            ny: self.ny(),
            density: self.density.raw().to_vec(),
            velocity: self.velocity.raw().to_vec(),
            pixels: self.pixels.clone(),
            paused: false,
        }
    }

    /// Return every field to the initial rest state, keeping parameters.
    pub fn reset(&mut self) {
        self.velocity.fill(Vec2::ZERO);
        self.velocity_next.fill(Vec2::ZERO);
        self.density.fill(0.0);
        self.density_next.fill(0.0);
        self.pressure.fill(0.0);
        self.pressure_next.fill(0.0);
        self.divergence.fill(0.0);
        self.abs_curl.fill(0.0);
        self.simulation_step = 0;
        self.simulation_time = 0.0;
        self.last_timings = StageTimings::default();
        encode::encode_to_rgba(&self.density, &mut self.pixels);
    }

    /// Move the model onto a background thread and return a channel-based
    /// control handle. Commands are applied between ticks; the thread
    /// paces itself to the tick interval and sleeps while paused.
    pub fn run(mut self) -> SimulationControlHandle {
        let (command_sender, command_receiver) = mpsc::channel();
        let (snapshot_sender, snapshot_receiver) = mpsc::channel();
        let (diagnostics_sender, diagnostics_receiver) = mpsc::channel();

        thread::spawn(move || {
            let mut paused = false;
            'sim: loop {
                let tick_start = Instant::now();

                let mut snapshot_sent = false;
                for command in command_receiver.try_iter() {
                    match command {
                        Command::Stop => break 'sim,
                        Command::Pause => paused = true,
                        Command::Resume => paused = false,
                        Command::Reset => self.reset(),
                        Command::SetParams(params) => self.set_params(params),
                        Command::SetPointer(x, y) => self.set_pointer(x, y),
                        Command::InjectAtPointer { radius, strength } => {
                            self.inject_at_pointer(radius, strength)
                        }
                        Command::GetSnapshot => {
                            if !snapshot_sent {
                                let mut snapshot = self.get_snapshot();
                                snapshot.paused = paused;
                                if snapshot_sender.send(snapshot).is_err() {
                                    break 'sim;
                                }
                                snapshot_sent = true;
                            }
                        }
                    }
                }

                if paused {
                    thread::sleep(Duration::from_millis(16));
                    continue;
                }

                let dt = self.params.dt;
                self.advance(dt);
                if diagnostics_sender.send(self.diagnostics()).is_err() {
                    break 'sim;
                }

                if let Some(rest) = TICK_INTERVAL.checked_sub(tick_start.elapsed()) {
                    thread::sleep(rest);
                }
            }
        });

        SimulationControlHandle {
            command_sender,
            snapshot_receiver,
            diagnostics_receiver,
        }
    }
}
