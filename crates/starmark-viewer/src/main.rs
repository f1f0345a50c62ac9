//! Entry point for the starmark demo viewer.

mod app;
mod field;
mod pan_zoom;

use crate::app::App;
use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use winit::{
    event::{Event, WindowEvent},
    event_loop::{ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::WindowBuilder,
};

/// Pan/zoom a synthetic star field with a GPU catalog overlay.
///
/// Drag to pan, scroll to zoom, click a marker to identify it,
/// S exports the overlay to PNG, F toggles a visibility filter.
#[derive(Debug, Parser)]
pub struct Args {
    /// Number of synthetic catalog points.
    #[arg(long, default_value_t = 200_000)]
    pub points: usize,

    /// Side length of the square synthetic image, in pixels.
    #[arg(long, default_value_t = 4096.0)]
    pub image_size: f32,

    /// Field generation seed.
    #[arg(long, default_value_t = 7)]
    pub seed: u64,
}

fn main() -> Result<()> {
    // Initialize logging; default to "info" if RUST_LOG is unset.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let event_loop = EventLoop::new()?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title("starmark")
            .with_inner_size(winit::dpi::LogicalSize::new(1280, 800))
            .build(&event_loop)?,
    );

    let mut app = pollster::block_on(App::new(window.clone(), &args))?;

    event_loop.run(move |event, elwt| {
        elwt.set_control_flow(ControlFlow::Wait);

        match event {
            Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
                WindowEvent::CloseRequested => elwt.exit(),
                WindowEvent::KeyboardInput { ref event, .. }
                    if event.physical_key == PhysicalKey::Code(KeyCode::Escape) =>
                {
                    elwt.exit();
                }
                WindowEvent::RedrawRequested => match app.render() {
                    Ok(()) => {}
                    Err(wgpu::SurfaceError::Lost) => {
                        app.resize(app.size);
                    }
                    Err(wgpu::SurfaceError::OutOfMemory) => {
                        log::error!("WGPU out of memory – exiting.");
                        elwt.exit();
                    }
                    Err(e) => log::error!("Render error: {:?}", e),
                },
                other => app.handle_event(&window, &other),
            },
            Event::AboutToWait => {
                // A settling zoom burst wants a wakeup at its deadline.
                if let Some(deadline) = app.tick(&window) {
                    elwt.set_control_flow(ControlFlow::WaitUntil(deadline));
                }
            }
            _ => {}
        }
    })?;

    Ok(())
}
