//! Browser side of the viewer: WebGL2 context, animation loop and the
//! mouse controls attached to one canvas.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::{info, warn};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use web_sys::{Event, HtmlCanvasElement, MouseEvent, WheelEvent};

use super::asset::load_glb;
use super::camera::{ModelSpin, OrbitCamera};
use super::renderer::{GlRenderer, SceneLights};
use super::ViewerError;
use crate::remote::{Fetcher, ReqwestTransport};

/// Degrees of orbit per dragged pixel.
const ROTATE_SPEED: f32 = 0.4;
/// Target movement per dragged pixel, as a fraction of camera distance.
const PAN_SPEED: f32 = 0.002;
const ZOOM_SPEED: f32 = 0.001;

#[derive(Debug, Clone, Copy)]
enum DragMode {
    Orbit,
    Pan,
}

struct Drag {
    mode: DragMode,
    x: i32,
    y: i32,
}

struct ViewState {
    gl: glow::Context,
    canvas: HtmlCanvasElement,
    renderer: GlRenderer,
    camera: OrbitCamera,
    spin: ModelSpin,
    lights: SceneLights,
    last_time: Option<f64>,
    drag: Option<Drag>,
}

impl ViewState {
    fn frame(&mut self, time_ms: f64) {
        let dt = self
            .last_time
            .map(|last| ((time_ms - last) / 1000.0) as f32)
            .unwrap_or(0.0);
        self.last_time = Some(time_ms);
        self.spin.advance(dt);

        let (width, height) = self.fit_drawing_buffer();
        self.renderer
            .paint(&self.gl, &self.camera, &self.spin, &self.lights, width, height);
    }

    /// Match the drawing buffer to the canvas' CSS size.
    fn fit_drawing_buffer(&self) -> (i32, i32) {
        let ratio = web_sys::window().map(|w| w.device_pixel_ratio()).unwrap_or(1.0);
        let width = ((self.canvas.client_width() as f64 * ratio).round() as u32).max(1);
        let height = ((self.canvas.client_height() as f64 * ratio).round() as u32).max(1);
        if self.canvas.width() != width {
            self.canvas.set_width(width);
        }
        if self.canvas.height() != height {
            self.canvas.set_height(height);
        }
        (width as i32, height as i32)
    }

    fn pointer_down(&mut self, event: &MouseEvent) {
        let mode = match event.button() {
            0 if !event.shift_key() => DragMode::Orbit,
            0 | 2 => DragMode::Pan,
            _ => return,
        };
        self.drag = Some(Drag {
            mode,
            x: event.client_x(),
            y: event.client_y(),
        });
    }

    fn pointer_move(&mut self, event: &MouseEvent) {
        let Some(drag) = self.drag.as_mut() else {
            return;
        };
        let dx = (event.client_x() - drag.x) as f32;
        let dy = (event.client_y() - drag.y) as f32;
        drag.x = event.client_x();
        drag.y = event.client_y();

        match drag.mode {
            DragMode::Orbit => self.camera.rotate(-dx * ROTATE_SPEED, dy * ROTATE_SPEED),
            DragMode::Pan => {
                let scale = self.camera.distance * PAN_SPEED;
                self.camera.pan(-dx * scale, dy * scale);
            }
        }
    }

    fn wheel(&mut self, event: &WheelEvent) {
        let delta = (-event.delta_y() as f32 * ZOOM_SPEED).clamp(-0.5, 0.5);
        self.camera.zoom(delta);
    }
}

struct Listener {
    event: &'static str,
    closure: Closure<dyn FnMut(Event)>,
}

/// A model shown on a canvas. Runs until [`ViewerSession::stop`].
pub struct ViewerSession {
    state: Rc<RefCell<ViewState>>,
    frame: Rc<RefCell<Option<Closure<dyn FnMut(f64)>>>>,
    frame_handle: Rc<Cell<i32>>,
    listeners: Vec<Listener>,
}

impl ViewerSession {
    /// Download the model at `url`, upload it and start animating.
    pub async fn start(canvas: HtmlCanvasElement, url: &str, rotation_speed: f32) -> Result<Self, ViewerError> {
        let blob = ReqwestTransport::new().fetch_blob(url).await?;
        let model = load_glb(blob.bytes())?;
        info!("Displaying model {} ({} bytes)", blob.name(), blob.len());

        let gl = webgl2_context(&canvas)?;
        let mut renderer = GlRenderer::new(&gl)?;
        if let Err(e) = renderer.upload(&gl, &model) {
            renderer.destroy(&gl);
            return Err(e);
        }

        let state = Rc::new(RefCell::new(ViewState {
            gl,
            canvas,
            renderer,
            camera: OrbitCamera::new(),
            spin: ModelSpin::new(rotation_speed),
            lights: SceneLights::default(),
            last_time: None,
            drag: None,
        }));

        let mut session = Self {
            state,
            frame: Rc::new(RefCell::new(None)),
            frame_handle: Rc::new(Cell::new(0)),
            listeners: Vec::new(),
        };
        session.attach_controls();
        session.start_loop();
        Ok(session)
    }

    fn attach_controls(&mut self) {
        let state = self.state.clone();
        self.listen("mousedown", move |event| {
            if let Some(event) = event.dyn_ref::<MouseEvent>() {
                state.borrow_mut().pointer_down(event);
            }
        });

        let state = self.state.clone();
        self.listen("mousemove", move |event| {
            if let Some(event) = event.dyn_ref::<MouseEvent>() {
                state.borrow_mut().pointer_move(event);
            }
        });

        for name in ["mouseup", "mouseleave"] {
            let state = self.state.clone();
            self.listen(name, move |_| {
                state.borrow_mut().drag = None;
            });
        }

        let state = self.state.clone();
        self.listen("wheel", move |event| {
            if let Some(wheel) = event.dyn_ref::<WheelEvent>() {
                event.prevent_default();
                state.borrow_mut().wheel(wheel);
            }
        });

        // Right-drag pans.
        self.listen("contextmenu", |event| event.prevent_default());
    }

    fn listen(&mut self, event: &'static str, handler: impl FnMut(Event) + 'static) {
        let closure = Closure::<dyn FnMut(Event)>::new(handler);
        let canvas = self.state.borrow().canvas.clone();
        if let Err(e) = canvas.add_event_listener_with_callback(event, closure.as_ref().unchecked_ref()) {
            warn!("Failed to listen for {}: {:?}", event, e);
            return;
        }
        self.listeners.push(Listener { event, closure });
    }

    fn start_loop(&self) {
        let state = self.state.clone();
        let frame = self.frame.clone();
        let handle = self.frame_handle.clone();

        *self.frame.borrow_mut() = Some(Closure::<dyn FnMut(f64)>::new(move |time: f64| {
            state.borrow_mut().frame(time);
            if let Some(callback) = frame.borrow().as_ref() {
                request_frame(callback, &handle);
            }
        }));

        if let Some(callback) = self.frame.borrow().as_ref() {
            request_frame(callback, &self.frame_handle);
        }
    }

    /// Stop animating, detach the controls and free GPU resources.
    pub fn stop(self) {
        if let Some(window) = web_sys::window() {
            let _ = window.cancel_animation_frame(self.frame_handle.get());
        }
        // Breaks the closure's reference to itself.
        self.frame.borrow_mut().take();

        let mut state = self.state.borrow_mut();
        for listener in &self.listeners {
            let _ = state
                .canvas
                .remove_event_listener_with_callback(listener.event, listener.closure.as_ref().unchecked_ref());
        }
        let ViewState { gl, renderer, .. } = &mut *state;
        renderer.destroy(gl);
        info!("Viewer stopped");
    }
}

fn request_frame(callback: &Closure<dyn FnMut(f64)>, handle: &Cell<i32>) {
    let Some(window) = web_sys::window() else {
        return;
    };
    match window.request_animation_frame(callback.as_ref().unchecked_ref()) {
        Ok(id) => handle.set(id),
        Err(e) => warn!("requestAnimationFrame failed: {:?}", e),
    }
}

#[cfg(target_arch = "wasm32")]
fn webgl2_context(canvas: &HtmlCanvasElement) -> Result<glow::Context, ViewerError> {
    let context = canvas
        .get_context("webgl2")
        .map_err(|e| ViewerError::Gl(format!("{:?}", e)))?
        .ok_or(ViewerError::Unsupported)?
        .dyn_into::<web_sys::WebGl2RenderingContext>()
        .map_err(|_| ViewerError::Unsupported)?;
    Ok(glow::Context::from_webgl2_context(context))
}

#[cfg(not(target_arch = "wasm32"))]
fn webgl2_context(_canvas: &HtmlCanvasElement) -> Result<glow::Context, ViewerError> {
    Err(ViewerError::Unsupported)
}
