use sdl2::event::{Event, WindowEvent};
use sdl2::keyboard::Scancode;
use sdl2::mouse::MouseButton;
use sdl2::EventPump;
use std::collections::HashSet;

/// Discrete edges seen during one `update`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    KeyPressed(Scancode),
    MouseCaptured,
    Resized(u32, u32),
}

pub struct InputState {
    pub keys: HashSet<Scancode>,
    pub events: Vec<InputEvent>,
    pub mouse_dx: f32,
    pub mouse_dy: f32,
    /// Mouse look only applies while the cursor is captured.
    pub captured: bool,
    quit: bool,
}

impl InputState {
    pub fn new() -> Self {
        Self {
            keys: HashSet::new(),
            events: Vec::new(),
            mouse_dx: 0.0,
            mouse_dy: 0.0,
            captured: false,
            quit: false,
        }
    }

    pub fn update(&mut self, event_pump: &mut EventPump) {
        self.mouse_dx = 0.0;
        self.mouse_dy = 0.0;
        self.events.clear();

        for event in event_pump.poll_iter() {
            match event {
                Event::Quit { .. } => self.quit = true,
                Event::KeyDown {
                    scancode: Some(Scancode::Escape),
                    ..
                } => self.quit = true,
                Event::KeyDown {
                    scancode: Some(sc),
                    repeat,
                    ..
                } => {
                    if self.keys.insert(sc) && !repeat {
                        self.events.push(InputEvent::KeyPressed(sc));
                    }
                }
                Event::KeyUp {
                    scancode: Some(sc), ..
                } => {
                    self.keys.remove(&sc);
                }
                Event::MouseButtonDown {
                    mouse_btn: MouseButton::Left,
                    ..
                } if !self.captured => {
                    self.captured = true;
                    self.events.push(InputEvent::MouseCaptured);
                }
                Event::MouseMotion { xrel, yrel, .. } if self.captured => {
                    self.mouse_dx += xrel as f32;
                    self.mouse_dy += yrel as f32;
                }
                Event::Window {
                    win_event: WindowEvent::SizeChanged(w, h),
                    ..
                } => {
                    self.events.push(InputEvent::Resized(w.max(1) as u32, h.max(1) as u32));
                }
                _ => {}
            }
        }
    }

    pub fn is_key_held(&self, sc: Scancode) -> bool {
        self.keys.contains(&sc)
    }

    pub fn was_pressed(&self, sc: Scancode) -> bool {
        self.events.contains(&InputEvent::KeyPressed(sc))
    }

    pub fn should_quit(&self) -> bool {
        self.quit
    }
}
