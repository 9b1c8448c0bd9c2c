use std::time::Instant;

pub struct FrameTimer {
    start: Instant,
    last: Instant,
    pub dt: f32,
    /// Seconds since the timer was created, sampled at the last `tick`.
    pub elapsed: f32,
}

impl FrameTimer {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last: now,
            dt: 0.0,
            elapsed: 0.0,
        }
    }

    pub fn tick(&mut self) {
        let now = Instant::now();
        self.dt = now.duration_since(self.last).as_secs_f32();
        self.elapsed = now.duration_since(self.start).as_secs_f32();
        self.last = now;
    }
}
