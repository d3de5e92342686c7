use std::time::{Duration, Instant};

pub struct FrameTiming {
    start: Instant,
    last_frame_time: Option<Instant>,
    last_fps_time: Instant,
    frame_count: u32,
    pub frame_dt: f32,
    max_dt: f32,
    base_title: String,
    pending_title: Option<String>,
}

impl FrameTiming {
    pub fn new(base_title: String, max_dt: f32, start: Instant) -> Self {
        Self {
            start,
            last_frame_time: None,
            last_fps_time: start,
            frame_count: 0,
            frame_dt: 1.0 / 60.0,
            max_dt: max_dt.max(0.0),
            base_title,
            pending_title: None,
        }
    }

    /// Advances to `now`. The step is clamped to `max_dt` so a stall (window
    /// drag, breakpoint) does not turn into one huge simulation step.
    pub fn update(&mut self, now: Instant) -> f32 {
        let dt_duration = if let Some(last) = self.last_frame_time {
            now.saturating_duration_since(last)
        } else {
            Duration::from_millis(16)
        };
        self.last_frame_time = Some(now);
        self.frame_dt = dt_duration.as_secs_f32().clamp(0.0, self.max_dt);

        self.frame_count = self.frame_count.saturating_add(1);
        let elapsed = now.saturating_duration_since(self.last_fps_time);
        if elapsed.as_secs_f32() >= 0.5 {
            let fps = self.frame_count as f32 / elapsed.as_secs_f32();
            let ms = (self.frame_dt * 1000.0).max(0.0);
            self.pending_title = Some(format!("{} - {:.1} fps ({:.2} ms)", self.base_title, fps, ms));
            self.frame_count = 0;
            self.last_fps_time = now;
        }
        self.frame_dt
    }

    /// Milliseconds since the session started; drives time-based animation.
    pub fn elapsed_ms(&self, now: Instant) -> f64 {
        now.saturating_duration_since(self.start).as_secs_f64() * 1000.0
    }

    /// Window title with fresh fps figures, at most twice a second.
    pub fn take_title(&mut self) -> Option<String> {
        self.pending_title.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_stall_is_clamped() {
        let start = Instant::now();
        let mut timing = FrameTiming::new("Test".to_string(), 0.1, start);
        timing.update(start);
        let dt = timing.update(start + Duration::from_secs(3));
        assert_eq!(dt, 0.1);
        let dt = timing.update(start + Duration::from_millis(3020));
        assert!((dt - 0.02).abs() < 1e-4);
    }

    #[test]
    fn title_reported_after_half_a_second() {
        let start = Instant::now();
        let mut timing = FrameTiming::new("Meadow".to_string(), 0.1, start);
        timing.update(start + Duration::from_millis(100));
        assert!(timing.take_title().is_none());
        timing.update(start + Duration::from_millis(600));
        let title = timing.take_title().unwrap();
        assert!(title.starts_with("Meadow - "));
        assert!(timing.take_title().is_none());
        assert!((timing.elapsed_ms(start + Duration::from_millis(600)) - 600.0).abs() < 1e-6);
    }
}
