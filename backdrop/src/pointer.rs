use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// The latest pointer movement, normalized to the surface with y pointing up.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PointerInput {
    pub position: [f32; 2],
    pub delta: [f32; 2],
}

#[derive(Debug, Default)]
struct PointerState {
    latest: PointerInput,
    last_position: Option<[f32; 2]>,
    moved: bool,
}

/// A single-writer, single-reader hand-off between the input handler and the
/// frame loop.
///
/// This is a latch, not a queue: movements recorded between two frames
/// collapse into the latest position and delta.
#[derive(Clone, Debug, Default)]
pub struct PointerLatch {
    state: Arc<Mutex<PointerState>>,
}

impl PointerLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a move to `(x, y)` surface pixels, origin at the top left.
    pub fn record_move(&self, x: f64, y: f64, surface_width: u32, surface_height: u32) {
        if surface_width == 0 || surface_height == 0 {
            return;
        }

        let position = [
            (x / surface_width as f64) as f32,
            1.0 - (y / surface_height as f64) as f32,
        ];

        let mut state = self.lock();
        let delta = match state.last_position {
            Some([last_x, last_y]) => [position[0] - last_x, position[1] - last_y],
            None => [0.0, 0.0],
        };

        state.latest = PointerInput { position, delta };
        state.last_position = Some(position);
        state.moved = true;
    }

    /// Take the movement recorded since the last call, if any.
    pub fn take(&self) -> Option<PointerInput> {
        let mut state = self.lock();
        if !state.moved {
            return None;
        }

        state.moved = false;
        Some(state.latest)
    }

    /// Forget the previous position, so the next move starts without a jump.
    pub fn forget(&self) {
        self.lock().last_position = None;
    }

    // Writers replace the whole record under the lock, so a poisoned lock
    // still holds a consistent one.
    fn lock(&self) -> MutexGuard<'_, PointerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn normalizes_and_flips_y() {
        let latch = PointerLatch::new();
        latch.record_move(200.0, 100.0, 800, 400);

        let input = latch.take().unwrap();
        assert_relative_eq!(input.position[0], 0.25);
        assert_relative_eq!(input.position[1], 0.75);
    }

    #[test]
    fn first_move_has_no_delta() {
        let latch = PointerLatch::new();
        latch.record_move(400.0, 200.0, 800, 400);
        assert_eq!(latch.take().unwrap().delta, [0.0, 0.0]);
    }

    #[test]
    fn take_consumes_the_latch() {
        let latch = PointerLatch::new();
        assert_eq!(latch.take(), None);

        latch.record_move(10.0, 10.0, 100, 100);
        assert!(latch.take().is_some());
        assert_eq!(latch.take(), None);
    }

    #[test]
    fn coalesces_moves_between_frames() {
        let latch = PointerLatch::new();
        latch.record_move(0.0, 100.0, 100, 100);
        latch.record_move(10.0, 90.0, 100, 100);
        latch.record_move(30.0, 80.0, 100, 100);

        let input = latch.take().unwrap();
        assert_relative_eq!(input.position[0], 0.3, epsilon = 1e-6);
        assert_relative_eq!(input.position[1], 0.2, epsilon = 1e-6);
        // Only the last step, not the sum of all three.
        assert_relative_eq!(input.delta[0], 0.2, epsilon = 1e-6);
        assert_relative_eq!(input.delta[1], 0.1, epsilon = 1e-6);
        assert_eq!(latch.take(), None);
    }

    #[test]
    fn ignores_zero_sized_surfaces() {
        let latch = PointerLatch::new();
        latch.record_move(10.0, 10.0, 0, 100);
        assert_eq!(latch.take(), None);
    }

    #[test]
    fn forget_resets_the_delta() {
        let latch = PointerLatch::new();
        latch.record_move(10.0, 10.0, 100, 100);
        latch.forget();
        latch.record_move(90.0, 90.0, 100, 100);
        assert_eq!(latch.take().unwrap().delta, [0.0, 0.0]);
    }

    #[test]
    fn clones_share_one_latch() {
        let writer = PointerLatch::new();
        let reader = writer.clone();

        std::thread::spawn(move || writer.record_move(50.0, 50.0, 100, 100))
            .join()
            .unwrap();

        assert!(reader.take().is_some());
    }
}
