/// Something the scheduler can drive frame by frame.
pub trait Animation {
    /// Reallocate everything that depends on the surface size.
    fn resize(&mut self, width: u32, height: u32);

    /// Release every resource. Called exactly once, when the scheduler stops.
    fn teardown(self);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    Idle,
    Running,
    Stopped,
}

/// Owns the animation loop: explicit start and stop, and resizes applied at
/// the start of a frame, never in the middle of one.
///
/// The host calls [`Scheduler::tick`] once per display refresh and draws
/// with the animation it gets back.
pub struct Scheduler<A: Animation> {
    animation: Option<A>,
    state: State,
    pending_resize: Option<(u32, u32)>,
    ticks: u64,
}

impl<A: Animation> Scheduler<A> {
    pub fn new(animation: A) -> Self {
        Self {
            animation: Some(animation),
            state: State::Idle,
            pending_resize: None,
            ticks: 0,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn start(&mut self) {
        match self.state {
            State::Idle => {
                log::info!("▶️ Starting animation");
                self.state = State::Running;
            }
            State::Running => (),
            State::Stopped => log::warn!("Can’t restart a stopped animation"),
        }
    }

    /// Stop ticking and tear the animation down. Stopping is final.
    pub fn stop(&mut self) {
        if self.state == State::Stopped {
            return;
        }

        log::info!("⏹️ Stopping animation after {} frames", self.ticks);
        self.state = State::Stopped;
        self.pending_resize = None;

        if let Some(animation) = self.animation.take() {
            animation.teardown();
        }
    }

    /// Queue a resize for the next tick. Only the latest size is kept.
    pub fn request_resize(&mut self, width: u32, height: u32) {
        if self.state != State::Stopped {
            self.pending_resize = Some((width, height));
        }
    }

    /// Begin a frame. Returns the animation to draw with, or `None` if the
    /// scheduler isn't running.
    pub fn tick(&mut self) -> Option<&mut A> {
        if self.state != State::Running {
            return None;
        }

        let animation = self.animation.as_mut()?;

        if let Some((width, height)) = self.pending_resize.take() {
            animation.resize(width, height);
        }

        self.ticks += 1;
        Some(animation)
    }
}

impl<A: Animation> Drop for Scheduler<A> {
    fn drop(&mut self) {
        self.stop();
    }
}
