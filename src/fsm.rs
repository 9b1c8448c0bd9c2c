/// Minimal finite-state-machine container.
///
/// `S` is the state type (usually an enum). The machine tracks the current
/// state and the one it left. Deciding the next state is left to the driver
/// that owns the machine (see `shadow::pass`).
pub struct StateMachine<S: Clone> {
    pub state: S,
    pub previous: S,
    initial: S,
}

impl<S: Clone> StateMachine<S> {
    pub fn new(initial: S) -> Self {
        Self {
            previous: initial.clone(),
            state: initial.clone(),
            initial,
        }
    }

    /// Transition to `next`, even if it is the same variant. Variants that
    /// carry data change meaning with it, e.g. `DepthPass(0)` to `DepthPass(1)`.
    pub fn force_go(&mut self, next: S) {
        self.previous = std::mem::replace(&mut self.state, next);
    }

    /// Return to the initial state.
    pub fn reset(&mut self) {
        self.previous = self.state.clone();
        self.state = self.initial.clone();
    }
}
