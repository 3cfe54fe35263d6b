/// Where one tool stands within an agent run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToolCallState {
    #[default]
    Idle,
    Invoked,
    Succeeded,
    RetryableFailure,
    /// Terminal: the run has to be aborted.
    ExhaustedFailure,
}

/// Retry bookkeeping for a single tool. A tool may fail `max_retries` times
/// and still be called again; the next failure exhausts it. A success
/// resets the count.
#[derive(Debug, Clone)]
pub struct RetryTracker {
    max_retries: usize,
    retries: usize,
    state: ToolCallState,
}

impl RetryTracker {
    pub fn new(max_retries: usize) -> Self {
        Self {
            max_retries,
            retries: 0,
            state: ToolCallState::Idle,
        }
    }

    pub fn state(&self) -> ToolCallState {
        self.state
    }

    pub fn retries(&self) -> usize {
        self.retries
    }

    pub fn max_retries(&self) -> usize {
        self.max_retries
    }

    pub fn invoke(&mut self) -> ToolCallState {
        debug_assert_ne!(
            self.state,
            ToolCallState::Invoked,
            "tool invoked twice without an outcome"
        );
        if self.state != ToolCallState::ExhaustedFailure {
            self.state = ToolCallState::Invoked;
        }
        self.state
    }

    pub fn succeed(&mut self) -> ToolCallState {
        if self.state == ToolCallState::Invoked {
            self.retries = 0;
            self.state = ToolCallState::Succeeded;
        }
        self.state
    }

    pub fn fail(&mut self) -> ToolCallState {
        if self.state == ToolCallState::Invoked {
            if self.retries < self.max_retries {
                self.retries += 1;
                self.state = ToolCallState::RetryableFailure;
            } else {
                self.state = ToolCallState::ExhaustedFailure;
            }
        }
        self.state
    }
}
