// Scroll discovery state machine.
//
// An infinite member feed can only be judged exhausted by watching it stay
// still: `threshold` consecutive scrolls that surface no unprocessed handle
// settle the loop. `max_scrolls` bounds a feed that keeps trickling forever.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleReason {
    Stagnant,
    ScrollCap,
    ProfileLimit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryState {
    Scanning,
    Scrolling,
    Settled(SettleReason),
}

#[derive(Debug, Clone)]
pub struct ScrollDiscovery {
    state: DiscoveryState,
    stagnant: u32,
    scrolls: u32,
    threshold: u32,
    max_scrolls: u32,
}

impl ScrollDiscovery {
    pub fn new(threshold: u32, max_scrolls: u32) -> Self {
        Self {
            state: DiscoveryState::Scanning,
            stagnant: 0,
            scrolls: 0,
            threshold: threshold.max(1),
            max_scrolls,
        }
    }

    pub fn state(&self) -> DiscoveryState {
        self.state
    }

    pub fn is_settled(&self) -> bool {
        matches!(self.state, DiscoveryState::Settled(_))
    }

    pub fn scrolls(&self) -> u32 {
        self.scrolls
    }

    pub fn stagnant_scrolls(&self) -> u32 {
        self.stagnant
    }

    /// Every visible unprocessed row has been handled.
    pub fn pass_complete(&mut self) -> DiscoveryState {
        if self.state == DiscoveryState::Scanning {
            self.state = DiscoveryState::Scrolling;
        }
        self.state
    }

    /// A scroll was issued and the DOM re-read; `fresh` is how many visible
    /// handles are not yet processed.
    pub fn record_scroll(&mut self, fresh: usize) -> DiscoveryState {
        if self.is_settled() {
            return self.state;
        }
        self.scrolls += 1;

        if fresh > 0 {
            self.stagnant = 0;
            self.state = DiscoveryState::Scanning;
        } else {
            self.stagnant += 1;
            self.state = if self.stagnant >= self.threshold {
                DiscoveryState::Settled(SettleReason::Stagnant)
            } else {
                DiscoveryState::Scrolling
            };
        }

        if !self.is_settled() && self.scrolls >= self.max_scrolls {
            self.state = DiscoveryState::Settled(SettleReason::ScrollCap);
        }
        self.state
    }

    pub fn limit_reached(&mut self) {
        if !self.is_settled() {
            self.state = DiscoveryState::Settled(SettleReason::ProfileLimit);
        }
    }
}
