use std::time::Duration;

/// Configuration for a [`Debounced`](crate::Debounced) engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DebounceOptions {
    /// Quiet period that must pass without calls before the trailing edge fires.
    pub wait: Duration,
    /// Invoke on the first call of a burst.
    pub leading: bool,
    /// Invoke with the latest arguments once the quiet period ends.
    pub trailing: bool,
    /// Ceiling on how long invocation may be deferred under continuous calls.
    ///
    /// Values below `wait` are raised to `wait` when the engine is built.
    pub max_wait: Option<Duration>,
}

impl DebounceOptions {
    pub fn new(wait: Duration) -> Self {
        Self {
            wait,
            ..Default::default()
        }
    }

    pub fn leading(mut self, leading: bool) -> Self {
        self.leading = leading;
        self
    }

    pub fn trailing(mut self, trailing: bool) -> Self {
        self.trailing = trailing;
        self
    }

    pub fn max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = Some(max_wait);
        self
    }

    /// Effective ceiling, never shorter than `wait`.
    pub fn effective_max_wait(&self) -> Option<Duration> {
        self.max_wait.map(|max| max.max(self.wait))
    }
}

impl Default for DebounceOptions {
    fn default() -> Self {
        Self {
            wait: Duration::ZERO,
            leading: false,
            trailing: true,
            max_wait: None,
        }
    }
}

/// Configuration for a [`Throttled`](crate::Throttled) engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ThrottleOptions {
    pub wait: Duration,
    pub leading: bool,
    pub trailing: bool,
}

impl ThrottleOptions {
    pub fn new(wait: Duration) -> Self {
        Self {
            wait,
            ..Default::default()
        }
    }

    pub fn leading(mut self, leading: bool) -> Self {
        self.leading = leading;
        self
    }

    pub fn trailing(mut self, trailing: bool) -> Self {
        self.trailing = trailing;
        self
    }
}

impl Default for ThrottleOptions {
    fn default() -> Self {
        Self {
            wait: Duration::ZERO,
            leading: true,
            trailing: true,
        }
    }
}

impl From<ThrottleOptions> for DebounceOptions {
    fn from(options: ThrottleOptions) -> Self {
        Self {
            wait: options.wait,
            leading: options.leading,
            trailing: options.trailing,
            max_wait: Some(options.wait),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_wait_is_clamped_to_wait() {
        let options =
            DebounceOptions::new(Duration::from_millis(100)).max_wait(Duration::from_millis(10));
        assert_eq!(
            options.effective_max_wait(),
            Some(Duration::from_millis(100))
        );
    }

    #[test]
    fn throttle_maps_to_ceiling_equal_to_wait() {
        let options: DebounceOptions = ThrottleOptions::new(Duration::from_millis(50))
            .trailing(false)
            .into();
        assert_eq!(options.max_wait, Some(Duration::from_millis(50)));
        assert!(options.leading);
        assert!(!options.trailing);
    }
}
